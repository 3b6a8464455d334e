//! `config validate` and `config show`.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::cli::args::{ConfigShowArgs, ConfigValidateArgs, DocumentFormat, OutputFormat};
use crate::config::{ConfigLoader, GameConfig, LoadResult};
use crate::error::{CipherHuntError, ConfigError, Severity, ValidationIssue};

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate one or more configuration files.
///
/// Every file is checked before returning, so a single run reports all
/// broken files.
///
/// # Errors
///
/// Returns the last configuration error seen if any file fails, or a
/// JSON error if the report cannot be rendered.
pub fn validate(args: &ConfigValidateArgs) -> Result<(), CipherHuntError> {
    let loader = ConfigLoader::default();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut failure = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let outcome = loader
            .load(path)
            .and_then(|loaded| enforce_strict(loaded, path, args.strict));
        let report = match outcome {
            Ok(loaded) => {
                for warning in &loaded.warnings {
                    tracing::warn!(
                        location = warning.location.as_deref().unwrap_or("<unknown>"),
                        "{}",
                        warning.message
                    );
                }
                FileReport {
                    file: path.display().to_string(),
                    valid: true,
                    errors: Vec::new(),
                    warnings: loaded
                        .warnings
                        .iter()
                        .map(|w| match &w.location {
                            Some(at) => format!("{} at {at}", w.message),
                            None => w.message.clone(),
                        })
                        .collect(),
                }
            }
            Err(err) => {
                let report = FileReport {
                    file: path.display().to_string(),
                    valid: false,
                    errors: describe(&err),
                    warnings: Vec::new(),
                };
                failure = Some(err);
                report
            }
        };
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                if report.valid {
                    println!("ok      {}", report.file);
                } else {
                    println!("invalid {}", report.file);
                }
                for line in &report.errors {
                    println!("  error: {line}");
                }
                for line in &report.warnings {
                    println!("  warning: {line}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    failure.map_or(Ok(()), |err| Err(err.into()))
}

/// Print the effective configuration.
///
/// # Errors
///
/// Returns a configuration error if the file does not load, or a
/// serialization error.
pub fn show(args: &ConfigShowArgs) -> Result<(), CipherHuntError> {
    let config = match &args.file {
        Some(path) => ConfigLoader::default().load(path)?.config,
        None => Arc::new(GameConfig::default()),
    };
    let rendered = render(&config, args.format)?;
    print!("{rendered}");
    Ok(())
}

fn render(config: &GameConfig, format: DocumentFormat) -> Result<String, CipherHuntError> {
    Ok(match format {
        DocumentFormat::Yaml => serde_yaml::to_string(config)?,
        DocumentFormat::Json => format!("{}\n", serde_json::to_string_pretty(config)?),
    })
}

fn enforce_strict(loaded: LoadResult, path: &Path, strict: bool) -> Result<LoadResult, ConfigError> {
    if !strict || loaded.warnings.is_empty() {
        return Ok(loaded);
    }
    let errors = loaded
        .warnings
        .into_iter()
        .map(|w| ValidationIssue {
            path: w.location.unwrap_or_default(),
            message: w.message,
            severity: Severity::Error,
        })
        .collect();
    Err(ConfigError::ValidationError {
        path: path.display().to_string(),
        errors,
    })
}

fn describe(err: &ConfigError) -> Vec<String> {
    match err {
        ConfigError::ValidationError { errors, .. } => errors
            .iter()
            .map(|issue| format!("{} at {}", issue.message, issue.path))
            .collect(),
        ConfigError::ParseError {
            line: Some(line),
            message,
            ..
        } => vec![format!("line {line}: {message}")],
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::LoadWarning;

    #[test]
    fn strict_turns_warnings_into_errors() {
        let loaded = LoadResult {
            config: Arc::new(GameConfig::default()),
            warnings: vec![LoadWarning {
                message: "empty catalog".to_string(),
                location: Some("tasks.saboteur".to_string()),
            }],
        };
        let err = enforce_strict(loaded, Path::new("game.yaml"), true).unwrap_err();
        let ConfigError::ValidationError { errors, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].path, "tasks.saboteur");
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[test]
    fn lenient_keeps_warnings() {
        let loaded = LoadResult {
            config: Arc::new(GameConfig::default()),
            warnings: vec![LoadWarning {
                message: "empty catalog".to_string(),
                location: None,
            }],
        };
        let kept = enforce_strict(loaded, Path::new("game.yaml"), false).unwrap();
        assert_eq!(kept.warnings.len(), 1);
    }

    #[test]
    fn defaults_render_and_reload() {
        let yaml = render(&GameConfig::default(), DocumentFormat::Yaml).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let loaded = ConfigLoader::default().load(file.path()).unwrap();
        assert_eq!(*loaded.config, GameConfig::default());
    }

    #[test]
    fn validate_reports_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"session:\n  saboteur_count: 0\n").unwrap();
        let args = ConfigValidateArgs {
            files: vec![file.path().to_path_buf()],
            format: OutputFormat::Json,
            strict: false,
        };
        let err = validate(&args).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::ExitCode::CONFIG_ERROR);
    }
}
