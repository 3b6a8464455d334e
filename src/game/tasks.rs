//! Task tracking.
//!
//! Generates every participant's tasks from the role catalog at session
//! start, validates completion claims, and keeps the counters that feed
//! aggregate progress and concealment waves.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::config::schema::TaskSettings;
use crate::error::GameError;
use crate::game::model::{
    Participant, Phase, PlayerId, Point, ProgressRecord, Role, SessionId, Task, TaskId,
};

/// Task catalog and completion counters for one session.
#[derive(Debug, Clone)]
pub struct TaskTracker {
    tasks: IndexMap<TaskId, Task>,
    tasks_per_player: usize,
    /// Majority tasks completed over the whole session
    majority_completed: u64,
    /// Majority tasks completed since the last concealment wave
    wave_counter: usize,
}

impl TaskTracker {
    /// Creates one task per catalog entry for every participant, using
    /// the catalog matching the participant's role.
    #[must_use]
    pub fn generate(
        session_id: &SessionId,
        participants: &[Participant],
        settings: &TaskSettings,
    ) -> Self {
        let mut tasks = IndexMap::new();
        for participant in participants {
            let catalog = match participant.role {
                Role::Majority => &settings.majority,
                Role::Saboteur => &settings.saboteur,
            };
            for template in catalog {
                let id = TaskId::for_player(&participant.player_id, &template.key);
                tasks.insert(
                    id.clone(),
                    Task {
                        id,
                        session_id: session_id.clone(),
                        owner_player_id: participant.player_id.clone(),
                        kind: participant.role,
                        catalog_key: template.key.clone(),
                        name: template.name.clone(),
                        location: template.location,
                        points: template.points,
                        completed: false,
                        completed_at: None,
                    },
                );
            }
        }

        Self {
            tasks,
            tasks_per_player: settings.tasks_per_player(),
            majority_completed: 0,
            wave_counter: 0,
        }
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn tasks_for<'a>(&'a self, player: &'a PlayerId) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .values()
            .filter(move |t| &t.owner_player_id == player)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub const fn majority_completed(&self) -> u64 {
        self.majority_completed
    }

    #[must_use]
    pub const fn wave_counter(&self) -> usize {
        self.wave_counter
    }

    /// Checks a completion claim without mutating anything.
    ///
    /// Checks run in a fixed order: existence, duplicate completion,
    /// ownership/role, phase, then proximity.
    ///
    /// # Errors
    ///
    /// Returns the first rule the claim breaks.
    pub fn validate_claim(
        &self,
        task_id: &TaskId,
        claimant: &Participant,
        phase: Phase,
        position: Option<Point>,
        proximity_threshold: Option<f64>,
    ) -> Result<&Task, GameError> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| GameError::NotFound(format!("task {task_id}")))?;

        if task.completed {
            return Err(GameError::AlreadyActed(format!(
                "task {task_id} is already completed"
            )));
        }

        if task.owner_player_id != claimant.player_id {
            return Err(GameError::Unauthorized(format!(
                "task {task_id} belongs to another player"
            )));
        }
        if task.kind != claimant.role {
            return Err(GameError::Unauthorized(format!(
                "{} players cannot complete {} tasks",
                claimant.role, task.kind
            )));
        }

        if phase != Phase::Tasks {
            return Err(GameError::InvalidPhase {
                action: "complete_task",
                phase,
            });
        }

        if let (Some(limit), Some(reported)) = (proximity_threshold, position) {
            let distance = reported.distance_to(task.location);
            if !distance.is_finite() || distance > limit {
                return Err(GameError::Validation(format!(
                    "reported position is {distance:.1} units from task {task_id}, limit is {limit:.1}"
                )));
            }
        }

        Ok(task)
    }

    /// Marks a previously validated task as completed.
    ///
    /// Returns the kind of the completed task, or `None` if the id is unknown
    /// or the task was already completed.
    pub fn mark_completed(&mut self, task_id: &TaskId, at: DateTime<Utc>) -> Option<Role> {
        let task = self.tasks.get_mut(task_id)?;
        if task.completed {
            return None;
        }
        task.completed = true;
        task.completed_at = Some(at);
        if task.kind == Role::Majority {
            self.majority_completed += 1;
        }
        Some(task.kind)
    }

    /// Counts a majority completion towards the current wave. Returns
    /// `true` (and starts a new wave) once the wave reaches
    /// `alive_majority` completions.
    pub fn advance_wave(&mut self, alive_majority: usize) -> bool {
        self.wave_counter += 1;
        if self.wave_counter >= alive_majority.max(1) {
            self.wave_counter = 0;
            true
        } else {
            false
        }
    }

    /// `completed_majority / (alive_majority * tasks_per_player)` as a
    /// rounded percentage, clamped to 0..=100.
    #[must_use]
    pub fn aggregate_progress(&self, alive_majority: usize) -> u32 {
        let denominator = (alive_majority as u64).saturating_mul(self.tasks_per_player as u64);
        if denominator == 0 {
            return 0;
        }
        let rounded = (self.majority_completed * 200 + denominator) / (2 * denominator);
        u32::try_from(rounded.min(100)).unwrap_or(100)
    }

    /// Rebuilds a player's progress projection from their task records.
    #[must_use]
    pub fn progress_for(&self, session_id: &SessionId, player: &PlayerId) -> ProgressRecord {
        let mut count = 0;
        let mut points = 0;
        let mut last = None;
        for task in self.tasks_for(player).filter(|t| t.completed) {
            count += 1;
            points += task.points;
            last = last.max(task.completed_at);
        }
        ProgressRecord {
            session_id: session_id.clone(),
            player_id: player.clone(),
            tasks_completed_count: count,
            total_points: points,
            last_updated: last.unwrap_or_else(Utc::now),
        }
    }
}
