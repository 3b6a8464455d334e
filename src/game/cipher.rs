//! Cipher progress engine
//!
//! Holds the secret artifact and its partially-masked rendering. The
//! saboteur path ([`CipherState::reveal`]) earns `decrypted_percentage`,
//! which only ever goes up. The majority path ([`CipherState::conceal`])
//! re-masks the display down to a ceiling of `100 - decrypted - pct`
//! percent without touching what was earned; the next reveal always
//! brings the display back to at least the earned share.
//!
//! Whitespace and punctuation are protected: they are always shown and
//! never count towards percentages.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

/// Mask positions changed by one reveal or conceal call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CipherChange {
    /// Positions switched from placeholder to the real character
    pub revealed: usize,
    /// Positions switched back to the placeholder
    pub concealed: usize,
}

impl CipherChange {
    /// Returns `true` when the mask did not change.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.revealed == 0 && self.concealed == 0
    }
}

/// Secret, mask and earned percentage.
#[derive(Debug, Clone)]
pub struct CipherState {
    secret: Vec<char>,
    visible: Vec<bool>,
    /// Indices of positions that can be masked (letters and digits)
    maskable: Vec<usize>,
    placeholder: char,
    decrypted_percentage: u32,
}

/// Serializable view of the cipher, used for events and snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CipherView {
    pub mask: String,
    pub decrypted_percentage: u32,
}

impl CipherState {
    /// Creates a fully-masked cipher for `secret`.
    #[must_use]
    pub fn new(secret: &str, placeholder: char) -> Self {
        let secret: Vec<char> = secret.chars().collect();
        let maskable: Vec<usize> = secret
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_alphanumeric())
            .map(|(i, _)| i)
            .collect();
        let visible = secret.iter().map(|c| !c.is_alphanumeric()).collect();

        Self {
            secret,
            visible,
            maskable,
            placeholder,
            decrypted_percentage: 0,
        }
    }

    /// The canonical secret.
    #[must_use]
    pub fn secret(&self) -> String {
        self.secret.iter().collect()
    }

    /// The current rendering, with hidden positions replaced by the placeholder.
    #[must_use]
    pub fn mask(&self) -> String {
        self.secret
            .iter()
            .zip(&self.visible)
            .map(|(&c, &shown)| if shown { c } else { self.placeholder })
            .collect()
    }

    /// Saboteur-earned progress, 0..=100. Never decreases.
    #[must_use]
    pub const fn decrypted_percentage(&self) -> u32 {
        self.decrypted_percentage
    }

    /// Number of positions that take part in masking.
    #[must_use]
    pub fn maskable_len(&self) -> usize {
        self.maskable.len()
    }

    /// Number of maskable positions currently shown.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.maskable.iter().filter(|&&i| self.visible[i]).count()
    }

    /// Returns `true` when every maskable position is hidden.
    #[must_use]
    pub fn is_fully_masked(&self) -> bool {
        self.visible_count() == 0
    }

    /// Returns `true` once the saboteurs have earned the whole secret.
    #[must_use]
    pub const fn is_decrypted(&self) -> bool {
        self.decrypted_percentage >= 100
    }

    #[must_use]
    pub fn view(&self) -> CipherView {
        CipherView {
            mask: self.mask(),
            decrypted_percentage: self.decrypted_percentage,
        }
    }

    /// Earns `pct` points of decryption and unmasks random hidden
    /// positions until the display covers the earned share.
    pub fn reveal<R: Rng + ?Sized>(&mut self, pct: u32, rng: &mut R) -> CipherChange {
        self.decrypted_percentage = self.decrypted_percentage.saturating_add(pct).min(100);

        let target = self.count_for(self.decrypted_percentage);
        let shown = self.visible_count();
        if shown >= target {
            return CipherChange::default();
        }

        let hidden: Vec<usize> = self
            .maskable
            .iter()
            .copied()
            .filter(|&i| !self.visible[i])
            .collect();
        let picked: Vec<usize> = hidden.choose_multiple(rng, target - shown).copied().collect();
        for &i in &picked {
            self.visible[i] = true;
        }

        CipherChange {
            revealed: picked.len(),
            concealed: 0,
        }
    }

    /// Re-masks random visible positions so that at most
    /// `100 - decrypted - pct` percent of the display stays shown
    /// (floored at 0).
    ///
    /// The further the saboteurs have decrypted, the harder a wave hides
    /// the display. `decrypted_percentage` is left untouched.
    pub fn conceal<R: Rng + ?Sized>(&mut self, pct: u32, rng: &mut R) -> CipherChange {
        let ceiling = 100u32
            .saturating_sub(self.decrypted_percentage)
            .saturating_sub(pct);
        let target = self.count_for(ceiling);
        let shown = self.visible_count();
        if shown <= target {
            return CipherChange::default();
        }

        let candidates: Vec<usize> = self
            .maskable
            .iter()
            .copied()
            .filter(|&i| self.visible[i])
            .collect();
        let picked: Vec<usize> = candidates
            .choose_multiple(rng, shown - target)
            .copied()
            .collect();
        for &i in &picked {
            self.visible[i] = false;
        }

        CipherChange {
            revealed: 0,
            concealed: picked.len(),
        }
    }

    /// `ceil(pct / 100 * maskable_len)`
    fn count_for(&self, pct: u32) -> usize {
        let pct = usize::try_from(pct.min(100)).unwrap_or(100);
        (pct * self.maskable.len()).div_ceil(100)
    }
}
