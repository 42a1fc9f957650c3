use crate::question::Question;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

/// Tunables for question matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSettings {
    /// Maximum distance between playback position and a question's timestamp.
    pub tolerance_s: f64,
    /// Samples this close to the last trigger position are ignored.
    pub retrigger_window_s: f64,
    /// How long a shown question stays suppressed.
    pub recently_shown: Duration,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            tolerance_s: 1.0,
            retrigger_window_s: 0.5,
            recently_shown: Duration::from_secs(10),
        }
    }
}

/// Ids shown recently, each with its expiry instant.
#[derive(Debug, Default)]
pub struct RecentlyShown {
    expires: HashMap<String, Instant>,
}

impl RecentlyShown {
    pub fn insert(&mut self, id: &str, until: Instant) {
        self.expires.insert(id.to_string(), until);
    }

    pub fn contains(&self, id: &str, now: Instant) -> bool {
        self.expires.get(id).is_some_and(|until| now < *until)
    }

    /// Drop expired entries.
    pub fn purge(&mut self, now: Instant) {
        self.expires.retain(|_, until| now < *until);
    }

    pub fn clear(&mut self) {
        self.expires.clear();
    }
}

/// Decides which question, if any, should interrupt playback at a sampled position.
#[derive(Debug, Default)]
pub struct Matcher {
    settings: TriggerSettings,
    last_trigger: Option<f64>,
    recent: RecentlyShown,
}

impl Matcher {
    pub fn new(settings: TriggerSettings) -> Self {
        Self {
            settings,
            last_trigger: None,
            recent: RecentlyShown::default(),
        }
    }

    /// Evaluate one sample. Returns the index of the question to show.
    ///
    /// On selection the question is suppressed for the recently-shown window
    /// and `position` becomes the last trigger position.
    pub fn select(
        &mut self,
        position: f64,
        questions: &[Question],
        answered: &HashSet<String>,
        active: bool,
        now: Instant,
    ) -> Option<usize> {
        if active || questions.is_empty() {
            return None;
        }
        if !position.is_finite() || position < 0.0 {
            return None;
        }
        if let Some(last) = self.last_trigger {
            if (position - last).abs() < self.settings.retrigger_window_s {
                return None;
            }
        }

        self.recent.purge(now);

        let idx = questions.iter().position(|q| {
            (position - q.timestamp).abs() <= self.settings.tolerance_s
                && !answered.contains(&q.id)
                && !self.recent.contains(&q.id, now)
        })?;

        let question = &questions[idx];
        debug!(
            question = %question.id,
            position,
            timestamp = question.timestamp,
            "question triggered"
        );
        self.recent.insert(&question.id, now + self.settings.recently_shown);
        self.last_trigger = Some(position);
        Some(idx)
    }

    /// Forget trigger history, e.g. when a new course is loaded.
    pub fn reset(&mut self) {
        self.last_trigger = None;
        self.recent.clear();
    }
}
