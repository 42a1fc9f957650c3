use crate::labels::Labels;
use crate::question::Question;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerState {
    Upcoming,
    Answered,
}

/// One question's position on the custom timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Index into the question list; used to activate the marker.
    pub index: usize,
    pub question_id: String,
    /// Position along the track, 0..=1.
    pub fraction: f64,
    pub state: MarkerState,
    pub tooltip: String,
    pub aria_label: String,
}

/// Where a seek gesture ends up.
#[derive(Debug, Clone, PartialEq)]
pub enum SeekOutcome {
    /// Seek proceeds to this position.
    Proceed(f64),
    /// Seek would skip an unanswered question; stop just before it and pause.
    Blocked { position: f64, question_id: String },
}

/// Format seconds as `m:ss`.
pub fn time_label(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

fn usable_duration(duration: f64) -> Option<f64> {
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

/// Build markers for every question. Returns `None` until the duration is known.
pub fn build_markers(
    questions: &[Question],
    answered: &HashSet<String>,
    duration: f64,
    labels: &Labels,
) -> Option<Vec<Marker>> {
    let duration = usable_duration(duration)?;
    let markers = questions
        .iter()
        .enumerate()
        .map(|(index, q)| {
            let answered = answered.contains(&q.id);
            let ordinal = index + 1;
            let at = time_label(q.timestamp);
            let tooltip = format!("{} {} • {}", labels.marker_prefix, ordinal, at);
            let mut aria_label = format!(
                "{} {} {} {}",
                labels.marker_prefix, ordinal, labels.marker_at, at
            );
            if answered {
                aria_label.push(' ');
                aria_label.push_str(&labels.answered_suffix);
            }
            Marker {
                index,
                question_id: q.id.clone(),
                fraction: (q.timestamp / duration).clamp(0.0, 1.0),
                state: if answered {
                    MarkerState::Answered
                } else {
                    MarkerState::Upcoming
                },
                tooltip,
                aria_label,
            }
        })
        .collect();
    Some(markers)
}

/// Playback progress as a fraction of duration.
pub fn progress(position: f64, duration: f64) -> Option<f64> {
    let duration = usable_duration(duration)?;
    if !position.is_finite() {
        return None;
    }
    Some((position / duration).clamp(0.0, 1.0))
}

/// Translate a click on the track into a target position.
pub fn seek_target(fraction: f64, duration: f64) -> Option<f64> {
    let duration = usable_duration(duration)?;
    if !fraction.is_finite() {
        return None;
    }
    Some(fraction.clamp(0.0, 1.0) * duration)
}

/// Apply the forward-skip gate to a seek from `current` to `target`.
///
/// Forward seeks that cross an unanswered question (timestamp strictly
/// between the two) stop `margin` seconds before the earliest one.
pub fn gate_seek(
    current: f64,
    target: f64,
    questions: &[Question],
    answered: &HashSet<String>,
    margin: f64,
) -> SeekOutcome {
    let current = if current.is_finite() { current } else { 0.0 };
    if target <= current {
        return SeekOutcome::Proceed(target);
    }

    let gate = questions
        .iter()
        .filter(|q| !answered.contains(&q.id))
        .filter(|q| q.timestamp > current && q.timestamp < target)
        .min_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    match gate {
        Some(q) => SeekOutcome::Blocked {
            position: (q.timestamp - margin).max(0.0),
            question_id: q.id.clone(),
        },
        None => SeekOutcome::Proceed(target),
    }
}
