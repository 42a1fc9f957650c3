use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// The three ways a question can be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    Text,
}

impl QuestionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "multiple_choice" => Some(Self::MultipleChoice),
            "true_false" => Some(Self::TrueFalse),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn is_choice(self) -> bool {
        matches!(self, Self::MultipleChoice | Self::TrueFalse)
    }
}

/// How the API encodes the expected answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Index(i64),
    Text(String),
    List(Vec<String>),
    Missing,
}

impl CorrectAnswer {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Self::Index(i)
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() && f.fract() == 0.0 => Self::Index(f as i64),
                        _ => Self::Text(n.to_string()),
                    }
                }
            }
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(Value::Array(items)) => Self::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => Self::Missing,
        }
    }

    /// Integer reading of the answer, used by choice questions.
    /// Numeric strings count; lists and missing answers do not.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            Self::List(_) | Self::Missing => None,
        }
    }

    /// Accepted answers in their original spelling, trimmed, empty entries dropped.
    /// A plain string is treated as a comma-separated list.
    pub fn accepted(&self) -> Vec<String> {
        let raw: Vec<String> = match self {
            Self::Index(i) => vec![i.to_string()],
            Self::Text(s) => s.split(',').map(str::to_string).collect(),
            Self::List(items) => items.clone(),
            Self::Missing => Vec::new(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Accepted answers normalised for comparison (trimmed, lower-cased).
    pub fn normalized(&self) -> Vec<String> {
        self.accepted().iter().map(|s| s.to_lowercase()).collect()
    }
}

/// One in-video question. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    pub image_url: Option<String>,
    pub image_path: Option<String>,
    /// Playback second at which the question interrupts the video.
    pub timestamp: f64,
    pub options: Vec<String>,
    pub correct_answer: CorrectAnswer,
    pub explanation: Option<String>,
}

/// Wire shape of a question record as the course API returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    id: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
    question: Option<String>,
    text: Option<String>,
    image_url: Option<String>,
    image_path: Option<String>,
    timestamp: Option<Value>,
    options: Option<Vec<Value>>,
    correct_answer: Option<Value>,
    correct_answers: Option<Value>,
    explanation: Option<String>,
}

impl Question {
    /// Parse a single record. Malformed records are an error so the caller can skip them.
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawQuestion =
            serde_json::from_value(value.clone()).context("question record has wrong shape")?;

        let id = match raw.id {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => bail!("question has no usable id"),
        };

        let kind_str = raw.kind.unwrap_or_default();
        let Some(kind) = QuestionKind::parse(&kind_str) else {
            bail!("question {id} has unknown type '{kind_str}'");
        };

        let timestamp = match raw.timestamp {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let timestamp = match timestamp {
            Some(t) if t.is_finite() && t >= 0.0 => t,
            _ => bail!("question {id} has no usable timestamp"),
        };

        let options: Vec<String> = raw
            .options
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect();
        if kind == QuestionKind::MultipleChoice && options.is_empty() {
            bail!("multiple choice question {id} has no options");
        }

        let mut correct_answer = CorrectAnswer::from_value(raw.correct_answer.as_ref());
        if correct_answer == CorrectAnswer::Missing {
            correct_answer = CorrectAnswer::from_value(raw.correct_answers.as_ref());
        }

        Ok(Self {
            id,
            kind,
            prompt: raw.question.or(raw.text).unwrap_or_default(),
            image_url: raw.image_url.filter(|s| !s.trim().is_empty()),
            image_path: raw.image_path.filter(|s| !s.trim().is_empty()),
            timestamp,
            options,
            correct_answer,
            explanation: raw.explanation.filter(|s| !s.trim().is_empty()),
        })
    }

    /// Absolute image URL, if the question has an image.
    ///
    /// `imageUrl` wins. A relative `imagePath` is served from the API host,
    /// i.e. `api_base` with a trailing `/api` removed.
    pub fn resolve_image(&self, api_base: &str) -> Option<String> {
        if let Some(url) = &self.image_url {
            return Some(url.clone());
        }
        let path = self.image_path.as_deref()?;
        let lower = path.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Some(path.to_string());
        }
        let base = api_base.trim_end_matches('/');
        let base = base.strip_suffix("/api").unwrap_or(base);
        Some(format!("{}/{}", base, path.trim_start_matches('/')))
    }
}

/// Parse the course questions body, skipping malformed records, sorted by timestamp.
///
/// Accepts `{"success": true, "data": [...]}` or a bare array.
pub fn parse_question_list(body: &Value) -> Vec<Question> {
    let records = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => {
            if map.get("success").and_then(Value::as_bool) == Some(false) {
                return Vec::new();
            }
            match map.get("data") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => return Vec::new(),
            }
        }
        _ => return Vec::new(),
    };

    let mut questions: Vec<Question> = records
        .iter()
        .filter_map(|record| match Question::from_value(record) {
            Ok(q) => Some(q),
            Err(e) => {
                warn!(error = %e, "skipping malformed question");
                None
            }
        })
        .collect();
    questions.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // --- record parsing ---

    #[test]
    fn parses_true_false_record() {
        let q = Question::from_value(&json!({
            "id": "q1", "type": "true_false", "question": "Sky is blue?",
            "timestamp": 5, "correctAnswer": 1
        }))
        .unwrap();
        assert_eq!(q.id, "q1");
        assert_eq!(q.kind, QuestionKind::TrueFalse);
        assert_eq!(q.timestamp, 5.0);
        assert_eq!(q.correct_answer.as_index(), Some(1));
    }

    #[test]
    fn numeric_id_becomes_string() {
        let q = Question::from_value(&json!({
            "id": 42, "type": "text", "question": "Capital?", "timestamp": 12.5,
            "correctAnswer": "Paris"
        }))
        .unwrap();
        assert_eq!(q.id, "42");
    }

    #[test]
    fn text_field_is_prompt_alias() {
        let q = Question::from_value(&json!({
            "id": "a", "type": "text", "text": "Alias prompt", "timestamp": 1
        }))
        .unwrap();
        assert_eq!(q.prompt, "Alias prompt");
    }

    #[test]
    fn numeric_string_timestamp_is_accepted() {
        let q = Question::from_value(&json!({
            "id": "a", "type": "text", "timestamp": " 7.25 "
        }))
        .unwrap();
        assert_eq!(q.timestamp, 7.25);
    }

    #[test]
    fn non_numeric_timestamp_is_rejected() {
        let r = Question::from_value(&json!({
            "id": "a", "type": "text", "timestamp": "soon"
        }));
        assert!(r.is_err());
    }

    #[test]
    fn negative_timestamp_is_rejected() {
        let r = Question::from_value(&json!({ "id": "a", "type": "text", "timestamp": -1 }));
        assert!(r.is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let r = Question::from_value(&json!({ "id": "a", "type": "essay", "timestamp": 1 }));
        assert!(r.is_err());
    }

    #[test]
    fn multiple_choice_without_options_is_rejected() {
        let r = Question::from_value(&json!({
            "id": "a", "type": "multiple_choice", "timestamp": 1, "correctAnswer": 0
        }));
        assert!(r.is_err());
    }

    #[test]
    fn correct_answers_field_is_fallback() {
        let q = Question::from_value(&json!({
            "id": "a", "type": "text", "timestamp": 1, "correctAnswers": ["x", "y"]
        }))
        .unwrap();
        assert_eq!(q.correct_answer, CorrectAnswer::List(vec!["x".into(), "y".into()]));
    }

    // --- answer encodings ---

    #[test]
    fn string_index_parses_for_choice() {
        assert_eq!(CorrectAnswer::Text(" 2 ".into()).as_index(), Some(2));
        assert_eq!(CorrectAnswer::Text("two".into()).as_index(), None);
    }

    #[test]
    fn comma_string_is_split_trimmed_and_lowered() {
        let a = CorrectAnswer::Text("Paris, paris ".into());
        assert_eq!(a.accepted(), vec!["Paris", "paris"]);
        assert_eq!(a.normalized(), vec!["paris", "paris"]);
    }

    #[test]
    fn empty_entries_are_dropped() {
        let a = CorrectAnswer::List(vec!["  ".into(), "Rome".into(), "".into()]);
        assert_eq!(a.normalized(), vec!["rome"]);
    }

    #[test]
    fn numeric_text_answer_is_accepted_as_string() {
        let q = Question::from_value(&json!({
            "id": "a", "type": "text", "timestamp": 1, "correctAnswer": 1989
        }))
        .unwrap();
        assert_eq!(q.correct_answer.normalized(), vec!["1989"]);
    }

    // --- list parsing ---

    #[test]
    fn list_skips_bad_records_and_sorts() {
        let body = json!({
            "success": true,
            "data": [
                { "id": "late", "type": "text", "timestamp": 30 },
                { "id": "broken", "type": "text", "timestamp": "??" },
                { "id": "early", "type": "true_false", "timestamp": 3, "correctAnswer": 0 }
            ]
        });
        let list = parse_question_list(&body);
        let ids: Vec<&str> = list.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn unsuccessful_body_yields_no_questions() {
        let body = json!({ "success": false, "data": [{ "id": "a", "type": "text", "timestamp": 1 }] });
        assert!(parse_question_list(&body).is_empty());
    }

    #[test]
    fn bare_array_body_is_accepted() {
        let body = json!([{ "id": "a", "type": "text", "timestamp": 1 }]);
        assert_eq!(parse_question_list(&body).len(), 1);
    }

    // --- image resolution ---

    fn with_image(url: Option<&str>, path: Option<&str>) -> Question {
        Question {
            id: "img".into(),
            kind: QuestionKind::Text,
            prompt: String::new(),
            image_url: url.map(Into::into),
            image_path: path.map(Into::into),
            timestamp: 0.0,
            options: Vec::new(),
            correct_answer: CorrectAnswer::Missing,
            explanation: None,
        }
    }

    #[test]
    fn relative_image_path_uses_api_host() {
        let q = with_image(None, Some("/uploads/q.png"));
        assert_eq!(
            q.resolve_image("https://api.example.com/api").as_deref(),
            Some("https://api.example.com/uploads/q.png")
        );
    }

    #[test]
    fn absolute_image_path_is_kept() {
        let q = with_image(None, Some("HTTPS://cdn.example.com/q.png"));
        assert_eq!(
            q.resolve_image("https://api.example.com/api").as_deref(),
            Some("HTTPS://cdn.example.com/q.png")
        );
    }

    #[test]
    fn image_url_wins_over_path() {
        let q = with_image(Some("https://a/b.png"), Some("c.png"));
        assert_eq!(q.resolve_image("https://x/api").as_deref(), Some("https://a/b.png"));
    }

    #[test]
    fn no_image_resolves_to_none() {
        assert!(with_image(None, None).resolve_image("https://x/api").is_none());
    }
}
