use crate::labels::Labels;
use crate::question::{CorrectAnswer, Question, QuestionKind};

/// What the learner submitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// 0-indexed option for choice questions.
    Choice { index: usize },
    /// Free text, trimmed before comparison.
    Text { text: String },
}

/// Result of checking a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub correct: bool,
    /// Human-readable correct answer.
    pub correct_answer: String,
    pub explanation: Option<String>,
}

/// Check a response against the question's correct answer.
///
/// Exact match only: choice questions compare indices, text questions compare
/// the trimmed, lower-cased input against the accepted list.
pub fn evaluate(question: &Question, response: &Response, labels: &Labels) -> Evaluation {
    let correct = match (question.kind.is_choice(), response) {
        (true, Response::Choice { index }) => {
            question.correct_answer.as_index() == Some(*index as i64)
        }
        (false, Response::Text { text }) => {
            let input = text.trim().to_lowercase();
            !input.is_empty() && question.correct_answer.normalized().contains(&input)
        }
        _ => false,
    };

    Evaluation {
        correct,
        correct_answer: correct_answer_text(question, labels),
        explanation: question.explanation.clone(),
    }
}

/// Display text for the correct answer of a question.
pub fn correct_answer_text(question: &Question, labels: &Labels) -> String {
    match question.kind {
        QuestionKind::TrueFalse => {
            if question.correct_answer.as_index() == Some(1) {
                labels.affirmative.clone()
            } else {
                labels.negative.clone()
            }
        }
        QuestionKind::MultipleChoice => {
            let by_index = question
                .correct_answer
                .as_index()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| question.options.get(i));
            match (by_index, &question.correct_answer) {
                (Some(label), _) => label.clone(),
                (None, CorrectAnswer::Text(s)) => s.clone(),
                _ => String::new(),
            }
        }
        QuestionKind::Text => question.correct_answer.accepted().join(&labels.list_separator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind, options: &[&str], answer: CorrectAnswer) -> Question {
        Question {
            id: "q".into(),
            kind,
            prompt: "?".into(),
            image_url: None,
            image_path: None,
            timestamp: 10.0,
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: answer,
            explanation: Some("because".into()),
        }
    }

    fn text(s: &str) -> Response {
        Response::Text { text: s.into() }
    }

    fn choice(index: usize) -> Response {
        Response::Choice { index }
    }

    // --- text questions ---

    #[test]
    fn comma_answer_accepts_case_insensitive_input() {
        let q = question(QuestionKind::Text, &[], CorrectAnswer::Text("Paris, paris ".into()));
        let labels = Labels::default();
        assert!(evaluate(&q, &text("PARIS"), &labels).correct);
        assert!(evaluate(&q, &text("  paris  "), &labels).correct);
    }

    #[test]
    fn near_miss_is_rejected() {
        let q = question(QuestionKind::Text, &[], CorrectAnswer::Text("Paris, paris ".into()));
        assert!(!evaluate(&q, &text("Pariss"), &Labels::default()).correct);
    }

    #[test]
    fn list_answer_matches_any_entry() {
        let q = question(
            QuestionKind::Text,
            &[],
            CorrectAnswer::List(vec!["Rome".into(), " Roma ".into()]),
        );
        assert!(evaluate(&q, &text("roma"), &Labels::default()).correct);
    }

    #[test]
    fn empty_text_never_matches() {
        let q = question(QuestionKind::Text, &[], CorrectAnswer::Text("a,,b".into()));
        assert!(!evaluate(&q, &text("   "), &Labels::default()).correct);
    }

    #[test]
    fn text_display_joins_with_locale_separator() {
        let q = question(QuestionKind::Text, &[], CorrectAnswer::Text("Paris, paris ".into()));
        let eval = evaluate(&q, &text("x"), &Labels::default());
        assert_eq!(eval.correct_answer, "Paris, paris");
    }

    // --- true/false ---

    #[test]
    fn true_false_index_one_is_affirmative() {
        let q = question(QuestionKind::TrueFalse, &[], CorrectAnswer::Index(1));
        let labels = Labels::default();
        let eval = evaluate(&q, &choice(0), &labels);
        assert!(!eval.correct);
        assert_eq!(eval.correct_answer, labels.affirmative);
        assert!(evaluate(&q, &choice(1), &labels).correct);
    }

    #[test]
    fn true_false_index_zero_is_negative() {
        let q = question(QuestionKind::TrueFalse, &[], CorrectAnswer::Text("0".into()));
        let labels = Labels::default();
        let eval = evaluate(&q, &choice(0), &labels);
        assert!(eval.correct);
        assert_eq!(eval.correct_answer, labels.negative);
    }

    // --- multiple choice ---

    #[test]
    fn multiple_choice_compares_index() {
        let q = question(QuestionKind::MultipleChoice, &["a", "b", "c"], CorrectAnswer::Index(2));
        let labels = Labels::default();
        let right = evaluate(&q, &choice(2), &labels);
        assert!(right.correct);
        assert_eq!(right.correct_answer, "c");
        assert!(!evaluate(&q, &choice(1), &labels).correct);
    }

    #[test]
    fn out_of_range_index_falls_back_to_raw_string() {
        let q = question(QuestionKind::MultipleChoice, &["a"], CorrectAnswer::Text("b".into()));
        let eval = evaluate(&q, &choice(0), &Labels::default());
        assert!(!eval.correct);
        assert_eq!(eval.correct_answer, "b");
    }

    #[test]
    fn mismatched_response_kind_is_incorrect() {
        let q = question(QuestionKind::MultipleChoice, &["a"], CorrectAnswer::Index(0));
        assert!(!evaluate(&q, &text("0"), &Labels::default()).correct);
    }

    #[test]
    fn explanation_is_passed_through() {
        let q = question(QuestionKind::TrueFalse, &[], CorrectAnswer::Index(1));
        let eval = evaluate(&q, &choice(1), &Labels::default());
        assert_eq!(eval.explanation.as_deref(), Some("because"));
    }
}
