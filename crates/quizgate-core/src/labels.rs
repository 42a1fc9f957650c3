use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User-facing strings the engine sends to the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    /// Label for true/false option index 1.
    pub affirmative: String,
    /// Label for true/false option index 0.
    pub negative: String,
    /// Continue button while the gate is closed.
    pub answer_to_continue: String,
    /// Continue button once the question may be dismissed.
    pub continue_video: String,
    pub correct_title: String,
    pub incorrect_title: String,
    pub correct_answer_prefix: String,
    pub no_explanation: String,
    /// Prefix for marker tooltips ("Question 3 • 1:05").
    pub marker_prefix: String,
    pub marker_at: String,
    pub answered_suffix: String,
    /// Joins multiple accepted text answers for display.
    pub list_separator: String,
}

/// Return the built-in labels for a locale, or `None` if there is no such locale.
pub fn builtin_labels(name: &str) -> Option<Labels> {
    match name {
        "en" => Some(labels_en()),
        "ar" => Some(labels_ar()),
        _ => None,
    }
}

fn labels_en() -> Labels {
    Labels {
        affirmative: "True".into(),
        negative: "False".into(),
        answer_to_continue: "Answer to continue".into(),
        continue_video: "Continue video".into(),
        correct_title: "Correct answer!".into(),
        incorrect_title: "Wrong answer".into(),
        correct_answer_prefix: "Correct answer:".into(),
        no_explanation: "No explanation available.".into(),
        marker_prefix: "Question".into(),
        marker_at: "at".into(),
        answered_suffix: "(answered)".into(),
        list_separator: ", ".into(),
    }
}

fn labels_ar() -> Labels {
    Labels {
        affirmative: "صحيح".into(),
        negative: "خطأ".into(),
        answer_to_continue: "الإجابة للمتابعة".into(),
        continue_video: "متابعة الفيديو".into(),
        correct_title: "إجابة صحيحة! 🎉".into(),
        incorrect_title: "إجابة خاطئة 😔".into(),
        correct_answer_prefix: "الإجابة الصحيحة:".into(),
        no_explanation: "لا يوجد شرح متاح.".into(),
        marker_prefix: "سؤال".into(),
        marker_at: "عند".into(),
        answered_suffix: "(تمت الإجابة)".into(),
        list_separator: "، ".into(),
    }
}

impl Labels {
    /// Apply per-key overrides from config. Unknown keys are returned so the caller can warn.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> (Self, Vec<String>) {
        let mut unknown = Vec::new();
        for (key, value) in overrides {
            let slot = match key.as_str() {
                "affirmative" => &mut self.affirmative,
                "negative" => &mut self.negative,
                "answer_to_continue" => &mut self.answer_to_continue,
                "continue_video" => &mut self.continue_video,
                "correct_title" => &mut self.correct_title,
                "incorrect_title" => &mut self.incorrect_title,
                "correct_answer_prefix" => &mut self.correct_answer_prefix,
                "no_explanation" => &mut self.no_explanation,
                "marker_prefix" => &mut self.marker_prefix,
                "marker_at" => &mut self.marker_at,
                "answered_suffix" => &mut self.answered_suffix,
                "list_separator" => &mut self.list_separator,
                _ => {
                    unknown.push(key.clone());
                    continue;
                }
            };
            *slot = value.clone();
        }
        unknown.sort();
        (self, unknown)
    }

    /// Option labels for a true/false question, index 0 first.
    pub fn true_false_options(&self) -> Vec<String> {
        vec![self.negative.clone(), self.affirmative.clone()]
    }
}

impl Default for Labels {
    fn default() -> Self {
        labels_en()
    }
}
