use serde::{Deserialize, Serialize};

/// A single survey question. Option order is significant and preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Question {
    /// Question text.
    pub label: String,
    /// Possible answers, in display order.
    pub options: Vec<AnswerOption>,
}

/// One possible answer to a question, and how many responses chose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerOption {
    pub label: String,
    #[serde(default)]
    pub votes: u32,
}

impl Question {
    /// Check the question is well-formed, describing the first problem found.
    /// `index` is the question's position in its survey, used in the message.
    pub fn check(&self, index: usize) -> Result<(), String> {
        if self.label.trim().is_empty() {
            return Err(format!("Question {index} has an empty label"));
        }
        if self.options.is_empty() {
            return Err(format!("Question {index} has no options"));
        }
        if let Some(option) = self
            .options
            .iter()
            .position(|option| option.label.trim().is_empty())
        {
            return Err(format!("Option {option} of question {index} has an empty label"));
        }
        Ok(())
    }
}
