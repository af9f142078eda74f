use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::{response::SurveyResponse, survey::Survey},
    mongodb::{hex_id, Id},
};

/// A response as submitted by a respondent: one option index per question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseSpec {
    pub answers: Vec<u32>,
}

impl ResponseSpec {
    /// Check there is exactly one in-range answer for each of the survey's questions.
    pub fn check_against(&self, survey: &Survey) -> Result<()> {
        if self.answers.len() != survey.questions.len() {
            return Err(Error::bad_request(format!(
                "Survey {} has {} questions but {} answers were given",
                survey.id,
                survey.questions.len(),
                self.answers.len()
            )));
        }
        for (index, (&answer, question)) in self.answers.iter().zip(&survey.questions).enumerate() {
            if answer as usize >= question.options.len() {
                return Err(Error::bad_request(format!(
                    "Answer {answer} to question {index} is out of range"
                )));
            }
        }
        Ok(())
    }
}

/// An API-friendly response description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    #[serde(with = "hex_id")]
    pub survey_id: Id,
    #[serde(with = "hex_id::option")]
    pub respondent: Option<Id>,
    pub answers: Vec<u32>,
    pub submitted_at: DateTime<Utc>,
}

impl From<SurveyResponse> for ResponseDescription {
    fn from(response: SurveyResponse) -> Self {
        Self {
            id: response.id,
            survey_id: response.response.survey_id,
            respondent: response.response.respondent,
            answers: response.response.answers,
            submitted_at: response.response.submitted_at,
        }
    }
}
