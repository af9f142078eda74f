use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core response data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponseCore {
    /// The survey this responds to.
    pub survey_id: Id,
    /// Who submitted it, if they were logged in.
    pub respondent: Option<Id>,
    /// `answers[i]` is the index of the option chosen for question `i`.
    pub answers: Vec<u32>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
}

impl SurveyResponseCore {
    /// A response submitted now.
    pub fn new(survey_id: Id, respondent: Option<Id>, answers: Vec<u32>) -> Self {
        Self {
            survey_id,
            respondent,
            answers,
            submitted_at: Utc::now(),
        }
    }
}

/// A response without an ID.
pub type NewSurveyResponse = SurveyResponseCore;

/// A response from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponse {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub response: SurveyResponseCore,
}

impl Deref for SurveyResponse {
    type Target = SurveyResponseCore;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}

impl SurveyResponse {
    /// Filter matching every response to the given survey.
    pub fn for_survey(survey_id: Id) -> Document {
        doc! { "survey_id": survey_id }
    }

    /// Filter matching one response, only if it belongs to the given survey.
    pub fn in_survey(survey_id: Id, response_id: Id) -> Document {
        doc! {
            "_id": response_id,
            "survey_id": survey_id,
        }
    }
}
