use std::ops::Deref;

use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::survey::Question,
    mongodb::{Coll, Id},
};

/// Core survey data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyCore {
    /// The user who created the survey.
    pub owner: Id,
    pub title: String,
    pub questions: Vec<Question>,
}

/// A survey without an ID.
pub type NewSurvey = SurveyCore;

/// A survey from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub survey: SurveyCore,
}

impl Deref for Survey {
    type Target = SurveyCore;

    fn deref(&self) -> &Self::Target {
        &self.survey
    }
}

impl Survey {
    /// Filter matching all surveys belonging to `owner`.
    pub fn owned_by(owner: Id) -> Document {
        doc! { "owner": owner }
    }

    /// Fetch a survey, insisting that `user` owns it.
    ///
    /// A missing survey is a 404; someone else's survey is a 401.
    pub async fn find_owned(surveys: &Coll<Survey>, survey_id: Id, user: Id) -> Result<Survey> {
        let survey = Self::find(surveys, survey_id).await?;
        if survey.owner != user {
            return Err(Error::unauthorized(format!(
                "User {user} does not own survey {survey_id}"
            )));
        }
        Ok(survey)
    }

    /// Fetch a survey regardless of owner.
    pub async fn find(surveys: &Coll<Survey>, survey_id: Id) -> Result<Survey> {
        surveys
            .find_one(survey_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Survey {survey_id}")))
    }

    /// Update incrementing the vote count of each chosen option,
    /// where `answers[i]` is the chosen option of question `i`.
    pub fn vote_increments(answers: &[u32]) -> Document {
        let mut increments = Document::new();
        for (question, option) in answers.iter().enumerate() {
            increments.insert(format!("questions.{question}.options.{option}.votes"), 1);
        }
        doc! { "$inc": increments }
    }
}
