use mongodb::bson::{doc, to_bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::survey::Question,
    db::survey::{NewSurvey, Survey},
    mongodb::{hex_id, Id},
};

/// A survey as submitted for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurveySpec {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl SurveySpec {
    /// Reject specs with a blank title or malformed questions.
    pub fn validate(&self) -> Result<()> {
        check_title(&self.title)?;
        check_questions(&self.questions)
    }

    /// Turn this spec into a survey belonging to `owner`.
    pub fn into_survey(self, owner: Id) -> NewSurvey {
        NewSurvey {
            owner,
            title: self.title,
            questions: self.questions,
        }
    }
}

/// A partial update to a survey. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurveyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
}

impl SurveyPatch {
    /// Reject patches that would leave the survey malformed.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref title) = self.title {
            check_title(title)?;
        }
        if let Some(ref questions) = self.questions {
            check_questions(questions)?;
        }
        Ok(())
    }

    /// The `$set` update applying this patch, or `None` if it changes nothing.
    pub fn into_update(self) -> Result<Option<Document>> {
        let mut set = Document::new();
        if let Some(title) = self.title {
            set.insert("title", title);
        }
        if let Some(questions) = self.questions {
            set.insert("questions", to_bson(&questions)?);
        }
        if set.is_empty() {
            Ok(None)
        } else {
            Ok(Some(doc! { "$set": set }))
        }
    }
}

fn check_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::bad_request("Survey title must not be empty".to_string()));
    }
    Ok(())
}

fn check_questions(questions: &[Question]) -> Result<()> {
    questions
        .iter()
        .enumerate()
        .try_for_each(|(index, question)| question.check(index))
        .map_err(Error::bad_request)
}

/// An API-friendly survey description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyDescription {
    /// Survey unique ID.
    #[serde(with = "hex_id")]
    pub id: Id,
    /// ID of the user who created the survey.
    #[serde(with = "hex_id")]
    pub owner: Id,
    pub title: String,
    /// Questions, in order, with their current vote counts.
    pub questions: Vec<Question>,
}

impl From<Survey> for SurveyDescription {
    fn from(survey: Survey) -> Self {
        Self {
            id: survey.id,
            owner: survey.survey.owner,
            title: survey.survey.title,
            questions: survey.survey.questions,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl SurveySpec {
        pub fn example() -> Self {
            Self {
                title: "Customer satisfaction".to_string(),
                questions: vec![Question::example(), Question::example2()],
            }
        }
    }
}
