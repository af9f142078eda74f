use log::warn;
use mongodb::{bson::doc, options::FindOptions, Client, ClientSession};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            response::{ResponseDescription, ResponseSpec},
        },
        db::{
            response::{NewSurveyResponse, SurveyResponse},
            survey::Survey,
        },
        mongodb::{commit_with_retry, Coll, Id, IdParam},
    },
};

use super::{json_body, method_not_allowed, resolve_id, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![
        list_responses,
        submit_response,
        put_responses,
        delete_responses,
        get_response,
        post_response,
        put_response,
        delete_response,
    ]
}

#[get("/api/surveys/<survey_id>/responses")]
async fn list_responses(
    token: AuthToken,
    survey_id: IdParam,
    surveys: Coll<Survey>,
    responses: Coll<SurveyResponse>,
) -> Result<Json<Vec<ResponseDescription>>> {
    let survey_id = resolve_id(survey_id, "Survey")?;
    Survey::find_owned(&surveys, survey_id, token.id).await?;

    // In submission order.
    let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
    let all: Vec<ResponseDescription> = responses
        .find(SurveyResponse::for_survey(survey_id), options)
        .await?
        .map_ok(ResponseDescription::from)
        .try_collect()
        .await?;
    Ok(Json(all))
}

/// Anyone may respond to a survey; logged-in respondents are recorded.
#[post("/api/surveys/<survey_id>/responses", data = "<spec>")]
async fn submit_response(
    token: Option<AuthToken>,
    survey_id: IdParam,
    spec: JsonBody<'_, ResponseSpec>,
    surveys: Coll<Survey>,
    new_responses: Coll<NewSurveyResponse>,
    responses: Coll<SurveyResponse>,
    db_client: &State<Client>,
) -> Result<(Status, Json<ResponseDescription>)> {
    let survey_id = resolve_id(survey_id, "Survey")?;
    let spec = json_body(spec)?;

    let response = NewSurveyResponse::new(survey_id, token.map(|t| t.id), spec.answers.clone());

    // Rerun after a write conflict with a concurrent submission.
    let stored = loop {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;
        let attempt = match record_response(
            &mut session,
            &spec,
            &response,
            &surveys,
            &new_responses,
            &responses,
        )
        .await
        {
            Ok(stored) => commit_with_retry(&mut session)
                .await
                .map(|()| stored)
                .map_err(Error::from),
            Err(e) => Err(e),
        };
        match attempt {
            Err(e) if e.is_transient() => {
                warn!("Retrying response to survey {survey_id}: {e}");
            }
            attempt => break attempt?,
        }
    };

    Ok((Status::Created, Json(stored.into())))
}

/// Check a response against its survey, store it, and count its votes,
/// all within the session's transaction.
async fn record_response(
    session: &mut ClientSession,
    spec: &ResponseSpec,
    response: &NewSurveyResponse,
    surveys: &Coll<Survey>,
    new_responses: &Coll<NewSurveyResponse>,
    responses: &Coll<SurveyResponse>,
) -> Result<SurveyResponse> {
    let survey_id = response.survey_id;
    let survey = surveys
        .find_one_with_session(survey_id.as_doc(), None, session)
        .await?
        .ok_or_else(|| Error::not_found(format!("Survey {survey_id}")))?;
    spec.check_against(&survey)?;

    let response_id: Id = new_responses
        .insert_one_with_session(response, None, session)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();
    surveys
        .update_one_with_session(
            survey_id.as_doc(),
            Survey::vote_increments(&response.answers),
            None,
            session,
        )
        .await?;

    responses
        .find_one_with_session(response_id.as_doc(), None, session)
        .await?
        .ok_or_else(|| Error::not_found(format!("Response {response_id}")))
}

#[put("/api/surveys/<_survey_id>/responses")]
fn put_responses(_survey_id: &str) -> Error {
    method_not_allowed("PUT", "/api/surveys/<survey_id>/responses")
}

#[delete("/api/surveys/<_survey_id>/responses")]
fn delete_responses(_survey_id: &str) -> Error {
    method_not_allowed("DELETE", "/api/surveys/<survey_id>/responses")
}

#[get("/api/surveys/<survey_id>/responses/<response_id>")]
async fn get_response(
    token: AuthToken,
    survey_id: IdParam,
    response_id: IdParam,
    surveys: Coll<Survey>,
    responses: Coll<SurveyResponse>,
) -> Result<Json<ResponseDescription>> {
    let survey_id = resolve_id(survey_id, "Survey")?;
    Survey::find_owned(&surveys, survey_id, token.id).await?;

    let response_id = resolve_id(response_id, "Response")?;
    let response = responses
        .find_one(SurveyResponse::in_survey(survey_id, response_id), None)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("Response {response_id} to survey {survey_id}"))
        })?;
    Ok(Json(response.into()))
}

#[post("/api/surveys/<_survey_id>/responses/<_response_id>")]
fn post_response(_survey_id: &str, _response_id: &str) -> Error {
    method_not_allowed("POST", "/api/surveys/<survey_id>/responses/<response_id>")
}

#[put("/api/surveys/<_survey_id>/responses/<_response_id>")]
fn put_response(_survey_id: &str, _response_id: &str) -> Error {
    method_not_allowed("PUT", "/api/surveys/<survey_id>/responses/<response_id>")
}

#[delete("/api/surveys/<_survey_id>/responses/<_response_id>")]
fn delete_response(_survey_id: &str, _response_id: &str) -> Error {
    method_not_allowed("DELETE", "/api/surveys/<survey_id>/responses/<response_id>")
}
