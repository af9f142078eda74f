use log::warn;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            survey::{SurveyDescription, SurveyPatch, SurveySpec},
        },
        db::{
            response::SurveyResponse,
            survey::{NewSurvey, Survey},
        },
        mongodb::{commit_with_retry, Coll, Id, IdParam},
    },
};

use super::{json_body, method_not_allowed, resolve_id, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![
        list_surveys,
        create_survey,
        put_surveys,
        delete_surveys,
        get_survey,
        update_survey,
        delete_survey,
        post_survey,
    ]
}

#[get("/api/surveys")]
async fn list_surveys(
    token: AuthToken,
    surveys: Coll<Survey>,
) -> Result<Json<Vec<SurveyDescription>>> {
    // Oldest first.
    let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
    let owned: Vec<SurveyDescription> = surveys
        .find(Survey::owned_by(token.id), options)
        .await?
        .map_ok(SurveyDescription::from)
        .try_collect()
        .await?;
    Ok(Json(owned))
}

#[post("/api/surveys", data = "<spec>")]
async fn create_survey(
    token: AuthToken,
    spec: JsonBody<'_, SurveySpec>,
    new_surveys: Coll<NewSurvey>,
    surveys: Coll<Survey>,
) -> Result<(Status, Json<SurveyDescription>)> {
    let spec = json_body(spec)?;
    spec.validate()?;

    let new_id: Id = new_surveys
        .insert_one(spec.into_survey(token.id), None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();

    let survey = Survey::find(&surveys, new_id).await?;
    Ok((Status::Created, Json(survey.into())))
}

#[put("/api/surveys")]
fn put_surveys() -> Error {
    method_not_allowed("PUT", "/api/surveys")
}

#[delete("/api/surveys")]
fn delete_surveys() -> Error {
    method_not_allowed("DELETE", "/api/surveys")
}

#[get("/api/surveys/<survey_id>")]
async fn get_survey(
    token: AuthToken,
    survey_id: IdParam,
    surveys: Coll<Survey>,
) -> Result<Json<SurveyDescription>> {
    let survey_id = resolve_id(survey_id, "Survey")?;
    let survey = Survey::find_owned(&surveys, survey_id, token.id).await?;
    Ok(Json(survey.into()))
}

#[put("/api/surveys/<survey_id>", data = "<patch>")]
async fn update_survey(
    token: AuthToken,
    survey_id: IdParam,
    patch: JsonBody<'_, SurveyPatch>,
    surveys: Coll<Survey>,
) -> Result<Json<SurveyDescription>> {
    let survey_id = resolve_id(survey_id, "Survey")?;
    let survey = Survey::find_owned(&surveys, survey_id, token.id).await?;

    let patch = json_body(patch)?;
    patch.validate()?;
    let update = match patch.into_update()? {
        Some(update) => update,
        None => return Ok(Json(survey.into())),
    };

    // Concurrent updates are last-write-wins.
    let filter = doc! {
        "_id": survey_id,
        "owner": token.id,
    };
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = surveys
        .find_one_and_update(filter, update, options)
        .await?
        .ok_or_else(|| Error::not_found(format!("Survey {survey_id}")))?;

    Ok(Json(updated.into()))
}

#[delete("/api/surveys/<survey_id>")]
async fn delete_survey(
    token: AuthToken,
    survey_id: IdParam,
    surveys: Coll<Survey>,
    responses: Coll<SurveyResponse>,
    db_client: &State<Client>,
) -> Result<Json<SurveyDescription>> {
    let survey_id = resolve_id(survey_id, "Survey")?;
    let survey = Survey::find_owned(&surveys, survey_id, token.id).await?;

    // The survey and its responses go together. Rerun after a write
    // conflict with a concurrent submission.
    loop {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;
        let attempt = match remove_survey(&mut session, survey_id, &surveys, &responses).await {
            Ok(()) => commit_with_retry(&mut session).await.map_err(Error::from),
            Err(e) => Err(e),
        };
        match attempt {
            Err(e) if e.is_transient() => warn!("Retrying deletion of survey {survey_id}: {e}"),
            attempt => break attempt?,
        }
    }

    Ok(Json(survey.into()))
}

/// Delete a survey and every response to it within the session's transaction.
async fn remove_survey(
    session: &mut ClientSession,
    survey_id: Id,
    surveys: &Coll<Survey>,
    responses: &Coll<SurveyResponse>,
) -> Result<()> {
    surveys
        .delete_one_with_session(survey_id.as_doc(), None, session)
        .await?;
    responses
        .delete_many_with_session(SurveyResponse::for_survey(survey_id), None, session)
        .await?;
    Ok(())
}

#[post("/api/surveys/<_survey_id>")]
fn post_survey(_survey_id: &str) -> Error {
    method_not_allowed("POST", "/api/surveys/<survey_id>")
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json::json,
    };

    use crate::model::{
        api::{auth::AUTH_TOKEN_COOKIE, credentials::UserCredentials},
        common::survey::Question,
        db::{response::NewSurveyResponse, user::NewUser},
    };

    use super::*;

    /// Create the example survey through the API, returning its description.
    async fn create_example(client: &Client) -> SurveyDescription {
        let response = client
            .post(uri!(create_survey))
            .header(ContentType::JSON)
            .body(json!(SurveySpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        response.into_json().await.unwrap()
    }

    /// Log the client in as the second example user.
    async fn login_as_other_user(client: &Client, new_users: &Coll<NewUser>) {
        new_users.insert_one(NewUser::example2(), None).await.unwrap();
        let response = client
            .post(uri!(crate::api::auth::login))
            .header(ContentType::JSON)
            .body(json!(UserCredentials::example2()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    fn assert_json(response: &LocalResponse<'_>, status: Status) {
        assert_eq!(status, response.status());
        assert_eq!(Some(ContentType::JSON), response.content_type());
    }

    #[backend_test(user)]
    async fn list_own_surveys(client: Client, new_surveys: Coll<NewSurvey>) {
        let created = create_example(&client).await;
        // Someone else's survey must not be listed.
        new_surveys
            .insert_one(NewSurvey::example(Id::new()), None)
            .await
            .unwrap();

        let response = client.get(uri!(list_surveys)).dispatch().await;
        assert_json(&response, Status::Ok);
        let listed: Vec<SurveyDescription> = response.into_json().await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[backend_test(user)]
    async fn list_surveys_empty(client: Client) {
        let response = client.get(uri!(list_surveys)).dispatch().await;
        assert_json(&response, Status::Ok);
        let listed: Vec<SurveyDescription> = response.into_json().await.unwrap();
        assert!(listed.is_empty());
    }

    #[backend_test]
    async fn list_surveys_unauthorized(client: Client) {
        let response = client.get(uri!(list_surveys)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(user)]
    async fn create_survey_valid(client: Client, surveys: Coll<Survey>) {
        let created = create_example(&client).await;
        let expected = SurveySpec::example();
        assert_eq!(created.title, expected.title);
        assert_eq!(created.questions, expected.questions);

        // Owned by the logged-in user.
        let stored = Survey::find(&surveys, created.id).await.unwrap();
        assert_eq!(stored.owner, created.owner);
        let jar = client.cookies();
        let cookie = jar.get(AUTH_TOKEN_COOKIE).unwrap();
        let token = AuthToken::from_cookie(cookie, client.rocket().state().unwrap()).unwrap();
        assert_eq!(stored.owner, token.id);
    }

    #[backend_test(user)]
    async fn create_survey_bad_request(client: Client, surveys: Coll<Survey>) {
        let bodies = [
            json!({"invalid": "12345678910"}),
            json!({"title": ""}),
            json!({"title": "No options", "questions": [{"label": "Why?", "options": []}]}),
            json!({"title": "Negative", "questions": [{"label": "Q", "options": [{"label": "A", "votes": -1}]}]}),
        ];
        for body in bodies {
            let response = client
                .post(uri!(create_survey))
                .header(ContentType::JSON)
                .body(body.to_string())
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status(), "body: {body}");
        }

        let response = client
            .post(uri!(create_survey))
            .header(ContentType::JSON)
            .body("this is not json")
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        assert_eq!(0, surveys.count_documents(None, None).await.unwrap());
    }

    #[backend_test]
    async fn create_survey_unauthorized(client: Client, surveys: Coll<Survey>) {
        let response = client
            .post(uri!(create_survey))
            .header(ContentType::JSON)
            .body(json!(SurveySpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(0, surveys.count_documents(None, None).await.unwrap());
    }

    #[backend_test]
    async fn collection_methods_not_allowed(client: Client) {
        let response = client.put(uri!(put_surveys)).dispatch().await;
        assert_eq!(Status::MethodNotAllowed, response.status());

        let response = client.delete(uri!(delete_surveys)).dispatch().await;
        assert_eq!(Status::MethodNotAllowed, response.status());
    }

    #[backend_test(user)]
    async fn get_survey_after_create(client: Client) {
        let created = create_example(&client).await;

        let response = client.get(uri!(get_survey(created.id))).dispatch().await;
        assert_json(&response, Status::Ok);
        let fetched: SurveyDescription = response.into_json().await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.title, SurveySpec::example().title);
        assert_eq!(fetched.questions, SurveySpec::example().questions);
    }

    #[backend_test(user)]
    async fn get_survey_not_found(client: Client) {
        let response = client.get("/api/surveys/doesnotexist").dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get(uri!(get_survey(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn get_survey_unauthorized(client: Client, new_surveys: Coll<NewSurvey>) {
        let id: Id = new_surveys
            .insert_one(NewSurvey::example(Id::new()), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let response = client.get(uri!(get_survey(id))).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(user)]
    async fn update_survey_title_only(client: Client) {
        let created = create_example(&client).await;

        let response = client
            .put(uri!(update_survey(created.id)))
            .header(ContentType::JSON)
            .body(json!({"title": "another title"}).to_string())
            .dispatch()
            .await;
        assert_json(&response, Status::Ok);
        let updated: SurveyDescription = response.into_json().await.unwrap();
        assert_eq!(updated.title, "another title");
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.owner, created.owner);
        assert_eq!(updated.questions, created.questions);

        // And it persisted.
        let fetched: SurveyDescription = client
            .get(uri!(get_survey(created.id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(fetched, updated);
    }

    #[backend_test(user)]
    async fn update_survey_questions(client: Client) {
        let created = create_example(&client).await;
        let questions = vec![Question::example2()];

        let response = client
            .put(uri!(update_survey(created.id)))
            .header(ContentType::JSON)
            .body(json!({ "questions": questions }).to_string())
            .dispatch()
            .await;
        assert_json(&response, Status::Ok);
        let updated: SurveyDescription = response.into_json().await.unwrap();
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.questions, questions);
    }

    #[backend_test(user)]
    async fn update_survey_empty_patch(client: Client) {
        let created = create_example(&client).await;

        let response = client
            .put(uri!(update_survey(created.id)))
            .header(ContentType::JSON)
            .body("{}")
            .dispatch()
            .await;
        assert_json(&response, Status::Ok);
        let updated: SurveyDescription = response.into_json().await.unwrap();
        assert_eq!(updated, created);
    }

    #[backend_test(user)]
    async fn update_survey_bad_request(client: Client) {
        let created = create_example(&client).await;

        for body in [json!({"invalid": "12345678910"}), json!({"title": "  "})] {
            let response = client
                .put(uri!(update_survey(created.id)))
                .header(ContentType::JSON)
                .body(body.to_string())
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status());
        }
    }

    #[backend_test(user)]
    async fn update_survey_not_found(client: Client) {
        let response = client
            .put(uri!(update_survey(Id::new())))
            .header(ContentType::JSON)
            .body(json!({"title": "another title"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn update_survey_unauthorized(
        client: Client,
        new_surveys: Coll<NewSurvey>,
        surveys: Coll<Survey>,
    ) {
        let id: Id = new_surveys
            .insert_one(NewSurvey::example(Id::new()), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let response = client
            .put(uri!(update_survey(id)))
            .header(ContentType::JSON)
            .body(json!({"title": "x"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        let stored = Survey::find(&surveys, id).await.unwrap();
        assert_eq!(stored.title, NewSurvey::example(id).title);
    }

    #[backend_test(user)]
    async fn update_survey_not_owner(client: Client, new_users: Coll<NewUser>) {
        let created = create_example(&client).await;
        login_as_other_user(&client, &new_users).await;

        let response = client
            .put(uri!(update_survey(created.id)))
            .header(ContentType::JSON)
            .body(json!({"title": "hijacked"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(user)]
    async fn delete_survey_then_not_found(
        client: Client,
        new_responses: Coll<NewSurveyResponse>,
        responses: Coll<SurveyResponse>,
    ) {
        let created = create_example(&client).await;
        new_responses
            .insert_one(NewSurveyResponse::example(created.id), None)
            .await
            .unwrap();

        let response = client
            .delete(uri!(delete_survey(created.id)))
            .dispatch()
            .await;
        assert_json(&response, Status::Ok);
        let deleted: SurveyDescription = response.into_json().await.unwrap();
        assert_eq!(deleted.id, created.id);

        let response = client.get(uri!(get_survey(created.id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        // Its responses went with it.
        let remaining = responses
            .count_documents(SurveyResponse::for_survey(created.id), None)
            .await
            .unwrap();
        assert_eq!(0, remaining);
    }

    #[backend_test(user)]
    async fn delete_survey_not_found(client: Client) {
        let response = client.delete(uri!(delete_survey(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(user)]
    async fn delete_survey_not_owner(
        client: Client,
        new_users: Coll<NewUser>,
        surveys: Coll<Survey>,
    ) {
        let created = create_example(&client).await;
        login_as_other_user(&client, &new_users).await;

        let response = client
            .delete(uri!(delete_survey(created.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(Survey::find(&surveys, created.id).await.is_ok());
    }

    #[backend_test]
    async fn delete_survey_unauthorized(client: Client) {
        let response = client.delete(uri!(delete_survey(Id::new()))).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn post_survey_not_allowed(client: Client) {
        let response = client
            .post(format!("/api/surveys/{}", Id::new()))
            .dispatch()
            .await;
        assert_eq!(Status::MethodNotAllowed, response.status());
    }
}
