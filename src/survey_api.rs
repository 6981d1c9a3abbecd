//! REST client for the survey backend.
//!
//! Two calls matter to a live session: fetching the survey definition that
//! seeds the system instruction, and persisting the respondent's answers
//! when the model invokes the save tool. Authentication is delegated to an
//! injected [`IdentityProvider`].

use crate::auth::IdentityProvider;
use crate::error::LiveError;
use crate::survey::Survey;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// The backend wraps the survey definition in an envelope object.
#[derive(Deserialize)]
struct SurveyEnvelope {
    survey: Survey,
}

#[derive(Clone)]
pub struct SurveyApi {
    http: reqwest::Client,
    base: Url,
    identity: Arc<dyn IdentityProvider>,
}

impl SurveyApi {
    pub fn new(base: impl AsRef<str>, identity: Arc<dyn IdentityProvider>) -> Result<Self, LiveError> {
        let base = Url::parse(base.as_ref())
            .map_err(|e| LiveError::Config(format!("invalid survey backend url: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            identity,
        })
    }

    /// `GET /api/survey/{id}`, unwrapping the `{survey: ...}` envelope.
    pub async fn fetch(&self, survey_id: &str) -> Result<Survey, LiveError> {
        let url = self.survey_url(survey_id)?;
        debug!(%url, "fetching survey definition");
        let request = self.authorize(self.http.get(url));
        let envelope: SurveyEnvelope = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.survey)
    }

    /// `POST /api/survey/{id}` with `{answers}`: persist one respondent's
    /// answers, keyed by question id.
    pub async fn submit(&self, survey_id: &str, answers: &Value) -> Result<(), LiveError> {
        let url = self.survey_url(survey_id)?;
        let request = self.authorize(self.http.post(url)).json(&json!({ "answers": answers }));
        request.send().await?.error_for_status()?;
        info!(survey_id, "survey answers persisted");
        Ok(())
    }

    fn survey_url(&self, survey_id: &str) -> Result<Url, LiveError> {
        self.base
            .join(&format!("api/survey/{survey_id}"))
            .map_err(|e| LiveError::Config(format!("invalid survey id: {e}")))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.identity.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Anonymous, StaticToken};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn survey_body() -> Value {
        json!({
            "survey": {
                "id": "s1",
                "title": "Course feedback",
                "system_prompt": "Intro.",
                "questions": [
                    {"id": "q1", "question": "How are you?", "elaborate": true}
                ]
            }
        })
    }

    #[tokio::test]
    async fn fetch_unwraps_survey_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/survey/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(survey_body()))
            .mount(&server)
            .await;

        let api = SurveyApi::new(server.uri(), Arc::new(Anonymous)).unwrap();
        let survey = api.fetch("s1").await.unwrap();
        assert_eq!(survey.id, "s1");
        assert_eq!(survey.system_prompt, "Intro.");
        assert_eq!(survey.questions.len(), 1);
    }

    #[tokio::test]
    async fn fetch_sends_bearer_header_when_token_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/survey/s1"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(survey_body()))
            .expect(1)
            .mount(&server)
            .await;

        let api = SurveyApi::new(
            server.uri(),
            Arc::new(StaticToken::new("token-123")),
        )
        .unwrap();
        api.fetch("s1").await.unwrap();
    }

    #[tokio::test]
    async fn submit_posts_answers_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/survey/s1"))
            .and(body_json(json!({
                "answers": {"q1": "fine", "q2": "because"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = SurveyApi::new(server.uri(), Arc::new(Anonymous)).unwrap();
        api.submit("s1", &json!({"q1": "fine", "q2": "because"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn backend_error_status_surfaces_as_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/survey/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
            .mount(&server)
            .await;

        let api = SurveyApi::new(server.uri(), Arc::new(Anonymous)).unwrap();
        let result = api.fetch("missing").await;
        assert!(matches!(result, Err(LiveError::Http(_))));
    }
}
