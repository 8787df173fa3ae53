//! Attempt store client over `fetch`.
use careersim_progress::{AttemptId, AttemptStore, RemoteProgress};
use wasm_bindgen::JsValue;
use web_sys::{Headers, Request, RequestInit, RequestMode, Response};

use crate::dom;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("attempt store returned HTTP {status}")]
    Status { status: u16 },
    #[error("invalid progress payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl RemoteError {
    fn from_js(value: &JsValue) -> Self {
        Self::Network(dom::js_error_message(value))
    }
}

/// Map an HTTP status to the error it represents, if any.
///
/// # Errors
/// Returns [`RemoteError::Status`] for any status outside `200..=299`.
pub fn check_status(status: u16) -> Result<(), RemoteError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(RemoteError::Status { status })
    }
}

/// [`AttemptStore`] talking JSON to the simulation API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpAttemptStore {
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpAttemptStore {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
        }
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|token| !token.trim().is_empty());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.bearer_token.is_some()
    }

    #[must_use]
    pub fn progress_url(&self, attempt_id: &AttemptId) -> String {
        format!("{}/attempts/{attempt_id}/progress", self.base_url)
    }

    #[must_use]
    pub fn completion_url(&self, attempt_id: &AttemptId, task_index: u32) -> String {
        format!(
            "{}/attempts/{attempt_id}/tasks/{task_index}/complete",
            self.base_url
        )
    }

    fn request(&self, method: &str, url: &str, body: Option<&str>) -> Result<Request, RemoteError> {
        let headers = Headers::new().map_err(|err| RemoteError::from_js(&err))?;
        headers
            .set("Accept", "application/json")
            .map_err(|err| RemoteError::from_js(&err))?;
        if body.is_some() {
            headers
                .set("Content-Type", "application/json")
                .map_err(|err| RemoteError::from_js(&err))?;
        }
        if let Some(token) = &self.bearer_token {
            headers
                .set("Authorization", &format!("Bearer {token}"))
                .map_err(|err| RemoteError::from_js(&err))?;
        }

        let init = RequestInit::new();
        init.set_method(method);
        init.set_mode(RequestMode::Cors);
        init.set_headers(&headers);
        if let Some(body) = body {
            init.set_body(&JsValue::from_str(body));
        }
        Request::new_with_str_and_init(url, &init).map_err(|err| RemoteError::from_js(&err))
    }

    #[allow(clippy::future_not_send)]
    async fn send(&self, request: &Request) -> Result<Response, RemoteError> {
        let response = dom::fetch_request(request)
            .await
            .map_err(|err| RemoteError::from_js(&err))?;
        check_status(response.status())?;
        Ok(response)
    }
}

#[async_trait::async_trait(?Send)]
impl AttemptStore for HttpAttemptStore {
    type Error = RemoteError;

    async fn read_progress(&self, attempt_id: &AttemptId) -> Result<RemoteProgress, Self::Error> {
        let request = self.request("GET", &self.progress_url(attempt_id), None)?;
        let response = self.send(&request).await?;
        let body = dom::response_text(&response)
            .await
            .map_err(|err| RemoteError::from_js(&err))?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn write_completion(
        &self,
        attempt_id: &AttemptId,
        task_index: u32,
    ) -> Result<(), Self::Error> {
        let url = self.completion_url(attempt_id, task_index);
        let request = self.request("POST", &url, Some("{}"))?;
        self.send(&request).await?;
        log::debug!("attempt {attempt_id}: task {task_index} persisted");
        Ok(())
    }
}
