//! Backend HTTP client.
//!
//! Two endpoints matter to the orchestrator: `POST download/track` starts a
//! download, `GET download/progress/{id}` streams its progress as
//! server-sent events. Both carry credentials from a `CredentialSource`; a
//! 401 from either clears them.

mod progress;
mod sse;
mod submit;

pub use progress::{ProgressChannel, ProgressEvent};
pub use sse::SseDecoder;
pub use submit::{DownloadRequest, SubmitOutcome};

use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::auth::CredentialSource;
use crate::config::Timing;
use crate::error::DownloadError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialSource>,
    request_timeout: Duration,
}

impl BackendClient {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8000/api/`.
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialSource>,
        timing: &Timing,
    ) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("invalid backend URL: {}", base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("trackq/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            base_url: base,
            credentials,
            request_timeout: timing.request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, DownloadError> {
        self.base_url
            .join(path)
            .map_err(|e| DownloadError::Protocol(format!("bad endpoint {}: {}", path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.credentials() {
            Some(creds) => creds.apply(request),
            None => request,
        }
    }

    fn unauthorized(&self) -> DownloadError {
        self.credentials.invalidate();
        DownloadError::AuthRequired
    }

    /// Opens the progress stream for one remote track id.
    pub(crate) async fn open_progress(
        &self,
        remote_id: i64,
    ) -> Result<reqwest::Response, DownloadError> {
        let url = self.endpoint(&format!("download/progress/{}", remote_id))?;
        let response = self
            .authorize(self.http.get(url).header(ACCEPT, "text/event-stream"))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.unauthorized());
        }
        if !status.is_success() {
            return Err(DownloadError::Protocol(format!(
                "progress stream returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialStore;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base, Arc::new(CredentialStore::default()), &Timing::default())
            .unwrap()
    }

    #[test]
    fn endpoints_join_under_api_root() {
        let c = client("http://127.0.0.1:8000/api");
        assert_eq!(c.base_url().as_str(), "http://127.0.0.1:8000/api/");
        assert_eq!(
            c.endpoint("download/track").unwrap().as_str(),
            "http://127.0.0.1:8000/api/download/track"
        );
        assert_eq!(
            c.endpoint("download/progress/42").unwrap().as_str(),
            "http://127.0.0.1:8000/api/download/progress/42"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = BackendClient::new(
            "not a url",
            Arc::new(CredentialStore::default()),
            &Timing::default(),
        )
        .err()
        .expect("invalid url");
        assert!(err.to_string().contains("invalid backend URL"));
    }
}
