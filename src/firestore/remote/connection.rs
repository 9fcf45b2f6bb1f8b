use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value as JsonValue;

use crate::firestore::constants::{EMULATOR_HOST_ENV, FIRESTORE_API_HOST};
use crate::firestore::error::{
    deadline_exceeded, internal_error, unavailable, FirestoreError, FirestoreErrorCode, FirestoreResult,
};
use crate::firestore::model::DatabaseId;
use crate::firestore::value::CodecOptions;

use super::request::{HttpMethod, HttpRequest, RequestExecutor};
use super::rpc_error::{check_for_error, map_http_error};
use super::token::{NoopTokenProvider, StaticTokenProvider, TokenProviderArc};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApiVersion {
    #[default]
    V1,
    V1Beta1,
    V1Beta2,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V1Beta1 => "v1beta1",
            ApiVersion::V1Beta2 => "v1beta2",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            multiplier: 1.5,
            max_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl RetrySettings {
    /// A single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn should_retry(&self, attempt: usize, error: &FirestoreError) -> bool {
        if attempt + 1 >= self.max_attempts {
            return false;
        }

        matches!(
            error.code,
            FirestoreErrorCode::Internal
                | FirestoreErrorCode::Unavailable
                | FirestoreErrorCode::DeadlineExceeded
                | FirestoreErrorCode::ResourceExhausted
                | FirestoreErrorCode::Unauthenticated
        )
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let delay = self.initial_delay.mul_f64(factor);
        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }
}

/// Everything needed to reach one database.
///
/// The emulator host defaults to `FIRESTORE_EMULATOR_HOST` when that variable is set.
#[derive(Clone)]
pub struct FirestoreSettings {
    database_id: DatabaseId,
    api_version: ApiVersion,
    emulator_host: Option<String>,
    retry: RetrySettings,
    codec: CodecOptions,
    token_provider: TokenProviderArc,
    client: Option<Client>,
}

impl FirestoreSettings {
    pub fn new(project_id: &str) -> FirestoreResult<Self> {
        Ok(Self::for_database(DatabaseId::for_project(project_id)?))
    }

    pub fn for_database(database_id: DatabaseId) -> Self {
        Self {
            database_id,
            api_version: ApiVersion::default(),
            emulator_host: std::env::var(EMULATOR_HOST_ENV)
                .ok()
                .filter(|host| !host.trim().is_empty()),
            retry: RetrySettings::default(),
            codec: CodecOptions::default(),
            token_provider: Arc::new(NoopTokenProvider),
            client: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database_id = self.database_id.with_database(database);
        self
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }

    pub fn with_emulator_host(mut self, host: impl Into<String>) -> Self {
        self.emulator_host = Some(host.into());
        self
    }

    /// Always talk to the production endpoint, ignoring the environment.
    pub fn without_emulator(mut self) -> Self {
        self.emulator_host = None;
        self
    }

    pub fn with_retry_settings(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_codec_options(mut self, codec: CodecOptions) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_token_provider(mut self, provider: TokenProviderArc) -> Self {
        self.token_provider = provider;
        self
    }

    /// Shorthand for a [`StaticTokenProvider`].
    pub fn with_access_token(self, token: impl Into<String>) -> Self {
        self.with_token_provider(Arc::new(StaticTokenProvider::new(token)))
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn emulator_host(&self) -> Option<&str> {
        self.emulator_host.as_deref()
    }

    pub fn retry_settings(&self) -> &RetrySettings {
        &self.retry
    }

    pub fn codec_options(&self) -> CodecOptions {
        self.codec
    }
}

impl Debug for FirestoreSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreSettings")
            .field("database_id", &self.database_id)
            .field("api_version", &self.api_version)
            .field("emulator_host", &self.emulator_host)
            .field("retry", &self.retry)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// Blocking REST transport.
pub struct HttpConnection {
    client: Client,
    base_url: String,
    token_provider: TokenProviderArc,
    retry: RetrySettings,
}

impl HttpConnection {
    pub fn new(settings: &FirestoreSettings) -> FirestoreResult<Self> {
        let client = match settings.client.clone() {
            Some(client) => client,
            None => Client::builder()
                .user_agent(format!("firestore-rest/{}", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|err| internal_error(format!("Failed to build HTTP client: {err}")))?,
        };
        Ok(Self {
            client,
            base_url: build_base_url(
                &settings.database_id,
                settings.api_version,
                settings.emulator_host.as_deref(),
            ),
            token_provider: Arc::clone(&settings.token_provider),
            retry: settings.retry.clone(),
        })
    }

    /// `.../projects/{project}/databases/{database}/documents`, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, request: &HttpRequest) -> String {
        let target = request.target();
        if request.path.is_empty() {
            format!("{}{}", self.base_url, target)
        } else {
            format!("{}/{}", self.base_url, target)
        }
    }

    fn execute_once(&self, request: &HttpRequest) -> FirestoreResult<JsonValue> {
        let url = self.url_for(request);
        log::debug!("{} {}", request.method, url);

        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };
        let mut builder = self
            .client
            .request(method, url)
            .timeout(self.retry.request_timeout)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.token_provider.get_token()? {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(map_transport_error)?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|err| internal_error(format!("Failed to read response body: {err}")))?;
        if !status.is_success() {
            return Err(map_http_error(status, &text));
        }

        let body = if text.trim().is_empty() {
            JsonValue::Object(Default::default())
        } else {
            serde_json::from_str(&text)
                .map_err(|err| internal_error(format!("Invalid JSON response: {err}")))?
        };
        check_for_error(&body)?;
        Ok(body)
    }
}

impl RequestExecutor for HttpConnection {
    fn execute(&self, request: &HttpRequest) -> FirestoreResult<JsonValue> {
        let mut attempt = 0usize;
        loop {
            match self.execute_once(request) {
                Ok(body) => return Ok(body),
                Err(err) => {
                    if !self.retry.should_retry(attempt, &err) {
                        return Err(err);
                    }

                    if err.code == FirestoreErrorCode::Unauthenticated {
                        self.token_provider.invalidate_token();
                    }

                    let delay = self.retry.backoff_delay(attempt);
                    log::warn!(
                        "{} {} failed on attempt {}: {err}; retrying in {delay:?}",
                        request.method,
                        request.target(),
                        attempt + 1
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> FirestoreError {
    if err.is_timeout() {
        deadline_exceeded(err.to_string())
    } else if err.is_connect() {
        unavailable(err.to_string())
    } else {
        internal_error(err.to_string())
    }
}

fn build_base_url(database_id: &DatabaseId, version: ApiVersion, emulator_host: Option<&str>) -> String {
    match emulator_host {
        Some(host) => format!(
            "http://{host}/{}/{}/documents",
            version.as_str(),
            database_id.database_name()
        ),
        None => format!(
            "{FIRESTORE_API_HOST}/{}/{}/documents",
            version.as_str(),
            database_id.database_name()
        ),
    }
}
