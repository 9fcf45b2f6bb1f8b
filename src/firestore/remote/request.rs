use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use url::form_urlencoded;

use crate::firestore::error::{internal_error, FirestoreResult};
use crate::firestore::model::clean_path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully assembled call, relative to the `documents` root of a database.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Validated, percent-encoded document or collection path. Empty for the root.
    pub path: String,
    /// Custom method suffix such as `runQuery` or `commit`, rendered as `:{route}`.
    pub route: Option<String>,
    pub params: Vec<(String, String)>,
    pub body: Option<JsonValue>,
}

impl HttpRequest {
    /// `{path}:{route}?{query}`, the part appended to the base URL after a slash.
    pub fn target(&self) -> String {
        let mut target = self.path.clone();
        if let Some(route) = &self.route {
            target.push(':');
            target.push_str(route);
        }
        let query = self.query_string();
        if !query.is_empty() {
            target.push('?');
            target.push_str(&query);
        }
        target
    }

    pub fn query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.params {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// First value of the query parameter `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Performs HTTP calls on behalf of the client.
///
/// Implementations own the base URL, authentication and any retry policy. They must turn
/// every server error, including an `error` envelope inside a successful response, into an
/// `Err` before returning; see [`check_for_error`](super::rpc_error::check_for_error).
pub trait RequestExecutor: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> FirestoreResult<JsonValue>;
}

/// Chainable request options bound to an executor.
///
/// Query parameters and the route accumulate until one of the verb methods sends the request.
/// Use [`Request::fresh`] to start over with the same executor.
#[derive(Clone)]
pub struct Request {
    executor: Arc<dyn RequestExecutor>,
    route: Option<String>,
    params: Vec<(String, String)>,
}

impl Request {
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            executor,
            route: None,
            params: Vec::new(),
        }
    }

    /// Appends a query string parameter. Repeating a key adds another value.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn route(&mut self, route: impl Into<String>) -> &mut Self {
        self.route = Some(route.into());
        self
    }

    /// Same executor, no parameters, no route.
    pub fn fresh(&self) -> Request {
        Request::new(Arc::clone(&self.executor))
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> FirestoreResult<T> {
        self.send(HttpMethod::Get, path, None)
    }

    pub fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> FirestoreResult<T> {
        self.send(HttpMethod::Post, path, Some(to_json(body)?))
    }

    pub fn patch<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> FirestoreResult<T> {
        self.send(HttpMethod::Patch, path, Some(to_json(body)?))
    }

    pub fn delete<T: DeserializeOwned>(&self, path: &str) -> FirestoreResult<T> {
        self.send(HttpMethod::Delete, path, None)
    }

    fn send<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<JsonValue>,
    ) -> FirestoreResult<T> {
        let request = HttpRequest {
            method,
            path: clean_path(path)?,
            route: self.route.clone(),
            params: self.params.clone(),
            body,
        };
        let response = self.executor.execute(&request)?;
        serde_json::from_value(response)
            .map_err(|err| internal_error(format!("Unexpected response to {method} {}: {err}", request.target())))
    }
}

fn to_json(body: &impl Serialize) -> FirestoreResult<JsonValue> {
    serde_json::to_value(body).map_err(|err| internal_error(format!("Failed to encode request body: {err}")))
}
