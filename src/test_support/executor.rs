use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value as JsonValue;

use crate::firestore::error::{internal_error, FirestoreError, FirestoreResult};
use crate::firestore::remote::{HttpRequest, RequestExecutor};

/// Replays queued responses in order and records every request it receives.
#[derive(Default)]
pub struct RecordingExecutor {
    responses: Mutex<VecDeque<FirestoreResult<JsonValue>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, body: JsonValue) {
        self.responses.lock().unwrap().push_back(Ok(body));
    }

    pub fn fail(&self, error: FirestoreError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was recorded")
    }
}

impl RequestExecutor for RecordingExecutor {
    fn execute(&self, request: &HttpRequest) -> FirestoreResult<JsonValue> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(internal_error(format!("no response queued for {}", request.target()))))
    }
}
