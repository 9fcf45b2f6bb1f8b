//! In-process stand-in for the Firestore REST endpoints used by the client.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use firestore_rest::firestore::error::{
    already_exists, internal_error, invalid_argument, not_found, FirestoreResult,
};
use firestore_rest::firestore::model::{decode_path, DatabaseId};
use firestore_rest::firestore::remote::{HttpMethod, HttpRequest, RequestExecutor};
use firestore_rest::firestore::{Firestore, ValueCodec};
use serde_json::{json, Map, Value as JsonValue};

pub const ROOT: &str = "projects/demo/databases/(default)/documents/";
pub const READ_TIME: &str = "2024-06-01T00:00:00Z";
const PAGE_SIZE: usize = 2;

struct Stored {
    fields: Map<String, JsonValue>,
    create_time: String,
    update_time: String,
}

#[derive(Default)]
struct State {
    documents: BTreeMap<String, Stored>,
    clock: u32,
    next_id: u32,
    log: Vec<String>,
}

#[derive(Default)]
pub struct FakeFirestore {
    state: Mutex<State>,
}

impl FakeFirestore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `METHOD target` of every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().documents.contains_key(path)
    }
}

pub fn connect(fake: &Arc<FakeFirestore>) -> Firestore {
    Firestore::with_executor(DatabaseId::default("demo"), fake.clone(), ValueCodec::default())
}

impl RequestExecutor for FakeFirestore {
    fn execute(&self, request: &HttpRequest) -> FirestoreResult<JsonValue> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| internal_error("fake state poisoned"))?;
        state.log.push(format!("{} {}", request.method, request.target()));
        let path = decode_path(&request.path);
        let body = request.body.clone().unwrap_or(JsonValue::Null);
        match (request.method, request.route.as_deref()) {
            (HttpMethod::Get, None) if is_document(&path) => state.get(&path),
            (HttpMethod::Get, None) => Ok(state.list(&path, request.param("pageToken"))),
            (HttpMethod::Patch, None) => state.patch(&path, request, &body),
            (HttpMethod::Post, None) => Ok(state.create_in(&path, &body)),
            (HttpMethod::Delete, None) => {
                state.documents.remove(&path);
                Ok(json!({}))
            }
            (HttpMethod::Post, Some("runQuery")) => Ok(state.run_query(&path, &body)),
            (HttpMethod::Post, Some("batchGet")) => Ok(state.batch_get(&body)),
            (HttpMethod::Post, Some("commit")) => state.commit(&body),
            (HttpMethod::Post, Some("batchWrite")) => Ok(state.batch_write(&body)),
            _ => Err(invalid_argument(format!("unsupported call {}", request.target()))),
        }
    }
}

impl State {
    fn tick(&mut self) -> String {
        self.clock += 1;
        format!("2024-01-01T00:{:02}:{:02}Z", self.clock / 60, self.clock % 60)
    }

    fn to_wire(&self, path: &str) -> JsonValue {
        match self.documents.get(path) {
            Some(stored) => json!({
                "name": format!("{ROOT}{path}"),
                "fields": stored.fields,
                "createTime": stored.create_time,
                "updateTime": stored.update_time,
            }),
            None => JsonValue::Null,
        }
    }

    fn children(&self, collection: &str) -> Vec<String> {
        let prefix = format!("{collection}/");
        self.documents
            .keys()
            .filter(|path| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect()
    }

    fn get(&self, path: &str) -> FirestoreResult<JsonValue> {
        if !self.documents.contains_key(path) {
            return Err(not_found(format!("Document \"{ROOT}{path}\" not found.")));
        }
        Ok(self.to_wire(path))
    }

    fn list(&self, collection: &str, page_token: Option<&str>) -> JsonValue {
        let children = self.children(collection);
        let start = page_token.and_then(|token| token.parse().ok()).unwrap_or(0usize);
        let end = (start + PAGE_SIZE).min(children.len());
        let documents: Vec<JsonValue> = children
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|path| self.to_wire(path))
            .collect();
        let mut page = Map::new();
        if !documents.is_empty() {
            page.insert("documents".into(), JsonValue::Array(documents));
        }
        if end < children.len() {
            page.insert("nextPageToken".into(), json!(end.to_string()));
        }
        JsonValue::Object(page)
    }

    fn write(&mut self, path: &str, fields: Map<String, JsonValue>, mask: Option<Vec<String>>) -> JsonValue {
        let now = self.tick();
        match self.documents.get_mut(path) {
            Some(stored) => {
                match mask {
                    Some(mask) => {
                        for key in mask.iter().map(|entry| unescape(entry)) {
                            match fields.get(&key) {
                                Some(value) => {
                                    stored.fields.insert(key, value.clone());
                                }
                                None => {
                                    stored.fields.remove(&key);
                                }
                            }
                        }
                    }
                    None => stored.fields = fields,
                }
                stored.update_time = now;
            }
            None => {
                let fields = match mask {
                    Some(mask) => {
                        let keys: Vec<String> = mask.iter().map(|entry| unescape(entry)).collect();
                        fields.into_iter().filter(|(key, _)| keys.contains(key)).collect()
                    }
                    None => fields,
                };
                self.documents.insert(
                    path.to_string(),
                    Stored {
                        fields,
                        create_time: now.clone(),
                        update_time: now,
                    },
                );
            }
        }
        self.to_wire(path)
    }

    fn patch(&mut self, path: &str, request: &HttpRequest, body: &JsonValue) -> FirestoreResult<JsonValue> {
        if request.param("currentDocument.exists") == Some("false") && self.documents.contains_key(path) {
            return Err(already_exists(format!("Document already exists: {ROOT}{path}")));
        }
        let mask: Vec<String> = request
            .params
            .iter()
            .filter(|(key, _)| key == "updateMask.fieldPaths")
            .map(|(_, value)| value.clone())
            .collect();
        let mask = (!mask.is_empty()).then_some(mask);
        Ok(self.write(path, fields_of(body), mask))
    }

    fn create_in(&mut self, collection: &str, body: &JsonValue) -> JsonValue {
        self.next_id += 1;
        let path = format!("{collection}/auto{}", self.next_id);
        self.write(&path, fields_of(body), None)
    }

    fn run_query(&self, parent: &str, body: &JsonValue) -> JsonValue {
        let structured = &body["structuredQuery"];
        let collection_id = structured["from"][0]["collectionId"].as_str().unwrap_or_default();
        let collection = if parent.is_empty() {
            collection_id.to_string()
        } else {
            format!("{parent}/{collection_id}")
        };
        let equal = structured["where"].get("fieldFilter").map(|filter| {
            assert_eq!(filter["op"], json!("EQUAL"), "fake only supports EQUAL filters");
            (unescape(filter["field"]["fieldPath"].as_str().unwrap_or_default()), filter["value"].clone())
        });
        let names_only = structured.get("select").is_some();
        let limit = structured["limit"].as_u64().map_or(usize::MAX, |limit| limit as usize);

        let mut results: Vec<JsonValue> = self
            .children(&collection)
            .iter()
            .filter(|path| match &equal {
                Some((field, value)) => self.documents[*path].fields.get(field) == Some(value),
                None => true,
            })
            .take(limit)
            .map(|path| {
                let document = if names_only {
                    json!({ "name": format!("{ROOT}{path}") })
                } else {
                    self.to_wire(path)
                };
                json!({ "document": document, "readTime": READ_TIME })
            })
            .collect();
        if results.is_empty() {
            results.push(json!({ "readTime": READ_TIME }));
        }
        JsonValue::Array(results)
    }

    fn batch_get(&self, body: &JsonValue) -> JsonValue {
        let entries = body["documents"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|name| {
                let name = name.as_str().unwrap_or_default();
                let path = name.strip_prefix(ROOT).unwrap_or(name);
                if self.documents.contains_key(path) {
                    json!({ "found": self.to_wire(path), "readTime": READ_TIME })
                } else {
                    json!({ "missing": name, "readTime": READ_TIME })
                }
            })
            .collect();
        JsonValue::Array(entries)
    }

    fn commit(&mut self, body: &JsonValue) -> FirestoreResult<JsonValue> {
        let writes = body["writes"].as_array().cloned().unwrap_or_default();
        if let Some(message) = writes.iter().find_map(|write| self.precondition_failure(write)) {
            return Err(not_found(message));
        }
        for write in &writes {
            self.apply(write);
        }
        let commit_time = self.tick();
        Ok(json!({
            "writeResults": writes.iter().map(|_| json!({})).collect::<Vec<_>>(),
            "commitTime": commit_time,
        }))
    }

    fn batch_write(&mut self, body: &JsonValue) -> JsonValue {
        let writes = body["writes"].as_array().cloned().unwrap_or_default();
        let status: Vec<JsonValue> = writes
            .iter()
            .map(|write| match self.precondition_failure(write) {
                Some(message) => json!({ "code": 5, "message": message }),
                None => {
                    self.apply(write);
                    json!({})
                }
            })
            .collect();
        json!({
            "writeResults": writes.iter().map(|_| json!({})).collect::<Vec<_>>(),
            "status": status,
        })
    }

    fn precondition_failure(&self, write: &JsonValue) -> Option<String> {
        if write["currentDocument"]["exists"] != json!(true) {
            return None;
        }
        let path = relative(&write["update"]["name"]);
        (!self.documents.contains_key(&path)).then(|| format!("No document to update: {ROOT}{path}"))
    }

    fn apply(&mut self, write: &JsonValue) {
        if write.get("delete").is_some() {
            let path = relative(&write["delete"]);
            self.documents.remove(&path);
            return;
        }
        let update = &write["update"];
        let mask = write["updateMask"]["fieldPaths"].as_array().map(|paths| {
            paths
                .iter()
                .filter_map(|path| path.as_str().map(str::to_string))
                .collect()
        });
        self.write(&relative(&update["name"]), fields_of(update), mask);
    }
}

fn is_document(path: &str) -> bool {
    !path.is_empty() && path.split('/').count() % 2 == 0
}

fn relative(name: &JsonValue) -> String {
    let name = name.as_str().unwrap_or_default();
    name.strip_prefix(ROOT).unwrap_or(name).to_string()
}

fn fields_of(document: &JsonValue) -> Map<String, JsonValue> {
    document["fields"].as_object().cloned().unwrap_or_default()
}

fn unescape(entry: &str) -> String {
    entry
        .strip_prefix('`')
        .and_then(|rest| rest.strip_suffix('`'))
        .map(|inner| inner.replace("\\`", "`"))
        .unwrap_or_else(|| entry.to_string())
}
