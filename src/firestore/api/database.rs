use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::firestore::error::{invalid_argument, not_found, FirestoreResult};
use crate::firestore::model::{collection_from_path, document_from_path, DatabaseId, ResourcePath};
use crate::firestore::remote::structured_query::StructuredQuery;
use crate::firestore::remote::{FirestoreSettings, HttpConnection, Request, RequestExecutor};
use crate::firestore::value::{FirestoreValue, ValueCodec};

use super::document::Document;
use super::operations::UpdateMask;
use super::query::Query;
use super::write_batch::WriteBatch;

/// Entry point for reading and writing the documents of one database.
///
/// Cloning is cheap; clones share the same executor.
#[derive(Clone)]
pub struct Firestore {
    inner: Arc<FirestoreInner>,
}

struct FirestoreInner {
    database_id: DatabaseId,
    codec: ValueCodec,
    request: Request,
}

#[derive(Serialize)]
struct BatchGetRequest {
    documents: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetEntry {
    #[serde(default)]
    found: Option<JsonValue>,
    #[serde(default)]
    read_time: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryRequest<'a> {
    structured_query: &'a StructuredQuery,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryEntry {
    #[serde(default)]
    document: Option<JsonValue>,
    #[serde(default)]
    read_time: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsPage {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl Firestore {
    /// Connects over HTTPS, or to the emulator when the settings name one.
    pub fn new(settings: FirestoreSettings) -> FirestoreResult<Self> {
        let connection = HttpConnection::new(&settings)?;
        Ok(Self::with_executor(
            settings.database_id().clone(),
            Arc::new(connection),
            ValueCodec::new(settings.codec_options()),
        ))
    }

    /// Uses a caller supplied transport, e.g. an in-process fake.
    pub fn with_executor(
        database_id: DatabaseId,
        executor: Arc<dyn RequestExecutor>,
        codec: ValueCodec,
    ) -> Self {
        let inner = FirestoreInner {
            database_id,
            codec,
            request: Request::new(executor),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.inner.database_id
    }

    pub fn codec(&self) -> &ValueCodec {
        &self.inner.codec
    }

    /// Reads one document. A missing document is a `not-found` error.
    pub fn get_document(&self, path: &str) -> FirestoreResult<Document> {
        let response: JsonValue = match self.request().get(path) {
            Err(err) if err.is_not_found() => {
                return Err(not_found(format!("No document found at path {path}")))
            }
            other => other?,
        };
        if response.get("name").is_none() {
            return Err(not_found(format!("No document found at path {path}")));
        }
        Document::from_wire(response, JsonValue::Null)
    }

    /// Reads the documents of the collection at `path`.
    ///
    /// Without `ids` the whole collection is queried. With `ids` only those documents are
    /// fetched in one round trip, and ids that do not exist are left out of the result.
    pub fn get_documents(&self, path: &str, ids: Option<&[&str]>) -> FirestoreResult<Vec<Document>> {
        let Some(ids) = ids else {
            return self.query(path)?.execute();
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let collection = ResourcePath::from_string(path)?;
        let documents = ids
            .iter()
            .map(|id| {
                let resource = ResourcePath::from_string(&format!("{}/{id}", collection.canonical_string()))?;
                Ok(self.database_id().document_name(&resource.canonical_string()))
            })
            .collect::<FirestoreResult<Vec<_>>>()?;

        let mut request = self.request();
        request.route("batchGet");
        let entries: Vec<BatchGetEntry> = request.post("", &BatchGetRequest { documents })?;
        entries
            .into_iter()
            .filter_map(|entry| {
                let read_time = entry.read_time;
                entry
                    .found
                    .map(|found| Document::from_wire(found, json!({ "readTime": read_time })))
            })
            .collect()
    }

    /// Ids of every document in the collection at `path`, relative to that collection.
    pub fn get_document_ids(&self, path: &str) -> FirestoreResult<Vec<String>> {
        let prefix = format!("{}/", ResourcePath::from_string(path)?.canonical_string());
        let documents = self.query(path)?.select("").execute()?;
        documents
            .iter()
            .map(|document| {
                let relative = document.path()?;
                Ok(relative
                    .strip_prefix(&prefix)
                    .unwrap_or(relative)
                    .to_string())
            })
            .collect()
    }

    /// Lists the collection at `path`, following page tokens until the last page.
    pub fn list_documents(&self, path: &str) -> FirestoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.request();
            if let Some(token) = &page_token {
                request.add_param("pageToken", token.as_str());
            }
            let page: ListDocumentsPage = request.get(path)?;
            log::debug!(
                "listed {} documents from {path} (page {})",
                page.documents.len(),
                if page_token.is_some() { "continued" } else { "first" }
            );
            documents.extend(page.documents);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(documents),
            }
        }
    }

    /// Creates a document.
    ///
    /// When `path` names a document it is created under that id and the call fails if it
    /// already exists. When `path` names a collection the server picks the id.
    pub fn create_document(
        &self,
        path: &str,
        fields: &BTreeMap<String, FirestoreValue>,
    ) -> FirestoreResult<Document> {
        let (collection, document_id) = document_from_path(path)?;
        let payload = Document::from_fields(fields, None, self.codec());
        let mut request = self.request();
        if !document_id.is_empty() {
            request.add_param("currentDocument.exists", "false");
            return request.patch(path, &payload);
        }
        if collection.is_empty() {
            return Err(invalid_argument("A collection path is required to create a document"));
        }
        request.post(&collection, &payload)
    }

    /// Writes `fields` to the document at `path`, creating it when missing.
    ///
    /// See [`UpdateMask`] for which fields are touched.
    pub fn update_document(
        &self,
        path: &str,
        fields: &BTreeMap<String, FirestoreValue>,
        mask: UpdateMask,
    ) -> FirestoreResult<Document> {
        let mut request = self.request();
        if let Some(field_paths) = mask.field_paths(fields)? {
            for field_path in field_paths {
                request.add_param("updateMask.fieldPaths", field_path);
            }
        }
        let payload = Document::from_fields(fields, None, self.codec());
        request.patch(path, &payload)
    }

    pub fn delete_document(&self, path: &str) -> FirestoreResult<()> {
        let _: JsonValue = self.request().delete(path)?;
        Ok(())
    }

    /// Starts a query over the collection at `path`, which may be nested under a document.
    pub fn query(&self, path: &str) -> FirestoreResult<Query> {
        let (parent, collection_id) = collection_from_path(path)?;
        let mut request = self.request();
        request.route("runQuery");
        let callback = move |structured: &StructuredQuery| -> FirestoreResult<Vec<Document>> {
            let entries: Vec<RunQueryEntry> = request.post(
                &parent,
                &RunQueryRequest {
                    structured_query: structured,
                },
            )?;
            entries
                .into_iter()
                .filter_map(|entry| {
                    let read_time = entry.read_time;
                    entry
                        .document
                        .map(|document| Document::from_wire(document, json!({ "readTime": read_time })))
                })
                .collect()
        };
        Ok(Query::new(&collection_id, *self.codec(), callback))
    }

    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.request(), self.database_id().clone(), *self.codec())
    }

    fn request(&self) -> Request {
        self.inner.request.fresh()
    }
}

impl std::fmt::Debug for Firestore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Firestore")
            .field("database_id", &self.inner.database_id)
            .field("codec", &self.inner.codec)
            .finish_non_exhaustive()
    }
}
