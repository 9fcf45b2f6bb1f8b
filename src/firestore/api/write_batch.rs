use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

use crate::firestore::api::document::Document;
use crate::firestore::api::operations::{top_level_mask, SetOptions};
use crate::firestore::error::{
    failed_precondition, invalid_argument, resource_exhausted, FirestoreResult,
};
use crate::firestore::model::{DatabaseId, ResourcePath};
use crate::firestore::remote::Request;
use crate::firestore::value::{FirestoreValue, ValueCodec};

const MAX_BATCH_WRITES: usize = 500;

/// One entry of the `writes` array sent to `documents:commit` or `documents:batchWrite`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Precondition>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    pub exists: bool,
}

/// Outcome of [`WriteBatch::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitResult {
    /// The atomic commit went through as a whole.
    Committed,
    /// One status per queued write, in order, for a non-atomic commit.
    Statuses(Vec<WriteStatus>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    Ok,
    /// The server rejected this write; carries its message.
    Failed(String),
}

impl WriteStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, WriteStatus::Ok)
    }
}

#[derive(Serialize)]
struct WritesRequest<'a> {
    writes: &'a [Write],
}

#[derive(Default, Deserialize)]
struct BatchWriteResponse {
    #[serde(default)]
    status: Vec<RpcStatus>,
}

#[derive(Default, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: Option<String>,
}

/// Queues document writes and sends them in a single request.
///
/// A batch can be committed once. Every call made after [`WriteBatch::commit`], including a
/// second commit, fails with `failed-precondition`.
pub struct WriteBatch {
    request: Request,
    database_id: DatabaseId,
    codec: ValueCodec,
    writes: Vec<Write>,
    committed: bool,
}

impl WriteBatch {
    pub(crate) fn new(request: Request, database_id: DatabaseId, codec: ValueCodec) -> Self {
        Self {
            request,
            database_id,
            codec,
            writes: Vec::new(),
            committed: false,
        }
    }

    /// Queues a write of `data` to the document at `path`, creating it when missing.
    ///
    /// Without options the document is replaced. With [`SetOptions::merge_all`] only the keys
    /// of `data` are written, and with [`SetOptions::merge_fields`] only the listed paths.
    pub fn set(
        &mut self,
        path: &str,
        data: &BTreeMap<String, FirestoreValue>,
        options: Option<SetOptions>,
    ) -> FirestoreResult<&mut Self> {
        let name = self.prepare(path)?;
        let mask = options.unwrap_or_default().mask_for(data);
        self.writes.push(Write {
            update: Some(Document::from_fields(data, Some(name), &self.codec)),
            update_mask: mask.map(|field_paths| DocumentMask { field_paths }),
            ..Default::default()
        });
        Ok(self)
    }

    /// Queues an update of the keys of `data`. The document must already exist.
    pub fn update(
        &mut self,
        path: &str,
        data: &BTreeMap<String, FirestoreValue>,
    ) -> FirestoreResult<&mut Self> {
        let name = self.prepare(path)?;
        if data.is_empty() {
            return Err(invalid_argument("Missing fields in Mask!"));
        }
        self.writes.push(Write {
            update: Some(Document::from_fields(data, Some(name), &self.codec)),
            update_mask: Some(DocumentMask {
                field_paths: top_level_mask(data),
            }),
            current_document: Some(Precondition { exists: true }),
            ..Default::default()
        });
        Ok(self)
    }

    /// [`WriteBatch::update`] taking field and value pairs. A repeated field keeps its last value.
    pub fn update_fields<I, K, V>(&mut self, path: &str, pairs: I) -> FirestoreResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FirestoreValue>,
    {
        let data: BTreeMap<String, FirestoreValue> = pairs
            .into_iter()
            .map(|(field, value)| (field.into(), value.into()))
            .collect();
        self.update(path, &data)
    }

    pub fn delete(&mut self, path: &str) -> FirestoreResult<&mut Self> {
        let name = self.prepare(path)?;
        self.writes.push(Write {
            delete: Some(name),
            ..Default::default()
        });
        Ok(self)
    }

    /// Sends the queued writes and seals the batch.
    ///
    /// An atomic commit applies all writes or none. A non-atomic commit applies each write on
    /// its own and reports one [`WriteStatus`] per write.
    pub fn commit(&mut self, atomic: bool) -> FirestoreResult<CommitResult> {
        self.ensure_open()?;
        self.committed = true;
        if self.writes.is_empty() {
            return Err(invalid_argument("Cannot commit an empty batch"));
        }

        let mut request = self.request.fresh();
        request.route(if atomic { "commit" } else { "batchWrite" });
        log::debug!(
            "committing {} writes to {} ({})",
            self.writes.len(),
            self.database_id.database_name(),
            if atomic { "atomic" } else { "non-atomic" }
        );
        let body = WritesRequest {
            writes: &self.writes,
        };
        if atomic {
            let _: serde_json::Value = request.post("", &body)?;
            return Ok(CommitResult::Committed);
        }

        let response: BatchWriteResponse = request.post("", &body)?;
        let statuses = response
            .status
            .into_iter()
            .map(|status| match status.code {
                0 => WriteStatus::Ok,
                code => WriteStatus::Failed(
                    status
                        .message
                        .filter(|message| !message.is_empty())
                        .unwrap_or_else(|| format!("error code {code}")),
                ),
            })
            .collect();
        Ok(CommitResult::Statuses(statuses))
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    fn prepare(&self, path: &str) -> FirestoreResult<String> {
        self.ensure_open()?;
        if self.writes.len() >= MAX_BATCH_WRITES {
            return Err(resource_exhausted(format!(
                "WriteBatch cannot contain more than {MAX_BATCH_WRITES} operations"
            )));
        }
        let resource = ResourcePath::from_string(path)?;
        if !resource.is_document() {
            return Err(invalid_argument(format!(
                "Batch writes need a document path, got '{path}'"
            )));
        }
        Ok(self.database_id.document_name(&resource.canonical_string()))
    }

    fn ensure_open(&self) -> FirestoreResult<()> {
        if self.committed {
            return Err(failed_precondition(
                "A write batch can no longer be used after commit() has been called.",
            ));
        }
        Ok(())
    }
}

impl Debug for WriteBatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBatch")
            .field("database_id", &self.database_id)
            .field("writes", &self.writes)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}
