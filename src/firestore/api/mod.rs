mod database;
mod document;
mod operations;
mod query;
mod write_batch;

pub use database::Firestore;
pub use document::Document;
pub use operations::{SetOptions, UpdateMask};
pub use query::{Query, QueryCallback};
pub use write_batch::{CommitResult, DocumentMask, Precondition, Write, WriteBatch, WriteStatus};
