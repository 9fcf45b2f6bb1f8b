pub mod api;
mod constants;
pub mod error;
pub mod model;
pub mod remote;
pub mod value;

pub use api::{
    CommitResult, Document, Firestore, Query, SetOptions, UpdateMask, WriteBatch, WriteStatus,
};
pub use constants::{DEFAULT_DATABASE_ID, DOCUMENT_NAME_FIELD, EMULATOR_HOST_ENV};
pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use model::{DatabaseId, GeoPoint, Timestamp};
pub use remote::{
    ApiVersion, FirestoreSettings, NoopTokenProvider, RequestExecutor, RetrySettings,
    StaticTokenProvider, TokenProvider,
};
pub use value::{BytesValue, CodecOptions, FirestoreValue, StringHeuristics, ValueCodec, ValueKind};
