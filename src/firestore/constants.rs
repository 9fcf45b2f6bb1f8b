pub const DEFAULT_DATABASE_ID: &str = "(default)";

pub(crate) const FIRESTORE_API_HOST: &str = "https://firestore.googleapis.com";

pub const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";

/// Pseudo-field that addresses the document name in queries.
pub const DOCUMENT_NAME_FIELD: &str = "__name__";
