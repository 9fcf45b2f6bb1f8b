use std::sync::Arc;

use crate::firestore::error::FirestoreResult;

/// Supplies the bearer token attached to every outgoing request.
///
/// Minting the token (service account JWT exchange, metadata server, ...) happens outside this
/// crate; the transport only asks for the current value and drops it after an
/// `UNAUTHENTICATED` response so the next attempt fetches a fresh one.
pub trait TokenProvider: Send + Sync + 'static {
    fn get_token(&self) -> FirestoreResult<Option<String>>;
    fn invalidate_token(&self);
}

pub type TokenProviderArc = Arc<dyn TokenProvider>;

/// Sends requests without an `Authorization` header, as the emulator expects.
#[derive(Default, Clone, Debug)]
pub struct NoopTokenProvider;

impl TokenProvider for NoopTokenProvider {
    fn get_token(&self) -> FirestoreResult<Option<String>> {
        Ok(None)
    }

    fn invalidate_token(&self) {}
}

/// A precomputed access token.
#[derive(Clone, Debug)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn get_token(&self) -> FirestoreResult<Option<String>> {
        if self.token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.token.clone()))
        }
    }

    fn invalidate_token(&self) {}
}
