pub mod connection;
pub mod request;
pub mod rpc_error;
pub mod structured_query;
pub mod token;

pub use connection::{ApiVersion, FirestoreSettings, HttpConnection, RetrySettings};
pub use request::{HttpMethod, HttpRequest, Request, RequestExecutor};
pub use rpc_error::{check_for_error, map_http_error};
pub use token::{NoopTokenProvider, StaticTokenProvider, TokenProvider, TokenProviderArc};
