//! Test utilities shared across crate-level unit tests.

pub mod executor;
pub mod http;

pub use executor::RecordingExecutor;
pub use http::try_start_mock_server;
