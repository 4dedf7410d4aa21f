//! confpapers-common: Shared error type, HTTP substrate and text helpers.

pub mod error;
pub mod http;
pub mod text;

pub use error::{ConfPapersError, Result};
pub use http::{FetchClient, ReqwestTransport, RetryPolicy, Transport, TransportResponse};
pub use text::normalize_ws;
