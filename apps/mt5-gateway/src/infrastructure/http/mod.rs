//! HTTP surface: router, DTOs, error envelope, request correlation.

pub mod controller;
pub mod request;
pub mod request_id;
pub mod response;

pub use controller::{AppState, create_router};
pub use request_id::{REQUEST_ID_HEADER, RequestId};
pub use response::{ApiError, ErrorEnvelope};
