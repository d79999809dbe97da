//! Parse orchestration
//!
//! `ParseService` ties routing, the backends, the results cache and the
//! chunk pipeline together behind one call per request.

mod service;
mod types;

pub use service::{discard_staged, ParseService, ParseServiceConfig, CLIENT_PARSER};
pub use types::{ParseRequest, ParseResult, ParseStatus};
