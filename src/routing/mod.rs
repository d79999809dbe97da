//! Routing engine
//!
//! Decides which backend parses an upload and whether it is processed
//! directly or as a chunked background job.

mod file_type;
mod policy;

pub use file_type::FileType;
pub use policy::{decide, RouteDecision, RouteHints, RouteTarget, RoutingPolicy, Strategy};
