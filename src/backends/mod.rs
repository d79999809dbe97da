//! Parsing backends
//!
//! Each backend is an independently running HTTP service. Adapters translate
//! the gateway's call contract into that backend's wire protocol:
//!
//! - Tika: raw `PUT` of the document, metadata-only or full-content endpoint
//! - PyMuPDF: multipart `POST /parse-pdf`
//! - Unstructured: multipart `POST /extract`
//!
//! Adapters never retry; a non-2xx answer or transport error becomes
//! [`BackendError::CallFailed`] carrying the backend name.

mod adapter;
mod multipart;
mod registry;
mod tika;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::BackendAdapter;
pub use multipart::MultipartAdapter;
pub use registry::BackendRegistry;
pub use tika::TikaAdapter;
pub use types::{BackendDescriptor, BackendError, BackendKind, PageRange, SubmitOptions};
