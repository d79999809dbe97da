//! Parse Gateway
//!
//! An HTTP gateway in front of several document-parsing backends (Apache
//! Tika, a PyMuPDF service and an Unstructured service). It routes each
//! upload to the backend best suited for it, caches results, splits large
//! PDFs into concurrently processed page ranges, and can launch and supervise
//! the backend processes itself.

pub mod backends;
pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod parse;
pub mod pipeline;
pub mod routes;
pub mod routing;
pub mod server;
pub mod state;
pub mod supervisor;
