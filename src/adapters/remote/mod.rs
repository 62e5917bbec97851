//! Outbound adapters for the upstream origin.

pub mod upstream;

pub use upstream::{BrowserHeaders, HttpUpstream};
