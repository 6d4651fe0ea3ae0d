//! docintake: document intake for a metro rail operator's records.
//!
//! - [`intake::gatekeeper`] validates uploads against a MIME allow-list and a size ceiling.
//! - [`intake::classify`] assigns a department category by keyword presence.
//! - [`intake::pipeline`] stores, extracts, classifies and indexes accepted uploads.
//! - [`gateway`] exposes the above over HTTP.

pub mod config;
pub mod gateway;
pub mod intake;

pub use config::Config;
