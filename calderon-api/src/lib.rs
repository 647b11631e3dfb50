//! Payload types, endpoint table and REST client for the Calderón
//! hydro-climatic prediction API.
//!
//! The pure modules (payload decoding, models, endpoints, sequencing) build
//! everywhere. The async [`client`] is only compiled with the `api` feature,
//! which pulls in `reqwest` and `tokio`.

pub mod endpoints;
pub mod error;
pub mod models;
pub mod observation;
pub mod payload;
pub mod sequence;

#[cfg(feature = "api")]
pub mod client;
