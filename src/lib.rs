//! ocrpick - multi-backend OCR comparison client.
//!
//! Submits a document to an OCR relay service that runs it through
//! several independently configured OCR backends, consumes the relay's
//! streaming progress events into a (page × backend) task grid, and
//! assembles a final document from the user's per-page picks.

pub mod batch;
pub mod cli;
pub mod client;
pub mod combine;
pub mod config;
pub mod grid;
pub mod models;
pub mod service;
pub mod session;
pub mod stream;
