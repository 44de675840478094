//! AI helper chat widget
//!
//! The assistant panel of the trading journal: a key-entry form that gates a
//! chat view, a transcript persisted in local key-value storage, and a single
//! in-flight request to the server's `/ai/ask` endpoint.
//!
//! # Modules
//!
//! - [`widget`]: the [`ChatWidget`] state machine
//! - [`client`]: HTTP client for the assistant endpoint
//! - [`transcript`]: message model and persistence
//! - [`storage`]: key-value store seam (memory and JSON file)
//! - [`view`]: render projection, element ids, view events
//! - [`indicator`]: loading indicator timer
//! - [`config`]: layered configuration

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod client;
pub mod config;
pub mod error;
pub mod indicator;
pub mod storage;
pub mod transcript;
pub mod view;
pub mod widget;

pub use error::{Error, Result};
pub use widget::ChatWidget;
