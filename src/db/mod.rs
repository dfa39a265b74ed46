//! Engine handle and configuration.
//!
//! [`Saga`] is what applications hold: it reads a [`Config`], opens the
//! selected backend and exposes the version manager and presentation API
//! over it.

mod api;
mod config;

pub use api::{Saga, SagaError, SagaResult, SagaStats};
pub use config::{BackendKind, Config, ConfigError, ConfigResult, StoreConfig};
