//! pixlink-core - Core library for Pixlink
//!
//! Models, validation, backend collaborators and the view-models shared by
//! every Pixlink front-end.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod session;
pub mod util;
pub mod viewmodel;

pub use backend::Backend;
pub use config::ClientConfig;
pub use error::{Error, Result, ValidationError};
pub use session::{AuthEvent, SessionContext};
