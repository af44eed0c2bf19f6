//! AeroData ORM
//!
//! Typed aerospace records queried through a fluent builder and persisted
//! through a swappable [`backend::Backend`].

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod query;
pub mod record;
pub mod relations;
