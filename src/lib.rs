//! Lifecycle management for Relyt data-warehouse resources.
//!
//! The core is in [`convergence`]: bounded retry, deadline polling,
//! cancellation and page scrolling. [`reconcile`] composes those into
//! create/read/update/delete flows for each resource kind on top of the
//! [`api::RelytApi`] boundary.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod convergence;
pub mod error;
pub mod reconcile;
pub mod resolver;
pub mod state;
pub mod ui;

pub use error::{RelytError, Result};
