// src/config/mod.rs

//! Configuration loading and validation for procstream.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into a [`SupervisorConfig`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{RawConfigFile, RunSection, StreamSection, SupervisorConfig, TerminationSection};
pub use validate::parse_duration;
