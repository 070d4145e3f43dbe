//! # BirdRace Common Library
//!
//! Shared code for the BirdRace services including:
//! - Configuration loading
//! - Database schema, initialization and models
//! - Species classification (what counts toward the competition)

pub mod config;
pub mod db;
pub mod error;
pub mod species;

pub use error::{Error, Result};
pub use species::is_countable;
