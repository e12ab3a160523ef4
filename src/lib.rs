//! Accident reporting backend.
//!
//! Reports are matched to the nearest volunteers and hospital with a
//! geospatial query, and volunteers and hospitals sign in to follow the
//! accidents dispatched to them.

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
