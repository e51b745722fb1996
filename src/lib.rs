pub mod catalog;
pub mod classifier;
pub mod config;
pub mod datasource;
pub mod errors;
pub mod jobs;
pub mod media;
pub mod models;
pub mod state;

pub use errors::{Error, Result};
