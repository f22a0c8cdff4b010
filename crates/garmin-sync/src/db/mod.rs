//! Database models for the activity store

pub mod models;

pub use models::*;
