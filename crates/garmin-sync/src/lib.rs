pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod parser;
pub mod storage;
pub mod sync;

pub use error::{GarminError, Result};
