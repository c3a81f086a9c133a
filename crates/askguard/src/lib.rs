#![forbid(unsafe_code)]

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod correction;
pub mod error;
pub mod executor;
pub mod generator;
pub mod guard;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod sql;
pub mod sqlite;
pub mod utils;

pub use cli::app::{Cli, Command};
pub use pipeline::Pipeline;
