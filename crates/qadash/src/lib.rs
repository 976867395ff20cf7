#![forbid(unsafe_code)]

pub mod adapters;
pub mod breakdown;
pub mod cache;
pub mod cli;
pub mod config;
pub mod filter;
pub mod kpi;
pub mod models;
pub mod recommend;
pub mod series;
pub mod sqlite;
pub mod telemetry;
pub mod utils;

pub use cli::app::{Cli, Command};
