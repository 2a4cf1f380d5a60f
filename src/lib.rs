pub mod cli;
pub mod config;
pub mod constants;
pub mod gcloud;
pub mod instructions;
pub mod plan;
pub mod probe;
pub mod service;

pub use anyhow::Result;
