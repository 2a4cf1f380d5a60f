//! Service layer for deployment orchestration
//!
//! Sequences the rendered gcloud invocations, separating that from the CLI
//! layer in main.rs.

pub mod deploy;

pub use deploy::{DeployOutcome, DeployService};
