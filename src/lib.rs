//! satbench workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual satbench functionality is in the workspace member crates:
//! - `satbench-types`: Report, manifest and config contracts
//! - `satbench-domain`: Case classification and result aggregation
//! - `satbench-adapters`: Process execution, corpus walk and archive I/O
//! - `satbench-app`: Run and fetch use cases
//! - `satbench-cli`: CLI interface
