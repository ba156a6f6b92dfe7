//! Backend agent access.
//!
//! `client` talks to the agent endpoints, `runner` sequences the calls and
//! folds their results into the dashboard state.

pub mod client;
pub mod runner;

pub use client::{AgentSubmission, ClientConfig, HttpAgentClient};
pub use runner::{AgentRunner, RunEvent, RunnerOptions};
