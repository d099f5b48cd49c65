//! Dialogue agent: intent rules plus the reply orchestrator

mod intent;
mod orchestrator;

#[cfg(test)]
mod proptests;

pub use orchestrator::{Orchestrator, Reply};
