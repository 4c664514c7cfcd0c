//! A browser agent driven by a vision model.
//!
//! Each cycle labels the interactive elements of the page, shows the model a
//! screenshot plus a numbered legend, parses the single action it picks and
//! runs that action against the page. See [`agent::Agent`].

pub mod agent;
pub mod brain;
pub mod config;
pub mod dom;
pub mod execute;
pub mod hands;
pub mod logging;
pub mod parse;
pub mod prompt;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod types;

pub use agent::{Agent, AgentSettings, AgentState, Cycle, Phase};
pub use types::{Action, BoundingBox, Observation};
