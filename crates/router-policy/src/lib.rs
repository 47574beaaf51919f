//! Prompting, classification, and orchestration for the Solar Router.
//!
//! # Modules
//! - [`prompt::PromptBuilder`] — assembles the provider-bound prompt (§4.3).
//! - [`decision::DecisionEngine`] — classifies AI output into a `Decision` (§4.4).
//! - [`router::Router`] — the end-to-end request algorithm (§4.6).

pub mod decision;
pub mod prompt;
pub mod router;

pub use decision::{DecisionEngine, DecisionOutcome};
pub use prompt::PromptBuilder;
pub use router::Router;
