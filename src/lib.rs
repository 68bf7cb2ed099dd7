#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod admission;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod proactive;
pub mod reasoning;
pub mod resilience;
pub mod runtime;
pub mod store;
pub mod tools;

pub use config::ParleyConfig;
pub use conversation::{AuthorId, ConversationId, SentId, TriggerId};
pub use error::{ParleyError, Result};
pub use orchestrator::{ResponseOrchestrator, TriggerKind, TriggerOutcome};
pub use proactive::ProactiveScheduler;
pub use runtime::{Runtime, RuntimeDeps};
