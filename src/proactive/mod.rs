//! Unprompted speech: follow-ups the agent owes and idle-conversation
//! re-engagement, bounded by daily budgets.

pub mod action;
pub mod budget;
pub mod eligibility;
pub mod executor;
pub mod followups;
pub mod scheduler;

pub use action::{ActionKind, DeliveryStrategy, Priority, ProactiveAction};
pub use budget::DailyBudget;
pub use eligibility::{EligibilityRules, QuietHours};
pub use executor::ActionExecutor;
pub use followups::{FollowupItem, FollowupStatus, FollowupStore, InMemoryFollowupStore, SweepReport};
pub use scheduler::{ProactiveScheduler, SchedulerDeps, TickReport};
