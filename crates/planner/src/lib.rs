pub mod chain;
pub mod commit;
pub mod config;
pub mod decision;
pub mod recurrence;
pub mod session;
pub mod twin;

pub use chain::{applicable_base, effective_at, AmountEdit, Baseline, SnapshotChain};
pub use commit::{commit, group_by_date, CommitOutcome};
pub use config::{ConfigError, PlannerConfig, PropagationPolicy};
pub use decision::{Decision, DecisionAction, DecisionEngine, DecisionMap, ReviewAction, ReviewError};
pub use recurrence::{occurs_on, plan_horizon, RecurrenceResolver};
pub use session::{ReviewSession, ReviewSummary};
pub use twin::{base_name, TwinMatcher};
