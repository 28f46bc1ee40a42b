pub mod budget;
pub mod error;
pub mod goal;
pub mod money;
pub mod period;
pub mod snapshot;

pub use budget::{items_of, BudgetItem, Frequency, ItemKey, ItemType, Optimization, OptimizationPeriod};
pub use error::PlanError;
pub use goal::{goal_for_account, FinancialGoal, UNRANKED};
pub use money::Money;
pub use period::{add_years, DateRange};
pub use snapshot::{sort_snapshots, AuditEntry, BudgetDocument, Snapshot, SnapshotSource};
