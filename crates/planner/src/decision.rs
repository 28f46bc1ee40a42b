use budgetflow_core::{
    goal_for_account, BudgetItem, FinancialGoal, ItemKey, Money, OptimizationPeriod, Snapshot, UNRANKED,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::chain::applicable_base;
use crate::config::PlannerConfig;
use crate::recurrence::{plan_horizon, RecurrenceResolver};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("{0} has no proposed date and cannot be accepted")]
    NoProposedDate(ItemKey),
    #[error("{0} is already decided")]
    AlreadyDecided(ItemKey),
    #[error("{0} has no active optimization")]
    NotOptimizable(ItemKey),
    #[error("{0} is not in the budget")]
    UnknownItem(ItemKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Accept,
    Cancel,
    #[default]
    Undecided,
}

/// What the reviewer did with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Accept,
    Cancel,
    /// Defer the change to the following occurrence.
    Balance,
    /// Leave the line out of this review.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub action: DecisionAction,
    pub proposed_date: Option<NaiveDate>,
    pub new_amount: Money,
    pub skip_count: u32,
}

pub type DecisionMap = BTreeMap<ItemKey, Decision>;

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    resolver: RecurrenceResolver,
    goals: Vec<FinancialGoal>,
    profile_end_date: Option<NaiveDate>,
    lead_occurrences: u32,
    fallback_horizon_years: u32,
    snapshots: Vec<Snapshot>,
}

impl DecisionEngine {
    pub fn new(today: NaiveDate, config: &PlannerConfig, goals: Vec<FinancialGoal>) -> Self {
        Self {
            resolver: RecurrenceResolver::from_config(today, config),
            goals,
            profile_end_date: config.profile_end_date,
            lead_occurrences: config.lead_occurrences,
            fallback_horizon_years: config.fallback_horizon_years,
            snapshots: Vec::new(),
        }
    }

    /// Snapshots already committed; proposals step from the amount they put
    /// in force rather than from the baseline.
    pub fn with_snapshots(mut self, snapshots: Vec<Snapshot>) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.resolver.today()
    }

    /// Rank of the goal tied to the item's account; lower reviews first.
    pub fn priority(&self, item: &BudgetItem) -> u32 {
        goal_for_account(&self.goals, &item.account).map_or(UNRANKED, FinancialGoal::rank)
    }

    /// Lines with an active optimization, ordered by goal priority. Lines of
    /// equal priority keep income-then-expense input order.
    pub fn candidates<'a>(&self, entrees: &'a [BudgetItem], sorties: &'a [BudgetItem]) -> Vec<&'a BudgetItem> {
        let mut items: Vec<&BudgetItem> = entrees
            .iter()
            .chain(sorties.iter())
            .filter(|i| i.optimization.is_enabled())
            .collect();
        items.sort_by_key(|i| self.priority(i));
        items
    }

    /// Amount of `item` in force on `date`, falling back to the baseline line.
    fn amount_at(&self, item: &BudgetItem, date: NaiveDate) -> Money {
        applicable_base(date, &self.snapshots)
            .and_then(|s| s.find(&item.key()))
            .map_or(item.amount, |line| line.amount)
    }

    /// The undecided proposal for `item` after `skip_count` deferrals.
    pub fn propose(&self, item: &BudgetItem, skip_count: u32) -> Decision {
        let proposed_date = match item.optimization.period() {
            Some(OptimizationPeriod::Ascending) => {
                let n = self.lead_occurrences + 1 + skip_count;
                self.resolver.nth_occurrence_from(item, self.today(), n)
            }
            Some(OptimizationPeriod::Descending) => {
                let horizon = plan_horizon(
                    item,
                    &self.goals,
                    self.profile_end_date,
                    self.today(),
                    self.fallback_horizon_years,
                );
                self.resolver.nth_occurrence_before(item, horizon, 1 + skip_count)
            }
            None => None,
        };
        let current = proposed_date.map_or(item.amount, |d| self.amount_at(item, d));
        Decision {
            action: DecisionAction::Undecided,
            proposed_date,
            new_amount: item.optimization.apply(current).unwrap_or(current),
            skip_count,
        }
    }

    /// The decision currently held for `item`, or a fresh proposal.
    pub fn current(&self, decisions: &DecisionMap, item: &BudgetItem) -> Decision {
        decisions
            .get(&item.key())
            .cloned()
            .unwrap_or_else(|| self.propose(item, 0))
    }

    /// Applies `action` to `item` and returns the updated map.
    pub fn decide(
        &self,
        decisions: &DecisionMap,
        item: &BudgetItem,
        action: ReviewAction,
    ) -> Result<DecisionMap, ReviewError> {
        let key = item.key();
        if !item.optimization.is_enabled() {
            return Err(ReviewError::NotOptimizable(key));
        }
        let current = self.current(decisions, item);
        if current.action != DecisionAction::Undecided {
            return Err(ReviewError::AlreadyDecided(key));
        }

        let next = match action {
            ReviewAction::Accept => {
                if current.proposed_date.is_none() {
                    return Err(ReviewError::NoProposedDate(key));
                }
                Decision {
                    action: DecisionAction::Accept,
                    ..current
                }
            }
            ReviewAction::Cancel => Decision {
                action: DecisionAction::Cancel,
                ..current
            },
            ReviewAction::Balance => self.propose(item, current.skip_count + 1),
            ReviewAction::Skip => return Ok(decisions.clone()),
        };

        tracing::debug!("{key}: {action:?} -> {:?} on {:?}", next.action, next.proposed_date);
        let mut updated = decisions.clone();
        updated.insert(key, next);
        Ok(updated)
    }
}
