use budgetflow_core::{add_years, goal_for_account, BudgetItem, DateRange, FinancialGoal, Frequency};
use chrono::{Datelike, NaiveDate};

use crate::config::PlannerConfig;

/// True when `date` is a due date of `item`'s schedule.
pub fn occurs_on(item: &BudgetItem, date: NaiveDate) -> bool {
    match item.frequency {
        Frequency::Monthly => item.day_of_month == Some(date.day()),
        Frequency::Weekly => item.weekday == Some(date.weekday().num_days_from_sunday()),
        Frequency::Biweekly => item.reference_date.is_some_and(|reference| {
            let days = (date - reference).num_days();
            days >= 0 && days % 14 == 0
        }),
        Frequency::SemiMonthly => matches!(date.day(), 1 | 15),
        Frequency::Annual => {
            item.month == Some(date.month()) && item.day_of_month == Some(date.day())
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecurrenceResolver {
    today: NaiveDate,
    forward_horizon_years: u32,
}

impl RecurrenceResolver {
    pub fn new(today: NaiveDate, forward_horizon_years: u32) -> Self {
        Self {
            today,
            forward_horizon_years,
        }
    }

    pub fn from_config(today: NaiveDate, config: &PlannerConfig) -> Self {
        Self::new(today, config.forward_horizon_years)
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// The `n`-th occurrence strictly after `from`, searching at most
    /// `forward_horizon_years` ahead. `n` counts from 1.
    pub fn nth_occurrence_from(&self, item: &BudgetItem, from: NaiveDate, n: u32) -> Option<NaiveDate> {
        let index = n.checked_sub(1)? as usize;
        let first = from.succ_opt()?;
        let window = DateRange::new(first, add_years(from, self.forward_horizon_years));
        let found = window.days().filter(|d| occurs_on(item, *d)).nth(index);
        if found.is_none() {
            tracing::debug!("No occurrence #{n} of '{}' in {window}", item.description);
        }
        found
    }

    /// The `n`-th occurrence strictly before `before`, walking back no further
    /// than today. `n` counts from 1.
    pub fn nth_occurrence_before(&self, item: &BudgetItem, before: NaiveDate, n: u32) -> Option<NaiveDate> {
        let index = n.checked_sub(1)? as usize;
        let last = before.pred_opt()?;
        let window = DateRange::new(self.today, last);
        let found = window.days_rev().filter(|d| occurs_on(item, *d)).nth(index);
        if found.is_none() {
            tracing::debug!("No occurrence #{n} of '{}' in {window} (backward)", item.description);
        }
        found
    }
}

/// End of the planning window for `item`: the deadline of the goal tied to its
/// account, else the profile end date, else `fallback_years` from today.
pub fn plan_horizon(
    item: &BudgetItem,
    goals: &[FinancialGoal],
    profile_end_date: Option<NaiveDate>,
    today: NaiveDate,
    fallback_years: u32,
) -> NaiveDate {
    goal_for_account(goals, &item.account)
        .and_then(|g| g.deadline)
        .or(profile_end_date)
        .unwrap_or_else(|| add_years(today, fallback_years))
}
