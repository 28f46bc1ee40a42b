use budgetflow_core::{BudgetDocument, BudgetItem, ItemKey, ItemType, Optimization, Snapshot};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

use crate::chain::{AmountEdit, Baseline, SnapshotChain};
use crate::decision::{DecisionAction, DecisionMap};

#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub snapshots: Vec<Snapshot>,
    pub entrees: Vec<BudgetItem>,
    pub sorties: Vec<BudgetItem>,
    /// Lines whose baseline optimization was switched off.
    pub disabled: Vec<ItemKey>,
}

impl CommitOutcome {
    /// The document to hand to persistence, stamped with `now`.
    pub fn into_document(self, now: DateTime<Utc>) -> BudgetDocument {
        BudgetDocument {
            entrees: self.entrees,
            sorties: self.sorties,
            modifications: self.snapshots,
            last_modified_at: Some(now),
            last_optimization_reviewed_at: Some(now),
        }
    }
}

/// Accepted decisions with a date, grouped by that date in ascending order.
pub fn group_by_date(decisions: &DecisionMap) -> BTreeMap<NaiveDate, Vec<AmountEdit>> {
    let mut groups: BTreeMap<NaiveDate, Vec<AmountEdit>> = BTreeMap::new();
    for (key, decision) in decisions {
        if decision.action != DecisionAction::Accept {
            continue;
        }
        if let Some(date) = decision.proposed_date {
            groups
                .entry(date)
                .or_default()
                .push(AmountEdit::new(key.clone(), decision.new_amount));
        }
    }
    groups
}

/// Applies every accepted change, earliest date first, so each date builds
/// on the snapshots produced for the dates before it. Cancelled lines have
/// their baseline optimization disabled; snapshots are left alone for those.
pub fn commit(
    decisions: &DecisionMap,
    entrees: &[BudgetItem],
    sorties: &[BudgetItem],
    existing: &[Snapshot],
    chain: &SnapshotChain,
) -> CommitOutcome {
    let mut snapshots = existing.to_vec();
    for (date, edits) in group_by_date(decisions) {
        tracing::debug!("Applying {} change(s) effective {date}", edits.len());
        snapshots = chain.insert_or_update(date, &edits, Baseline::new(entrees, sorties), &snapshots);
    }

    let mut entrees = entrees.to_vec();
    let mut sorties = sorties.to_vec();
    let mut disabled = Vec::new();
    for (key, decision) in decisions {
        if decision.action != DecisionAction::Cancel {
            continue;
        }
        let items = match key.item_type {
            ItemType::Income => &mut entrees,
            ItemType::Expense => &mut sorties,
        };
        match items.iter_mut().find(|i| i.is_at(&key.description, &key.account)) {
            Some(item) => {
                item.optimization = Optimization::Disabled;
                disabled.push(key.clone());
            }
            None => tracing::warn!("{key} not in baseline, cannot disable its optimization"),
        }
    }

    CommitOutcome {
        snapshots,
        entrees,
        sorties,
        disabled,
    }
}
