use budgetflow_core::{AuditEntry, BudgetItem, ItemKey, Money, Snapshot, SnapshotSource};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::PropagationPolicy;
use crate::twin::TwinMatcher;

/// Sets one line to a new amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountEdit {
    pub key: ItemKey,
    pub new_amount: Money,
}

impl AmountEdit {
    pub fn new(key: ItemKey, new_amount: Money) -> Self {
        Self { key, new_amount }
    }
}

/// The un-optimized budget, used when no snapshot precedes a date.
#[derive(Debug, Clone, Copy)]
pub struct Baseline<'a> {
    pub entrees: &'a [BudgetItem],
    pub sorties: &'a [BudgetItem],
}

impl<'a> Baseline<'a> {
    pub fn new(entrees: &'a [BudgetItem], sorties: &'a [BudgetItem]) -> Self {
        Self { entrees, sorties }
    }
}

/// A line change after twin lookup, replayed onto later snapshots.
#[derive(Debug, Clone)]
struct ResolvedEdit {
    key: ItemKey,
    new_amount: Money,
    /// Amount at the edit date before the change; `None` if the line was absent there.
    previous: Option<Money>,
}

/// The latest snapshot effective on or before `date`.
pub fn applicable_base(date: NaiveDate, snapshots: &[Snapshot]) -> Option<&Snapshot> {
    snapshots
        .iter()
        .filter(|s| s.effective_date <= date)
        .max_by_key(|s| s.effective_date)
}

/// The income and expense lines in force on `date`.
pub fn effective_at<'a>(
    date: NaiveDate,
    baseline: Baseline<'a>,
    snapshots: &'a [Snapshot],
) -> (&'a [BudgetItem], &'a [BudgetItem]) {
    match applicable_base(date, snapshots) {
        Some(s) => (&s.entrees, &s.sorties),
        None => (baseline.entrees, baseline.sorties),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotChain {
    policy: PropagationPolicy,
    now: DateTime<Utc>,
}

impl SnapshotChain {
    pub fn new(policy: PropagationPolicy, now: DateTime<Utc>) -> Self {
        Self { policy, now }
    }

    /// Applies `edits` from `date` onward and returns the full, ordered list.
    ///
    /// The snapshot at `date` is built from the one in force on that day (or
    /// the baseline), updated in place if it already exists. Each edited line
    /// drags its transfer twin along. The same changes are then replayed onto
    /// every snapshot dated after `date`. Lines that cannot be found are
    /// skipped for that snapshot only.
    pub fn insert_or_update(
        &self,
        date: NaiveDate,
        edits: &[AmountEdit],
        baseline: Baseline<'_>,
        existing: &[Snapshot],
    ) -> Vec<Snapshot> {
        let mut snapshot = match applicable_base(date, existing) {
            Some(base) if base.effective_date == date => base.clone(),
            Some(base) => self.fresh(date, &base.entrees, &base.sorties),
            None => self.fresh(date, baseline.entrees, baseline.sorties),
        };

        let resolved = apply_at_date(&mut snapshot, edits);

        let mut out: Vec<Snapshot> = existing
            .iter()
            .filter(|s| s.effective_date != date)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.effective_date);
        self.propagate(date, &resolved, &mut out);

        out.push(snapshot);
        out.sort_by_key(|s| s.effective_date);
        out
    }

    fn fresh(&self, date: NaiveDate, entrees: &[BudgetItem], sorties: &[BudgetItem]) -> Snapshot {
        let mut snapshot = Snapshot::new(date, entrees.to_vec(), sorties.to_vec(), SnapshotSource::Optimization);
        snapshot.created_at = Some(self.now);
        snapshot
    }

    /// Replays `resolved` onto every snapshot in `later` dated after `date`.
    /// A line that was absent at `date` looks up its twin in each later
    /// snapshot instead.
    fn propagate(&self, date: NaiveDate, resolved: &[ResolvedEdit], later: &mut [Snapshot]) {
        let matcher = TwinMatcher::propagation();
        let mut stopped: HashSet<&ItemKey> = HashSet::new();
        for snapshot in later.iter_mut().filter(|s| s.effective_date > date) {
            let effective = snapshot.effective_date;
            for edit in resolved {
                if stopped.contains(&edit.key) {
                    continue;
                }
                let Some(line) = line_mut(snapshot, &edit.key) else {
                    tracing::warn!("{} not found in snapshot {effective}, skipping", edit.key);
                    continue;
                };
                if self.policy == PropagationPolicy::StopAtDivergence {
                    if let Some(previous) = edit.previous {
                        if !line.amount.within_cent(previous) {
                            tracing::debug!(
                                "{} diverges in snapshot {effective}, stopping propagation",
                                edit.key
                            );
                            stopped.insert(&edit.key);
                            continue;
                        }
                    }
                }
                line.amount = edit.new_amount;
                if edit.previous.is_some() {
                    continue;
                }
                let target = line.clone();
                let twin_key = matcher
                    .find_twin(&target, &snapshot.entrees, &snapshot.sorties)
                    .map(BudgetItem::key);
                if let Some(twin_key) = twin_key {
                    if let Some(twin) = line_mut(snapshot, &twin_key) {
                        tracing::debug!("{twin_key} moves with {} in snapshot {effective}", edit.key);
                        twin.amount = edit.new_amount;
                    }
                }
            }
        }
    }
}

/// Edits `snapshot` and its twins, records the audit trail and returns the
/// changes to replay later.
fn apply_at_date(snapshot: &mut Snapshot, edits: &[AmountEdit]) -> Vec<ResolvedEdit> {
    let matcher = TwinMatcher::propagation();
    let mut resolved = Vec::new();

    for edit in edits {
        let Some(target) = snapshot.find(&edit.key).cloned() else {
            tracing::warn!(
                "{} not found in snapshot {}, skipping",
                edit.key,
                snapshot.effective_date
            );
            resolved.push(ResolvedEdit {
                key: edit.key.clone(),
                new_amount: edit.new_amount,
                previous: None,
            });
            continue;
        };
        let twin = matcher
            .find_twin(&target, &snapshot.entrees, &snapshot.sorties)
            .map(|t| (t.key(), t.amount));

        set_amount(snapshot, &edit.key, target.amount, edit.new_amount, twin.as_ref().map(|t| t.0.clone()));
        resolved.push(ResolvedEdit {
            key: edit.key.clone(),
            new_amount: edit.new_amount,
            previous: Some(target.amount),
        });

        match twin {
            Some((twin_key, twin_amount)) => {
                tracing::debug!("{} moves with {}", twin_key, edit.key);
                set_amount(snapshot, &twin_key, twin_amount, edit.new_amount, Some(edit.key.clone()));
                resolved.push(ResolvedEdit {
                    key: twin_key,
                    new_amount: edit.new_amount,
                    previous: Some(twin_amount),
                });
            }
            None => tracing::debug!("{} has no transfer twin", edit.key),
        }
    }

    resolved
}

fn set_amount(
    snapshot: &mut Snapshot,
    key: &ItemKey,
    original_amount: Money,
    new_amount: Money,
    linked_to: Option<ItemKey>,
) {
    if let Some(line) = line_mut(snapshot, key) {
        line.amount = new_amount;
    }
    snapshot.record(AuditEntry {
        item_type: key.item_type,
        description: key.description.clone(),
        account: key.account.clone(),
        original_amount,
        new_amount,
        linked_to,
    });
}

fn line_mut<'a>(snapshot: &'a mut Snapshot, key: &ItemKey) -> Option<&'a mut BudgetItem> {
    snapshot
        .items_mut(key.item_type)
        .iter_mut()
        .find(|i| i.is_at(&key.description, &key.account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetflow_core::{Frequency, ItemType};
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()
    }

    fn line(item_type: ItemType, desc: &str, account: &str, cents: i64) -> BudgetItem {
        let mut item = BudgetItem::new(desc, account, item_type, Money::from_cents(cents), Frequency::Monthly);
        item.day_of_month = Some(1);
        item
    }

    fn baseline() -> (Vec<BudgetItem>, Vec<BudgetItem>) {
        (
            vec![
                line(ItemType::Income, "Salaire", "Cheques", 300000),
                line(ItemType::Income, "Transfert - Epargne", "Cheques", 20000),
            ],
            vec![
                line(ItemType::Expense, "Loyer", "Cheques", 120000),
                line(ItemType::Expense, "Transfert - Cheques", "Epargne", 20000),
            ],
        )
    }

    fn edit(item_type: ItemType, desc: &str, account: &str, cents: i64) -> AmountEdit {
        AmountEdit::new(ItemKey::new(item_type, desc, account), Money::from_cents(cents))
    }

    fn amount(snapshot: &Snapshot, item_type: ItemType, desc: &str, account: &str) -> i64 {
        snapshot
            .find(&ItemKey::new(item_type, desc, account))
            .unwrap()
            .amount
            .to_cents()
    }

    fn chain() -> SnapshotChain {
        SnapshotChain::new(PropagationPolicy::Overwrite, now())
    }

    fn manual(d: NaiveDate, entrees: &[BudgetItem], sorties: &[BudgetItem]) -> Snapshot {
        Snapshot::new(d, entrees.to_vec(), sorties.to_vec(), SnapshotSource::Manual)
    }

    #[test]
    fn first_snapshot_copies_baseline() {
        let (entrees, sorties) = baseline();
        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Expense, "Loyer", "Cheques", 125000)],
            Baseline::new(&entrees, &sorties),
            &[],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, SnapshotSource::Optimization);
        assert_eq!(out[0].created_at, Some(now()));
        assert_eq!(amount(&out[0], ItemType::Expense, "Loyer", "Cheques"), 125000);
        assert_eq!(amount(&out[0], ItemType::Income, "Salaire", "Cheques"), 300000);
        // Baseline untouched.
        assert_eq!(sorties[0].amount.to_cents(), 120000);
    }

    #[test]
    fn twin_moves_with_edited_leg() {
        let (entrees, sorties) = baseline();
        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Income, "Transfert - Epargne", "Cheques", 25000)],
            Baseline::new(&entrees, &sorties),
            &[],
        );
        let snap = &out[0];
        assert_eq!(amount(snap, ItemType::Income, "Transfert - Epargne", "Cheques"), 25000);
        assert_eq!(amount(snap, ItemType::Expense, "Transfert - Cheques", "Epargne"), 25000);

        assert_eq!(snap.optimizations.len(), 2);
        let primary = &snap.optimizations[0];
        assert_eq!(primary.original_amount.to_cents(), 20000);
        assert_eq!(primary.new_amount.to_cents(), 25000);
        assert_eq!(
            primary.linked_to,
            Some(ItemKey::new(ItemType::Expense, "Transfert - Cheques", "Epargne"))
        );
        assert_eq!(snap.optimizations[1].linked_to, Some(primary.key()));
    }

    #[test]
    fn edit_reaches_later_manual_snapshot() {
        let (entrees, sorties) = baseline();
        let mut june_sorties = sorties.clone();
        june_sorties.push(line(ItemType::Expense, "Garderie", "Cheques", 60000));
        let existing = vec![manual(date(2025, 6, 1), &entrees, &june_sorties)];

        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Expense, "Loyer", "Cheques", 125000)],
            Baseline::new(&entrees, &sorties),
            &existing,
        );

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].effective_date, date(2025, 3, 1));
        assert_eq!(out[1].effective_date, date(2025, 6, 1));
        assert_eq!(amount(&out[1], ItemType::Expense, "Loyer", "Cheques"), 125000);
        assert_eq!(amount(&out[1], ItemType::Expense, "Garderie", "Cheques"), 60000);
        assert_eq!(out[1].source, SnapshotSource::Manual);
        assert!(out[1].optimizations.is_empty());
    }

    #[test]
    fn earlier_snapshots_are_not_touched() {
        let (entrees, sorties) = baseline();
        let existing = vec![manual(date(2025, 2, 1), &entrees, &sorties)];
        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Expense, "Loyer", "Cheques", 125000)],
            Baseline::new(&entrees, &sorties),
            &existing,
        );
        assert_eq!(out[0], existing[0]);
        assert_eq!(amount(&out[1], ItemType::Expense, "Loyer", "Cheques"), 125000);
    }

    #[test]
    fn base_is_latest_snapshot_on_or_before_date() {
        let (entrees, sorties) = baseline();
        let mut feb_sorties = sorties.clone();
        feb_sorties[0].amount = Money::from_cents(121000);
        feb_sorties.push(line(ItemType::Expense, "Internet", "Cheques", 8000));
        let existing = vec![manual(date(2025, 2, 1), &entrees, &feb_sorties)];

        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Income, "Salaire", "Cheques", 310000)],
            Baseline::new(&entrees, &sorties),
            &existing,
        );
        assert_eq!(amount(&out[1], ItemType::Expense, "Loyer", "Cheques"), 121000);
        assert_eq!(amount(&out[1], ItemType::Expense, "Internet", "Cheques"), 8000);
    }

    #[test]
    fn same_date_updates_existing_snapshot() {
        let (entrees, sorties) = baseline();
        let mut existing = manual(date(2025, 3, 1), &entrees, &sorties);
        existing.created_at = Some(Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());

        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Expense, "Loyer", "Cheques", 125000)],
            Baseline::new(&entrees, &sorties),
            &[existing.clone()],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, SnapshotSource::Manual);
        assert_eq!(out[0].created_at, existing.created_at);
        assert_eq!(amount(&out[0], ItemType::Expense, "Loyer", "Cheques"), 125000);
    }

    #[test]
    fn missing_target_is_skipped() {
        let (entrees, sorties) = baseline();
        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[
                edit(ItemType::Expense, "Inconnu", "Cheques", 1000),
                edit(ItemType::Expense, "Loyer", "Cheques", 125000),
            ],
            Baseline::new(&entrees, &sorties),
            &[],
        );
        assert_eq!(amount(&out[0], ItemType::Expense, "Loyer", "Cheques"), 125000);
        assert_eq!(out[0].sorties.len(), 2);
    }

    #[test]
    fn line_missing_at_date_still_reaches_later_snapshot() {
        let (entrees, sorties) = baseline();
        let mut june_sorties = sorties.clone();
        june_sorties.push(line(ItemType::Expense, "Garderie", "Cheques", 60000));
        let existing = vec![manual(date(2025, 6, 1), &entrees, &june_sorties)];

        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Expense, "Garderie", "Cheques", 65000)],
            Baseline::new(&entrees, &sorties),
            &existing,
        );
        assert_eq!(amount(&out[1], ItemType::Expense, "Garderie", "Cheques"), 65000);
    }

    #[test]
    fn twin_found_in_later_snapshot_when_absent_at_date() {
        let (entrees, sorties) = baseline();
        let existing = vec![
            manual(date(2025, 3, 1), &entrees[..1], &sorties[..1]),
            manual(date(2025, 6, 1), &entrees, &sorties),
        ];

        let out = chain().insert_or_update(
            date(2025, 4, 1),
            &[edit(ItemType::Income, "Transfert - Epargne", "Cheques", 25000)],
            Baseline::new(&entrees, &sorties),
            &existing,
        );
        let june = &out[2];
        assert_eq!(june.effective_date, date(2025, 6, 1));
        assert_eq!(amount(june, ItemType::Income, "Transfert - Epargne", "Cheques"), 25000);
        assert_eq!(amount(june, ItemType::Expense, "Transfert - Cheques", "Epargne"), 25000);
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let (entrees, sorties) = baseline();
        let existing = vec![manual(date(2025, 6, 1), &entrees, &sorties)];
        let edits = [edit(ItemType::Income, "Transfert - Epargne", "Cheques", 25000)];
        let once = chain().insert_or_update(date(2025, 3, 1), &edits, Baseline::new(&entrees, &sorties), &existing);
        let twice = chain().insert_or_update(date(2025, 3, 1), &edits, Baseline::new(&entrees, &sorties), &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn overwrite_replaces_independent_later_edit() {
        let (entrees, sorties) = baseline();
        let mut june_sorties = sorties.clone();
        june_sorties[0].amount = Money::from_cents(130000);
        let existing = vec![manual(date(2025, 6, 1), &entrees, &june_sorties)];

        let out = chain().insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Expense, "Loyer", "Cheques", 125000)],
            Baseline::new(&entrees, &sorties),
            &existing,
        );
        assert_eq!(amount(&out[1], ItemType::Expense, "Loyer", "Cheques"), 125000);
    }

    #[test]
    fn stop_at_divergence_keeps_independent_later_edit() {
        let (entrees, sorties) = baseline();
        let mut sept_sorties = sorties.clone();
        sept_sorties[0].amount = Money::from_cents(130000);
        let existing = vec![
            manual(date(2025, 6, 1), &entrees, &sorties),
            manual(date(2025, 9, 1), &entrees, &sept_sorties),
            manual(date(2025, 12, 1), &entrees, &sorties),
        ];

        let out = SnapshotChain::new(PropagationPolicy::StopAtDivergence, now()).insert_or_update(
            date(2025, 3, 1),
            &[edit(ItemType::Expense, "Loyer", "Cheques", 125000)],
            Baseline::new(&entrees, &sorties),
            &existing,
        );
        assert_eq!(amount(&out[1], ItemType::Expense, "Loyer", "Cheques"), 125000);
        assert_eq!(amount(&out[2], ItemType::Expense, "Loyer", "Cheques"), 130000);
        assert_eq!(amount(&out[3], ItemType::Expense, "Loyer", "Cheques"), 120000);
    }

    #[test]
    fn effective_at_falls_back_to_baseline() {
        let (entrees, sorties) = baseline();
        let existing = vec![manual(date(2025, 6, 1), &entrees[..1], &sorties)];
        let base = Baseline::new(&entrees, &sorties);
        assert_eq!(effective_at(date(2025, 5, 31), base, &existing).0.len(), 2);
        assert_eq!(effective_at(date(2025, 6, 1), base, &existing).0.len(), 1);
    }
}
