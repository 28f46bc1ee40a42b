use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::budget::{BudgetItem, ItemKey, ItemType};
use super::error::PlanError;
use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    #[default]
    Manual,
    Optimization,
}

/// One amount change recorded on a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub description: String,
    #[serde(rename = "compte")]
    pub account: String,
    pub original_amount: Money,
    pub new_amount: Money,
    /// The other leg of a transfer that moved with this line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_to: Option<ItemKey>,
}

impl AuditEntry {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.item_type, &self.description, &self.account)
    }
}

/// The full income/expense state effective from `effective_date` until the
/// next later snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "dateEffet")]
    pub effective_date: NaiveDate,
    #[serde(default)]
    pub entrees: Vec<BudgetItem>,
    #[serde(default)]
    pub sorties: Vec<BudgetItem>,
    #[serde(default)]
    pub source: SnapshotSource,
    #[serde(default)]
    pub optimizations: Vec<AuditEntry>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(
        effective_date: NaiveDate,
        entrees: Vec<BudgetItem>,
        sorties: Vec<BudgetItem>,
        source: SnapshotSource,
    ) -> Self {
        Snapshot {
            effective_date,
            entrees,
            sorties,
            source,
            optimizations: Vec::new(),
            created_at: None,
        }
    }

    pub fn items_mut(&mut self, item_type: ItemType) -> &mut Vec<BudgetItem> {
        match item_type {
            ItemType::Income => &mut self.entrees,
            ItemType::Expense => &mut self.sorties,
        }
    }

    pub fn find(&self, key: &ItemKey) -> Option<&BudgetItem> {
        let items = match key.item_type {
            ItemType::Income => &self.entrees,
            ItemType::Expense => &self.sorties,
        };
        items.iter().find(|i| i.is_at(&key.description, &key.account))
    }

    /// Adds `entry`, replacing any earlier entry for the same line.
    pub fn record(&mut self, entry: AuditEntry) {
        let key = entry.key();
        match self.optimizations.iter_mut().find(|e| e.key() == key) {
            Some(existing) => {
                // Keep the amount the line had before the first change on this date.
                let original_amount = existing.original_amount;
                *existing = AuditEntry { original_amount, ..entry };
            }
            None => self.optimizations.push(entry),
        }
    }
}

/// Sorts ascending by effective date and rejects two snapshots on one day.
pub fn sort_snapshots(snapshots: &mut [Snapshot]) -> Result<(), PlanError> {
    snapshots.sort_by_key(|s| s.effective_date);
    match snapshots
        .windows(2)
        .find(|w| w[0].effective_date == w[1].effective_date)
    {
        Some(w) => Err(PlanError::DuplicateSnapshotDate(w[0].effective_date)),
        None => Ok(()),
    }
}

/// The persisted unit: baseline arrays plus every dated snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetDocument {
    #[serde(default)]
    pub entrees: Vec<BudgetItem>,
    #[serde(default)]
    pub sorties: Vec<BudgetItem>,
    #[serde(default)]
    pub modifications: Vec<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_optimization_reviewed_at: Option<DateTime<Utc>>,
}

impl BudgetDocument {
    /// Orders the snapshots and checks every item's schedule.
    pub fn validate(&mut self) -> Result<(), PlanError> {
        sort_snapshots(&mut self.modifications)?;
        self.entrees
            .iter()
            .chain(self.sorties.iter())
            .try_for_each(BudgetItem::validate_schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Frequency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(desc: &str, from: i64, to: i64) -> AuditEntry {
        AuditEntry {
            item_type: ItemType::Expense,
            description: desc.to_string(),
            account: "Cheques".to_string(),
            original_amount: Money::from_cents(from),
            new_amount: Money::from_cents(to),
            linked_to: None,
        }
    }

    #[test]
    fn sort_snapshots_orders_and_rejects_duplicates() {
        let mut list = vec![
            Snapshot::new(date(2025, 6, 1), vec![], vec![], SnapshotSource::Manual),
            Snapshot::new(date(2025, 3, 1), vec![], vec![], SnapshotSource::Manual),
        ];
        sort_snapshots(&mut list).unwrap();
        assert_eq!(list[0].effective_date, date(2025, 3, 1));

        list.push(Snapshot::new(date(2025, 3, 1), vec![], vec![], SnapshotSource::Optimization));
        assert_eq!(
            sort_snapshots(&mut list),
            Err(PlanError::DuplicateSnapshotDate(date(2025, 3, 1)))
        );
    }

    #[test]
    fn record_replaces_entry_for_same_line() {
        let mut snap = Snapshot::new(date(2025, 3, 1), vec![], vec![], SnapshotSource::Optimization);
        snap.record(entry("Epicerie", 40000, 42000));
        snap.record(entry("Loyer", 120000, 125000));
        snap.record(entry("Epicerie", 42000, 45000));
        assert_eq!(snap.optimizations.len(), 2);
        assert_eq!(snap.optimizations[0].original_amount, Money::from_cents(40000));
        assert_eq!(snap.optimizations[0].new_amount, Money::from_cents(45000));
    }

    #[test]
    fn document_round_trips_wire_names() {
        let json = r#"{
            "entrees": [],
            "sorties": [{"description": "Loyer", "montant": 1200, "compte": "Cheques",
                         "type": "sortie", "frequence": "mensuel", "jourRecurrence": 1}],
            "modifications": [{"dateEffet": "2025-03-01", "entrees": [], "sorties": [],
                               "source": "optimization", "optimizations": []}],
            "lastOptimizationReviewedAt": "2025-01-10T12:00:00Z"
        }"#;
        let mut doc: BudgetDocument = serde_json::from_str(json).unwrap();
        doc.validate().unwrap();
        assert_eq!(doc.sorties[0].frequency, Frequency::Monthly);
        assert_eq!(doc.modifications[0].source, SnapshotSource::Optimization);

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["modifications"][0]["dateEffet"], "2025-03-01");
        assert_eq!(out["sorties"][0]["montant"], serde_json::json!(1200.0));
        assert!(out.get("lastModifiedAt").is_none());
    }
}
