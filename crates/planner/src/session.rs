use budgetflow_core::{BudgetDocument, BudgetItem, ItemKey};
use chrono::{DateTime, Utc};

use crate::chain::SnapshotChain;
use crate::commit::{commit, CommitOutcome};
use crate::config::PropagationPolicy;
use crate::decision::{Decision, DecisionAction, DecisionEngine, DecisionMap, ReviewAction, ReviewError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewSummary {
    pub accepted: usize,
    pub cancelled: usize,
    pub pending: usize,
}

/// One review pass over a loaded budget document.
///
/// The document is never modified; only the decision map changes, and only
/// by replacement. Dropping the session discards every decision.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    engine: DecisionEngine,
    document: BudgetDocument,
    decisions: DecisionMap,
}

impl ReviewSession {
    pub fn new(engine: DecisionEngine, document: BudgetDocument) -> Self {
        Self {
            engine: engine.with_snapshots(document.modifications.clone()),
            document,
            decisions: DecisionMap::new(),
        }
    }

    pub fn document(&self) -> &BudgetDocument {
        &self.document
    }

    pub fn decisions(&self) -> &DecisionMap {
        &self.decisions
    }

    /// Lines up for review, in presentation order, with their current decision.
    pub fn candidates(&self) -> Vec<(&BudgetItem, Decision)> {
        self.engine
            .candidates(&self.document.entrees, &self.document.sorties)
            .into_iter()
            .map(|item| (item, self.engine.current(&self.decisions, item)))
            .collect()
    }

    pub fn apply(&mut self, key: &ItemKey, action: ReviewAction) -> Result<(), ReviewError> {
        let item = self
            .document
            .entrees
            .iter()
            .chain(self.document.sorties.iter())
            .find(|i| i.key() == *key)
            .ok_or_else(|| ReviewError::UnknownItem(key.clone()))?;
        self.decisions = self.engine.decide(&self.decisions, item, action)?;
        Ok(())
    }

    pub fn summary(&self) -> ReviewSummary {
        let mut summary = ReviewSummary::default();
        for (_, decision) in self.candidates() {
            match decision.action {
                DecisionAction::Accept => summary.accepted += 1,
                DecisionAction::Cancel => summary.cancelled += 1,
                DecisionAction::Undecided => summary.pending += 1,
            }
        }
        summary
    }

    /// Computes the committed state without touching the session.
    pub fn commit(&self, policy: PropagationPolicy, now: DateTime<Utc>) -> CommitOutcome {
        commit(
            &self.decisions,
            &self.document.entrees,
            &self.document.sorties,
            &self.document.modifications,
            &SnapshotChain::new(policy, now),
        )
    }
}
