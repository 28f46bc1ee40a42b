use budgetflow_core::{items_of, BudgetItem, ItemKey};

/// Finds the opposite leg of a transfer between two accounts.
///
/// Two lines are twins when they have opposite types, share frequency and day
/// of month, sit on two different non-empty accounts, and have the same base
/// name. Every condition is symmetric, so `a` is a twin of `b` exactly when
/// `b` is a twin of `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwinMatcher {
    pub match_amount: bool,
}

impl TwinMatcher {
    /// For spotting pairs before anything is edited: amounts must agree.
    pub fn detection() -> Self {
        Self { match_amount: true }
    }

    /// For carrying an amount change over to the other leg; the amount is
    /// what is changing, so it is not compared.
    pub fn propagation() -> Self {
        Self { match_amount: false }
    }

    pub fn find_twin<'a>(
        &self,
        item: &BudgetItem,
        entrees: &'a [BudgetItem],
        sorties: &'a [BudgetItem],
    ) -> Option<&'a BudgetItem> {
        items_of(item.item_type.opposite(), entrees, sorties)
            .iter()
            .find(|candidate| self.is_twin(item, candidate))
    }

    pub fn is_twin(&self, a: &BudgetItem, b: &BudgetItem) -> bool {
        if a.item_type == b.item_type
            || a.frequency != b.frequency
            || a.day_of_month != b.day_of_month
        {
            return false;
        }
        if a.account.is_empty() || b.account.is_empty() || a.account == b.account {
            return false;
        }
        if self.match_amount && !a.amount.within_cent(b.amount) {
            return false;
        }
        base_name(&a.description) == base_name(&b.description)
    }

    /// Every income line paired with its expense twin, in income order.
    pub fn pairs(&self, entrees: &[BudgetItem], sorties: &[BudgetItem]) -> Vec<(ItemKey, ItemKey)> {
        entrees
            .iter()
            .filter_map(|e| {
                self.find_twin(e, entrees, sorties)
                    .map(|s| (e.key(), s.key()))
            })
            .collect()
    }
}

/// Text before the first `-`, trimmed and lowercased.
pub fn base_name(description: &str) -> String {
    description
        .split('-')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetflow_core::{Frequency, ItemType, Money};

    fn line(item_type: ItemType, desc: &str, account: &str, cents: i64, day: u32) -> BudgetItem {
        let mut item = BudgetItem::new(desc, account, item_type, Money::from_cents(cents), Frequency::Monthly);
        item.day_of_month = Some(day);
        item
    }

    fn transfer_pair() -> (Vec<BudgetItem>, Vec<BudgetItem>) {
        (
            vec![
                line(ItemType::Income, "Salaire", "Cheques", 300000, 1),
                line(ItemType::Income, "Transfert - Epargne", "Cheques", 20000, 1),
            ],
            vec![
                line(ItemType::Expense, "Loyer", "Cheques", 120000, 1),
                line(ItemType::Expense, "Transfert - Cheques", "Epargne", 20000, 1),
            ],
        )
    }

    #[test]
    fn base_name_takes_prefix() {
        assert_eq!(base_name("Transfert - Epargne"), "transfert");
        assert_eq!(base_name("  REER-2025 "), "reer");
        assert_eq!(base_name("Loyer"), "loyer");
        assert_eq!(base_name(""), "");
    }

    #[test]
    fn detection_finds_transfer_leg() {
        let (entrees, sorties) = transfer_pair();
        let twin = TwinMatcher::detection().find_twin(&entrees[1], &entrees, &sorties).unwrap();
        assert_eq!(twin.description, "Transfert - Cheques");
        assert_eq!(twin.account, "Epargne");
    }

    #[test]
    fn matching_is_symmetric() {
        let (entrees, sorties) = transfer_pair();
        for matcher in [TwinMatcher::detection(), TwinMatcher::propagation()] {
            let b = matcher.find_twin(&entrees[1], &entrees, &sorties).unwrap();
            let a = matcher.find_twin(b, &entrees, &sorties).unwrap();
            assert_eq!(a, &entrees[1]);
        }
    }

    #[test]
    fn detection_requires_equal_amounts() {
        let (mut entrees, sorties) = transfer_pair();
        entrees[1].amount = Money::from_cents(25000);
        assert!(TwinMatcher::detection().find_twin(&entrees[1], &entrees, &sorties).is_none());
        assert!(TwinMatcher::propagation().find_twin(&entrees[1], &entrees, &sorties).is_some());
    }

    #[test]
    fn same_account_is_not_a_transfer() {
        let entrees = vec![line(ItemType::Income, "Ajustement - A", "Cheques", 5000, 1)];
        let sorties = vec![line(ItemType::Expense, "Ajustement - B", "Cheques", 5000, 1)];
        assert!(TwinMatcher::detection().find_twin(&entrees[0], &entrees, &sorties).is_none());
    }

    #[test]
    fn blank_account_never_matches() {
        let entrees = vec![line(ItemType::Income, "Transfert", "", 5000, 1)];
        let sorties = vec![line(ItemType::Expense, "Transfert", "Epargne", 5000, 1)];
        assert!(TwinMatcher::propagation().find_twin(&entrees[0], &entrees, &sorties).is_none());
        assert!(TwinMatcher::propagation().find_twin(&sorties[0], &entrees, &sorties).is_none());
    }

    #[test]
    fn schedule_must_agree() {
        let (entrees, mut sorties) = transfer_pair();
        sorties[1].day_of_month = Some(2);
        assert!(TwinMatcher::propagation().find_twin(&entrees[1], &entrees, &sorties).is_none());
        sorties[1].day_of_month = Some(1);
        sorties[1].frequency = Frequency::SemiMonthly;
        assert!(TwinMatcher::propagation().find_twin(&entrees[1], &entrees, &sorties).is_none());
    }

    #[test]
    fn pairs_lists_each_transfer_once() {
        let (entrees, sorties) = transfer_pair();
        let pairs = TwinMatcher::detection().pairs(&entrees, &sorties);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, entrees[1].key());
        assert_eq!(pairs[0].1, sorties[1].key());
    }
}
