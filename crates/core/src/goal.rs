use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Rank given to items whose account has no goal, or whose goal priority is
/// not a recognized spelling.
pub const UNRANKED: u32 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialGoal {
    #[serde(rename = "compteAssocie")]
    pub account: String,
    #[serde(rename = "dateEcheance", default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    /// Free-form priority as entered; French and English spellings both occur.
    #[serde(rename = "priorite", default)]
    pub priority: String,
}

impl FinancialGoal {
    pub fn new(account: &str, deadline: Option<NaiveDate>, priority: &str) -> Self {
        FinancialGoal {
            account: account.to_string(),
            deadline,
            priority: priority.to_string(),
        }
    }

    /// 1 for high, 2 for medium, 3 for low, [`UNRANKED`] otherwise.
    pub fn rank(&self) -> u32 {
        match self.priority.trim().to_lowercase().as_str() {
            "haute" | "high" => 1,
            "moyenne" | "medium" => 2,
            "basse" | "low" => 3,
            _ => UNRANKED,
        }
    }
}

/// The first goal tied to `account`, if any.
pub fn goal_for_account<'a>(goals: &'a [FinancialGoal], account: &str) -> Option<&'a FinancialGoal> {
    goals.iter().find(|g| !account.is_empty() && g.account == account)
}
