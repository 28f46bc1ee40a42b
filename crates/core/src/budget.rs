use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::PlanError;
use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(rename = "entree")]
    Income,
    #[serde(rename = "sortie")]
    Expense,
}

impl ItemType {
    pub fn opposite(self) -> Self {
        match self {
            ItemType::Income => ItemType::Expense,
            ItemType::Expense => ItemType::Income,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Income => write!(f, "entree"),
            ItemType::Expense => write!(f, "sortie"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Same day of every month.
    #[serde(rename = "mensuel")]
    Monthly,
    /// Same weekday of every week.
    #[serde(rename = "hebdomadaire")]
    Weekly,
    /// Every 14 days from a reference date.
    #[serde(rename = "bimensuel")]
    Biweekly,
    /// The 1st and the 15th of every month.
    #[serde(rename = "quinzaine")]
    SemiMonthly,
    /// One month and day each year.
    #[serde(rename = "annuel")]
    Annual,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Monthly => write!(f, "mensuel"),
            Frequency::Weekly => write!(f, "hebdomadaire"),
            Frequency::Biweekly => write!(f, "bimensuel"),
            Frequency::SemiMonthly => write!(f, "quinzaine"),
            Frequency::Annual => write!(f, "annuel"),
        }
    }
}

/// Which end of the planning window an optimization is scheduled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationPeriod {
    /// Starts from the next occurrences after today.
    #[default]
    Ascending,
    /// Starts from the last occurrences before the plan horizon.
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Optimization {
    #[default]
    Disabled,
    Percentage {
        value: Decimal,
        #[serde(default)]
        period: OptimizationPeriod,
    },
    Fixed {
        value: Decimal,
        #[serde(default)]
        period: OptimizationPeriod,
    },
}

impl Optimization {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Optimization::Disabled)
    }

    pub fn period(&self) -> Option<OptimizationPeriod> {
        match self {
            Optimization::Disabled => None,
            Optimization::Percentage { period, .. } | Optimization::Fixed { period, .. } => {
                Some(*period)
            }
        }
    }

    /// The amount after one optimization step, or `None` when disabled.
    pub fn apply(&self, amount: Money) -> Option<Money> {
        match self {
            Optimization::Disabled => None,
            Optimization::Percentage { value, .. } => Some(amount.grow_by_percent(*value)),
            Optimization::Fixed { value, .. } => Some(Money::from_decimal(amount.amount() + value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetItem {
    #[serde(default)]
    pub id: String,
    pub description: String,
    #[serde(rename = "montant")]
    pub amount: Money,
    #[serde(rename = "compte", default)]
    pub account: String,
    #[serde(rename = "categorie", default)]
    pub category: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(rename = "frequence")]
    pub frequency: Frequency,
    #[serde(rename = "jourRecurrence", default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    #[serde(rename = "jourSemaine", default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<u32>,
    #[serde(rename = "moisRecurrence", default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(rename = "dateReference", default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
    #[serde(default)]
    pub optimization: Optimization,
}

impl BudgetItem {
    pub fn new(
        description: &str,
        account: &str,
        item_type: ItemType,
        amount: Money,
        frequency: Frequency,
    ) -> Self {
        BudgetItem {
            id: String::new(),
            description: description.to_string(),
            amount,
            account: account.to_string(),
            category: String::new(),
            item_type,
            frequency,
            day_of_month: None,
            weekday: None,
            month: None,
            reference_date: None,
            optimization: Optimization::Disabled,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.item_type, &self.description, &self.account)
    }

    /// Identity used to locate an item inside a snapshot's arrays.
    pub fn is_at(&self, description: &str, account: &str) -> bool {
        self.description == description && self.account == account
    }

    /// Checks that the fields the schedule needs are present and in range.
    pub fn validate_schedule(&self) -> Result<(), PlanError> {
        let missing = |field: &'static str| PlanError::MissingScheduleField {
            field,
            description: self.description.clone(),
        };
        let day = |d: Option<u32>| -> Result<(), PlanError> {
            match d {
                Some(d) if (1..=31).contains(&d) => Ok(()),
                Some(d) => Err(PlanError::InvalidDayOfMonth(d)),
                None => Err(missing("jourRecurrence")),
            }
        };
        match self.frequency {
            Frequency::Monthly => day(self.day_of_month),
            Frequency::Weekly => match self.weekday {
                Some(w) if w <= 6 => Ok(()),
                Some(w) => Err(PlanError::InvalidWeekday(w)),
                None => Err(missing("jourSemaine")),
            },
            Frequency::Biweekly => self.reference_date.map(|_| ()).ok_or_else(|| missing("dateReference")),
            Frequency::SemiMonthly => Ok(()),
            Frequency::Annual => {
                day(self.day_of_month)?;
                match self.month {
                    Some(m) if (1..=12).contains(&m) => Ok(()),
                    Some(m) => Err(PlanError::InvalidMonth(m)),
                    None => Err(missing("moisRecurrence")),
                }
            }
        }
    }
}

/// Composite identity of a budget line: type, description and account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub description: String,
    #[serde(rename = "compte")]
    pub account: String,
}

impl ItemKey {
    pub fn new(item_type: ItemType, description: &str, account: &str) -> Self {
        ItemKey {
            item_type,
            description: description.to_string(),
            account: account.to_string(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.item_type, self.description, self.account)
    }
}

/// Returns the array holding items of `item_type`.
pub fn items_of<'a>(
    item_type: ItemType,
    entrees: &'a [BudgetItem],
    sorties: &'a [BudgetItem],
) -> &'a [BudgetItem] {
    match item_type {
        ItemType::Income => entrees,
        ItemType::Expense => sorties,
    }
}
