use std::fmt;

use serde::{Deserialize, Serialize};

/// A single transaction in canonical form, whatever layout it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub date: String,
    pub account: String,
    /// Empty means uncategorized.
    pub category: String,
    pub amount: f64,
    pub description: String,
}

impl ActivityRecord {
    /// Builds a record, coercing a non-finite amount to zero.
    pub fn new(
        id: impl Into<String>,
        date: impl Into<String>,
        account: impl Into<String>,
        category: impl Into<String>,
        amount: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            account: account.into(),
            category: category.into(),
            amount: if amount.is_finite() { amount } else { 0.0 },
            description: description.into(),
        }
    }

    /// Returns a new record with the patch applied; `self` is left as is.
    pub fn with_patch(&self, patch: &ActivityPatch) -> Self {
        Self::new(
            self.id.clone(),
            patch.date.clone().unwrap_or_else(|| self.date.clone()),
            patch.account.clone().unwrap_or_else(|| self.account.clone()),
            patch.category.clone().unwrap_or_else(|| self.category.clone()),
            patch.amount.unwrap_or(self.amount),
            patch
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
        )
    }

    /// Same record under a different id.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..self.clone()
        }
    }
}

/// Partial update for an existing record. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPatch {
    pub date: Option<String>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
}

impl ActivityPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.account.is_none()
            && self.category.is_none()
            && self.amount.is_none()
            && self.description.is_none()
    }
}

/// One previously ingested file, as known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadRecord {
    pub checksum: String,
    pub start_date: String,
    pub end_date: String,
}

/// Opaque pagination token handed out by the store. Callers only hand it back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPage {
    pub records: Vec<ActivityRecord>,
    pub next_cursor: Option<PageCursor>,
}

impl ActivityPage {
    pub fn has_more(&self) -> bool {
        self.next_cursor.as_ref().is_some_and(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFilters {
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    /// Id of a record whose near-dated matching or offsetting activities are wanted.
    pub related_to: Option<String>,
}

/// Access token for the store. Obtained outside this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for a blank token, which callers treat as "not authenticated".
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub category: String,
    pub amount: f64,
}

/// Per-category totals for one reporting period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub categories: Vec<CategoryAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdownEntry {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBreakdownEntry {
    pub month: String,
    pub amount: f64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// One month's spending split into its largest categories plus an `Others` remainder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCategoryBreakdown {
    pub month: String,
    pub amount: f64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub breakdown: Vec<CategoryBreakdownEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTrendPoint {
    pub month: String,
    pub amount: f64,
}
