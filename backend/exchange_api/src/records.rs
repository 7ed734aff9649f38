//! Persisted exchange records and their API shapes.

use offer_flow::files::FileKind;
use offer_flow::{OfferDetails, Side};
use serde::{Deserialize, Serialize};

/// Review status of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStatus {
    /// Every new exchange starts here.
    #[default]
    Pending,
    Approved,
    Rejected,
    Closed,
}

impl ExchangeStatus {
    /// Identifier stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Closed => "closed",
        }
    }
}

/// A file stored for an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub side: String,
    pub kind: String,
    /// Public path, as referenced by the details record.
    pub path: String,
    pub mime_type: String,
    pub size: i64,
}

impl StoredFile {
    pub fn new(side: Side, kind: FileKind, path: String, mime_type: &str, size: u64) -> Self {
        Self {
            side: side.part_prefix().to_string(),
            kind: kind.dir().to_string(),
            path,
            mime_type: mime_type.to_string(),
            size: i64::try_from(size).unwrap_or(i64::MAX),
        }
    }
}

/// Everything needed to insert one exchange.
#[derive(Debug, Clone)]
pub struct NewExchange {
    pub offered: OfferDetails,
    pub expected: OfferDetails,
    pub files: Vec<StoredFile>,
    pub created_at: i64,
}

impl NewExchange {
    /// Task list name: the title of what is offered.
    pub fn name(&self) -> &str {
        &self.offered.title
    }

    /// Wire name of the offered form of exchange, e.g. `Classic Sale`.
    pub fn type_of_exchange(&self) -> Option<String> {
        self.offered
            .form_of_exchange
            .and_then(|form| serde_json::to_value(form).ok())
            .and_then(|value| value.as_str().map(str::to_string))
    }

    pub fn end_date(&self) -> Option<String> {
        self.offered.end_date.map(|d| d.format("%Y-%m-%d").to_string())
    }
}

/// Body of a successful creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeCreated {
    pub id: i64,
    pub status: ExchangeStatus,
    pub created_at: i64,
}

/// One row of `GET /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskSummary {
    pub id: i64,
    pub name: String,
    pub typeofexchange: Option<String>,
    pub createddate: i64,
    pub enddate: Option<String>,
    pub status: String,
}

/// Raw `exchanges` row; details are JSON text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExchangeRow {
    pub id: i64,
    pub status: String,
    pub offered_details: String,
    pub expected_details: String,
    pub created_at: i64,
}

/// Full record returned by `GET /exchanges/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRecord {
    pub id: i64,
    pub status: String,
    pub created_at: i64,
    pub offered_details: OfferDetails,
    pub expected_details: OfferDetails,
    pub files: Vec<StoredFile>,
}
