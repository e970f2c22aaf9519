use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

const MISSING_FIELDS: &str = "Please fill in all fields.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConcernCategory {
    #[default]
    General,
    Road,
    Garbage,
    Water,
    Electricity,
}

impl ConcernCategory {
    pub const ALL: [ConcernCategory; 5] = [
        ConcernCategory::General,
        ConcernCategory::Road,
        ConcernCategory::Garbage,
        ConcernCategory::Water,
        ConcernCategory::Electricity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConcernCategory::General => "General",
            ConcernCategory::Road => "Road",
            ConcernCategory::Garbage => "Garbage",
            ConcernCategory::Water => "Water",
            ConcernCategory::Electricity => "Electricity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s.trim())
    }
}

/// Concern status is advanced by office staff; citizens only ever create
/// Pending concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcernStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl ConcernStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConcernStatus::Pending => "Pending",
            ConcernStatus::InProgress => "In Progress",
            ConcernStatus::Resolved => "Resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(ConcernStatus::Pending),
            "In Progress" => Some(ConcernStatus::InProgress),
            "Resolved" => Some(ConcernStatus::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for ConcernStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Concern {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: ConcernCategory,
    pub status: ConcernStatus,
    pub evidence_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcernDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidConcern {
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: ConcernCategory,
}

impl ConcernDraft {
    pub fn validate(&self) -> Result<ValidConcern, AppError> {
        let required = |field: &'static str, value: &str| -> Result<String, AppError> {
            let v = value.trim();
            if v.is_empty() {
                return Err(AppError::invalid(field, MISSING_FIELDS));
            }
            Ok(v.to_string())
        };
        let title = required("title", &self.title)?;
        let description = required("description", &self.description)?;
        let location = required("location", &self.location)?;

        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => ConcernCategory::default(),
            Some(raw) => ConcernCategory::parse(raw)
                .ok_or_else(|| AppError::invalid("category", "Please select a valid category."))?,
        };

        Ok(ValidConcern {
            title,
            description,
            location,
            category,
        })
    }
}
