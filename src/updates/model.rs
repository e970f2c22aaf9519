use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::appointments::OfficeCalendar;

const NO_TITLE: &str = "No title";
const NO_DESCRIPTION: &str = "No description";
const NO_DATE: &str = "No date";

/// An announcement as stored. Staff tooling may leave any field out.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePost {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Free-text date, shown only when there is no `published_at`.
    pub date_label: Option<String>,
}

/// What the feed returns: every display field is filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// e.g. "March 1, 2025", in office time
    pub date: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl UpdateItem {
    pub fn from_post(post: UpdatePost, calendar: &OfficeCalendar) -> Self {
        let date = match post.published_at {
            Some(at) => calendar.local_date(at).format("%B %-d, %Y").to_string(),
            None => or_default(post.date_label, NO_DATE),
        };
        UpdateItem {
            id: post.id,
            title: or_default(post.title, NO_TITLE),
            description: or_default(post.description, NO_DESCRIPTION),
            date,
            published_at: post.published_at,
        }
    }
}

fn or_default(value: Option<String>, fallback: &str) -> String {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
