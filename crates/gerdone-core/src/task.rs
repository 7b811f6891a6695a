use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::iso_date_serde;

/// A to-do item.
///
/// Field names follow the camelCase keys of the persisted `tasks.json` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Millisecond timestamp taken when the task was created.
    pub id: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(with = "iso_date_serde")]
    pub date_added: DateTime<Utc>,

    #[serde(default, with = "iso_date_serde::option")]
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: u64, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            completed: false,
            date_added: now,
            due_date: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.completed
    }
}
