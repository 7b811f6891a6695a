use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::iso_date_serde;

/// The fixed set of patient interactions an event can schedule.
///
/// Serialized as the human label, which is also what the calendar shows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActionType {
    #[serde(rename = "Schedule a Call")]
    ScheduleCall,
    #[serde(rename = "Send a Message")]
    SendMessage,
    #[serde(rename = "Call Patient")]
    CallPatient,
    #[serde(rename = "Create Reminder")]
    CreateReminder,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::ScheduleCall,
        ActionType::SendMessage,
        ActionType::CallPatient,
        ActionType::CreateReminder,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ActionType::ScheduleCall => "Schedule a Call",
            ActionType::SendMessage => "Send a Message",
            ActionType::CallPatient => "Call Patient",
            ActionType::CreateReminder => "Create Reminder",
        }
    }

    /// Quick-action command that creates an event of this type.
    pub fn shortcut(self) -> &'static str {
        match self {
            ActionType::ScheduleCall => "video",
            ActionType::SendMessage => "message",
            ActionType::CallPatient => "call",
            ActionType::CreateReminder => "remind",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ActionType::ALL
            .into_iter()
            .find(|action| {
                action.label().eq_ignore_ascii_case(&wanted) || action.shortcut() == wanted
            })
            .or(match wanted.as_str() {
                "schedule-call" | "schedule" => Some(ActionType::ScheduleCall),
                "send-message" | "msg" => Some(ActionType::SendMessage),
                "call-patient" => Some(ActionType::CallPatient),
                "reminder" | "create-reminder" => Some(ActionType::CreateReminder),
                _ => None,
            })
            .ok_or_else(|| {
                anyhow!(
                    "unknown action type: {s} (expected one of video, message, call, remind)"
                )
            })
    }
}

/// A scheduled patient interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: u64,

    #[serde(default)]
    pub patient_name: String,

    #[serde(with = "iso_date_serde")]
    pub date: DateTime<Utc>,

    #[serde(default)]
    pub notes: String,

    pub action_type: ActionType,
}

/// Input captured for a new event before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub patient_name: String,
    pub date: DateTime<Utc>,
    pub notes: String,
    pub action_type: ActionType,
}

/// Changes to an existing event; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub patient_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub action_type: Option<ActionType>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.patient_name.is_none()
            && self.date.is_none()
            && self.notes.is_none()
            && self.action_type.is_none()
    }

    pub(crate) fn apply_to(self, event: &mut Event) {
        if let Some(name) = self.patient_name
            && !name.trim().is_empty()
        {
            event.patient_name = name;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(notes) = self.notes {
            event.notes = notes;
        }
        if let Some(action_type) = self.action_type {
            event.action_type = action_type;
        }
    }
}
