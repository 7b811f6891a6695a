use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::calendar::YearMonth;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Calendar,
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Calendar => ViewMode::List,
            ViewMode::List => ViewMode::Calendar,
        }
    }

    pub fn as_key(self) -> &'static str {
        match self {
            ViewMode::Calendar => "calendar",
            ViewMode::List => "list",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for ViewMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calendar" | "cal" | "month" => Ok(ViewMode::Calendar),
            "list" => Ok(ViewMode::List),
            other => Err(anyhow!("unknown view mode: {other}")),
        }
    }
}

/// Presentation state that outlives a single invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub dark_mode: bool,

    #[serde(default)]
    pub view_mode: ViewMode,

    /// Month shown by the calendar view; `None` follows today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_month: Option<YearMonth>,
}

#[cfg(test)]
mod tests {
    use super::{Settings, ViewMode};

    #[test]
    fn defaults_fill_missing_keys() {
        let settings: Settings = serde_json::from_str(r#"{"darkMode":true}"#).expect("decode");
        assert!(settings.dark_mode);
        assert_eq!(settings.view_mode, ViewMode::Calendar);
    }

    #[test]
    fn view_mode_toggle_alternates() {
        assert_eq!(ViewMode::Calendar.toggled(), ViewMode::List);
        assert_eq!(ViewMode::Calendar.toggled().toggled(), ViewMode::Calendar);
    }
}
