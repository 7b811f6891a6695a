use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use crate::datetime::parse_date_expr;
use crate::event::{ActionType, EventPatch};
use crate::views::{SortBy, TaskFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Mod {
    Due(Option<DateTime<Utc>>),
    Patient(String),
    Date(DateTime<Utc>),
    Notes(String),
    Action(ActionType),
    Filter(TaskFilter),
    Sort(SortBy),
}

/// Free words joined with spaces, plus every `key:value` modifier.
/// Everything after a bare `--` is taken literally.
#[instrument(skip(args, now))]
pub(super) fn parse_text_and_mods(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut words = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" && !literal {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, now)? {
            mods.push(one_mod);
            continue;
        }

        words.push(arg.as_str());
    }

    Ok((words.join(" "), mods))
}

/// Title words plus an optional `due:`; other `word:` tokens belong to the
/// title.
#[instrument(skip(args, now))]
pub(super) fn parse_title_and_due(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(String, Option<DateTime<Utc>>)> {
    let mut words = Vec::new();
    let mut due_date = None;

    let mut literal = false;
    for arg in args {
        if arg == "--" && !literal {
            literal = true;
            continue;
        }

        if !literal && let Some(value) = arg.strip_prefix("due:") {
            due_date = parse_optional_date(value, now)?;
            continue;
        }

        words.push(arg.as_str());
    }

    Ok((words.join(" "), due_date))
}

/// Like [`parse_text_and_mods`] but for commands that take no free text.
#[instrument(skip(args, now))]
pub(super) fn parse_mods(args: &[String], now: DateTime<Utc>) -> anyhow::Result<Vec<Mod>> {
    let mut mods = Vec::new();
    for arg in args {
        if let Some(one_mod) = parse_one_mod(arg, now)? {
            mods.push(one_mod);
        } else {
            warn!(arg = %arg, "unrecognized modifier token ignored");
        }
    }
    Ok(mods)
}

fn parse_one_mod(tok: &str, now: DateTime<Utc>) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };

    let parsed = match key.to_ascii_lowercase().as_str() {
        "due" => Mod::Due(parse_optional_date(value, now)?),
        "patient" | "name" => Mod::Patient(value.to_string()),
        "date" | "at" | "when" => Mod::Date(parse_date_expr(value, now)?),
        "notes" | "note" => Mod::Notes(value.to_string()),
        "action" | "type" => Mod::Action(value.parse()?),
        "filter" | "show" => Mod::Filter(value.parse()?),
        "sort" => Mod::Sort(value.parse()?),
        _ => return Ok(None),
    };
    Ok(Some(parsed))
}

/// An empty value or `none` clears the date.
pub(super) fn parse_optional_date(
    value: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<DateTime<Utc>>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    parse_date_expr(value, now).map(Some)
}

/// Folds event modifiers into a patch; free text replaces the notes unless
/// an explicit `notes:` modifier is present.
pub(super) fn event_patch(text: String, mods: &[Mod]) -> anyhow::Result<EventPatch> {
    let mut patch = EventPatch::default();
    if !text.is_empty() {
        patch.notes = Some(text);
    }

    for one_mod in mods {
        match one_mod {
            Mod::Patient(name) => patch.patient_name = Some(name.clone()),
            Mod::Date(date) => patch.date = Some(*date),
            Mod::Notes(notes) => patch.notes = Some(notes.clone()),
            Mod::Action(action) => patch.action_type = Some(*action),
            other => return Err(anyhow!("modifier not valid for events: {other:?}")),
        }
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Mod, event_patch, parse_text_and_mods, parse_title_and_due};
    use crate::event::ActionType;
    use crate::views::SortBy;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_words_from_modifiers() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).single().expect("now");
        let (text, mods) =
            parse_text_and_mods(&args(&["Buy", "milk", "due:", "sort:title"]), now)
                .expect("parse");
        assert_eq!(text, "Buy milk");
        assert_eq!(mods, vec![Mod::Due(None), Mod::Sort(SortBy::Alphabetical)]);
    }

    #[test]
    fn double_dash_makes_rest_literal() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).single().expect("now");
        let (text, mods) =
            parse_text_and_mods(&args(&["--", "note:", "due:tomorrow"]), now).expect("parse");
        assert_eq!(text, "note: due:tomorrow");
        assert!(mods.is_empty());
    }

    #[test]
    fn unknown_keys_stay_in_text() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).single().expect("now");
        let (text, _) =
            parse_text_and_mods(&args(&["Re:", "labs", "at:10:30"]), now).expect("parse");
        assert_eq!(text, "Re: labs");
    }

    #[test]
    fn only_due_is_a_modifier_in_titles() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).single().expect("now");
        let (title, due) = parse_title_and_due(
            &args(&["Re:", "sort:", "files", "due:tomorrow", "--", "due:x"]),
            now,
        )
        .expect("parse");
        assert_eq!(title, "Re: sort: files due:x");
        assert!(due.is_some());
    }

    #[test]
    fn explicit_notes_beat_free_text() {
        let patch = event_patch(
            "free text".to_string(),
            &[
                Mod::Notes("explicit".to_string()),
                Mod::Action(ActionType::CallPatient),
            ],
        )
        .expect("patch");
        assert_eq!(patch.notes.as_deref(), Some("explicit"));
        assert_eq!(patch.action_type, Some(ActionType::CallPatient));
    }

    #[test]
    fn task_modifiers_are_rejected_for_events() {
        assert!(event_patch(String::new(), &[Mod::Due(None)]).is_err());
    }
}
