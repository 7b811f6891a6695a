use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use super::modifiers::{event_patch, parse_text_and_mods};
use super::require_targets;
use crate::event::{ActionType, EventDraft};
use crate::render::Renderer;
use crate::store::Store;

/// Without `date:` the event is booked for the current instant.
#[instrument(skip(store, args, now), fields(action = %action_type))]
pub(super) fn cmd_schedule(
    store: &mut Store,
    action_type: ActionType,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command schedule");

    let (text, mods) = parse_text_and_mods(args, now)?;
    let mut patch = event_patch(text, &mods)?;

    let patient_name = patch
        .patient_name
        .take()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| anyhow!("schedule: patient:<name> is required"))?;

    let draft = EventDraft {
        patient_name,
        date: patch.date.unwrap_or(now),
        notes: patch.notes.unwrap_or_default(),
        action_type: patch.action_type.unwrap_or(action_type),
    };
    let action_label = draft.action_type.label();

    match store.add_event(draft, now)? {
        Some(id) => println!("Created event {id} ({action_label})."),
        None => println!("Nothing scheduled."),
    }
    Ok(())
}

#[instrument(skip(store, renderer))]
pub(super) fn cmd_events(store: &Store, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command events");

    let mut rows: Vec<_> = store.events().iter().collect();
    rows.sort_by_key(|event| event.date);
    renderer.print_event_table(&rows)
}

#[instrument(skip(store, args, now))]
pub(super) fn cmd_reschedule(
    store: &mut Store,
    targets: &[u64],
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command reschedule");

    let [id] = require_targets("reschedule", targets)? else {
        return Err(anyhow!("reschedule: exactly one id is required"));
    };

    let (text, mods) = parse_text_and_mods(args, now)?;
    let patch = event_patch(text, &mods)?;
    if patch.is_empty() {
        return Err(anyhow!("reschedule: nothing to change"));
    }

    if store.update_event(*id, patch)? {
        println!("Updated event {id}.");
    } else {
        println!("No such event {id}.");
    }
    Ok(())
}

#[instrument(skip(store))]
pub(super) fn cmd_cancel(store: &mut Store, targets: &[u64]) -> anyhow::Result<()> {
    info!("command cancel");

    for &id in require_targets("cancel", targets)? {
        if store.remove_event(id)? {
            println!("Cancelled event {id}.");
        } else {
            println!("No such event {id}.");
        }
    }
    Ok(())
}
