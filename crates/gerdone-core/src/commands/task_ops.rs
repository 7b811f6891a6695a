use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::modifiers::{parse_optional_date, parse_title_and_due};
use super::require_targets;
use crate::store::Store;

#[instrument(skip(store, args, now))]
pub(super) fn cmd_add(
    store: &mut Store,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let (title, due_date) = parse_title_and_due(args, now)?;
    if title.trim().is_empty() {
        return Err(anyhow!("add: title is required"));
    }

    match store.add_task(&title, due_date, now)? {
        Some(id) => println!("Created task {id}."),
        None => println!("Nothing added."),
    }
    Ok(())
}

#[instrument(skip(store))]
pub(super) fn cmd_done(store: &mut Store, targets: &[u64]) -> anyhow::Result<()> {
    info!("command done");

    for &id in require_targets("done", targets)? {
        if !store.toggle_task(id)? {
            println!("No such task {id}.");
            continue;
        }
        let state = match store.task(id) {
            Some(task) if task.completed => "completed",
            _ => "active",
        };
        println!("Task {id} marked {state}.");
    }
    Ok(())
}

#[instrument(skip(store, args))]
pub(super) fn cmd_edit(store: &mut Store, targets: &[u64], args: &[String]) -> anyhow::Result<()> {
    info!("command edit");

    let [id] = require_targets("edit", targets)? else {
        return Err(anyhow!("edit: exactly one id is required"));
    };
    let title = args.join(" ");
    if title.trim().is_empty() {
        return Err(anyhow!("edit: new title is required"));
    }

    if store.task(*id).is_none() {
        println!("No such task {id}.");
        return Ok(());
    }
    store.rename_task(*id, &title)?;
    println!("Renamed task {id}.");
    Ok(())
}

#[instrument(skip(store, args, now))]
pub(super) fn cmd_due(
    store: &mut Store,
    targets: &[u64],
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command due");

    let targets = require_targets("due", targets)?;
    let raw = args.join(" ");
    let raw = raw.strip_prefix("due:").unwrap_or(&raw);
    let due_date = parse_optional_date(raw, now)?;
    debug!(?due_date, "resolved due date");

    for &id in targets {
        if !store.set_due_date(id, due_date)? {
            println!("No such task {id}.");
        } else if due_date.is_some() {
            println!("Set due date of task {id}.");
        } else {
            println!("Cleared due date of task {id}.");
        }
    }
    Ok(())
}

#[instrument(skip(store))]
pub(super) fn cmd_delete(store: &mut Store, targets: &[u64]) -> anyhow::Result<()> {
    info!("command delete");

    for &id in require_targets("delete", targets)? {
        if store.remove_task(id)? {
            println!("Deleted task {id}.");
        } else {
            println!("No such task {id}.");
        }
    }
    Ok(())
}
