mod event_ops;
mod modifiers;
mod task_ops;
mod view_ops;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::event::ActionType;
use crate::render::Renderer;
use crate::store::Store;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show",
        "add",
        "list",
        "calendar",
        "done",
        "edit",
        "due",
        "delete",
        "info",
        "schedule",
        "video",
        "message",
        "call",
        "remind",
        "events",
        "reschedule",
        "cancel",
        "view",
        "theme",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

/// Exact names win; otherwise a prefix must match exactly one command.
pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut Store,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    run_command(store, cfg, renderer, inv, Utc::now())
}

/// [`dispatch`] against a fixed clock.
#[instrument(skip(store, cfg, renderer, inv, now), fields(command = %inv.command))]
pub fn run_command(
    store: &mut Store,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    debug!(
        targets = ?inv.targets,
        args = ?inv.command_args,
        "dispatching command"
    );

    let targets = inv.targets.as_slice();
    let args = inv.command_args.as_slice();

    match inv.command.as_str() {
        "show" => view_ops::cmd_show(store, cfg, renderer, now),
        "list" => view_ops::cmd_list(store, cfg, renderer, args, now),
        "calendar" => view_ops::cmd_calendar(store, cfg, renderer, args, now),
        "view" => view_ops::cmd_view(store, args),
        "theme" => view_ops::cmd_theme(store, renderer, args),
        "add" => task_ops::cmd_add(store, args, now),
        "done" => task_ops::cmd_done(store, targets),
        "edit" => task_ops::cmd_edit(store, targets, args),
        "due" => task_ops::cmd_due(store, targets, args, now),
        "delete" => task_ops::cmd_delete(store, targets),
        "info" => cmd_info(store, renderer, targets),
        "schedule" => {
            let (action, rest) = args
                .split_first()
                .ok_or_else(|| anyhow!("schedule: action type is required"))?;
            event_ops::cmd_schedule(store, action.parse()?, rest, now)
        }
        "video" => event_ops::cmd_schedule(store, ActionType::ScheduleCall, args, now),
        "message" => event_ops::cmd_schedule(store, ActionType::SendMessage, args, now),
        "call" => event_ops::cmd_schedule(store, ActionType::CallPatient, args, now),
        "remind" => event_ops::cmd_schedule(store, ActionType::CreateReminder, args, now),
        "events" => event_ops::cmd_events(store, renderer),
        "reschedule" => event_ops::cmd_reschedule(store, targets, args, now),
        "cancel" => event_ops::cmd_cancel(store, targets),
        "_commands" => cmd_commands(),
        "_show" => cmd_show_config(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn require_targets<'a>(command: &str, targets: &'a [u64]) -> anyhow::Result<&'a [u64]> {
    if targets.is_empty() {
        return Err(anyhow!("{command}: at least one id is required"));
    }
    Ok(targets)
}

#[instrument(skip(store, renderer))]
fn cmd_info(store: &Store, renderer: &Renderer, targets: &[u64]) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    let mut found = 0_usize;

    for &id in require_targets("info", targets)? {
        if let Some(task) = store.task(id) {
            renderer.write_task_info(&mut out, task)?;
            println!();
            found += 1;
        }
        if let Some(event) = store.event(id) {
            renderer.write_event_info(&mut out, event)?;
            println!();
            found += 1;
        }
    }

    if found == 0 {
        return Err(anyhow!("no task or event matches {targets:?}"));
    }
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show_config(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
usage: gerdone [ids] <command> [args]

views
  show                                  render the current view mode
  list [filter:all|active|completed] [sort:added|title|due]
  calendar [YYYY-MM|prev|next|today]
  view [calendar|list|toggle]
  theme [dark|light|toggle]

tasks
  add <title> [due:<date>]
  <id> done                             toggle completion
  <id> edit <title>
  <id> due <date|none>
  <id> delete
  <id> info

events
  schedule <action> patient:<name> [date:<when>] [notes...]
  video | message | call | remind       shortcuts for schedule
  events
  <id> reschedule [patient:..] [date:..] [action:..] [notes...]
  <id> cancel

actions: video = Schedule a Call, message = Send a Message,
         call = Call Patient, remind = Create Reminder"
    );
    Ok(())
}
