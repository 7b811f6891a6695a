use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::modifiers::{Mod, parse_mods};
use crate::calendar::{MonthGrid, YearMonth};
use crate::config::Config;
use crate::datetime::project_today;
use crate::render::Renderer;
use crate::settings::ViewMode;
use crate::store::Store;
use crate::views::{SortBy, TaskFilter, visible_tasks};

#[instrument(skip(store, cfg, renderer, now))]
pub(super) fn cmd_show(
    store: &mut Store,
    cfg: &Config,
    renderer: &Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match store.settings().view_mode {
        ViewMode::Calendar => cmd_calendar(store, cfg, renderer, &[], now),
        ViewMode::List => cmd_list(store, cfg, renderer, &[], now),
    }
}

#[instrument(skip(store, cfg, renderer, args, now))]
pub(super) fn cmd_list(
    store: &Store,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let (filter, sort) = view_options(cfg, args, now)?;
    let rows = visible_tasks(store.tasks(), filter, sort);
    renderer.print_list_view(&rows, store.events(), filter, sort, now)
}

/// `prev`/`next` step from the remembered month, `today` forgets it, and
/// `YYYY-MM` jumps to (and remembers) a month.
#[instrument(skip(store, cfg, renderer, args, now))]
pub(super) fn cmd_calendar(
    store: &mut Store,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command calendar");

    let today = project_today(now);
    let current = store
        .settings()
        .focus_month
        .unwrap_or_else(|| YearMonth::containing(now));

    let (mods, nav): (Vec<String>, Vec<String>) =
        args.iter().cloned().partition(|arg| arg.contains(':'));

    let month = match nav.as_slice() {
        [] => current,
        [one] => match one.to_ascii_lowercase().as_str() {
            "prev" | "previous" => current.prev(),
            "next" => current.next(),
            "today" | "now" => YearMonth::containing(now),
            other => other.parse()?,
        },
        _ => return Err(anyhow!("calendar: expected one of YYYY-MM, prev, next, today")),
    };

    let focus = (month != YearMonth::containing(now)).then_some(month);
    if focus != store.settings().focus_month {
        debug!(?focus, "remembering calendar month");
        store.set_focus_month(focus)?;
    }

    let (filter, sort) = view_options(cfg, &mods, now)?;
    let rows = visible_tasks(store.tasks(), filter, sort);
    let grid = MonthGrid::build(month, cfg.week_start(), rows, store.events(), today);
    renderer.print_month(&grid)
}

#[instrument(skip(store, args))]
pub(super) fn cmd_view(store: &mut Store, args: &[String]) -> anyhow::Result<()> {
    info!("command view");

    let mode = match args.first().map(String::as_str) {
        None | Some("toggle") => store.toggle_view_mode()?,
        Some(raw) => {
            let mode: ViewMode = raw.parse()?;
            store.set_view_mode(mode)?;
            mode
        }
    };
    println!("View mode: {mode}.");
    Ok(())
}

#[instrument(skip(store, renderer, args))]
pub(super) fn cmd_theme(
    store: &mut Store,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command theme");

    let dark_mode = match args.first().map(|s| s.to_ascii_lowercase()).as_deref() {
        None | Some("toggle") => store.toggle_dark_mode()?,
        Some("dark" | "on") => {
            store.set_dark_mode(true)?;
            true
        }
        Some("light" | "off") => {
            store.set_dark_mode(false)?;
            false
        }
        Some(other) => return Err(anyhow!("theme: expected dark, light or toggle, got {other}")),
    };
    renderer.set_dark_mode(dark_mode);
    println!("Dark mode {}.", if dark_mode { "on" } else { "off" });
    Ok(())
}

/// Configured defaults overridden by `filter:` and `sort:` modifiers.
fn view_options(
    cfg: &Config,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(TaskFilter, SortBy)> {
    let mut filter = cfg.default_filter()?;
    let mut sort = cfg.default_sort()?;
    for one_mod in parse_mods(args, now)? {
        match one_mod {
            Mod::Filter(value) => filter = value,
            Mod::Sort(value) => sort = value,
            other => return Err(anyhow!("modifier not valid for views: {other:?}")),
        }
    }
    Ok((filter, sort))
}
