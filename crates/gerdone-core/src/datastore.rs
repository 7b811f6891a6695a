use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::event::Event;
use crate::settings::Settings;
use crate::task::Task;

/// The on-disk files behind the store: one JSON array per collection plus the
/// settings object.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub events_path: PathBuf,
    pub settings_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.json");
        let events_path = data_dir.join("events.json");
        let settings_path = data_dir.join("settings.json");

        for path in [&tasks_path, &events_path] {
            if !path.exists() {
                fs::write(path, "[]")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            events = %events_path.display(),
            settings = %settings_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            events_path,
            settings_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_json_array(&self.tasks_path).context("failed to load tasks.json")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<Event>> {
        load_json_array(&self.events_path).context("failed to load events.json")
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_json_atomic(&self.tasks_path, tasks).context("failed to save tasks.json")
    }

    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    pub fn save_events(&self, events: &[Event]) -> anyhow::Result<()> {
        save_json_atomic(&self.events_path, events).context("failed to save events.json")
    }

    /// A missing or unreadable settings file yields the defaults.
    #[tracing::instrument(skip(self))]
    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        if !self.settings_path.exists() {
            debug!("no settings file; using defaults");
            return Ok(Settings::default());
        }

        let raw = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("failed reading {}", self.settings_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Settings::default());
        }

        match serde_json::from_str::<Settings>(&raw) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                warn!(
                    file = %self.settings_path.display(),
                    error = %err,
                    "unreadable settings; using defaults"
                );
                Ok(Settings::default())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        save_json_atomic(&self.settings_path, settings).context("failed to save settings.json")
    }
}

/// Reads a JSON array, skipping records that do not decode.
#[tracing::instrument(skip(path))]
fn load_json_array<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading json array");
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(record) => out.push(record),
            Err(err) => warn!(
                file = %path.display(),
                index = idx,
                error = %err,
                "skipping malformed record"
            ),
        }
    }

    debug!(count = out.len(), "loaded records");
    Ok(out)
}

#[tracing::instrument(skip(path, value))]
fn save_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
