use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::calendar::parse_week_start;
use crate::views::{
  SortBy,
  TaskFilter
};

const RC_FILE_NAME: &str = ".gerdonerc";
const RC_ENV_VAR: &str = "GERDONERC";
const DEFAULT_DATA_DIR: &str =
  ".gerdone";

/// Key/value settings read from the rc
/// file, with built-in defaults
/// underneath.
#[derive(Debug, Clone)]
pub struct Config {
  map: BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let map = [
      ("data.location", "~/.gerdone"),
      ("default.command", "show"),
      ("default.filter", "all"),
      ("default.sort", "added"),
      ("calendar.weekstart", "sunday"),
      ("color", "on")
    ]
    .into_iter()
    .map(|(k, v)| {
      (k.to_string(), v.to_string())
    })
    .collect();

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match resolve_rc_path(rc_override)? {
      | Some(path) => {
        info!(rc = %path.display(), "loading rc file");
        cfg.load_file(&path)?;
      }
      | None => {
        debug!(
          "no rc file found; using \
           defaults"
        );
      }
    }

    Ok(cfg)
  }

  /// Parses rc text directly; includes
  /// resolve against `base_dir`.
  pub fn from_text(
    text: &str,
    base_dir: &Path
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();
    cfg.apply_text(
      text,
      base_dir,
      Path::new("<inline>")
    )?;
    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn default_command(
    &self
  ) -> String {
    self
      .get("default.command")
      .unwrap_or_else(|| {
        "show".to_string()
      })
  }

  pub fn default_filter(
    &self
  ) -> anyhow::Result<TaskFilter> {
    self
      .get("default.filter")
      .map_or(
        Ok(TaskFilter::default()),
        |raw| raw.parse()
      )
      .context("default.filter")
  }

  pub fn default_sort(
    &self
  ) -> anyhow::Result<SortBy> {
    self
      .get("default.sort")
      .map_or(
        Ok(SortBy::default()),
        |raw| raw.parse()
      )
      .context("default.sort")
  }

  pub fn week_start(&self) -> Weekday {
    self
      .get("calendar.weekstart")
      .map_or(Weekday::Sun, |raw| {
        parse_week_start(&raw)
      })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let path = fs::canonicalize(&path)
      .unwrap_or(path);
    if self.loaded_files.contains(&path)
    {
      warn!(
        file = %path.display(),
        "rc file already loaded; skipping include cycle"
      );
      return Ok(());
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    self.apply_text(
      &text, &base_dir, &path
    )
  }

  fn apply_text(
    &mut self,
    text: &str,
    base_dir: &Path,
    origin: &Path
  ) -> anyhow::Result<()> {
    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split_once('#')
        .map_or(raw_line, |(before, _)| {
          before
        })
        .trim();
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            base_dir,
            include_rest.trim()
          )?;
        if include_path.exists() {
          debug!(
            file = %origin.display(),
            include = %include_path.display(),
            "processing include"
          );
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            origin.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    home_dir()?.join(DEFAULT_DATA_DIR)
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(from_env) =
    std::env::var(RC_ENV_VAR)
  {
    if from_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      from_env
    )));
  }

  let candidate =
    home_dir()?.join(RC_FILE_NAME);
  Ok(candidate.exists().then_some(candidate))
}

fn home_dir() -> anyhow::Result<PathBuf>
{
  dirs::home_dir().ok_or_else(|| {
    anyhow!(
      "cannot determine home \
       directory"
    )
  })
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let expanded =
    expand_tilde(Path::new(include));
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
