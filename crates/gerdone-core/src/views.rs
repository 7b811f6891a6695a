use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum TaskFilter {
  #[default]
  All,
  Active,
  Completed
}

impl TaskFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | TaskFilter::All => true,
      | TaskFilter::Active => {
        task.is_active()
      }
      | TaskFilter::Completed => {
        !task.is_active()
      }
    }
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | TaskFilter::All => "all",
      | TaskFilter::Active => "active",
      | TaskFilter::Completed => {
        "completed"
      }
    }
  }
}

impl FromStr for TaskFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(TaskFilter::All),
      | "active" | "pending"
      | "open" => Ok(TaskFilter::Active),
      | "completed" | "done" => {
        Ok(TaskFilter::Completed)
      }
      | other => {
        Err(anyhow!(
          "unknown filter: {other} \
           (expected all, active or \
           completed)"
        ))
      }
    }
  }
}

impl fmt::Display for TaskFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortBy {
  /// Newest first.
  #[default]
  DateAdded,
  Alphabetical,
  /// Earliest due first; undated
  /// tasks last.
  DueDate
}

impl SortBy {
  pub fn as_key(self) -> &'static str {
    match self {
      | SortBy::DateAdded => "added",
      | SortBy::Alphabetical => "title",
      | SortBy::DueDate => "due"
    }
  }

  pub fn compare(
    self,
    a: &Task,
    b: &Task
  ) -> Ordering {
    match self {
      | SortBy::DateAdded => {
        b.date_added.cmp(&a.date_added)
      }
      | SortBy::Alphabetical => {
        compare_titles(
          &a.title, &b.title
        )
      }
      | SortBy::DueDate => {
        match (a.due_date, b.due_date) {
          | (Some(x), Some(y)) => {
            x.cmp(&y)
          }
          | (Some(_), None) => {
            Ordering::Less
          }
          | (None, Some(_)) => {
            Ordering::Greater
          }
          | (None, None) => {
            Ordering::Equal
          }
        }
      }
    }
  }
}

impl FromStr for SortBy {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "added" | "dateadded"
      | "date-added" | "entry" => {
        Ok(SortBy::DateAdded)
      }
      | "title" | "alpha"
      | "alphabetical" => {
        Ok(SortBy::Alphabetical)
      }
      | "due" | "duedate"
      | "due-date" => {
        Ok(SortBy::DueDate)
      }
      | other => {
        Err(anyhow!(
          "unknown sort: {other} \
           (expected added, title or \
           due)"
        ))
      }
    }
  }
}

impl fmt::Display for SortBy {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

/// Case-insensitive first, exact text
/// breaks ties.
fn compare_titles(
  a: &str,
  b: &str
) -> Ordering {
  a.to_lowercase()
    .cmp(&b.to_lowercase())
    .then_with(|| a.cmp(b))
}

/// Tasks passing `filter`, in `sort`
/// order. Equal keys keep their
/// stored order.
#[tracing::instrument(skip(tasks), fields(total = tasks.len()))]
pub fn visible_tasks(
  tasks: &[Task],
  filter: TaskFilter,
  sort: SortBy
) -> Vec<&Task> {
  let mut rows: Vec<&Task> = tasks
    .iter()
    .filter(|task| filter.matches(task))
    .collect();
  rows.sort_by(|a, b| {
    sort.compare(a, b)
  });
  trace!(
    visible = rows.len(),
    "derived task view"
  );
  rows
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    Duration,
    TimeZone,
    Utc
  };

  use super::{
    SortBy,
    TaskFilter,
    visible_tasks
  };
  use crate::task::Task;

  fn base() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 10, 1, 8, 0, 0
      )
      .single()
      .expect("valid")
  }

  fn sample() -> Vec<Task> {
    let mut out = Vec::new();
    for (idx, (title, due, done)) in [
      ("charlie", Some(5), false),
      ("Alpha", None, true),
      ("bravo", Some(2), false),
      ("delta", None, false),
      ("echo", Some(9), true)
    ]
    .into_iter()
    .enumerate()
    {
      let mut task = Task::new(
        idx as u64 + 1,
        title.to_string(),
        base()
          + Duration::minutes(idx as i64)
      );
      task.completed = done;
      task.due_date = due.map(|d| {
        base() + Duration::days(d)
      });
      out.push(task);
    }
    out
  }

  #[test]
  fn undated_tasks_sort_last_by_due() {
    let tasks = sample();
    let rows = visible_tasks(
      &tasks,
      TaskFilter::All,
      SortBy::DueDate
    );
    let titles: Vec<&str> = rows
      .iter()
      .map(|t| t.title.as_str())
      .collect();
    assert_eq!(
      titles,
      vec![
        "bravo", "charlie", "echo",
        "Alpha", "delta"
      ]
    );

    let dated: Vec<_> = rows
      .iter()
      .filter_map(|t| t.due_date)
      .collect();
    assert!(
      dated.windows(2).all(|w| w[0] <= w[1])
    );
    let first_undated = rows
      .iter()
      .position(|t| t.due_date.is_none())
      .expect("undated present");
    assert!(
      rows[first_undated..]
        .iter()
        .all(|t| t.due_date.is_none())
    );
  }

  #[test]
  fn active_is_complement_of_completed()
  {
    let tasks = sample();
    let active = visible_tasks(
      &tasks,
      TaskFilter::Active,
      SortBy::DateAdded
    );
    let completed = visible_tasks(
      &tasks,
      TaskFilter::Completed,
      SortBy::DateAdded
    );

    assert_eq!(
      active.len() + completed.len(),
      tasks.len()
    );
    assert!(active.iter().all(|a| {
      !completed
        .iter()
        .any(|c| c.id == a.id)
    }));
  }

  #[test]
  fn date_added_is_newest_first() {
    let tasks = sample();
    let rows = visible_tasks(
      &tasks,
      TaskFilter::All,
      SortBy::DateAdded
    );
    assert_eq!(rows[0].title, "echo");
    assert_eq!(rows[4].title, "charlie");
  }

  #[test]
  fn alphabetical_ignores_case() {
    let tasks = sample();
    let rows = visible_tasks(
      &tasks,
      TaskFilter::All,
      SortBy::Alphabetical
    );
    let titles: Vec<&str> = rows
      .iter()
      .map(|t| t.title.as_str())
      .collect();
    assert_eq!(
      titles,
      vec![
        "Alpha", "bravo", "charlie",
        "delta", "echo"
      ]
    );
  }

  #[test]
  fn parses_keys() {
    assert_eq!(
      "Done"
        .parse::<TaskFilter>()
        .expect("filter"),
      TaskFilter::Completed
    );
    assert_eq!(
      "due".parse::<SortBy>().expect("sort"),
      SortBy::DueDate
    );
    assert!(
      "soon".parse::<SortBy>().is_err()
    );
  }
}
