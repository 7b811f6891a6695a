use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::calendar::{CalendarCell, CalendarDay, MonthGrid, weekday_labels};
use crate::config::Config;
use crate::datetime::{format_project_date, format_project_datetime};
use crate::event::{ActionType, Event};
use crate::task::Task;
use crate::views::{SortBy, TaskFilter};

const CELL_WIDTH: usize = 16;

/// ANSI colour codes for one theme.
#[derive(Debug, Clone, Copy)]
struct Palette {
    heading: &'static str,
    id: &'static str,
    task_chip: &'static str,
    today: &'static str,
    overdue: &'static str,
    completed: &'static str,
    schedule_call: &'static str,
    send_message: &'static str,
    call_patient: &'static str,
    reminder: &'static str,
}

const LIGHT: Palette = Palette {
    heading: "1",
    id: "33",
    task_chip: "34",
    today: "1;4;34",
    overdue: "31",
    completed: "2;9",
    schedule_call: "32",
    send_message: "33",
    call_patient: "31",
    reminder: "35",
};

const DARK: Palette = Palette {
    heading: "1;97",
    id: "93",
    task_chip: "94",
    today: "1;4;96",
    overdue: "91",
    completed: "90;9",
    schedule_call: "92",
    send_message: "93",
    call_patient: "91",
    reminder: "95",
};

impl Palette {
    fn action(&self, action: ActionType) -> &'static str {
        match action {
            ActionType::ScheduleCall => self.schedule_call,
            ActionType::SendMessage => self.send_message,
            ActionType::CallPatient => self.call_patient,
            ActionType::CreateReminder => self.reminder,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    palette: Palette,
}

impl Renderer {
    pub fn new(cfg: &Config, dark_mode: bool) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            "always" => true,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color,
            palette: if dark_mode { DARK } else { LIGHT },
        })
    }

    /// Uncoloured output, whatever the terminal.
    pub fn plain() -> Self {
        Self {
            color: false,
            palette: LIGHT,
        }
    }

    pub fn set_dark_mode(&mut self, dark_mode: bool) {
        self.palette = if dark_mode { DARK } else { LIGHT };
    }

    pub fn print_list_view(
        &self,
        tasks: &[&Task],
        events: &[Event],
        filter: TaskFilter,
        sort: SortBy,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.write_list_view(io::stdout().lock(), tasks, events, filter, sort, now)
    }

    pub fn print_month(&self, grid: &MonthGrid<'_>) -> anyhow::Result<()> {
        self.write_month(io::stdout().lock(), grid)
    }

    pub fn print_event_table(&self, events: &[&Event]) -> anyhow::Result<()> {
        self.write_event_table(io::stdout().lock(), events)
    }

    #[tracing::instrument(skip_all, fields(tasks = tasks.len(), events = events.len()))]
    pub fn write_list_view<W: Write>(
        &self,
        mut out: W,
        tasks: &[&Task],
        events: &[Event],
        filter: TaskFilter,
        sort: SortBy,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{}",
            self.paint(
                &format!("Tasks (filter: {filter}, sort: {sort})"),
                self.palette.heading
            )
        )?;
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
        } else {
            self.write_task_table(&mut out, tasks, now)?;
        }

        writeln!(out)?;
        writeln!(out, "{}", self.paint("Events", self.palette.heading))?;
        if events.is_empty() {
            writeln!(out, "No events.")?;
        } else {
            let rows: Vec<&Event> = events.iter().collect();
            self.write_event_table(&mut out, &rows)?;
        }
        Ok(())
    }

    pub fn write_task_table<W: Write>(
        &self,
        out: W,
        tasks: &[&Task],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Done", "Title", "Due", "Added"]
            .map(String::from)
            .to_vec();

        let rows = tasks
            .iter()
            .map(|task| {
                let due = match task.due_date {
                    Some(due) if !task.completed && due < now => {
                        self.paint(&format_project_date(due), self.palette.overdue)
                    }
                    Some(due) => format_project_date(due),
                    None => "No due date".to_string(),
                };
                let title = if task.completed {
                    self.paint(&task.title, self.palette.completed)
                } else {
                    task.title.clone()
                };
                vec![
                    self.paint(&task.id.to_string(), self.palette.id),
                    if task.completed { "x" } else { "" }.to_string(),
                    title,
                    due,
                    format_project_date(task.date_added),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_event_table<W: Write>(&self, out: W, events: &[&Event]) -> anyhow::Result<()> {
        let headers = ["ID", "Action", "Patient", "Date", "Notes"]
            .map(String::from)
            .to_vec();

        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.paint(&event.id.to_string(), self.palette.id),
                    self.paint(
                        event.action_type.label(),
                        self.palette.action(event.action_type),
                    ),
                    event.patient_name.clone(),
                    format_project_datetime(event.date),
                    event.notes.replace('\n', " "),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all, fields(month = %grid.month))]
    pub fn write_month<W: Write>(&self, mut out: W, grid: &MonthGrid<'_>) -> anyhow::Result<()> {
        let total_width = 7 * (CELL_WIDTH + 1) + 1;
        let title = grid.month.label();
        let pad = total_width.saturating_sub(title.width()) / 2;
        writeln!(
            out,
            "{}{}",
            " ".repeat(pad),
            self.paint(&title, self.palette.heading)
        )?;

        let separator = format!("+{}", format!("{}+", "-".repeat(CELL_WIDTH)).repeat(7));
        writeln!(out, "{separator}")?;
        let labels: Vec<String> = weekday_labels(grid.week_start)
            .iter()
            .map(|label| fit(label, CELL_WIDTH))
            .collect();
        writeln!(out, "|{}|", labels.join("|"))?;
        writeln!(out, "{separator}")?;

        for week in grid.weeks() {
            let mut columns: Vec<Vec<String>> = week
                .iter()
                .map(|cell| match cell {
                    CalendarCell::Filler => Vec::new(),
                    CalendarCell::Day(day) => self.day_lines(day),
                })
                .collect();
            columns.resize(7, Vec::new());

            let height = columns.iter().map(Vec::len).max().unwrap_or(0).max(2);
            for line in 0..height {
                let row: Vec<String> = columns
                    .iter()
                    .map(|lines| {
                        lines
                            .get(line)
                            .cloned()
                            .unwrap_or_else(|| " ".repeat(CELL_WIDTH))
                    })
                    .collect();
                writeln!(out, "|{}|", row.join("|"))?;
            }
            writeln!(out, "{separator}")?;
        }

        Ok(())
    }

    /// Lines for one day cell, each padded to `CELL_WIDTH`.
    fn day_lines(&self, day: &CalendarDay<'_>) -> Vec<String> {
        let mut lines = Vec::with_capacity(1 + day.tasks.len() + day.events.len());

        let label = if day.is_today {
            format!("{:>2} today", day.day())
        } else {
            format!("{:>2}", day.day())
        };
        let label = fit(&label, CELL_WIDTH);
        lines.push(if day.is_today {
            self.paint(&label, self.palette.today)
        } else {
            label
        });

        for task in &day.tasks {
            let text = fit(&format!("- {}", task.title), CELL_WIDTH);
            let code = if task.completed {
                self.palette.completed
            } else {
                self.palette.task_chip
            };
            lines.push(self.paint(&text, code));
        }

        for event in &day.events {
            let text = fit(
                &format!("{} - {}", event.patient_name, event.action_type.label()),
                CELL_WIDTH,
            );
            lines.push(self.paint(&text, self.palette.action(event.action_type)));
        }

        lines
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn write_task_info<W: Write>(&self, mut out: W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "kind      task")?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(
            out,
            "status    {}",
            if task.completed { "completed" } else { "active" }
        )?;
        writeln!(out, "added     {}", format_project_datetime(task.date_added))?;
        writeln!(
            out,
            "due       {}",
            task.due_date
                .map(format_project_date)
                .unwrap_or_else(|| "No due date".to_string())
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, event))]
    pub fn write_event_info<W: Write>(&self, mut out: W, event: &Event) -> anyhow::Result<()> {
        writeln!(out, "id        {}", event.id)?;
        writeln!(out, "kind      event")?;
        writeln!(out, "action    {}", event.action_type)?;
        writeln!(out, "patient   {}", event.patient_name)?;
        writeln!(out, "date      {}", format_project_datetime(event.date))?;
        writeln!(out, "notes     {}", event.notes)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Truncates or pads `text` to exactly `width` terminal columns.
fn fit(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut used = 0;
    let full = text.width() <= width;

    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        let limit = if full { width } else { width.saturating_sub(1) };
        if used + w > limit {
            break;
        }
        out.push(ch);
        used += w;
    }
    if !full && width > 0 {
        out.push('~');
        used += 1;
    }

    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, &width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, &width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc, Weekday};

    use super::{Renderer, fit, strip_ansi};
    use crate::calendar::{MonthGrid, YearMonth};
    use crate::event::{ActionType, Event};
    use crate::task::Task;
    use crate::views::{SortBy, TaskFilter};

    fn noon(d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, 12, 0, 0)
            .single()
            .expect("valid")
    }

    #[test]
    fn fit_pads_and_truncates_by_width() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdefgh", 5), "abcd~");
        assert_eq!(fit("日本語テキスト", 6), "日本~ ");
    }

    #[test]
    fn list_view_shows_missing_due_date() {
        let task = Task::new(1, "Sterilize tools".to_string(), noon(1));
        let mut out = Vec::new();
        Renderer::plain()
            .write_list_view(
                &mut out,
                &[&task],
                &[],
                TaskFilter::All,
                SortBy::DateAdded,
                noon(2),
            )
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("Sterilize tools"));
        assert!(text.contains("No due date"));
        assert!(text.contains("No events."));
    }

    #[test]
    fn month_view_places_entries_and_marks_today() {
        let mut task = Task::new(1, "Inventory".to_string(), noon(1));
        task.due_date = Some(noon(9));
        let events = vec![Event {
            id: 2,
            patient_name: "Ada".to_string(),
            date: noon(9),
            notes: String::new(),
            action_type: ActionType::SendMessage,
        }];
        let month = YearMonth::new(2026, 10).expect("month");
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).expect("today");
        let grid = MonthGrid::build(month, Weekday::Sun, [&task], &events, today);

        let mut out = Vec::new();
        Renderer::plain().write_month(&mut out, &grid).expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("October 2026"));
        assert!(text.contains("Sun"));
        assert!(text.contains("- Inventory"));
        assert!(text.contains("Ada - Send a Me~"));
        assert!(text.contains("19 today"));
        assert_eq!(strip_ansi(&text), text);
    }
}
