//! Month layout and day placement for the calendar view.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datetime::{parse_month_name, to_project_date};
use crate::event::Event;
use crate::task::Task;

/// A calendar month, serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> anyhow::Result<Self> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(anyhow!("invalid month: {year}-{month:02}"));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month an instant falls in, in the project time zone.
    pub fn containing(dt: DateTime<Utc>) -> Self {
        Self::of(to_project_date(dt))
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn days_in_month(self) -> u32 {
        let first = self.first_day();
        match first.checked_add_months(Months::new(1)) {
            Some(next_first) => u32::try_from((next_first - first).num_days()).unwrap_or(0),
            // December of the last representable year.
            None => 31,
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// `October 2026`
    pub fn label(self) -> String {
        self.first_day().format("%B %Y").to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow!("expected YYYY-MM, got: {s}"))?;
        let year: i32 = year.parse().with_context(|| format!("invalid year in {s}"))?;
        let month: u32 = match month.parse() {
            Ok(month) => month,
            Err(_) => parse_month_name(&month.to_ascii_lowercase())
                .ok_or_else(|| anyhow!("invalid month in {s}"))?,
        };
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// `sunday` starts the week on Sunday; anything else on Monday.
pub fn parse_week_start(raw: &str) -> Weekday {
    if raw.trim().eq_ignore_ascii_case("monday") || raw.trim().eq_ignore_ascii_case("mon") {
        Weekday::Mon
    } else {
        Weekday::Sun
    }
}

pub fn weekday_labels(week_start: Weekday) -> [&'static str; 7] {
    let mut labels = [""; 7];
    let mut day = week_start;
    for label in &mut labels {
        *label = match day {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
            Weekday::Sun => "Sun",
        };
        day = day.succ();
    }
    labels
}

/// Filler cells needed before the first of the month.
pub fn leading_blanks(first: NaiveDate, week_start: Weekday) -> usize {
    let offset = (7 + first.weekday().num_days_from_monday() - week_start.num_days_from_monday()) % 7;
    offset as usize
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay<'a> {
    pub date: NaiveDate,
    pub is_today: bool,
    pub tasks: Vec<&'a Task>,
    pub events: Vec<&'a Event>,
}

impl CalendarDay<'_> {
    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCell<'a> {
    Filler,
    Day(CalendarDay<'a>),
}

/// One month of cells: `leading_blanks` fillers followed by one cell per day.
#[derive(Debug, Clone)]
pub struct MonthGrid<'a> {
    pub month: YearMonth,
    pub week_start: Weekday,
    pub leading_blanks: usize,
    pub cells: Vec<CalendarCell<'a>>,
}

impl<'a> MonthGrid<'a> {
    /// Places each dated task and every event of `month` on its day.
    ///
    /// `tasks` is taken in display order and that order is kept within a day;
    /// events within a day are ordered by time.
    #[tracing::instrument(skip(month, tasks, events, today), fields(month = %month))]
    pub fn build<I>(
        month: YearMonth,
        week_start: Weekday,
        tasks: I,
        events: &'a [Event],
        today: NaiveDate,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let first = month.first_day();
        let blanks = leading_blanks(first, week_start);
        let day_count = month.days_in_month() as usize;

        let mut days: Vec<CalendarDay<'a>> = (0..day_count)
            .map(|offset| {
                let date = first + Duration::days(offset as i64);
                CalendarDay {
                    date,
                    is_today: date == today,
                    tasks: Vec::new(),
                    events: Vec::new(),
                }
            })
            .collect();

        for task in tasks {
            let Some(due) = task.due_date else {
                continue;
            };
            let date = to_project_date(due);
            if month.contains(date) {
                days[date.day0() as usize].tasks.push(task);
            }
        }

        for event in events {
            let date = to_project_date(event.date);
            if month.contains(date) {
                days[date.day0() as usize].events.push(event);
            }
        }
        for day in &mut days {
            day.events.sort_by_key(|event| event.date);
        }

        let mut cells = Vec::with_capacity(blanks + day_count);
        cells.extend(std::iter::repeat_n(CalendarCell::Filler, blanks));
        cells.extend(days.into_iter().map(CalendarCell::Day));

        debug!(blanks, days = day_count, "built month grid");
        Self {
            month,
            week_start,
            leading_blanks: blanks,
            cells,
        }
    }

    pub fn days(&self) -> impl Iterator<Item = &CalendarDay<'a>> {
        self.cells.iter().filter_map(|cell| match cell {
            CalendarCell::Day(day) => Some(day),
            CalendarCell::Filler => None,
        })
    }

    pub fn day(&self, day_of_month: u32) -> Option<&CalendarDay<'a>> {
        let idx = self.leading_blanks + day_of_month.checked_sub(1)? as usize;
        match self.cells.get(idx)? {
            CalendarCell::Day(day) => Some(day),
            CalendarCell::Filler => None,
        }
    }

    /// Rows of seven; the last row may be shorter.
    pub fn weeks(&self) -> std::slice::Chunks<'_, CalendarCell<'a>> {
        self.cells.chunks(7)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc, Weekday};

    use super::{MonthGrid, YearMonth, leading_blanks, parse_week_start, weekday_labels};
    use crate::event::{ActionType, Event};
    use crate::task::Task;

    fn noon(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
            .single()
            .expect("valid")
    }

    #[test]
    fn thirty_one_day_month_has_days_plus_fillers() {
        // October 2026 starts on a Thursday.
        let month = YearMonth::new(2026, 10).expect("month");
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        let grid = MonthGrid::build(month, Weekday::Sun, [], &[], today);

        assert_eq!(month.days_in_month(), 31);
        assert_eq!(grid.leading_blanks, 4);
        assert_eq!(grid.cells.len(), 31 + 4);
        assert_eq!(grid.days().count(), 31);

        let monday_grid = MonthGrid::build(month, Weekday::Mon, [], &[], today);
        assert_eq!(monday_grid.leading_blanks, 3);
        assert_eq!(monday_grid.cells.len(), 31 + 3);
    }

    #[test]
    fn last_representable_month_keeps_its_days() {
        let month = YearMonth::of(NaiveDate::MAX);
        assert_eq!(month.days_in_month(), 31);
        let grid = MonthGrid::build(month, Weekday::Sun, [], &[], NaiveDate::MAX);
        assert_eq!(grid.days().count(), 31);
        assert!(grid.day(31).expect("last day").is_today);
    }

    #[test]
    fn month_starting_on_week_start_has_no_fillers() {
        // March 2026 starts on a Sunday.
        let first = NaiveDate::from_ymd_opt(2026, 3, 1).expect("date");
        assert_eq!(leading_blanks(first, Weekday::Sun), 0);
        assert_eq!(leading_blanks(first, Weekday::Mon), 6);
    }

    #[test]
    fn february_lengths() {
        assert_eq!(YearMonth::new(2024, 2).expect("m").days_in_month(), 29);
        assert_eq!(YearMonth::new(2026, 2).expect("m").days_in_month(), 28);
        assert_eq!(YearMonth::new(2026, 12).expect("m").next().to_string(), "2027-01");
        assert_eq!(YearMonth::new(2026, 1).expect("m").prev().to_string(), "2025-12");
    }

    #[test]
    fn places_tasks_and_events_on_their_day_only_in_matching_year() {
        let month = YearMonth::new(2026, 10).expect("month");
        let mut due = Task::new(1, "Renew license".to_string(), noon(2026, 10, 1));
        due.due_date = Some(noon(2026, 10, 15));
        let mut last_year = Task::new(2, "Old".to_string(), noon(2025, 10, 1));
        last_year.due_date = Some(noon(2025, 10, 15));
        let undated = Task::new(3, "Someday".to_string(), noon(2026, 10, 1));
        let tasks = [due, last_year, undated];

        let events = vec![
            Event {
                id: 10,
                patient_name: "Ada".to_string(),
                date: noon(2026, 10, 15) + chrono::Duration::hours(2),
                notes: String::new(),
                action_type: ActionType::CallPatient,
            },
            Event {
                id: 11,
                patient_name: "Ben".to_string(),
                date: noon(2026, 10, 15),
                notes: String::new(),
                action_type: ActionType::CreateReminder,
            },
            Event {
                id: 12,
                patient_name: "Cy".to_string(),
                date: noon(2026, 11, 15),
                notes: String::new(),
                action_type: ActionType::SendMessage,
            },
        ];

        let today = NaiveDate::from_ymd_opt(2026, 10, 15).expect("date");
        let grid = MonthGrid::build(month, Weekday::Sun, tasks.iter(), &events, today);

        let day = grid.day(15).expect("day 15");
        assert!(day.is_today);
        assert_eq!(day.tasks.len(), 1);
        assert_eq!(day.tasks[0].id, 1);
        let event_ids: Vec<u64> = day.events.iter().map(|e| e.id).collect();
        assert_eq!(event_ids, vec![11, 10]);

        let placed: usize = grid.days().map(|d| d.tasks.len() + d.events.len()).sum();
        assert_eq!(placed, 3);
        assert!(grid.day(32).is_none());
        assert!(grid.day(0).is_none());
    }

    #[test]
    fn parses_year_month_forms() {
        assert_eq!(
            "2026-10".parse::<YearMonth>().expect("numeric"),
            YearMonth::new(2026, 10).expect("month")
        );
        assert_eq!(
            "2026-oct".parse::<YearMonth>().expect("named"),
            YearMonth::new(2026, 10).expect("month")
        );
        assert!("2026-13".parse::<YearMonth>().is_err());
        assert!("october".parse::<YearMonth>().is_err());
        assert_eq!(YearMonth::new(2026, 10).expect("month").label(), "October 2026");
    }

    #[test]
    fn week_start_labels() {
        assert_eq!(parse_week_start("Monday"), Weekday::Mon);
        assert_eq!(parse_week_start("sunday"), Weekday::Sun);
        assert_eq!(weekday_labels(Weekday::Sun)[0], "Sun");
        assert_eq!(weekday_labels(Weekday::Mon)[6], "Sun");
    }
}
