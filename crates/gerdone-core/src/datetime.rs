use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "gerdone-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "GERDONE_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "GERDONE_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "UTC";
const MAX_STORABLE_YEAR: i32 = 9999;

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Zone used to turn stored instants
/// into calendar days.
pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(project_timezone())
    .date_naive()
}

#[must_use]
pub fn project_today(
  now: DateTime<Utc>
) -> NaiveDate {
  to_project_date(now)
}

/// e.g. `Mon Oct 19 2026`.
#[must_use]
pub fn format_project_date(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(project_timezone())
    .format("%a %b %d %Y")
    .to_string()
}

#[must_use]
pub fn format_project_datetime(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(project_timezone())
    .format("%a %b %d %Y %I:%M %p")
    .to_string()
}

/// Drops sub-millisecond precision so
/// an instant survives the persisted
/// string form unchanged.
#[must_use]
pub fn truncate_to_millis(
  dt: DateTime<Utc>
) -> DateTime<Utc> {
  DateTime::<Utc>::from_timestamp_millis(
    dt.timestamp_millis()
  )
  .unwrap_or(dt)
}

pub fn project_midnight(
  date: NaiveDate
) -> anyhow::Result<DateTime<Utc>> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {date}"
      )
    })?;
  to_utc_from_project_local(
    midnight,
    "midnight"
  )
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(
        &raw,
        TIMEZONE_ENV_VAR
      )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROJECT_TIMEZONE,
    "default"
  )
  .unwrap_or(chrono_tz::UTC)
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "no timezone config file"
    );
    return None;
  }

  let parsed = fs::read_to_string(path)
    .map_err(anyhow::Error::from)
    .and_then(|raw| {
      toml::from_str::<TimezoneConfig>(
        &raw
      )
      .map_err(anyhow::Error::from)
    });

  let parsed = match parsed {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "unusable timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    })?;

  parse_timezone(
    &timezone,
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "invalid timezone id"
      );
      None
    }
  }
}

fn to_utc_from_project_local(
  local_naive: NaiveDateTime,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match project_timezone()
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        %first,
        %second,
        "ambiguous local time; \
         taking the earlier one"
      );
      Ok(
        first
          .min(second)
          .with_timezone(&Utc)
      )
    }
    | LocalResult::None => {
      Err(anyhow!(
        "{local_naive} does not exist \
         in the project timezone \
         ({context})"
      ))
    }
  }
}

fn relative_offset_regex()
-> &'static Regex {
  static RE: OnceLock<Regex> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[wdhm])$"
    )
    .unwrap_or_else(|_| {
      unreachable!(
        "relative offset pattern is \
         a literal"
      )
    })
  })
}

fn clock_time_regex() -> &'static Regex
{
  static RE: OnceLock<Regex> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$"
    )
    .unwrap_or_else(|_| {
      unreachable!(
        "clock pattern is a literal"
      )
    })
  })
}

/// Parses the date expressions
/// accepted for due dates and event
/// times. The result is always
/// storable, see [`ensure_storable`].
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let resolved =
    resolve_date_expr(input, now)?;
  ensure_storable(resolved)
}

/// Rejects instants outside years
/// 0000-9999; the persisted RFC 3339
/// form cannot be read back for them.
pub fn ensure_storable(
  dt: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  if (0..=MAX_STORABLE_YEAR)
    .contains(&dt.year())
  {
    Ok(dt)
  } else {
    Err(anyhow!(
      "{dt} is outside the supported \
       years 0000-{MAX_STORABLE_YEAR}"
    ))
  }
}

fn resolve_date_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = project_today(now);

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return project_midnight(today);
    }
    | "tomorrow" => {
      return project_midnight(
        today + Duration::days(1)
      );
    }
    | "yesterday" => {
      return project_midnight(
        today - Duration::days(1)
      );
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return project_midnight(
      next_weekday_date(today, weekday)
    );
  }

  if let Some(month) =
    parse_month_name(&lower)
  {
    return project_midnight(
      next_month_start(today, month)?
    );
  }

  if let Some(offset) =
    parse_relative_offset(token)?
  {
    return now
      .checked_add_signed(offset)
      .ok_or_else(|| {
        anyhow!(
          "date offset out of range: \
           {token}"
        )
      });
  }

  if let Some((hour, minute)) =
    parse_clock_time(token)
  {
    return next_clock_time(
      now, hour, minute
    );
  }

  parse_absolute(token)?.ok_or_else(
    || {
      anyhow!(
        "unrecognized date \
         expression: {input}"
      )
    }
  )
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     weekday names, month names, \
     clock times (3:23pm, 15:23), \
     +Nw/+Nd/+Nh/+Nm, RFC3339, \
     YYYY-MM-DD, MM/DD/YYYY, \
     YYYY-MM-DDTHH:MM, \
     YYYY-MM-DD HH:MM"
  })
}

fn parse_absolute(
  token: &str
) -> anyhow::Result<Option<DateTime<Utc>>>
{
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(Some(
      dt.with_timezone(&Utc)
    ));
  }

  for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, fmt
      )
    {
      return project_midnight(date)
        .map(Some);
    }
  }

  for fmt in [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return to_utc_from_project_local(
        ndt, fmt
      )
      .map(Some);
    }
  }

  Ok(None)
}

fn parse_relative_offset(
  token: &str
) -> anyhow::Result<Option<Duration>> {
  let Some(caps) =
    relative_offset_regex()
      .captures(token)
  else {
    return Ok(None);
  };

  let num: i64 = caps["num"]
    .parse()
    .context("relative amount")?;
  let duration = match &caps["unit"] {
    | "w" => Duration::try_weeks(num),
    | "d" => Duration::try_days(num),
    | "h" => Duration::try_hours(num),
    | _ => Duration::try_minutes(num)
  }
  .ok_or_else(|| {
    anyhow!(
      "date offset out of range: \
       {token}"
    )
  })?;

  Ok(Some(
    if &caps["sign"] == "-" {
      -duration
    } else {
      duration
    }
  ))
}

fn next_clock_time(
  now: DateTime<Utc>,
  hour: u32,
  minute: u32
) -> anyhow::Result<DateTime<Utc>> {
  let local_now =
    now.with_timezone(
      project_timezone()
    );
  let mut day = local_now.date_naive();
  let at = |day: NaiveDate| {
    day
      .and_hms_opt(hour, minute, 0)
      .ok_or_else(|| {
        anyhow!(
          "invalid clock time \
           {hour}:{minute:02}"
        )
      })
  };

  if at(day)? <= local_now.naive_local()
  {
    day += Duration::days(1);
  }

  to_utc_from_project_local(
    at(day)?,
    "clock-time"
  )
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thurs" => {
      Some(Weekday::Thu)
    }
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Strictly after `from`: naming
/// today's weekday means a week out.
fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = i64::from(
    from.weekday().num_days_from_monday()
  );
  let target_idx = i64::from(
    target.num_days_from_monday()
  );
  let delta =
    match (7 + target_idx - from_idx)
      % 7
    {
      | 0 => 7,
      | d => d
    };
  from + Duration::days(delta)
}

fn next_month_start(
  today: NaiveDate,
  month: u32
) -> anyhow::Result<NaiveDate> {
  let year = if month > today.month() {
    today.year()
  } else {
    today.year() + 1
  };
  NaiveDate::from_ymd_opt(year, month, 1)
    .ok_or_else(|| {
      anyhow!(
        "invalid month {year}-{month}"
      )
    })
}

fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let caps =
    clock_time_regex().captures(token)?;

  let raw_hour: u32 =
    caps["hour"].parse().ok()?;
  let minute: u32 =
    caps["minute"].parse().ok()?;
  if minute > 59 {
    return None;
  }

  let hour = match caps
    .name("ampm")
    .map(|m| m.as_str().to_ascii_lowercase())
  {
    | Some(_)
      if raw_hour == 0
        || raw_hour > 12 =>
    {
      return None;
    }
    | Some(ampm) if ampm == "am" => {
      raw_hour % 12
    }
    | Some(_) => raw_hour % 12 + 12,
    | None if raw_hour > 23 => {
      return None;
    }
    | None => raw_hour
  };

  Some((hour, minute))
}

pub(crate) fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

/// Reads a persisted instant. Accepts
/// the RFC 3339 form written by
/// [`iso_date_serde`] as well as bare
/// `YYYY-MM-DDTHH:MM:SS` and
/// `YYYY-MM-DD`, both taken as UTC.
pub fn parse_stored_instant(
  raw: &str
) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      raw,
      "%Y-%m-%dT%H:%M:%S%.f"
    )
  {
    return Some(ndt.and_utc());
  }
  NaiveDate::parse_from_str(
    raw, "%Y-%m-%d"
  )
  .ok()
  .and_then(|d| d.and_hms_opt(0, 0, 0))
  .map(|ndt| ndt.and_utc())
}

#[cfg(test)]
mod tests {
  use chrono::{
    Datelike,
    TimeZone,
    Utc,
    Weekday
  };

  use super::{
    ensure_storable,
    parse_date_expr,
    parse_stored_instant,
    to_project_date,
    truncate_to_millis
  };

  fn fixed_now() -> chrono::DateTime<Utc>
  {
    Utc
      .with_ymd_and_hms(
        2026, 10, 19, 12, 0, 0
      )
      .single()
      .expect("valid now")
  }

  #[test]
  fn tomorrow_is_one_project_day_later()
  {
    let now = fixed_now();
    let parsed =
      parse_date_expr("tomorrow", now)
        .expect("parse tomorrow");
    assert_eq!(
      to_project_date(parsed),
      to_project_date(now).succ_opt()
        .expect("next day")
    );
  }

  #[test]
  fn weekday_name_lands_on_that_weekday()
  {
    let now = fixed_now();
    let parsed =
      parse_date_expr("friday", now)
        .expect("parse weekday");
    let date = to_project_date(parsed);
    assert_eq!(
      date.weekday(),
      Weekday::Fri
    );
    assert!(
      date > to_project_date(now)
    );
  }

  #[test]
  fn us_style_date_matches_iso_date() {
    let now = fixed_now();
    let us =
      parse_date_expr("11/05/2026", now)
        .expect("parse us date");
    let iso =
      parse_date_expr("2026-11-05", now)
        .expect("parse iso date");
    assert_eq!(us, iso);
    assert_eq!(
      to_project_date(iso)
        .format("%Y-%m-%d")
        .to_string(),
      "2026-11-05"
    );
  }

  #[test]
  fn relative_weeks_and_days() {
    let now = fixed_now();
    let parsed =
      parse_date_expr("+2w", now)
        .expect("parse +2w");
    assert_eq!(
      (parsed - now).num_days(),
      14
    );
    let back = parse_date_expr("-3d", now)
      .expect("parse -3d");
    assert_eq!(
      (now - back).num_days(),
      3
    );
  }

  #[test]
  fn clock_time_is_in_the_future() {
    let now = fixed_now();
    let parsed =
      parse_date_expr("3:23pm", now)
        .expect("parse clock time");
    assert!(parsed > now);
    assert_eq!(
      parsed
        .with_timezone(
          super::project_timezone()
        )
        .format("%H:%M")
        .to_string(),
      "15:23"
    );
  }

  #[test]
  fn rejects_unknown_expression() {
    assert!(
      parse_date_expr(
        "someday",
        fixed_now()
      )
      .is_err()
    );
    assert!(
      parse_date_expr("13:99", fixed_now())
        .is_err()
    );
  }

  #[test]
  fn stored_instant_accepts_millisecond_utc() {
    let parsed = parse_stored_instant(
      "2026-10-19T14:30:00.250Z"
    )
    .expect("utc instant");
    assert_eq!(
      parsed.timestamp_millis(),
      Utc
        .with_ymd_and_hms(
          2026, 10, 19, 14, 30, 0
        )
        .single()
        .expect("valid")
        .timestamp_millis()
        + 250
    );
    assert!(
      parse_stored_instant("2026-10-19")
        .is_some()
    );
    assert!(
      parse_stored_instant("garbage")
        .is_none()
    );
  }

  #[test]
  fn huge_offsets_are_errors() {
    for expr in [
      "+999999999d",
      "+999999999999w",
      "-999999999999w",
      "+500000w"
    ] {
      assert!(
        parse_date_expr(
          expr,
          fixed_now()
        )
        .is_err(),
        "{expr} should be rejected"
      );
    }
    assert!(
      parse_date_expr(
        "+400000w",
        fixed_now()
      )
      .is_ok()
    );
  }

  #[test]
  fn storable_years_stop_at_9999() {
    let last = Utc
      .with_ymd_and_hms(
        9999, 12, 31, 23, 59, 59
      )
      .single()
      .expect("valid");
    assert!(
      ensure_storable(last).is_ok()
    );
    assert!(
      ensure_storable(
        last + chrono::Duration::seconds(1)
      )
      .is_err()
    );
  }

  #[test]
  fn truncation_drops_sub_millis() {
    let dt = Utc
      .timestamp_opt(1_700_000_000, 123_456_789)
      .single()
      .expect("valid");
    assert_eq!(
      truncate_to_millis(dt)
        .timestamp_subsec_nanos(),
      123_000_000
    );
  }
}

/// Serde adapter for persisted
/// instants: RFC 3339 with millisecond
/// precision and a `Z` suffix.
pub mod iso_date_serde {
  use chrono::{
    DateTime,
    SecondsFormat,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.to_rfc3339_opts(
        SecondsFormat::Millis,
        true
      )
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_stored_instant(&raw)
      .ok_or_else(|| {
        serde::de::Error::custom(
          format!(
            "invalid date: {raw}"
          )
        )
      })
  }

  /// Optional dates decode leniently:
  /// anything unreadable becomes
  /// `None`.
  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let raw =
        Option::<serde_json::Value>::deserialize(
          deserializer
        )?;
      Ok(match raw {
        | Some(serde_json::Value::String(
          text
        )) => {
          let parsed =
            crate::datetime::parse_stored_instant(
              &text
            );
          if parsed.is_none() {
            tracing::warn!(
              value = %text,
              "unreadable stored date; \
               treating as absent"
            );
          }
          parsed
        }
        | Some(serde_json::Value::Null)
        | None => None,
        | Some(other) => {
          tracing::warn!(
            value = %other,
            "stored date is not a \
             string; treating as absent"
          );
          None
        }
      })
    }
  }
}
