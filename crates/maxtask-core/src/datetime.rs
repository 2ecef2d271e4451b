use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Days,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

use crate::config::Config;

const TIMEZONE_ENV_VAR: &str =
  "MAXTASK_TIMEZONE";

/// Resolves the timezone that decides
/// what "today" means for deadlines.
///
/// Lookup order: `timezone` config key,
/// then `$MAXTASK_TIMEZONE`, then UTC.
pub fn resolve_timezone(
  cfg: &Config
) -> Tz {
  if let Some(raw) = cfg.get("timezone")
    && let Some(tz) =
      parse_timezone(&raw, "config")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

#[must_use]
pub fn today_in(
  tz: Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(&tz).date_naive()
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured session timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses a deadline given on the
/// command line into a calendar date.
#[tracing::instrument(skip(today))]
pub fn parse_deadline_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(today, 1);
    }
    | "yesterday" => {
      return shift_days(today, -1);
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
  )
  .context(
    "failed to compile relative \
     deadline regex"
  )?;
  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .with_context(|| {
        format!(
          "invalid relative \
           deadline: {token}"
        )
      })?;
    let days = match &caps["unit"] {
      | "w" => {
        num.checked_mul(7).ok_or_else(
          || {
            anyhow!(
              "deadline out of range: \
               {token}"
            )
          }
        )?
      }
      | _ => num
    };
    let signed = if &caps["sign"] == "-"
    {
      -days
    } else {
      days
    };
    return shift_days(today, signed);
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized deadline \
       expression: {token}"
    )
  })
}

fn shift_days(
  date: NaiveDate,
  delta: i64
) -> anyhow::Result<NaiveDate> {
  let magnitude = Days::new(
    delta.unsigned_abs()
  );
  let shifted = if delta >= 0 {
    date.checked_add_days(magnitude)
  } else {
    date.checked_sub_days(magnitude)
  };
  shifted.ok_or_else(|| {
    anyhow!(
      "deadline out of range: {date} \
       shifted by {delta} days"
    )
  })
}

/// Timestamps are written as RFC 3339
/// and read either as RFC 3339 or as a
/// bare `YYYY-MM-DD` date (midnight UTC),
/// which is how hand-written seed files
/// usually spell them.
pub mod flexible_timestamp {
  use chrono::{
    DateTime,
    NaiveDate,
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
    serializer
      .serialize_str(&dt.to_rfc3339())
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
    parse(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub fn parse(
    raw: &str
  ) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(dt) =
      DateTime::parse_from_rfc3339(
        trimmed
      )
    {
      return Ok(
        dt.with_timezone(&Utc)
      );
    }

    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
    .ok()
    .and_then(|date| {
      date.and_hms_opt(0, 0, 0)
    })
    .map(|ndt| ndt.and_utc())
    .ok_or_else(|| {
      format!(
        "invalid timestamp: {trimmed}"
      )
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    flexible_timestamp,
    parse_deadline_expr,
    today_in
  };

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .unwrap()
  }

  #[test]
  fn named_and_relative_deadlines() {
    let today = date(2026, 2, 16);

    assert_eq!(
      parse_deadline_expr(
        "today", today
      )
      .unwrap(),
      today
    );
    assert_eq!(
      parse_deadline_expr(
        "Tomorrow", today
      )
      .unwrap(),
      date(2026, 2, 17)
    );
    assert_eq!(
      parse_deadline_expr(
        "yesterday",
        today
      )
      .unwrap(),
      date(2026, 2, 15)
    );
    assert_eq!(
      parse_deadline_expr("+2w", today)
        .unwrap(),
      date(2026, 3, 2)
    );
    assert_eq!(
      parse_deadline_expr("-3d", today)
        .unwrap(),
      date(2026, 2, 13)
    );
    assert_eq!(
      parse_deadline_expr(
        "2024-01-15",
        today
      )
      .unwrap(),
      date(2024, 1, 15)
    );
    assert!(
      parse_deadline_expr(
        "someday", today
      )
      .is_err()
    );
  }

  #[test]
  fn oversized_relative_deadlines_fail()
  {
    let today = date(2026, 2, 16);

    assert!(
      parse_deadline_expr(
        "+2000000000000000000w",
        today
      )
      .is_err()
    );
    assert!(
      parse_deadline_expr(
        "-2000000000000000000d",
        today
      )
      .is_err()
    );
    assert!(
      parse_deadline_expr(
        "+99999999999999999999d",
        today
      )
      .is_err()
    );
  }

  #[test]
  fn today_depends_on_timezone() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 16, 3, 0, 0
      )
      .unwrap();

    assert_eq!(
      today_in(chrono_tz::UTC, now),
      date(2026, 2, 16)
    );
    assert_eq!(
      today_in(
        chrono_tz::America::Mexico_City,
        now
      ),
      date(2026, 2, 15)
    );
  }

  #[test]
  fn timestamps_accept_bare_dates() {
    let parsed =
      flexible_timestamp::parse(
        "2024-01-10"
      )
      .unwrap();
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2024, 1, 10, 0, 0, 0
        )
        .unwrap()
    );

    let parsed =
      flexible_timestamp::parse(
        "2024-01-10T08:30:00-03:00"
      )
      .unwrap();
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2024, 1, 10, 11, 30, 0
        )
        .unwrap()
    );
  }
}
