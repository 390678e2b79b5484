use std::sync::OnceLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use super::domain::ScheduleValue;

/// Epoch numbers at or above this magnitude are read as milliseconds, below it as seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Interview-time representations accepted by [`ScheduledTimeParser::parse`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawSchedule<'a> {
    Text(&'a str),
    Epoch(i64),
    Instant(DateTime<Utc>),
}

impl<'a> From<&'a ScheduleValue> for RawSchedule<'a> {
    fn from(value: &'a ScheduleValue) -> Self {
        match value {
            ScheduleValue::Epoch(epoch) => RawSchedule::Epoch(*epoch),
            ScheduleValue::Text(text) => RawSchedule::Text(text),
        }
    }
}

impl<'a> From<&'a str> for RawSchedule<'a> {
    fn from(value: &'a str) -> Self {
        RawSchedule::Text(value)
    }
}

impl From<DateTime<Utc>> for RawSchedule<'_> {
    fn from(value: DateTime<Utc>) -> Self {
        RawSchedule::Instant(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleParseError {
    #[error("interview time is empty")]
    Empty,
    #[error("interview time '{0}' is not a recognised date/time")]
    Unrecognized(String),
    #[error("interview time '{0}' does not exist in the local timezone")]
    NonexistentLocalTime(String),
    #[error("epoch value {0} is outside the supported range")]
    EpochOutOfRange(i64),
}

/// Collapses interview times into a single UTC instant.
///
/// Values carrying an explicit offset (`Z`, `UTC`, `+02:00`, `-0500`) are trusted as-is.
/// Values without one are read as wall-clock time in `zone`, which is the process-local
/// timezone unless a parser is built with [`ScheduledTimeParser::with_zone`].
#[derive(Debug, Clone)]
pub struct ScheduledTimeParser<Tz: TimeZone = Local> {
    zone: Tz,
}

impl ScheduledTimeParser<Local> {
    pub fn local() -> Self {
        Self { zone: Local }
    }
}

impl Default for ScheduledTimeParser<Local> {
    fn default() -> Self {
        Self::local()
    }
}

impl<Tz: TimeZone> ScheduledTimeParser<Tz> {
    pub fn with_zone(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn parse<'a>(
        &self,
        raw: impl Into<RawSchedule<'a>>,
    ) -> Result<DateTime<Utc>, ScheduleParseError> {
        match raw.into() {
            RawSchedule::Instant(instant) => Ok(instant),
            RawSchedule::Epoch(epoch) => from_epoch(epoch),
            RawSchedule::Text(text) => self.parse_text(text),
        }
    }

    fn parse_text(&self, raw: &str) -> Result<DateTime<Utc>, ScheduleParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScheduleParseError::Empty);
        }

        if let Some(canonical) = canonical_offset_form(trimmed) {
            return parse_with_offset(&canonical)
                .ok_or_else(|| ScheduleParseError::Unrecognized(trimmed.to_string()));
        }

        if let Ok(epoch) = trimmed.parse::<i64>() {
            return from_epoch(epoch);
        }

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .or_else(|| extract_components(trimmed))
            .ok_or_else(|| ScheduleParseError::Unrecognized(trimmed.to_string()))?;

        self.zone
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| ScheduleParseError::NonexistentLocalTime(trimmed.to_string()))
    }
}

fn from_epoch(epoch: i64) -> Result<DateTime<Utc>, ScheduleParseError> {
    let instant = if epoch.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD as u64 {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    };
    instant.ok_or(ScheduleParseError::EpochOutOfRange(epoch))
}

fn offset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^(.*\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?)",
            r"\s*(z|utc|gmt|[+-]\d{2}(?::?\d{2})?)$",
        ))
        .expect("offset pattern compiles")
    })
}

fn components_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})[T\s]+(\d{1,2}):(\d{2})(?::(\d{2}))?")
            .expect("component pattern compiles")
    })
}

/// Rewrites a value with an explicit offset marker into `<date-time>+HH:MM`, or `None` when
/// the value carries no marker.
fn canonical_offset_form(value: &str) -> Option<String> {
    let captures = offset_pattern().captures(value)?;
    let body = captures.get(1)?.as_str().trim_end();
    let marker = captures.get(2)?.as_str();

    let offset = if marker.eq_ignore_ascii_case("z")
        || marker.eq_ignore_ascii_case("utc")
        || marker.eq_ignore_ascii_case("gmt")
    {
        "+00:00".to_string()
    } else {
        let (sign, digits) = marker.split_at(1);
        let digits = digits.replace(':', "");
        let (hours, minutes) = digits.split_at(2);
        let minutes = if minutes.is_empty() { "00" } else { minutes };
        format!("{sign}{hours}:{minutes}")
    };

    Some(format!("{body}{offset}"))
}

fn parse_with_offset(canonical: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(canonical) {
        return Some(parsed.with_timezone(&Utc));
    }

    OFFSET_FORMATS.iter().find_map(|format| {
        DateTime::parse_from_str(canonical, format)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    })
}

fn extract_components(value: &str) -> Option<NaiveDateTime> {
    let captures = components_pattern().captures(value)?;
    let number = |index: usize| -> Option<u32> {
        captures
            .get(index)
            .map_or(Some(0), |m| m.as_str().parse::<u32>().ok())
    };

    let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, number(2)?, number(3)?)?;
    date.and_hms_opt(number(4)?, number(5)?, number(6)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("valid")
    }

    fn plus_two() -> ScheduledTimeParser<FixedOffset> {
        ScheduledTimeParser::with_zone(FixedOffset::east_opt(2 * 3600).expect("valid offset"))
    }

    #[test]
    fn explicit_offsets_are_trusted() {
        let parser = plus_two();
        let expected = utc(2025, 3, 10, 9, 0, 0);

        assert_eq!(parser.parse("2025-03-10T09:00:00Z"), Ok(expected));
        assert_eq!(parser.parse("2025-03-10T09:00:00.000Z"), Ok(expected));
        assert_eq!(parser.parse("2025-03-10T11:00:00+02:00"), Ok(expected));
        assert_eq!(parser.parse("2025-03-10 04:00-0500"), Ok(expected));
        assert_eq!(parser.parse("2025-03-10 09:00 UTC"), Ok(expected));
        assert_eq!(parser.parse("2025-03-10T12:00+03"), Ok(expected));
    }

    #[test]
    fn naive_values_use_the_configured_zone() {
        let parser = plus_two();
        let expected = utc(2025, 3, 10, 7, 0, 0);

        assert_eq!(parser.parse("2025-03-10 09:00"), Ok(expected));
        assert_eq!(parser.parse("2025-03-10T09:00"), Ok(expected));
        assert_eq!(parser.parse("2025-03-10 09:00:00"), Ok(expected));
        assert_eq!(
            parser.parse("  2025-03-10T09:00:00.250  "),
            Ok(expected + chrono::Duration::milliseconds(250))
        );
    }

    #[test]
    fn date_only_suffix_is_not_mistaken_for_an_offset() {
        assert!(canonical_offset_form("2025-03-10").is_none());
        assert!(plus_two().parse("2025-03-10").is_err());
    }

    #[test]
    fn loose_values_fall_back_to_component_extraction() {
        let parser = plus_two();
        assert_eq!(parser.parse("2025/3/10 9:05"), Ok(utc(2025, 3, 10, 7, 5, 0)));
        assert_eq!(
            parser.parse("2025-03-10 09:00:30 (room 4)"),
            Ok(utc(2025, 3, 10, 7, 0, 30))
        );
    }

    #[test]
    fn naive_local_fallback_matches_process_zone() {
        let parser = ScheduledTimeParser::local();
        let expected = Local
            .with_ymd_and_hms(2025, 3, 10, 9, 0, 0)
            .earliest()
            .expect("local time exists")
            .with_timezone(&Utc);
        assert_eq!(parser.parse("2025-03-10 09:00"), Ok(expected));
    }

    #[test]
    fn epoch_numbers_accept_seconds_and_millis() {
        let parser = plus_two();
        let expected = utc(2025, 3, 10, 9, 0, 0);
        let seconds = expected.timestamp();

        assert_eq!(parser.parse(RawSchedule::Epoch(seconds)), Ok(expected));
        assert_eq!(
            parser.parse(RawSchedule::Epoch(seconds * 1000)),
            Ok(expected)
        );
        assert_eq!(parser.parse(seconds.to_string().as_str()), Ok(expected));
        assert_eq!(
            parser.parse(&ScheduleValue::Epoch(seconds)),
            Ok(expected)
        );
    }

    #[test]
    fn structured_instants_pass_through() {
        let instant = utc(2025, 3, 10, 9, 0, 0);
        assert_eq!(plus_two().parse(instant), Ok(instant));
    }

    #[test]
    fn garbage_is_a_typed_failure() {
        let parser = plus_two();
        assert_eq!(parser.parse("   "), Err(ScheduleParseError::Empty));
        assert!(matches!(
            parser.parse("next tuesday after lunch"),
            Err(ScheduleParseError::Unrecognized(_))
        ));
        assert!(matches!(
            parser.parse("2025-13-45 25:99"),
            Err(ScheduleParseError::Unrecognized(_))
        ));
        assert!(matches!(
            parser.parse("2025-03-10T25:00:00Z"),
            Err(ScheduleParseError::Unrecognized(_))
        ));
    }
}
