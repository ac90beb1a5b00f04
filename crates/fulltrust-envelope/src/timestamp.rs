//! Date/time literals recognised inside string tokens.
//!
//! The accepted shapes follow the ISO 8601 extended profile used by the UI
//! peer: a calendar date, optionally followed by `T` and a time of day with
//! minute, second, or fractional-second precision, optionally followed by
//! `Z` or a `±HH:MM` offset. Anything else stays a plain string.

use std::fmt;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time, UtcOffset};

const DATE_ONLY: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");
const MINUTES: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]T[hour]:[minute]");
const SECONDS: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const FRACTIONAL: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
const OFFSET: &[FormatItem<'_>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

const DATE_LEN: usize = "YYYY-MM-DD".len();
const OFFSET_LEN: usize = "+HH:MM".len();

/// A wall-clock date/time with the UTC offset that accompanied it, if any.
///
/// # Example
///
/// ```
/// use fulltrust_envelope::Timestamp;
///
/// let stamp = Timestamp::parse("2024-03-01T12:30:00Z").expect("literal");
/// assert_eq!(stamp.to_iso8601(), "2024-03-01T12:30:00Z");
/// assert!(Timestamp::parse("12/31").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    datetime: PrimitiveDateTime,
    offset: Option<UtcOffset>,
}

impl Timestamp {
    /// Builds a timestamp from its parts.
    #[must_use]
    pub const fn new(datetime: PrimitiveDateTime, offset: Option<UtcOffset>) -> Self {
        Self { datetime, offset }
    }

    /// Checks `text` for a date/time literal.
    ///
    /// Returns `None` when the text is not one of the accepted shapes, in
    /// which case the caller keeps it as a plain string.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if !looks_like_date(text) {
            return None;
        }
        let (body, offset) = split_offset(text)?;
        let datetime = parse_local(body)?;
        Some(Self { datetime, offset })
    }

    /// Local date and time of day.
    #[must_use]
    pub const fn datetime(&self) -> PrimitiveDateTime {
        self.datetime
    }

    /// UTC offset carried on the wire, when one was present.
    #[must_use]
    pub const fn offset(&self) -> Option<UtcOffset> {
        self.offset
    }

    /// Renders the timestamp as `YYYY-MM-DDTHH:MM:SS[.fraction][offset]`.
    #[must_use]
    pub fn to_iso8601(&self) -> String {
        let date = self.datetime.date();
        let clock = self.datetime.time();
        let mut rendered = format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            date.year(),
            u8::from(date.month()),
            date.day(),
            clock.hour(),
            clock.minute(),
            clock.second(),
        );
        let nanos = clock.nanosecond();
        if nanos != 0 {
            let digits = format!("{nanos:09}");
            rendered.push('.');
            rendered.push_str(digits.trim_end_matches('0'));
        }
        match self.offset {
            Some(offset) if offset.is_utc() => rendered.push('Z'),
            Some(offset) => {
                let (hours, minutes, _) = offset.as_hms();
                let sign = if offset.is_negative() { '-' } else { '+' };
                rendered.push_str(&format!(
                    "{sign}{:02}:{:02}",
                    hours.unsigned_abs(),
                    minutes.unsigned_abs()
                ));
            }
            None => {}
        }
        rendered
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_iso8601())
    }
}

impl From<PrimitiveDateTime> for Timestamp {
    fn from(datetime: PrimitiveDateTime) -> Self {
        Self::new(datetime, None)
    }
}

fn looks_like_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= DATE_LEN
        && bytes.get(4) == Some(&b'-')
        && bytes.get(7) == Some(&b'-')
        && bytes.iter().take(4).all(u8::is_ascii_digit)
}

/// Splits a trailing `Z` or `±HH:MM` designator from the literal.
///
/// Offsets are only meaningful after a time component, so a date-only
/// literal carrying one is rejected.
fn split_offset(text: &str) -> Option<(&str, Option<UtcOffset>)> {
    if let Some(body) = text.strip_suffix('Z') {
        return has_time(body).then_some((body, Some(UtcOffset::UTC)));
    }
    if text.len() > DATE_LEN + OFFSET_LEN {
        let split = text.len() - OFFSET_LEN;
        if let (Some(body), Some(designator)) = (text.get(..split), text.get(split..))
            && designator.starts_with(['+', '-'])
        {
            let offset = UtcOffset::parse(designator, OFFSET).ok()?;
            return has_time(body).then_some((body, Some(offset)));
        }
    }
    Some((text, None))
}

fn has_time(body: &str) -> bool {
    body.as_bytes().get(DATE_LEN) == Some(&b'T')
}

fn parse_local(body: &str) -> Option<PrimitiveDateTime> {
    if body.len() == DATE_LEN {
        return Date::parse(body, DATE_ONLY)
            .ok()
            .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT));
    }
    [FRACTIONAL, SECONDS, MINUTES]
        .into_iter()
        .find_map(|layout| PrimitiveDateTime::parse(body, layout).ok())
}
