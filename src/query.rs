use chrono::{DateTime, FixedOffset, NaiveDateTime};
use thiserror::Error;

/// One report request: which voice channel, over which time window.
///
/// Parsed from a three-line command message: channel name, then ISO-8601
/// start and end timestamps carrying their own UTC offsets. The window is
/// not required to be forward; callers validate ordering before use.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub channel_name: String,
    pub date_start: DateTime<FixedOffset>,
    pub date_end: DateTime<FixedOffset>,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("expected three lines: channel name, start time, end time")]
    MissingLines,

    #[error("invalid timestamp {value:?}: {source}")]
    BadTimestamp {
        value: String,
        source: chrono::ParseError,
    },
}

impl LogQuery {
    pub fn from_message(content: &str) -> Result<Self, QueryError> {
        let mut lines = content.lines().map(str::trim);
        let channel_name = match lines.next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(QueryError::MissingLines),
        };
        let date_start = parse_timestamp(lines.next().ok_or(QueryError::MissingLines)?)?;
        let date_end = parse_timestamp(lines.next().ok_or(QueryError::MissingLines)?)?;
        Ok(Self {
            channel_name,
            date_start,
            date_end,
        })
    }

    /// Window start with its offset folded in, comparable against the
    /// UTC timestamps the message history carries.
    pub fn start_utc(&self) -> NaiveDateTime {
        to_naive_utc(self.date_start)
    }

    pub fn end_utc(&self) -> NaiveDateTime {
        to_naive_utc(self.date_end)
    }
}

/// Subtracts the timestamp's own UTC offset and discards it.
pub fn to_naive_utc(stamp: DateTime<FixedOffset>) -> NaiveDateTime {
    stamp.naive_utc()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, QueryError> {
    DateTime::parse_from_rfc3339(raw).map_err(|source| QueryError::BadTimestamp {
        value: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_three_line_query() {
        let query = LogQuery::from_message(
            "afk lounge\n2024-01-01T10:00:00+02:00\n2024-01-01T12:30:00+02:00",
        )
        .unwrap();
        assert_eq!(query.channel_name, "afk lounge");
        assert_eq!(query.start_utc(), naive(8, 0));
        assert_eq!(query.end_utc(), naive(10, 30));
    }

    #[test]
    fn test_lines_are_trimmed() {
        let query = LogQuery::from_message(
            "  general  \n 2024-01-01T10:00:00Z \n 2024-01-01T11:00:00Z ",
        )
        .unwrap();
        assert_eq!(query.channel_name, "general");
        assert_eq!(query.start_utc(), naive(10, 0));
    }

    #[test]
    fn test_too_few_lines() {
        assert!(matches!(
            LogQuery::from_message(""),
            Err(QueryError::MissingLines)
        ));
        assert!(matches!(
            LogQuery::from_message("general"),
            Err(QueryError::MissingLines)
        ));
        assert!(matches!(
            LogQuery::from_message("general\n2024-01-01T10:00:00Z"),
            Err(QueryError::MissingLines)
        ));
    }

    #[test]
    fn test_bad_timestamp() {
        let err = LogQuery::from_message("general\nyesterday\n2024-01-01T11:00:00Z").unwrap_err();
        assert!(matches!(err, QueryError::BadTimestamp { value, .. } if value == "yesterday"));
    }

    #[test]
    fn test_offset_is_subtracted_and_dropped() {
        let stamp = DateTime::parse_from_rfc3339("2024-01-01T10:00:00+02:00").unwrap();
        assert_eq!(to_naive_utc(stamp), naive(8, 0));
    }

    #[test]
    fn test_negative_offset_is_added() {
        let stamp = DateTime::parse_from_rfc3339("2024-01-01T10:00:00-05:00").unwrap();
        assert_eq!(to_naive_utc(stamp), naive(15, 0));
    }

    #[test]
    fn test_utc_stamp_is_unchanged() {
        let stamp = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z").unwrap();
        assert_eq!(to_naive_utc(stamp), naive(10, 0));
    }
}
