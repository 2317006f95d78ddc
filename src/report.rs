use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

use crate::notification::{EventKind, VoiceEvent};

/// One attendance row: a user's stay in the voice channel. A bound is
/// absent when the matching event fell outside the queried window.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub user_id: u64,
    pub date_start: Option<NaiveDateTime>,
    pub date_end: Option<NaiveDateTime>,
}

impl ReportEntry {
    fn opened(user_id: u64, start: NaiveDateTime) -> Self {
        Self {
            user_id,
            date_start: Some(start),
            date_end: None,
        }
    }

    fn orphan(user_id: u64, end: NaiveDateTime) -> Self {
        Self {
            user_id,
            date_start: None,
            date_end: Some(end),
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match (self.date_start, self.date_end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// One tab-separated report line; absent bounds render as empty
    /// fields, elapsed as `H:MM:SS` when both bounds are present.
    pub fn render(&self, name: &str) -> String {
        let date_start = self.date_start.map(format_stamp).unwrap_or_default();
        let date_end = self.date_end.map(format_stamp).unwrap_or_default();
        let elapsed = self.elapsed().map(format_elapsed).unwrap_or_default();
        format!("{name}\t{date_start}\t{date_end}\t{elapsed}\n")
    }
}

/// Pairs an oldest-first run of one channel's events into attendance
/// entries.
///
/// A join always opens a new entry. A leave closes the user's most
/// recently opened entry that is still open; a user with no open entry
/// left gets an orphan carrying only the end bound. Entries keep the
/// order their opening event arrived in; closing never reorders.
pub fn build_report(events: &[VoiceEvent]) -> Vec<ReportEntry> {
    let mut report: Vec<ReportEntry> = Vec::new();
    // Indices of still-open entries per user, most recent on top.
    let mut open: HashMap<u64, Vec<usize>> = HashMap::new();

    for event in events {
        match event.kind {
            EventKind::Join => {
                open.entry(event.user_id).or_default().push(report.len());
                report.push(ReportEntry::opened(event.user_id, event.timestamp));
            }
            EventKind::Leave => match open.get_mut(&event.user_id).and_then(|stack| stack.pop()) {
                Some(index) => report[index].date_end = Some(event.timestamp),
                None => report.push(ReportEntry::orphan(event.user_id, event.timestamp)),
            },
        }
    }

    report
}

fn format_stamp(stamp: NaiveDateTime) -> String {
    stamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds();
    format!("{}:{:02}:{:02}", total / 3600, total % 3600 / 60, total % 60)
}
