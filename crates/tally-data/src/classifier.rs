//! Line classification for exported chat transcripts.
//!
//! Export files have no explicit record markers: a physical line either opens
//! a new message (`<date> - <sender>: <text>`), carries a system notice
//! (`<date> - <text>` with no sender colon), or continues the previous
//! message's body. Whether the leading token parses as a date is the only
//! signal separating new records from wrapped continuations.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

// ── LineClass ─────────────────────────────────────────────────────────────────

/// The classification of one physical transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass<'a> {
    /// No meaningful content; produces no output.
    Blank,
    /// A dated line with no colon-delimited sender ("Messages are now
    /// secured", "X added Y"); skipped.
    System { timestamp: NaiveDateTime },
    /// Opens a new message record.
    MessageStart {
        timestamp: NaiveDateTime,
        sender: &'a str,
        text: &'a str,
    },
    /// Wrapped body text belonging to the previous message.
    Continuation { text: &'a str },
}

// ── Classification ────────────────────────────────────────────────────────────

/// Classify one physical line (without its trailing newline).
///
/// The header delimiter is the FIRST hyphen; the sender delimiter is the
/// FIRST colon after it, so colons inside the message body are preserved.
/// A line whose leading token fails date parsing is a continuation, never an
/// error.
pub fn classify(line: &str) -> LineClass<'_> {
    let trimmed = line.trim();
    if trimmed.chars().count() <= 1 {
        return LineClass::Blank;
    }

    let Some((head, rest)) = trimmed.split_once('-') else {
        return LineClass::Continuation { text: trimmed };
    };
    let Some(timestamp) = parse_header_timestamp(head) else {
        return LineClass::Continuation { text: trimmed };
    };

    let Some((sender, text)) = rest.split_once(':') else {
        return LineClass::System { timestamp };
    };
    let sender = sender.trim();
    if sender.is_empty() {
        // A colon with nothing before it cannot name a sender.
        return LineClass::System { timestamp };
    }

    LineClass::MessageStart {
        timestamp,
        sender,
        text: text.trim(),
    }
}

// ── Header timestamp parsing ──────────────────────────────────────────────────

/// `D/M/Y[, H:MM[:SS] [AM|PM]]`, with `.` accepted as the date separator and
/// optional surrounding brackets. Hyphen-separated dates are not recognised –
/// the hyphen is the header delimiter.
fn header_re() -> &'static Regex {
    static HEADER_RE: OnceLock<Regex> = OnceLock::new();
    HEADER_RE.get_or_init(|| {
        Regex::new(
            r"^\[?\s*(\d{1,2})[/.](\d{1,2})[/.](\d{2,4})(?:,?\s*(\d{1,2}):(\d{2})(?::(\d{2}))?\s*([AaPp][Mm])?)?\s*\]?$",
        )
        .expect("regex is valid")
    })
}

/// Parse the leading date/time token of a header line.
///
/// Dates are read day-first; when the day-first reading is not a valid
/// calendar date the month-first reading is tried. A missing time component
/// means midnight. Two-digit years are mapped into 2000–2099.
pub fn parse_header_timestamp(token: &str) -> Option<NaiveDateTime> {
    let caps = header_re().captures(token.trim())?;

    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[2].parse().ok()?;
    let mut year: i32 = caps[3].parse().ok()?;
    if year < 100 {
        year += 2000;
    }

    let date = NaiveDate::from_ymd_opt(year, second, first)
        .or_else(|| NaiveDate::from_ymd_opt(year, first, second))?;

    let time = match (caps.get(4), caps.get(5)) {
        (Some(hour), Some(minute)) => {
            let mut hour: u32 = hour.as_str().parse().ok()?;
            let minute: u32 = minute.as_str().parse().ok()?;
            let sec: u32 = caps
                .get(6)
                .and_then(|s| s.as_str().parse().ok())
                .unwrap_or(0);
            if let Some(meridiem) = caps.get(7) {
                let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
                if pm && hour < 12 {
                    hour += 12;
                } else if !pm && hour == 12 {
                    hour = 0;
                }
            }
            NaiveTime::from_hms_opt(hour, minute, sec)?
        }
        _ => NaiveTime::MIN,
    };

    Some(date.and_time(time))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
