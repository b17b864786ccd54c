//! Calendar-aware bin construction over a half-open time range.

use chrono::{Months, NaiveDateTime, NaiveTime, TimeDelta};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::TallyError;
use crate::models::TimeBin;

// ── BinWidth ──────────────────────────────────────────────────────────────────

/// Width of one tally bin.
///
/// Day and week widths are fixed durations; month widths step through the
/// calendar, so consecutive bins may differ in length.
///
/// # Examples
///
/// ```
/// use tally_core::binning::BinWidth;
///
/// assert_eq!("1d".parse::<BinWidth>().unwrap(), BinWidth::Days(1));
/// assert_eq!("2w".parse::<BinWidth>().unwrap(), BinWidth::Weeks(2));
/// assert_eq!("month".parse::<BinWidth>().unwrap(), BinWidth::Months(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinWidth {
    Days(u32),
    Weeks(u32),
    Months(u32),
}

impl Default for BinWidth {
    fn default() -> Self {
        BinWidth::Days(1)
    }
}

impl BinWidth {
    /// The start of the bin following one that starts at `start`.
    ///
    /// Month steps clamp to the last day of a shorter target month
    /// (Jan 31 + 1 month = Feb 28/29).
    pub fn advance(&self, start: NaiveDateTime) -> NaiveDateTime {
        match *self {
            BinWidth::Days(n) => start + TimeDelta::days(i64::from(n)),
            BinWidth::Weeks(n) => start + TimeDelta::weeks(i64::from(n)),
            BinWidth::Months(n) => match start.checked_add_months(Months::new(n)) {
                Some(next) => next,
                None => {
                    warn!("month step past the calendar limit at {}", start);
                    start
                }
            },
        }
    }
}

impl fmt::Display for BinWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BinWidth::Days(n) => write!(f, "{}d", n),
            BinWidth::Weeks(n) => write!(f, "{}w", n),
            BinWidth::Months(n) => write!(f, "{}m", n),
        }
    }
}

impl FromStr for BinWidth {
    type Err = TallyError;

    /// Accepts `"day"`/`"week"`/`"month"` and the short forms `"<n>d"`,
    /// `"<n>w"`, `"<n>m"` (count defaults to 1). Zero counts are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim().to_lowercase();
        match spec.as_str() {
            "day" | "daily" => return Ok(BinWidth::Days(1)),
            "week" | "weekly" => return Ok(BinWidth::Weeks(1)),
            "month" | "monthly" => return Ok(BinWidth::Months(1)),
            _ => {}
        }

        let Some(unit) = spec.chars().last() else {
            return Err(TallyError::BinWidth(s.to_string()));
        };
        let digits = &spec[..spec.len() - unit.len_utf8()];
        let count: u32 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| TallyError::BinWidth(s.to_string()))?
        };
        if count == 0 {
            return Err(TallyError::BinWidth(s.to_string()));
        }

        match unit {
            'd' => Ok(BinWidth::Days(count)),
            'w' => Ok(BinWidth::Weeks(count)),
            'm' => Ok(BinWidth::Months(count)),
            _ => Err(TallyError::BinWidth(s.to_string())),
        }
    }
}

// ── Day helpers ───────────────────────────────────────────────────────────────

/// Midnight at the start of the day containing `ts`.
pub fn start_of_day(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_time(NaiveTime::MIN)
}

/// Midnight at the start of the day after the one containing `ts`.
pub fn start_of_next_day(ts: NaiveDateTime) -> NaiveDateTime {
    start_of_day(ts) + TimeDelta::days(1)
}

// ── Bin construction ──────────────────────────────────────────────────────────

/// Partition `[start, end)` into consecutive bins of `width`.
///
/// The final bin runs past `end` when the range is not an exact multiple of
/// the width, so the whole range is always covered. `start >= end` yields an
/// empty vector.
pub fn build_bins(start: NaiveDateTime, end: NaiveDateTime, width: BinWidth) -> Vec<TimeBin> {
    let mut bins = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = width.advance(cursor);
        if next <= cursor {
            warn!("bin width made no forward progress at {}; stopping", cursor);
            break;
        }
        bins.push(TimeBin {
            start: cursor,
            end: next,
        });
        cursor = next;
    }
    bins
}

// ── Tests ─────────────────────────────────────────────────────────────────────
