//! Time-binned message tallies over a conversation.
//!
//! One aggregation pass produces two tables: a windowed table whose counts
//! reset at every bin boundary, and a cumulative table carrying a per-day
//! running total from the start of the queried range. The conversation is
//! never mutated, so one model can serve any number of concurrent requests.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};
use tally_core::binning::{build_bins, start_of_day, start_of_next_day, BinWidth};
use tally_core::error::{Result, TallyError};
use tally_core::models::{Conversation, Message, TallyBundle, TallyTable};
use tracing::debug;

// ── BurstPolicy ───────────────────────────────────────────────────────────────

/// Burst collapsing: consecutive messages from the same sender closer
/// together than `threshold` count as one message. The first message of a run
/// is always counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstPolicy {
    pub threshold: TimeDelta,
}

impl BurstPolicy {
    pub fn with_threshold_secs(secs: u64) -> Self {
        Self {
            threshold: TimeDelta::seconds(secs as i64),
        }
    }
}

impl Default for BurstPolicy {
    fn default() -> Self {
        Self::with_threshold_secs(30)
    }
}

// ── AggregateOptions ──────────────────────────────────────────────────────────

/// Parameters for one aggregation pass.
///
/// `since`/`until` bound the half-open queried range `[since, until)`; either
/// defaults to the conversation's own span (start of the first message's day,
/// start of the day after the last message). `burst` enables collapsing when
/// set.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    pub bin_width: BinWidth,
    pub since: Option<NaiveDateTime>,
    pub until: Option<NaiveDateTime>,
    pub burst: Option<BurstPolicy>,
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Tally `conversation` into a windowed and a cumulative table.
///
/// Messages outside the queried range are excluded entirely, never clamped
/// into a boundary bin. Bin membership is inclusive of the bin start and
/// exclusive of the bin end throughout, so a timestamp on a boundary counts
/// in the later bin. Senders with no in-range messages are omitted from the
/// tables.
pub fn aggregate(conversation: &Conversation, options: &AggregateOptions) -> Result<TallyBundle> {
    let Some((start, end)) = resolve_range(conversation, options)? else {
        return Ok(TallyBundle::default());
    };

    let in_range: Vec<&Message> = conversation
        .messages()
        .iter()
        .filter(|m| start <= m.timestamp && m.timestamp < end)
        .collect();

    let counted = match options.burst {
        Some(policy) => collapse_bursts(&in_range, policy),
        None => in_range.clone(),
    };

    let windowed = tally(&counted, start, end, options.bin_width);
    let cumulative = accumulate(tally(&counted, start, end, BinWidth::Days(1)));

    debug!(
        "tallied {} of {} in-range messages into {} bins",
        counted.len(),
        in_range.len(),
        windowed.num_bins()
    );

    Ok(TallyBundle {
        windowed,
        cumulative,
    })
}

/// Resolve the queried range, defaulting missing ends to the conversation's
/// span. `None` means there is nothing to bin (empty conversation, no
/// explicit bounds).
fn resolve_range(
    conversation: &Conversation,
    options: &AggregateOptions,
) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
    let span = conversation.span();

    let start = match options.since {
        Some(since) => since,
        None => match span {
            Some((first, _)) => start_of_day(first),
            None => return Ok(None),
        },
    };
    let end = match options.until {
        Some(until) => until,
        None => match span {
            Some((_, last)) => start_of_next_day(last),
            None => return Ok(None),
        },
    };

    if start > end {
        return Err(TallyError::InvalidRange { start, end });
    }
    Ok(Some((start, end)))
}

/// Drop every message that continues a burst: same sender as the immediately
/// preceding message and a gap below the threshold.
fn collapse_bursts<'a>(messages: &[&'a Message], policy: BurstPolicy) -> Vec<&'a Message> {
    let mut kept: Vec<&Message> = Vec::with_capacity(messages.len());
    let mut prev: Option<&Message> = None;

    for &message in messages {
        let in_burst = prev.is_some_and(|p| {
            p.sender == message.sender && (message.timestamp - p.timestamp) < policy.threshold
        });
        if !in_burst {
            kept.push(message);
        }
        prev = Some(message);
    }

    kept
}

/// Count messages per sender per bin over `[start, end)`.
fn tally(messages: &[&Message], start: NaiveDateTime, end: NaiveDateTime, width: BinWidth) -> TallyTable {
    let bins = build_bins(start, end, width);
    let bin_starts: Vec<NaiveDateTime> = bins.iter().map(|b| b.start).collect();
    let mut counts: BTreeMap<String, Vec<u64>> = BTreeMap::new();

    for &message in messages {
        // Index of the last bin starting at or before the timestamp; a
        // timestamp equal to a boundary lands in the later bin.
        let idx = bin_starts.partition_point(|&s| s <= message.timestamp);
        if idx == 0 {
            continue;
        }
        counts
            .entry(message.sender.clone())
            .or_insert_with(|| vec![0; bin_starts.len()])[idx - 1] += 1;
    }

    TallyTable { bin_starts, counts }
}

/// Turn a windowed table into a running total along the time axis.
fn accumulate(mut table: TallyTable) -> TallyTable {
    for series in table.counts.values_mut() {
        let mut running = 0u64;
        for slot in series.iter_mut() {
            running += *slot;
            *slot = running;
        }
    }
    table
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 2, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn msg(d: u32, h: u32, mi: u32, s: u32, sender: &str) -> Message {
        Message {
            timestamp: dt(d, h, mi, s),
            sender: sender.to_string(),
            text: "hi".to_string(),
        }
    }

    fn convo(messages: Vec<Message>) -> Conversation {
        Conversation::new("chat", messages)
    }

    fn daily() -> AggregateOptions {
        AggregateOptions::default()
    }

    // ── Range resolution ──────────────────────────────────────────────────────

    #[test]
    fn test_default_range_covers_whole_days() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(3, 23, 59, 59, "Alice")]);
        let bundle = aggregate(&convo, &daily()).unwrap();

        // Day of the first message through the day after the last.
        assert_eq!(
            bundle.windowed.bin_starts,
            vec![dt(1, 0, 0, 0), dt(2, 0, 0, 0), dt(3, 0, 0, 0)]
        );
        assert_eq!(bundle.windowed.series("Alice"), Some(&[1, 0, 1][..]));
    }

    #[test]
    fn test_invalid_range_is_an_error() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice")]);
        let options = AggregateOptions {
            since: Some(dt(5, 0, 0, 0)),
            until: Some(dt(1, 0, 0, 0)),
            ..daily()
        };
        let err = aggregate(&convo, &options).unwrap_err();
        assert!(matches!(err, TallyError::InvalidRange { .. }));
    }

    #[test]
    fn test_equal_start_and_end_yields_no_bins() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice")]);
        let options = AggregateOptions {
            since: Some(dt(1, 0, 0, 0)),
            until: Some(dt(1, 0, 0, 0)),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(bundle.windowed.num_bins(), 0);
        assert!(bundle.windowed.is_empty());
    }

    #[test]
    fn test_empty_conversation_default_range() {
        let bundle = aggregate(&convo(vec![]), &daily()).unwrap();
        assert_eq!(bundle.windowed.num_bins(), 0);
        assert_eq!(bundle.cumulative.num_bins(), 0);
    }

    #[test]
    fn test_empty_conversation_explicit_range_keeps_bins() {
        let options = AggregateOptions {
            since: Some(dt(1, 0, 0, 0)),
            until: Some(dt(3, 0, 0, 0)),
            ..daily()
        };
        let bundle = aggregate(&convo(vec![]), &options).unwrap();
        assert_eq!(bundle.windowed.num_bins(), 2);
        assert!(bundle.windowed.is_empty());
    }

    #[test]
    fn test_out_of_range_messages_excluded_entirely() {
        let convo = convo(vec![
            msg(1, 10, 0, 0, "Alice"),
            msg(2, 10, 0, 0, "Alice"),
            msg(3, 10, 0, 0, "Alice"),
        ]);
        let options = AggregateOptions {
            since: Some(dt(2, 0, 0, 0)),
            until: Some(dt(3, 0, 0, 0)),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(bundle.windowed.total("Alice"), 1);
    }

    #[test]
    fn test_sender_with_no_in_range_messages_is_omitted() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(5, 10, 0, 0, "Bob")]);
        let options = AggregateOptions {
            since: Some(dt(1, 0, 0, 0)),
            until: Some(dt(2, 0, 0, 0)),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert!(bundle.windowed.series("Bob").is_none());
        assert_eq!(bundle.windowed.series("Alice"), Some(&[1][..]));
    }

    // ── Windowed tallies ──────────────────────────────────────────────────────

    #[test]
    fn test_single_day_conversation_single_bin() {
        let convo = convo(vec![
            msg(1, 9, 0, 0, "Alice"),
            msg(1, 12, 0, 0, "Bob"),
            msg(1, 18, 30, 0, "Alice"),
        ]);
        let bundle = aggregate(&convo, &daily()).unwrap();

        assert_eq!(bundle.windowed.num_bins(), 1);
        assert_eq!(bundle.windowed.series("Alice"), Some(&[2][..]));
        assert_eq!(bundle.windowed.series("Bob"), Some(&[1][..]));
    }

    #[test]
    fn test_boundary_timestamp_counts_in_next_bin() {
        let convo = convo(vec![msg(2, 0, 0, 0, "Alice")]);
        let options = AggregateOptions {
            since: Some(dt(1, 0, 0, 0)),
            until: Some(dt(3, 0, 0, 0)),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(bundle.windowed.series("Alice"), Some(&[0, 1][..]));
    }

    #[test]
    fn test_zero_bins_recorded_not_absent() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(4, 10, 0, 0, "Alice")]);
        let bundle = aggregate(&convo, &daily()).unwrap();
        assert_eq!(bundle.windowed.series("Alice"), Some(&[1, 0, 0, 1][..]));
    }

    #[test]
    fn test_weekly_bins_with_ragged_tail() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(9, 10, 0, 0, "Alice")]);
        let options = AggregateOptions {
            bin_width: BinWidth::Weeks(1),
            since: Some(dt(1, 0, 0, 0)),
            until: Some(dt(10, 0, 0, 0)),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();

        // 9 days of range: one full week plus an extended final bin.
        assert_eq!(bundle.windowed.num_bins(), 2);
        assert_eq!(bundle.windowed.series("Alice"), Some(&[1, 1][..]));
    }

    #[test]
    fn test_monthly_bins_are_calendar_aware() {
        let jan = NaiveDate::from_ymd_opt(2019, 1, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let feb = NaiveDate::from_ymd_opt(2019, 2, 20)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mar = NaiveDate::from_ymd_opt(2019, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let convo = convo(vec![
            Message {
                timestamp: jan,
                sender: "Alice".to_string(),
                text: String::new(),
            },
            Message {
                timestamp: feb,
                sender: "Alice".to_string(),
                text: String::new(),
            },
            Message {
                timestamp: mar,
                sender: "Alice".to_string(),
                text: String::new(),
            },
        ]);
        let options = AggregateOptions {
            bin_width: BinWidth::Months(1),
            since: NaiveDate::from_ymd_opt(2019, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0),
            until: NaiveDate::from_ymd_opt(2019, 4, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(bundle.windowed.num_bins(), 3);
        assert_eq!(bundle.windowed.series("Alice"), Some(&[1, 1, 1][..]));
    }

    // ── Cumulative tallies ────────────────────────────────────────────────────

    #[test]
    fn test_cumulative_uses_day_granularity() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(3, 10, 0, 0, "Alice")]);
        let options = AggregateOptions {
            bin_width: BinWidth::Weeks(1),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();

        // The windowed table follows the caller's width, the cumulative table
        // is always per-day.
        assert_eq!(bundle.windowed.num_bins(), 1);
        assert_eq!(bundle.cumulative.num_bins(), 3);
        assert_eq!(bundle.cumulative.series("Alice"), Some(&[1, 1, 2][..]));
    }

    #[test]
    fn test_cumulative_is_monotonic() {
        let convo = convo(vec![
            msg(1, 8, 0, 0, "Alice"),
            msg(1, 9, 0, 0, "Bob"),
            msg(2, 8, 0, 0, "Alice"),
            msg(4, 8, 0, 0, "Bob"),
            msg(4, 9, 0, 0, "Alice"),
        ]);
        let bundle = aggregate(&convo, &daily()).unwrap();

        for sender in ["Alice", "Bob"] {
            let series = bundle.cumulative.series(sender).unwrap();
            assert!(series.windows(2).all(|w| w[0] <= w[1]), "{:?}", series);
        }
    }

    #[test]
    fn test_windowed_sums_match_final_cumulative() {
        let convo = convo(vec![
            msg(1, 8, 0, 0, "Alice"),
            msg(2, 9, 0, 0, "Alice"),
            msg(2, 9, 5, 0, "Bob"),
            msg(5, 20, 0, 0, "Alice"),
        ]);
        let options = AggregateOptions {
            bin_width: BinWidth::Weeks(1),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();

        for sender in ["Alice", "Bob"] {
            let windowed_total = bundle.windowed.total(sender);
            let final_cumulative = *bundle.cumulative.series(sender).unwrap().last().unwrap();
            assert_eq!(windowed_total, final_cumulative, "{}", sender);
        }
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let convo = convo(vec![msg(1, 8, 0, 0, "Alice"), msg(2, 9, 0, 0, "Bob")]);
        let options = AggregateOptions {
            burst: Some(BurstPolicy::default()),
            ..daily()
        };
        let first = aggregate(&convo, &options).unwrap();
        let second = aggregate(&convo, &options).unwrap();
        assert_eq!(first, second);
    }

    // ── Burst collapsing ──────────────────────────────────────────────────────

    #[test]
    fn test_burst_within_threshold_counts_once() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(1, 10, 0, 10, "Alice")]);
        let options = AggregateOptions {
            burst: Some(BurstPolicy::default()),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(bundle.windowed.total("Alice"), 1);
    }

    #[test]
    fn test_burst_beyond_threshold_counts_twice() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(1, 10, 1, 0, "Alice")]);
        let options = AggregateOptions {
            burst: Some(BurstPolicy::default()),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(bundle.windowed.total("Alice"), 2);
    }

    #[test]
    fn test_burst_chain_collapses_to_one() {
        let convo = convo(vec![
            msg(1, 10, 0, 0, "Alice"),
            msg(1, 10, 0, 10, "Alice"),
            msg(1, 10, 0, 20, "Alice"),
            msg(1, 10, 0, 29, "Alice"),
        ]);
        let options = AggregateOptions {
            burst: Some(BurstPolicy::default()),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(bundle.windowed.total("Alice"), 1);
    }

    #[test]
    fn test_burst_broken_by_other_sender() {
        let convo = convo(vec![
            msg(1, 10, 0, 0, "Alice"),
            msg(1, 10, 0, 5, "Bob"),
            msg(1, 10, 0, 10, "Alice"),
        ]);
        let options = AggregateOptions {
            burst: Some(BurstPolicy::default()),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();

        // Bob interrupts Alice's run, so both of her messages count.
        assert_eq!(bundle.windowed.total("Alice"), 2);
        assert_eq!(bundle.windowed.total("Bob"), 1);
    }

    #[test]
    fn test_burst_threshold_is_configurable() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(1, 10, 1, 0, "Alice")]);
        let options = AggregateOptions {
            burst: Some(BurstPolicy::with_threshold_secs(120)),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(bundle.windowed.total("Alice"), 1);
    }

    #[test]
    fn test_burst_collapsing_never_increases_counts() {
        let messages = vec![
            msg(1, 10, 0, 0, "Alice"),
            msg(1, 10, 0, 10, "Alice"),
            msg(1, 11, 0, 0, "Bob"),
            msg(2, 10, 0, 0, "Alice"),
        ];
        let plain = aggregate(&convo(messages.clone()), &daily()).unwrap();
        let collapsed = aggregate(
            &convo(messages),
            &AggregateOptions {
                burst: Some(BurstPolicy::default()),
                ..daily()
            },
        )
        .unwrap();

        for sender in ["Alice", "Bob"] {
            assert!(collapsed.windowed.total(sender) <= plain.windowed.total(sender));
        }
    }

    #[test]
    fn test_burst_applies_to_cumulative_table_too() {
        let convo = convo(vec![msg(1, 10, 0, 0, "Alice"), msg(1, 10, 0, 10, "Alice")]);
        let options = AggregateOptions {
            burst: Some(BurstPolicy::default()),
            ..daily()
        };
        let bundle = aggregate(&convo, &options).unwrap();
        assert_eq!(*bundle.cumulative.series("Alice").unwrap().last().unwrap(), 1);
    }
}
