use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TallyError;

// ── TextEncoding ──────────────────────────────────────────────────────────────

/// Byte encoding of an exported transcript.
///
/// Older export versions write ISO-8859-1; newer ones write UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Latin1,
    Utf8,
}

impl TextEncoding {
    /// Canonical IANA charset label.
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Latin1 => "iso-8859-1",
            TextEncoding::Utf8 => "utf-8",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Utf8 => "utf8",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TextEncoding {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latin1" | "latin-1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            other => Err(TallyError::Config(format!("unknown encoding: {}", other))),
        }
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// A single chat message parsed from the transcript.
///
/// `sender` is non-empty after trimming; `text` may be empty. The timestamp is
/// timezone-naive, exactly as written by the export tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: NaiveDateTime,
    pub sender: String,
    pub text: String,
}

// ── Conversation ──────────────────────────────────────────────────────────────

/// An immutable, fully-parsed chat transcript.
///
/// Messages keep their source order (never re-sorted); the participant list is
/// derived once at construction, unique senders in order of first appearance.
/// There is no mutation API – a conversation is built by one parse pass and
/// read for the rest of the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    title: String,
    messages: Vec<Message>,
    participants: Vec<String>,
}

impl Conversation {
    /// Build a conversation from parsed messages, deriving the participant set.
    pub fn new(title: impl Into<String>, messages: Vec<Message>) -> Self {
        let mut participants: Vec<String> = Vec::new();
        for message in &messages {
            if !participants.contains(&message.sender) {
                participants.push(message.sender.clone());
            }
        }
        Self {
            title: title.into(),
            messages,
            participants,
        }
    }

    /// Chart title, usually derived from the export file name.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// All messages in source order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Unique senders, in order of first appearance.
    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Timestamps of the positionally first and last messages.
    ///
    /// `None` for an empty conversation.
    pub fn span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.messages.first()?;
        let last = self.messages.last()?;
        Some((first.timestamp, last.timestamp))
    }
}

// ── TimeBin ───────────────────────────────────────────────────────────────────

/// A half-open time interval `[start, end)` used while binning.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use tally_core::models::TimeBin;
///
/// let start = NaiveDate::from_ymd_opt(2019, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let end = NaiveDate::from_ymd_opt(2019, 2, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let bin = TimeBin { start, end };
/// assert!(bin.contains(start));
/// assert!(!bin.contains(end));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBin {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeBin {
    /// Inclusive of `start`, exclusive of `end`.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn width(&self) -> TimeDelta {
        self.end - self.start
    }
}

// ── TallyTable ────────────────────────────────────────────────────────────────

/// Per-sender message counts aligned with an ordered sequence of bin starts.
///
/// Each sender maps to one count per bin. Senders with no messages in the
/// queried range are omitted; callers needing the full participant universe
/// union with [`Conversation::participants`] themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyTable {
    pub bin_starts: Vec<NaiveDateTime>,
    pub counts: BTreeMap<String, Vec<u64>>,
}

impl TallyTable {
    /// An empty table over the given bins.
    pub fn with_bins(bin_starts: Vec<NaiveDateTime>) -> Self {
        Self {
            bin_starts,
            counts: BTreeMap::new(),
        }
    }

    pub fn num_bins(&self) -> usize {
        self.bin_starts.len()
    }

    /// Senders present in the table, in sorted order.
    pub fn senders(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// The count series for one sender, aligned with `bin_starts`.
    pub fn series(&self, sender: &str) -> Option<&[u64]> {
        self.counts.get(sender).map(Vec::as_slice)
    }

    /// Sum of all bins for one sender (0 when absent).
    pub fn total(&self, sender: &str) -> u64 {
        self.series(sender)
            .map(|counts| counts.iter().sum())
            .unwrap_or(0)
    }

    /// True when no sender has any counts.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

// ── TallyBundle ───────────────────────────────────────────────────────────────

/// The pair of tables produced by one aggregation pass.
///
/// `windowed` resets its counts at each bin boundary; `cumulative` carries a
/// per-day running total from the start of the queried range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyBundle {
    pub windowed: TallyTable,
    pub cumulative: TallyTable,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
