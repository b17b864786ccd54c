//! Chart-data pipeline.
//!
//! One call takes a conversation plus a chart request and returns everything
//! the charting client needs: the requested tables, the labels, and metadata
//! about the run. The client never reads raw messages.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tally_core::error::Result;
use tally_core::models::{Conversation, TallyBundle, TallyTable};
use tracing::debug;

use crate::aggregator::{aggregate, AggregateOptions};

// ── Public types ──────────────────────────────────────────────────────────────

/// Which outputs the caller wants.
///
/// An explicit capability set rather than string-keyed flags; unrequested
/// tables are simply absent from the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSelection {
    pub windowed_bar: bool,
    pub cumulative_stack: bool,
}

impl Default for ChartSelection {
    fn default() -> Self {
        Self {
            windowed_bar: true,
            cumulative_stack: true,
        }
    }
}

/// Metadata produced alongside the chart data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// Total messages in the conversation (before range filtering).
    pub message_count: usize,
    /// Number of distinct participants in the conversation.
    pub participant_count: usize,
    /// Number of windowed bins produced.
    pub bin_count: usize,
    /// Wall-clock seconds spent aggregating.
    pub aggregate_time_seconds: f64,
}

/// The complete output of [`build_chart_data`], ready for a renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartData {
    pub title: String,
    pub participants: Vec<String>,
    pub windowed: Option<TallyTable>,
    pub cumulative: Option<TallyTable>,
    pub metadata: ChartMetadata,
}

impl ChartData {
    /// Serialize for out-of-process charting collaborators.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| tally_core::error::TallyError::Other(err.into()))
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Run one aggregation pass and package the requested tables.
pub fn build_chart_data(
    conversation: &Conversation,
    selection: ChartSelection,
    options: &AggregateOptions,
) -> Result<ChartData> {
    let aggregate_start = std::time::Instant::now();
    let bundle = aggregate(conversation, options)?;
    let aggregate_time = aggregate_start.elapsed().as_secs_f64();

    let bin_count = bundle.windowed.num_bins();
    let TallyBundle {
        windowed,
        cumulative,
    } = bundle;

    let metadata = ChartMetadata {
        generated_at: Utc::now().to_rfc3339(),
        message_count: conversation.message_count(),
        participant_count: conversation.participants().len(),
        bin_count,
        aggregate_time_seconds: aggregate_time,
    };

    debug!(
        "chart data for \"{}\": {} bins in {:.3}s",
        conversation.title(),
        bin_count,
        aggregate_time
    );

    Ok(ChartData {
        title: conversation.title().to_string(),
        participants: conversation.participants().to_vec(),
        windowed: selection.windowed_bar.then_some(windowed),
        cumulative: selection.cumulative_stack.then_some(cumulative),
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
