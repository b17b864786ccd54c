//! Ingestion and aggregation layer for chat-tally.
//!
//! Responsible for decoding exported chat transcripts, classifying and
//! parsing their lines into an immutable conversation model, and tallying
//! message counts into time-binned tables for the charting client.

pub mod aggregator;
pub mod analysis;
pub mod classifier;
pub mod parser;
pub mod reader;

pub use tally_core as core;
