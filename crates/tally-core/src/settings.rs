use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::binning::BinWidth;
use crate::models::TextEncoding;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Per-participant message tallies from exported chat transcripts
#[derive(Parser, Debug, Clone)]
#[command(
    name = "chat-tally",
    about = "Per-participant message tallies from exported chat transcripts",
    version
)]
pub struct Settings {
    /// Exported transcript (.txt), or a directory of exports
    #[arg(required_unless_present = "clear")]
    pub file: Option<PathBuf>,

    /// Chart title (defaults to the file name minus extension)
    #[arg(long)]
    pub title: Option<String>,

    /// Bin width for the windowed tally (e.g. "1d", "2w", "month")
    #[arg(long, default_value = "1d")]
    pub bin_width: BinWidth,

    /// Start of the queried range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<chrono::NaiveDate>,

    /// End of the queried range, exclusive (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<chrono::NaiveDate>,

    /// Count bursts of consecutive same-sender messages as one message
    #[arg(long)]
    pub collapse_bursts: bool,

    /// Gap threshold for burst collapsing, in seconds
    #[arg(long, default_value = "30")]
    pub burst_threshold_secs: u64,

    /// Transcript byte encoding
    #[arg(long, default_value = "latin1")]
    pub encoding: TextEncoding,

    /// Which tables to produce
    #[arg(long, default_value = "both", value_parser = ["windowed", "cumulative", "both"])]
    pub tables: String,

    /// Emit chart data as JSON instead of text tables
    #[arg(long)]
    pub json: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.chat-tally/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_bursts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst_threshold_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    /// Uses `~/.chat-tally/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".chat-tally").join("last_used.json")
    }

    /// Load persisted params from the default path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load persisted params from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to the default path, creating parent directories
    /// if needed.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&Self::config_path())
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the default config file if it exists.
    pub fn clear() -> Result<(), std::io::Error> {
        Self::clear_at(&Self::config_path())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] but accepts an explicit
    /// argument list, enabling unit-testing without spawning subprocesses.
    pub fn load_with_last_used_from_args(args: Vec<std::ffi::OsString>) -> Self {
        Self::load_with_last_used_impl(args, &LastUsedParams::config_path())
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());

        // Parse into the typed struct using the same args.
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug_override(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // Merge last-used values for fields that were NOT explicitly set on the
        // command line (CLI always wins). Per-invocation fields (file, title,
        // since/until) are never persisted.
        if !is_arg_explicitly_set(&matches, "bin_width") {
            if let Some(width) = last.bin_width.as_deref().and_then(|w| w.parse().ok()) {
                settings.bin_width = width;
            }
        }
        if !is_arg_explicitly_set(&matches, "collapse_bursts") {
            if let Some(flag) = last.collapse_bursts {
                settings.collapse_bursts = flag;
            }
        }
        if !is_arg_explicitly_set(&matches, "burst_threshold_secs") {
            if let Some(secs) = last.burst_threshold_secs {
                settings.burst_threshold_secs = secs;
            }
        }
        if !is_arg_explicitly_set(&matches, "encoding") {
            if let Some(enc) = last.encoding.as_deref().and_then(|e| e.parse().ok()) {
                settings.encoding = enc;
            }
        }
        if !is_arg_explicitly_set(&matches, "tables") {
            if let Some(tables) = last.tables {
                settings.tables = tables;
            }
        }

        settings = Self::apply_debug_override(settings);

        // Persist current settings for next run.
        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// `--debug` overrides the configured log level.
    fn apply_debug_override(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            bin_width: Some(s.bin_width.to_string()),
            collapse_bursts: Some(s.collapse_bursts),
            burst_threshold_secs: Some(s.burst_threshold_secs),
            encoding: Some(s.encoding.to_string()),
            tables: Some(s.tables.clone()),
        }
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
