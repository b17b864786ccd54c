mod bootstrap;
mod render;

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use tally_core::settings::Settings;
use tally_data::aggregator::{AggregateOptions, BurstPolicy};
use tally_data::analysis::{build_chart_data, ChartSelection};
use tally_data::reader::{find_export_files, load_conversation};

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("chat-tally v{} starting", env!("CARGO_PKG_VERSION"));

    let Some(input) = settings.file.clone() else {
        // --clear with no input: saved configuration was already removed
        // during settings loading.
        tracing::info!("saved configuration cleared");
        return Ok(());
    };

    let files = if input.is_dir() {
        let found = find_export_files(&input);
        if found.is_empty() {
            bail!("no .txt exports found under {}", input.display());
        }
        found
    } else {
        vec![input]
    };

    let selection = match settings.tables.as_str() {
        "windowed" => ChartSelection {
            windowed_bar: true,
            cumulative_stack: false,
        },
        "cumulative" => ChartSelection {
            windowed_bar: false,
            cumulative_stack: true,
        },
        _ => ChartSelection::default(),
    };

    let options = AggregateOptions {
        bin_width: settings.bin_width,
        since: settings.since.map(|d| d.and_time(NaiveTime::MIN)),
        until: settings.until.map(|d| d.and_time(NaiveTime::MIN)),
        burst: settings
            .collapse_bursts
            .then(|| BurstPolicy::with_threshold_secs(settings.burst_threshold_secs)),
    };

    for path in &files {
        let conversation = load_conversation(path, settings.encoding, settings.title.as_deref())
            .with_context(|| format!("loading {}", path.display()))?;

        tracing::info!(
            "\"{}\": {} messages from {} participants",
            conversation.title(),
            conversation.message_count(),
            conversation.participants().len()
        );

        let data = build_chart_data(&conversation, selection, &options)?;
        if settings.json {
            println!("{}", data.to_json()?);
        } else {
            print!("{}", render::render_chart_data(&data));
        }
    }

    Ok(())
}
