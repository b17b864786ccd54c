//! Transcript discovery, decoding and loading.
//!
//! Exports are plain-text files in the export tool's native single-byte
//! encoding (ISO-8859-1); newer app versions write UTF-8. Decoding happens
//! here, before any line handling, so the parser itself never sees raw bytes.

use std::path::{Path, PathBuf};

use tally_core::error::{Result, TallyError};
use tally_core::models::{Conversation, TextEncoding};
use tracing::{debug, warn};

use crate::parser::parse_transcript;

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Find all `.txt` exports recursively under `root`, sorted by path.
pub fn find_export_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        warn!("export path does not exist: {}", root.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "txt")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Derive a conversation title from a path: file name minus extension.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decode raw transcript bytes under `encoding`.
///
/// ISO-8859-1 maps every byte to the Unicode codepoint of the same value, so
/// the Latin-1 path cannot fail; the UTF-8 path reports the offset of the
/// first invalid byte.
pub fn decode_transcript(bytes: &[u8], encoding: TextEncoding) -> Result<String> {
    match encoding {
        TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        TextEncoding::Utf8 => {
            String::from_utf8(bytes.to_vec()).map_err(|err| TallyError::Decode {
                encoding: encoding.label().to_string(),
                offset: err.utf8_error().valid_up_to(),
            })
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Read, decode and parse one export file into a [`Conversation`].
///
/// `title` overrides the file-stem-derived conversation title when given.
///
/// [`Conversation`]: tally_core::models::Conversation
pub fn load_conversation(
    path: &Path,
    encoding: TextEncoding,
    title: Option<&str>,
) -> Result<Conversation> {
    let bytes = std::fs::read(path).map_err(|source| TallyError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode_transcript(&bytes, encoding)?;
    let title = title
        .map(str::to_string)
        .unwrap_or_else(|| title_from_path(path));

    debug!(
        "decoded {} bytes from {} as {}",
        bytes.len(),
        path.display(),
        encoding.label()
    );

    Ok(parse_transcript(&text, title))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
