use crate::collectors::fs::FileSystem;
use crate::collectors::{run_blocking, ProbeError};
use crate::config::Config;
use crate::report::InventoryEntry;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const BINARY_SNIFF_BYTES: usize = 8192;

pub async fn collect_inventory(
    fs: &Arc<dyn FileSystem>,
    cfg: &Config,
) -> (Vec<InventoryEntry>, u64) {
    let limit = Duration::from_millis(cfg.inventory.read_timeout_ms);
    let mut entries = Vec::new();
    let mut errors = 0_u64;

    for dir in &cfg.inventory.dirs {
        let dir_path = cfg.resolve(dir);
        let listed = {
            let fs = Arc::clone(fs);
            run_blocking(limit, move || fs.list_files(&dir_path).map_err(ProbeError::from)).await
        };
        let files = match listed {
            Ok(files) => files,
            Err(ProbeError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %dir, "inventory dir missing");
                continue;
            }
            Err(err) => {
                warn!(dir = %dir, error = %err, "inventory dir scan failed");
                errors += 1;
                continue;
            }
        };

        for file in files {
            let shown = display_path(dir, &file);
            let (entry, had_error) =
                scan_file(fs, file, shown, cfg.inventory.max_read_bytes, limit).await;
            if had_error {
                errors += 1;
            }
            entries.push(entry);
        }
    }

    (entries, errors)
}

fn display_path(dir: &str, file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

async fn scan_file(
    fs: &Arc<dyn FileSystem>,
    path: PathBuf,
    shown: String,
    max_read_bytes: u64,
    limit: Duration,
) -> (InventoryEntry, bool) {
    let fs = Arc::clone(fs);
    let scanned = run_blocking(limit, move || {
        let meta = fs.metadata(&path)?;
        let head = fs.read_head(&path, max_read_bytes);
        Ok((meta, head))
    })
    .await;

    let (meta, head) = match scanned {
        Ok(v) => v,
        Err(err) => {
            warn!(file = %shown, error = %err, "inventory file scan failed");
            return (
                InventoryEntry {
                    path: shown,
                    size_bytes: 0,
                    modified_at: None,
                    line_count: None,
                    note: Some(err.to_string()),
                },
                true,
            );
        }
    };

    let modified_at = meta
        .modified
        .map(|t| humantime::format_rfc3339_seconds(t).to_string());

    let (line_count, note, had_error) = match head {
        Ok(bytes) if looks_binary(&bytes) => (None, Some("binary file".to_string()), false),
        Ok(bytes) => {
            let note = (meta.size_bytes > bytes.len() as u64)
                .then(|| format!("line count covers first {} bytes", bytes.len()));
            (Some(count_lines(&bytes)), note, false)
        }
        Err(err) => {
            warn!(file = %shown, error = %err, "inventory file read failed");
            (None, Some(format!("read failed: {err}")), true)
        }
    };

    (
        InventoryEntry {
            path: shown,
            size_bytes: meta.size_bytes,
            modified_at,
            line_count,
            note,
        },
        had_error,
    )
}

/// Newline-delimited records; a last record without a trailing newline counts.
pub fn count_lines(bytes: &[u8]) -> u64 {
    let newlines = bytes.iter().filter(|b| **b == b'\n').count() as u64;
    match bytes.last() {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0)
}
