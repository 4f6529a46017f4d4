use crate::collectors::fs::FileSystem;
use crate::collectors::run_blocking;
use crate::config::{Config, PathKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Last non-empty lines of each configured log file that exists.
pub async fn collect_recent_errors(
    fs: &Arc<dyn FileSystem>,
    cfg: &Config,
) -> (BTreeMap<String, Vec<String>>, u64) {
    let limit = Duration::from_millis(cfg.inventory.read_timeout_ms);
    let max_bytes = cfg.recent_logs.max_read_bytes;
    let tail_lines = cfg.recent_logs.tail_lines;
    let mut out = BTreeMap::new();
    let mut errors = 0_u64;

    for name in &cfg.recent_logs.files {
        let path = cfg.resolve(name);
        let fs = Arc::clone(fs);
        let read = run_blocking(limit, move || {
            if fs.kind_of(&path)? != Some(PathKind::File) {
                return Ok(None);
            }
            let size = fs.metadata(&path)?.size_bytes;
            if size <= max_bytes {
                return Ok(Some((fs.read_tail(&path, max_bytes)?, false)));
            }
            // one extra byte tells whether the window starts on a line boundary
            let mut bytes = fs.read_tail(&path, max_bytes.saturating_add(1))?;
            if (bytes.len() as u64) <= max_bytes {
                return Ok(Some((bytes, false)));
            }
            let before = bytes.remove(0);
            Ok(Some((bytes, before != b'\n')))
        })
        .await;

        match read {
            Ok(Some((bytes, cut))) => {
                let text = String::from_utf8_lossy(&bytes);
                out.insert(name.clone(), last_lines(&text, tail_lines, cut));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(file = %name, error = %err, "log tail failed");
                errors += 1;
            }
        }
    }

    (out, errors)
}

/// When the read started mid-line the first line is partial and dropped.
fn last_lines(text: &str, n: usize, starts_mid_line: bool) -> Vec<String> {
    let skip = usize::from(starts_mid_line);
    let lines: Vec<&str> = text
        .lines()
        .skip(skip)
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    lines[lines.len().saturating_sub(n)..]
        .iter()
        .map(|l| l.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fs::fake::MemoryFs;
    use std::path::PathBuf;

    fn cfg() -> Config {
        Config {
            root: PathBuf::from("/bot"),
            ..Config::default()
        }
    }

    #[test]
    fn keeps_last_non_empty_lines() {
        let text = "a\n\nb\nc\n\nd\n";
        assert_eq!(last_lines(text, 2, false), vec!["c", "d"]);
        assert_eq!(last_lines(text, 10, false), vec!["a", "b", "c", "d"]);
        assert_eq!(last_lines(text, 10, true), vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn tails_existing_logs_only() {
        let log: String = (1..=15).map(|i| format!("ERROR line {i}\n")).collect();
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new().file("/bot/error.log", log));
        let (tails, errors) = collect_recent_errors(&fs, &cfg()).await;
        assert_eq!(errors, 0);
        assert_eq!(tails.len(), 1);
        let lines = &tails["error.log"];
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "ERROR line 6");
        assert_eq!(lines[9], "ERROR line 15");
    }

    #[tokio::test]
    async fn truncated_read_drops_partial_line() {
        let mut cfg = cfg();
        cfg.recent_logs.max_read_bytes = 10;
        let fs: Arc<dyn FileSystem> =
            Arc::new(MemoryFs::new().file("/bot/bot.log", "first line\nabc\nxyz\n"));
        let (tails, _) = collect_recent_errors(&fs, &cfg).await;
        assert_eq!(tails["bot.log"], vec!["abc", "xyz"]);
    }

    #[tokio::test]
    async fn window_on_line_boundary_keeps_first_line() {
        let mut cfg = cfg();
        cfg.recent_logs.max_read_bytes = 8;
        let fs: Arc<dyn FileSystem> =
            Arc::new(MemoryFs::new().file("/bot/bot.log", "first\nabc\nxyz\n"));
        let (tails, _) = collect_recent_errors(&fs, &cfg).await;
        assert_eq!(tails["bot.log"], vec!["abc", "xyz"]);
    }

    #[tokio::test]
    async fn unreadable_log_counts_error() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new().unreadable("/bot/bot.log"));
        let (tails, errors) = collect_recent_errors(&fs, &cfg()).await;
        assert!(tails.is_empty());
        assert_eq!(errors, 1);
    }
}
