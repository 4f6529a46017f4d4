use crate::collectors::fs::FileSystem;
use crate::collectors::{run_blocking, ProbeError};
use crate::config::{Config, PathKind, RequiredPathConfig};
use crate::report::CheckResult;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

pub async fn collect_required(fs: &Arc<dyn FileSystem>, cfg: &Config) -> (Vec<CheckResult>, u64) {
    let limit = Duration::from_millis(cfg.inventory.read_timeout_ms);
    let mut results = Vec::with_capacity(cfg.required.len());
    let mut errors = 0_u64;
    for entry in &cfg.required {
        let (result, had_error) = run_required_check(fs, cfg, entry, limit).await;
        if had_error {
            errors += 1;
        }
        results.push(result);
    }
    (results, errors)
}

async fn run_required_check(
    fs: &Arc<dyn FileSystem>,
    cfg: &Config,
    entry: &RequiredPathConfig,
    limit: Duration,
) -> (CheckResult, bool) {
    let start = Instant::now();
    let path = cfg.resolve(&entry.path);

    let found = {
        let fs = Arc::clone(fs);
        run_blocking(limit, move || fs.kind_of(&path).map_err(ProbeError::from)).await
    };

    let (passed, detail, had_error) = match found {
        Ok(Some(kind)) if kind == entry.kind => (true, None, false),
        Ok(Some(kind)) => (
            false,
            Some(format!(
                "expected {}, found {}",
                kind_label(entry.kind),
                kind_label(kind)
            )),
            false,
        ),
        Ok(None) if entry.critical => (
            false,
            Some(format!("Critical file missing: {}", entry.check_name())),
            false,
        ),
        Ok(None) => (
            false,
            Some(format!("missing {}", kind_label(entry.kind))),
            false,
        ),
        Err(err) => {
            warn!(check = %entry.check_name(), error = %err, "required path check failed");
            (false, Some(err.to_string()), true)
        }
    };

    (
        CheckResult {
            name: entry.check_name().to_string(),
            passed,
            critical: entry.critical,
            detail,
            latency_ms: start.elapsed().as_millis() as u64,
        },
        had_error,
    )
}

fn kind_label(kind: PathKind) -> &'static str {
    match kind {
        PathKind::File => "file",
        PathKind::Directory => "directory",
    }
}
