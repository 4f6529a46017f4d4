//! Liveness of the external bot process.
//!
//! Matching is a plain substring test against each process command line. It
//! reports false positives for any process whose arguments contain the pattern
//! and misses a bot started under a different name; both are accepted.

use crate::collectors::ProbeError;
use crate::config::{ProcessBackend, ProcessConfig, PROCESS_CHECK_NAME};
use crate::report::{CheckResult, Liveness};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{ProcessExt, System, SystemExt};
use tokio::process::Command;
use tokio::{task, time};
use tracing::warn;

#[async_trait]
pub trait ProcessLister: Send + Sync {
    /// Whether any process other than this one has `pattern` in its command line.
    async fn is_running(&self, pattern: &str) -> Result<bool, ProbeError>;
}

pub fn lister_for(backend: ProcessBackend) -> Arc<dyn ProcessLister> {
    match backend {
        ProcessBackend::Ps => Arc::new(PsProcessLister::default()),
        ProcessBackend::Sysinfo => Arc::new(SysinfoProcessLister),
    }
}

/// Lists processes with `ps aux`.
#[derive(Debug, Clone)]
pub struct PsProcessLister {
    program: String,
    args: Vec<String>,
}

impl Default for PsProcessLister {
    fn default() -> Self {
        Self {
            program: "ps".to_string(),
            args: vec!["aux".to_string()],
        }
    }
}

impl PsProcessLister {
    #[cfg(test)]
    fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ProcessLister for PsProcessLister {
    async fn is_running(&self, pattern: &str) -> Result<bool, ProbeError> {
        // dropping this future (timeout, client gone) kills the child
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(ps_output_matches(&stdout, pattern, std::process::id()))
    }
}

/// Scans `ps aux` output, skipping the header and the line for `own_pid`.
fn ps_output_matches(stdout: &str, pattern: &str, own_pid: u32) -> bool {
    stdout
        .lines()
        .skip(1)
        .filter(|line| {
            line.split_whitespace()
                .nth(1)
                .and_then(|pid| pid.parse::<u32>().ok())
                != Some(own_pid)
        })
        .any(|line| line.contains(pattern))
}

/// Walks the process table through `sysinfo`, without spawning anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoProcessLister;

#[async_trait]
impl ProcessLister for SysinfoProcessLister {
    async fn is_running(&self, pattern: &str) -> Result<bool, ProbeError> {
        let pattern = pattern.to_string();
        task::spawn_blocking(move || {
            let mut system = System::new();
            system.refresh_processes();
            let own = sysinfo::get_current_pid().ok();
            system
                .processes()
                .iter()
                .filter(|(pid, _)| Some(**pid) != own)
                .any(|(_, p)| command_line(p).contains(&pattern))
        })
        .await
        .map_err(|err| ProbeError::Join(err.to_string()))
    }
}

fn command_line(process: &sysinfo::Process) -> String {
    if process.cmd().is_empty() {
        process.name().to_string()
    } else {
        process.cmd().join(" ")
    }
}

pub async fn check_liveness(
    lister: &dyn ProcessLister,
    cfg: &ProcessConfig,
) -> (CheckResult, Liveness, bool) {
    let start = Instant::now();
    let limit = Duration::from_millis(cfg.timeout_ms);

    let (liveness, detail, had_error) =
        match time::timeout(limit, lister.is_running(&cfg.pattern)).await {
            Ok(Ok(true)) => (Liveness::Running, None, false),
            Ok(Ok(false)) => (
                Liveness::Stopped,
                Some("Bot process is not running".to_string()),
                false,
            ),
            Ok(Err(err)) => {
                warn!(pattern = %cfg.pattern, error = %err, "process list query failed");
                (
                    Liveness::Unknown,
                    Some(format!("Bot process state unknown: {err}")),
                    true,
                )
            }
            Err(_elapsed) => {
                warn!(pattern = %cfg.pattern, timeout_ms = cfg.timeout_ms, "process list query timeout");
                (
                    Liveness::Unknown,
                    Some(format!(
                        "Bot process state unknown: {}",
                        ProbeError::Timeout(limit)
                    )),
                    true,
                )
            }
        };

    (
        CheckResult {
            name: PROCESS_CHECK_NAME.to_string(),
            passed: liveness == Liveness::Running,
            critical: cfg.critical,
            detail,
            latency_ms: start.elapsed().as_millis() as u64,
        },
        liveness,
        had_error,
    )
}
