use crate::collectors::ProbeError;
use crate::report::SystemSnapshot;
#[cfg(target_os = "linux")]
use std::fs;
use sysinfo::{ProcessExt, System, SystemExt};
use tracing::debug;

pub trait SystemProbe: Send + Sync + 'static {
    fn sample(&self) -> Result<SystemSnapshot, ProbeError>;
}

/// Point samples from `sysinfo`. A fresh `System` is built per call so
/// concurrent requests never share refresh state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoProbe;

impl SystemProbe for SysinfoProbe {
    fn sample(&self) -> Result<SystemSnapshot, ProbeError> {
        let pid = sysinfo::get_current_pid().map_err(|e| ProbeError::Unavailable(e.to_string()))?;
        let mut system = System::new();
        system.refresh_memory();
        if !system.refresh_process(pid) {
            return Err(ProbeError::Unavailable(format!(
                "process {pid} not found in process table"
            )));
        }

        let memory_bytes = system.process(pid).map(|p| p.memory()).unwrap_or(0);
        let peak_memory_bytes = read_peak_rss().unwrap_or(memory_bytes).max(memory_bytes);
        let load = system.load_average();

        Ok(SystemSnapshot {
            memory_bytes,
            peak_memory_bytes,
            load_1m: round2(load.one),
            load_5m: round2(load.five),
            load_15m: round2(load.fifteen),
            host_name: system.host_name(),
            uptime_seconds: system.uptime(),
            total_memory_bytes: system.total_memory(),
            used_memory_bytes: system.used_memory(),
        })
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(target_os = "linux")]
fn read_peak_rss() -> Option<u64> {
    match fs::read_to_string("/proc/self/status") {
        Ok(text) => parse_vm_hwm(&text),
        Err(err) => {
            debug!(error = %err, "cannot read /proc/self/status");
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn read_peak_rss() -> Option<u64> {
    debug!("peak RSS not available on this platform, using current RSS");
    None
}

/// `VmHWM:     1234 kB` -> bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_hwm(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmHWM:"))?;
    let mut parts = line["VmHWM:".len()..].split_whitespace();
    let value: u64 = parts.next()?.parse().ok()?;
    match parts.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}
