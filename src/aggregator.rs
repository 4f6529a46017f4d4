use crate::collectors::checks::collect_required;
use crate::collectors::fs::{FileSystem, OsFileSystem};
use crate::collectors::inventory::collect_inventory;
use crate::collectors::logs::collect_recent_errors;
use crate::collectors::process::{check_liveness, lister_for, ProcessLister};
use crate::collectors::run_blocking;
use crate::collectors::system::{SysinfoProbe, SystemProbe};
use crate::config::Config;
use crate::report::{
    aggregate, first_critical_failure, BotInfo, CheckResult, HealthReport, Liveness,
    ServiceStatus, SystemSnapshot,
};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

const SYSTEM_SAMPLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Collector failures seen while building one report, by collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectErrors {
    pub process: u64,
    pub files: u64,
    pub system: u64,
    pub inventory: u64,
    pub logs: u64,
}

impl CollectErrors {
    pub fn by_collector(&self) -> [(&'static str, u64); 5] {
        [
            ("process", self.process),
            ("files", self.files),
            ("system", self.system),
            ("inventory", self.inventory),
            ("logs", self.logs),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Computed {
    pub report: HealthReport,
    pub errors: CollectErrors,
}

/// Builds a fresh `HealthReport` per call. Holds only configuration and
/// collaborators; nothing is cached between calls.
#[derive(Clone)]
pub struct HealthAggregator {
    cfg: Arc<Config>,
    processes: Arc<dyn ProcessLister>,
    fs: Arc<dyn FileSystem>,
    system: Arc<dyn SystemProbe>,
}

impl HealthAggregator {
    pub fn new(
        cfg: Arc<Config>,
        processes: Arc<dyn ProcessLister>,
        fs: Arc<dyn FileSystem>,
        system: Arc<dyn SystemProbe>,
    ) -> Self {
        Self {
            cfg,
            processes,
            fs,
            system,
        }
    }

    pub fn from_config(cfg: Arc<Config>) -> Self {
        let processes = lister_for(cfg.process.backend);
        Self::new(cfg, processes, Arc::new(OsFileSystem), Arc::new(SysinfoProbe))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub async fn compute_report(&self) -> HealthReport {
        self.compute().await.report
    }

    pub async fn compute(&self) -> Computed {
        let start = Instant::now();
        let timestamp = now_rfc3339();

        let (liveness, required, system, inventory, recent) = tokio::join!(
            self.process_check(),
            collect_required(&self.fs, &self.cfg),
            self.sample_system(),
            collect_inventory(&self.fs, &self.cfg),
            collect_recent_errors(&self.fs, &self.cfg),
        );

        let mut errors = CollectErrors::default();
        let mut checks = Vec::with_capacity(self.cfg.required.len() + 1);

        let bot_process = match liveness {
            Some((check, liveness, had_error)) => {
                errors.process = u64::from(had_error);
                checks.push(check);
                liveness
            }
            None => Liveness::Unknown,
        };

        let (required_checks, required_errors) = required;
        errors.files = required_errors;
        checks.extend(required_checks);

        let (system, system_error) = system;
        errors.system = u64::from(system_error);
        let (inventory, inventory_errors) = inventory;
        errors.inventory = inventory_errors;
        let (recent_errors, log_errors) = recent;
        errors.logs = log_errors;

        let status = aggregate(&checks);
        let error = first_critical_failure(&checks);
        let report = HealthReport {
            status,
            timestamp,
            service: self.cfg.service.name.clone(),
            version: self.cfg.service.version.clone(),
            bot_process,
            error,
            response_time_ms: round2(start.elapsed().as_secs_f64() * 1000.0),
            checks,
            system,
            inventory,
            recent_errors,
        };

        debug!(
            status = ?report.status,
            checks = report.checks.len(),
            failed = report.checks.iter().filter(|c| !c.passed).count(),
            inventory = report.inventory.len(),
            response_time_ms = report.response_time_ms,
            "health report computed"
        );

        Computed { report, errors }
    }

    /// Static identity, not derived from any check.
    pub fn service_status(&self) -> ServiceStatus {
        let svc = &self.cfg.service;
        ServiceStatus {
            status: "online",
            timestamp: now_rfc3339(),
            service: svc.name.clone(),
            version: svc.version.clone(),
            bot: BotInfo {
                username: svc.bot.username.clone(),
                name: svc.bot.name.clone(),
                admin_id: svc.bot.admin_id,
            },
        }
    }

    async fn process_check(&self) -> Option<(CheckResult, Liveness, bool)> {
        if !self.cfg.process.enabled {
            return None;
        }
        Some(check_liveness(self.processes.as_ref(), &self.cfg.process).await)
    }

    async fn sample_system(&self) -> (SystemSnapshot, bool) {
        let probe = Arc::clone(&self.system);
        match run_blocking(SYSTEM_SAMPLE_TIMEOUT, move || probe.sample()).await {
            Ok(snapshot) => (snapshot, false),
            Err(err) => {
                warn!(error = %err, "system sample failed");
                (SystemSnapshot::default(), true)
            }
        }
    }
}

fn now_rfc3339() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::collectors::fs::fake::MemoryFs;
    use crate::collectors::process::fake::{Canned, FakeLister};
    use crate::collectors::system::fake::FixedProbe;
    use std::path::PathBuf;

    pub fn snapshot() -> SystemSnapshot {
        SystemSnapshot {
            memory_bytes: 2 * 1024 * 1024,
            peak_memory_bytes: 4 * 1024 * 1024,
            load_1m: 0.25,
            load_5m: 0.5,
            load_15m: 0.75,
            host_name: Some("render-box".to_string()),
            uptime_seconds: 3600,
            total_memory_bytes: 512 * 1024 * 1024,
            used_memory_bytes: 256 * 1024 * 1024,
        }
    }

    /// Bot working dir at `/bot` with every default required path present.
    pub fn complete_fs() -> MemoryFs {
        MemoryFs::new()
            .dir("/bot")
            .file("/bot/bot.py", "import telegram\n")
            .file("/bot/Dockerfile", "FROM python:3.11\n")
            .file("/bot/requirements.txt", "python-telegram-bot\n")
            .file("/bot/keys.json", "{}")
            .file("/bot/bot_data.pkl", vec![0x80, 0x04, 0x00])
            .dir("/bot/logs")
            .dir("/bot/Generated_Results")
            .dir("/bot/database")
            .dir("/bot/backups")
            .dir("/bot/temp")
    }

    pub fn aggregator(fs: Arc<MemoryFs>, running: Canned) -> HealthAggregator {
        let cfg = Config {
            root: PathBuf::from("/bot"),
            ..Config::default()
        };
        HealthAggregator::new(
            Arc::new(cfg),
            Arc::new(FakeLister(running)),
            fs,
            Arc::new(FixedProbe(snapshot())),
        )
    }
}
