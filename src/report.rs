use crate::config::PROCESS_CHECK_NAME;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Running,
    Stopped,
    /// The process table could not be read (error or timeout).
    Unknown,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub critical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SystemSnapshot {
    pub memory_bytes: u64,
    pub peak_memory_bytes: u64,
    pub load_1m: f64,
    pub load_5m: f64,
    pub load_15m: f64,
    pub host_name: Option<String>,
    pub uptime_seconds: u64,
    pub total_memory_bytes: u64,
    pub used_memory_bytes: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct InventoryEntry {
    pub path: String,
    pub size_bytes: u64,
    pub modified_at: Option<String>,
    pub line_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    pub service: String,
    pub version: String,
    pub bot_process: Liveness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub response_time_ms: f64,
    pub checks: Vec<CheckResult>,
    pub system: SystemSnapshot,
    #[serde(rename = "database")]
    pub inventory: Vec<InventoryEntry>,
    pub recent_errors: BTreeMap<String, Vec<String>>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    #[cfg(test)]
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Folds check results into the aggregate status. Only critical checks count.
pub fn aggregate(checks: &[CheckResult]) -> HealthStatus {
    if checks.iter().any(|c| c.critical && !c.passed) {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    }
}

/// Message for the report's `error` field. A failed critical path check wins
/// over a failed process check; among path checks the first in order wins.
pub fn first_critical_failure(checks: &[CheckResult]) -> Option<String> {
    let failed = |c: &&CheckResult| c.critical && !c.passed;
    checks
        .iter()
        .filter(failed)
        .find(|c| c.name != PROCESS_CHECK_NAME)
        .or_else(|| checks.iter().find(failed))
        .map(|c| match &c.detail {
            Some(detail) => detail.clone(),
            None => format!("critical check failed: {}", c.name),
        })
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BotInfo {
    pub username: String,
    pub name: String,
    pub admin_id: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub timestamp: String,
    pub service: String,
    pub version: String,
    pub bot: BotInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, passed: bool, critical: bool) -> CheckResult {
        CheckResult {
            name: name.to_string(),
            passed,
            critical,
            detail: None,
            latency_ms: 0,
        }
    }

    #[test]
    fn critical_failure_makes_unhealthy() {
        let checks = vec![
            check("bot_process", true, true),
            check("fileA", true, true),
            check("fileB", false, true),
            check("keys.json", true, false),
        ];
        assert_eq!(aggregate(&checks), HealthStatus::Unhealthy);
    }

    #[test]
    fn non_critical_failures_stay_healthy() {
        let checks = vec![
            check("bot_process", true, true),
            check("keys.json", false, false),
            check("temp", false, false),
        ];
        assert_eq!(aggregate(&checks), HealthStatus::Healthy);
        assert!(first_critical_failure(&checks).is_none());
    }

    #[test]
    fn empty_check_list_is_healthy() {
        assert_eq!(aggregate(&[]), HealthStatus::Healthy);
    }

    #[test]
    fn missing_file_message_wins_over_stopped_process() {
        let mut process = check("bot_process", false, true);
        process.detail = Some("Bot process is not running".to_string());
        let mut docker = check("Dockerfile", false, true);
        docker.detail = Some("Critical file missing: Dockerfile".to_string());
        let checks = vec![process.clone(), docker, check("bot.py", false, true)];
        assert_eq!(
            first_critical_failure(&checks).as_deref(),
            Some("Critical file missing: Dockerfile")
        );

        let checks = vec![process, check("keys.json", false, false)];
        assert_eq!(
            first_critical_failure(&checks).as_deref(),
            Some("Bot process is not running")
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Unhealthy).unwrap();
        assert_eq!(json, "\"unhealthy\"");
        let json = serde_json::to_string(&Liveness::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
    }
}
