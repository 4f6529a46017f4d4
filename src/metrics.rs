use crate::aggregator::Computed;
use crate::report::{HealthStatus, Liveness};
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at_unix: i64,
    pub botwatch_health_status: Gauge,
    pub botwatch_check_passed: GaugeVec,
    pub botwatch_checks_total: Gauge,
    pub botwatch_checks_failed: Gauge,
    pub botwatch_critical_checks_failed: Gauge,
    pub botwatch_bot_process_running: Gauge,
    pub botwatch_process_memory_bytes: Gauge,
    pub botwatch_process_peak_memory_bytes: Gauge,
    pub botwatch_load_average: GaugeVec,
    pub botwatch_inventory_files: Gauge,
    pub botwatch_inventory_bytes: Gauge,
    pub botwatch_inventory_lines: Gauge,
    pub botwatch_report_duration_ms: Gauge,
    pub botwatch_last_report_timestamp_seconds: Gauge,
    pub botwatch_uptime_seconds: Gauge,
    pub botwatch_reports_total: CounterVec,
    pub botwatch_scrape_count_total: Counter,
    pub botwatch_collect_errors_total: CounterVec,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let botwatch_health_status = Gauge::with_opts(opts!(
            "botwatch_health_status",
            "1 when the last report was healthy, 0 when unhealthy"
        ))?;
        let botwatch_check_passed = GaugeVec::new(
            opts!(
                "botwatch_check_passed",
                "1 when the check passed in the last report"
            ),
            &["check", "critical"],
        )?;
        let botwatch_checks_total =
            Gauge::with_opts(opts!("botwatch_checks_total", "Number of checks in the last report"))?;
        let botwatch_checks_failed = Gauge::with_opts(opts!(
            "botwatch_checks_failed",
            "Number of failed checks in the last report"
        ))?;
        let botwatch_critical_checks_failed = Gauge::with_opts(opts!(
            "botwatch_critical_checks_failed",
            "Number of failed critical checks in the last report"
        ))?;
        let botwatch_bot_process_running = Gauge::with_opts(opts!(
            "botwatch_bot_process_running",
            "1 running, 0 stopped, -1 unknown"
        ))?;
        let botwatch_process_memory_bytes = Gauge::with_opts(opts!(
            "botwatch_process_memory_bytes",
            "Resident memory of the botwatch process in bytes"
        ))?;
        let botwatch_process_peak_memory_bytes = Gauge::with_opts(opts!(
            "botwatch_process_peak_memory_bytes",
            "Peak resident memory of the botwatch process in bytes"
        ))?;
        let botwatch_load_average = GaugeVec::new(
            opts!("botwatch_load_average", "OS load average by window"),
            &["window"],
        )?;
        let botwatch_inventory_files = Gauge::with_opts(opts!(
            "botwatch_inventory_files",
            "Number of files found by the inventory scan"
        ))?;
        let botwatch_inventory_bytes = Gauge::with_opts(opts!(
            "botwatch_inventory_bytes",
            "Total size of inventory files in bytes"
        ))?;
        let botwatch_inventory_lines = Gauge::with_opts(opts!(
            "botwatch_inventory_lines",
            "Total counted lines of inventory files"
        ))?;
        let botwatch_report_duration_ms = Gauge::with_opts(opts!(
            "botwatch_report_duration_ms",
            "Time spent computing the last report in milliseconds"
        ))?;
        let botwatch_last_report_timestamp_seconds = Gauge::with_opts(opts!(
            "botwatch_last_report_timestamp_seconds",
            "Unix timestamp of the last computed report"
        ))?;
        let botwatch_uptime_seconds =
            Gauge::with_opts(opts!("botwatch_uptime_seconds", "botwatch uptime in seconds"))?;
        let botwatch_reports_total = CounterVec::new(
            opts!("botwatch_reports_total", "Computed reports by resulting status"),
            &["status"],
        )?;
        let botwatch_scrape_count_total = Counter::with_opts(opts!(
            "botwatch_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;
        let botwatch_collect_errors_total = CounterVec::new(
            opts!(
                "botwatch_collect_errors_total",
                "Collector failures by collector"
            ),
            &["collector"],
        )?;

        register(&registry, &botwatch_health_status)?;
        register(&registry, &botwatch_check_passed)?;
        register(&registry, &botwatch_checks_total)?;
        register(&registry, &botwatch_checks_failed)?;
        register(&registry, &botwatch_critical_checks_failed)?;
        register(&registry, &botwatch_bot_process_running)?;
        register(&registry, &botwatch_process_memory_bytes)?;
        register(&registry, &botwatch_process_peak_memory_bytes)?;
        register(&registry, &botwatch_load_average)?;
        register(&registry, &botwatch_inventory_files)?;
        register(&registry, &botwatch_inventory_bytes)?;
        register(&registry, &botwatch_inventory_lines)?;
        register(&registry, &botwatch_report_duration_ms)?;
        register(&registry, &botwatch_last_report_timestamp_seconds)?;
        register(&registry, &botwatch_uptime_seconds)?;
        register(&registry, &botwatch_reports_total)?;
        register(&registry, &botwatch_scrape_count_total)?;
        register(&registry, &botwatch_collect_errors_total)?;

        Ok(Arc::new(Self {
            registry,
            started_at_unix: now_unix(),
            botwatch_health_status,
            botwatch_check_passed,
            botwatch_checks_total,
            botwatch_checks_failed,
            botwatch_critical_checks_failed,
            botwatch_bot_process_running,
            botwatch_process_memory_bytes,
            botwatch_process_peak_memory_bytes,
            botwatch_load_average,
            botwatch_inventory_files,
            botwatch_inventory_bytes,
            botwatch_inventory_lines,
            botwatch_report_duration_ms,
            botwatch_last_report_timestamp_seconds,
            botwatch_uptime_seconds,
            botwatch_reports_total,
            botwatch_scrape_count_total,
            botwatch_collect_errors_total,
        }))
    }

    pub fn observe(&self, computed: &Computed) {
        let report = &computed.report;
        let healthy = report.status == HealthStatus::Healthy;
        self.botwatch_health_status.set(if healthy { 1.0 } else { 0.0 });
        self.botwatch_reports_total
            .with_label_values(&[if healthy { "healthy" } else { "unhealthy" }])
            .inc();

        self.botwatch_check_passed.reset();
        for c in &report.checks {
            self.botwatch_check_passed
                .with_label_values(&[c.name.as_str(), if c.critical { "true" } else { "false" }])
                .set(if c.passed { 1.0 } else { 0.0 });
        }
        let failed = report.checks.iter().filter(|c| !c.passed).count();
        let critical_failed = report
            .checks
            .iter()
            .filter(|c| c.critical && !c.passed)
            .count();
        self.botwatch_checks_total.set(report.checks.len() as f64);
        self.botwatch_checks_failed.set(failed as f64);
        self.botwatch_critical_checks_failed
            .set(critical_failed as f64);

        self.botwatch_bot_process_running
            .set(match report.bot_process {
                Liveness::Running => 1.0,
                Liveness::Stopped => 0.0,
                Liveness::Unknown => -1.0,
            });

        let sys = &report.system;
        self.botwatch_process_memory_bytes
            .set(sys.memory_bytes as f64);
        self.botwatch_process_peak_memory_bytes
            .set(sys.peak_memory_bytes as f64);
        self.botwatch_load_average
            .with_label_values(&["1m"])
            .set(sys.load_1m);
        self.botwatch_load_average
            .with_label_values(&["5m"])
            .set(sys.load_5m);
        self.botwatch_load_average
            .with_label_values(&["15m"])
            .set(sys.load_15m);

        self.botwatch_inventory_files
            .set(report.inventory.len() as f64);
        self.botwatch_inventory_bytes
            .set(report.inventory.iter().map(|e| e.size_bytes).sum::<u64>() as f64);
        self.botwatch_inventory_lines.set(
            report
                .inventory
                .iter()
                .filter_map(|e| e.line_count)
                .sum::<u64>() as f64,
        );

        for (collector, count) in computed.errors.by_collector() {
            if count > 0 {
                self.botwatch_collect_errors_total
                    .with_label_values(&[collector])
                    .inc_by(count as f64);
            }
        }

        self.botwatch_report_duration_ms.set(report.response_time_ms);
        let now = now_unix();
        self.botwatch_last_report_timestamp_seconds.set(now as f64);
        self.botwatch_uptime_seconds
            .set(now.saturating_sub(self.started_at_unix) as f64);
    }

    pub fn inc_scrape_count(&self) {
        self.botwatch_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
