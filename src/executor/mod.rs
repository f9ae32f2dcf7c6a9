//! Sequential execution of the speed tests

use crate::{
    logging::SourceLogger,
    models::{Config, MeasurementRecord, Sample, SourceKind, SourceResults},
    sources::{default_sources, CommandRunner, SpeedTest},
    stats,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happened to one source during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceStatus {
    Measured(Sample),
    /// The tool ran but produced nothing usable
    NoData,
    /// Not run because of a throttle rule
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: SourceKind,
    pub status: SourceStatus,
    pub elapsed: Duration,
}

/// Results of running every source once
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Sources that produced data
    pub results: SourceResults,
    /// One entry per source, in run order
    pub outcomes: Vec<SourceOutcome>,
    pub total_duration: Duration,
}

impl ExecutionReport {
    pub fn has_data(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn measured_count(&self) -> usize {
        self.results.len()
    }
}

/// Runs speedtest, fast.com, M-Lab and the timed download one after another
pub struct SpeedTestExecutor {
    sources: Vec<Box<dyn SpeedTest>>,
    runner: Arc<dyn CommandRunner>,
    log: SourceLogger,
    mlab_interval: Duration,
}

impl SpeedTestExecutor {
    /// Executor over the standard sources
    pub fn new(config: &Config, runner: Arc<dyn CommandRunner>, log: SourceLogger) -> Self {
        Self::with_sources(default_sources(config), config.mlab_interval(), runner, log)
    }

    pub fn with_sources(
        sources: Vec<Box<dyn SpeedTest>>,
        mlab_interval: Duration,
        runner: Arc<dyn CommandRunner>,
        log: SourceLogger,
    ) -> Self {
        Self {
            sources,
            runner,
            log,
            mlab_interval,
        }
    }

    /// Run every source in order. `records` is the whole log; the M-Lab
    /// throttle applies its own interval to it.
    pub async fn run_all(&self, records: &[MeasurementRecord], now: f64) -> ExecutionReport {
        let started = Instant::now();
        let mut report = ExecutionReport::default();

        for source in &self.sources {
            let kind = source.kind();
            let source_started = Instant::now();

            if kind == SourceKind::Mlab && !stats::should_run_mlab(records, now, self.mlab_interval) {
                let reason = format!("already measured within {}s", self.mlab_interval.as_secs());
                self.log.log_skipped(kind, &reason).await;
                report.outcomes.push(SourceOutcome {
                    source: kind,
                    status: SourceStatus::Skipped(reason),
                    elapsed: Duration::ZERO,
                });
                continue;
            }

            let status = match source.run(self.runner.as_ref(), &self.log).await {
                Some(sample) => {
                    report.results.insert(kind, sample);
                    SourceStatus::Measured(sample)
                }
                None => SourceStatus::NoData,
            };

            report.outcomes.push(SourceOutcome {
                source: kind,
                status,
                elapsed: source_started.elapsed(),
            });
        }

        report.total_duration = started.elapsed();
        report
    }
}
