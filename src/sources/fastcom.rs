//! Netflix fast.com via `fast-cli -s`

use super::{invoke, CommandRunner, SpeedTest};
use crate::logging::SourceLogger;
use crate::models::{Sample, SourceKind};
use async_trait::async_trait;

const PROGRAM: &str = "fast-cli";

/// Printed by `fast-cli` when the measurement did not converge
const FAILED_SENTINEL: &str = "NaN bps";

pub struct FastComTest {
    program: String,
    max_attempts: u32,
}

impl FastComTest {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            program: PROGRAM.to_string(),
            max_attempts: max_attempts.max(1),
        }
    }
}

#[async_trait]
impl SpeedTest for FastComTest {
    fn name(&self) -> &str {
        &self.program
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Fastcom
    }

    async fn run(&self, runner: &dyn CommandRunner, log: &SourceLogger) -> Option<Sample> {
        let args = vec!["-s".to_string()];

        for attempt in 1..=self.max_attempts {
            let Some(output) = invoke(runner, log, self.kind(), &self.program, &args, attempt).await else {
                log.log_retry(self.kind(), attempt, self.max_attempts, "tool failed to run").await;
                continue;
            };

            if !output.success() {
                let reason = format!("exit code {:?}", output.status_code);
                log.log_retry(self.kind(), attempt, self.max_attempts, &reason).await;
                continue;
            }

            if output.stdout.contains(FAILED_SENTINEL) {
                log.log_retry(self.kind(), attempt, self.max_attempts, FAILED_SENTINEL).await;
                continue;
            }

            // A clean exit with unreadable output is not worth retrying
            return match parse_download(&output.stdout) {
                Some(download) => {
                    let sample = Sample::download_only(download);
                    log.log_sample(self.kind(), &sample, output.elapsed.as_secs_f64() * 1000.0).await;
                    Some(sample)
                }
                None => {
                    log.log_no_data(self.kind(), "first output token is not a number").await;
                    None
                }
            };
        }

        log.log_no_data(self.kind(), &format!("no result after {} attempts", self.max_attempts)).await;
        None
    }
}

/// First whitespace-separated token as Mbps, e.g. `93 Mbps`
pub fn parse_download(stdout: &str) -> Option<f64> {
    stdout
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
