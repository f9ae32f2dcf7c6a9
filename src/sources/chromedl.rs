//! Timed download of a large file via `curl`

use super::{invoke, CommandRunner, SpeedTest};
use crate::logging::SourceLogger;
use crate::models::{Sample, SourceKind};
use async_trait::async_trait;

const PROGRAM: &str = "curl";

pub struct ChromeDownloadTest {
    program: String,
    url: String,
}

impl ChromeDownloadTest {
    pub fn new(url: &str) -> Self {
        Self {
            program: PROGRAM.to_string(),
            url: url.to_string(),
        }
    }

    fn args(&self) -> Vec<String> {
        vec![
            self.url.clone(),
            "-o".to_string(),
            "/dev/null".to_string(),
            "-s".to_string(),
            "-w".to_string(),
            "%{speed_download}".to_string(),
        ]
    }
}

#[async_trait]
impl SpeedTest for ChromeDownloadTest {
    fn name(&self) -> &str {
        &self.program
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Chromedl
    }

    async fn run(&self, runner: &dyn CommandRunner, log: &SourceLogger) -> Option<Sample> {
        let output = invoke(runner, log, self.kind(), &self.program, &self.args(), 1).await?;

        if !output.success() {
            log.log_no_data(self.kind(), &format!("exit code {:?}", output.status_code)).await;
            return None;
        }

        match parse_speed(&output.stdout) {
            Some(mbps) => {
                let sample = Sample::download_only(mbps);
                log.log_sample(self.kind(), &sample, output.elapsed.as_secs_f64() * 1000.0).await;
                Some(sample)
            }
            None => {
                log.log_no_data(self.kind(), "speed_download is not a number").await;
                None
            }
        }
    }
}

/// Convert curl's bytes per second into Mbps (binary mega)
pub fn parse_speed(stdout: &str) -> Option<f64> {
    let bytes_per_sec: f64 = stdout.trim().replace(',', ".").parse().ok()?;
    if !bytes_per_sec.is_finite() {
        return None;
    }
    Some(bytes_per_sec * 8.0 / 1024.0 / 1024.0)
}
