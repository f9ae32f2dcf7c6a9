//! Ookla speedtest.net via `speedtest-cli --simple`

use super::{invoke, CommandRunner, SpeedTest};
use crate::logging::SourceLogger;
use crate::models::{Sample, SourceKind};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

const PROGRAM: &str = "speedtest-cli";

/// `Label: value unit`, e.g. `Download: 95.20 Mbit/s`
fn line_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(Ping|Download|Upload):\s*([0-9]+(?:\.[0-9]+)?)\s*(\S*)").ok())
        .as_ref()
}

pub struct OoklaTest {
    program: String,
}

impl OoklaTest {
    pub fn new() -> Self {
        Self {
            program: PROGRAM.to_string(),
        }
    }
}

impl Default for OoklaTest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeedTest for OoklaTest {
    fn name(&self) -> &str {
        &self.program
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Speedtest
    }

    async fn run(&self, runner: &dyn CommandRunner, log: &SourceLogger) -> Option<Sample> {
        let args = vec!["--simple".to_string()];
        let output = invoke(runner, log, self.kind(), &self.program, &args, 1).await?;

        if !output.success() {
            log.log_no_data(self.kind(), &format!("exit code {:?}", output.status_code)).await;
            return None;
        }

        match parse_simple_output(&output.stdout) {
            Some(sample) => {
                log.log_sample(self.kind(), &sample, output.elapsed.as_secs_f64() * 1000.0).await;
                Some(sample)
            }
            None => {
                log.log_no_data(self.kind(), "download or upload missing from output").await;
                None
            }
        }
    }
}

/// Parse `--simple` output. Download and Upload are required, Ping is not.
pub fn parse_simple_output(stdout: &str) -> Option<Sample> {
    let pattern = line_pattern()?;
    let mut ping = None;
    let mut download = None;
    let mut upload = None;

    for line in stdout.lines() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let Ok(value) = caps[2].parse::<f64>() else {
            continue;
        };

        match &caps[1] {
            "Ping" => ping = Some(value),
            "Download" => download = Some(to_mbps(value, &caps[3])),
            "Upload" => upload = Some(to_mbps(value, &caps[3])),
            _ => {}
        }
    }

    Some(Sample::new(download?, upload?, ping))
}

fn to_mbps(value: f64, unit: &str) -> f64 {
    match unit {
        "Gbit/s" => value * 1000.0,
        "Kbit/s" => value / 1000.0,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{quiet_log, ScriptedRunner};

    const SIMPLE_OUTPUT: &str = "Ping: 14.123 ms\nDownload: 95.20 Mbit/s\nUpload: 11.41 Mbit/s\n";

    #[test]
    fn test_parse_simple_output() {
        let sample = parse_simple_output(SIMPLE_OUTPUT).unwrap();
        assert_eq!(sample.download, Some(95.20));
        assert_eq!(sample.upload, Some(11.41));
        assert_eq!(sample.ping, Some(14.123));
        assert_eq!(sample.retransmission, None);
    }

    #[test]
    fn test_ping_is_optional() {
        let sample = parse_simple_output("Download: 50.0 Mbit/s\nUpload: 5.0 Mbit/s").unwrap();
        assert_eq!(sample.ping, None);
        assert_eq!(sample.download, Some(50.0));
    }

    #[test]
    fn test_missing_upload_is_no_data() {
        assert!(parse_simple_output("Ping: 10 ms\nDownload: 50.0 Mbit/s\n").is_none());
        assert!(parse_simple_output("").is_none());
    }

    #[test]
    fn test_garbage_lines_are_ignored() {
        let output = "Retrieving speedtest.net configuration...\nDownload: fast\n\
                      Download: 80 Mbit/s\nUpload: 8 Mbit/s\n";
        let sample = parse_simple_output(output).unwrap();
        assert_eq!(sample.download, Some(80.0));
    }

    #[test]
    fn test_unit_scaling() {
        let sample = parse_simple_output("Download: 1.2 Gbit/s\nUpload: 500 Kbit/s").unwrap();
        assert_eq!(sample.download, Some(1200.0));
        assert_eq!(sample.upload, Some(0.5));
    }

    #[tokio::test]
    async fn test_run_passes_simple_flag() {
        let runner = ScriptedRunner::new().then_output(0, SIMPLE_OUTPUT);
        let sample = OoklaTest::new().run(&runner, &quiet_log()).await;

        assert!(sample.is_some());
        assert_eq!(
            runner.calls(),
            vec![("speedtest-cli".to_string(), vec!["--simple".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_no_data() {
        let runner = ScriptedRunner::new().then_output(1, SIMPLE_OUTPUT);
        assert!(OoklaTest::new().run(&runner, &quiet_log()).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_exit_without_tokens_is_no_data() {
        let runner = ScriptedRunner::new().then_output(0, "Cannot retrieve speedtest configuration\n");
        assert!(OoklaTest::new().run(&runner, &quiet_log()).await.is_none());
    }
}
