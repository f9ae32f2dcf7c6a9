//! M-Lab NDT7 via `ndt7-client -quiet -format=json`

use super::{invoke, CommandRunner, SpeedTest};
use crate::logging::SourceLogger;
use crate::models::{Sample, SourceKind};
use async_trait::async_trait;
use serde::Deserialize;

const PROGRAM: &str = "ndt7-client";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NdtSummary {
    download: Option<NdtValue>,
    upload: Option<NdtValue>,
    #[serde(rename = "MinRTT")]
    min_rtt: Option<NdtValue>,
    download_retrans: Option<NdtValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NdtValue {
    value: Option<f64>,
}

fn value_of(field: Option<NdtValue>) -> Option<f64> {
    field.and_then(|v| v.value)
}

pub struct MlabTest {
    program: String,
}

impl MlabTest {
    pub fn new() -> Self {
        Self {
            program: PROGRAM.to_string(),
        }
    }
}

impl Default for MlabTest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeedTest for MlabTest {
    fn name(&self) -> &str {
        &self.program
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mlab
    }

    async fn run(&self, runner: &dyn CommandRunner, log: &SourceLogger) -> Option<Sample> {
        let args = vec!["-quiet".to_string(), "-format=json".to_string()];
        let output = invoke(runner, log, self.kind(), &self.program, &args, 1).await?;

        if !output.success() {
            log.log_no_data(self.kind(), &format!("exit code {:?}", output.status_code)).await;
            return None;
        }

        match parse_summary(&output.stdout) {
            Some(sample) => {
                log.log_sample(self.kind(), &sample, output.elapsed.as_secs_f64() * 1000.0).await;
                Some(sample)
            }
            None => {
                log.log_no_data(self.kind(), "summary JSON lacks download or upload").await;
                None
            }
        }
    }
}

/// Parse the JSON summary; download and upload are required
pub fn parse_summary(stdout: &str) -> Option<Sample> {
    let summary: NdtSummary = serde_json::from_str(stdout.trim()).ok()?;

    let download = value_of(summary.download)?;
    let upload = value_of(summary.upload)?;

    Some(
        Sample::new(download, upload, value_of(summary.min_rtt))
            .with_retransmission(value_of(summary.download_retrans)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{quiet_log, ScriptedRunner};

    const SUMMARY: &str = r#"{
        "ServerFQDN": "ndt-mlab1-ord06.mlab-oti.measurement-lab.org",
        "Download": {"UUID": "x", "Value": 212.4, "Unit": "Mbit/s"},
        "Upload": {"UUID": "y", "Value": 22.7, "Unit": "Mbit/s"},
        "DownloadRetrans": {"Value": 0.3, "Unit": "%"},
        "MinRTT": {"Value": 12, "Unit": "ms"}
    }"#;

    #[test]
    fn test_parse_summary_keeps_retransmission() {
        let sample = parse_summary(SUMMARY).unwrap();
        assert_eq!(sample.download, Some(212.4));
        assert_eq!(sample.upload, Some(22.7));
        assert_eq!(sample.ping, Some(12.0));
        assert_eq!(sample.retransmission, Some(0.3));
    }

    #[test]
    fn test_optional_fields() {
        let sample = parse_summary(r#"{"Download": {"Value": 10}, "Upload": {"Value": 2}}"#).unwrap();
        assert_eq!(sample.ping, None);
        assert_eq!(sample.retransmission, None);
    }

    #[test]
    fn test_missing_upload_or_bad_json_is_no_data() {
        assert!(parse_summary(r#"{"Download": {"Value": 10}}"#).is_none());
        assert!(parse_summary(r#"{"Download": {"Value": 10}, "Upload": {}}"#).is_none());
        assert!(parse_summary("not json").is_none());
    }

    #[tokio::test]
    async fn test_run_uses_json_format() {
        let runner = ScriptedRunner::new().then_output(0, SUMMARY);
        let sample = MlabTest::new().run(&runner, &quiet_log()).await;

        assert!(sample.is_some());
        assert_eq!(runner.calls()[0].1, vec!["-quiet".to_string(), "-format=json".to_string()]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_no_data() {
        let runner = ScriptedRunner::new().then_output(2, SUMMARY);
        assert!(MlabTest::new().run(&runner, &quiet_log()).await.is_none());
    }
}
