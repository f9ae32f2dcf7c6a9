//! External speed-test tools
//!
//! Every tool is wrapped in a [`SpeedTest`] that turns its scraped output
//! into a [`Sample`]. A tool that fails to start, exits non-zero or prints
//! something unexpected yields no data; it never aborts the run.

pub mod chromedl;
pub mod fastcom;
pub mod mlab;
pub mod ookla;
pub mod process;

pub use chromedl::ChromeDownloadTest;
pub use fastcom::FastComTest;
pub use mlab::MlabTest;
pub use ookla::OoklaTest;
pub use process::{CommandOutput, CommandRunner, TokioCommandRunner};

use crate::logging::SourceLogger;
use crate::models::{Config, Sample, SourceKind};
use async_trait::async_trait;

/// One external speed test
#[async_trait]
pub trait SpeedTest: Send + Sync {
    /// Program invoked by this test
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Run the test; `None` means no data
    async fn run(&self, runner: &dyn CommandRunner, log: &SourceLogger) -> Option<Sample>;
}

/// All tests in run order
pub fn default_sources(config: &Config) -> Vec<Box<dyn SpeedTest>> {
    vec![
        Box::new(OoklaTest::new()),
        Box::new(FastComTest::new(config.fastcom_attempts)),
        Box::new(MlabTest::new()),
        Box::new(ChromeDownloadTest::new(&config.chrome_download_url)),
    ]
}

/// Invoke a tool once, logging the attempt and the raw output.
///
/// Start failures and timeouts are logged and reported as `None`.
pub(crate) async fn invoke(
    runner: &dyn CommandRunner,
    log: &SourceLogger,
    kind: SourceKind,
    program: &str,
    args: &[String],
    attempt: u32,
) -> Option<CommandOutput> {
    log.log_invocation(kind, program, attempt).await;

    match runner.run(program, args).await {
        Ok(output) => {
            log.logger()
                .debug(&format!("{} exited with {:?}", program, output.status_code))
                .field("source", kind.as_str())
                .field("exit_code", output.status_code)
                .field("elapsed_ms", output.elapsed.as_secs_f64() * 1000.0)
                .field("stdout", output.stdout.trim())
                .log()
                .await;
            Some(output)
        }
        Err(e) => {
            log.log_no_data(kind, &e.to_string()).await;
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{quiet_log, ScriptedRunner};
    use super::*;

    #[test]
    fn test_default_sources_run_order() {
        let sources = default_sources(&Config::default());
        let kinds: Vec<SourceKind> = sources.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, SourceKind::ALL.to_vec());

        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["speedtest-cli", "fast-cli", "ndt7-client", "curl"]);
    }

    #[tokio::test]
    async fn test_invoke_reports_start_failure_as_none() {
        let runner = ScriptedRunner::new().then_missing("speedtest-cli");
        let output = invoke(&runner, &quiet_log(), SourceKind::Speedtest, "speedtest-cli", &[], 1).await;
        assert!(output.is_none());
    }
}
