//! One run of the bot: measure, store, decide, chart and post

use crate::{
    chart,
    cli::Cli,
    config::{display_config_summary, load_config, EnvManager, LoadedConfig},
    error::{AppError, Result},
    executor::{ExecutionReport, SpeedTestExecutor},
    logging::LoggerFactory,
    models::{Config, MeasurementRecord},
    output::{OutputFormatter, OutputFormatterFactory},
    sources::{CommandRunner, TokioCommandRunner},
    stats::{self, HistorySummary},
    store::RecordStore,
    twitter::{self, PostedStatus, StdinPrompt, TwitterClient},
};
use chrono::Utc;
use std::sync::Arc;

/// What the run did after measuring
#[derive(Debug, Clone, PartialEq)]
pub enum RunAction {
    /// Dry run: chart written, nothing posted
    GraphGenerated,
    Posted(PostedStatus),
    /// Posting not due, or suppressed by `--only_test`
    SkippedTweet,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Report of the speed tests, unless `--skip_test`
    pub report: Option<ExecutionReport>,
    /// Id of the stored record, if any source produced data
    pub inserted_id: Option<u64>,
    pub summary: HistorySummary,
    pub action: RunAction,
}

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
    runner: Arc<dyn CommandRunner>,
    now: f64,
    api_bases: Option<(String, String)>,
}

impl App {
    /// Application running the real speed-test programs, clock read once here
    pub fn new(cli: Cli) -> Self {
        let now = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        Self {
            cli,
            runner: Arc::new(TokioCommandRunner::new()),
            now,
            api_bases: None,
        }
    }

    /// Substitute the process layer
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Pin the run's notion of "now" (epoch seconds)
    pub fn with_now(mut self, now: f64) -> Self {
        self.now = now;
        self
    }

    /// Send API calls to other hosts
    pub fn with_api_bases(mut self, api_base: &str, upload_base: &str) -> Self {
        self.api_bases = Some((api_base.to_string(), upload_base.to_string()));
        self
    }

    /// Run the application
    pub async fn run(self) -> Result<RunSummary> {
        let loaded = load_config(self.cli.clone())?;
        let factory = LoggerFactory::new(&loaded.config);
        let error_log = factory.create_error_logger().await;

        let result = self.execute(loaded, &factory).await;
        if let Err(e) = &result {
            if !matches!(e, AppError::AuthorizationPending(_)) {
                error_log.log_error(e, Some("run")).await;
            }
        }
        result
    }

    async fn execute(&self, loaded: LoadedConfig, factory: &LoggerFactory) -> Result<RunSummary> {
        let logger = factory.create_logger("APP").await;
        logger.add_context_field("dry_run", self.cli.dry_run).await;
        let formatter = OutputFormatterFactory::create_formatter(loaded.config.enable_color, loaded.config.verbose);

        if loaded.config.debug {
            println!("{}", formatter.format_header(&format!("{} v{}", crate::PKG_NAME, crate::VERSION)));
            println!("{}", display_config_summary(&loaded));
        }

        for warning in EnvManager::validate_current_env() {
            crate::log_warn!(logger, "{}", warning);
        }

        let LoadedConfig { mut config, paths } = loaded;

        if !self.cli.dry_run {
            let client = self.client(TwitterClient::new(&config, factory.create_api_logger().await)?);
            twitter::ensure_authorized(&mut config, &paths.config, &client, &mut StdinPrompt).await?;
        }

        let mut store = RecordStore::open(&paths.db)?;
        crate::log_debug!(logger, "Opened '{}' with {} records", paths.db.display(), store.len());
        if store.malformed_count() > 0 {
            logger
                .warn("Ignoring malformed documents in the measurement log")
                .field("path", paths.db.display().to_string())
                .field("count", store.malformed_count())
                .log()
                .await;
        }

        // Posting and M-Lab decisions use their own intervals over the whole log
        let mut history = store.recent(self.now, config.history_window());
        let due = stats::tweet_due(store.records(), self.now, config.tweet_interval());
        let do_tweet = stats::should_tweet(self.cli.force_tweet, due, self.cli.only_test);

        logger
            .info("Loaded history")
            .field("records", history.len())
            .field("tweet_due", due)
            .field("do_tweet", do_tweet)
            .log()
            .await;

        let mut report = None;
        let mut inserted_id = None;
        if !self.cli.skip_test {
            let executor = SpeedTestExecutor::new(&config, self.runner.clone(), factory.create_source_logger().await);
            let operation = logger.start_operation("speed_tests").await;
            let run = executor.run_all(store.records(), self.now).await;
            logger.end_operation(&operation, "speed_tests", run.has_data()).await;
            println!("{}", formatter.format_run_report(&run));

            if run.has_data() {
                let record = MeasurementRecord::new(self.now, do_tweet, &run.results);
                let id = store.insert(record.clone())?;
                logger
                    .info("Stored measurement")
                    .field("id", id)
                    .field("sources", run.measured_count())
                    .log()
                    .await;
                history.push(record);
                inserted_id = Some(id);
            } else {
                println!("{}", formatter.format_warning("No speed test produced data; nothing stored"));
            }
            report = Some(run);
        }

        let summary = HistorySummary::from_history(&history, config.average_window())?;
        println!("{}", formatter.format_summary(&summary));

        let action = self.publish(&config, &paths.plot, &summary, do_tweet, factory, formatter.as_ref()).await?;

        Ok(RunSummary {
            report,
            inserted_id,
            summary,
            action,
        })
    }

    async fn publish(
        &self,
        config: &Config,
        plot: &std::path::Path,
        summary: &HistorySummary,
        do_tweet: bool,
        factory: &LoggerFactory,
        formatter: &dyn OutputFormatter,
    ) -> Result<RunAction> {
        if self.cli.dry_run {
            chart::render_to_file(summary, plot)?;
            println!("{}", formatter.format_success(&format!("Graph generated: {}", plot.display())));
            return Ok(RunAction::GraphGenerated);
        }

        if !do_tweet {
            println!("{}", formatter.format_warning("Skipping tweet"));
            return Ok(RunAction::SkippedTweet);
        }

        chart::render_to_file(summary, plot)?;
        let api_log = factory.create_api_logger().await;
        let client = self.client(TwitterClient::authorized(config, api_log.clone())?);
        let posted = twitter::post_summary(&client, summary, plot, &api_log).await?;
        crate::log_info!(api_log.logger(), "Posted status {:?}", posted.status_id);
        println!("{}", formatter.format_success(&format!("Posted: {}", posted.text)));

        Ok(RunAction::Posted(posted))
    }

    fn client(&self, client: TwitterClient) -> TwitterClient {
        match &self.api_bases {
            Some((api, upload)) => client.with_base_urls(api, upload),
            None => client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sample, SourceKind, SourceResults};
    use crate::sources::testing::ScriptedRunner;
    use clap::Parser;
    use std::path::Path;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: f64 = 1_700_000_000.0;
    const AUTHORIZED_CFG: &str = r#"{
        "api_key": "key",
        "api_secret": "secret",
        "request_token": {"oauth_token": "r", "oauth_token_secret": "rs"},
        "access_token": ["a", "as"]
    }"#;

    fn cli(dir: &Path, flags: &[&str]) -> Cli {
        let config = dir.join("cfg");
        let db = dir.join("db.json");
        let plot = dir.join("plot.png");
        let mut args = vec![
            "netspeed-bot".to_string(),
            "--no-color".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--db".to_string(),
            db.display().to_string(),
            "--plot".to_string(),
            plot.display().to_string(),
        ];
        args.extend(flags.iter().map(|f| f.to_string()));
        Cli::parse_from(args)
    }

    /// Authorized cfg with some tuning keys overridden
    fn write_cfg(dir: &Path, tuning: serde_json::Value) {
        let mut cfg: serde_json::Value = serde_json::from_str(AUTHORIZED_CFG).unwrap();
        for (key, value) in tuning.as_object().unwrap() {
            cfg[key] = value.clone();
        }
        std::fs::write(dir.join("cfg"), cfg.to_string()).unwrap();
    }

    async fn mock_api(expected_posts: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/media/upload.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"media_id_string": "77"})))
            .expect(expected_posts)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/update.json"))
            .and(body_string_contains("media_ids=77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id_str": "99"})))
            .expect(expected_posts)
            .mount(&server)
            .await;
        server
    }

    fn seed(dir: &Path, age_secs: f64, tweeted: bool) {
        let mut store = RecordStore::open(&dir.join("db.json")).unwrap();
        let results: SourceResults = [(SourceKind::Speedtest, Sample::new(80.0, 8.0, Some(11.0)))].into_iter().collect();
        store.insert(MeasurementRecord::new(NOW - age_secs, tweeted, &results)).unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_skip_test_renders_chart() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), 600.0, false);

        let summary = App::new(cli(dir.path(), &["--dry_run", "--skip_test"]))
            .with_runner(Arc::new(ScriptedRunner::new()))
            .with_now(NOW)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.action, RunAction::GraphGenerated);
        assert!(summary.report.is_none());
        assert_eq!(summary.summary.median_down, Some(80.0));
        assert!(dir.path().join("plot.png").exists());
    }

    #[tokio::test]
    async fn test_only_test_stores_untweeted_record() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cfg"), AUTHORIZED_CFG).unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .then_output(0, "Ping: 9 ms\nDownload: 120.5 Mbit/s\nUpload: 12.5 Mbit/s\n")
                .then_output(0, "130 Mbps\n")
                .then_output(1, "")
                .then_output(0, "not a number"),
        );

        let summary = App::new(cli(dir.path(), &["--only_test", "--force_tweet"]))
            .with_runner(runner.clone())
            .with_now(NOW)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.action, RunAction::SkippedTweet);
        assert_eq!(summary.inserted_id, Some(1));
        assert_eq!(runner.programs().len(), 4);

        let store = RecordStore::open(&dir.path().join("db.json")).unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.records()[0].tweeted);
        assert_eq!(store.records()[0].sample(SourceKind::Fastcom), Some(&Sample::download_only(130.0)));
        assert!(!dir.path().join("plot.png").exists());
    }

    #[tokio::test]
    async fn test_recent_post_means_not_due() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cfg"), AUTHORIZED_CFG).unwrap();
        seed(dir.path(), 3600.0, true);

        let summary = App::new(cli(dir.path(), &["--skip_test"]))
            .with_now(NOW)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.action, RunAction::SkippedTweet);
        assert_eq!(summary.summary.record_count, 1);
    }

    #[tokio::test]
    async fn test_no_data_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .then_missing("speedtest-cli")
                .then_output(0, "???")
                .then_missing("ndt7-client")
                .then_missing("curl"),
        );

        let summary = App::new(cli(dir.path(), &["--dry_run"]))
            .with_runner(runner)
            .with_now(NOW)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.inserted_id, None);
        assert!(!summary.report.unwrap().has_data());
        assert!(!dir.path().join("db.json").exists());
    }

    #[tokio::test]
    async fn test_missing_cfg_is_config_error() {
        let dir = TempDir::new().unwrap();
        let result = App::new(cli(dir.path(), &["--skip_test"])).with_now(NOW).run().await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_due_run_posts_and_marks_record() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cfg"), AUTHORIZED_CFG).unwrap();
        seed(dir.path(), 9.0 * 3600.0, true);
        let server = mock_api(1).await;
        let runner = Arc::new(
            ScriptedRunner::new()
                .then_output(0, "Ping: 9 ms\nDownload: 120.5 Mbit/s\nUpload: 12.5 Mbit/s\n")
                .then_output(0, "130 Mbps\n")
                .then_output(1, "")
                .then_output(0, "not a number"),
        );

        let summary = App::new(cli(dir.path(), &[]))
            .with_runner(runner)
            .with_now(NOW)
            .with_api_bases(&server.uri(), &server.uri())
            .run()
            .await
            .unwrap();

        match &summary.action {
            RunAction::Posted(posted) => {
                assert_eq!(posted.media_id, "77");
                assert_eq!(posted.status_id.as_deref(), Some("99"));
                assert!(posted.text.starts_with("Median speed: "));
            }
            other => panic!("expected a post, got {:?}", other),
        }
        assert_eq!(summary.inserted_id, Some(2));
        assert!(dir.path().join("plot.png").exists());

        let store = RecordStore::open(&dir.path().join("db.json")).unwrap();
        let latest = store.records().last().unwrap();
        assert_eq!(latest.timestamp, NOW);
        assert!(latest.tweeted);
    }

    #[tokio::test]
    async fn test_force_tweet_overrides_recent_post() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cfg"), AUTHORIZED_CFG).unwrap();
        seed(dir.path(), 3600.0, true);
        let server = mock_api(1).await;

        let summary = App::new(cli(dir.path(), &["--skip_test", "--force_tweet"]))
            .with_now(NOW)
            .with_api_bases(&server.uri(), &server.uri())
            .run()
            .await
            .unwrap();

        assert!(matches!(summary.action, RunAction::Posted(_)));
        assert_eq!(summary.inserted_id, None);
    }

    #[tokio::test]
    async fn test_post_older_than_history_window_still_blocks_tweet() {
        let dir = TempDir::new().unwrap();
        write_cfg(dir.path(), serde_json::json!({"tweet_interval_secs": 172_800}));
        seed(dir.path(), 30.0 * 3600.0, true);

        let summary = App::new(cli(dir.path(), &["--skip_test"]))
            .with_now(NOW)
            .with_api_bases("http://127.0.0.1:9", "http://127.0.0.1:9")
            .run()
            .await
            .unwrap();

        assert_eq!(summary.action, RunAction::SkippedTweet);
        assert_eq!(summary.summary.record_count, 0);
    }

    #[tokio::test]
    async fn test_mlab_record_older_than_history_window_still_throttles() {
        let dir = TempDir::new().unwrap();
        write_cfg(dir.path(), serde_json::json!({"mlab_interval_secs": 172_800}));
        let results: SourceResults = [(SourceKind::Mlab, Sample::new(70.0, 9.0, Some(20.0)))].into_iter().collect();
        RecordStore::open(&dir.path().join("db.json"))
            .unwrap()
            .insert(MeasurementRecord::new(NOW - 30.0 * 3600.0, true, &results))
            .unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .then_output(0, "Ping: 9 ms\nDownload: 120.5 Mbit/s\nUpload: 12.5 Mbit/s\n")
                .then_output(0, "130 Mbps\n")
                .then_output(0, "not a number"),
        );

        let summary = App::new(cli(dir.path(), &["--only_test"]))
            .with_runner(runner.clone())
            .with_now(NOW)
            .run()
            .await
            .unwrap();

        assert_eq!(runner.programs(), vec!["speedtest-cli", "fast-cli", "curl"]);
        assert_eq!(summary.inserted_id, Some(2));
    }
}
