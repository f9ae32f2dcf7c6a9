//! Posting to Twitter
//!
//! OAuth 1.0a signing, the one-time interactive authorization, and the
//! upload-then-post sequence that publishes the chart with a summary.

pub mod auth;
pub mod client;
pub mod oauth;

pub use auth::{ensure_authorized, StdinPrompt, VerifierPrompt};
pub use client::TwitterClient;

use crate::{error::Result, logging::ApiLogger, stats::HistorySummary};
use std::path::Path;

/// Outcome of a successful post
#[derive(Debug, Clone, PartialEq)]
pub struct PostedStatus {
    pub text: String,
    pub media_id: String,
    pub status_id: Option<String>,
}

/// Upload the rendered chart, then post the median summary with it attached
pub async fn post_summary(
    client: &TwitterClient,
    summary: &HistorySummary,
    chart_path: &Path,
    log: &ApiLogger,
) -> Result<PostedStatus> {
    let media_id = client.upload_media(chart_path).await?;
    let text = summary.status_text();
    let status_id = client.update_status(&text, std::slice::from_ref(&media_id)).await?;

    log.log_posted(&text, &media_id).await;

    Ok(PostedStatus {
        text,
        media_id,
        status_id,
    })
}
