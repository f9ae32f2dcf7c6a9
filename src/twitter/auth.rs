//! First-time authorization of the posting account
//!
//! When the config lacks tokens the operator is sent to the authorize page,
//! pastes back the `oauth_verifier`, and the tokens are written into the
//! config file. The run then stops so that the next run starts clean with
//! the stored credentials.

use super::client::TwitterClient;
use crate::{
    config::parser::store_tokens,
    error::{AppError, Result},
    models::Config,
};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Source of the verifier code shown after granting access
#[async_trait]
pub trait VerifierPrompt: Send {
    async fn read_verifier(&mut self, authorize_url: &str) -> Result<String>;
}

/// Prompts on the terminal
pub struct StdinPrompt;

#[async_trait]
impl VerifierPrompt for StdinPrompt {
    async fn read_verifier(&mut self, authorize_url: &str) -> Result<String> {
        println!("Visit {} and grant the bot access.", authorize_url);
        print!("Then, copy the \"oauth_verifier\" here: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(line)
    }
}

/// Complete authorization if needed.
///
/// Returns `Ok(())` when tokens are already stored. Otherwise runs the
/// interactive exchange, rewrites `config_path` and returns
/// [`AppError::AuthorizationPending`].
pub async fn ensure_authorized(
    config: &mut Config,
    config_path: &Path,
    client: &TwitterClient,
    prompt: &mut dyn VerifierPrompt,
) -> Result<()> {
    if config.is_authorized() {
        return Ok(());
    }

    let request_token = client.request_token(&config.callback_url).await?;
    let authorize_url = client.authorize_url(&request_token)?;

    let verifier = prompt.read_verifier(&authorize_url).await?;
    let verifier = verifier.trim();
    if verifier.is_empty() {
        return Err(AppError::auth("No oauth_verifier entered"));
    }

    let access_token = client.access_token(&request_token, verifier).await?;
    let written = store_tokens(config_path, &request_token, &access_token).await?;
    println!("Writing new cfg:");
    println!("{}", written);

    config.request_token = Some(request_token);
    config.access_token = Some(access_token);

    Err(AppError::authorization_pending(format!(
        "Access granted and saved to '{}'; run the bot again to start posting",
        config_path.display()
    )))
}
