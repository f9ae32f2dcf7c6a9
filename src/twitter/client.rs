//! Twitter API v1.1 client: token exchange, media upload and status update

use super::oauth::{authorization_header, Nonce, OAuthCredentials};
use crate::{
    defaults::{TWITTER_API_BASE, TWITTER_UPLOAD_BASE},
    error::{AppError, ErrorContext, Result},
    logging::ApiLogger,
    models::{AccessToken, Config, RequestToken},
};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: Option<String>,
    media_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    id_str: Option<String>,
}

/// HTTP client for the endpoints the bot uses
pub struct TwitterClient {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
    credentials: OAuthCredentials,
    log: ApiLogger,
}

impl TwitterClient {
    /// Client signing with the consumer key only
    pub fn new(config: &Config, log: ApiLogger) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
            .build()?;

        Ok(Self {
            http,
            api_base: TWITTER_API_BASE.to_string(),
            upload_base: TWITTER_UPLOAD_BASE.to_string(),
            credentials: OAuthCredentials::consumer(&config.api_key, &config.api_secret),
            log,
        })
    }

    /// Client signing as the stored account
    pub fn authorized(config: &Config, log: ApiLogger) -> Result<Self> {
        let access = config
            .access_token
            .as_ref()
            .ok_or_else(|| AppError::auth("No access token stored; authorization has not completed"))?;

        let mut client = Self::new(config, log)?;
        client.credentials = client.credentials.with_token(access.token(), access.secret());
        Ok(client)
    }

    /// Point the client at other hosts, e.g. a local mock server
    pub fn with_base_urls(mut self, api_base: &str, upload_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.upload_base = upload_base.trim_end_matches('/').to_string();
        self
    }

    /// Obtain a request token for `callback_url`
    pub async fn request_token(&self, callback_url: &str) -> Result<RequestToken> {
        let url = self.endpoint(&self.api_base, "/oauth/request_token")?;
        let header = authorization_header(
            &self.credentials,
            "POST",
            &url,
            &[],
            &[("oauth_callback", callback_url)],
            &Nonce::generate(),
        )?;

        let response = self.send(Method::POST, url, header, RequestBody::Empty).await?;
        let fields = parse_form(&response.text().await?);

        Ok(RequestToken {
            oauth_token: required(&fields, "oauth_token")?,
            oauth_token_secret: required(&fields, "oauth_token_secret")?,
            oauth_callback_confirmed: fields.get("oauth_callback_confirmed").cloned(),
        })
    }

    /// Page where the account owner grants access
    pub fn authorize_url(&self, request_token: &RequestToken) -> Result<String> {
        let mut url = self.endpoint(&self.api_base, "/oauth/authorize")?;
        url.query_pairs_mut().append_pair("oauth_token", &request_token.oauth_token);
        Ok(url.to_string())
    }

    /// Exchange a verified request token for an access token
    pub async fn access_token(&self, request_token: &RequestToken, verifier: &str) -> Result<AccessToken> {
        let url = self.endpoint(&self.api_base, "/oauth/access_token")?;
        let credentials = self
            .credentials
            .clone()
            .with_token(&request_token.oauth_token, &request_token.oauth_token_secret);
        let header = authorization_header(
            &credentials,
            "POST",
            &url,
            &[],
            &[("oauth_verifier", verifier)],
            &Nonce::generate(),
        )?;

        let response = self.send(Method::POST, url, header, RequestBody::Empty).await?;
        let fields = parse_form(&response.text().await?);

        Ok(AccessToken(
            required(&fields, "oauth_token")?,
            required(&fields, "oauth_token_secret")?,
        ))
    }

    /// Upload a PNG and return its media id
    pub async fn upload_media(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read chart '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plot.png".to_string());

        let url = self.endpoint(&self.upload_base, "/1.1/media/upload.json")?;
        // Multipart bodies are not covered by the signature
        let header = authorization_header(&self.credentials, "POST", &url, &[], &[], &Nonce::generate())?;

        let part = Part::bytes(bytes).file_name(file_name).mime_str("image/png")?;
        let form = Form::new().part("media", part);

        let response = self.send(Method::POST, url, header, RequestBody::Multipart(form)).await?;
        let body: MediaUploadResponse = response.json().await?;

        body.media_id_string
            .or_else(|| body.media_id.map(|id| id.to_string()))
            .ok_or_else(|| AppError::http("Media upload response carried no media id"))
    }

    /// Publish a status with attached media; returns the status id if reported
    pub async fn update_status(&self, status: &str, media_ids: &[String]) -> Result<Option<String>> {
        let url = self.endpoint(&self.api_base, "/1.1/statuses/update.json")?;
        let mut params = vec![("status".to_string(), status.to_string())];
        if !media_ids.is_empty() {
            params.push(("media_ids".to_string(), media_ids.join(",")));
        }

        let header = authorization_header(&self.credentials, "POST", &url, &params, &[], &Nonce::generate())?;
        let response = self.send(Method::POST, url, header, RequestBody::Form(params)).await?;
        let body: StatusResponse = response.json().await?;

        Ok(body.id_str)
    }

    fn endpoint(&self, base: &str, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    async fn send(&self, method: Method, url: Url, authorization: String, body: RequestBody) -> Result<Response> {
        let started = Instant::now();
        let display_url = url.to_string();

        let request = self
            .http
            .request(method.clone(), url)
            .header(reqwest::header::AUTHORIZATION, authorization);
        let request = match body {
            RequestBody::Empty => request,
            RequestBody::Form(params) => request.form(&params),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let elapsed = started.elapsed().as_secs_f64() * 1000.0;
                self.log.log_request(method.as_str(), &display_url, None, elapsed).await;
                return Err(e.into());
            }
        };

        let status = response.status();
        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        self.log
            .log_request(method.as_str(), &display_url, Some(status.as_u16()), elapsed)
            .await;

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("{} {} returned {}: {}", method, display_url, status, body.trim());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::auth(message)),
            _ => Err(AppError::http(message)),
        }
    }
}

enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    Multipart(Form),
}

fn parse_form(body: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .into_owned()
        .collect()
}

fn required(fields: &HashMap<String, String>, key: &str) -> Result<String> {
    fields
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| AppError::auth(format!("Token response is missing '{}'", key)))
}
