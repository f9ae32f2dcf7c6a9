//! OAuth 1.0a request signing with HMAC-SHA1

use crate::error::{AppError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// Consumer credentials plus an optional token
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: Option<String>,
    pub token_secret: Option<String>,
}

impl OAuthCredentials {
    pub fn consumer(key: &str, secret: &str) -> Self {
        Self {
            consumer_key: key.to_string(),
            consumer_secret: secret.to_string(),
            token: None,
            token_secret: None,
        }
    }

    pub fn with_token(mut self, token: &str, secret: &str) -> Self {
        self.token = Some(token.to_string());
        self.token_secret = Some(secret.to_string());
        self
    }
}

/// Per-request values that must differ between requests
#[derive(Debug, Clone, PartialEq)]
pub struct Nonce {
    pub nonce: String,
    pub timestamp: i64,
}

impl Nonce {
    pub fn generate() -> Self {
        Self {
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Scheme, host, non-default port and path, without query or fragment
pub fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// `METHOD&url&params` with parameters encoded, sorted and joined
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .chain(url.query_pairs().map(|(k, v)| (percent_encode(&k), percent_encode(&v))))
        .collect();
    encoded.sort();

    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_url(url)),
        percent_encode(&joined)
    )
}

/// Base64 HMAC-SHA1 of the base string keyed by `consumer_secret&token_secret`
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: Option<&str>) -> Result<String> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or_default())
    );

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::auth(format!("Invalid signing key: {}", e)))?;
    mac.update(base_string.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization` header for one request.
///
/// `request_params` are the form or query parameters covered by the
/// signature (none for multipart bodies); `extra_oauth` carries
/// `oauth_callback` or `oauth_verifier` during authorization.
pub fn authorization_header(
    credentials: &OAuthCredentials,
    method: &str,
    url: &Url,
    request_params: &[(String, String)],
    extra_oauth: &[(&str, &str)],
    nonce: &Nonce,
) -> Result<String> {
    let mut oauth: Vec<(String, String)> = vec![
        ("oauth_consumer_key".to_string(), credentials.consumer_key.clone()),
        ("oauth_nonce".to_string(), nonce.nonce.clone()),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), nonce.timestamp.to_string()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];
    if let Some(token) = &credentials.token {
        oauth.push(("oauth_token".to_string(), token.clone()));
    }
    for (key, value) in extra_oauth {
        oauth.push((key.to_string(), value.to_string()));
    }

    let mut signed: Vec<(String, String)> = oauth.clone();
    signed.extend(request_params.iter().cloned());

    let base = signature_base_string(method, url, &signed);
    let signature = sign(&base, &credentials.consumer_secret, credentials.token_secret.as_deref())?;
    oauth.push(("oauth_signature".to_string(), signature));
    oauth.sort();

    let fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {}", fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example from Twitter's "Creating a signature" guide
    fn documented_credentials() -> OAuthCredentials {
        OAuthCredentials::consumer("xvz1evFS4wEEPTGEFPHBog", "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw")
            .with_token(
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
                "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
            )
    }

    fn documented_nonce() -> Nonce {
        Nonce {
            nonce: "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg".to_string(),
            timestamp: 1318622958,
        }
    }

    fn status_params() -> Vec<(String, String)> {
        vec![(
            "status".to_string(),
            "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
        )]
    }

    #[test]
    fn test_percent_encode_reserved_characters() {
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("An encoded string!"), "An%20encoded%20string%21");
        assert_eq!(percent_encode("Dogs, Cats & Mice"), "Dogs%2C%20Cats%20%26%20Mice");
        assert_eq!(percent_encode("-._~"), "-._~");
        assert_eq!(percent_encode("☃"), "%E2%98%83");
    }

    #[test]
    fn test_base_url_drops_query_and_default_port() {
        let url = Url::parse("HTTPS://API.Twitter.com:443/1.1/statuses/update.json?include_entities=true").unwrap();
        assert_eq!(base_url(&url), "https://api.twitter.com/1.1/statuses/update.json");

        let local = Url::parse("http://127.0.0.1:8080/oauth/request_token").unwrap();
        assert_eq!(base_url(&local), "http://127.0.0.1:8080/oauth/request_token");
    }

    #[test]
    fn test_documented_signature() {
        let url = Url::parse("https://api.twitter.com/1.1/statuses/update.json?include_entities=true").unwrap();
        let credentials = documented_credentials();
        let nonce = documented_nonce();

        let mut params = status_params();
        params.extend([
            ("oauth_consumer_key".to_string(), credentials.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.nonce.clone()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), nonce.timestamp.to_string()),
            ("oauth_token".to_string(), credentials.token.clone().unwrap()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ]);

        let base = signature_base_string("post", &url, &params);
        assert!(base.starts_with("POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&include_entities%3Dtrue%26oauth_consumer_key"));

        let signature = sign(&base, &credentials.consumer_secret, credentials.token_secret.as_deref()).unwrap();
        assert_eq!(signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn test_authorization_header_contains_signature() {
        let url = Url::parse("https://api.twitter.com/1.1/statuses/update.json?include_entities=true").unwrap();
        let header = authorization_header(
            &documented_credentials(),
            "POST",
            &url,
            &status_params(),
            &[],
            &documented_nonce(),
        )
        .unwrap();

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_version=\"1.0\""));
        assert!(!header.contains("status="));
    }

    #[test]
    fn test_callback_is_signed_and_sent() {
        let url = Url::parse("https://api.twitter.com/oauth/request_token").unwrap();
        let credentials = OAuthCredentials::consumer("key", "secret");
        let header = authorization_header(
            &credentials,
            "POST",
            &url,
            &[],
            &[("oauth_callback", "https://oauthdebugger.com/debug")],
            &Nonce::generate(),
        )
        .unwrap();

        assert!(header.contains("oauth_callback=\"https%3A%2F%2Foauthdebugger.com%2Fdebug\""));
        assert!(!header.contains("oauth_token="));
    }
}
