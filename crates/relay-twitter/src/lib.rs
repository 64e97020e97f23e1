//! Twitter adapter (social posting).
//!
//! Posts `{"text": ...}` to the v2 tweets endpoint with an OAuth 1.0a
//! (HMAC-SHA1) signed `Authorization` header.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use sha1::Sha1;

use relay_core::{
    config::DEFAULT_POST_URL, credentials::CredentialBundle, errors::Error,
    messaging::port::SocialPort, messaging::types::PostReceipt, Result,
};

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone, Debug)]
pub struct TwitterClient {
    endpoint: String,
    http: reqwest::Client,
}

impl TwitterClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("twitter http client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }
}

#[async_trait]
impl SocialPort for TwitterClient {
    async fn post_text(&self, creds: &CredentialBundle, text: &str) -> Result<PostReceipt> {
        let auth = authorization_header(
            creds,
            "POST",
            &self.endpoint,
            &[],
            &nonce(),
            unix_timestamp(),
        )?;

        let resp = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, auth)
            .header(reqwest::header::USER_AGENT, "relay-bot")
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("twitter request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(
                status = status.as_u16(),
                "twitter error body: {}",
                body.chars().take(200).collect::<String>()
            );
        }

        Ok(PostReceipt {
            status: status.as_u16(),
        })
    }
}

// ============== OAuth 1.0a ==============

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// RFC 3986 percent-encoding (everything but `A-Z a-z 0-9 - . _ ~`).
fn pct(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Build the `Authorization: OAuth ...` header for one request.
///
/// `params` are extra request parameters that take part in the signature
/// (form fields); a JSON body never does. Query parameters in `url` are
/// included automatically.
pub fn authorization_header(
    creds: &CredentialBundle,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: u64,
) -> Result<String> {
    let timestamp = timestamp.to_string();
    let oauth = [
        ("oauth_consumer_key", creds.api_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", creds.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let signature = signature(
        method,
        url,
        oauth.iter().chain(params.iter()).copied(),
        &creds.api_secret,
        &creds.access_token_secret,
    )?;

    let mut fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", pct(k), pct(v)))
        .collect::<Vec<_>>();
    fields.push(format!("oauth_signature=\"{}\"", pct(&signature)));
    fields.sort();

    Ok(format!("OAuth {}", fields.join(", ")))
}

fn signature<'a>(
    method: &str,
    url: &str,
    params: impl Iterator<Item = (&'a str, &'a str)>,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Config(format!("invalid twitter endpoint {url:?}: {e}")))?;

    let mut base_url = parsed.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    let mut encoded = params
        .map(|(k, v)| (pct(k), pct(v)))
        .chain(parsed.query_pairs().map(|(k, v)| (pct(&k), pct(&v))))
        .collect::<Vec<_>>();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        pct(base_url.as_str()),
        pct(&param_string)
    );
    let key = format!("{}&{}", pct(consumer_secret), pct(token_secret));

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Config(format!("oauth signing key: {e}")))?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
