use std::{env, fs, path::Path, sync::Arc, time::Duration};

use crate::{
    credentials::{ConfigSource, EnvSource, GroupSuffixTable, BUILTIN_SUFFIX_MAP},
    domain::{ChatId, UserId},
    errors::Error,
    Result,
};

/// X/Twitter v2 create-post endpoint, used unless `TWITTER_POST_URL` overrides it.
pub const DEFAULT_POST_URL: &str = "https://api.twitter.com/2/tweets";

/// How relayed private messages reach the forward target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardMode {
    /// Re-send the text, or the photo with its caption.
    Copy,
    /// Native Telegram forward of the original message.
    Forward,
}

impl std::str::FromStr for ForwardMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "copy" => Ok(Self::Copy),
            "forward" => Ok(Self::Forward),
            other => Err(Error::Config(format!(
                "FORWARD_MODE must be `copy` or `forward`, got {other:?}"
            ))),
        }
    }
}

/// Typed startup configuration.
///
/// Per-suffix slots (credentials, group names) are not captured here; they are
/// read on demand through the same [`ConfigSource`].
#[derive(Clone)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub home_chat_id: ChatId,
    pub initial_target: ChatId,
    pub group_suffixes: Arc<GroupSuffixTable>,
    pub forward_mode: ForwardMode,

    // Authentication
    pub auth_secret: Option<String>,
    pub authenticated_users: Vec<UserId>,

    // Polling
    pub poll_timeout: Duration,
    pub poll_retry_delay: Duration,

    // Social posting
    pub twitter_post_url: String,
    pub http_timeout: Duration,

    pub source: Arc<dyn ConfigSource>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("home_chat_id", &self.home_chat_id)
            .field("initial_target", &self.initial_target)
            .field("group_suffixes", &self.group_suffixes.len())
            .field("forward_mode", &self.forward_mode)
            .field("auth_enabled", &self.auth_secret.is_some())
            .field("authenticated_users", &self.authenticated_users.len())
            .field("poll_timeout", &self.poll_timeout)
            .field("poll_retry_delay", &self.poll_retry_delay)
            .field("twitter_post_url", &self.twitter_post_url)
            .field("http_timeout", &self.http_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load `.env` (without overriding the environment), then read the environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_source(Arc::new(EnvSource))
    }

    pub fn from_source(source: Arc<dyn ConfigSource>) -> Result<Self> {
        let get = |key: &str| source.get(key).and_then(non_empty);

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let home_chat_id = required_chat_id(get("BOT_GROUP_ID"), "BOT_GROUP_ID")?;
        let initial_target = required_chat_id(get("PROMO_GROUP_ID"), "PROMO_GROUP_ID")?;

        // Routing
        let group_suffixes = Arc::new(GroupSuffixTable::parse(
            get("GROUP_SUFFIX_MAP")
                .as_deref()
                .unwrap_or(BUILTIN_SUFFIX_MAP),
        )?);
        let forward_mode = get("FORWARD_MODE")
            .as_deref()
            .unwrap_or("copy")
            .parse::<ForwardMode>()?;

        // Authentication
        let auth_secret = get("BOT_AUTH_SECRET");
        let authenticated_users = parse_csv_i64(get("AUTHENTICATED_USERS"), "AUTHENTICATED_USERS")?
            .into_iter()
            .map(UserId)
            .collect();

        // Polling
        let poll_timeout = Duration::from_secs(
            parse_opt::<u64>(get("POLL_TIMEOUT_SECS"), "POLL_TIMEOUT_SECS")?.unwrap_or(60),
        );
        let poll_retry_delay = Duration::from_millis(
            parse_opt::<u64>(get("POLL_RETRY_DELAY_MS"), "POLL_RETRY_DELAY_MS")?.unwrap_or(5_000),
        );

        // Social posting
        let twitter_post_url =
            get("TWITTER_POST_URL").unwrap_or_else(|| DEFAULT_POST_URL.to_string());
        let http_timeout = Duration::from_secs(
            parse_opt::<u64>(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS")?.unwrap_or(10),
        );

        Ok(Self {
            telegram_bot_token,
            home_chat_id,
            initial_target,
            group_suffixes,
            forward_mode,
            auth_secret,
            authenticated_users,
            poll_timeout,
            poll_retry_delay,
            twitter_post_url,
            http_timeout,
            source,
        })
    }
}

fn required_chat_id(raw: Option<String>, key: &str) -> Result<ChatId> {
    let raw = raw.ok_or_else(|| Error::Config(format!("{key} environment variable is required")))?;
    raw.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| Error::Config(format!("{key} is not a valid chat id ({raw:?}): {e}")))
}

fn parse_opt<T>(raw: Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|s| {
        s.trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("{key}: invalid value {s:?}: {e}")))
    })
    .transpose()
}

fn parse_csv_i64(v: Option<String>, key: &str) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|e| Error::Config(format!("{key}: invalid id {s:?}: {e}")))
        })
        .collect()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
