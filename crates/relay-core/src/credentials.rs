use std::{collections::HashMap, env, fmt, sync::Arc};

use crate::{domain::ChatId, errors::Error, Result};

// ============== Configuration Slots ==============

/// Read-only accessor over named configuration slots.
///
/// Every call re-reads the backing store; nothing is cached, so a slot changed
/// mid-run is seen by the next lookup.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// Fixed in-memory slots (tests, embedding).
#[derive(Clone, Debug, Default)]
pub struct MapSource(pub HashMap<String, String>);

impl MapSource {
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

// ============== Suffix Table ==============

const API_KEY_PREFIX: &str = "TWITTER_API_KEY";
const API_SECRET_PREFIX: &str = "TWITTER_API_SECRET_KEY";
const ACCESS_TOKEN_PREFIX: &str = "TWITTER_ACCESS_TOKEN";
const ACCESS_SECRET_PREFIX: &str = "TWITTER_ACCESS_TOKEN_SECRET";
const GROUP_NAME_PREFIX: &str = "GROUP_NAME";

/// Default chat -> suffix table, used when `GROUP_SUFFIX_MAP` is not set.
pub const BUILTIN_SUFFIX_MAP: &str = "-1002114057976:1,-1002073907096:2";

/// Short key namespacing one account's credential slots.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Suffix(pub String);

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Suffix {
    /// Slot name for `prefix` under this suffix, e.g. `TWITTER_API_KEY_1`.
    pub fn slot(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.0)
    }
}

/// Authoritative chat id -> suffix mapping, fixed for the process lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupSuffixTable {
    entries: HashMap<ChatId, Suffix>,
}

impl GroupSuffixTable {
    /// Parse `chat_id:suffix` pairs separated by commas.
    ///
    /// Duplicate chat ids are rejected: a chat maps to exactly one suffix.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut entries = HashMap::new();
        for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((id, suffix)) = pair.split_once(':') else {
                return Err(Error::Config(format!(
                    "invalid suffix mapping {pair:?}: expected chat_id:suffix"
                )));
            };
            let id = id.trim().parse::<i64>().map_err(|e| {
                Error::Config(format!("invalid chat id in suffix mapping {pair:?}: {e}"))
            })?;
            let suffix = suffix.trim();
            if suffix.is_empty() {
                return Err(Error::Config(format!(
                    "empty suffix in suffix mapping {pair:?}"
                )));
            }
            if entries
                .insert(ChatId(id), Suffix(suffix.to_string()))
                .is_some()
            {
                return Err(Error::Config(format!(
                    "chat id {id} mapped more than once in suffix mapping"
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn builtin() -> Self {
        Self::parse(BUILTIN_SUFFIX_MAP).unwrap_or_default()
    }

    pub fn get(&self, chat_id: ChatId) -> Option<&Suffix> {
        self.entries.get(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============== Credential Bundle ==============

/// The four OAuth 1.0a secrets needed to post on behalf of one account.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("access_token_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no suffix mapped for chat {0}")]
    UnmappedChat(ChatId),

    #[error("incomplete credentials for suffix {suffix}: missing {}", .missing.join(", "))]
    IncompleteCredentials {
        suffix: Suffix,
        missing: Vec<String>,
    },
}

// ============== Resolver ==============

/// Maps a chat to its suffix and a suffix to its credential bundle.
#[derive(Clone)]
pub struct CredentialResolver {
    table: Arc<GroupSuffixTable>,
    source: Arc<dyn ConfigSource>,
}

impl CredentialResolver {
    pub fn new(table: Arc<GroupSuffixTable>, source: Arc<dyn ConfigSource>) -> Self {
        Self { table, source }
    }

    pub fn resolve_suffix(&self, chat_id: ChatId) -> std::result::Result<Suffix, ResolveError> {
        self.table
            .get(chat_id)
            .cloned()
            .ok_or(ResolveError::UnmappedChat(chat_id))
    }

    pub fn resolve_credentials(
        &self,
        suffix: &Suffix,
    ) -> std::result::Result<CredentialBundle, ResolveError> {
        let mut missing = Vec::new();
        let mut read = |prefix: &str| {
            let key = suffix.slot(prefix);
            match self.source.get(&key) {
                Some(v) if !v.is_empty() => v,
                _ => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let bundle = CredentialBundle {
            api_key: read(API_KEY_PREFIX),
            api_secret: read(API_SECRET_PREFIX),
            access_token: read(ACCESS_TOKEN_PREFIX),
            access_token_secret: read(ACCESS_SECRET_PREFIX),
        };

        if !missing.is_empty() {
            return Err(ResolveError::IncompleteCredentials {
                suffix: suffix.clone(),
                missing,
            });
        }
        Ok(bundle)
    }

    /// Suffix + bundle for a chat. No credential slot is read for an unmapped chat.
    pub fn resolve(
        &self,
        chat_id: ChatId,
    ) -> std::result::Result<(Suffix, CredentialBundle), ResolveError> {
        let suffix = self.resolve_suffix(chat_id)?;
        let bundle = self.resolve_credentials(&suffix)?;
        Ok((suffix, bundle))
    }

    /// Human-readable group name configured for a suffix.
    pub fn group_name(&self, suffix: &Suffix) -> Option<String> {
        self.source
            .get(&suffix.slot(GROUP_NAME_PREFIX))
            .filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every slot read so tests can assert nothing was looked up.
    #[derive(Default)]
    struct SpySource {
        inner: MapSource,
        reads: Mutex<Vec<String>>,
    }

    impl ConfigSource for SpySource {
        fn get(&self, key: &str) -> Option<String> {
            self.reads.lock().unwrap().push(key.to_string());
            self.inner.get(key)
        }
    }

    fn full_bundle(suffix: &str) -> Vec<(String, String)> {
        vec![
            (format!("TWITTER_API_KEY_{suffix}"), "key".to_string()),
            (format!("TWITTER_API_SECRET_KEY_{suffix}"), "secret".to_string()),
            (format!("TWITTER_ACCESS_TOKEN_{suffix}"), "token".to_string()),
            (
                format!("TWITTER_ACCESS_TOKEN_SECRET_{suffix}"),
                "token-secret".to_string(),
            ),
        ]
    }

    fn resolver(source: Arc<dyn ConfigSource>) -> CredentialResolver {
        CredentialResolver::new(Arc::new(GroupSuffixTable::builtin()), source)
    }

    #[test]
    fn builtin_table_maps_known_groups() {
        let t = GroupSuffixTable::builtin();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(ChatId(-1002114057976)), Some(&Suffix("1".into())));
        assert_eq!(t.get(ChatId(-1002073907096)), Some(&Suffix("2".into())));
        assert_eq!(t.get(ChatId(2114057976)), None);
    }

    #[test]
    fn parse_rejects_malformed_pairs() {
        assert!(GroupSuffixTable::parse("-100123").is_err());
        assert!(GroupSuffixTable::parse("abc:1").is_err());
        assert!(GroupSuffixTable::parse("-100123: ").is_err());
        assert!(GroupSuffixTable::parse("-100123:1,-100123:2").is_err());
        assert!(GroupSuffixTable::parse("").unwrap().is_empty());
    }

    #[test]
    fn unmapped_chat_fails_without_reading_credentials() {
        let spy = Arc::new(SpySource::default());
        let r = resolver(spy.clone());

        let err = r.resolve(ChatId(-100999)).unwrap_err();
        assert_eq!(err, ResolveError::UnmappedChat(ChatId(-100999)));
        assert!(spy.reads.lock().unwrap().is_empty());
    }

    #[test]
    fn full_bundle_is_returned_unmodified() {
        let mut pairs = full_bundle("1");
        pairs[0].1 = "  padded key ".to_string();
        let r = resolver(Arc::new(MapSource::new(pairs)));

        let (suffix, bundle) = r.resolve(ChatId(-1002114057976)).unwrap();
        assert_eq!(suffix, Suffix("1".into()));
        assert_eq!(bundle.api_key, "  padded key ");
        assert_eq!(bundle.api_secret, "secret");
        assert_eq!(bundle.access_token, "token");
        assert_eq!(bundle.access_token_secret, "token-secret");
    }

    #[test]
    fn any_missing_field_is_incomplete() {
        for skip in 0..4 {
            let mut pairs = full_bundle("2");
            pairs[skip].1 = String::new();
            let r = resolver(Arc::new(MapSource::new(pairs)));

            match r.resolve_credentials(&Suffix("2".into())) {
                Err(ResolveError::IncompleteCredentials { suffix, missing }) => {
                    assert_eq!(suffix, Suffix("2".into()));
                    assert_eq!(missing.len(), 1);
                }
                other => panic!("expected incomplete credentials, got {other:?}"),
            }
        }
    }

    #[test]
    fn only_empty_slots_count_as_missing() {
        let mut pairs = full_bundle("1");
        pairs[1].1 = " ".to_string();
        let r = resolver(Arc::new(MapSource::new(pairs)));

        let bundle = r.resolve_credentials(&Suffix("1".into())).unwrap();
        assert_eq!(bundle.api_secret, " ");
    }

    #[test]
    fn credentials_are_reread_on_every_call() {
        let spy = Arc::new(SpySource {
            inner: MapSource::new(full_bundle("1")),
            reads: Mutex::new(Vec::new()),
        });
        let r = resolver(spy.clone());

        r.resolve(ChatId(-1002114057976)).unwrap();
        r.resolve(ChatId(-1002114057976)).unwrap();
        assert_eq!(spy.reads.lock().unwrap().len(), 8);
    }

    #[test]
    fn debug_redacts_secrets() {
        let r = resolver(Arc::new(MapSource::new(full_bundle("1"))));
        let (_, bundle) = r.resolve(ChatId(-1002114057976)).unwrap();
        let dbg = format!("{bundle:?}");
        assert!(!dbg.contains("token-secret"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn group_name_ignores_blank_values() {
        let r = resolver(Arc::new(MapSource::new([
            ("GROUP_NAME_1", "Promo One"),
            ("GROUP_NAME_2", "  "),
        ])));
        assert_eq!(
            r.group_name(&Suffix("1".into())).as_deref(),
            Some("Promo One")
        );
        assert_eq!(r.group_name(&Suffix("2".into())), None);
    }
}
