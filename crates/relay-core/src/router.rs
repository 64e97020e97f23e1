//! Per-update decision procedure.
//!
//! The router owns the mutable routing state (current forward target and the
//! authenticated-user set) and is driven by exactly one consumer, one update at
//! a time, in arrival order. Every per-update failure is logged and contained;
//! nothing here aborts the consumer loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    commands::{parse_command, parse_target},
    config::{Config, ForwardMode},
    credentials::{CredentialResolver, ResolveError, Suffix},
    domain::{ChatId, UserId},
    messaging::{
        port::{ChatPort, SocialPort},
        types::{ChatKind, IncomingMessage, OutboundMessage},
    },
    security::{authenticate, AuthGate, AuthOutcome, AuthenticatedUsers},
};

pub const GREETING: &str = "Hello! I am a bot and I was started in this group.";
pub const AUTH_OK: &str = "Authenticated. Messages you send here will now be relayed.";
pub const AUTH_FAILED: &str = "Invalid access code. Send the access code to use this bot.";

/// Mutable routing state, owned by the router for the process lifetime.
#[derive(Clone, Debug)]
pub struct RoutingConfig {
    pub forward_target: ChatId,
    pub authenticated_users: AuthenticatedUsers,
}

/// Classification of one inbound update, in dispatch priority order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateClass {
    Command { name: String, args: String },
    Stale,
    AuthenticationAttempt(UserId),
    GroupMessage,
    PrivateMessage,
    Unroutable,
}

/// Result of posting for one relayed update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostOutcome {
    Posted { status: u16 },
    Rejected { status: u16 },
    Skipped(ResolveError),
    Failed(String),
}

/// What the router did with one update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Stale,
    Reconfigured {
        previous: ChatId,
        target: ChatId,
        suffix: Option<Suffix>,
    },
    InvalidCommand,
    AuthAccepted(UserId),
    AuthRejected(UserId),
    Greeted,
    Relayed {
        forwarded: bool,
        posted: PostOutcome,
    },
    Ignored,
}

pub struct UpdateRouter {
    state: RoutingConfig,
    home_chat: ChatId,
    forward_mode: ForwardMode,
    started_at: DateTime<Utc>,
    gate: AuthGate,
    resolver: CredentialResolver,
    chat: Arc<dyn ChatPort>,
    social: Arc<dyn SocialPort>,
}

impl UpdateRouter {
    /// Build the router for this run; `now` becomes the service-start timestamp.
    pub fn new(cfg: &Config, chat: Arc<dyn ChatPort>, social: Arc<dyn SocialPort>) -> Self {
        Self::with_start_time(cfg, chat, social, Utc::now())
    }

    pub fn with_start_time(
        cfg: &Config,
        chat: Arc<dyn ChatPort>,
        social: Arc<dyn SocialPort>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state: RoutingConfig {
                forward_target: cfg.initial_target,
                authenticated_users: AuthenticatedUsers::new(
                    cfg.authenticated_users.iter().copied(),
                ),
            },
            home_chat: cfg.home_chat_id,
            forward_mode: cfg.forward_mode,
            started_at,
            gate: AuthGate::new(cfg.auth_secret.clone()),
            resolver: CredentialResolver::new(cfg.group_suffixes.clone(), cfg.source.clone()),
            chat,
            social,
        }
    }

    pub fn state(&self) -> &RoutingConfig {
        &self.state
    }

    pub fn forward_target(&self) -> ChatId {
        self.state.forward_target
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn classify(&self, msg: &IncomingMessage) -> UpdateClass {
        // Nothing from before this run is replayed, commands included.
        if msg.sent_at < self.started_at {
            return UpdateClass::Stale;
        }

        if let Some((name, args)) = msg.text.as_deref().and_then(parse_command) {
            if !name.is_empty() {
                return UpdateClass::Command { name, args };
            }
        }

        // The gate guards private chats only; group members never authenticate.
        if self.gate.is_enabled() && msg.chat_kind == ChatKind::Private {
            let Some(user) = msg.sender else {
                return UpdateClass::Unroutable;
            };
            if !self.state.authenticated_users.contains(user) {
                return UpdateClass::AuthenticationAttempt(user);
            }
        }

        if msg.chat_id == self.home_chat {
            return UpdateClass::GroupMessage;
        }
        if msg.chat_kind == ChatKind::Private {
            return UpdateClass::PrivateMessage;
        }
        UpdateClass::Unroutable
    }

    pub async fn handle(&mut self, msg: IncomingMessage) -> Dispatch {
        match self.classify(&msg) {
            UpdateClass::Stale => {
                debug!(chat_id = msg.chat_id.0, "dropping update from before service start");
                Dispatch::Stale
            }
            UpdateClass::Command { name, args } => self.handle_command(&msg, &name, &args).await,
            UpdateClass::AuthenticationAttempt(user) => self.handle_auth(&msg, user).await,
            UpdateClass::GroupMessage => {
                self.reply(msg.chat_id, GREETING).await;
                Dispatch::Greeted
            }
            UpdateClass::PrivateMessage => self.relay(&msg).await,
            UpdateClass::Unroutable => {
                debug!(chat_id = msg.chat_id.0, "ignoring update");
                Dispatch::Ignored
            }
        }
    }

    async fn handle_command(&mut self, msg: &IncomingMessage, name: &str, args: &str) -> Dispatch {
        let target = match parse_target(name, args) {
            Ok(t) => t,
            Err(e) => {
                warn!(chat_id = msg.chat_id.0, command = name, "rejected command: {e}");
                self.reply(msg.chat_id, "Usage: /setgroup <id> or /<id>")
                    .await;
                return Dispatch::InvalidCommand;
            }
        };

        let previous = self.state.forward_target;
        self.state.forward_target = target;
        info!(
            previous = previous.0,
            target_chat = target.0,
            "forward target updated"
        );

        // The assignment stands even when the new target has no suffix; posting
        // for it will be skipped until the table knows it.
        let suffix = match self.resolver.resolve_suffix(target) {
            Ok(s) => s,
            Err(e) => {
                error!(target_chat = target.0, op = "set_target", "{e}");
                return Dispatch::Reconfigured {
                    previous,
                    target,
                    suffix: None,
                };
            }
        };

        let name = self
            .resolver
            .group_name(&suffix)
            .unwrap_or_else(|| target.to_string());
        self.reply(msg.chat_id, &format!("{name} is the configured group"))
            .await;

        Dispatch::Reconfigured {
            previous,
            target,
            suffix: Some(suffix),
        }
    }

    async fn handle_auth(&mut self, msg: &IncomingMessage, user: UserId) -> Dispatch {
        let attempt = msg.text.as_deref().unwrap_or("");
        match authenticate(
            &self.gate,
            &mut self.state.authenticated_users,
            user,
            attempt,
        ) {
            AuthOutcome::Accepted => {
                info!(user_id = user.0, "user authenticated");
                self.reply(msg.chat_id, AUTH_OK).await;
                Dispatch::AuthAccepted(user)
            }
            AuthOutcome::Rejected => {
                warn!(user_id = user.0, chat_id = msg.chat_id.0, "authentication failed");
                self.reply(msg.chat_id, AUTH_FAILED).await;
                Dispatch::AuthRejected(user)
            }
        }
    }

    /// Fan one private message out to the forward target and the social account.
    async fn relay(&self, msg: &IncomingMessage) -> Dispatch {
        let target = self.state.forward_target;
        let text = msg.text_payload();

        let outbound = match (self.forward_mode, msg.best_photo()) {
            (ForwardMode::Forward, _) => OutboundMessage::Forward {
                chat_id: target,
                source: msg.message_ref(),
            },
            (ForwardMode::Copy, Some(photo)) => OutboundMessage::Photo {
                chat_id: target,
                file_ref: photo.file_id.clone(),
                caption: msg.caption.clone().unwrap_or_default(),
            },
            (ForwardMode::Copy, None) => OutboundMessage::Text {
                chat_id: target,
                body: text.clone(),
            },
        };

        let kind = outbound.kind();
        let forwarded = match self.chat.send(outbound).await {
            Ok(_) => {
                info!(chat_id = msg.chat_id.0, target_chat = target.0, kind, "forwarded");
                true
            }
            Err(e) => {
                error!(chat_id = msg.chat_id.0, target_chat = target.0, kind, op = "forward", "{e}");
                false
            }
        };

        let posted = self.post(target, &text).await;
        Dispatch::Relayed { forwarded, posted }
    }

    async fn post(&self, target: ChatId, text: &str) -> PostOutcome {
        let (suffix, creds) = match self.resolver.resolve(target) {
            Ok(v) => v,
            Err(e) => {
                error!(target_chat = target.0, op = "post", "skipping post: {e}");
                return PostOutcome::Skipped(e);
            }
        };

        match self.social.post_text(&creds, text).await {
            Ok(receipt) if receipt.is_success() => {
                info!(target_chat = target.0, suffix = %suffix, status = receipt.status, "post published");
                PostOutcome::Posted {
                    status: receipt.status,
                }
            }
            Ok(receipt) => {
                error!(target_chat = target.0, suffix = %suffix, status = receipt.status, op = "post", "post rejected");
                PostOutcome::Rejected {
                    status: receipt.status,
                }
            }
            Err(e) => {
                error!(target_chat = target.0, suffix = %suffix, op = "post", "{e}");
                PostOutcome::Failed(e.to_string())
            }
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        let msg = OutboundMessage::Text {
            chat_id,
            body: text.to_string(),
        };
        if let Err(e) = self.chat.send(msg).await {
            warn!(chat_id = chat_id.0, op = "reply", "{e}");
        }
    }
}
