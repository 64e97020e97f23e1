use std::collections::HashSet;

use crate::domain::UserId;

// ============== Authentication ==============

/// Shared-secret gate in front of private-chat relaying.
///
/// With no secret configured the gate is disabled and every sender counts as
/// authenticated.
#[derive(Clone, Debug, Default)]
pub struct AuthGate {
    secret: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    Rejected,
}

impl AuthGate {
    pub fn new(secret: Option<String>) -> Self {
        let secret = secret
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self { secret }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Exact, case-sensitive match after trimming surrounding whitespace.
    pub fn verify(&self, attempt: &str) -> bool {
        match &self.secret {
            Some(secret) => attempt.trim() == secret,
            None => true,
        }
    }
}

/// Users that passed the gate during this run. Membership is one-way.
#[derive(Clone, Debug, Default)]
pub struct AuthenticatedUsers {
    users: HashSet<UserId>,
}

impl AuthenticatedUsers {
    pub fn new(seed: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            users: seed.into_iter().collect(),
        }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.users.contains(&user_id)
    }

    pub fn insert(&mut self, user_id: UserId) {
        self.users.insert(user_id);
    }
}

/// Run one authentication attempt, recording the sender on success.
pub fn authenticate(
    gate: &AuthGate,
    users: &mut AuthenticatedUsers,
    user_id: UserId,
    attempt: &str,
) -> AuthOutcome {
    if !gate.verify(attempt) {
        return AuthOutcome::Rejected;
    }
    users.insert(user_id);
    AuthOutcome::Accepted
}
