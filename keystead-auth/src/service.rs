//! Session lifecycle orchestration
//!
//! [`AuthService`] owns the live session table. Every mutation holds the
//! table's write lock across both the in-memory change and the awaited
//! persistence call, and restores the previous state if persistence fails.
//! Expiry is lazy: expired sessions are evicted when they are next touched
//! by [`AuthService::validate_token`] or enumerated by
//! [`AuthService::list_sessions`].

use crate::clock::{Clock, SystemClock};
use crate::entropy::{random_hex, EntropySource, OsEntropy, SESSION_ID_BYTES, TOKEN_BYTES};
use crate::errors::{AuthError, AuthResult};
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::sessions::SessionPersistence;
use crate::users::UserStore;
use chrono::Duration;
use keystead_core::{
    AuthConfig, Session, SessionIdFallback, SessionTable, SessionView, User, MAX_SESSION_TTL_SECS,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Attempts at drawing a token or session id not already in the table
const MAX_GENERATION_ATTEMPTS: usize = 4;

pub struct AuthService {
    users: Arc<dyn UserStore>,
    persistence: Arc<dyn SessionPersistence>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
    ttl: Duration,
    session_id_fallback: SessionIdFallback,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    sessions: RwLock<SessionTable>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("backend", &self.persistence.backend())
            .field("hasher", &self.hasher)
            .field("ttl", &self.ttl)
            .field("session_id_fallback", &self.session_id_fallback)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Create a service with an empty session table.
    ///
    /// Call [`AuthService::load_session_state`] to pick up persisted sessions.
    pub fn new(
        users: Arc<dyn UserStore>,
        persistence: Arc<dyn SessionPersistence>,
        config: &AuthConfig,
    ) -> AuthResult<Self> {
        let hasher = PasswordHasher::new(config.password_pepper.clone())
            .ok_or_else(|| AuthError::config("password pepper is required"))?;

        if config.session_ttl_secs == 0 {
            return Err(AuthError::config("session TTL must be greater than 0"));
        }
        if config.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(AuthError::config(format!(
                "session TTL must not exceed {} seconds",
                MAX_SESSION_TTL_SECS
            )));
        }

        if config.uses_default_pepper() {
            warn!("Using the built-in password pepper; set AUTH_PASSWORD_PEPPER in production");
        }
        if config.session_id_fallback == SessionIdFallback::Timestamp {
            warn!("Timestamp session ids are enabled for random source failures");
        }

        Ok(Self {
            users,
            persistence,
            hasher,
            policy: PasswordPolicy::default(),
            ttl: config.session_ttl(),
            session_id_fallback: config.session_id_fallback,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            sessions: RwLock::new(SessionTable::new()),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn session_ttl(&self) -> Duration {
        self.ttl
    }

    pub fn hash_password(&self, password: &str) -> String {
        self.hasher.hash(password)
    }

    pub fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        self.hasher.verify(password, stored_hash)
    }

    /// Authenticate and open a new session.
    ///
    /// Unknown users and wrong passwords both yield
    /// [`AuthError::InvalidCredentials`].
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<Session> {
        let user = match self.users.get_by_username(username).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                // Same hashing cost as a wrong password
                let _ = self.hasher.hash(password);
                debug!(username, "Login for unknown user");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                e.log();
                return Err(e.into());
            }
        };

        if !self.hasher.verify(password, &user.password_hash) {
            debug!(username, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let mut sessions = self.sessions.write().await;

        let token = self.generate_token(&sessions)?;
        let id = self.generate_session_id(&sessions)?;
        let now = self.clock.now();
        let session = Session {
            id,
            token: token.clone(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            roles: user.roles.clone(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        sessions.insert(token.clone(), session.clone());
        if let Err(e) = self.persistence.save(&sessions).await {
            sessions.remove(&token);
            error!(
                backend = self.persistence.backend(),
                username = %user.username,
                error = %e,
                "Failed to persist new session; login rolled back"
            );
            return Err(e.into());
        }

        info!(
            session_id = %session.id,
            username = %session.username,
            expires_at = %session.expires_at,
            "Session created"
        );
        Ok(session)
    }

    /// Resolve a token to its live session, evicting it if expired
    pub async fn validate_token(&self, token: &str) -> AuthResult<Session> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let now = self.clock.now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                None => return Err(AuthError::InvalidToken),
                Some(session) if !session.is_expired(now) => return Ok(session.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock; the entry may have changed meanwhile
        let mut sessions = self.sessions.write().await;
        let expired = match sessions.get(token) {
            None => return Err(AuthError::InvalidToken),
            Some(session) if !session.is_expired(now) => return Ok(session.clone()),
            Some(session) => session.id.clone(),
        };

        sessions.remove(token);
        debug!(session_id = %expired, "Evicted expired session");
        self.persist_best_effort(&sessions, "validate_token").await;

        Err(AuthError::InvalidToken)
    }

    /// Validate the token and require `role` in its session snapshot
    pub async fn authorize(&self, token: &str, role: &str) -> AuthResult<Session> {
        let session = self.validate_token(token).await?;
        if !session.has_role(role) {
            debug!(session_id = %session.id, role, "Session lacks required role");
            return Err(AuthError::Forbidden {
                role: role.to_string(),
            });
        }
        Ok(session)
    }

    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        self.remove_session("logout", |sessions| {
            sessions.contains_key(token).then(|| token.to_string())
        })
        .await
    }

    pub async fn revoke_token(&self, token: &str) -> AuthResult<()> {
        self.remove_session("revoke_token", |sessions| {
            sessions.contains_key(token).then(|| token.to_string())
        })
        .await
    }

    /// Revoke the session with this id; unknown ids yield [`AuthError::InvalidToken`]
    pub async fn revoke_session_by_id(&self, session_id: &str) -> AuthResult<()> {
        self.remove_session("revoke_session_by_id", |sessions| {
            sessions
                .iter()
                .find(|(_, session)| session.id == session_id)
                .map(|(token, _)| token.clone())
        })
        .await
    }

    /// Replace the password of the session's user.
    ///
    /// The new password is checked against the policy before anything else.
    /// Other sessions of the same user stay valid.
    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        self.policy
            .validate(new_password)
            .map_err(AuthError::WeakPassword)?;

        let session = self.validate_token(token).await?;

        let mut user = match self.users.get_by_username(&session.username).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(current_password, &user.password_hash) {
            debug!(session_id = %session.id, "Password change with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }

        user.password_hash = self.hasher.hash(new_password);
        self.users.put(&user).await?;

        info!(username = %user.username, "Password changed");
        Ok(())
    }

    /// Live sessions ordered by creation time; expired entries are evicted
    pub async fn list_sessions(&self) -> Vec<Session> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        let evicted = before - sessions.len();

        if evicted > 0 {
            debug!(evicted, "Evicted expired sessions");
            self.persist_best_effort(&sessions, "list_sessions").await;
        }

        let mut live: Vec<Session> = sessions.values().cloned().collect();
        live.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        live
    }

    pub async fn list_session_views(&self) -> Vec<SessionView> {
        self.list_sessions()
            .await
            .iter()
            .map(SessionView::from)
            .collect()
    }

    /// Sessions currently held in memory, expired or not
    pub async fn active_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Replace the session table with the persisted snapshot
    pub async fn load_session_state(&self) -> AuthResult<usize> {
        let loaded = self.persistence.load().await?;
        let count = loaded.len();

        *self.sessions.write().await = loaded;

        info!(
            backend = self.persistence.backend(),
            sessions = count,
            "Loaded session state"
        );
        Ok(count)
    }

    /// Create `username` if absent; returns whether it was created.
    ///
    /// The password is not held to the change policy, but a weak one is
    /// reported.
    pub async fn ensure_user(
        &self,
        username: &str,
        password: &str,
        roles: &[String],
    ) -> AuthResult<bool> {
        match self.users.get_by_username(username).await {
            Ok(_) => {
                debug!(username, "User already present");
                return Ok(false);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        if let Err(violation) = self.policy.validate(password) {
            warn!(username, %violation, "Bootstrap password does not meet password policy");
        }

        let user = User {
            id: format!("bootstrap-{}", username),
            username: username.to_string(),
            password_hash: self.hasher.hash(password),
            roles: roles.to_vec(),
        };
        self.users.put(&user).await?;

        info!(username, roles = ?user.roles, "Created user");
        Ok(true)
    }

    /// Remove the entry chosen by `find`, persist, and restore it on failure
    async fn remove_session<F>(&self, operation: &str, find: F) -> AuthResult<()>
    where
        F: FnOnce(&SessionTable) -> Option<String>,
    {
        let mut sessions = self.sessions.write().await;

        let token = find(&*sessions).ok_or(AuthError::InvalidToken)?;
        let removed = sessions
            .remove(&token)
            .ok_or(AuthError::InvalidToken)?;

        if let Err(e) = self.persistence.save(&sessions).await {
            error!(
                operation,
                backend = self.persistence.backend(),
                session_id = %removed.id,
                error = %e,
                "Failed to persist session removal; rolled back"
            );
            sessions.insert(token, removed);
            return Err(e.into());
        }

        info!(operation, session_id = %removed.id, username = %removed.username, "Session ended");
        Ok(())
    }

    async fn persist_best_effort(&self, sessions: &SessionTable, operation: &str) {
        if let Err(e) = self.persistence.save(sessions).await {
            warn!(
                operation,
                backend = self.persistence.backend(),
                error = %e,
                "Failed to persist session eviction"
            );
        }
    }

    fn generate_token(&self, sessions: &SessionTable) -> AuthResult<String> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let token = random_hex(self.entropy.as_ref(), TOKEN_BYTES).map_err(|e| {
                error!(error = %e, "Random source failed while generating session token");
                AuthError::Entropy {
                    message: format!("generate token: {}", e),
                }
            })?;
            if !sessions.contains_key(&token) {
                return Ok(token);
            }
            warn!("Generated session token collided with a live session");
        }

        Err(AuthError::Entropy {
            message: "could not generate a unique session token".to_string(),
        })
    }

    fn generate_session_id(&self, sessions: &SessionTable) -> AuthResult<String> {
        let id_taken = |id: &str| sessions.values().any(|s| s.id == id);

        for attempt in 0..MAX_GENERATION_ATTEMPTS {
            let id = match random_hex(self.entropy.as_ref(), SESSION_ID_BYTES) {
                Ok(id) => id,
                Err(e) => match self.session_id_fallback {
                    SessionIdFallback::Reject => {
                        error!(error = %e, "Random source failed while generating session id");
                        return Err(AuthError::Entropy {
                            message: format!("generate session id: {}", e),
                        });
                    }
                    SessionIdFallback::Timestamp => {
                        warn!(error = %e, "Random source failed; using timestamp session id");
                        self.timestamp_session_id(attempt)
                    }
                },
            };

            if !id_taken(&id) {
                return Ok(id);
            }
            warn!("Generated session id collided with a live session");
        }

        Err(AuthError::Entropy {
            message: "could not generate a unique session id".to_string(),
        })
    }

    fn timestamp_session_id(&self, attempt: usize) -> String {
        let nanos = self.clock.now().timestamp_nanos_opt().unwrap_or_default();
        if attempt == 0 {
            format!("sid-{}", nanos)
        } else {
            format!("sid-{}-{}", nanos, attempt)
        }
    }
}
