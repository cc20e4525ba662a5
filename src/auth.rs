//! Authentication service: credential checks, registration and token issuance.
//!
//! Every call is independent. Concurrent calls on the same email or app name
//! are arbitrated by the stores' uniqueness guarantees, not by locks here.
//! Dropping a returned future abandons any in-flight store round trip; a write
//! the store already committed stays committed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::crypto::{self, TokenIssuer, hash_password, verify_dummy, verify_password};
use crate::storage::{AppStore, StorageError, UserStore, normalize_email};
use crate::{Error, Result};

/// Settings the auth service needs from configuration.
#[derive(Clone, Debug)]
pub struct AuthSettings {
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
    /// Key required to register apps. Empty disables app registration.
    pub admin_key: String,
    /// Upper bound on password hash/verify calls running at once. Each one
    /// holds the full Argon2 memory cost while it runs.
    pub max_concurrent_hashes: usize,
}

/// Orchestrates the stores, the credential hasher and the token issuer.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    apps: Arc<dyn AppStore>,
    issuer: TokenIssuer,
    admin_key: Arc<str>,
    hash_permits: Arc<Semaphore>,
}

impl AuthService {
    /// Creates a service over the given stores.
    pub fn new(
        users: Arc<dyn UserStore>,
        apps: Arc<dyn AppStore>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            apps,
            issuer: TokenIssuer::new(settings.token_ttl),
            admin_key: settings.admin_key.into(),
            hash_permits: Arc::new(Semaphore::new(settings.max_concurrent_hashes.max(1))),
        }
    }

    /// Token lifetime used by [`AuthService::login`].
    pub fn token_ttl(&self) -> Duration {
        self.issuer.ttl()
    }

    /// Checks `email`/`password` and issues a token for the app `app_id`.
    ///
    /// An unknown email and a wrong password both return
    /// [`Error::InvalidCredentials`] and cost one password verification each.
    /// An unknown app returns [`Error::InvalidData`].
    #[instrument(name = "service.auth.login", skip_all, fields(email = %email, app_id = %app_id))]
    pub async fn login(&self, email: &str, password: &str, app_id: &str) -> Result<String> {
        const OP: &str = "service.auth.login";

        info!("attempting to log in user");

        let app_id = parse_id(OP, app_id)?;

        let user = match self.users.get(email).await {
            Ok(user) => user,
            Err(StorageError::UserNotFound { .. }) => {
                warn!("user not found");
                let password = password.to_owned();
                self.run_blocking(OP, move || verify_dummy(&password)).await?;
                return Err(Error::InvalidCredentials);
            }
            Err(e) => {
                error!(error = %e, "failed to get user");
                return Err(Error::internal(OP, e));
            }
        };

        let hash = user.password_hash.clone();
        let password = password.to_owned();
        match self
            .run_blocking(OP, move || verify_password(&hash, &password))
            .await?
        {
            Ok(true) => {}
            Ok(false) => {
                info!("invalid credentials");
                return Err(Error::InvalidCredentials);
            }
            Err(e) => {
                error!(error = %e, user_id = %user.id, "stored password hash is unusable");
                return Err(Error::internal(OP, e));
            }
        }

        let app = match self.apps.get(app_id).await {
            Ok(app) => app,
            Err(StorageError::AppNotFound { .. }) => {
                warn!("app not found");
                return Err(Error::InvalidData);
            }
            Err(e) => {
                error!(error = %e, "failed to get app");
                return Err(Error::internal(OP, e));
            }
        };

        let token = self.issuer.issue(&user, &app).map_err(|e| {
            error!(error = %e, "failed to generate token");
            Error::internal(OP, e)
        })?;

        info!(user_id = %user.id, "user logged in");

        Ok(token)
    }

    /// Registers a user and returns its id.
    ///
    /// A taken email returns [`Error::AlreadyExists`].
    #[instrument(name = "service.auth.register_new_user", skip_all, fields(email = %email))]
    pub async fn register_new_user(&self, email: &str, password: &str) -> Result<String> {
        const OP: &str = "service.auth.register_new_user";

        info!("attempting to register new user");

        if normalize_email(email).is_empty() {
            return Err(Error::InvalidInput("email is required".to_string()));
        }
        if password.is_empty() {
            return Err(Error::InvalidInput("password is required".to_string()));
        }

        let password = password.to_owned();
        let hash = self
            .run_blocking(OP, move || hash_password(&password))
            .await?
            .map_err(|e| {
                error!(error = %e, "failed to generate password hash");
                Error::internal(OP, e)
            })?;

        let id = match self.users.save(email, &hash).await {
            Ok(id) => id,
            Err(StorageError::UserExists { .. }) => {
                warn!("user already exists");
                return Err(Error::AlreadyExists);
            }
            Err(e) => {
                error!(error = %e, "failed to save user");
                return Err(Error::internal(OP, e));
            }
        };

        info!(user_id = %id, "user registered");

        Ok(id.to_string())
    }

    /// Registers a calling application and returns its id.
    ///
    /// `admin_key` must match the configured administrative key, otherwise
    /// nothing is written and [`Error::PermissionDenied`] is returned. A taken
    /// name returns [`Error::InvalidData`].
    #[instrument(name = "service.auth.register_new_app", skip_all, fields(name = %name))]
    pub async fn register_new_app(
        &self,
        name: &str,
        secret: &str,
        admin_key: &str,
    ) -> Result<String> {
        const OP: &str = "service.auth.register_new_app";

        info!("attempting to register app");

        let name = name.trim();

        if !crypto::keys_match(admin_key, &self.admin_key) {
            warn!("admin key rejected");
            return Err(Error::PermissionDenied);
        }

        if name.is_empty() {
            return Err(Error::InvalidInput("name is required".to_string()));
        }
        if secret.is_empty() {
            return Err(Error::InvalidInput("secret is required".to_string()));
        }

        let id = match self.apps.save(name, secret).await {
            Ok(id) => id,
            Err(StorageError::AppExists { .. }) => {
                warn!("app already exists");
                return Err(Error::InvalidData);
            }
            Err(e) => {
                error!(error = %e, "failed to save app");
                return Err(Error::internal(OP, e));
            }
        };

        info!(app_id = %id, "app registered");

        Ok(id.to_string())
    }

    /// Deletes an application. An unknown id returns [`Error::NotFound`].
    #[instrument(name = "service.auth.delete_app", skip_all, fields(app_id = %app_id))]
    pub async fn delete_app(&self, app_id: &str) -> Result<()> {
        const OP: &str = "service.auth.delete_app";

        info!("attempting to delete app");

        let id = parse_id(OP, app_id)?;

        match self.apps.delete(id).await {
            Ok(()) => {
                info!("app deleted");
                Ok(())
            }
            Err(StorageError::AppNotFound { .. }) => {
                warn!("app not found");
                Err(Error::NotFound)
            }
            Err(e) => {
                error!(error = %e, "failed to delete app");
                Err(Error::internal(OP, e))
            }
        }
    }

    /// Runs CPU-bound hashing off the async worker threads, at most
    /// `max_concurrent_hashes` at a time. The permit moves into the blocking
    /// task, so a dropped caller still holds its slot until the hash finishes.
    async fn run_blocking<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.hash_permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::internal(op, e))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| Error::internal(op, e))
    }
}

/// A malformed app id is a system fault, not a caller error.
fn parse_id(op: &'static str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|e| {
        warn!("malformed app id");
        Error::internal(op, e)
    })
}
