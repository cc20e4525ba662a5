use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use super::CryptoError;
use crate::storage::{App, User};

/// Payload carried by an issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier.
    pub sub: String,
    /// User email at issue time.
    pub email: String,
    /// Application the token was issued for.
    pub app_id: String,
    /// Issued at (Unix timestamp).
    pub iat: u64,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
}

/// Issues HS256 tokens signed with the calling application's secret.
///
/// Tokens are stateless: any service holding the app secret can verify them,
/// and nothing is recorded here.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    ttl: Duration,
}

impl TokenIssuer {
    /// Creates an issuer producing tokens valid for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `user`, scoped to and signed for `app`.
    pub fn issue(&self, user: &User, app: &App) -> Result<String, CryptoError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CryptoError::Clock(e.to_string()))?
            .as_secs();

        self.issue_at(user, app, now)
    }

    /// Issues a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(&self, user: &User, app: &App, now: u64) -> Result<String, CryptoError> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            app_id: app.id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(app.secret.as_bytes()),
        )?;

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use uuid::Uuid;

    use super::*;
    use crate::crypto::HashedPassword;

    fn fixtures() -> (User, App) {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password_hash: HashedPassword::from_phc("$argon2id$stub"),
            salt: "user-salt".to_string(),
        };
        let app = App {
            id: Uuid::new_v4(),
            name: "billing".to_string(),
            secret: "billing-app-secret".to_string(),
        };
        (user, app)
    }

    #[test]
    fn token_carries_identity_and_expiry() {
        let (user, app) = fixtures();
        let issuer = TokenIssuer::new(Duration::from_secs(3600));

        let token = issuer.issue(&user, &app).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(app.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(data.claims.sub, user.id.to_string());
        assert_eq!(data.claims.email, "a@b.com");
        assert_eq!(data.claims.app_id, app.id.to_string());
        assert_eq!(data.claims.exp, data.claims.iat + 3600);
    }

    #[test]
    fn token_is_not_verifiable_with_other_secret() {
        let (user, app) = fixtures();
        let token = TokenIssuer::new(Duration::from_secs(60))
            .issue(&user, &app)
            .unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(user.salt.as_bytes()),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }

    #[test]
    fn issue_at_is_deterministic() {
        let (user, app) = fixtures();
        let issuer = TokenIssuer::new(Duration::from_secs(60));

        let first = issuer.issue_at(&user, &app, 1_700_000_000).unwrap();
        let second = issuer.issue_at(&user, &app, 1_700_000_000).unwrap();
        assert_eq!(first, second);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = decode::<Claims>(
            &first,
            &DecodingKey::from_secret(app.secret.as_bytes()),
            &validation,
        )
        .unwrap();
        assert_eq!(data.claims.iat, 1_700_000_000);
        assert_eq!(data.claims.exp, 1_700_000_060);
    }
}
