use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use system::UserId;

/// What the token verifier vouches for. Bound to a connection for its
/// entire lifetime; there is no re-authentication mid-connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("expired token")]
    ExpiredToken,
}

/// Boundary to the external token-verification service. Called exactly
/// once per connection attempt, before any session state is touched.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Shared-secret stand-in with the same contract shape as a real
/// verifier. Token format: `<secret>:<user_id>:<username>[:<exp_unix>]`.
pub struct StaticSecretVerifier {
    secret: String,
}

impl StaticSecretVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl TokenVerifier for StaticSecretVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let mut parts = token.splitn(4, ':');
        let secret = parts.next().unwrap_or_default();
        let user_id = parts.next().ok_or(AuthError::InvalidToken)?;
        let username = parts.next().ok_or(AuthError::InvalidToken)?;
        if secret != self.secret || user_id.is_empty() || username.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        if let Some(exp) = parts.next() {
            let exp: u64 = exp.parse().map_err(|_| AuthError::InvalidToken)?;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            if exp < now {
                return Err(AuthError::ExpiredToken);
            }
        }
        Ok(Identity {
            user_id: user_id.into(),
            username: username.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_token() {
        let verifier = StaticSecretVerifier::new("sekrit");
        let identity = verifier.verify("sekrit:u1:ann").unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.username, "ann");
    }

    #[test]
    fn rejects_wrong_secret_and_short_tokens() {
        let verifier = StaticSecretVerifier::new("sekrit");
        assert_eq!(
            verifier.verify("nope:u1:ann"),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(verifier.verify("sekrit:u1"), Err(AuthError::InvalidToken));
        assert_eq!(verifier.verify(""), Err(AuthError::InvalidToken));
    }

    #[test]
    fn honors_expiry() {
        let verifier = StaticSecretVerifier::new("sekrit");
        assert_eq!(
            verifier.verify("sekrit:u1:ann:1"),
            Err(AuthError::ExpiredToken)
        );
        let far_future = u64::MAX;
        let token = format!("sekrit:u1:ann:{}", far_future);
        assert!(verifier.verify(&token).is_ok());
    }
}
