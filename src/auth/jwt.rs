//! # JWT Identity Tokens
//!
//! Bearer tokens issued by the identity provider. Validation is stateless:
//! the claims alone give the acting [`Identity`].

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};
use super::identity::{Identity, Role};

/// JWT claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Dashboard role ("admin" or "client")
    pub role: String,

    /// Project scope of the subject
    #[serde(default)]
    pub projects: Vec<String>,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,

    pub aud: String,

    pub iss: String,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,

    /// Lifetime of tokens minted by [`JwtManager::issue_token`]
    pub token_ttl: Duration,

    pub issuer: String,

    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string(),
            token_ttl: Duration::hours(1),
            issuer: "sitevault".to_string(),
            audience: "sitevault".to_string(),
        }
    }
}

/// JWT manager for token validation (and minting, for development and tests)
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Mint a token for the given identity
    pub fn issue_token(&self, identity: &Identity) -> AuthResult<String> {
        let now = Utc::now();
        let exp = now + self.config.token_ttl;

        let claims = JwtClaims {
            sub: identity.id.clone(),
            role: identity.role.as_str().to_string(),
            projects: identity.project_ids.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Validate a token and extract claims
    pub fn validate_token(&self, token: &str) -> AuthResult<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);

        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::MalformedToken,
                }
            })?;

        Ok(token_data.claims)
    }

    /// Validate a token and build the acting identity from its claims
    pub fn identity_from_token(&self, token: &str) -> AuthResult<Identity> {
        let claims = self.validate_token(token)?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::MalformedToken);
        }
        let role: Role = claims.role.parse()?;

        Ok(Identity {
            id: claims.sub,
            role,
            project_ids: claims.projects,
        })
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> AuthResult<&str> {
    let token = header_value
        .strip_prefix("Bearer ")
        .or_else(|| header_value.strip_prefix("bearer "))
        .ok_or(AuthError::MalformedToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::AuthenticationRequired);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_manager() -> JwtManager {
        JwtManager::new(JwtConfig {
            secret: "test_secret_key_for_testing_only".to_string(),
            token_ttl: Duration::minutes(15),
            issuer: "test".to_string(),
            audience: "test".to_string(),
        })
    }

    #[test]
    fn test_round_trip_identity() {
        let manager = create_test_manager();
        let identity = Identity::client("u1").with_projects(["p1"]);

        let token = manager.issue_token(&identity).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let resolved = manager.identity_from_token(&token).unwrap();
        assert_eq!(resolved, identity);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let manager1 = JwtManager::new(JwtConfig {
            secret: "secret_one".to_string(),
            ..JwtConfig::default()
        });
        let manager2 = JwtManager::new(JwtConfig {
            secret: "secret_two".to_string(),
            ..JwtConfig::default()
        });

        let token = manager1.issue_token(&Identity::admin("a")).unwrap();
        let result = manager2.validate_token(&token);
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let secret = "test_secret";
        let now = Utc::now();
        let claims = JwtClaims {
            sub: "u1".to_string(),
            role: "client".to_string(),
            projects: vec![],
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
            aud: "test".to_string(),
            iss: "test".to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let manager = JwtManager::new(JwtConfig {
            secret: secret.to_string(),
            token_ttl: Duration::minutes(15),
            issuer: "test".to_string(),
            audience: "test".to_string(),
        });

        assert!(matches!(
            manager.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let manager = create_test_manager();
        let now = Utc::now();
        let claims = JwtClaims {
            sub: "u1".to_string(),
            role: "superuser".to_string(),
            projects: vec![],
            iat: now.timestamp(),
            exp: (now + Duration::minutes(5)).timestamp(),
            aud: "test".to_string(),
            iss: "test".to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test_secret_key_for_testing_only".as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            manager.identity_from_token(&token),
            Err(AuthError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(matches!(bearer_token("Basic xyz"), Err(AuthError::MalformedToken)));
        assert!(matches!(
            bearer_token("Bearer   "),
            Err(AuthError::AuthenticationRequired)
        ));
    }
}
