//! # JWT Authentication
//!
//! HS256 bearer tokens carrying the dashboard principal. The middleware
//! only *extracts* the principal; whether one is required is the apply
//! pipeline's first gate, so unauthenticated requests still reach handlers
//! and fail there with the contract's status code.

use crate::config::AuthConfig;
use axum::http::HeaderValue;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// JWT authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("JWT processing error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid authorization header format")]
    InvalidAuthFormat,
}

/// JWT claims for dashboard principals.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiClaims {
    /// Subject (principal identifier)
    pub sub: String,
    /// Principal email, the identity approvals must match
    pub email: String,
    /// Granted roles
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// The authenticated caller as the gate chain sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPrincipal {
    pub subject: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthPrincipal {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin")
    }

    /// The identity an approval attestation must case-exactly match.
    pub fn identity(&self) -> &str {
        &self.email
    }
}

impl From<ApiClaims> for AuthPrincipal {
    fn from(claims: ApiClaims) -> Self {
        Self {
            subject: claims.sub,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

/// What the extraction middleware learned about the caller. Inserted into
/// request extensions on every request, present or not, so handlers always
/// find it; `None` means the authentication gate will reject.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Option<AuthPrincipal>);

/// HS256 authenticator for the dashboard API.
#[derive(Clone)]
pub struct JwtAuthenticator {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtAuthenticator {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.enabled && config.jwt_secret.is_empty() {
            return Err(AuthError::ConfigurationError(
                "JWT secret not configured".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            config: config.clone(),
        })
    }

    /// Validate a token and return its claims.
    pub fn validate_token(&self, token: &str) -> Result<ApiClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.jwt_issuer]);
        validation.set_audience(&[&self.config.jwt_audience]);
        validation.validate_exp = true;

        let token_data = decode::<ApiClaims>(token, &self.decoding_key, &validation).map_err(
            |e| {
                warn!(error = %e, "JWT token validation failed");
                AuthError::JwtError(e)
            },
        )?;

        debug!(
            principal = %token_data.claims.sub,
            roles = ?token_data.claims.roles,
            "Token validated"
        );
        Ok(token_data.claims)
    }

    /// Generate a token for a principal.
    pub fn generate_token(
        &self,
        subject: &str,
        email: &str,
        roles: Vec<String>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let expiry = now + Duration::hours(self.config.token_expiry_hours as i64);

        let claims = ApiClaims {
            sub: subject.to_string(),
            email: email.to_string(),
            roles,
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Extract bearer token from an Authorization header.
    pub fn extract_bearer_token(auth_header: &HeaderValue) -> Result<&str, AuthError> {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthFormat)?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AuthError::InvalidAuthFormat);
        }

        let token = &auth_str[7..];
        if token.is_empty() {
            return Err(AuthError::InvalidAuthFormat);
        }
        Ok(token)
    }
}
