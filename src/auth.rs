//! OAuth2 service account authentication for the Analytics Data API.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::credentials::ServiceAccountCredential;
use crate::error::AuthError;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Claims of the self-signed JWT exchanged for an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// OAuth2 token response from Google.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
}

/// Short-lived bearer token for one request.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Authorization header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Build the signed RS256 assertion for a credential.
pub fn sign_assertion(credential: &ServiceAccountCredential) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = AssertionClaims {
        iss: credential.client_email.clone(),
        scope: credential.scope.to_string(),
        aud: credential.token_uri.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
    };

    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        credential.signing_key(),
    )?)
}

/// OAuth2 client for the service account JWT-bearer flow.
///
/// Holds no token cache: every request signs a new assertion and exchanges it.
#[derive(Clone)]
pub struct OAuth2Client {
    http_client: Client,
}

impl OAuth2Client {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Exchange a credential for a bearer token.
    pub async fn fetch_token(
        &self,
        credential: &ServiceAccountCredential,
    ) -> Result<AccessToken, AuthError> {
        let assertion = sign_assertion(credential)?;

        tracing::debug!(token_url = %credential.token_uri, "fetching access token");

        let response = self
            .http_client
            .post(&credential.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "token request failed");
            return Err(AuthError::TokenRequestFailed { status, body });
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::TokenParse(format!("Failed to parse token response: {}", e))
        })?;

        if token_response.access_token.is_empty() {
            return Err(AuthError::TokenParse("empty access_token".to_string()));
        }

        tracing::debug!(
            expires_in = token_response.expires_in,
            "access token acquired"
        );

        Ok(AccessToken::new(token_response.access_token))
    }
}

impl std::fmt::Debug for OAuth2Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Client").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use jsonwebtoken::{decode_header, DecodingKey, Validation};

    const TEST_KEY: &str = include_str!("../tests/fixtures/service_account_key.pem");

    fn credential() -> ServiceAccountCredential {
        let config = Config {
            service_account_email: Some("reporter@project.iam.gserviceaccount.com".into()),
            private_key: Some(TEST_KEY.to_string()),
            property_id: Some("1".into()),
            ..Config::default()
        };
        ServiceAccountCredential::resolve(&config).unwrap()
    }

    #[test]
    fn test_assertion_header_and_claims() {
        let token = sign_assertion(&credential()).unwrap();
        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);

        // Signature is checked by the provider; here only the claims matter.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.set_audience(&[crate::config::DEFAULT_TOKEN_URL]);
        let data = jsonwebtoken::decode::<AssertionClaims>(
            &token,
            &DecodingKey::from_secret(b"unused"),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims.iss, "reporter@project.iam.gserviceaccount.com");
        assert_eq!(data.claims.scope, crate::config::ANALYTICS_READONLY_SCOPE);
        assert_eq!(data.claims.exp - data.claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("ya29.secret");
        assert_eq!(format!("{:?}", token), "AccessToken(<redacted>)");
        assert_eq!(token.bearer(), "Bearer ya29.secret");
    }
}
