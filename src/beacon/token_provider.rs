use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    /// The token endpoint answered with an `error` payload.
    #[error("Token request rejected: {description}")]
    Rejected { description: String },

    /// The endpoint answered successfully but without the expected field.
    #[error("Token response missing field: {0}")]
    MissingField(&'static str),

    #[error("Token endpoint transport error: {0}")]
    Transport(String),

    /// Silent or interactive acquisition was requested from a provider that only
    /// implements the wire exchange.
    #[error("Interactive token acquisition is not available: {0}")]
    InteractiveUnsupported(String),
}

impl From<reqwest::Error> for TokenError {
    fn from(err: reqwest::Error) -> Self {
        TokenError::Transport(err.to_string())
    }
}

/// Resolves bearer tokens for accounts.
///
/// Consumer accounts exchange a stored refresh token; Workplace accounts go
/// through a silent flow with an interactive fallback. Both ends of that split
/// live behind this trait so the account lifecycle never touches the wire.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchanges a refresh token for an access token covering `scopes`.
    /// Single attempt; failure propagates.
    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<String, TokenError>;

    /// Redeems an authorization code (PKCE) for a refresh token.
    async fn exchange_auth_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<String, TokenError>;

    /// Attempts token acquisition without user interaction.
    async fn acquire_token_silent(
        &self,
        account_id: &str,
        scope: &str,
    ) -> Result<String, TokenError>;

    /// Acquires a token with user interaction. Failure here is fatal for the
    /// request that triggered it.
    async fn acquire_token_interactive(
        &self,
        account_id: &str,
        scope: &str,
    ) -> Result<String, TokenError>;
}

/// OAuth endpoint configuration for [`HttpTokenProvider`].
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub token_url: String,
}

/// Token provider backed by a form-encoded OAuth token endpoint.
///
/// Handles the refresh-token and auth-code exchanges. The silent/interactive
/// flows need a platform identity broker and are not available here; embedders
/// with Workplace accounts supply their own [`TokenProvider`].
pub struct HttpTokenProvider {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl HttpTokenProvider {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, TokenError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;
        let body = response.text().await?;
        parse_token_response(&body)
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<String, TokenError> {
        let scope = scopes.join(" ");
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];

        let data = self.request_token(&form).await?;
        data.get("access_token")
            .cloned()
            .ok_or(TokenError::MissingField("access_token"))
    }

    async fn exchange_auth_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<String, TokenError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
        ];

        let data = self.request_token(&form).await?;
        data.get("refresh_token")
            .cloned()
            .ok_or(TokenError::MissingField("refresh_token"))
    }

    async fn acquire_token_silent(
        &self,
        account_id: &str,
        _scope: &str,
    ) -> Result<String, TokenError> {
        Err(TokenError::InteractiveUnsupported(format!(
            "no identity broker configured for account {}",
            account_id
        )))
    }

    async fn acquire_token_interactive(
        &self,
        account_id: &str,
        _scope: &str,
    ) -> Result<String, TokenError> {
        Err(TokenError::InteractiveUnsupported(format!(
            "no identity broker configured for account {}",
            account_id
        )))
    }
}

/// Parses a token endpoint response body, which may be JSON or form-encoded.
/// An `error` key means the request was rejected; the `error_description` is
/// surfaced when present.
fn parse_token_response(body: &str) -> Result<HashMap<String, String>, TokenError> {
    let data: HashMap<String, String> = if body.trim_start().starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| TokenError::Transport(format!("malformed JSON token response: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| TokenError::Transport("token response is not an object".to_string()))?;
        object
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect()
    } else {
        url::form_urlencoded::parse(body.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    };

    if data.contains_key("error") {
        let description = data
            .get("error_description")
            .or_else(|| data.get("error"))
            .cloned()
            .unwrap_or_default();
        return Err(TokenError::Rejected { description });
    }

    Ok(data)
}
