use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The body Zoho returns from `/oauth/v2/token`. On failure Zoho still
/// answers with JSON, carrying only an `error` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Seconds until the access token expires.
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The access token currently held by a client and when it runs out.
#[derive(Clone, Default)]
pub struct TokenState {
    access_token: Option<String>,
    expires_in: Option<i64>,
    expires_time: Option<DateTime<Utc>>,
}

impl TokenState {
    pub fn new(access_token: Option<String>, expires_time: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token,
            expires_in: None,
            expires_time,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }

    pub fn expires_time(&self) -> Option<DateTime<Utc>> {
        self.expires_time
    }

    /// Returns if the token is expired at the given instant. Set to being
    /// expired if we don't know the date.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_time {
            Some(expires_time) => now > expires_time,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A new token has to be fetched before making a request.
    pub fn needs_refresh(&self) -> bool {
        self.is_expired() || self.access_token.as_deref().map_or(true, str::is_empty)
    }

    /// Save the token from a refresh response, issued at `now`. Returns false,
    /// leaving the current state alone, when the response holds no token.
    pub fn store(&mut self, token: &AccessToken, now: DateTime<Utc>) -> bool {
        let access_token = match &token.access_token {
            Some(access_token) if !access_token.is_empty() => access_token,
            _ => return false,
        };

        self.access_token = Some(access_token.clone());
        self.expires_in = Some(token.expires_in);
        // An expiry past what chrono can represent is treated as already due.
        self.expires_time = Duration::try_seconds(token.expires_in)
            .and_then(|expires_in| now.checked_add_signed(expires_in))
            .or(Some(now));

        true
    }

    /// Add the `Authorization: Bearer` header to the given headers, keeping
    /// everything else that was set.
    pub fn authorize_header(&self, mut headers: HeaderMap) -> Result<HeaderMap> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token.as_deref().unwrap_or_default()))?;
        headers.insert(AUTHORIZATION, bearer);

        Ok(headers)
    }
}

impl std::fmt::Debug for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("expires_in", &self.expires_in)
            .field("expires_time", &self.expires_time)
            .finish()
    }
}
