use std::{env, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZohoError};

/// Redirect URI sent along with refresh requests. Zoho only checks it against
/// the registered client, it is never followed.
pub const DEFAULT_REDIRECT_URI: &str = "https://localhost/";

/// Service prefix used when no API domain is given.
pub const DEFAULT_API_DOMAIN: &str = "accounts.zoho";

/// The credentials needed to talk to Zoho once the initial consent has been
/// granted. The access token is optional, a fresh one is requested with the
/// refresh token whenever it is missing or stale.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tokens {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// When the access token stops being valid. An access token without a
    /// known expiry is treated as already expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

impl Tokens {
    pub fn new<I, S, R>(client_id: I, client_secret: S, refresh_token: R) -> Self
    where
        I: ToString,
        S: ToString,
        R: ToString,
    {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            refresh_token: refresh_token.to_string(),
            access_token: None,
            expires_at: None,
            redirect_uri: default_redirect_uri(),
        }
    }

    pub fn access_token<T>(mut self, token: T) -> Self
    where
        T: ToString,
    {
        self.access_token = Some(token.to_string());
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn redirect_uri<R>(mut self, redirect_uri: R) -> Self
    where
        R: ToString,
    {
        self.redirect_uri = redirect_uri.to_string();
        self
    }

    /// Read the credentials from `ZOHO_CLIENT_ID`, `ZOHO_CLIENT_SECRET` and
    /// `ZOHO_REFRESH_TOKEN`, and optionally `ZOHO_ACCESS_TOKEN` and
    /// `ZOHO_REDIRECT_URI`.
    pub fn from_env() -> Result<Self> {
        let mut tokens = Tokens::new(
            required_var("ZOHO_CLIENT_ID")?,
            required_var("ZOHO_CLIENT_SECRET")?,
            required_var("ZOHO_REFRESH_TOKEN")?,
        );

        if let Some(token) = optional_var("ZOHO_ACCESS_TOKEN") {
            tokens = tokens.access_token(token);
        }
        if let Some(redirect_uri) = optional_var("ZOHO_REDIRECT_URI") {
            tokens = tokens.redirect_uri(redirect_uri);
        }

        Ok(tokens)
    }

    /// Check that every credential needed for a refresh is present.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(ZohoError::MissingCredential("client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(ZohoError::MissingCredential("client_secret"));
        }
        if self.refresh_token.is_empty() {
            return Err(ZohoError::MissingCredential("refresh_token"));
        }

        Ok(())
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("expires_at", &self.expires_at)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

fn required_var(name: &'static str) -> Result<String> {
    optional_var(name).ok_or(ZohoError::MissingCredential(name))
}

pub(crate) fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// The Zoho datacenter an account lives in. Every Zoho service is served
/// from the same domain suffix for a given datacenter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DataCenter {
    Us,
    #[default]
    Eu,
    India,
    Australia,
    Japan,
    Canada,
    China,
    SaudiArabia,
    UnitedKingdom,
    /// Any other suffix, used as given.
    Other(String),
}

impl DataCenter {
    /// The top level domain suffix, e.g. `eu` in `accounts.zoho.eu`.
    pub fn suffix(&self) -> &str {
        match self {
            DataCenter::Us => "com",
            DataCenter::Eu => "eu",
            DataCenter::India => "in",
            DataCenter::Australia => "com.au",
            DataCenter::Japan => "jp",
            DataCenter::Canada => "ca",
            DataCenter::China => "com.cn",
            DataCenter::SaudiArabia => "sa",
            DataCenter::UnitedKingdom => "uk",
            DataCenter::Other(suffix) => suffix,
        }
    }

    /// Base URL of the accounts server that issues tokens for this datacenter.
    pub fn accounts_url(&self) -> String {
        format!("https://{}.{}", DEFAULT_API_DOMAIN, self.suffix())
    }

    /// Base URL for the given service prefix, e.g. `workdrive.zoho`.
    pub fn api_url(&self, domain: &str) -> String {
        format!("https://{}.{}", domain, self.suffix())
    }
}

impl FromStr for DataCenter {
    type Err = ZohoError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().trim_start_matches('.').to_lowercase();

        Ok(match code.as_str() {
            "" => return Err(ZohoError::InvalidDataCenter(s.to_string())),
            "com" | "us" => DataCenter::Us,
            "eu" => DataCenter::Eu,
            "in" => DataCenter::India,
            "au" | "com.au" => DataCenter::Australia,
            "jp" => DataCenter::Japan,
            "ca" => DataCenter::Canada,
            "cn" | "com.cn" => DataCenter::China,
            "sa" => DataCenter::SaudiArabia,
            "uk" => DataCenter::UnitedKingdom,
            other => DataCenter::Other(other.to_string()),
        })
    }
}

impl fmt::Display for DataCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}
