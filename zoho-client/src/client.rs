use std::sync::Arc;

use chrono::Utc;
use reqwest::{
    header::{self, HeaderMap},
    Client, Url,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::{optional_var, DataCenter, Tokens, DEFAULT_API_DOMAIN},
    error::{Result, ZohoError},
    query::{Query, RequestKind},
    token::{AccessToken, TokenState},
};

/// Path of the token endpoint on the accounts server.
const TOKEN_PATH: &str = "/oauth/v2/token";

/// Endpoint probed by [`ZohoClient::test_token`]. Every Zoho API puts its
/// "current user" resource somewhere else, this is where WorkDrive has it.
const USER_PROBE_PATH: &str = "/api/v1/users/me";

/// The `id` WorkDrive answers with when the bearer token is invalid or expired.
pub const WORKDRIVE_INVALID_TOKEN: &str = "F7003";

/// Entrypoint for interacting with a Zoho API. This does not do the initial
/// authorization, it needs the refresh token handed out once consent has
/// been granted.
pub struct ZohoClient {
    tokens: Tokens,
    state: TokenState,
    endpoint: String,
    accounts_endpoint: String,
    rejection_sentinels: Vec<String>,

    client: Arc<Client>,
}

impl ZohoClient {
    /// Create a new client for the given service prefix (e.g. `workdrive.zoho`,
    /// `sheet.zoho`) in the given datacenter.
    pub fn new<D>(tokens: Tokens, domain: D, dc: DataCenter) -> Result<Self>
    where
        D: AsRef<str>,
    {
        tokens.validate()?;

        let client = Client::builder().build()?;
        let state = TokenState::new(tokens.access_token.clone(), tokens.expires_at);

        Ok(Self {
            endpoint: dc.api_url(domain.as_ref()),
            accounts_endpoint: dc.accounts_url(),
            tokens,
            state,
            rejection_sentinels: vec![WORKDRIVE_INVALID_TOKEN.to_string()],

            client: Arc::new(client),
        })
    }

    /// Create a new client from environment variables. On top of the
    /// variables read by [`Tokens::from_env`], `ZOHO_API_DOMAIN` picks the
    /// service (defaults to `accounts.zoho`) and `ZOHO_DATACENTER` the
    /// datacenter (defaults to `EU`).
    pub fn new_from_env() -> Result<Self> {
        let tokens = Tokens::from_env()?;
        let domain = optional_var("ZOHO_API_DOMAIN").unwrap_or_else(|| DEFAULT_API_DOMAIN.to_string());
        let dc = match optional_var("ZOHO_DATACENTER") {
            Some(dc) => dc.parse()?,
            None => DataCenter::default(),
        };

        ZohoClient::new(tokens, domain, dc)
    }

    /// Override the API base url.
    pub fn base_url(mut self, url: Url) -> Self {
        self.endpoint = url.as_str().trim_end_matches('/').to_string();
        self
    }

    /// Override the accounts server that refreshes tokens.
    pub fn accounts_url(mut self, url: Url) -> Self {
        self.accounts_endpoint = url.as_str().trim_end_matches('/').to_string();
        self
    }

    /// Replace the response `id` values that mean the token was rejected.
    pub fn rejection_sentinels<I, S>(mut self, sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.rejection_sentinels = sentinels.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn token_state(&self) -> &TokenState {
        &self.state
    }

    pub fn access_token(&self) -> Option<&str> {
        self.state.access_token()
    }

    /// Check if the current access token has expired. Assumes it has if the
    /// expiry time is unknown.
    pub fn has_expired(&self) -> bool {
        self.state.is_expired()
    }

    /// Add the bearer header to the given headers.
    pub fn authorize_header(&self, headers: HeaderMap) -> Result<HeaderMap> {
        self.state.authorize_header(headers)
    }

    /// Ask Zoho for a new access token with the refresh token. Returns whether
    /// a token was obtained.
    pub async fn refresh_access_token(&mut self) -> Result<bool> {
        let url = Url::parse(&format!("{}{}", self.accounts_endpoint, TOKEN_PATH))?;

        // Zoho takes the grant as query parameters, not as a form body.
        let params = [
            ("refresh_token", self.tokens.refresh_token.as_str()),
            ("client_id", self.tokens.client_id.as_str()),
            ("client_secret", self.tokens.client_secret.as_str()),
            ("redirect_uri", self.tokens.redirect_uri.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .query(&params)
            .send()
            .await
            // The url carries the client secret and refresh token.
            .map_err(|e| e.without_url())?;

        let status = resp.status();
        let t: AccessToken = resp.json().await.map_err(|e| e.without_url())?;

        if !self.state.store(&t, Utc::now()) {
            warn!(
                %status,
                error = t.error.as_deref().unwrap_or("none"),
                "zoho did not return an access token"
            );
            return Ok(false);
        }

        info!(expires_in = t.expires_in, "refreshed zoho access token");

        Ok(true)
    }

    /// Query the given endpoint, refreshing the access token first if it is
    /// missing or expired. The method follows from what the query carries:
    /// GET without data or files, a form POST with data, a multipart POST
    /// with files.
    ///
    /// The parsed JSON response is returned whatever the status code. If Zoho
    /// rejects the token, it is refreshed and the request is sent once more.
    pub async fn query<P>(&mut self, endpoint: P, query: Query) -> Result<Value>
    where
        P: AsRef<str>,
    {
        self.ensure_token().await?;

        let url = self.url(endpoint.as_ref())?;
        let response = self.send(&url, &query).await?;

        if !self.is_rejection(&response) {
            return Ok(response);
        }

        warn!(%url, "zoho rejected the access token, refreshing");

        if !self.refresh_access_token().await? {
            return Err(ZohoError::TokenUnavailable);
        }

        self.send(&url, &query).await
    }

    /// Check the current token against the API and refresh it if Zoho turns
    /// it down. Returns whether a new token was obtained.
    ///
    /// This only understands WorkDrive's user endpoint and error ids.
    pub async fn test_token(&mut self) -> Result<bool> {
        if self.state.access_token().map_or(true, str::is_empty) {
            return self.refresh_access_token().await;
        }

        let url = self.url(USER_PROBE_PATH)?;
        let response = self.send(&url, &Query::new()).await?;

        if self.is_rejection(&response) {
            debug!("zoho token probe was rejected");
            return self.refresh_access_token().await;
        }

        Ok(false)
    }

    /// Whether the response says the bearer token was not accepted.
    pub fn is_rejection(&self, response: &Value) -> bool {
        match response.get("id").and_then(Value::as_str) {
            Some(id) => self.rejection_sentinels.iter().any(|s| s == id),
            None => false,
        }
    }

    async fn ensure_token(&mut self) -> Result<()> {
        if self.state.needs_refresh() {
            debug!("zoho access token is missing or expired");

            if !self.refresh_access_token().await? {
                return Err(ZohoError::TokenUnavailable);
            }
        }

        Ok(())
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        let mut p = endpoint.to_string();
        // Make sure we have the leading "/".
        if !p.starts_with('/') {
            p = format!("/{}", p);
        }

        Ok(Url::parse(&format!("{}{}", self.endpoint, p))?)
    }

    async fn send(&self, url: &Url, query: &Query) -> Result<Value> {
        let kind = query.kind();
        let headers = self.authorize_header(query.headers().clone())?;

        let mut rb = self.client.request(kind.method(), url.clone()).headers(headers);

        if !query.params().is_empty() {
            rb = rb.query(query.params());
        }

        rb = match kind {
            RequestKind::Get => rb,
            RequestKind::Post => rb.form(query.form()),
            RequestKind::Multipart => rb.multipart(query.multipart()?),
        };

        let request = rb.build()?;
        debug!(method = %request.method(), url = %request.url().path(), "sending zoho request");

        let resp = self.client.execute(request).await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        // Some endpoints answer with an empty body, e.g. on deletes.
        if body.is_empty() {
            debug!(%status, "zoho returned an empty body");
            return Ok(Value::Null);
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

impl std::fmt::Debug for ZohoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZohoClient")
            .field("tokens", &self.tokens)
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .field("accounts_endpoint", &self.accounts_endpoint)
            .field("rejection_sentinels", &self.rejection_sentinels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use reqwest::{header::HeaderMap, Url};
    use serde_json::json;

    use super::ZohoClient;
    use crate::{
        config::{DataCenter, Tokens},
        error::ZohoError,
    };

    fn client() -> ZohoClient {
        ZohoClient::new(Tokens::new("id", "secret", "refresh"), "workdrive.zoho", DataCenter::Eu).unwrap()
    }

    #[test]
    fn test_requires_all_credentials() {
        match ZohoClient::new(Tokens::new("", "secret", "refresh"), "workdrive.zoho", DataCenter::Eu) {
            Err(ZohoError::MissingCredential(field)) => assert_eq!("client_id", field),
            other => panic!("Expected missing credential error, but instead received {:?}", other),
        }
    }

    #[test]
    fn test_computes_endpoints() {
        let client = client();

        assert_eq!("https://workdrive.zoho.eu", client.endpoint());
        assert_eq!("https://accounts.zoho.eu", client.accounts_endpoint);
        assert_eq!(
            "https://workdrive.zoho.eu/api/v1/files",
            client.url("api/v1/files").unwrap().as_str()
        );
        assert_eq!(
            "https://workdrive.zoho.eu/api/v1/files",
            client.url("/api/v1/files").unwrap().as_str()
        );
    }

    #[test]
    fn test_base_url_override() {
        let client = client().base_url(Url::parse("http://127.0.0.1:5000/").unwrap());

        assert_eq!("http://127.0.0.1:5000/api", client.url("api").unwrap().as_str());
    }

    #[test]
    fn test_new_client_without_expiry_has_expired() {
        let client = ZohoClient::new(
            Tokens::new("id", "secret", "refresh").access_token("1000.abc"),
            "sheet.zoho",
            DataCenter::Us,
        )
        .unwrap();

        assert!(client.has_expired());
        assert_eq!(Some("1000.abc"), client.access_token());
        assert_eq!(
            "Bearer 1000.abc",
            client.authorize_header(HeaderMap::new()).unwrap()[reqwest::header::AUTHORIZATION]
        );
    }

    // Every environment case lives in this one test so nothing else races on
    // the ZOHO_* variables.
    #[test]
    fn test_configures_from_env() {
        const VARS: [&str; 7] = [
            "ZOHO_CLIENT_ID",
            "ZOHO_CLIENT_SECRET",
            "ZOHO_REFRESH_TOKEN",
            "ZOHO_ACCESS_TOKEN",
            "ZOHO_REDIRECT_URI",
            "ZOHO_API_DOMAIN",
            "ZOHO_DATACENTER",
        ];
        for var in VARS {
            env::remove_var(var);
        }

        match Tokens::from_env() {
            Err(ZohoError::MissingCredential(var)) => assert_eq!("ZOHO_CLIENT_ID", var),
            other => panic!("Expected missing credential error, but instead received {:?}", other),
        }

        env::set_var("ZOHO_CLIENT_ID", "1000.client");
        env::set_var("ZOHO_CLIENT_SECRET", "secret");
        env::set_var("ZOHO_REFRESH_TOKEN", "");

        match ZohoClient::new_from_env() {
            Err(ZohoError::MissingCredential(var)) => assert_eq!("ZOHO_REFRESH_TOKEN", var),
            other => panic!("Expected missing credential error, but instead received {:?}", other),
        }

        env::set_var("ZOHO_REFRESH_TOKEN", "1000.refresh");

        let tokens = Tokens::from_env().unwrap();
        assert_eq!("1000.client", tokens.client_id);
        assert_eq!("secret", tokens.client_secret);
        assert_eq!("1000.refresh", tokens.refresh_token);
        assert_eq!(None, tokens.access_token);
        assert_eq!("https://localhost/", tokens.redirect_uri);

        let client = ZohoClient::new_from_env().unwrap();
        assert_eq!("https://accounts.zoho.eu", client.endpoint());
        assert_eq!("https://accounts.zoho.eu", client.accounts_endpoint);
        assert_eq!(None, client.access_token());

        env::set_var("ZOHO_ACCESS_TOKEN", "1000.access");
        env::set_var("ZOHO_REDIRECT_URI", "https://example.com/callback");
        env::set_var("ZOHO_API_DOMAIN", "workdrive.zoho");
        env::set_var("ZOHO_DATACENTER", "AU");

        let tokens = Tokens::from_env().unwrap();
        assert_eq!(Some("1000.access".to_string()), tokens.access_token);
        assert_eq!("https://example.com/callback", tokens.redirect_uri);

        let client = ZohoClient::new_from_env().unwrap();
        assert_eq!("https://workdrive.zoho.com.au", client.endpoint());
        assert_eq!("https://accounts.zoho.com.au", client.accounts_endpoint);
        assert_eq!(Some("1000.access"), client.access_token());

        env::set_var("ZOHO_DATACENTER", " ");

        match ZohoClient::new_from_env() {
            Err(ZohoError::InvalidDataCenter(_)) => (),
            other => panic!("Expected invalid datacenter error, but instead received {:?}", other),
        }

        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_detects_rejection() {
        let client = client();

        assert!(client.is_rejection(&json!({"id": "F7003", "title": "Invalid OAuth token"})));
        assert!(!client.is_rejection(&json!({"id": "F000"})));
        assert!(!client.is_rejection(&json!({"data": []})));
        assert!(!client.is_rejection(&json!([1, 2])));

        let client = client.rejection_sentinels(["INVALID_TOKEN"]);
        assert!(client.is_rejection(&json!({"id": "INVALID_TOKEN"})));
        assert!(!client.is_rejection(&json!({"id": "F7003"})));
    }
}
