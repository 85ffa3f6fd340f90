/*!
 * A rust library for talking to Zoho's OAuth2 protected APIs.
 *
 * It does not do the initial authorization, but once a refresh token has
 * been obtained it keeps a bearer token fresh and forwards requests to the
 * chosen API (WorkDrive, Sheet, ...). Responses are handed back as JSON
 * values, since every Zoho API has its own response shapes.
 *
 * For more information, Zoho's OAuth flow is documented at [zoho.com/accounts/protocol/oauth](https://www.zoho.com/accounts/protocol/oauth.html)
 *
 * Example:
 *
 * ```
 * use zoho_oauth_client::{DataCenter, Query, Tokens, ZohoClient};
 *
 * async fn list_team_folders() {
 *     let tokens = Tokens::new("client-id", "client-secret", "refresh-token");
 *     let mut zoho = ZohoClient::new(tokens, "workdrive.zoho", DataCenter::Eu).unwrap();
 *
 *     let folders = zoho
 *         .query("/api/v1/teams/team-id/teamfolders", Query::new().param("page[limit]", 50))
 *         .await
 *         .unwrap();
 *
 *     println!("{}", folders);
 * }
 * ```
 */
pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod token;

pub use client::ZohoClient;
pub use config::{DataCenter, Tokens};
pub use error::{Result, ZohoError};
pub use query::{FilePart, Query, RequestKind};
pub use token::{AccessToken, TokenState};
