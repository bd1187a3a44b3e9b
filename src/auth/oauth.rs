use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::config::GoogleConfig;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Normalized external identity as handed to the auth service. The service
/// never sees provider-specific wire formats.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    /// Provider-side subject id (`sub` for Google).
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Build the consent-screen redirect. `state` is echoed back on the
/// callback and checked against a cookie to tie the two legs together.
pub fn authorize_url(config: &GoogleConfig, state: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(AUTHORIZE_ENDPOINT)?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", "openid email profile")
        .append_pair("state", state);
    Ok(url)
}

/// Trade the authorization code for an access token and fetch the profile.
pub async fn exchange_code(config: &GoogleConfig, code: &str) -> anyhow::Result<OAuthProfile> {
    let client = reqwest::Client::new();

    let token: TokenResponse = client
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .context("google token request")?
        .error_for_status()
        .context("google token exchange rejected")?
        .json()
        .await
        .context("google token response body")?;

    let info: UserInfo = client
        .get(USERINFO_ENDPOINT)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .context("google userinfo request")?
        .error_for_status()
        .context("google userinfo rejected")?
        .json()
        .await
        .context("google userinfo body")?;

    Ok(OAuthProfile {
        id: info.sub,
        email: info.email,
        name: info.name,
        avatar: info.picture,
    })
}
