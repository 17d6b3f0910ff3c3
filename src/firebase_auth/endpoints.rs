use crate::config::Config;
use crate::error::NexusError;
use crate::types::auth::{PasswordSignInBody, RefreshTokenBody, SignInResponse};

use oauth2::RefreshToken;
use serde::Serialize;
use tracing::debug;
use url::Url;

/// Stateless identity endpoints.
pub(super) struct IdentityEndpoints;

impl IdentityEndpoints {
    /// `accounts:signInWithPassword` with `returnSecureToken`.
    pub(super) async fn sign_in_with_password(
        cfg: &Config,
        email: &str,
        password: &str,
        http_client: &reqwest::Client,
    ) -> Result<SignInResponse, NexusError> {
        let body = PasswordSignInBody {
            email,
            password,
            return_secure_token: true,
        };
        post_json(cfg.sign_in_url()?, &body, http_client).await
    }

    /// Exchange a refresh token for a fresh id token.
    pub(super) async fn exchange_refresh_token(
        cfg: &Config,
        refresh_token: &RefreshToken,
        http_client: &reqwest::Client,
    ) -> Result<SignInResponse, NexusError> {
        let body = RefreshTokenBody {
            refresh_token: refresh_token.secret(),
            grant_type: "refresh_token",
        };
        post_json(cfg.refresh_url()?, &body, http_client).await
    }
}

/// Single POST; the body is parsed as JSON whatever the status, since
/// rejections arrive as an `error` envelope.
async fn post_json<T: Serialize>(
    url: Url,
    body: &T,
    http_client: &reqwest::Client,
) -> Result<SignInResponse, NexusError> {
    let resp = http_client.post(url).json(body).send().await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;
    debug!(%status, len = bytes.len(), "identity endpoint answered");
    Ok(serde_json::from_slice(&bytes)?)
}
