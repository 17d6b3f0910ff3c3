use super::claims::decode_claims;
use super::endpoints::IdentityEndpoints;
use super::helper;
use crate::config::Config;
use crate::error::NexusError;
use crate::store::CredentialStore;
use crate::types::auth::{SignInOutcome, SignInParams, SignInResponse};

use std::sync::Arc;
use tracing::{info, warn};

/// Produces fresh bearer tokens and hands them to the credential store.
#[derive(Clone)]
pub struct TokenAcquirer {
    cfg: Arc<Config>,
    http_client: reqwest::Client,
    store: CredentialStore,
}

impl TokenAcquirer {
    pub fn new(cfg: Arc<Config>, http_client: reqwest::Client, store: CredentialStore) -> Self {
        Self {
            cfg,
            http_client,
            store,
        }
    }

    /// Token from the external credential helper (service-account delegation).
    pub async fn acquire_via_service_account(&self) -> Result<String, NexusError> {
        let token =
            helper::print_access_token(&self.cfg.helper_program, &self.cfg.helper_args()).await?;
        self.store.set_token(&token).await?;
        log_acquired("service_account", &token);
        Ok(token)
    }

    /// One round-trip to the identity endpoints.
    ///
    /// A missing `idToken` is not an error: the outcome simply carries no
    /// token. The refresh descriptor is returned whenever the response had
    /// both `expiresIn` and `refreshToken`.
    pub async fn sign_in(&self, params: SignInParams) -> Result<SignInOutcome, NexusError> {
        let (flow, resp) = match params.refresh_token.as_ref() {
            Some(refresh_token) => (
                "refresh_token",
                IdentityEndpoints::exchange_refresh_token(
                    &self.cfg,
                    refresh_token,
                    &self.http_client,
                )
                .await?,
            ),
            None => {
                let email = params.email.as_deref().unwrap_or(&self.cfg.auth_email);
                let password = params.password.as_deref().unwrap_or(&self.cfg.auth_password);
                (
                    "password",
                    IdentityEndpoints::sign_in_with_password(
                        &self.cfg,
                        email,
                        password,
                        &self.http_client,
                    )
                    .await?,
                )
            }
        };

        self.accept(flow, resp).await
    }

    async fn accept(
        &self,
        flow: &'static str,
        resp: SignInResponse,
    ) -> Result<SignInOutcome, NexusError> {
        let refresh = resp.refresh_descriptor();
        let id_token = match resp.token() {
            Some(token) => {
                self.store.set_token(token).await?;
                log_acquired(flow, token);
                Some(token.to_string())
            }
            None => {
                let rejected = NexusError::AuthRejected {
                    message: resp.error_message(),
                };
                warn!(flow, error = %rejected, "identity endpoint issued no token");
                None
            }
        };
        Ok(SignInOutcome { id_token, refresh })
    }
}

fn log_acquired(flow: &str, token: &str) {
    match decode_claims(token) {
        Some(claims) => info!(
            flow,
            email = claims.email.as_deref().unwrap_or("-"),
            user_id = claims.user_id.as_deref().unwrap_or("-"),
            expires_at = %claims
                .expires_at()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
            "token acquired"
        ),
        None => info!(flow, token_len = token.len(), "token acquired"),
    }
}
