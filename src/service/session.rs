use crate::api::FirestoreClient;
use crate::config::Config;
use crate::error::NexusError;
use crate::firebase_auth::TokenAcquirer;
use crate::service::refresh_actor::{self, RefreshHandle};
use crate::store::CredentialStore;
use crate::types::auth::{RefreshDescriptor, SignInParams};

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the shared HTTP client used for identity and document calls.
pub fn build_http_client(cfg: &Config) -> Result<reqwest::Client, NexusError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("firestore-nexus/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15));
    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}

/// Long-lived context owning configuration, the credential store, the token
/// acquirer, the refresh scheduler and the document client.
pub struct AuthSession {
    cfg: Arc<Config>,
    store: CredentialStore,
    acquirer: TokenAcquirer,
    refresh: RefreshHandle,
    client: FirestoreClient,
}

impl AuthSession {
    pub async fn start(cfg: Config) -> Result<Self, NexusError> {
        if let Err(e) = cfg.check_project() {
            warn!(error = %e, "project not configured; requests will be rejected upstream");
        }
        let cfg = Arc::new(cfg);
        let http_client = build_http_client(&cfg)?;

        let store = CredentialStore::open(&cfg).await;
        let acquirer = TokenAcquirer::new(cfg.clone(), http_client.clone(), store.clone());
        let refresh = refresh_actor::spawn(
            acquirer.clone(),
            cfg.refresh_rate.map(Duration::from_secs),
        )
        .await?;
        let client = FirestoreClient::new(cfg.clone(), http_client, store.clone());

        info!(
            project_id = %store.project_id(),
            database = %store.database(),
            token_path = %store.path().display(),
            has_token = store.current_token().is_some(),
            "auth session started"
        );

        Ok(Self {
            cfg,
            store,
            acquirer,
            refresh,
            client,
        })
    }

    /// Email/password sign-in, or the refresh grant when `params` carries a
    /// refresh token.
    ///
    /// Returns `None` when the endpoint issued no token; callers must check.
    /// With `schedule_refresh`, a refresh is armed whenever the response
    /// reported a lifetime and a refresh token.
    pub async fn acquire_via_password(
        &self,
        params: SignInParams,
        schedule_refresh: bool,
    ) -> Result<Option<String>, NexusError> {
        let outcome = self.acquirer.sign_in(params).await?;
        if schedule_refresh {
            match outcome.refresh {
                Some(descriptor) => self.refresh.schedule(descriptor),
                None => warn!("sign-in response carried no lifetime; refresh not scheduled"),
            }
        }
        Ok(outcome.id_token)
    }

    pub async fn acquire_via_service_account(&self) -> Result<String, NexusError> {
        self.acquirer.acquire_via_service_account().await
    }

    pub fn schedule_refresh(&self, descriptor: RefreshDescriptor) {
        self.refresh.schedule(descriptor);
    }

    pub fn current_token(&self) -> Option<String> {
        self.store.current_token()
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn client(&self) -> &FirestoreClient {
        &self.client
    }

    pub fn refresh(&self) -> &RefreshHandle {
        &self.refresh
    }

    /// Stop the refresh scheduler. The stored credential is kept.
    pub fn shutdown(&self) {
        self.refresh.shutdown();
        info!("auth session stopped");
    }
}
