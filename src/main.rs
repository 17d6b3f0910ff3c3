use firestore_nexus::config::{AuthMode, Config};
use firestore_nexus::{AuthSession, SignInParams};
use mimalloc::MiMalloc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        project_id = %cfg.project_id,
        database = %cfg.database,
        token_path = %cfg.token_path.display(),
        auth_mode = ?cfg.auth_mode,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.loglevel
    );

    let auth_mode = cfg.auth_mode;
    let session = AuthSession::start(cfg).await?;

    match auth_mode {
        AuthMode::ServiceAccount => {
            if let Err(e) = session.acquire_via_service_account().await {
                error!(error = %e, "service account token acquisition failed");
            }
        }
        AuthMode::Password => {
            match session
                .acquire_via_password(SignInParams::default(), true)
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => warn!("sign-in rejected; continuing with stored credential"),
                Err(e) => error!(error = %e, "sign-in failed"),
            }
        }
    }

    let mut status = session.refresh().status();
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                info!(
                    armed = snapshot.armed,
                    due_at = ?snapshot.due_at,
                    in_flight = snapshot.in_flight,
                    refreshes = snapshot.refreshes,
                    failures = snapshot.failures,
                    last_error = ?snapshot.last_error,
                    cancellations = snapshot.cancellations,
                    "refresh status"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    session.shutdown();
    Ok(())
}
