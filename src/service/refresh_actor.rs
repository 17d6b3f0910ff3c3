use crate::error::{IsRetryable, NexusError};
use crate::firebase_auth::TokenAcquirer;
use crate::types::auth::{RefreshDescriptor, SignInOutcome, SignInParams};

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use oauth2::RefreshToken;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Floor for a refresh re-armed from a refresh response.
const MIN_CHAINED_DELAY: Duration = Duration::from_secs(5);

/// Delay before refreshing a token that lives `expires_in` seconds.
///
/// The lifetime is truncated to whole minutes first, so 90s yields 60s.
pub fn refresh_delay(expires_in: u64) -> Duration {
    Duration::from_millis((expires_in / 60) * 60_000)
}

/// Delay for a refresh armed by the chain itself. Lifetimes under a minute
/// would otherwise re-arm with no delay at all.
fn chained_delay(expires_in: u64) -> Duration {
    refresh_delay(expires_in).max(MIN_CHAINED_DELAY)
}

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Snapshot published after every scheduler transition.
///
/// Counters only grow, so a waiter never misses a refresh, failure or
/// cancellation that happened between two polls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    pub armed: bool,
    pub due_at: Option<DateTime<Utc>>,
    /// A refresh grant is on the wire.
    pub in_flight: bool,
    pub refreshes: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub failures: u64,
    pub last_error: Option<String>,
    pub cancellations: u64,
    pub last_cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum RefreshActorMessage {
    /// Arm a refresh for this descriptor unless one is already armed.
    Schedule(RefreshDescriptor),
    /// Cancel the armed or running refresh, if any.
    Cancel,
    /// Whether a refresh is currently armed.
    IsArmed(RpcReplyPort<bool>),

    // Internal messages (sent by spawned tasks)
    /// The armed delay elapsed.
    Fire {
        refresh_token: RefreshToken,
        generation: u64,
    },
    /// The refresh grant finished.
    RefreshComplete {
        attempt: u64,
        result: Result<SignInOutcome, NexusError>,
    },
}

/// Handle for the refresh scheduler.
#[derive(Clone)]
pub struct RefreshHandle {
    actor: ActorRef<RefreshActorMessage>,
    status_rx: watch::Receiver<RefreshStatus>,
}

impl RefreshHandle {
    /// Arm a refresh. A no-op while another refresh is armed.
    pub fn schedule(&self, descriptor: RefreshDescriptor) {
        let _ = ractor::cast!(self.actor, RefreshActorMessage::Schedule(descriptor));
    }

    pub fn cancel(&self) {
        let _ = ractor::cast!(self.actor, RefreshActorMessage::Cancel);
    }

    pub async fn is_armed(&self) -> Result<bool, NexusError> {
        ractor::call!(self.actor, RefreshActorMessage::IsArmed)
            .map_err(|e| NexusError::RactorError(format!("IsArmed RPC failed: {e}")))
    }

    pub fn status(&self) -> watch::Receiver<RefreshStatus> {
        self.status_rx.clone()
    }

    /// Wait until the published status satisfies `pred`.
    pub async fn wait_for(
        &self,
        pred: impl FnMut(&RefreshStatus) -> bool,
    ) -> Result<RefreshStatus, NexusError> {
        let mut rx = self.status_rx.clone();
        let status = rx
            .wait_for(pred)
            .await
            .map_err(|e| NexusError::RactorError(format!("refresh status closed: {e}")))?;
        Ok(status.clone())
    }

    /// Stop the scheduler; an armed refresh never fires.
    pub fn shutdown(&self) {
        self.actor.stop(None);
    }
}

struct RefreshActorArgs {
    acquirer: TokenAcquirer,
    /// Fixed delay replacing the reported lifetime (test knob).
    fixed_delay: Option<Duration>,
    status_tx: watch::Sender<RefreshStatus>,
}

struct InFlight {
    attempt: u64,
    task: JoinHandle<()>,
}

struct RefreshActorState {
    acquirer: TokenAcquirer,
    fixed_delay: Option<Duration>,
    armed: bool,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    attempts: u64,
    in_flight: Option<InFlight>,
    status_tx: watch::Sender<RefreshStatus>,
}

struct RefreshActor;

#[ractor::async_trait]
impl Actor for RefreshActor {
    type Msg = RefreshActorMessage;
    type State = RefreshActorState;
    type Arguments = RefreshActorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        debug!(fixed_delay = ?args.fixed_delay, "RefreshActor started");
        Ok(RefreshActorState {
            acquirer: args.acquirer,
            fixed_delay: args.fixed_delay,
            armed: false,
            generation: 0,
            pending: None,
            attempts: 0,
            in_flight: None,
            status_tx: args.status_tx,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        if let Some(in_flight) = state.in_flight.take() {
            in_flight.task.abort();
        }
        state.armed = false;
        state.status_tx.send_modify(|s| {
            s.armed = false;
            s.due_at = None;
            s.in_flight = false;
        });
        info!("RefreshActor stopped");
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            RefreshActorMessage::Schedule(descriptor) => {
                let delay = state
                    .fixed_delay
                    .unwrap_or_else(|| refresh_delay(descriptor.expires_in));
                self.arm(state, &myself, descriptor, delay);
            }
            RefreshActorMessage::Cancel => {
                self.handle_cancel(state);
            }
            RefreshActorMessage::IsArmed(rp) => {
                let _ = rp.send(state.armed);
            }
            RefreshActorMessage::Fire {
                refresh_token,
                generation,
            } => {
                if !state.armed || generation != state.generation {
                    debug!(generation, "stale refresh timer; skipping");
                    return Ok(());
                }
                self.handle_fire(state, &myself, refresh_token);
            }
            RefreshActorMessage::RefreshComplete { attempt, result } => {
                if state.in_flight.as_ref().map(|f| f.attempt) != Some(attempt) {
                    debug!(attempt, "refresh result for a cancelled attempt; dropping");
                    return Ok(());
                }
                state.in_flight = None;
                self.handle_refresh_complete(state, &myself, result);
            }
        }
        Ok(())
    }
}

impl RefreshActor {
    fn arm(
        &self,
        state: &mut RefreshActorState,
        myself: &ActorRef<RefreshActorMessage>,
        descriptor: RefreshDescriptor,
        delay: Duration,
    ) {
        if state.armed {
            debug!("refresh already scheduled; ignoring");
            return;
        }
        if delay.is_zero() && state.fixed_delay.is_none() {
            warn!(
                expires_in = descriptor.expires_in,
                "token lifetime under a minute; refreshing immediately"
            );
        }

        state.generation += 1;
        let generation = state.generation;
        let me = myself.clone();
        let refresh_token = descriptor.refresh_token;

        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = ractor::cast!(
                me,
                RefreshActorMessage::Fire {
                    refresh_token,
                    generation
                }
            );
        }));
        state.armed = true;

        let due_at = chrono::Duration::from_std(delay)
            .ok()
            .map(|d| Utc::now() + d);
        state.status_tx.send_modify(|s| {
            s.armed = true;
            s.due_at = due_at;
        });
        info!(
            expires_in = descriptor.expires_in,
            ?delay,
            "token refresh scheduled"
        );
    }

    fn handle_cancel(&self, state: &mut RefreshActorState) {
        let pending = state.pending.take();
        let in_flight = state.in_flight.take();
        if pending.is_none() && in_flight.is_none() {
            debug!("no refresh armed; nothing to cancel");
            return;
        }
        if let Some(pending) = pending {
            pending.abort();
        }
        if let Some(in_flight) = in_flight {
            in_flight.task.abort();
        }
        state.armed = false;
        state.generation += 1;
        state.status_tx.send_modify(|s| {
            s.armed = false;
            s.due_at = None;
            s.in_flight = false;
            s.cancellations += 1;
            s.last_cancelled_at = Some(Utc::now());
        });
        info!("scheduled token refresh cancelled");
    }

    /// Start the refresh grant off the mailbox; the result comes back as
    /// [`RefreshActorMessage::RefreshComplete`].
    fn handle_fire(
        &self,
        state: &mut RefreshActorState,
        myself: &ActorRef<RefreshActorMessage>,
        refresh_token: RefreshToken,
    ) {
        state.armed = false;
        state.pending = None;
        state.attempts += 1;
        let attempt = state.attempts;

        let acquirer = state.acquirer.clone();
        let me = myself.clone();
        let task = tokio::spawn(async move {
            let result = refresh_with_retry(&acquirer, refresh_token).await;
            let _ = ractor::cast!(me, RefreshActorMessage::RefreshComplete { attempt, result });
        });
        state.in_flight = Some(InFlight { attempt, task });

        state.status_tx.send_modify(|s| {
            s.armed = false;
            s.due_at = None;
            s.in_flight = true;
        });
        debug!(attempt, "token refresh started");
    }

    fn handle_refresh_complete(
        &self,
        state: &mut RefreshActorState,
        myself: &ActorRef<RefreshActorMessage>,
        result: Result<SignInOutcome, NexusError>,
    ) {
        state.status_tx.send_modify(|s| s.in_flight = false);

        match result {
            Ok(SignInOutcome { id_token, refresh }) => {
                match id_token {
                    Some(_) => state.status_tx.send_modify(|s| {
                        s.refreshes += 1;
                        s.last_refreshed_at = Some(Utc::now());
                        s.last_error = None;
                    }),
                    None => {
                        error!("token refresh rejected; keeping previous credential");
                        state.status_tx.send_modify(|s| {
                            s.failures += 1;
                            s.last_error = Some("refresh rejected: no idToken".to_string());
                        });
                    }
                }
                match refresh {
                    Some(next) => {
                        let delay = state
                            .fixed_delay
                            .unwrap_or_else(|| chained_delay(next.expires_in));
                        self.arm(state, myself, next, delay);
                    }
                    None => warn!("refresh response carried no lifetime; refresh chain ends"),
                }
            }
            Err(e) => {
                error!(error = %e, "token refresh failed; keeping previous credential");
                state.status_tx.send_modify(|s| {
                    s.failures += 1;
                    s.last_error = Some(e.to_string());
                });
            }
        }
    }
}

/// Refresh grant with backoff on transport errors only.
async fn refresh_with_retry(
    acquirer: &TokenAcquirer,
    refresh_token: RefreshToken,
) -> Result<SignInOutcome, NexusError> {
    (|| async {
        acquirer
            .sign_in(SignInParams::refresh(refresh_token.clone()))
            .await
    })
    .retry(default_retry_policy())
    .when(|e: &NexusError| e.is_retryable())
    .notify(|err, dur: Duration| {
        warn!(
            "token refresh retrying after error {}, sleeping {:?}",
            err, dur
        );
    })
    .await
}

/// Spawn the refresh scheduler and return its handle.
pub async fn spawn(
    acquirer: TokenAcquirer,
    fixed_delay: Option<Duration>,
) -> Result<RefreshHandle, NexusError> {
    let (status_tx, status_rx) = watch::channel(RefreshStatus::default());
    let (actor, _jh) = Actor::spawn(
        None,
        RefreshActor,
        RefreshActorArgs {
            acquirer,
            fixed_delay,
            status_tx,
        },
    )
    .await
    .map_err(|e| NexusError::RactorError(format!("failed to spawn RefreshActor: {e}")))?;
    Ok(RefreshHandle { actor, status_rx })
}
