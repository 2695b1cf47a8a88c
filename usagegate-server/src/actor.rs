//! Control-plane actor
//!
//! One actor owns the store; the mpsc loop serializes every operation, so
//! each multi-step decision executes as one atomic unit no matter how many
//! connections submit concurrently. This is the server-side realization of
//! the "one atomic procedure per decision" contract.

use tokio::sync::{mpsc, oneshot};
use usagegate::{
    ConsumeResult, ControlError, ControlPlane, DedupKey, EventOutcome, EventRecord, MemoryStore,
    RateDecision,
};

use crate::types::{CreditRequest, EventRequest, ThrottleRequest};

/// Message types for the control-plane actor
pub enum ControlMessage {
    Throttle {
        request: ThrottleRequest,
        response_tx: oneshot::Sender<Result<RateDecision, ControlError>>,
    },
    Consume {
        request: CreditRequest,
        response_tx: oneshot::Sender<Result<ConsumeResult, ControlError>>,
    },
    Grant {
        request: CreditRequest,
        response_tx: oneshot::Sender<Result<ConsumeResult, ControlError>>,
    },
    RecordEvent {
        request: EventRequest,
        response_tx: oneshot::Sender<Result<EventOutcome, ControlError>>,
    },
    Balance {
        subject_id: String,
        response_tx: oneshot::Sender<Result<i64, ControlError>>,
    },
}

/// Handle to communicate with the control-plane actor
#[derive(Clone)]
pub struct ControlPlaneHandle {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControlPlaneHandle {
    /// Check the rate limit for (identifier, endpoint).
    ///
    /// An unreachable actor is an infrastructure fault, so this fails open
    /// just like a store fault inside the core would.
    pub async fn throttle(&self, request: ThrottleRequest) -> Result<RateDecision, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();

        if self
            .tx
            .send(ControlMessage::Throttle {
                request,
                response_tx,
            })
            .await
            .is_err()
        {
            tracing::warn!("control-plane actor unavailable, admitting rate check");
            return Ok(RateDecision::fail_open());
        }

        match response_rx.await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("control-plane actor dropped response, admitting rate check");
                Ok(RateDecision::fail_open())
            }
        }
    }

    /// Consume credits, exactly once per idempotency key. Fails closed.
    pub async fn consume(&self, request: CreditRequest) -> Result<ConsumeResult, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::Consume {
                request,
                response_tx,
            })
            .await
            .map_err(|_| actor_unavailable())?;
        response_rx.await.map_err(|_| actor_unavailable())?
    }

    /// Grant credits, exactly once per idempotency key. Fails closed.
    pub async fn grant(&self, request: CreditRequest) -> Result<ConsumeResult, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::Grant {
                request,
                response_tx,
            })
            .await
            .map_err(|_| actor_unavailable())?;
        response_rx.await.map_err(|_| actor_unavailable())?
    }

    /// Record an event at most once per dedup key. Fails closed.
    pub async fn record_event(&self, request: EventRequest) -> Result<EventOutcome, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::RecordEvent {
                request,
                response_tx,
            })
            .await
            .map_err(|_| actor_unavailable())?;
        response_rx.await.map_err(|_| actor_unavailable())?
    }

    /// Current balance for a subject. Fails closed.
    pub async fn balance(&self, subject_id: String) -> Result<i64, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::Balance {
                subject_id,
                response_tx,
            })
            .await
            .map_err(|_| actor_unavailable())?;
        response_rx.await.map_err(|_| actor_unavailable())?
    }
}

fn actor_unavailable() -> ControlError {
    ControlError::StoreUnavailable("control-plane actor has shut down".to_string())
}

/// The control-plane actor
pub struct ControlPlaneActor;

impl ControlPlaneActor {
    /// Spawn an actor owning the given store.
    ///
    /// `reward_day_offset_secs` fixes the reference time zone for
    /// daily-window dedup keys (seconds east of UTC).
    pub fn spawn(
        buffer_size: usize,
        store: MemoryStore,
        reward_day_offset_secs: i32,
    ) -> ControlPlaneHandle {
        let (tx, rx) = mpsc::channel(buffer_size);

        tokio::spawn(async move {
            run_actor(rx, ControlPlane::new(store), reward_day_offset_secs).await;
        });

        ControlPlaneHandle { tx }
    }
}

async fn run_actor(
    mut rx: mpsc::Receiver<ControlMessage>,
    mut plane: ControlPlane<MemoryStore>,
    reward_day_offset_secs: i32,
) {
    while let Some(msg) = rx.recv().await {
        // Ignore send errors - the requester may have timed out; the
        // operation itself already completed atomically
        match msg {
            ControlMessage::Throttle {
                request,
                response_tx,
            } => {
                let result = plane.check_rate(
                    &request.identifier,
                    &request.endpoint,
                    &request.limit,
                    request.timestamp,
                );
                let _ = response_tx.send(result);
            }
            ControlMessage::Consume {
                request,
                response_tx,
            } => {
                let result = plane.consume_credits(
                    &request.subject_id,
                    request.amount,
                    &request.idempotency_key,
                    request.timestamp,
                );
                let _ = response_tx.send(result);
            }
            ControlMessage::Grant {
                request,
                response_tx,
            } => {
                let result = plane.grant_credits(
                    &request.subject_id,
                    request.amount,
                    &request.idempotency_key,
                    request.timestamp,
                );
                let _ = response_tx.send(result);
            }
            ControlMessage::RecordEvent {
                request,
                response_tx,
            } => {
                let key = match &request.event_id {
                    Some(id) => DedupKey::external(id.clone()),
                    None => DedupKey::daily(
                        request.user_id.clone(),
                        request.event_type.clone(),
                        request.timestamp,
                        reward_day_offset_secs,
                    ),
                };
                let record = EventRecord {
                    user_id: request.user_id,
                    event_type: request.event_type,
                    points: request.points,
                    credits: request.credits,
                };
                let result = plane.record_event(&key, &record, request.timestamp);
                let _ = response_tx.send(result);
            }
            ControlMessage::Balance {
                subject_id,
                response_tx,
            } => {
                let _ = response_tx.send(plane.balance(&subject_id));
            }
        }
    }

    tracing::info!("control-plane actor shutting down");
}
