//! Session controller
//!
//! One controller per connection. [`SessionController::admit`] resolves the
//! identity, registers the session and preempts any previous session of the
//! same identity. [`SessionController::run`] drives the frame loop and then
//! the close sequence, consuming the controller so cleanup runs once.
//!
//! Preemption wins over everything the session is doing, an in-flight
//! inference call included. Inside the loop the remaining sources are, in
//! priority order: the fixed-duration deadline (if configured), the flush
//! tick, the idle deadline, and the next inbound message. Inbound reads pause
//! for `frames.min_interval_ms` after each processed frame.

use chrono::{DateTime, Utc};
use emotrack_common::time::now;
use emotrack_common::{IdentityId, MonitorEvent, Sample, TrendSummary};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{Lifecycle, SessionState};
use super::transport::{Inbound, Transport};
use super::SessionServices;
use crate::buffer::{FlushOutcome, SampleBuffer};
use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::inference::{frame, FrameAnalysis, InferenceAdapter};
use crate::protocol::{ClientCommand, CloseReason, ServerEvent};
use crate::registry::{RegistrationGuard, SessionHandle};

/// Summary of a finished session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub identity_id: IdentityId,
    pub final_state: SessionState,
    pub close_reason: CloseReason,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub frames_received: u64,
    pub samples_recorded: u64,
    pub samples_persisted: u64,
    pub samples_dropped: u64,
    pub trend: Option<TrendSummary>,
}

pub struct SessionController<T: Transport> {
    services: SessionServices,
    config: Arc<IngestConfig>,
    transport: T,
    handle: SessionHandle,
    guard: RegistrationGuard,
    lifecycle: Lifecycle,
    inference: InferenceAdapter,
    buffer: SampleBuffer,
    frames_received: u64,
    samples_recorded: u64,
    started: Instant,
}

impl<T: Transport> SessionController<T> {
    /// Authenticate and register a new session
    ///
    /// On an authentication failure the transport is closed with the
    /// auth-failure code and nothing is registered.
    pub async fn admit(services: SessionServices, mut transport: T, credential: Option<&str>) -> Result<Self> {
        let auth_timeout = services.config.session.auth_timeout();
        let resolved = match credential {
            Some(token) => tokio::time::timeout(auth_timeout, services.identity.resolve(token))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Auth(format!("identity lookup timed out after {:?}", auth_timeout)))
                }),
            None => Err(Error::Auth("missing token".to_string())),
        };

        let identity_id = match resolved {
            Ok(id) => id,
            Err(e) => {
                warn!(state = ?SessionState::Rejected, "Rejected session: {}", e);
                let close_timeout = services.config.session.close_timeout();
                match tokio::time::timeout(close_timeout, transport.close(CloseReason::AuthFailed)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(close_err)) => debug!("Close after auth failure: {}", close_err),
                    Err(_) => debug!("Close after auth failure timed out"),
                }
                return Err(e);
            }
        };

        let handle = SessionHandle::new(identity_id);
        let session_id = handle.session_id();
        let previous = services.registry.register(handle.clone());
        let guard = RegistrationGuard::new(Arc::clone(&services.registry), handle.clone());

        if let Some(previous) = previous {
            info!(
                identity_id,
                %session_id,
                previous_session = %previous.session_id(),
                "Preempting existing session"
            );
            previous.preempt();
            services.events.emit_lossy(MonitorEvent::SessionPreempted {
                session_id: previous.session_id(),
                identity_id,
                replaced_by: session_id,
                timestamp: now(),
            });

            // Stop waiting if this session is itself preempted meanwhile
            let stopped = tokio::select! {
                stopped = previous.wait_stopped(services.config.session.preempt_wait()) => stopped,
                _ = handle.preempted() => false,
            };
            if !stopped && !handle.is_preempted() {
                warn!(
                    identity_id,
                    previous_session = %previous.session_id(),
                    "Preempted session did not close in time, continuing"
                );
            }
        }

        let config = Arc::clone(&services.config);
        let inference = InferenceAdapter::new(Arc::clone(&services.inference), session_id);
        let buffer = SampleBuffer::new(session_id, Arc::clone(&services.repo), &config.buffer);

        Ok(Self {
            services,
            config,
            transport,
            handle,
            guard,
            lifecycle: Lifecycle::new(session_id),
            inference,
            buffer,
            frames_received: 0,
            samples_recorded: 0,
            started: Instant::now(),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.handle.session_id()
    }

    pub fn identity_id(&self) -> IdentityId {
        self.handle.identity_id()
    }

    /// Stream until a termination signal, then close and clean up
    ///
    /// Preemption cancels streaming at whatever point it has reached.
    pub async fn run(mut self) -> SessionOutcome {
        let handle = self.handle.clone();
        let reason = tokio::select! {
            biased;
            _ = handle.preempted() => CloseReason::Preempted,
            reason = self.stream() => reason,
        };
        self.finish(reason).await
    }

    async fn stream(&mut self) -> CloseReason {
        let session_id = self.session_id();
        let identity_id = self.identity_id();

        self.enter(SessionState::Streaming);
        if let Err(reason) = self.send(ServerEvent::connected(session_id)).await {
            return reason;
        }

        self.started = Instant::now();
        self.services.events.emit_lossy(MonitorEvent::SessionOpened {
            session_id,
            identity_id,
            timestamp: now(),
        });
        info!(%session_id, identity_id, "Session streaming");

        let session_config = self.config.session.clone();
        let idle_timeout = session_config.idle_timeout();
        let idle_bound = session_config.idle_timeouts_before_close.max(1);
        let min_interval = self.config.frames.min_interval();
        let max_deadline = session_config.max_duration().map(|d| self.started + d);

        let flush_interval = self.config.buffer.flush_interval();
        let mut flush_ticker = interval_at(self.started + flush_interval, flush_interval);
        flush_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut idle_deadline = Instant::now() + idle_timeout;
        let mut idle_windows: u32 = 0;
        let mut resume_at: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                _ = sleep_until(max_deadline.unwrap_or_else(Instant::now)), if max_deadline.is_some() => {
                    info!(%session_id, "Monitoring duration reached");
                    return CloseReason::MaxDuration;
                }

                _ = flush_ticker.tick() => {
                    self.buffer.maybe_flush(Instant::now());
                }

                _ = sleep_until(idle_deadline) => {
                    idle_windows += 1;
                    if idle_windows >= idle_bound {
                        info!(%session_id, idle_windows, "Session idle, closing");
                        return CloseReason::IdleTimeout;
                    }
                    debug!(%session_id, idle_windows, "No frames received, sending ping");
                    if let Err(reason) = self.send(ServerEvent::ping()).await {
                        return reason;
                    }
                    idle_deadline = Instant::now() + idle_timeout;
                }

                _ = sleep_until(resume_at.unwrap_or_else(Instant::now)), if resume_at.is_some() => {
                    resume_at = None;
                }

                inbound = self.transport.recv(), if resume_at.is_none() => {
                    idle_windows = 0;
                    idle_deadline = Instant::now() + idle_timeout;

                    match inbound {
                        Ok(Inbound::Frame(bytes)) => {
                            if let Err(reason) = self.handle_frame(bytes).await {
                                return reason;
                            }
                            if !min_interval.is_zero() {
                                resume_at = Some(Instant::now() + min_interval);
                            }
                        }
                        Ok(Inbound::Text(text)) => {
                            if let Some(ClientCommand::End) = ClientCommand::parse(&text) {
                                info!(%session_id, "Client ended session");
                                return CloseReason::ClientEnded;
                            }
                            if let Err(reason) = self.send(ServerEvent::error("Expected binary frame")).await {
                                return reason;
                            }
                        }
                        Ok(Inbound::Heartbeat) => {}
                        Ok(Inbound::Closed) => {
                            info!(%session_id, "Client disconnected");
                            return CloseReason::Disconnected;
                        }
                        Err(e) => {
                            warn!(%session_id, "Receive failed: {}", e);
                            return CloseReason::Error;
                        }
                    }
                }
            }
        }
    }

    /// Validate, classify and record one frame
    ///
    /// Per-frame problems are reported to the client; only a failed send ends
    /// the session.
    async fn handle_frame(&mut self, bytes: Vec<u8>) -> std::result::Result<(), CloseReason> {
        self.frames_received += 1;

        if let Err(e) = frame::check_size(bytes.len(), &self.config.frames) {
            debug!(session_id = %self.session_id(), size = bytes.len(), "Rejected frame: {}", e);
            return self.send(ServerEvent::error(client_message(e))).await;
        }

        let decoded = match self.inference.decode(bytes).await {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(session_id = %self.session_id(), "Undecodable frame: {}", e);
                return self.send(ServerEvent::error(client_message(e))).await;
            }
        };

        let captured_at = now();
        let event = match self.inference.analyze(&decoded).await {
            FrameAnalysis::NoFace => ServerEvent::no_face(&captured_at),
            FrameAnalysis::Failed(_) => ServerEvent::unknown(&captured_at),
            FrameAnalysis::Classified { emotion, confidence } => {
                self.buffer.append(Sample {
                    session_id: self.session_id(),
                    identity_id: self.identity_id(),
                    emotion,
                    confidence,
                    captured_at,
                });
                self.samples_recorded += 1;
                ServerEvent::classified(emotion, confidence, &captured_at)
            }
        };

        self.send(event).await
    }

    fn enter(&mut self, state: SessionState) {
        if let Some(transition) = self.lifecycle.transition_to(state) {
            debug!(
                session_id = %transition.session_id,
                from = ?transition.old_state,
                to = ?transition.new_state,
                "Session state changed"
            );
        }
    }

    async fn send(&mut self, event: ServerEvent) -> std::result::Result<(), CloseReason> {
        self.transport.send(&event).await.map_err(|e| {
            warn!(session_id = %self.handle.session_id(), "Send failed: {}", e);
            CloseReason::Error
        })
    }

    /// Close sequence: close frame, final flush, aggregation, registry
    /// removal, report hand-off
    async fn finish(mut self, reason: CloseReason) -> SessionOutcome {
        let session_id = self.session_id();
        let identity_id = self.identity_id();

        if reason == CloseReason::Preempted {
            self.enter(SessionState::Preempted);
        }
        self.enter(SessionState::Closing);

        let close_timeout = self.config.session.close_timeout();
        match tokio::time::timeout(close_timeout, self.transport.close(reason)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(%session_id, "Close frame not delivered: {}", e),
            Err(_) => warn!(%session_id, "Close frame not sent within {:?}", close_timeout),
        }
        self.handle.mark_stopped();

        if let FlushOutcome::Flushed(count) = self.buffer.final_flush().await {
            debug!(%session_id, count, "Final flush");
        }

        let trend = self.services.aggregator.aggregate(session_id, identity_id).await;
        self.guard.release();

        if let Some(trend) = &trend {
            self.services.reports.on_trend_ready(trend.clone());
        }

        self.enter(SessionState::Closed);
        let opened_at = self.lifecycle.opened_at();
        let closed_at = self.lifecycle.closed_at();

        let stats = self.buffer.stats();
        let elapsed = self.started.elapsed();
        let fps = if elapsed.as_secs_f64() > 0.0 {
            self.frames_received as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let inference = self.inference.stats();

        info!(
            %session_id,
            identity_id,
            reason = %reason,
            duration_secs = elapsed.as_secs_f64(),
            frames = self.frames_received,
            fps,
            samples = self.samples_recorded,
            persisted = stats.persisted,
            dropped = stats.dropped,
            no_face = inference.no_face.load(Ordering::Relaxed),
            failed = inference.failed.load(Ordering::Relaxed),
            trend = trend.is_some(),
            "Session closed"
        );

        self.services.events.emit_lossy(MonitorEvent::SessionClosed {
            session_id,
            identity_id,
            reason: reason.to_string(),
            samples_recorded: self.samples_recorded,
            samples_persisted: stats.persisted,
            samples_dropped: stats.dropped,
            opened_at,
            timestamp: closed_at.unwrap_or_else(now),
        });

        SessionOutcome {
            session_id,
            identity_id,
            final_state: self.lifecycle.state(),
            close_reason: reason,
            opened_at,
            closed_at,
            frames_received: self.frames_received,
            samples_recorded: self.samples_recorded,
            samples_persisted: stats.persisted,
            samples_dropped: stats.dropped,
            trend,
        }
    }
}

/// Text shown to the client for a rejected frame
fn client_message(error: Error) -> String {
    match error {
        Error::MalformedFrame(message) => message,
        other => other.to_string(),
    }
}
