//! The socket manager: one relay connection per app session.
//!
//! [`SocketManager::connect`] spawns a driver task that owns the socket. The
//! driver joins the identity's rooms on every (re)connection, forwards
//! queued emits, dispatches received events to subscribed handlers, and
//! retries a bounded number of times at a fixed interval when the socket
//! drops or cannot be opened. A socket the relay closes because a newer
//! connection took over the same identity is final: no retry follows.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::stream::SplitSink;
use serde::Serialize;
use serde_json::{Map, Value};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::state::ConnectionState;
use super::subscription::{Handler, Subscription, SubscriptionRegistry};
use crate::config::ClientConfig;
use crate::domain::payload::{
    Appointment, Availability, Consultation, DoctorStatus, Notification, Payload, Prescription,
    QueueEntry,
};
use crate::domain::{
    CLOSE_REPLACED, ClientEvent, Identity, ParticipantId, Role, ServerEvent, ServerEventKind,
};
use crate::error::ClientError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Client-side pub/sub façade over a single relay connection.
///
/// Cheap to clone; clones share the connection and the handlers.
#[derive(Debug, Clone)]
pub struct SocketManager {
    config: ClientConfig,
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    state: watch::Sender<ConnectionState>,
    subscriptions: Mutex<SubscriptionRegistry>,
    session: Mutex<Option<Session>>,
    generation: AtomicU64,
}

/// One `connect` call's worth of connection. Dropping it closes the
/// outbound queue and signals the driver to stop.
#[derive(Debug)]
struct Session {
    generation: u64,
    identity: Identity,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    shutdown: watch::Sender<bool>,
    _driver: JoinHandle<()>,
}

enum SessionEnd {
    Shutdown,
    Dropped,
    Replaced,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Publishes `state` if `generation` still owns the session.
    fn set_state(&self, generation: u64, state: ConnectionState) {
        let session = lock(&self.session);
        if session.as_ref().is_some_and(|s| s.generation == generation) {
            self.state.send_replace(state);
        }
    }

    /// Ends the session from the driver side: reconnection gave up or the
    /// relay replaced this connection.
    fn finish(&self, generation: u64) {
        let mut session = lock(&self.session);
        if session.as_ref().is_some_and(|s| s.generation == generation) {
            *session = None;
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }

    fn dispatch(&self, text: &str) {
        let event: ServerEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognised frame");
                return;
            }
        };
        tracing::debug!(event = event.name(), "event received");
        let handlers = lock(&self.subscriptions).handlers_for(event.kind());
        for handler in handlers {
            handler(&event);
        }
    }
}

impl SocketManager {
    /// Creates a disconnected manager.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            shared: Arc::new(Shared {
                state,
                subscriptions: Mutex::new(SubscriptionRegistry::new()),
                session: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Starts connecting as `participant_id` in `role`.
    ///
    /// No-op while a session is active, including while it is still
    /// connecting or reconnecting, so repeated calls never open a second
    /// socket. Must be called from within a Tokio runtime.
    pub fn connect(&self, participant_id: impl Into<ParticipantId>, role: Role) {
        let mut session = lock(&self.shared.session);
        if let Some(active) = session.as_ref() {
            tracing::debug!(identity = %active.identity, "socket already connected");
            return;
        }

        let identity = Identity::new(participant_id, role);
        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        self.shared.state.send_replace(ConnectionState::Connecting);
        let driver = tokio::spawn(drive(
            Arc::clone(&self.shared),
            self.config.clone(),
            identity.clone(),
            generation,
            outbound_rx,
            shutdown_rx,
        ));

        *session = Some(Session {
            generation,
            identity,
            outbound,
            shutdown,
            _driver: driver,
        });
    }

    /// Closes the connection and forgets the identity. No automatic
    /// reconnection follows. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        let mut session = lock(&self.shared.session);
        if let Some(ended) = session.take() {
            let _ = ended.shutdown.send(true);
            self.shared.state.send_replace(ConnectionState::Disconnected);
            tracing::info!(identity = %ended.identity, "socket manually disconnected");
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Returns `true` while the socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Identity of the active session, if any.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        lock(&self.shared.session)
            .as_ref()
            .map(|s| s.identity.clone())
    }

    /// Registers `handler` for `kind`. Handlers survive reconnections.
    pub fn on<F>(&self, kind: ServerEventKind, handler: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        lock(&self.shared.subscriptions).subscribe(kind, handler)
    }

    /// Removes handlers for `kind`: just `subscription` when given, every
    /// handler for `kind` otherwise. Returns how many were removed.
    pub fn off(&self, kind: ServerEventKind, subscription: Option<Subscription>) -> usize {
        let mut subscriptions = lock(&self.shared.subscriptions);
        match subscription {
            Some(sub) if sub.kind() == kind => usize::from(subscriptions.unsubscribe(sub)),
            Some(_) => 0,
            None => subscriptions.unsubscribe_all(kind),
        }
    }

    /// Queues `event` for the relay.
    ///
    /// While connecting or reconnecting the event waits in the session
    /// queue and is sent after the join event.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active.
    pub fn emit(&self, event: ClientEvent) -> Result<(), ClientError> {
        let session = lock(&self.shared.session);
        let Some(active) = session.as_ref() else {
            tracing::debug!(event = event.name(), "not connected, dropping emit");
            return Err(ClientError::NotConnected);
        };
        active
            .outbound
            .send(event)
            .map_err(|_| ClientError::NotConnected)
    }

    /// Announces that a patient joined the waiting queue.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active.
    pub fn join_queue(&self, patient: Payload) -> Result<(), ClientError> {
        self.emit(ClientEvent::PatientJoinedQueue(patient))
    }

    /// Broadcasts a doctor's availability.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active and
    /// [`ClientError::Encode`] if the payload cannot be encoded.
    pub fn update_doctor_status(
        &self,
        doctor_id: impl Into<ParticipantId>,
        status: Availability,
    ) -> Result<(), ClientError> {
        let status = DoctorStatus {
            doctor_id: Some(doctor_id.into()),
            status: Some(serde_json::to_value(status)?),
            ..DoctorStatus::default()
        };
        self.emit(ClientEvent::DoctorStatusChanged(to_payload(&status)?))
    }

    /// Announces that a consultation started.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active and
    /// [`ClientError::Encode`] if the payload cannot be encoded.
    pub fn start_consultation(
        &self,
        doctor_id: impl Into<ParticipantId>,
        patient_id: impl Into<ParticipantId>,
    ) -> Result<(), ClientError> {
        let consultation = consultation(doctor_id, patient_id);
        self.emit(ClientEvent::ConsultationStarted(to_payload(&consultation)?))
    }

    /// Announces that a consultation ended.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active and
    /// [`ClientError::Encode`] if the payload cannot be encoded.
    pub fn end_consultation(
        &self,
        doctor_id: impl Into<ParticipantId>,
        patient_id: impl Into<ParticipantId>,
    ) -> Result<(), ClientError> {
        let consultation = consultation(doctor_id, patient_id);
        self.emit(ClientEvent::ConsultationEnded(to_payload(&consultation)?))
    }

    /// Publishes the queue order; each patient gets its own slot.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active and
    /// [`ClientError::Encode`] if the payload cannot be encoded.
    pub fn update_queue_positions(&self, patients: &[QueueEntry]) -> Result<(), ClientError> {
        let mut roster = Map::new();
        roster.insert("patients".to_string(), serde_json::to_value(patients)?);
        self.emit(ClientEvent::UpdateQueuePosition(Value::Object(roster)))
    }

    /// Sends a prescription to its patient.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active and
    /// [`ClientError::Encode`] if the payload cannot be encoded.
    pub fn create_prescription(&self, prescription: Prescription) -> Result<(), ClientError> {
        self.emit(ClientEvent::PrescriptionCreated(to_payload(&prescription)?))
    }

    /// Announces a booked appointment to both sides.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active and
    /// [`ClientError::Encode`] if the payload cannot be encoded.
    pub fn create_appointment(&self, appointment: Appointment) -> Result<(), ClientError> {
        self.emit(ClientEvent::AppointmentCreated(to_payload(&appointment)?))
    }

    /// Sends a notification to one doctor or patient, stamped with the
    /// current time. `kind` defaults to `info`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active and
    /// [`ClientError::Encode`] if the payload cannot be encoded.
    pub fn send_notification(
        &self,
        recipient_type: Role,
        recipient_id: impl Into<ParticipantId>,
        message: impl Into<String>,
        kind: Option<&str>,
    ) -> Result<(), ClientError> {
        let notification = Notification {
            recipient_type: Some(Value::from(recipient_type.as_str())),
            recipient_id: Some(recipient_id.into()),
            message: Some(Value::from(message.into())),
            kind: Some(Value::from(kind.unwrap_or("info"))),
            timestamp: Some(Value::from(Utc::now().to_rfc3339())),
            ..Notification::default()
        };
        self.emit(ClientEvent::SendNotification(to_payload(&notification)?))
    }

    /// Legacy ticket announcement to all doctors.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if no session is active.
    pub fn announce_ticket(&self, ticket: Payload) -> Result<(), ClientError> {
        self.emit(ClientEvent::NewTicket(ticket))
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<Payload, ClientError> {
    Ok(serde_json::to_value(value)?)
}

fn consultation(
    doctor_id: impl Into<ParticipantId>,
    patient_id: impl Into<ParticipantId>,
) -> Consultation {
    Consultation {
        doctor_id: Some(doctor_id.into()),
        patient_id: Some(patient_id.into()),
        ..Consultation::default()
    }
}

/// Driver task: connect, run, retry, give up.
async fn drive(
    shared: Arc<Shared>,
    config: ClientConfig,
    identity: Identity,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failures: u32 = 0;

    loop {
        let attempt = tokio::select! {
            result = connect_async(config.url.as_str()) => result,
            _ = shutdown.changed() => return,
        };

        match attempt {
            Ok((stream, _)) => {
                failures = 0;
                shared.set_state(generation, ConnectionState::Connected);
                tracing::info!(url = %config.url, %identity, "socket connected");
                match run_session(&shared, stream, &identity, &mut outbound, &mut shutdown).await {
                    SessionEnd::Shutdown => return,
                    SessionEnd::Replaced => {
                        tracing::warn!(%identity, "replaced by a newer connection, not reconnecting");
                        shared.finish(generation);
                        return;
                    }
                    SessionEnd::Dropped => tracing::warn!(url = %config.url, "socket disconnected"),
                }
            }
            Err(e) => {
                tracing::warn!(url = %config.url, error = %e, "socket connection error");
            }
        }

        if failures >= config.reconnect_attempts {
            tracing::warn!(attempts = failures, "reconnection attempts exhausted");
            shared.finish(generation);
            return;
        }
        failures = failures.saturating_add(1);
        shared.set_state(generation, ConnectionState::Reconnecting { attempt: failures });

        tokio::select! {
            () = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown.changed() => return,
        }
    }
}

/// Runs one open socket until it drops or the session ends.
async fn run_session(
    shared: &Shared,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    identity: &Identity,
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut ws_tx, mut ws_rx) = stream.split();

    if let Err(e) = send_event(&mut ws_tx, &ClientEvent::join(identity)).await {
        tracing::warn!(error = %e, "failed to send join event");
        return SessionEnd::Dropped;
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => shared.dispatch(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        let replaced = frame
                            .as_ref()
                            .is_some_and(|f| u16::from(f.code) == CLOSE_REPLACED);
                        return if replaced { SessionEnd::Replaced } else { SessionEnd::Dropped };
                    }
                    None => return SessionEnd::Dropped,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "socket read error");
                        return SessionEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                }
            }
            event = outbound.recv() => {
                let Some(event) = event else {
                    let _ = ws_tx.close().await;
                    return SessionEnd::Shutdown;
                };
                if let Err(e) = send_event(&mut ws_tx, &event).await {
                    tracing::warn!(event = event.name(), error = %e, "failed to send event");
                    return SessionEnd::Dropped;
                }
            }
            _ = shutdown.changed() => {
                let _ = ws_tx.close().await;
                return SessionEnd::Shutdown;
            }
        }
    }
}

async fn send_event(ws_tx: &mut WsSink, event: &ClientEvent) -> Result<(), ClientError> {
    let json = serde_json::to_string(event)?;
    ws_tx.send(Message::text(json)).await?;
    Ok(())
}
