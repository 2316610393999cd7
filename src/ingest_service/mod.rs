//! IngestService - Single-Consumer Ingest Loop
//!
//! ## Responsibilities
//!
//! - Own the broker connection and its reconnect supervisor
//! - Subscribe on every connect
//! - Feed messages to the controller one at a time
//! - Run the periodic sensor liveness sweep
//! - Serve operator commands (manual reconnect, health check)
//!
//! Everything runs on one task; the reconnect timer and the sweep interval
//! are dropped with the loop on shutdown.

use crate::controller::DashboardController;
use crate::reconnect_supervisor::{
    ConnectionState, ReconnectDecision, ReconnectPolicy, ReconnectSupervisor,
};
use crate::state::IngestConfig;
use crate::transport::{ConnectOptions, Connection, Credentials, Transport, TransportEvent};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// Operator commands into the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestCommand {
    /// Reset the attempt budget and reconnect now
    Reconnect,
    /// Reconnect now if currently disconnected
    CheckHealth,
}

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub url: String,
    pub client_prefix: String,
    pub credentials: Option<Credentials>,
    pub topics: Vec<String>,
}

/// IngestService instance
pub struct IngestService {
    transport: Arc<dyn Transport>,
    controller: Arc<DashboardController>,
    broker: BrokerSettings,
    config: IngestConfig,
}

/// Loop-local connection state
struct Session {
    supervisor: ReconnectSupervisor,
    connection: Option<Connection>,
    retry_at: Option<Instant>,
}

impl IngestService {
    pub fn new(
        transport: Arc<dyn Transport>,
        controller: Arc<DashboardController>,
        broker: BrokerSettings,
        config: IngestConfig,
    ) -> Self {
        Self {
            transport,
            controller,
            broker,
            config,
        }
    }

    /// Run on a background task
    pub fn spawn(
        self,
        commands: mpsc::Receiver<IngestCommand>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(commands, shutdown))
    }

    /// Run until `shutdown` changes (or its sender is dropped)
    pub async fn run(
        self,
        mut commands: mpsc::Receiver<IngestCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(
            url = %self.broker.url,
            topics = self.broker.topics.len(),
            "Starting ingest service"
        );

        let mut session = Session {
            supervisor: ReconnectSupervisor::new(ReconnectPolicy {
                delay: self.config.reconnect_delay,
                max_attempts: self.config.max_reconnect_attempts,
            }),
            connection: None,
            retry_at: Some(Instant::now()),
        };

        let mut sweep = interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(command) = commands.recv() => {
                    self.handle_command(&mut session, command);
                }
                event = next_event(&mut session.connection) => {
                    self.handle_event(&mut session, event).await;
                }
                _ = wait_retry(session.retry_at) => {
                    session.retry_at = None;
                    self.connect(&mut session).await;
                }
                _ = sweep.tick() => {
                    self.controller
                        .sweep_liveness(Utc::now(), self.config.liveness_timeout)
                        .await;
                }
            }
        }

        if let Some(connection) = session.connection.take() {
            connection.link.close().await;
        }
        tracing::info!("Ingest service stopped");
    }

    fn handle_command(&self, session: &mut Session, command: IngestCommand) {
        match command {
            IngestCommand::Reconnect => {
                session.supervisor.manual_reconnect();
                session.retry_at = Some(Instant::now());
            }
            IngestCommand::CheckHealth => {
                if session.supervisor.should_reconnect_now() {
                    tracing::info!("Health check found broker disconnected; reconnecting now");
                    session.retry_at = Some(Instant::now());
                }
            }
        }
    }

    async fn handle_event(&self, session: &mut Session, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                session.supervisor.connected();

                let subscribed = match &session.connection {
                    Some(connection) => connection.link.subscribe(&self.broker.topics).await,
                    None => Ok(()),
                };
                if let Err(e) = subscribed {
                    self.lost(session, &e.to_string()).await;
                    return;
                }

                tracing::info!(topics = self.broker.topics.len(), "Connected to broker");
                self.controller
                    .record_connection(ConnectionState::Connected, 0, "Connected", Utc::now())
                    .await;
            }
            TransportEvent::Message(message) => {
                self.controller.handle_message(&message, Utc::now()).await;
            }
            TransportEvent::Closed => {
                self.lost(session, "Connection closed").await;
            }
            TransportEvent::Error(reason) => {
                self.lost(session, &reason).await;
            }
        }
    }

    async fn connect(&self, session: &mut Session) {
        if let Some(previous) = session.connection.take() {
            previous.link.close().await;
        }

        session.supervisor.connecting();
        self.controller
            .record_connection(
                ConnectionState::Connecting,
                session.supervisor.attempts(),
                "Connecting",
                Utc::now(),
            )
            .await;

        let options = ConnectOptions {
            url: self.broker.url.clone(),
            client_id: format!("{}_{}", self.broker.client_prefix, Utc::now().timestamp_millis()),
            credentials: self.broker.credentials.clone(),
            keep_alive: self.config.keep_alive,
        };

        match self.transport.connect(&options).await {
            Ok(connection) => session.connection = Some(connection),
            Err(e) => self.lost(session, &e.to_string()).await,
        }
    }

    async fn lost(&self, session: &mut Session, reason: &str) {
        if let Some(connection) = session.connection.take() {
            connection.link.close().await;
        }

        match session.supervisor.lost(reason) {
            ReconnectDecision::Retry { attempt, delay } => {
                session.retry_at = Some(Instant::now() + delay);
                self.controller
                    .record_connection(ConnectionState::Disconnected, attempt, reason, Utc::now())
                    .await;
            }
            ReconnectDecision::Exhausted => {
                session.retry_at = None;
                self.controller
                    .record_connection(
                        ConnectionState::Offline,
                        session.supervisor.attempts(),
                        &format!("Reconnect attempts exhausted: {}", reason),
                        Utc::now(),
                    )
                    .await;
            }
            ReconnectDecision::Ignored => {}
        }
    }
}

/// Next event from the open connection; pending while disconnected
async fn next_event(connection: &mut Option<Connection>) -> TransportEvent {
    match connection {
        // A dropped sender without a final event is a close
        Some(connection) => connection.events.recv().await.unwrap_or(TransportEvent::Closed),
        None => std::future::pending().await,
    }
}

async fn wait_retry(retry_at: Option<Instant>) {
    match retry_at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::ActivityForwarder;
    use crate::realtime_hub::RealtimeHub;
    use crate::snapshot_store::Snapshots;
    use crate::transport::{Link, RawMessage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct NoopForwarder;

    impl ActivityForwarder for NoopForwarder {
        fn forward(&self, _event: &crate::classifier::ZoneEvent, _at: chrono::DateTime<Utc>) {}
    }

    struct RecordingLink {
        subscribed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Link for RecordingLink {
        async fn subscribe(&self, topics: &[String]) -> crate::Result<()> {
            self.subscribed.lock().unwrap().extend(topics.iter().cloned());
            Ok(())
        }

        async fn close(&self) {}
    }

    /// Refuses every connect, or accepts and hands the event sender to the test
    struct ScriptedTransport {
        refuse: bool,
        connects: AtomicU32,
        subscribed: Arc<Mutex<Vec<String>>>,
        senders: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
    }

    impl ScriptedTransport {
        fn new(refuse: bool) -> Self {
            Self {
                refuse,
                connects: AtomicU32::new(0),
                subscribed: Arc::new(Mutex::new(Vec::new())),
                senders: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn connect(&self, _options: &ConnectOptions) -> crate::Result<Connection> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(crate::Error::Transport("connection refused".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(TransportEvent::Connected).unwrap();
            self.senders.lock().unwrap().push(tx);
            Ok(Connection {
                link: Box::new(RecordingLink {
                    subscribed: self.subscribed.clone(),
                }),
                events: rx,
            })
        }
    }

    fn fast_config() -> IngestConfig {
        IngestConfig {
            reconnect_delay: Duration::from_millis(10),
            max_reconnect_attempts: 5,
            liveness_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            keep_alive: Duration::from_secs(30),
        }
    }

    fn broker() -> BrokerSettings {
        BrokerSettings {
            url: "mqtt://localhost".into(),
            client_prefix: "test".into(),
            credentials: None,
            topics: vec!["gym/event".into(), "gym/boxes".into()],
        }
    }

    fn controller() -> Arc<DashboardController> {
        Arc::new(DashboardController::new(
            Snapshots::in_memory(),
            Arc::new(NoopForwarder),
            Arc::new(RealtimeHub::new()),
        ))
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_refused_connects_stop_after_budget() {
        let transport = Arc::new(ScriptedTransport::new(true));
        let controller = controller();
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = IngestService::new(transport.clone(), controller.clone(), broker(), fast_config())
            .spawn(cmd_rx, shutdown_rx);

        // Initial connect plus five scheduled attempts
        wait_for(|| transport.connects.load(Ordering::SeqCst) >= 6).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.connects.load(Ordering::SeqCst), 6);
        assert_eq!(controller.connection_state().await, ConnectionState::Offline);

        // Health check does not leave the terminal state
        cmd_tx.send(IngestCommand::CheckHealth).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.connects.load(Ordering::SeqCst), 6);

        // Manual reconnect does
        cmd_tx.send(IngestCommand::Reconnect).await.unwrap();
        wait_for(|| transport.connects.load(Ordering::SeqCst) >= 7).await;
        assert!(transport.connects.load(Ordering::SeqCst) >= 7);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribes_and_applies_messages() {
        let transport = Arc::new(ScriptedTransport::new(false));
        let controller = controller();
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = IngestService::new(transport.clone(), controller.clone(), broker(), fast_config())
            .spawn(cmd_rx, shutdown_rx);

        wait_for(|| !transport.subscribed.lock().unwrap().is_empty()).await;
        assert_eq!(
            *transport.subscribed.lock().unwrap(),
            vec!["gym/event".to_string(), "gym/boxes".to_string()]
        );

        let payload = serde_json::json!({"zone_name": "Gym Area", "object_class": "person", "object_id": "3"});
        transport.senders.lock().unwrap()[0]
            .send(TransportEvent::Message(RawMessage {
                topic: "gym/event".into(),
                payload: serde_json::to_vec(&payload).unwrap(),
            }))
            .unwrap();

        for _ in 0..200 {
            if controller.view(Utc::now()).await.occupancy.contains_key("Gym Area") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(controller.view(Utc::now()).await.occupancy["Gym Area"], 1);
        assert_eq!(controller.connection_state().await, ConnectionState::Connected);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_schedules_reconnect() {
        let transport = Arc::new(ScriptedTransport::new(false));
        let controller = controller();
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = IngestService::new(transport.clone(), controller.clone(), broker(), fast_config())
            .spawn(cmd_rx, shutdown_rx);

        wait_for(|| transport.connects.load(Ordering::SeqCst) == 1).await;
        wait_for(|| !transport.subscribed.lock().unwrap().is_empty()).await;
        transport.senders.lock().unwrap()[0]
            .send(TransportEvent::Closed)
            .unwrap();

        wait_for(|| transport.connects.load(Ordering::SeqCst) >= 2).await;
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
