//! Message Transport
//!
//! ## Responsibilities
//!
//! - One broker connection per [`Transport::connect`] call
//! - Connection events and messages are delivered on an unbounded channel,
//!   so the transport never blocks on the consumer
//! - Subscriptions are not remembered: the owner subscribes on every `Connected`
//! - No internal retry; the reconnect supervisor owns retry policy

mod mqtt;

pub use mqtt::{BrokerAddress, MqttTransport};

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// A message as delivered by the broker
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Connection lifecycle and delivery
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Message(RawMessage),
    /// Broker or peer closed the connection
    Closed,
    /// Transport error; the connection is finished
    Error(String),
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// wss://, ws://, mqtts:// or mqtt://
    pub url: String,
    pub client_id: String,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
}

/// Control side of an open connection
#[async_trait]
pub trait Link: Send + Sync {
    async fn subscribe(&self, topics: &[String]) -> Result<()>;
    async fn close(&self);
}

/// An open connection: control handle plus its event stream
pub struct Connection {
    pub link: Box<dyn Link>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<Connection>;
}
