//! MQTT transport (rumqttc)

use super::{ConnectOptions, Connection, Link, RawMessage, Transport, TransportEvent};
use crate::error::{Error, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport as WireTransport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Parsed broker endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Wss,
    Ws,
    Mqtts,
    Mqtt,
}

impl Scheme {
    fn default_port(self) -> u16 {
        match self {
            Self::Wss => 443,
            Self::Ws => 80,
            Self::Mqtts => 8883,
            Self::Mqtt => 1883,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Wss => "wss",
            Self::Ws => "ws",
            Self::Mqtts => "mqtts",
            Self::Mqtt => "mqtt",
        }
    }
}

impl BrokerAddress {
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| Error::Config(format!("Broker URL has no scheme: {}", url)))?;

        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "wss" => Scheme::Wss,
            "ws" => Scheme::Ws,
            "mqtts" | "ssl" | "tls" => Scheme::Mqtts,
            "mqtt" | "tcp" => Scheme::Mqtt,
            other => return Err(Error::Config(format!("Unsupported broker scheme: {}", other))),
        };

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse()
                    .map_err(|_| Error::Config(format!("Invalid broker port: {}", port)))?,
            ),
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            return Err(Error::Config(format!("Broker URL has no host: {}", url)));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    fn mqtt_options(&self, client_id: &str) -> MqttOptions {
        match self.scheme {
            // Websocket transports take the full URL as the broker address
            Scheme::Wss | Scheme::Ws => {
                let url = format!(
                    "{}://{}:{}{}",
                    self.scheme.as_str(),
                    self.host,
                    self.port,
                    self.path
                );
                let mut options = MqttOptions::new(client_id, url, self.port);
                options.set_transport(if self.scheme == Scheme::Wss {
                    WireTransport::wss_with_default_config()
                } else {
                    WireTransport::Ws
                });
                options
            }
            Scheme::Mqtts => {
                let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
                options.set_transport(WireTransport::tls_with_default_config());
                options
            }
            Scheme::Mqtt => MqttOptions::new(client_id, self.host.clone(), self.port),
        }
    }
}

/// rumqttc-backed transport
#[derive(Debug, Default, Clone)]
pub struct MqttTransport;

impl MqttTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&self, options: &ConnectOptions) -> Result<Connection> {
        let address = BrokerAddress::parse(&options.url)?;

        let mut mqtt_options = address.mqtt_options(&options.client_id);
        mqtt_options.set_keep_alive(options.keep_alive);
        mqtt_options.set_clean_session(true);
        if let Some(credentials) = &options.credentials {
            mqtt_options.set_credentials(credentials.username.clone(), credentials.password.clone());
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options, 64);
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_events(eventloop, tx));

        tracing::info!(
            host = %address.host,
            port = address.port,
            client_id = %options.client_id,
            "Connecting to broker"
        );

        Ok(Connection {
            link: Box::new(MqttLink { client, pump }),
            events: rx,
        })
    }
}

/// Drive the rumqttc event loop until the connection ends
///
/// rumqttc reconnects on the next poll after an error; stopping here hands
/// that decision to the supervisor instead.
async fn pump_events(mut eventloop: EventLoop, tx: mpsc::UnboundedSender<TransportEvent>) {
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => TransportEvent::Connected,
            Ok(Event::Incoming(Packet::Publish(publish))) => TransportEvent::Message(RawMessage {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            }),
            Ok(Event::Incoming(Packet::Disconnect)) => {
                let _ = tx.send(TransportEvent::Closed);
                return;
            }
            Ok(_) => continue,
            Err(e) => {
                let _ = tx.send(TransportEvent::Error(e.to_string()));
                return;
            }
        };

        if tx.send(event).is_err() {
            // Receiver dropped: connection abandoned
            return;
        }
    }
}

struct MqttLink {
    client: AsyncClient,
    pump: JoinHandle<()>,
}

#[async_trait]
impl Link for MqttLink {
    async fn subscribe(&self, topics: &[String]) -> Result<()> {
        for topic in topics {
            self.client
                .subscribe(topic.as_str(), QoS::AtMostOnce)
                .await
                .map_err(|e| Error::Transport(format!("subscribe {}: {}", topic, e)))?;
        }
        tracing::debug!(count = topics.len(), "Subscriptions issued");
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "Disconnect request not sent");
        }
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wss_with_path() {
        let address = BrokerAddress::parse("wss://broker.example.com:8884/mqtt").unwrap();
        assert_eq!(address.scheme, Scheme::Wss);
        assert_eq!(address.host, "broker.example.com");
        assert_eq!(address.port, 8884);
        assert_eq!(address.path, "/mqtt");
    }

    #[test]
    fn test_parse_default_ports() {
        assert_eq!(BrokerAddress::parse("mqtt://localhost").unwrap().port, 1883);
        assert_eq!(BrokerAddress::parse("mqtts://localhost").unwrap().port, 8883);
        assert_eq!(BrokerAddress::parse("wss://localhost/mqtt").unwrap().port, 443);
    }

    #[test]
    fn test_parse_rejects_bad_urls() {
        assert!(BrokerAddress::parse("localhost:1883").is_err());
        assert!(BrokerAddress::parse("http://localhost").is_err());
        assert!(BrokerAddress::parse("mqtt://:1883").is_err());
        assert!(BrokerAddress::parse("mqtt://localhost:abc").is_err());
    }
}
