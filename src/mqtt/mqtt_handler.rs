//! Pub/sub client abstraction and its rumqttc implementation

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Packet, QoS, SubscribeReasonCode};
use thiserror::Error;
use tracing::{debug, trace};

use super::config::MqttConfig;
use super::message_manager::InboundMessage;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid MQTT configuration: {0}")]
    Config(String),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Notifications from the broker session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Credentials accepted, session established
    Connected,
    /// Connection or authentication attempt failed
    ConnectFailed(String),
    /// An established session was lost
    Disconnected(String),
    Subscribed,
    SubscribeFailed(String),
    Message(InboundMessage),
}

/// Outgoing side of the broker session
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn subscribe(&self, filter: &str) -> Result<(), TransportError>;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;
}

/// Incoming side of the broker session
///
/// Awaiting the next event also drives the connection; after a failure the
/// next call attempts to reconnect.
#[async_trait]
pub trait SessionEvents: Send {
    async fn next_event(&mut self) -> SessionEvent;
}

/// Creates the rumqttc client pair without connecting yet
pub fn connect(config: &MqttConfig) -> Result<(MqttClient, MqttEvents), TransportError> {
    let options = config.options()?;
    let qos = config.qos()?;

    debug!(
        "Initializing MQTT client {} for {}:{}",
        config.client_id(),
        config.host,
        config.port
    );
    let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);

    Ok((
        MqttClient { client, qos },
        MqttEvents {
            eventloop,
            connected: false,
        },
    ))
}

#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    qos: QoS,
}

#[async_trait]
impl BrokerClient for MqttClient {
    async fn subscribe(&self, filter: &str) -> Result<(), TransportError> {
        debug!("Subscribing to topic {}", filter);
        self.client.subscribe(filter, self.qos).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        debug!("Publishing to topic {}", topic);
        self.client.publish(topic, self.qos, false, payload).await?;
        Ok(())
    }
}

pub struct MqttEvents {
    eventloop: EventLoop,
    connected: bool,
}

#[async_trait]
impl SessionEvents for MqttEvents {
    async fn next_event(&mut self) -> SessionEvent {
        loop {
            match self.eventloop.poll().await {
                // Refused CONNACKs surface as poll errors, see `failure_reason`
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.connected = true;
                    return SessionEvent::Connected;
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let rejected = ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure));
                    if rejected {
                        return SessionEvent::SubscribeFailed(format!(
                            "broker rejected subscription {}",
                            ack.pkid
                        ));
                    }
                    return SessionEvent::Subscribed;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return SessionEvent::Message(InboundMessage::new(
                        publish.topic,
                        publish.payload.to_vec(),
                    ));
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connected = false;
                    return SessionEvent::Disconnected("broker closed the session".to_string());
                }
                Ok(event) => trace!("Ignoring MQTT event {:?}", event),
                Err(e) => {
                    let reason = failure_reason(&e);
                    if std::mem::take(&mut self.connected) {
                        return SessionEvent::Disconnected(reason);
                    }
                    return SessionEvent::ConnectFailed(reason);
                }
            }
        }
    }
}

fn failure_reason(error: &ConnectionError) -> String {
    match error {
        ConnectionError::ConnectionRefused(code) => {
            format!("broker refused the connection: {:?}", code)
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_invalid_configuration() {
        let config = MqttConfig {
            port: 0,
            ..MqttConfig::default()
        };
        assert!(matches!(connect(&config), Err(TransportError::Config(_))));
    }

    #[test]
    fn refused_connections_name_the_return_code() {
        let refused = ConnectionError::ConnectionRefused(rumqttc::ConnectReturnCode::NotAuthorized);
        assert_eq!(
            failure_reason(&refused),
            "broker refused the connection: NotAuthorized"
        );
    }

    #[tokio::test]
    async fn unreachable_broker_reports_connect_failure() {
        let config = MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..MqttConfig::default()
        };
        let (_client, mut events) = connect(&config).unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(10), events.next_event())
            .await
            .unwrap();
        assert!(matches!(event, SessionEvent::ConnectFailed(_)));
    }
}
