//! Adaptador MQTT (rumqttc) para o [`Transport`] do core.
//!
//! Cada sessão é um cliente próprio com client id único e uma thread que
//! drena o event loop e repassa [`TransportEvent`]s pelo channel. QoS 0
//! (at-most-once), sem retenção. Todas as requisições usam `try_*` para
//! nunca bloquear a thread do supervisor.

use crate::config::BrokerConfig;
use crate::transport::{SessionId, SessionKind, Transport, TransportError, TransportEvent};
use crossbeam_channel::Sender;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Capacidade da fila de requisições de cada cliente.
const REQUEST_CAPACITY: usize = 64;

/// Espera entre tentativas de reconexão do event loop.
const RETRY_DELAY: Duration = Duration::from_secs(2);

struct MqttSession {
    client: Client,
    closed: Arc<AtomicBool>,
    _thread: JoinHandle<()>,
}

pub struct MqttTransport {
    broker: BrokerConfig,
    events: Sender<TransportEvent>,
    sessions: HashMap<SessionId, MqttSession>,
}

impl MqttTransport {
    pub fn new(broker: BrokerConfig, events: Sender<TransportEvent>) -> Self {
        Self {
            broker,
            events,
            sessions: HashMap::new(),
        }
    }

    fn session(&mut self, id: SessionId) -> Result<&mut MqttSession, TransportError> {
        self.sessions.get_mut(&id).ok_or(TransportError::NotOpen(id))
    }
}

/// Client id único por processo e sessão.
pub fn client_id(prefix: &str, id: SessionId) -> String {
    let kind = match id.kind {
        SessionKind::Liveness => "chk",
        SessionKind::Stream => "str",
    };
    format!("{prefix}-{}-{kind}{}", std::process::id(), id.generation)
}

/// Monta as opções do rumqttc a partir da seção `[broker]`.
pub fn mqtt_options(broker: &BrokerConfig, client_id: String) -> Result<MqttOptions, TransportError> {
    let mut options = match broker.scheme.as_str() {
        "tcp" => MqttOptions::new(client_id, broker.host.clone(), broker.port),
        "ws" => {
            let mut o = MqttOptions::new(client_id, broker.url(), broker.port);
            o.set_transport(rumqttc::Transport::Ws);
            o
        }
        "wss" => {
            let mut o = MqttOptions::new(client_id, broker.url(), broker.port);
            o.set_transport(rumqttc::Transport::wss_with_default_config());
            o
        }
        other => {
            return Err(TransportError::Open(format!("esquema desconhecido: {other}")));
        }
    };
    options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs.max(5)));
    options.set_clean_session(true);
    Ok(options)
}

impl Transport for MqttTransport {
    fn open(&mut self, id: SessionId) -> Result<(), TransportError> {
        self.close(id);

        let options = mqtt_options(&self.broker, client_id(&self.broker.client_id_prefix, id))?;
        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        let thread = {
            let closed = Arc::clone(&closed);
            let events = self.events.clone();
            std::thread::Builder::new()
                .name(format!("mqtt-{id}"))
                .spawn(move || event_loop(id, connection, &events, &closed))
                .map_err(|e| TransportError::Open(e.to_string()))?
        };

        info!("Sessão {id} conectando em {}:{}", self.broker.host, self.broker.port);
        self.sessions.insert(
            id,
            MqttSession {
                client,
                closed,
                _thread: thread,
            },
        );
        Ok(())
    }

    fn subscribe(&mut self, id: SessionId, channel: &str) -> Result<(), TransportError> {
        self.session(id)?
            .client
            .try_subscribe(channel, QoS::AtMostOnce)
            .map_err(|e| TransportError::Subscribe {
                channel: channel.into(),
                reason: e.to_string(),
            })
    }

    fn unsubscribe(&mut self, id: SessionId, channel: &str) -> Result<(), TransportError> {
        self.session(id)?
            .client
            .try_unsubscribe(channel)
            .map_err(|e| TransportError::Unsubscribe {
                channel: channel.into(),
                reason: e.to_string(),
            })
    }

    fn publish(&mut self, id: SessionId, channel: &str, payload: &str) -> Result<(), TransportError> {
        self.session(id)?
            .client
            .try_publish(channel, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| TransportError::Publish {
                channel: channel.into(),
                reason: e.to_string(),
            })
    }

    fn close(&mut self, id: SessionId) {
        let Some(session) = self.sessions.remove(&id) else {
            return;
        };
        session.closed.store(true, Ordering::Release);
        if let Err(e) = session.client.try_disconnect() {
            debug!("Disconnect de {id}: {e}");
        }
        // A thread sai sozinha ao ver o flag no próximo evento
        debug!("Sessão {id} fechada");
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        let ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        for id in ids {
            self.close(id);
        }
    }
}

fn event_loop(id: SessionId, mut connection: Connection, events: &Sender<TransportEvent>, closed: &AtomicBool) {
    for notification in connection.iter() {
        if closed.load(Ordering::Acquire) {
            break;
        }

        let event = match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Sessão {id} conectada ao broker");
                TransportEvent::Ready(id)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => TransportEvent::Message {
                session: id,
                channel: publish.topic.clone(),
                payload: publish.payload.to_vec(),
            },
            Ok(_) => continue,
            Err(e) => {
                warn!("Erro de conexão na sessão {id}: {e}");
                if events
                    .send(TransportEvent::Error {
                        session: id,
                        error: TransportError::Connection(e.to_string()),
                    })
                    .is_err()
                {
                    break;
                }
                std::thread::sleep(RETRY_DELAY);
                continue;
            }
        };

        if events.send(event).is_err() {
            break;
        }
    }
    debug!("Event loop da sessão {id} encerrado");
}
