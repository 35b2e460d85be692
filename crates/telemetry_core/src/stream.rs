//! Controlador do stream de telemetria: handshake START/STOP e roteamento
//! do canal de dados.
//!
//! ```text
//! Idle ──start──▶ Starting ──sessão pronta──▶ Running ──stop──▶ Idle
//!                    │                           │
//!                    └──────erro de transporte───┴──────────▶ Idle
//! ```

use crate::config::ChannelConfig;
use crate::protocol::{CMD_START, CMD_STOP};
use crate::transport::{SessionId, Transport, TransportError};
use crate::types::StreamState;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct StreamController {
    channels: ChannelConfig,
    state: StreamState,
    session: Option<SessionId>,
}

impl StreamController {
    pub fn new(channels: ChannelConfig) -> Self {
        Self {
            channels,
            state: StreamState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Abre a sessão do stream. O comando START só sai em [`Self::on_ready`].
    pub fn start<T: Transport + ?Sized>(&mut self, id: SessionId, transport: &mut T) -> Result<(), TransportError> {
        self.state = StreamState::Starting;
        self.session = Some(id);
        info!("Stream iniciando ({id})");

        if let Err(e) = transport.open(id) {
            transport.close(id);
            self.state = StreamState::Idle;
            self.session = None;
            return Err(e);
        }
        Ok(())
    }

    /// Sessão pronta: assina dados e erros, publica START. Retorna `Ok(true)`
    /// se o stream passou para `Running`.
    pub fn on_ready<T: Transport + ?Sized>(&mut self, id: SessionId, transport: &mut T) -> Result<bool, TransportError> {
        if self.session != Some(id) || self.state != StreamState::Starting {
            debug!("Sessão pronta ignorada ({id})");
            return Ok(false);
        }

        transport.subscribe(id, &self.channels.data)?;
        transport.subscribe(id, &self.channels.error)?;
        transport.publish(id, &self.channels.control, CMD_START)?;

        self.state = StreamState::Running;
        info!("Stream rodando, assinado em {}", self.channels.data);
        Ok(true)
    }

    /// `true` se a mensagem é uma leitura do stream atual.
    pub fn accepts_data(&self, id: SessionId, channel: &str) -> bool {
        self.state == StreamState::Running && self.session == Some(id) && channel == self.channels.data
    }

    /// `true` se a mensagem é um erro reportado pelo dispositivo nesta sessão.
    pub fn is_device_error(&self, id: SessionId, channel: &str) -> bool {
        self.session == Some(id) && channel == self.channels.error
    }

    /// Publica STOP (melhor esforço) e fecha a sessão. Retorna `false` se já
    /// estava parado.
    pub fn stop<T: Transport + ?Sized>(&mut self, transport: &mut T) -> bool {
        if self.state == StreamState::Idle {
            return false;
        }
        let was_running = self.state == StreamState::Running;
        self.state = StreamState::Stopping;

        if let Some(id) = self.session.take() {
            if let Err(e) = transport.publish(id, &self.channels.control, CMD_STOP) {
                warn!("STOP não publicado: {e}");
            }
            if was_running {
                for channel in [&self.channels.data, &self.channels.error] {
                    if let Err(e) = transport.unsubscribe(id, channel) {
                        debug!("{e}");
                    }
                }
            }
            transport.close(id);
        }

        self.state = StreamState::Idle;
        info!("Stream parado");
        true
    }

    /// Derruba o stream após erro de transporte, sem publicar nada.
    pub fn abort<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        if let Some(id) = self.session.take() {
            transport.close(id);
        }
        self.state = StreamState::Idle;
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
