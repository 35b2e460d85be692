//! Monitor de presença do dispositivo.
//!
//! Abre uma sessão própria, assina o canal de resposta e o canal de erros e
//! publica `CHECK_DEVICE` a cada tick do timer até o dispositivo responder
//! `DEVICE_OK`. O timer é externo: quem dirige o monitor chama
//! [`LivenessMonitor::on_tick`] com o id da sessão que armou o timer.

use crate::config::ChannelConfig;
use crate::protocol::{CMD_CHECK_DEVICE, is_device_ok};
use crate::transport::{SessionId, Transport, TransportError};
use crate::types::DeviceStatus;
use tracing::{debug, info, warn};

/// Resultado de uma mensagem entregue ao monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessOutcome {
    /// Não era para este monitor, ou não era afirmativa
    Ignored,
    /// Dispositivo confirmou presença
    Affirmed,
    /// Dispositivo reportou um erro
    DeviceError(String),
}

#[derive(Debug)]
struct ActiveCheck {
    id: SessionId,
    opened: bool,
    /// Quantas vezes o broker confirmou a conexão
    connects: u32,
    requests: u64,
}

#[derive(Debug)]
pub struct LivenessMonitor {
    channels: ChannelConfig,
    status: DeviceStatus,
    last_error: Option<String>,
    check: Option<ActiveCheck>,
}

impl LivenessMonitor {
    pub fn new(channels: ChannelConfig) -> Self {
        Self {
            channels,
            status: DeviceStatus::Unknown,
            last_error: None,
            check: None,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Sessão da verificação em andamento, se houver.
    pub fn session(&self) -> Option<SessionId> {
        self.check.as_ref().map(|c| c.id)
    }

    /// Sessão que ainda precisa de pedidos de verificação (aberta e não confirmada).
    pub fn polling_session(&self) -> Option<SessionId> {
        match self.status {
            DeviceStatus::Connected => None,
            _ => self.session(),
        }
    }

    /// Pedidos de verificação publicados no ciclo atual.
    pub fn checks_sent(&self) -> u64 {
        self.check.as_ref().map_or(0, |c| c.requests)
    }

    /// Inicia um novo ciclo de verificação, derrubando qualquer ciclo anterior.
    pub fn begin<T: Transport + ?Sized>(&mut self, id: SessionId, transport: &mut T) {
        self.release(transport);
        info!("Verificando dispositivo ({id})");
        self.status = DeviceStatus::Checking;
        self.check = Some(ActiveCheck {
            id,
            opened: false,
            connects: 0,
            requests: 0,
        });
        self.try_open(transport);
    }

    /// Encerra a verificação e volta para `Unknown`. Idempotente.
    pub fn end<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        self.release(transport);
        if self.status != DeviceStatus::Unknown {
            info!("Verificação encerrada, dispositivo → desconhecido");
        }
        self.status = DeviceStatus::Unknown;
    }

    /// Libera a sessão sem mexer no status (usado na passagem para o stream).
    pub fn release<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        let Some(check) = self.check.take() else {
            return;
        };
        if check.opened {
            for channel in self.subscribed_channels() {
                if let Err(e) = transport.unsubscribe(check.id, channel) {
                    debug!("{e}");
                }
            }
        }
        transport.close(check.id);
        debug!("Sessão {} liberada", check.id);
    }

    /// Registra um erro reportado pelo dispositivo sem alterar o status.
    pub fn record_error(&mut self, message: String) {
        warn!("Dispositivo reportou erro: {message}");
        self.last_error = Some(message);
    }

    /// Tick do timer de verificação. Retorna `true` se um pedido foi publicado.
    pub fn on_tick<T: Transport + ?Sized>(&mut self, id: SessionId, transport: &mut T) -> bool {
        if self.polling_session() != Some(id) {
            debug!("Tick obsoleto ignorado ({id})");
            return false;
        }
        let opened = self.check.as_ref().is_some_and(|c| c.opened);
        if !opened && !self.try_open(transport) {
            return false;
        }

        match transport.publish(id, &self.channels.check, CMD_CHECK_DEVICE) {
            Ok(()) => {
                if let Some(check) = self.check.as_mut() {
                    check.requests += 1;
                    debug!("Pedido #{} publicado em {}", check.requests, self.channels.check);
                }
                true
            }
            Err(e) => {
                warn!("Pedido de verificação não publicado: {e}");
                false
            }
        }
    }

    /// Broker confirmou a conexão. Numa reconexão as assinaturas se perderam
    /// (sessão limpa) e são refeitas.
    pub fn on_ready<T: Transport + ?Sized>(&mut self, id: SessionId, transport: &mut T) {
        let Some(check) = self.check.as_mut().filter(|c| c.id == id && c.opened) else {
            return;
        };
        check.connects += 1;
        if check.connects == 1 {
            debug!("Sessão de verificação pronta ({id})");
            return;
        }

        info!("Sessão de verificação reconectada ({id}), refazendo assinaturas");
        for channel in self.subscribed_channels() {
            if let Err(e) = transport.subscribe(id, channel) {
                warn!("{e}");
            }
        }
    }

    /// Mensagem recebida numa sessão.
    pub fn on_message(&mut self, id: SessionId, channel: &str, payload: &[u8]) -> LivenessOutcome {
        if self.session() != Some(id) {
            return LivenessOutcome::Ignored;
        }

        // A resposta afirmativa vem antes: o canal de erro pode ser o mesmo
        if channel == self.channels.check_reply && is_device_ok(payload) {
            if self.status != DeviceStatus::Checking {
                return LivenessOutcome::Ignored;
            }
            info!(
                "Dispositivo respondeu após {} pedido(s), status → conectado",
                self.checks_sent()
            );
            self.status = DeviceStatus::Connected;
            return LivenessOutcome::Affirmed;
        }

        if channel == self.channels.error {
            let message = String::from_utf8_lossy(payload).into_owned();
            self.record_error(message.clone());
            return LivenessOutcome::DeviceError(message);
        }

        LivenessOutcome::Ignored
    }

    /// Erro de transporte na sessão de verificação: só loga, o polling segue.
    pub fn on_transport_error(&mut self, id: SessionId, error: &TransportError) {
        if self.session() == Some(id) {
            warn!("Erro de transporte durante verificação ({id}): {error}");
        }
    }

    fn subscribed_channels(&self) -> Vec<&str> {
        let mut channels = vec![self.channels.check_reply.as_str()];
        if self.channels.error != self.channels.check_reply {
            channels.push(self.channels.error.as_str());
        }
        channels
    }

    fn try_open<T: Transport + ?Sized>(&mut self, transport: &mut T) -> bool {
        let Some(id) = self.check.as_ref().map(|c| c.id) else {
            return false;
        };

        let result = transport.open(id).and_then(|()| {
            self.subscribed_channels()
                .into_iter()
                .try_for_each(|channel| transport.subscribe(id, channel))
        });

        match result {
            Ok(()) => {
                if let Some(check) = self.check.as_mut() {
                    check.opened = true;
                }
                true
            }
            Err(e) => {
                warn!("Sessão de verificação indisponível, nova tentativa no próximo tick: {e}");
                transport.close(id);
                false
            }
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SessionKind;
    use crate::transport::testing::{Call, RecordingTransport};

    fn sid(generation: u64) -> SessionId {
        SessionId {
            kind: SessionKind::Liveness,
            generation,
        }
    }

    fn monitor() -> LivenessMonitor {
        LivenessMonitor::new(ChannelConfig::default())
    }

    #[test]
    fn begin_subscribes_reply_and_error_channels() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        assert_eq!(m.status(), DeviceStatus::Checking);
        assert_eq!(t.calls[0], Call::Open(sid(1)));
        assert_eq!(t.subscriptions(), ["esp32/deviceStatus", "esp32/error"]);
    }

    #[test]
    fn tick_publishes_check_until_affirmed() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);

        assert!(m.on_tick(sid(1), &mut t));
        assert!(m.on_tick(sid(1), &mut t));
        assert_eq!(t.count_publish("esp32/checkDevice", "CHECK_DEVICE"), 2);
        assert_eq!(m.checks_sent(), 2);

        let out = m.on_message(sid(1), "esp32/deviceStatus", b"DEVICE_OK");
        assert_eq!(out, LivenessOutcome::Affirmed);
        assert_eq!(m.status(), DeviceStatus::Connected);

        assert!(!m.on_tick(sid(1), &mut t));
        assert_eq!(t.count_publish("esp32/checkDevice", "CHECK_DEVICE"), 2);
        assert_eq!(m.polling_session(), None);
        // A assinatura continua viva para revalidação
        assert_eq!(m.session(), Some(sid(1)));
    }

    #[test]
    fn other_payloads_on_reply_channel_are_not_affirmative() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        let out = m.on_message(sid(1), "esp32/deviceStatus", b"BOOTING");
        assert_eq!(out, LivenessOutcome::Ignored);
        assert_eq!(m.status(), DeviceStatus::Checking);
    }

    #[test]
    fn device_error_is_recorded_without_changing_status() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        let out = m.on_message(sid(1), "esp32/error", b"IMU timeout");
        assert_eq!(out, LivenessOutcome::DeviceError("IMU timeout".into()));
        assert_eq!(m.last_error(), Some("IMU timeout"));
        assert_eq!(m.status(), DeviceStatus::Checking);
    }

    #[test]
    fn shared_reply_and_error_channel_still_confirms() {
        let channels = ChannelConfig {
            error: "esp32/deviceStatus".into(),
            ..ChannelConfig::default()
        };
        let mut t = RecordingTransport::default();
        let mut m = LivenessMonitor::new(channels);
        m.begin(sid(1), &mut t);
        assert_eq!(t.subscriptions(), ["esp32/deviceStatus"]);
        assert!(m.on_tick(sid(1), &mut t));

        let out = m.on_message(sid(1), "esp32/deviceStatus", b"DEVICE_OK");
        assert_eq!(out, LivenessOutcome::Affirmed);
        assert_eq!(m.status(), DeviceStatus::Connected);
        assert_eq!(m.last_error(), None);

        // Outro texto no canal compartilhado continua sendo erro
        let out = m.on_message(sid(1), "esp32/deviceStatus", b"sensor falhou");
        assert_eq!(out, LivenessOutcome::DeviceError("sensor falhou".into()));
        assert_eq!(m.status(), DeviceStatus::Connected);
    }

    #[test]
    fn end_is_idempotent_and_safe_without_session() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.end(&mut t);
        assert!(t.calls.is_empty());

        m.begin(sid(1), &mut t);
        m.end(&mut t);
        m.end(&mut t);
        assert_eq!(m.status(), DeviceStatus::Unknown);
        let closes = t
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Close(_)))
            .count();
        assert_eq!(closes, 1);
        assert!(t.open.is_empty());
    }

    #[test]
    fn stale_tick_after_supersede_is_rejected() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        m.begin(sid(2), &mut t);

        assert!(t.calls.contains(&Call::Close(sid(1))));
        assert!(!m.on_tick(sid(1), &mut t));
        assert!(m.on_tick(sid(2), &mut t));
        assert_eq!(t.count_publish("esp32/checkDevice", "CHECK_DEVICE"), 1);
    }

    #[test]
    fn stale_reply_after_supersede_is_rejected() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        m.begin(sid(2), &mut t);
        let out = m.on_message(sid(1), "esp32/deviceStatus", b"DEVICE_OK");
        assert_eq!(out, LivenessOutcome::Ignored);
        assert_eq!(m.status(), DeviceStatus::Checking);
    }

    #[test]
    fn open_failure_is_retried_on_tick() {
        let mut t = RecordingTransport {
            fail_open: true,
            ..Default::default()
        };
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        assert_eq!(m.status(), DeviceStatus::Checking);
        assert!(!m.on_tick(sid(1), &mut t));

        t.fail_open = false;
        assert!(m.on_tick(sid(1), &mut t));
        assert_eq!(t.count_publish("esp32/checkDevice", "CHECK_DEVICE"), 1);
    }

    #[test]
    fn publish_failure_keeps_polling() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        t.fail_publish = true;
        assert!(!m.on_tick(sid(1), &mut t));
        t.fail_publish = false;
        assert!(m.on_tick(sid(1), &mut t));
        assert_eq!(m.status(), DeviceStatus::Checking);
    }

    #[test]
    fn reconnect_resubscribes() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        m.on_ready(sid(1), &mut t);
        assert_eq!(t.subscriptions().len(), 2);
        m.on_ready(sid(1), &mut t);
        assert_eq!(t.subscriptions().len(), 4);
        m.on_ready(sid(9), &mut t);
        assert_eq!(t.subscriptions().len(), 4);
    }

    #[test]
    fn release_keeps_status() {
        let mut t = RecordingTransport::default();
        let mut m = monitor();
        m.begin(sid(1), &mut t);
        m.on_message(sid(1), "esp32/deviceStatus", b"DEVICE_OK");
        m.release(&mut t);
        assert_eq!(m.status(), DeviceStatus::Connected);
        assert_eq!(m.session(), None);
        assert!(t.calls.contains(&Call::Unsubscribe(sid(1), "esp32/deviceStatus".into())));
    }
}
