//! Supervisor: a máquina de estados completa de uma sessão.
//!
//! Dono único de `DeviceStatus`, `StreamState` e do histórico. Cada método
//! aplica um evento de forma síncrona; quem dirige (o runtime) garante que
//! nunca há dois eventos ao mesmo tempo. Mudanças de estado saem como
//! [`SupervisorEvent`]s via [`Supervisor::drain_events`].
//!
//! Toda sessão aberta recebe uma geração nova. Ticks e mensagens que chegam
//! com geração antiga são descartados, então timers e assinaturas de um
//! ciclo anterior nunca alteram o ciclo atual.

use crate::buffer::RollingBuffer;
use crate::config::AppConfig;
use crate::error::SupervisorError;
use crate::export::{ExportReport, Exporter, export_history};
use crate::liveness::{LivenessMonitor, LivenessOutcome};
use crate::protocol::ReadingParser;
use crate::stream::StreamController;
use crate::transport::{SessionId, SessionKind, Transport, TransportError, TransportEvent};
use crate::types::{DeviceStatus, Reading, StatusSnapshot, StreamState};
use tracing::{debug, error, info, warn};

/// Notificações para a camada de apresentação.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    Status(StatusSnapshot),
    Appended(Reading),
    Cleared,
    DeviceError(String),
    ConnectionLost(String),
    DecodeFailed(String),
}

pub struct Supervisor<T: Transport> {
    transport: T,
    monitor: LivenessMonitor,
    stream: StreamController,
    parser: ReadingParser,
    buffer: RollingBuffer,
    generation: u64,
    decode_failures: u64,
    last_status: StatusSnapshot,
    events: Vec<SupervisorEvent>,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(config: &AppConfig, transport: T) -> Self {
        let session = &config.session;
        Self {
            transport,
            monitor: LivenessMonitor::new(config.channels.clone()),
            stream: StreamController::new(config.channels.clone()),
            parser: session.parser(),
            buffer: RollingBuffer::new(session.window_capacity, session.history_cap),
            generation: 0,
            decode_failures: 0,
            last_status: StatusSnapshot::default(),
            events: Vec::new(),
        }
    }

    // ──────────────────────────────────────────
    // Leitura de estado
    // ──────────────────────────────────────────

    pub fn device_status(&self) -> DeviceStatus {
        self.monitor.status()
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream.state()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.monitor.last_error()
    }

    pub fn buffer(&self) -> &RollingBuffer {
        &self.buffer
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    /// Geração da verificação que ainda precisa de pedidos de verificação. O timer de
    /// polling deve existir se, e somente se, isto for `Some`.
    pub fn poll_generation(&self) -> Option<u64> {
        if self.stream.state().is_active() {
            return None;
        }
        self.monitor.polling_session().map(|s| s.generation)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            device: self.monitor.status(),
            last_error: self.monitor.last_error().map(str::to_string),
            stream: self.stream.state(),
            history_len: self.buffer.len(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Retira as notificações acumuladas desde a última chamada.
    pub fn drain_events(&mut self) -> Vec<SupervisorEvent> {
        std::mem::take(&mut self.events)
    }

    // ──────────────────────────────────────────
    // Verificação do dispositivo
    // ──────────────────────────────────────────

    /// Abre uma nova verificação, derrubando a anterior. Proibido com o
    /// stream ativo; não faz nada se o dispositivo já está confirmado.
    pub fn begin_liveness_check(&mut self) -> Result<(), SupervisorError> {
        if self.stream.state() != StreamState::Idle {
            return Err(SupervisorError::StreamActive);
        }
        if self.monitor.status() == DeviceStatus::Connected && self.monitor.session().is_some() {
            debug!("Dispositivo já confirmado");
            return Ok(());
        }
        let id = self.next_session(SessionKind::Liveness);
        self.monitor.begin(id, &mut self.transport);
        self.publish_status();
        Ok(())
    }

    /// Encerra a verificação e volta o dispositivo para `Unknown`. Idempotente.
    pub fn end_liveness_check(&mut self) {
        if self.stream.state().is_active() {
            debug!("Stream ativo, nada a encerrar na verificação");
            return;
        }
        self.monitor.end(&mut self.transport);
        self.publish_status();
    }

    /// Tick do timer de polling armado para `generation`.
    pub fn on_poll_tick(&mut self, generation: u64) {
        if self.stream.state().is_active() {
            return;
        }
        let id = SessionId {
            kind: SessionKind::Liveness,
            generation,
        };
        self.monitor.on_tick(id, &mut self.transport);
    }

    // ──────────────────────────────────────────
    // Stream
    // ──────────────────────────────────────────

    /// Inicia o stream. Exige dispositivo confirmado; sem efeito se já está
    /// iniciando ou rodando.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if self.stream.state().is_active() {
            debug!("start() ignorado: stream já {}", self.stream.state());
            return Ok(());
        }
        if self.monitor.status() != DeviceStatus::Connected {
            warn!("start() recusado: dispositivo {}", self.monitor.status());
            return Err(SupervisorError::DeviceNotReady);
        }

        // Verificação e stream nunca rodam juntos
        self.monitor.release(&mut self.transport);

        let id = self.next_session(SessionKind::Stream);
        if let Err(e) = self.stream.start(id, &mut self.transport) {
            self.connection_lost(e);
        }
        self.publish_status();
        Ok(())
    }

    /// Para o stream: STOP melhor esforço, sessão fechada, dispositivo volta
    /// para `Unknown`. Sem efeito se já está parado.
    pub fn stop(&mut self) {
        if !self.stream.stop(&mut self.transport) {
            debug!("stop() ignorado: stream já parado");
            return;
        }
        self.monitor.end(&mut self.transport);
        self.publish_status();
    }

    // ──────────────────────────────────────────
    // Histórico
    // ──────────────────────────────────────────

    pub fn clear(&mut self) {
        self.buffer.clear();
        info!("Histórico limpo");
        self.events.push(SupervisorEvent::Cleared);
        self.publish_status();
    }

    pub fn export(&self, exporter: &dyn Exporter, name: &str) -> Result<ExportReport, SupervisorError> {
        Ok(export_history(exporter, name, self.parser.columns(), &self.buffer)?)
    }

    // ──────────────────────────────────────────
    // Eventos do transporte
    // ──────────────────────────────────────────

    pub fn handle_event(&mut self, event: TransportEvent) {
        let session = event.session();
        if !self.is_current(session) {
            debug!("Evento de sessão obsoleta ignorado ({session})");
            return;
        }

        match event {
            TransportEvent::Ready(id) => self.on_ready(id),
            TransportEvent::Message {
                session,
                channel,
                payload,
            } => self.on_message(session, &channel, &payload),
            TransportEvent::Error { session, error } => self.on_transport_error(session, error),
        }
        self.publish_status();
    }

    fn on_ready(&mut self, id: SessionId) {
        match id.kind {
            SessionKind::Liveness => self.monitor.on_ready(id, &mut self.transport),
            SessionKind::Stream => {
                if let Err(e) = self.stream.on_ready(id, &mut self.transport) {
                    self.connection_lost(e);
                }
            }
        }
    }

    fn on_message(&mut self, id: SessionId, channel: &str, payload: &[u8]) {
        if self.stream.accepts_data(id, channel) {
            self.ingest(payload);
            return;
        }

        match id.kind {
            SessionKind::Liveness => match self.monitor.on_message(id, channel, payload) {
                LivenessOutcome::DeviceError(message) => {
                    self.events.push(SupervisorEvent::DeviceError(message));
                }
                LivenessOutcome::Affirmed | LivenessOutcome::Ignored => {}
            },
            SessionKind::Stream => {
                if self.stream.is_device_error(id, channel) {
                    let message = String::from_utf8_lossy(payload).into_owned();
                    self.monitor.record_error(message.clone());
                    self.events.push(SupervisorEvent::DeviceError(message));
                } else {
                    debug!("Mensagem em {channel} ignorada ({id})");
                }
            }
        }
    }

    fn ingest(&mut self, payload: &[u8]) {
        match self.parser.parse(payload) {
            Ok(reading) => {
                self.buffer.append(reading.clone());
                self.events.push(SupervisorEvent::Appended(reading));
            }
            Err(e) => {
                self.decode_failures += 1;
                warn!("Leitura descartada: {e}");
                self.events.push(SupervisorEvent::DecodeFailed(e.to_string()));
            }
        }
    }

    fn on_transport_error(&mut self, id: SessionId, error: TransportError) {
        match id.kind {
            SessionKind::Liveness => self.monitor.on_transport_error(id, &error),
            SessionKind::Stream => self.connection_lost(error),
        }
    }

    /// Erro de transporte no stream: volta para `Idle`, sem reinício automático.
    fn connection_lost(&mut self, error: TransportError) {
        error!("Conexão do stream perdida: {error}");
        self.stream.abort(&mut self.transport);
        self.monitor.end(&mut self.transport);
        self.events.push(SupervisorEvent::ConnectionLost(error.to_string()));
    }

    // ──────────────────────────────────────────
    // Ciclo de vida
    // ──────────────────────────────────────────

    /// Libera toda sessão aberta. Chamado também no `Drop`.
    pub fn shutdown(&mut self) {
        self.stream.stop(&mut self.transport);
        self.monitor.end(&mut self.transport);
        self.publish_status();
    }

    fn next_session(&mut self, kind: SessionKind) -> SessionId {
        self.generation += 1;
        SessionId {
            kind,
            generation: self.generation,
        }
    }

    fn is_current(&self, id: SessionId) -> bool {
        match id.kind {
            SessionKind::Liveness => self.monitor.session() == Some(id),
            SessionKind::Stream => self.stream.session() == Some(id),
        }
    }

    fn publish_status(&mut self) {
        let status = self.snapshot();
        if status != self.last_status {
            self.last_status = status.clone();
            self.events.push(SupervisorEvent::Status(status));
        }
    }
}

impl<T: Transport> Drop for Supervisor<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::CsvExporter;
    use crate::transport::testing::{Call, RecordingTransport};

    type TestSupervisor = Supervisor<RecordingTransport>;

    fn supervisor() -> TestSupervisor {
        Supervisor::new(&AppConfig::default(), RecordingTransport::default())
    }

    fn liveness_id(sup: &TestSupervisor) -> SessionId {
        SessionId {
            kind: SessionKind::Liveness,
            generation: sup.poll_generation().expect("verificação ativa"),
        }
    }

    fn message(session: SessionId, channel: &str, payload: &str) -> TransportEvent {
        TransportEvent::Message {
            session,
            channel: channel.into(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    /// Verifica e confirma o dispositivo.
    fn confirm(sup: &mut TestSupervisor) {
        sup.begin_liveness_check().unwrap();
        let id = liveness_id(sup);
        sup.on_poll_tick(id.generation);
        sup.handle_event(message(id, "esp32/deviceStatus", "DEVICE_OK"));
        assert_eq!(sup.device_status(), DeviceStatus::Connected);
    }

    /// Confirma, inicia e entrega o `Ready` da sessão do stream.
    fn running(sup: &mut TestSupervisor) -> SessionId {
        confirm(sup);
        sup.start().unwrap();
        let id = sup.stream.session().expect("sessão do stream");
        sup.handle_event(TransportEvent::Ready(id));
        assert_eq!(sup.stream_state(), StreamState::Running);
        id
    }

    #[test]
    fn guarded_start_fails_without_side_effects() {
        let mut sup = supervisor();
        assert!(matches!(sup.start(), Err(SupervisorError::DeviceNotReady)));
        assert_eq!(sup.stream_state(), StreamState::Idle);
        assert_eq!(sup.device_status(), DeviceStatus::Unknown);
        assert!(sup.transport().calls.is_empty());
    }

    #[test]
    fn device_that_never_replies_blocks_start() {
        let mut sup = supervisor();
        sup.begin_liveness_check().unwrap();
        let id = liveness_id(&sup);
        for _ in 0..20 {
            sup.on_poll_tick(id.generation);
            sup.handle_event(message(id, "esp32/deviceStatus", "BOOTING"));
            assert_eq!(sup.device_status(), DeviceStatus::Checking);
            assert!(matches!(sup.start(), Err(SupervisorError::DeviceNotReady)));
        }
        assert_eq!(sup.transport().count_publish("esp32/checkDevice", "CHECK_DEVICE"), 20);
        assert!(!sup.transport().subscriptions().contains(&"esp32/affoData".to_string()));
    }

    #[test]
    fn start_releases_liveness_session_and_stops_polling() {
        let mut sup = supervisor();
        confirm(&mut sup);
        let check = sup.monitor.session().unwrap();
        sup.start().unwrap();

        assert!(sup.transport().calls.contains(&Call::Close(check)));
        assert_eq!(sup.poll_generation(), None);
        assert_eq!(sup.stream_state(), StreamState::Starting);
        // START só depois da sessão pronta
        assert_eq!(sup.transport().count_publish("esp32/control", "START"), 0);
    }

    #[test]
    fn fifteen_readings_fill_history_and_window() {
        let mut sup = supervisor();
        let id = running(&mut sup);
        for i in 1..=15 {
            sup.handle_event(message(id, "esp32/affoData", &format!("{i},{i},{i},{i}")));
        }

        assert_eq!(sup.buffer().len(), 15);
        let window: Vec<f64> = sup.buffer().window().map(|r| r.get("fsr1").unwrap()).collect();
        let expected: Vec<f64> = (6..=15).map(|i| i as f64).collect();
        assert_eq!(window, expected);

        let dir = tempfile::tempdir().unwrap();
        let report = sup.export(&CsvExporter::new(dir.path()), "data").unwrap();
        assert_eq!(report.rows, 15);
        let text = std::fs::read_to_string(report.location).unwrap();
        assert_eq!(text.lines().count(), 16);
        assert_eq!(text.lines().next(), Some("timestamp,fsr1,fsr2,pitch,servo"));
    }

    #[test]
    fn short_payload_is_kept_with_absent_fields() {
        let mut sup = supervisor();
        let id = running(&mut sup);
        sup.handle_event(message(id, "esp32/affoData", "1.5,2.3"));
        let r = sup.buffer().history().next().unwrap();
        assert_eq!(r.get("fsr1"), Some(1.5));
        assert_eq!(r.get("fsr2"), Some(2.3));
        assert_eq!(r.get("pitch"), None);
        assert_eq!(r.get("servo"), None);
    }

    #[test]
    fn bad_payload_is_dropped_and_stream_continues() {
        let mut sup = supervisor();
        let id = running(&mut sup);
        sup.handle_event(TransportEvent::Message {
            session: id,
            channel: "esp32/affoData".into(),
            payload: vec![0xFF, 0xFE],
        });
        sup.handle_event(message(id, "esp32/affoData", "1,2,3,4"));

        assert_eq!(sup.decode_failures(), 1);
        assert_eq!(sup.buffer().len(), 1);
        assert_eq!(sup.stream_state(), StreamState::Running);
        let events = sup.drain_events();
        assert!(events.iter().any(|e| matches!(e, SupervisorEvent::DecodeFailed(_))));
    }

    #[test]
    fn stop_is_idempotent() {
        let mut sup = supervisor();
        running(&mut sup);

        sup.stop();
        let after_first = sup.snapshot();
        sup.stop();
        let after_second = sup.snapshot();

        assert_eq!(after_first, after_second);
        assert_eq!(after_second.stream, StreamState::Idle);
        assert_eq!(after_second.device, DeviceStatus::Unknown);
        assert_eq!(sup.transport().count_publish("esp32/control", "STOP"), 1);
        assert!(sup.transport().open.is_empty());
    }

    #[test]
    fn restart_without_recheck_fails() {
        let mut sup = supervisor();
        running(&mut sup);
        sup.stop();
        assert!(matches!(sup.start(), Err(SupervisorError::DeviceNotReady)));
    }

    #[test]
    fn start_is_idempotent_while_active() {
        let mut sup = supervisor();
        running(&mut sup);
        let opens_before = sup
            .transport()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Open(_)))
            .count();
        sup.start().unwrap();
        let opens_after = sup
            .transport()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Open(_)))
            .count();
        assert_eq!(opens_before, opens_after);
        assert_eq!(sup.transport().count_publish("esp32/control", "START"), 1);
    }

    #[test]
    fn history_survives_stop_start_cycles() {
        let mut sup = supervisor();
        let id = running(&mut sup);
        sup.handle_event(message(id, "esp32/affoData", "1,1,1,1"));
        sup.stop();

        let id = running(&mut sup);
        sup.handle_event(message(id, "esp32/affoData", "2,2,2,2"));
        assert_eq!(sup.buffer().len(), 2);
    }

    #[test]
    fn clear_resets_history_and_window() {
        let mut sup = supervisor();
        let id = running(&mut sup);
        for i in 0..12 {
            sup.handle_event(message(id, "esp32/affoData", &i.to_string()));
        }
        sup.clear();
        assert_eq!(sup.buffer().len(), 0);
        assert_eq!(sup.buffer().window_len(), 0);
        assert!(sup.drain_events().contains(&SupervisorEvent::Cleared));
    }

    #[test]
    fn export_with_empty_history_fails_visibly() {
        let sup = supervisor();
        let dir = tempfile::tempdir().unwrap();
        let err = sup.export(&CsvExporter::new(dir.path()), "data").unwrap_err();
        assert!(matches!(err, SupervisorError::Export(crate::export::ExportError::EmptyHistory)));
        assert!(!dir.path().join("data.csv").exists());
    }

    #[test]
    fn transport_error_while_running_returns_to_idle() {
        let mut sup = supervisor();
        let id = running(&mut sup);
        sup.drain_events();

        sup.handle_event(TransportEvent::Error {
            session: id,
            error: TransportError::Connection("broker caiu".into()),
        });

        assert_eq!(sup.stream_state(), StreamState::Idle);
        assert_eq!(sup.device_status(), DeviceStatus::Unknown);
        assert!(sup.transport().open.is_empty());
        let events = sup.drain_events();
        assert!(events.iter().any(|e| matches!(e, SupervisorEvent::ConnectionLost(_))));

        // Sem reinício automático
        sup.handle_event(TransportEvent::Ready(id));
        assert_eq!(sup.stream_state(), StreamState::Idle);
    }

    #[test]
    fn transport_error_during_liveness_keeps_polling() {
        let mut sup = supervisor();
        sup.begin_liveness_check().unwrap();
        let id = liveness_id(&sup);
        sup.handle_event(TransportEvent::Error {
            session: id,
            error: TransportError::Connection("recusada".into()),
        });
        assert_eq!(sup.device_status(), DeviceStatus::Checking);
        assert_eq!(sup.poll_generation(), Some(id.generation));
    }

    #[test]
    fn stale_liveness_tick_is_rejected_after_supersede() {
        let mut sup = supervisor();
        sup.begin_liveness_check().unwrap();
        let old = liveness_id(&sup);
        sup.end_liveness_check();
        sup.begin_liveness_check().unwrap();
        let new = liveness_id(&sup);
        assert_ne!(old.generation, new.generation);

        sup.on_poll_tick(old.generation);
        assert_eq!(sup.transport().count_publish("esp32/checkDevice", "CHECK_DEVICE"), 0);
        sup.on_poll_tick(new.generation);
        assert_eq!(sup.transport().count_publish("esp32/checkDevice", "CHECK_DEVICE"), 1);
    }

    #[test]
    fn stale_liveness_reply_cannot_confirm_new_cycle() {
        let mut sup = supervisor();
        sup.begin_liveness_check().unwrap();
        let old = liveness_id(&sup);
        sup.end_liveness_check();
        sup.begin_liveness_check().unwrap();

        sup.handle_event(message(old, "esp32/deviceStatus", "DEVICE_OK"));
        assert_eq!(sup.device_status(), DeviceStatus::Checking);
    }

    #[test]
    fn stale_stream_data_after_restart_is_ignored() {
        let mut sup = supervisor();
        let old = running(&mut sup);
        sup.stop();
        let new = running(&mut sup);
        assert_ne!(old, new);

        sup.handle_event(message(old, "esp32/affoData", "9,9,9,9"));
        assert_eq!(sup.buffer().len(), 0);
        sup.handle_event(message(new, "esp32/affoData", "1,1,1,1"));
        assert_eq!(sup.buffer().len(), 1);
    }

    #[test]
    fn ticks_after_teardown_are_noops() {
        let mut sup = supervisor();
        sup.begin_liveness_check().unwrap();
        let id = liveness_id(&sup);
        sup.end_liveness_check();
        sup.on_poll_tick(id.generation);
        sup.handle_event(message(id, "esp32/deviceStatus", "DEVICE_OK"));
        assert_eq!(sup.device_status(), DeviceStatus::Unknown);
        assert!(sup.transport().publishes().is_empty());
    }

    #[test]
    fn liveness_check_refused_while_streaming() {
        let mut sup = supervisor();
        running(&mut sup);
        assert!(matches!(
            sup.begin_liveness_check(),
            Err(SupervisorError::StreamActive)
        ));
        sup.on_poll_tick(1);
        assert_eq!(sup.transport().count_publish("esp32/checkDevice", "CHECK_DEVICE"), 1);
    }

    #[test]
    fn device_error_during_stream_is_surfaced() {
        let mut sup = supervisor();
        let id = running(&mut sup);
        sup.handle_event(message(id, "esp32/error", "servo travado"));
        assert_eq!(sup.last_error(), Some("servo travado"));
        assert_eq!(sup.stream_state(), StreamState::Running);
        assert!(sup
            .drain_events()
            .contains(&SupervisorEvent::DeviceError("servo travado".into())));
    }

    #[test]
    fn open_failure_on_start_surfaces_connection_lost() {
        let mut sup = supervisor();
        confirm(&mut sup);
        sup.transport_mut().fail_open = true;
        sup.drain_events();

        sup.start().unwrap();
        assert_eq!(sup.stream_state(), StreamState::Idle);
        assert!(sup
            .drain_events()
            .iter()
            .any(|e| matches!(e, SupervisorEvent::ConnectionLost(_))));
    }

    #[test]
    fn status_events_follow_transitions() {
        let mut sup = supervisor();
        sup.begin_liveness_check().unwrap();
        let events = sup.drain_events();
        assert!(matches!(
            events.as_slice(),
            [SupervisorEvent::Status(StatusSnapshot {
                device: DeviceStatus::Checking,
                ..
            })]
        ));
        // Sem mudança, sem evento
        sup.on_poll_tick(liveness_id(&sup).generation);
        assert!(sup.drain_events().is_empty());
    }

    #[test]
    fn drop_releases_every_session() {
        let mut sup = supervisor();
        running(&mut sup);
        sup.shutdown();
        assert!(sup.transport().open.is_empty());
        assert_eq!(sup.transport().count_publish("esp32/control", "STOP"), 1);
    }
}
