//! Estado espelhado na UI a partir das [`Update`]s do supervisor.
//!
//! Nada aqui depende do egui: a UI só lê este estado e manda [`Command`]s.
//!
//! [`Command`]: telemetry_core::runtime::Command

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use telemetry_core::buffer::RollingBuffer;
use telemetry_core::config::SessionConfig;
use telemetry_core::runtime::Update;
use telemetry_core::supervisor::SupervisorEvent;
use telemetry_core::types::{DeviceStatus, StatusSnapshot, StreamState};

/// Quantas notificações ficam visíveis ao mesmo tempo.
const MAX_NOTICES: usize = 5;

/// Tempo de vida de uma notificação na tela.
pub const NOTICE_TTL: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    pub at: Instant,
}

/// Espelho do supervisor do lado da UI.
pub struct UiState {
    pub status: StatusSnapshot,
    pub buffer: RollingBuffer,
    pub notices: VecDeque<Notice>,
    pub columns: Vec<String>,
}

impl UiState {
    pub fn new(session: &SessionConfig) -> Self {
        Self {
            status: StatusSnapshot::default(),
            buffer: RollingBuffer::new(session.window_capacity, session.history_cap),
            notices: VecDeque::with_capacity(MAX_NOTICES),
            columns: session.columns.clone(),
        }
    }

    /// Aplica uma atualização vinda da thread do supervisor.
    pub fn apply(&mut self, update: Update) {
        match update {
            Update::Event(SupervisorEvent::Status(status)) => self.status = status,
            Update::Event(SupervisorEvent::Appended(reading)) => self.buffer.append(reading),
            Update::Event(SupervisorEvent::Cleared) => self.buffer.clear(),
            Update::Event(SupervisorEvent::DeviceError(msg)) => {
                self.notify(NoticeKind::Error, format!("Erro do dispositivo: {msg}"));
            }
            Update::Event(SupervisorEvent::ConnectionLost(msg)) => {
                self.notify(NoticeKind::Error, format!("Conexão perdida: {msg}"));
            }
            Update::Event(SupervisorEvent::DecodeFailed(msg)) => {
                self.notify(NoticeKind::Warning, format!("Leitura descartada: {msg}"));
            }
            Update::Exported(report) => {
                self.notify(
                    NoticeKind::Info,
                    format!("{} linhas salvas em {}", report.rows, report.location.display()),
                );
            }
            Update::CommandFailed(msg) => self.notify(NoticeKind::Warning, msg),
        }
    }

    pub fn notify(&mut self, kind: NoticeKind, text: String) {
        if self.notices.len() >= MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            kind,
            text,
            at: Instant::now(),
        });
    }

    /// Remove notificações vencidas.
    pub fn expire_notices(&mut self, now: Instant) {
        self.notices
            .retain(|n| now.saturating_duration_since(n.at) < NOTICE_TTL);
    }

    pub fn can_check(&self) -> bool {
        self.status.stream == StreamState::Idle && self.status.device != DeviceStatus::Connected
    }

    pub fn can_start(&self) -> bool {
        self.status.device == DeviceStatus::Connected && self.status.stream == StreamState::Idle
    }

    pub fn can_stop(&self) -> bool {
        self.status.stream.is_active()
    }

    /// Salvar e limpar só com histórico e stream parado.
    pub fn can_save(&self) -> bool {
        self.status.stream == StreamState::Idle && !self.buffer.is_empty()
    }

    pub fn can_clear(&self) -> bool {
        self.can_save()
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
