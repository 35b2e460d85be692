//! Tipos de domínio: leituras, estado do dispositivo e estado do stream.

use std::fmt;
use std::sync::Arc;

// ──────────────────────────────────────────────
// Reading
// ──────────────────────────────────────────────

/// Uma leitura decodificada do stream de telemetria.
///
/// A aridade é fixa por sessão: `values.len()` é sempre igual ao número de
/// colunas configuradas. Campos ausentes ficam como `None`, nunca como zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Horário de captura (atribuído na recepção, não pelo dispositivo)
    pub timestamp: String,
    columns: Arc<[String]>,
    values: Vec<Option<f64>>,
}

impl Reading {
    /// Cria uma leitura. `values` é truncado ou completado com `None` até a
    /// quantidade de colunas.
    pub fn new(timestamp: String, columns: Arc<[String]>, mut values: Vec<Option<f64>>) -> Self {
        values.resize(columns.len(), None);
        Self {
            timestamp,
            columns,
            values,
        }
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Valor do campo pelo nome da coluna.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values[i])
    }

    /// Valor para plotagem: ausente vira `NaN` ("sem ponto").
    pub fn plot_value(&self, index: usize) -> f64 {
        self.values.get(index).copied().flatten().unwrap_or(f64::NAN)
    }
}

// ──────────────────────────────────────────────
// DeviceStatus
// ──────────────────────────────────────────────

/// Presença do dispositivo remoto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceStatus {
    #[default]
    Unknown,
    Checking,
    Connected,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "desconhecido",
            Self::Checking => "verificando",
            Self::Connected => "conectado",
        };
        f.write_str(s)
    }
}

// ──────────────────────────────────────────────
// StreamState
// ──────────────────────────────────────────────

/// Estado do stream de telemetria. `Idle` é inicial e terminal de cada ciclo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl StreamState {
    /// `Starting` ou `Running`.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "parado",
            Self::Starting => "iniciando",
            Self::Running => "rodando",
            Self::Stopping => "parando",
        };
        f.write_str(s)
    }
}

// ──────────────────────────────────────────────
// Snapshot de status
// ──────────────────────────────────────────────

/// Fotografia do estado do supervisor, enviada para a UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub device: DeviceStatus,
    pub last_error: Option<String>,
    pub stream: StreamState,
    pub history_len: usize,
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
