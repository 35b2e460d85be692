//! Protocolo textual trocado com o ESP32.
//!
//! Tokens de controle são literais; cada mensagem no canal de dados é uma
//! leitura completa, campos separados por um delimitador fixo:
//!
//! ```text
//! fsr1,fsr2,pitch,servo
//! 12.5,11.0,-3.2,90
//! ```
//!
//! O mapeamento é posicional: o i-ésimo token vai para a i-ésima coluna
//! configurada. Tokens a menos deixam campos ausentes; tokens a mais são
//! ignorados; token não numérico vira campo ausente.

use crate::types::Reading;
use chrono::{DateTime, Local};
use std::sync::Arc;

/// Comando publicado no canal de controle para iniciar o stream.
pub const CMD_START: &str = "START";

/// Comando publicado no canal de controle para parar o stream.
pub const CMD_STOP: &str = "STOP";

/// Pedido publicado no canal de verificação.
pub const CMD_CHECK_DEVICE: &str = "CHECK_DEVICE";

/// Resposta afirmativa do dispositivo ao pedido de verificação.
pub const REPLY_DEVICE_OK: &str = "DEVICE_OK";

/// Formato padrão do timestamp de captura.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S%.3f";

/// Erros de decodificação de uma mensagem de dados.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Payload não é UTF-8 válido")]
    InvalidUtf8,

    #[error("Payload vazio")]
    Empty,
}

/// Decodificador posicional de leituras.
#[derive(Debug, Clone)]
pub struct ReadingParser {
    columns: Arc<[String]>,
    delimiter: char,
    timestamp_format: String,
}

impl ReadingParser {
    pub fn new(columns: &[String], delimiter: char) -> Self {
        Self {
            columns: columns.to_vec().into(),
            delimiter,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.into(),
        }
    }

    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Decodifica o payload carimbando o relógio local de agora.
    pub fn parse(&self, payload: &[u8]) -> Result<Reading, DecodeError> {
        self.parse_at(payload, Local::now())
    }

    /// Decodifica o payload com um horário de captura explícito.
    pub fn parse_at(&self, payload: &[u8], captured_at: DateTime<Local>) -> Result<Reading, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DecodeError::Empty);
        }

        let values = text
            .split(self.delimiter)
            .take(self.columns.len())
            .map(parse_field)
            .collect();

        let timestamp = captured_at.format(&self.timestamp_format).to_string();
        Ok(Reading::new(timestamp, Arc::clone(&self.columns), values))
    }
}

fn parse_field(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// `true` se o payload do canal de verificação é a resposta afirmativa.
pub fn is_device_ok(payload: &[u8]) -> bool {
    std::str::from_utf8(payload).is_ok_and(|s| s.trim() == REPLY_DEVICE_OK)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
