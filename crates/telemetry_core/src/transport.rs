//! Fronteira com o transporte publish/subscribe.
//!
//! O core não conhece MQTT: fala com um [`Transport`] e recebe
//! [`TransportEvent`]s marcados com o [`SessionId`] que os originou. Cada
//! sessão aberta recebe uma geração nova; eventos de gerações antigas são
//! descartados pelo supervisor.

use std::fmt;

/// Para que a sessão foi aberta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Liveness,
    Stream,
}

/// Identificador de uma sessão de transporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId {
    pub kind: SessionKind,
    pub generation: u64,
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            SessionKind::Liveness => "liveness",
            SessionKind::Stream => "stream",
        };
        write!(f, "{kind}#{}", self.generation)
    }
}

/// Erros do transporte. Nunca saem do core: são logados e viram notificação.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Falha ao abrir sessão: {0}")]
    Open(String),

    #[error("Falha ao assinar {channel}: {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("Falha ao cancelar assinatura de {channel}: {reason}")]
    Unsubscribe { channel: String, reason: String },

    #[error("Falha ao publicar em {channel}: {reason}")]
    Publish { channel: String, reason: String },

    #[error("Erro de conexão: {0}")]
    Connection(String),

    #[error("Sessão {0} não está aberta")]
    NotOpen(SessionId),
}

/// Evento entregue de forma assíncrona pelo transporte.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Conexão com o broker estabelecida
    Ready(SessionId),
    /// Mensagem recebida num canal assinado
    Message {
        session: SessionId,
        channel: String,
        payload: Vec<u8>,
    },
    /// Conexão caiu ou foi recusada
    Error {
        session: SessionId,
        error: TransportError,
    },
}

impl TransportEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Ready(session) => *session,
            Self::Message { session, .. } | Self::Error { session, .. } => *session,
        }
    }
}

/// Primitivas de transporte consumidas pelo core.
///
/// Nenhum método pode bloquear: pedidos são enfileirados e o resultado
/// chega depois como [`TransportEvent`].
pub trait Transport {
    fn open(&mut self, session: SessionId) -> Result<(), TransportError>;

    fn subscribe(&mut self, session: SessionId, channel: &str) -> Result<(), TransportError>;

    fn unsubscribe(&mut self, session: SessionId, channel: &str) -> Result<(), TransportError>;

    fn publish(&mut self, session: SessionId, channel: &str, payload: &str) -> Result<(), TransportError>;

    /// Fecha a sessão. Deve ser idempotente.
    fn close(&mut self, session: SessionId);
}

/// Transporte em memória que registra cada chamada, para testes.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Open(SessionId),
        Subscribe(SessionId, String),
        Unsubscribe(SessionId, String),
        Publish(SessionId, String, String),
        Close(SessionId),
    }

    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub calls: Vec<Call>,
        pub open: HashSet<SessionId>,
        pub fail_open: bool,
        pub fail_publish: bool,
    }

    impl RecordingTransport {
        pub fn publishes(&self) -> Vec<(String, String)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Publish(_, ch, p) => Some((ch.clone(), p.clone())),
                    _ => None,
                })
                .collect()
        }

        pub fn count_publish(&self, channel: &str, payload: &str) -> usize {
            self.publishes()
                .iter()
                .filter(|(ch, p)| ch == channel && p == payload)
                .count()
        }

        pub fn subscriptions(&self) -> Vec<String> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Subscribe(_, ch) => Some(ch.clone()),
                    _ => None,
                })
                .collect()
        }

        fn ensure_open(&self, session: SessionId) -> Result<(), TransportError> {
            if self.open.contains(&session) {
                Ok(())
            } else {
                Err(TransportError::NotOpen(session))
            }
        }
    }

    impl Transport for RecordingTransport {
        fn open(&mut self, session: SessionId) -> Result<(), TransportError> {
            self.calls.push(Call::Open(session));
            if self.fail_open {
                return Err(TransportError::Open("recusado".into()));
            }
            self.open.insert(session);
            Ok(())
        }

        fn subscribe(&mut self, session: SessionId, channel: &str) -> Result<(), TransportError> {
            self.ensure_open(session)?;
            self.calls.push(Call::Subscribe(session, channel.into()));
            Ok(())
        }

        fn unsubscribe(&mut self, session: SessionId, channel: &str) -> Result<(), TransportError> {
            self.ensure_open(session)?;
            self.calls.push(Call::Unsubscribe(session, channel.into()));
            Ok(())
        }

        fn publish(&mut self, session: SessionId, channel: &str, payload: &str) -> Result<(), TransportError> {
            self.ensure_open(session)?;
            if self.fail_publish {
                return Err(TransportError::Publish {
                    channel: channel.into(),
                    reason: "fila cheia".into(),
                });
            }
            self.calls.push(Call::Publish(session, channel.into(), payload.into()));
            Ok(())
        }

        fn close(&mut self, session: SessionId) {
            if self.open.remove(&session) {
                self.calls.push(Call::Close(session));
            }
        }
    }
}
