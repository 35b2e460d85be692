//! Erros que atravessam a fronteira do supervisor.
//!
//! Só chegam aqui as falhas que o usuário pode resolver. Erros de
//! transporte e de decodificação são tratados dentro do core.

use crate::export::ExportError;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Dispositivo não verificado: rode a verificação antes de iniciar")]
    DeviceNotReady,

    #[error("Stream ativo: pare o stream antes de verificar o dispositivo")]
    StreamActive,

    #[error(transparent)]
    Export(#[from] ExportError),
}
