//! Fehlertypen fuer die Client-Bibliothek

use thiserror::Error;

/// Fehlertyp fuer die Client-Bibliothek
#[derive(Debug, Error)]
pub enum ClientError {
    /// IO-Fehler beim Verbindungsaufbau (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Die Engine-Task laeuft nicht mehr
    #[error("Engine beendet")]
    EngineBeendet,
}

/// Result-Typ fuer die Client-Bibliothek
pub type ClientResult<T> = Result<T, ClientError>;
