//! Fehlertypen fuer den Status-Hub
//!
//! Protokoll- und Anmeldefehler laufen in-band als `error`-Frames zum
//! Client; hier landet nur was den Hub selbst betrifft.

use thiserror::Error;

/// Fehlertyp fuer den Status-Hub
#[derive(Debug, Error)]
pub enum HubError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

/// Result-Typ fuer den Status-Hub
pub type HubResult<T> = Result<T, HubError>;
