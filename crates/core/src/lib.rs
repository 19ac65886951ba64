//! kamerad-core – Gemeinsame Typen fuer alle Kamerad-Crates
//!
//! Enthaelt die Identifikationstypen (Newtype-Pattern), die Status-Enums,
//! den `StatusWechsel`-Event-Typ, die Collaborator-Traits (Geraeteverzeichnis,
//! Verlaufssenke) und den globalen Fehlertyp.

pub mod error;
pub mod event;
pub mod types;
pub mod verzeichnis;

pub use error::{KameradError, Result};
pub use event::{StatusWechsel, StatusZusammenfassung};
pub use types::{CameraId, ClientRolle, ConnectionId, GeraeteStatus, Hostname, KameraStatus};
pub use verzeichnis::{
    GeraetEintrag, GeraeteVerzeichnis, SpeicherVerlauf, StatischesVerzeichnis, VerlaufSenke,
};
