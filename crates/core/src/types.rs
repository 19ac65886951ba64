//! Gemeinsame Identifikations- und Statustypen fuer Kamerad
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Verbindungs-ID – stabil fuer die Lebensdauer einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Hostname eines NVR-Geraets – der eindeutige Schluessel der Flotte
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hostname(pub String);

impl Hostname {
    /// Erstellt einen Hostname aus einem String
    pub fn neu(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Gibt den inneren String zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prueft ob der Hostname leer ist (ungueltig fuer die Registrierung)
    pub fn ist_leer(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Hostname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Hostname {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kamera-Kennung innerhalb eines Geraets (z.B. "CAM-001")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraId(pub String);

impl CameraId {
    /// Erstellt eine CameraId aus einem String
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt den inneren String zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CameraId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Gesundheitszustand eines Geraets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeraeteStatus {
    Online,
    Offline,
    /// Erreichbar, aber mit Problemen (z.B. einzelne Kameras gestoert)
    #[serde(rename = "unstable")]
    Instabil,
}

impl std::fmt::Display for GeraeteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Instabil => write!(f, "unstable"),
        }
    }
}

/// Gesundheitszustand einer einzelnen Kamera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KameraStatus {
    Online,
    Offline,
}

impl std::fmt::Display for KameraStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Rolle einer Verbindung am Hub
///
/// Jede Verbindung startet als `Unauthentifiziert` und wird durch genau
/// eine Rollen-Anmeldung (`auth` oder `dashboard`) auf ihre endgueltige
/// Rolle festgelegt. Ein Rollenwechsel danach ist nicht vorgesehen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRolle {
    /// Verbunden, noch keine Rollen-Anmeldung empfangen
    Unauthentifiziert,
    /// NVR-Agent, meldet Gesundheitszustand via auth/heartbeat
    Geraet,
    /// Dashboard-Konsument, empfaengt Status-Broadcasts
    Dashboard,
}
