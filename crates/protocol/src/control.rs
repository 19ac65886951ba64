//! Status-Protokoll des Hubs
//!
//! Definiert alle Nachrichten die ueber die persistente Socket-Verbindung
//! zwischen Geraete-Agenten, Dashboards und dem Hub ausgetauscht werden.
//!
//! ## Design
//! - JSON-Serialisierung via serde (Statusdaten, nicht zeitkritisch)
//! - Tagged Enum (`"type"`-Feld) fuer typsichere Nachrichtentypen
//! - Event-Push statt Request/Response: der Hub beantwortet nur die
//!   Rollen-Anmeldung (`auth_ok`/`dashboard_ok`), Heartbeats bleiben
//!   absichtlich unbestaetigt um Chatter zu minimieren

use serde::{Deserialize, Serialize};

use kamerad_core::event::{StatusWechsel, StatusZusammenfassung};
use kamerad_core::types::{CameraId, GeraeteStatus, Hostname, KameraStatus};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InternalError,
    InvalidRequest,
    /// Hostname nicht im Geraeteverzeichnis – Auth-Fehler ist terminal
    UnknownHostname,
    ServerFull,
}

// ---------------------------------------------------------------------------
// Statusberichte (Geraet -> Hub)
// ---------------------------------------------------------------------------

/// Zustand einer einzelnen Kamera innerhalb eines Berichts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KameraBericht {
    pub identifier: CameraId,
    pub status: KameraStatus,
}

/// Vollstaendiger Gesundheitsbericht eines Geraets
///
/// Kameras die in einem Bericht fehlen gelten als "keine neue Information",
/// nicht als offline – Teilberichte sind zulaessig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: GeraeteStatus,
    pub cameras: Vec<KameraBericht>,
}

/// Rollen-Anmeldung eines Geraets mit Initialzustand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub hostname: Hostname,
    pub system_status: SystemStatus,
}

/// Bestaetigung der Geraete-Anmeldung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthOk {
    pub hostname: Hostname,
    pub device_name: String,
}

/// Periodischer Lebenszeichen- und Zustandsbericht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    /// Unix-Timestamp (Sekunden) des Geraets beim Absenden
    pub timestamp: u64,
    pub system_status: SystemStatus,
}

// ---------------------------------------------------------------------------
// Status-Events (Hub -> Dashboards)
// ---------------------------------------------------------------------------

/// Geraete-Statusereignis (nvr_online / nvr_offline / nvr_status_update)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvrEvent {
    pub hostname: Hostname,
    pub device_name: String,
    /// Anzahl Kamera-Updates die im selben Bericht mitkamen
    pub cameras_updated: u32,
    /// Unix-Timestamp (Sekunden) des Uebergangs
    pub timestamp: u64,
}

/// Kamera-Statusereignis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KameraUpdate {
    pub hostname: Hostname,
    pub identifier: CameraId,
    pub old_status: KameraStatus,
    pub new_status: KameraStatus,
    pub timestamp: u64,
}

/// Neu berechnete Zusammenfassungs-Zaehler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsUpdate {
    #[serde(flatten)]
    pub zaehler: StatusZusammenfassung,
    pub timestamp: u64,
}

/// Standardisierter Fehler-Frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: ControlMessage
// ---------------------------------------------------------------------------

/// Alle moeglichen Protokoll-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    // Geraet -> Hub
    Auth(AuthRequest),
    Heartbeat(HeartbeatMessage),

    // Hub -> Geraet
    AuthOk(AuthOk),

    // Dashboard -> Hub
    Dashboard,

    // Hub -> Dashboard
    DashboardOk,
    NvrOnline(NvrEvent),
    NvrOffline(NvrEvent),
    NvrStatusUpdate(NvrEvent),
    CameraStatusUpdate(KameraUpdate),
    StatsUpdate(StatsUpdate),

    // Fehler (beide Richtungen)
    Error(ErrorResponse),
}

impl ControlMessage {
    /// Erstellt einen Fehler-Frame
    pub fn fehler(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorResponse {
            code,
            message: message.into(),
        })
    }

    /// Erstellt die Auth-Bestaetigung
    pub fn auth_ok(hostname: Hostname, device_name: impl Into<String>) -> Self {
        Self::AuthOk(AuthOk {
            hostname,
            device_name: device_name.into(),
        })
    }

    /// Erstellt einen Stats-Frame aus neu berechneten Zaehlern
    pub fn stats(zaehler: StatusZusammenfassung, timestamp: u64) -> Self {
        Self::StatsUpdate(StatsUpdate { zaehler, timestamp })
    }

    /// Uebersetzt einen `StatusWechsel` in den passenden Dashboard-Frame
    ///
    /// Geraete-Uebergaenge werden nach dem NEUEN Status klassifiziert:
    /// online -> `nvr_online`, offline -> `nvr_offline`, unstable ->
    /// `nvr_status_update`. `cameras_updated` traegt die Anzahl der
    /// Kamera-Updates aus demselben Bericht.
    pub fn aus_statuswechsel(
        wechsel: &StatusWechsel,
        device_name: &str,
        cameras_updated: u32,
    ) -> Self {
        match wechsel {
            StatusWechsel::Geraet {
                hostname,
                neu,
                zeitpunkt,
                ..
            } => {
                let event = NvrEvent {
                    hostname: hostname.clone(),
                    device_name: device_name.to_string(),
                    cameras_updated,
                    timestamp: zeitpunkt.timestamp() as u64,
                };
                match neu {
                    GeraeteStatus::Online => Self::NvrOnline(event),
                    GeraeteStatus::Offline => Self::NvrOffline(event),
                    GeraeteStatus::Instabil => Self::NvrStatusUpdate(event),
                }
            }
            StatusWechsel::Kamera {
                hostname,
                kamera,
                alt,
                neu,
                zeitpunkt,
            } => Self::CameraStatusUpdate(KameraUpdate {
                hostname: hostname.clone(),
                identifier: kamera.clone(),
                old_status: *alt,
                new_status: *neu,
                timestamp: zeitpunkt.timestamp() as u64,
            }),
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
