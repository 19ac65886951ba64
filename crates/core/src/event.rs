//! Statuswechsel-Ereignisse
//!
//! Ein `StatusWechsel` beschreibt genau einen Uebergang (Geraet oder Kamera)
//! von einem alten zu einem neuen Status. Ereignisse sind nach der Erzeugung
//! unveraenderlich; der Aggregator produziert sie, der Broadcast-Schritt
//! konsumiert sie.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CameraId, GeraeteStatus, Hostname, KameraStatus};

/// Ein einzelner Statusuebergang, unveraenderlich nach Erzeugung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subject_type", rename_all = "snake_case")]
pub enum StatusWechsel {
    /// Geraete-Uebergang (online/offline/unstable)
    Geraet {
        hostname: Hostname,
        alt: GeraeteStatus,
        neu: GeraeteStatus,
        zeitpunkt: DateTime<Utc>,
    },
    /// Kamera-Uebergang (online/offline)
    Kamera {
        hostname: Hostname,
        kamera: CameraId,
        alt: KameraStatus,
        neu: KameraStatus,
        zeitpunkt: DateTime<Utc>,
    },
}

impl StatusWechsel {
    /// Gibt den Hostname des betroffenen Geraets zurueck
    pub fn hostname(&self) -> &Hostname {
        match self {
            Self::Geraet { hostname, .. } | Self::Kamera { hostname, .. } => hostname,
        }
    }

    /// Gibt den Zeitpunkt des Uebergangs zurueck
    pub fn zeitpunkt(&self) -> DateTime<Utc> {
        match self {
            Self::Geraet { zeitpunkt, .. } | Self::Kamera { zeitpunkt, .. } => *zeitpunkt,
        }
    }

    /// Prueft ob dies ein Kamera-Ereignis ist
    pub fn ist_kamera(&self) -> bool {
        matches!(self, Self::Kamera { .. })
    }
}

/// Zusammenfassungs-Zaehler ueber die gesamte Flotte
///
/// Wird immer als vollstaendiger Fold ueber den aktuellen Zustand berechnet,
/// nie inkrementell fortgeschrieben – Drift ist damit ausgeschlossen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusZusammenfassung {
    #[serde(rename = "devices_online")]
    pub geraete_online: u32,
    #[serde(rename = "devices_offline")]
    pub geraete_offline: u32,
    #[serde(rename = "devices_unstable")]
    pub geraete_instabil: u32,
    #[serde(rename = "cameras_online")]
    pub kameras_online: u32,
    #[serde(rename = "cameras_offline")]
    pub kameras_offline: u32,
}

impl StatusZusammenfassung {
    /// Gesamtzahl bekannter Geraete
    pub fn geraete_gesamt(&self) -> u32 {
        self.geraete_online + self.geraete_offline + self.geraete_instabil
    }

    /// Gesamtzahl bekannter Kameras
    pub fn kameras_gesamt(&self) -> u32 {
        self.kameras_online + self.kameras_offline
    }
}
