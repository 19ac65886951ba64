//! Status-Speicher – lokaler Flottenzustand des Dashboards
//!
//! Wendet eingehende Hub-Frames auf eine lokale Sicht der Flotte an und
//! meldet Aenderungen ueber die [`EventFabrik`]. Damit ein Schwall von
//! Uebergaengen die Oberflaeche nicht flutet, werden Meldungen pro Thema
//! in einem 100-ms-Fenster gebuendelt; innerhalb des Fensters gewinnt der
//! letzte Stand.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kamerad_core::event::StatusZusammenfassung;
use kamerad_core::types::{CameraId, GeraeteStatus, Hostname, KameraStatus};
use kamerad_protocol::{ControlMessage, KameraUpdate, NvrEvent};

use crate::bus::EventFabrik;

// ---------------------------------------------------------------------------
// Themen
// ---------------------------------------------------------------------------

/// Geraete-Uebergang (online/offline/unstable)
pub const THEMA_GERAET: &str = "geraet:updated";
/// Kamera-Uebergang
pub const THEMA_KAMERA: &str = "kamera:updated";
/// Irgendein Uebergang in der Flotte
pub const THEMA_STATUS: &str = "status:changed";
/// Neue Zusammenfassungs-Zaehler
pub const THEMA_STATS: &str = "stats:updated";

/// Standard-Buendelfenster
pub const BUENDEL_FENSTER: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Flottensicht
// ---------------------------------------------------------------------------

/// Lokale Sicht auf ein Geraet
#[derive(Debug, Clone)]
pub struct GeraetAnsicht {
    pub device_name: String,
    pub status: GeraeteStatus,
    pub kameras: HashMap<CameraId, KameraStatus>,
    /// Unix-Timestamp (Sekunden) des letzten Ereignisses
    pub zuletzt_gesehen: u64,
}

// ---------------------------------------------------------------------------
// StatusSpeicher
// ---------------------------------------------------------------------------

struct SpeicherInner {
    fabrik: Arc<EventFabrik>,
    geraete: Mutex<HashMap<Hostname, GeraetAnsicht>>,
    zaehler: Mutex<StatusZusammenfassung>,
    /// Pro Thema der juengste ungemeldete Stand
    ausstehend: Mutex<HashMap<&'static str, serde_json::Value>>,
    flush_geplant: AtomicBool,
    fenster: Duration,
}

impl SpeicherInner {
    fn flush(&self) {
        self.flush_geplant.store(false, Ordering::SeqCst);
        let faellig: Vec<(&'static str, serde_json::Value)> =
            self.ausstehend.lock().drain().collect();
        for (thema, daten) in faellig {
            self.fabrik.veroeffentlichen(thema, &daten);
        }
    }
}

/// Lokaler Flottenzustand mit gebuendelter Aenderungs-Meldung
#[derive(Clone)]
pub struct StatusSpeicher {
    inner: Arc<SpeicherInner>,
}

impl StatusSpeicher {
    pub fn neu(fabrik: Arc<EventFabrik>) -> Self {
        Self::mit_fenster(fabrik, BUENDEL_FENSTER)
    }

    pub fn mit_fenster(fabrik: Arc<EventFabrik>, fenster: Duration) -> Self {
        Self {
            inner: Arc::new(SpeicherInner {
                fabrik,
                geraete: Mutex::new(HashMap::new()),
                zaehler: Mutex::new(StatusZusammenfassung::default()),
                ausstehend: Mutex::new(HashMap::new()),
                flush_geplant: AtomicBool::new(false),
                fenster,
            }),
        }
    }

    /// Wendet einen Hub-Frame auf den lokalen Zustand an
    pub fn anwenden(&self, nachricht: &ControlMessage) {
        match nachricht {
            ControlMessage::NvrOnline(e) => self.geraet_uebergang(e, GeraeteStatus::Online),
            ControlMessage::NvrOffline(e) => self.geraet_uebergang(e, GeraeteStatus::Offline),
            ControlMessage::NvrStatusUpdate(e) => self.geraet_uebergang(e, GeraeteStatus::Instabil),
            ControlMessage::CameraStatusUpdate(u) => self.kamera_uebergang(u),
            ControlMessage::StatsUpdate(s) => {
                *self.inner.zaehler.lock() = s.zaehler.clone();
                self.einreihen(THEMA_STATS, json!(s));
            }
            ControlMessage::DashboardOk => {
                tracing::debug!("Dashboard-Anmeldung bestaetigt");
            }
            ControlMessage::Error(e) => {
                tracing::warn!(code = ?e.code, nachricht = %e.message, "Fehler-Frame vom Hub");
            }
            andere => {
                tracing::debug!(nachricht = ?andere, "Frame fuer Dashboards irrelevant – ignoriert");
            }
        }
    }

    /// Meldet alle ausstehenden Aenderungen sofort (deterministisch fuer Tests)
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Liefert die Sicht auf ein Geraet
    pub fn geraet(&self, hostname: &Hostname) -> Option<GeraetAnsicht> {
        self.inner.geraete.lock().get(hostname).cloned()
    }

    /// Anzahl bekannter Geraete
    pub fn geraete_anzahl(&self) -> usize {
        self.inner.geraete.lock().len()
    }

    /// Zuletzt empfangene Zusammenfassungs-Zaehler
    pub fn zaehler(&self) -> StatusZusammenfassung {
        self.inner.zaehler.lock().clone()
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn geraet_uebergang(&self, event: &NvrEvent, status: GeraeteStatus) {
        {
            let mut geraete = self.inner.geraete.lock();
            let ansicht = geraete
                .entry(event.hostname.clone())
                .or_insert_with(|| GeraetAnsicht {
                    device_name: event.device_name.clone(),
                    status,
                    kameras: HashMap::new(),
                    zuletzt_gesehen: event.timestamp,
                });
            ansicht.device_name = event.device_name.clone();
            ansicht.status = status;
            ansicht.zuletzt_gesehen = event.timestamp;
        }

        self.einreihen(
            THEMA_GERAET,
            json!({
                "hostname": event.hostname,
                "device_name": event.device_name,
                "status": status,
                "cameras_updated": event.cameras_updated,
                "timestamp": event.timestamp,
            }),
        );
        self.einreihen(
            THEMA_STATUS,
            json!({
                "subject_type": "device",
                "hostname": event.hostname,
                "timestamp": event.timestamp,
            }),
        );
    }

    fn kamera_uebergang(&self, update: &KameraUpdate) {
        {
            let mut geraete = self.inner.geraete.lock();
            match geraete.get_mut(&update.hostname) {
                Some(ansicht) => {
                    ansicht
                        .kameras
                        .insert(update.identifier.clone(), update.new_status);
                    ansicht.zuletzt_gesehen = update.timestamp;
                }
                None => {
                    tracing::debug!(
                        hostname = %update.hostname,
                        kamera = %update.identifier,
                        "Kamera-Update fuer unbekanntes Geraet – ignoriert"
                    );
                    return;
                }
            }
        }

        self.einreihen(THEMA_KAMERA, json!(update));
        self.einreihen(
            THEMA_STATUS,
            json!({
                "subject_type": "camera",
                "hostname": update.hostname,
                "timestamp": update.timestamp,
            }),
        );
    }

    /// Merkt den juengsten Stand pro Thema vor und plant hoechstens einen Flush
    fn einreihen(&self, thema: &'static str, daten: serde_json::Value) {
        self.inner.ausstehend.lock().insert(thema, daten);

        if !self.inner.flush_geplant.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(inner.fenster).await;
                inner.flush();
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
