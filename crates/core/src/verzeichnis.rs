//! Collaborator-Traits: Geraeteverzeichnis und Verlaufssenke
//!
//! Der Hub spricht Persistenz nur ueber diese beiden schmalen Schnittstellen
//! an – ausschliesslich an den Ingestion-Grenzen (auth, heartbeat, sweep),
//! nie im Broadcast-Pfad. Die In-Memory-Implementierungen hier dienen dem
//! Server-Binary und den Tests; ein relationales Backend haengt sich an
//! denselben Traits ein.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::event::StatusWechsel;
use crate::types::Hostname;

/// Verzeichniseintrag eines bekannten Geraets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeraetEintrag {
    pub hostname: Hostname,
    pub anzeige_name: String,
}

/// Aufloesung von Hostnames zu bekannten Geraeten
///
/// `None` bedeutet: Hostname unbekannt – die Authentifizierung schlaegt fehl.
#[async_trait]
pub trait GeraeteVerzeichnis: Send + Sync + 'static {
    /// Loest einen Hostname zu seinem Verzeichniseintrag auf
    async fn aufloesen(&self, hostname: &Hostname) -> Result<Option<GeraetEintrag>>;
}

/// Senke fuer historische Statusuebergaenge
///
/// Wird bei jedem emittierten `StatusWechsel` aufgerufen. Fehler werden vom
/// Aufrufer geloggt, blockieren aber nie den Broadcast.
#[async_trait]
pub trait VerlaufSenke: Send + Sync + 'static {
    /// Zeichnet einen Statusuebergang auf
    async fn aufzeichnen(&self, wechsel: &StatusWechsel) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-Memory-Implementierungen
// ---------------------------------------------------------------------------

/// Statisches In-Memory-Verzeichnis, beim Start aus der Konfiguration befuellt
#[derive(Debug, Default)]
pub struct StatischesVerzeichnis {
    eintraege: DashMap<Hostname, GeraetEintrag>,
}

impl StatischesVerzeichnis {
    /// Erstellt ein leeres Verzeichnis
    pub fn neu() -> Self {
        Self::default()
    }

    /// Erstellt ein Verzeichnis aus einer Liste von Eintraegen
    pub fn aus_eintraegen(eintraege: impl IntoIterator<Item = GeraetEintrag>) -> Self {
        let verzeichnis = Self::neu();
        for eintrag in eintraege {
            verzeichnis.eintragen(eintrag);
        }
        verzeichnis
    }

    /// Fuegt einen Eintrag hinzu oder ersetzt ihn
    pub fn eintragen(&self, eintrag: GeraetEintrag) {
        self.eintraege.insert(eintrag.hostname.clone(), eintrag);
    }

    /// Gibt die Anzahl bekannter Geraete zurueck
    pub fn anzahl(&self) -> usize {
        self.eintraege.len()
    }
}

#[async_trait]
impl GeraeteVerzeichnis for StatischesVerzeichnis {
    async fn aufloesen(&self, hostname: &Hostname) -> Result<Option<GeraetEintrag>> {
        Ok(self.eintraege.get(hostname).map(|e| e.clone()))
    }
}

/// In-Memory-Verlauf: sammelt alle Uebergaenge in Reihenfolge
///
/// Fuer Tests und als Standard-Senke des Server-Binaries. Die aufgezeichneten
/// Uebergaenge sind ueber `alle()` einsehbar.
#[derive(Debug, Default)]
pub struct SpeicherVerlauf {
    eintraege: parking_lot::Mutex<Vec<StatusWechsel>>,
}

impl SpeicherVerlauf {
    /// Erstellt einen leeren Verlauf
    pub fn neu() -> Self {
        Self::default()
    }

    /// Gibt alle aufgezeichneten Uebergaenge zurueck (Kopie)
    pub fn alle(&self) -> Vec<StatusWechsel> {
        self.eintraege.lock().clone()
    }

    /// Gibt die Anzahl aufgezeichneter Uebergaenge zurueck
    pub fn anzahl(&self) -> usize {
        self.eintraege.lock().len()
    }
}

#[async_trait]
impl VerlaufSenke for SpeicherVerlauf {
    async fn aufzeichnen(&self, wechsel: &StatusWechsel) -> Result<()> {
        self.eintraege.lock().push(wechsel.clone());
        Ok(())
    }
}
