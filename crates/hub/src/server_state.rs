//! Gemeinsamer Hub-Zustand
//!
//! Haelt alle geteilten Services als Arc-Referenzen, die sicher zwischen
//! tokio-Tasks geteilt werden koennen.

use kamerad_core::verzeichnis::{GeraeteVerzeichnis, VerlaufSenke};
use std::sync::Arc;
use std::time::Instant;

use crate::aggregator::StatusAggregator;
use crate::registry::VerbindungsRegister;

/// Konfiguration fuer den Status-Hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Erwartetes Heartbeat-Intervall der Geraete in Sekunden
    pub heartbeat_intervall_sek: u64,
    /// Deadline fuer stumme Geraete in Sekunden (Standard: 2x Intervall)
    pub heartbeat_timeout_sek: u64,
    /// Sweep-Intervall des Heartbeat-Waechters in Sekunden
    pub sweep_intervall_sek: u64,
    /// Maximale gleichzeitige Verbindungen (Geraete + Dashboards)
    pub max_clients: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_intervall_sek: 30,
            heartbeat_timeout_sek: 60,
            sweep_intervall_sek: 5,
            max_clients: 512,
        }
    }
}

/// Gemeinsamer Hub-Zustand (thread-safe, Arc-geteilt)
///
/// `V` loest Hostnames gegen das Geraeteverzeichnis auf, `H` zeichnet
/// Statusuebergaenge auf. Beide werden nur an den Ingestion-Grenzen
/// angesprochen, nie im Broadcast-Pfad.
pub struct HubState<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    /// Hub-Konfiguration
    pub config: Arc<HubConfig>,
    /// Geraeteverzeichnis (Hostname -> Anzeigename)
    pub verzeichnis: Arc<V>,
    /// Senke fuer historische Statusuebergaenge
    pub verlauf: Arc<H>,
    /// Verbindungsregister (Send-Queues, Hostname-Index)
    pub register: VerbindungsRegister,
    /// Kanonischer Flottenzustand
    pub aggregator: StatusAggregator,
    /// Startzeitpunkt des Hubs (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl<V, H> HubState<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    /// Erstellt einen neuen HubState
    pub fn neu(config: HubConfig, verzeichnis: Arc<V>, verlauf: Arc<H>) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            verzeichnis,
            verlauf,
            register: VerbindungsRegister::neu(),
            aggregator: StatusAggregator::neu(),
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kamerad_core::verzeichnis::{SpeicherVerlauf, StatischesVerzeichnis};

    #[test]
    fn uptime_startet_beim_erstellen() {
        let state = HubState::neu(
            HubConfig::default(),
            Arc::new(StatischesVerzeichnis::neu()),
            Arc::new(SpeicherVerlauf::neu()),
        );
        assert!(state.uptime_sek() < 5);
    }
}
