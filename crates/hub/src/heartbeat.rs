//! Heartbeat-Waechter – Raeumt stumme Geraete-Verbindungen ab
//!
//! Geraete melden sich im konfigurierten Intervall (Standard: 30s). Bleibt
//! ein Geraet laenger als die Deadline still (Standard: 2x Intervall, 60s),
//! gilt die Verbindung als tot – auch wenn der Socket nie sauber geschlossen
//! wurde (halboffene TCP-Verbindung).
//!
//! Der Waechter laeuft als eigener Task auf seinem Sweep-Intervall
//! (Standard: 5s). Pro abgelaufenem Geraet: Register-Eintrag entfernen
//! (womit sich die Verbindungsschleife ueber ihre geschlossene Send-Queue
//! beendet), Geraet im Aggregator offline markieren und den Uebergang an
//! alle Dashboards verteilen. Der Aggregator garantiert Exactly-once:
//! wiederholte Sweeps ueber ein bereits offlines Geraet senden nichts.

use kamerad_core::verzeichnis::{GeraeteVerzeichnis, VerlaufSenke};
use std::sync::Arc;
use std::time::Duration;

use crate::handlers::status_handler;
use crate::server_state::HubState;

/// Periodischer Sweep ueber alle Geraete-Verbindungen
pub struct HeartbeatWaechter<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    state: Arc<HubState<V, H>>,
}

impl<V, H> HeartbeatWaechter<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    /// Erstellt einen neuen Waechter
    pub fn neu(state: Arc<HubState<V, H>>) -> Self {
        Self { state }
    }

    /// Startet die Sweep-Schleife
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(self, mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
        let mut intervall = tokio::time::interval(Duration::from_secs(
            self.state.config.sweep_intervall_sek.max(1),
        ));
        // Der erste Tick feuert sofort; das ist harmlos, da frisch
        // registrierte Verbindungen nie abgelaufen sind
        tracing::info!(
            sweep_sek = self.state.config.sweep_intervall_sek,
            timeout_sek = self.state.config.heartbeat_timeout_sek,
            "Heartbeat-Waechter gestartet"
        );

        loop {
            tokio::select! {
                _ = intervall.tick() => {
                    self.einmal_pruefen().await;
                }
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Heartbeat-Waechter: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }
    }

    /// Fuehrt einen einzelnen Sweep aus
    ///
    /// Gibt die Anzahl der abgeraeumten Geraete zurueck.
    pub async fn einmal_pruefen(&self) -> usize {
        let timeout = Duration::from_secs(self.state.config.heartbeat_timeout_sek);
        let abgelaufen = self.state.register.abgelaufene_geraete(timeout);
        if abgelaufen.is_empty() {
            return 0;
        }

        let mut abgeraeumt = 0;
        for (id, hostname) in abgelaufen {
            tracing::warn!(
                hostname = %hostname,
                verbindung = %id,
                timeout_sek = self.state.config.heartbeat_timeout_sek,
                "Heartbeat-Deadline ueberschritten – Geraet wird abgeraeumt"
            );

            // Eintrag entfernen schliesst die Send-Queue; darueber beendet
            // sich die Verbindungsschleife auch bei halboffenem Socket
            self.state.register.entfernen(&id);
            status_handler::geraet_offline_verarbeiten(&hostname, &self.state).await;
            abgeraeumt += 1;
        }
        abgeraeumt
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
