//! kamerad-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use config::ServerConfig;
use kamerad_core::verzeichnis::SpeicherVerlauf;
use kamerad_hub::{HeartbeatWaechter, HubServer, HubState};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Geraeteverzeichnis aus der Konfiguration befuellen
    /// 2. Heartbeat-Waechter starten
    /// 3. TCP-Listener starten (Status-Protokoll)
    /// 4. Auf Ctrl-C warten, dann Shutdown an alle Tasks signalisieren
    pub async fn starten(self) -> Result<()> {
        let bind_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.tcp_bind_adresse()))?;

        let verzeichnis = Arc::new(self.config.verzeichnis());
        let verlauf = Arc::new(SpeicherVerlauf::neu());

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %bind_addr,
            geraete = verzeichnis.anzahl(),
            "Server startet"
        );

        let state = HubState::neu(self.config.hub_config(), verzeichnis, verlauf);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let waechter = HeartbeatWaechter::neu(Arc::clone(&state));
        let waechter_task = tokio::spawn(waechter.starten(shutdown_rx.clone()));

        let hub = HubServer::neu(Arc::clone(&state), bind_addr);
        let mut hub_task = tokio::spawn(hub.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        tokio::select! {
            ergebnis = &mut hub_task => {
                // Der Listener endet ohne Shutdown-Signal nur im Fehlerfall
                let _ = shutdown_tx.send(true);
                let _ = waechter_task.await;
                return match ergebnis {
                    Ok(Ok(())) => {
                        tracing::warn!("Status-Hub hat sich unerwartet beendet");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(e).context("Status-Hub abgebrochen"),
                    Err(e) => Err(e).context("Status-Hub-Task abgestuerzt"),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            }
        }

        let _ = shutdown_tx.send(true);
        let _ = waechter_task.await;
        let _ = hub_task.await;

        Ok(())
    }
}
