//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `HubServer` bindet einen TCP-Socket und startet fuer jede eingehende
//! Verbindung einen eigenen tokio-Task mit einer `ClientConnection`.
//!
//! Die Collaborator-Traits (`GeraeteVerzeichnis`, `VerlaufSenke`) sind
//! Send + Sync, daher laufen die Verbindungs-Tasks direkt auf dem
//! multi-threaded Executor.

use kamerad_core::verzeichnis::{GeraeteVerzeichnis, VerlaufSenke};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::connection::ClientConnection;
use crate::error::HubResult;
use crate::server_state::HubState;

/// TCP-Server des Status-Hubs
///
/// Bindet einen TCP-Socket und akzeptiert Verbindungen in einer Loop.
pub struct HubServer<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    state: Arc<HubState<V, H>>,
    bind_addr: SocketAddr,
}

impl<V, H> HubServer<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    /// Erstellt einen neuen HubServer
    pub fn neu(state: Arc<HubState<V, H>>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    /// Startet den TCP-Listener und akzeptiert Verbindungen
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(
        self,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> HubResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let lokale_addr = listener.local_addr()?;

        tracing::info!(adresse = %lokale_addr, "Status-Hub gestartet");

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            // Client-Limit pruefen
                            let verbunden = self.state.register.verbindungs_anzahl() as u32;
                            if verbunden >= self.state.config.max_clients {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.state.config.max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let verbindung = ClientConnection::neu(
                                Arc::clone(&self.state),
                                peer_addr,
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Status-Hub: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            uptime_sek = self.state.uptime_sek(),
            "Status-Hub gestoppt"
        );
        Ok(())
    }

    /// Gibt die Bind-Adresse zurueck
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HubError;
    use crate::server_state::HubConfig;
    use kamerad_core::verzeichnis::{SpeicherVerlauf, StatischesVerzeichnis};

    #[tokio::test]
    async fn starten_meldet_bind_fehler() {
        // Port bereits belegt: starten gibt den IO-Fehler zurueck
        let belegt = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let adresse = belegt.local_addr().unwrap();

        let state = HubState::neu(
            HubConfig::default(),
            Arc::new(StatischesVerzeichnis::neu()),
            Arc::new(SpeicherVerlauf::neu()),
        );
        let server = HubServer::neu(state, adresse);
        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let fehler = server.starten(shutdown_rx).await.unwrap_err();
        assert!(matches!(fehler, HubError::Io(_)));
    }
}
