//! Client-Connection – Verwaltet eine einzelne Socket-Verbindung
//!
//! Jede akzeptierte Verbindung bekommt eine `ClientConnection` in einem
//! eigenen tokio-Task. Die Rolle wird durch genau eine Anmeldung festgelegt.
//!
//! ## Rollen
//! ```text
//! Unauthentifiziert --auth-->      Geraet    (meldet Heartbeats)
//! Unauthentifiziert --dashboard--> Dashboard (empfaengt Broadcasts)
//! ```
//!
//! ## Lebensende
//! Die Schleife endet wenn (a) der Client den Socket schliesst, (b) ein
//! Framing-Fehler auftritt, (c) die eigene Send-Queue schliesst – das
//! passiert bei Verdraengung durch eine neue Verbindung desselben Hostnames,
//! beim Abraeumen durch den Heartbeat-Waechter und wenn die Queue beim
//! Broadcast voll war (Dashboard kommt nicht mit) – oder (d) das
//! Shutdown-Signal eingeht. Ein einzelner Frame mit kaputtem JSON beendet
//! die Verbindung NICHT; er wird verworfen und geloggt.

use futures_util::{SinkExt, StreamExt};
use kamerad_core::verzeichnis::{GeraeteVerzeichnis, VerlaufSenke};
use kamerad_protocol::{ControlMessage, DekodiertesFrame, FrameCodec};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::dispatcher::{DispatchAktion, DispatcherContext, MessageDispatcher};
use crate::server_state::HubState;

/// Verarbeitet eine einzelne Socket-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an `MessageDispatcher` und
/// leitet Broadcast-Nachrichten aus der Register-Queue auf den Socket.
pub struct ClientConnection<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    state: Arc<HubState<V, H>>,
    peer_addr: SocketAddr,
}

impl<V, H> ClientConnection<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<HubState<V, H>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Generisch ueber den Stream, damit Tests mit `tokio::io::duplex`
    /// denselben Pfad fahren wie der TCP-Listener.
    pub async fn verarbeiten<S>(
        self,
        stream: S,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let peer_addr = self.peer_addr;
        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        let mut framed = Framed::new(stream, FrameCodec::new());
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));
        let mut ctx = DispatcherContext::neu(peer_addr);

        // Broadcast-Queue aus dem Register; None bis zur Rollen-Anmeldung
        let mut sende_rx: Option<mpsc::Receiver<ControlMessage>> = None;

        loop {
            tokio::select! {
                // Eingehender Frame vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(DekodiertesFrame::Nachricht(nachricht))) => {
                            if let Some(ref id) = ctx.verbindungs_id {
                                self.state.register.beruehren(id);
                            }

                            let aktion = dispatcher.dispatch(nachricht, &mut ctx).await;
                            if !self.aktion_ausfuehren(aktion, &mut framed, &mut ctx, &mut sende_rx).await {
                                break;
                            }
                        }
                        Some(Ok(DekodiertesFrame::Ungueltig(fehler))) => {
                            // Frame verwerfen, Verbindung bleibt offen
                            if let Some(ref id) = ctx.verbindungs_id {
                                self.state.register.beruehren(id);
                            }
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %fehler,
                                "Ungueltiges JSON im Frame – verworfen"
                            );
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus der Register-Queue
                ausgehend = naechste_ausgehende(&mut sende_rx) => {
                    match ausgehend {
                        Some(nachricht) => {
                            if let Err(e) = framed.send(nachricht).await {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    fehler = %e,
                                    "Broadcast-Senden fehlgeschlagen"
                                );
                                break;
                            }
                        }
                        None => {
                            // Queue geschlossen: verdraengt oder vom Waechter abgeraeumt
                            tracing::info!(
                                peer = %peer_addr,
                                "Send-Queue geschlossen – Verbindung wird beendet"
                            );
                            break;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende
        dispatcher.verbindung_beenden(&ctx).await;

        tracing::info!(peer = %peer_addr, "Verbindungs-Task beendet");
    }

    /// Fuehrt die Dispatch-Aktion aus; `false` beendet die Schleife
    async fn aktion_ausfuehren<S>(
        &self,
        aktion: DispatchAktion,
        framed: &mut Framed<S, FrameCodec>,
        ctx: &mut DispatcherContext,
        sende_rx: &mut Option<mpsc::Receiver<ControlMessage>>,
    ) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        match aktion {
            DispatchAktion::Keine => true,

            DispatchAktion::AntwortUndTrennen(antwort) => {
                // Best-effort: Trennung folgt unabhaengig vom Sende-Erfolg
                let _ = framed.send(antwort).await;
                false
            }

            DispatchAktion::GeraetAngemeldet { antwort } => {
                let (id, rx) = self
                    .state
                    .register
                    .registrieren(ctx.rolle, ctx.hostname.clone());
                ctx.verbindungs_id = Some(id);
                *sende_rx = Some(rx);
                self.senden(framed, antwort).await
            }

            DispatchAktion::DashboardAngemeldet { antworten } => {
                let (id, rx) = self.state.register.registrieren(ctx.rolle, None);
                ctx.verbindungs_id = Some(id);
                *sende_rx = Some(rx);
                for antwort in antworten {
                    if !self.senden(framed, antwort).await {
                        return false;
                    }
                }
                true
            }
        }
    }

    async fn senden<S>(&self, framed: &mut Framed<S, FrameCodec>, nachricht: ControlMessage) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        match framed.send(nachricht).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(peer = %self.peer_addr, fehler = %e, "Senden fehlgeschlagen");
                false
            }
        }
    }
}

/// Wartet auf die naechste Broadcast-Nachricht
///
/// Vor der Rollen-Anmeldung existiert keine Queue; dieser Zweig darf dann
/// nie feuern.
async fn naechste_ausgehende(
    rx: &mut Option<mpsc::Receiver<ControlMessage>>,
) -> Option<ControlMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
