//! Message-Dispatcher – Routet ControlMessages an die richtigen Handler
//!
//! Der Dispatcher empfaengt ControlMessages von einer ClientConnection,
//! bestimmt anhand von Nachrichtentyp und Verbindungsrolle den richtigen
//! Handler und gibt die resultierende Aktion zurueck.
//!
//! ## Zustandspruefung
//! Jede Verbindung traegt genau eine Rolle fuer ihre gesamte Lebensdauer:
//! - `auth` und `dashboard` nur im Zustand `Unauthentifiziert`
//! - `heartbeat` nur von angemeldeten Geraeten
//! - Fuer den Zustand ungueltige Nachrichten werden geloggt und ignoriert,
//!   die Verbindung bleibt offen (Vorwaertskompatibilitaet)

use kamerad_core::types::{ClientRolle, ConnectionId, Hostname};
use kamerad_core::verzeichnis::{GeraeteVerzeichnis, VerlaufSenke};
use kamerad_protocol::ControlMessage;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::handlers::{auth_handler, dashboard_handler, status_handler};
use crate::server_state::HubState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    /// Peer-Adresse fuer Logging
    pub peer_addr: SocketAddr,
    /// Rolle der Verbindung (einmal festgelegt, nie zurueckgestuft)
    pub rolle: ClientRolle,
    /// Register-ID (gesetzt sobald die Verbindung registriert ist)
    pub verbindungs_id: Option<ConnectionId>,
    /// Hostname des angemeldeten Geraets
    pub hostname: Option<Hostname>,
    /// Anzeigename aus dem Geraeteverzeichnis
    pub anzeige_name: Option<String>,
}

impl DispatcherContext {
    /// Erstellt einen Kontext fuer eine frisch akzeptierte Verbindung
    pub fn neu(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            rolle: ClientRolle::Unauthentifiziert,
            verbindungs_id: None,
            hostname: None,
            anzeige_name: None,
        }
    }
}

/// Aktion die die Verbindungsschleife nach einem Dispatch ausfuehrt
pub enum DispatchAktion {
    /// Nichts zu tun (Nachricht intern verarbeitet oder ignoriert)
    Keine,
    /// Antwort-Frame senden, danach Verbindung trennen (terminaler Fehler)
    AntwortUndTrennen(ControlMessage),
    /// Geraet erfolgreich angemeldet: registrieren, dann Antwort senden
    GeraetAngemeldet { antwort: ControlMessage },
    /// Dashboard erfolgreich angemeldet: registrieren, dann Antworten senden
    DashboardAngemeldet { antworten: Vec<ControlMessage> },
}

/// Zentraler Message-Dispatcher
///
/// Routet eingehende ControlMessages an die entsprechenden Handler.
pub struct MessageDispatcher<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    state: Arc<HubState<V, H>>,
}

impl<V, H> MessageDispatcher<V, H>
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<HubState<V, H>>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende ControlMessage
    pub async fn dispatch(
        &self,
        message: ControlMessage,
        ctx: &mut DispatcherContext,
    ) -> DispatchAktion {
        match (message, ctx.rolle) {
            // -------------------------------------------------------------------
            // Rollen-Anmeldungen (nur unauthentifiziert)
            // -------------------------------------------------------------------
            (ControlMessage::Auth(req), ClientRolle::Unauthentifiziert) => {
                auth_handler::handle_auth(req, ctx, &self.state).await
            }

            (ControlMessage::Dashboard, ClientRolle::Unauthentifiziert) => {
                dashboard_handler::handle_dashboard(ctx, &self.state).await
            }

            // -------------------------------------------------------------------
            // Heartbeats (nur angemeldete Geraete)
            // -------------------------------------------------------------------
            (ControlMessage::Heartbeat(hb), ClientRolle::Geraet) => {
                status_handler::handle_heartbeat(hb, ctx, &self.state).await
            }

            // -------------------------------------------------------------------
            // Fehler-Frames vom Client: nur loggen
            // -------------------------------------------------------------------
            (ControlMessage::Error(e), _) => {
                tracing::warn!(
                    peer = %ctx.peer_addr,
                    code = ?e.code,
                    nachricht = %e.message,
                    "Fehler-Frame vom Client empfangen"
                );
                DispatchAktion::Keine
            }

            // -------------------------------------------------------------------
            // Fuer den Zustand ungueltige Nachrichten: loggen und ignorieren
            // -------------------------------------------------------------------
            (andere, rolle) => {
                tracing::warn!(
                    peer = %ctx.peer_addr,
                    rolle = ?rolle,
                    nachricht = nachrichten_art(&andere),
                    "Nachricht im aktuellen Zustand nicht erlaubt – ignoriert"
                );
                DispatchAktion::Keine
            }
        }
    }

    /// Bereinigt alle Ressourcen einer Verbindung beim Trennen
    ///
    /// Gilt die Verbindung noch als die lebende Verbindung ihres Geraets,
    /// wird das Geraet offline markiert und der Uebergang verteilt. Nach
    /// einer Verdraengung oder einem Sweep ist hier nichts mehr zu tun.
    pub async fn verbindung_beenden(&self, ctx: &DispatcherContext) {
        let id = match ctx.verbindungs_id {
            Some(id) => id,
            None => return,
        };

        // Dauer vor dem Entfernen abgreifen, danach ist der Eintrag weg
        let dauer = self.state.register.verbindungsdauer(&id);
        let war_eingetragen = self.state.register.entfernen(&id);
        if !war_eingetragen {
            tracing::debug!(
                peer = %ctx.peer_addr,
                verbindung = %id,
                "Verbindung war bereits abgeraeumt (verdraengt oder Sweep)"
            );
            return;
        }

        if ctx.rolle == ClientRolle::Geraet {
            if let Some(ref hostname) = ctx.hostname {
                status_handler::geraet_offline_verarbeiten(hostname, &self.state).await;
            }
        }

        tracing::debug!(
            peer = %ctx.peer_addr,
            verbindung = %id,
            dauer_sek = dauer.map_or(0, |d| d.as_secs()),
            "Verbindungs-Ressourcen bereinigt"
        );
    }
}

/// Kurzbezeichnung eines Nachrichtentyps fuer Logausgaben
fn nachrichten_art(message: &ControlMessage) -> &'static str {
    match message {
        ControlMessage::Auth(_) => "auth",
        ControlMessage::AuthOk(_) => "auth_ok",
        ControlMessage::Heartbeat(_) => "heartbeat",
        ControlMessage::Dashboard => "dashboard",
        ControlMessage::DashboardOk => "dashboard_ok",
        ControlMessage::NvrOnline(_) => "nvr_online",
        ControlMessage::NvrOffline(_) => "nvr_offline",
        ControlMessage::NvrStatusUpdate(_) => "nvr_status_update",
        ControlMessage::CameraStatusUpdate(_) => "camera_status_update",
        ControlMessage::StatsUpdate(_) => "stats_update",
        ControlMessage::Error(_) => "error",
    }
}
