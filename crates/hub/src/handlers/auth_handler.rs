//! Auth-Handler – Geraete-Anmeldung und Verzeichnis-Aufloesung
//!
//! Verarbeitet die `auth`-Nachricht eines Geraets: Hostname gegen das
//! Geraeteverzeichnis aufloesen, Initialbericht anwenden, Rolle festlegen.
//! Ein unbekannter Hostname ist terminal – Fehler-Frame und Trennung.

use kamerad_core::verzeichnis::{GeraeteVerzeichnis, VerlaufSenke};
use kamerad_protocol::{AuthRequest, ControlMessage, ErrorCode};
use kamerad_core::types::ClientRolle;
use std::sync::Arc;

use crate::dispatcher::{DispatchAktion, DispatcherContext};
use crate::handlers::status_handler;
use crate::server_state::HubState;

/// Verarbeitet eine Geraete-Anmeldung
///
/// Bei Erfolg traegt der Kontext danach Rolle `Geraet`, Hostname und
/// Anzeigenamen; die eigentliche Register-Eintragung uebernimmt die
/// Verbindungsschleife (sie braucht die Empfangs-Queue).
pub async fn handle_auth<V, H>(
    request: AuthRequest,
    ctx: &mut DispatcherContext,
    state: &Arc<HubState<V, H>>,
) -> DispatchAktion
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    if request.hostname.ist_leer() {
        tracing::warn!(peer = %ctx.peer_addr, "Anmeldung mit leerem Hostname abgelehnt");
        return DispatchAktion::AntwortUndTrennen(ControlMessage::fehler(
            ErrorCode::InvalidRequest,
            "Hostname darf nicht leer sein",
        ));
    }

    let eintrag = match state.verzeichnis.aufloesen(&request.hostname).await {
        Ok(Some(eintrag)) => eintrag,
        Ok(None) => {
            tracing::warn!(
                peer = %ctx.peer_addr,
                hostname = %request.hostname,
                "Anmeldung mit unbekanntem Hostname abgelehnt"
            );
            return DispatchAktion::AntwortUndTrennen(ControlMessage::fehler(
                ErrorCode::UnknownHostname,
                format!("Hostname unbekannt: {}", request.hostname),
            ));
        }
        Err(e) => {
            tracing::error!(
                peer = %ctx.peer_addr,
                hostname = %request.hostname,
                fehler = %e,
                "Verzeichnis-Aufloesung fehlgeschlagen"
            );
            return DispatchAktion::AntwortUndTrennen(ControlMessage::fehler(
                ErrorCode::InternalError,
                "Interner Fehler",
            ));
        }
    };

    ctx.rolle = ClientRolle::Geraet;
    ctx.hostname = Some(request.hostname.clone());
    ctx.anzeige_name = Some(eintrag.anzeige_name.clone());

    tracing::info!(
        peer = %ctx.peer_addr,
        hostname = %request.hostname,
        geraet = %eintrag.anzeige_name,
        "Geraet angemeldet"
    );

    // Initialbericht anwenden und verteilen – der erste Kontakt erzeugt den
    // Uebergang aus implizit-offline
    status_handler::bericht_verarbeiten(
        &request.hostname,
        &eintrag.anzeige_name,
        &request.system_status,
        state,
    )
    .await;

    DispatchAktion::GeraetAngemeldet {
        antwort: ControlMessage::auth_ok(request.hostname, eintrag.anzeige_name),
    }
}
