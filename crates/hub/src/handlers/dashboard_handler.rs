//! Dashboard-Handler – Anmeldung eines Status-Konsumenten
//!
//! Dashboards melden sich mit der feldlosen `dashboard`-Nachricht an und
//! bekommen neben der Bestaetigung sofort die aktuellen Zaehler – so braucht
//! kein Dashboard einen Initial-Poll.

use chrono::Utc;
use kamerad_core::types::ClientRolle;
use kamerad_core::verzeichnis::{GeraeteVerzeichnis, VerlaufSenke};
use kamerad_protocol::ControlMessage;
use std::sync::Arc;

use crate::dispatcher::{DispatchAktion, DispatcherContext};
use crate::server_state::HubState;

/// Verarbeitet eine Dashboard-Anmeldung
pub async fn handle_dashboard<V, H>(
    ctx: &mut DispatcherContext,
    state: &Arc<HubState<V, H>>,
) -> DispatchAktion
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    ctx.rolle = ClientRolle::Dashboard;

    tracing::info!(peer = %ctx.peer_addr, "Dashboard angemeldet");

    let stats = ControlMessage::stats(
        state.aggregator.zusammenfassung(),
        Utc::now().timestamp() as u64,
    );

    DispatchAktion::DashboardAngemeldet {
        antworten: vec![ControlMessage::DashboardOk, stats],
    }
}
