//! Status-Handler – Berichte anwenden, Ereignisse verteilen
//!
//! Gemeinsamer Pfad fuer den Initialbericht beim `auth`, jeden Heartbeat
//! und das Offline-Markieren durch Waechter oder Verbindungsende:
//! Aggregator anwenden, Uebergaenge in den Verlauf schreiben, Frames an
//! alle Dashboards verteilen, Zaehler neu berechnen und mitsenden.
//!
//! Verlauf-Fehler werden geloggt, blockieren aber nie den Broadcast.

use chrono::Utc;
use kamerad_core::event::StatusWechsel;
use kamerad_core::types::Hostname;
use kamerad_core::verzeichnis::{GeraeteVerzeichnis, VerlaufSenke};
use kamerad_protocol::{ControlMessage, HeartbeatMessage, SystemStatus};
use std::sync::Arc;

use crate::dispatcher::{DispatchAktion, DispatcherContext};
use crate::server_state::HubState;

/// Wendet einen Gesundheitsbericht an und verteilt die Folgen
///
/// Die Zusammenfassungs-Zaehler werden nach jedem angewandten Bericht
/// unbedingt mitgesendet, auch wenn der Bericht keine Uebergaenge erzeugt hat
/// – Dashboards brauchen so keinen Initial-Poll.
pub async fn bericht_verarbeiten<V, H>(
    hostname: &Hostname,
    anzeige_name: &str,
    bericht: &SystemStatus,
    state: &Arc<HubState<V, H>>,
) where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    let jetzt = Utc::now();
    let wechsel = state
        .aggregator
        .bericht_anwenden(hostname, anzeige_name, bericht, jetzt);

    wechsel_verteilen(&wechsel, anzeige_name, state).await;

    let stats = ControlMessage::stats(state.aggregator.zusammenfassung(), jetzt.timestamp() as u64);
    state.register.an_dashboards_senden(stats);
}

/// Markiert ein Geraet als offline und verteilt den Uebergang
///
/// Wiederholte Aufrufe fuer ein bereits offlines Geraet sind still – weder
/// Ereignis noch Stats-Frame gehen raus.
pub async fn geraet_offline_verarbeiten<V, H>(hostname: &Hostname, state: &Arc<HubState<V, H>>)
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    let jetzt = Utc::now();
    let wechsel = state.aggregator.geraet_offline_markieren(hostname, jetzt);
    if wechsel.is_empty() {
        return;
    }

    let anzeige_name = state
        .aggregator
        .anzeige_name(hostname)
        .unwrap_or_else(|| hostname.as_str().to_string());
    wechsel_verteilen(&wechsel, &anzeige_name, state).await;

    let stats = ControlMessage::stats(state.aggregator.zusammenfassung(), jetzt.timestamp() as u64);
    state.register.an_dashboards_senden(stats);
}

/// Verarbeitet einen Heartbeat eines angemeldeten Geraets
pub async fn handle_heartbeat<V, H>(
    heartbeat: HeartbeatMessage,
    ctx: &DispatcherContext,
    state: &Arc<HubState<V, H>>,
) -> DispatchAktion
where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    let (hostname, anzeige_name) = match (&ctx.hostname, &ctx.anzeige_name) {
        (Some(h), Some(n)) => (h.clone(), n.clone()),
        _ => {
            tracing::warn!(peer = %ctx.peer_addr, "Heartbeat ohne angemeldeten Hostname");
            return DispatchAktion::Keine;
        }
    };

    tracing::trace!(
        hostname = %hostname,
        geraete_timestamp = heartbeat.timestamp,
        kameras = heartbeat.system_status.cameras.len(),
        "Heartbeat empfangen"
    );

    bericht_verarbeiten(&hostname, &anzeige_name, &heartbeat.system_status, state).await;

    // Heartbeats bleiben absichtlich unbestaetigt
    DispatchAktion::Keine
}

/// Schreibt Uebergaenge in den Verlauf und verteilt sie an alle Dashboards
///
/// Das Geraete-Frame traegt die Anzahl der Kamera-Uebergaenge aus demselben
/// Bericht (`cameras_updated`).
pub async fn wechsel_verteilen<V, H>(
    wechsel: &[StatusWechsel],
    anzeige_name: &str,
    state: &Arc<HubState<V, H>>,
) where
    V: GeraeteVerzeichnis,
    H: VerlaufSenke,
{
    let kamera_anzahl = wechsel.iter().filter(|w| w.ist_kamera()).count() as u32;

    for w in wechsel {
        if let Err(e) = state.verlauf.aufzeichnen(w).await {
            tracing::error!(
                hostname = %w.hostname(),
                fehler = %e,
                "Verlauf-Aufzeichnung fehlgeschlagen"
            );
        }

        let cameras_updated = if w.ist_kamera() { 0 } else { kamera_anzahl };
        let frame = ControlMessage::aus_statuswechsel(w, anzeige_name, cameras_updated);
        let empfaenger = state.register.an_dashboards_senden(frame);
        tracing::debug!(
            hostname = %w.hostname(),
            empfaenger,
            kamera_ereignis = w.ist_kamera(),
            "Statuswechsel verteilt"
        );
    }
}
