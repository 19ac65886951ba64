//! Integrationstests fuer den Status-Hub
//!
//! Faehrt den kompletten Verbindungspfad (Framing, Dispatch, Register,
//! Aggregator, Broadcast) ueber in-memory Duplex-Streams – derselbe Code
//! den auch der TCP-Listener pro Verbindung startet.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;

use kamerad_core::types::{CameraId, GeraeteStatus, Hostname, KameraStatus};
use kamerad_core::verzeichnis::{GeraetEintrag, SpeicherVerlauf, StatischesVerzeichnis};
use kamerad_hub::{ClientConnection, HubConfig, HubState};
use kamerad_protocol::{
    AuthRequest, ControlMessage, DekodiertesFrame, ErrorCode, FrameCodec, HeartbeatMessage,
    KameraBericht, SystemStatus,
};

type TestState = Arc<HubState<StatischesVerzeichnis, SpeicherVerlauf>>;
type TestStream = Framed<DuplexStream, FrameCodec>;

fn test_state() -> TestState {
    let verzeichnis = StatischesVerzeichnis::aus_eintraegen([
        GeraetEintrag {
            hostname: Hostname::neu("NVR-01"),
            anzeige_name: "Eingang Nord".to_string(),
        },
        GeraetEintrag {
            hostname: Hostname::neu("NVR-02"),
            anzeige_name: "Lager".to_string(),
        },
    ]);
    HubState::neu(
        HubConfig::default(),
        Arc::new(verzeichnis),
        Arc::new(SpeicherVerlauf::neu()),
    )
}

/// Startet eine Verbindungsschleife und gibt die Client-Seite zurueck
fn verbinden(state: &TestState, shutdown: &watch::Sender<bool>) -> TestStream {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let verbindung = ClientConnection::neu(Arc::clone(state), "127.0.0.1:9".parse().unwrap());
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        verbindung.verarbeiten(server, shutdown_rx).await;
    });
    Framed::new(client, FrameCodec::new())
}

/// Liest die naechste gueltige Nachricht, mit Timeout
async fn naechste(stream: &mut TestStream) -> ControlMessage {
    let frame = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("Timeout beim Warten auf Frame")
        .expect("Stream unerwartet geschlossen")
        .expect("Frame-Fehler");
    match frame {
        DekodiertesFrame::Nachricht(m) => m,
        DekodiertesFrame::Ungueltig(e) => panic!("Ungueltiges Frame empfangen: {}", e),
    }
}

/// Wartet darauf dass der Hub die Verbindung schliesst
async fn erwarte_ende(stream: &mut TestStream) {
    let ende = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("Timeout beim Warten auf Verbindungsende");
    assert!(ende.is_none(), "Verbindung sollte geschlossen sein");
}

fn auth(hostname: &str, status: GeraeteStatus, kameras: &[(&str, KameraStatus)]) -> ControlMessage {
    ControlMessage::Auth(AuthRequest {
        hostname: Hostname::neu(hostname),
        system_status: system_status(status, kameras),
    })
}

fn heartbeat(status: GeraeteStatus, kameras: &[(&str, KameraStatus)]) -> ControlMessage {
    ControlMessage::Heartbeat(HeartbeatMessage {
        timestamp: 1_700_000_000,
        system_status: system_status(status, kameras),
    })
}

fn system_status(status: GeraeteStatus, kameras: &[(&str, KameraStatus)]) -> SystemStatus {
    SystemStatus {
        status,
        cameras: kameras
            .iter()
            .map(|(id, s)| KameraBericht {
                identifier: CameraId::neu(*id),
                status: *s,
            })
            .collect(),
    }
}

async fn dashboard_anmelden(state: &TestState, shutdown: &watch::Sender<bool>) -> TestStream {
    let mut dashboard = verbinden(state, shutdown);
    dashboard.send(ControlMessage::Dashboard).await.unwrap();
    assert!(matches!(
        naechste(&mut dashboard).await,
        ControlMessage::DashboardOk
    ));
    assert!(matches!(
        naechste(&mut dashboard).await,
        ControlMessage::StatsUpdate(_)
    ));
    dashboard
}

// ---------------------------------------------------------------------------
// Szenarien
// ---------------------------------------------------------------------------

#[tokio::test]
async fn geraet_meldet_sich_an_und_dashboard_sieht_den_uebergang() {
    let state = test_state();
    let (shutdown, _) = watch::channel(false);

    let mut dashboard = dashboard_anmelden(&state, &shutdown).await;

    // Geraet meldet sich mit zwei online Kameras an
    let mut geraet = verbinden(&state, &shutdown);
    geraet
        .send(auth(
            "NVR-01",
            GeraeteStatus::Online,
            &[
                ("CAM-001", KameraStatus::Online),
                ("CAM-002", KameraStatus::Online),
            ],
        ))
        .await
        .unwrap();

    let antwort = naechste(&mut geraet).await;
    if let ControlMessage::AuthOk(ok) = antwort {
        assert_eq!(ok.hostname.as_str(), "NVR-01");
        assert_eq!(ok.device_name, "Eingang Nord");
    } else {
        panic!("Erwartet auth_ok, bekam {:?}", antwort);
    }

    // Erstkontakt = Uebergang aus implizit-offline: genau ein nvr_online
    let event = naechste(&mut dashboard).await;
    if let ControlMessage::NvrOnline(e) = event {
        assert_eq!(e.hostname.as_str(), "NVR-01");
        assert_eq!(e.device_name, "Eingang Nord");
    } else {
        panic!("Erwartet nvr_online, bekam {:?}", event);
    }

    let stats = naechste(&mut dashboard).await;
    if let ControlMessage::StatsUpdate(s) = stats {
        assert_eq!(s.zaehler.geraete_online, 1);
        assert_eq!(s.zaehler.kameras_online, 2);
    } else {
        panic!("Erwartet stats_update, bekam {:?}", stats);
    }
}

#[tokio::test]
async fn kamera_ausfall_im_heartbeat_erzeugt_ein_update() {
    let state = test_state();
    let (shutdown, _) = watch::channel(false);

    let mut geraet = verbinden(&state, &shutdown);
    geraet
        .send(auth(
            "NVR-01",
            GeraeteStatus::Online,
            &[
                ("CAM-001", KameraStatus::Online),
                ("CAM-002", KameraStatus::Online),
            ],
        ))
        .await
        .unwrap();
    naechste(&mut geraet).await; // auth_ok

    let mut dashboard = dashboard_anmelden(&state, &shutdown).await;

    // CAM-002 faellt aus, Geraet bleibt online
    geraet
        .send(heartbeat(
            GeraeteStatus::Online,
            &[
                ("CAM-001", KameraStatus::Online),
                ("CAM-002", KameraStatus::Offline),
            ],
        ))
        .await
        .unwrap();

    let event = naechste(&mut dashboard).await;
    if let ControlMessage::CameraStatusUpdate(u) = event {
        assert_eq!(u.hostname.as_str(), "NVR-01");
        assert_eq!(u.identifier.as_str(), "CAM-002");
        assert_eq!(u.old_status, KameraStatus::Online);
        assert_eq!(u.new_status, KameraStatus::Offline);
    } else {
        panic!("Erwartet camera_status_update, bekam {:?}", event);
    }

    // Online-Kamera-Zaehler ist um eins gesunken
    let stats = naechste(&mut dashboard).await;
    if let ControlMessage::StatsUpdate(s) = stats {
        assert_eq!(s.zaehler.kameras_online, 1);
        assert_eq!(s.zaehler.kameras_offline, 1);
    } else {
        panic!("Erwartet stats_update, bekam {:?}", stats);
    }
}

#[tokio::test]
async fn unbekannter_hostname_bekommt_fehler_und_trennung() {
    let state = test_state();
    let (shutdown, _) = watch::channel(false);

    let mut geraet = verbinden(&state, &shutdown);
    geraet
        .send(auth("NVR-99", GeraeteStatus::Online, &[]))
        .await
        .unwrap();

    let antwort = naechste(&mut geraet).await;
    if let ControlMessage::Error(e) = antwort {
        assert_eq!(e.code, ErrorCode::UnknownHostname);
    } else {
        panic!("Erwartet error, bekam {:?}", antwort);
    }

    erwarte_ende(&mut geraet).await;
}

#[tokio::test]
async fn zweite_anmeldung_desselben_hostnames_verdraengt_die_erste() {
    let state = test_state();
    let (shutdown, _) = watch::channel(false);

    let mut erste = verbinden(&state, &shutdown);
    erste
        .send(auth("NVR-01", GeraeteStatus::Online, &[]))
        .await
        .unwrap();
    naechste(&mut erste).await; // auth_ok

    let mut zweite = verbinden(&state, &shutdown);
    zweite
        .send(auth("NVR-01", GeraeteStatus::Online, &[]))
        .await
        .unwrap();
    assert!(matches!(
        naechste(&mut zweite).await,
        ControlMessage::AuthOk(_)
    ));

    // Die erste Verbindung wird beobachtbar geschlossen
    erwarte_ende(&mut erste).await;

    // Genau eine lebende Verbindung fuer den Hostname
    assert_eq!(state.register.geraete_anzahl(), 1);
    // Das Geraet bleibt online – die Verdraengung ist kein Offline-Uebergang
    assert_eq!(
        state
            .aggregator
            .zustand_von(&Hostname::neu("NVR-01"))
            .unwrap()
            .status,
        GeraeteStatus::Online
    );
}

#[tokio::test]
async fn kaputtes_json_beendet_die_verbindung_nicht() {
    let state = test_state();
    let (shutdown, _) = watch::channel(false);

    let mut client = verbinden(&state, &shutdown);

    // Korrekt gerahmter Frame mit ungueltigem JSON direkt auf den Stream
    let kaputt = b"{definitiv kein json";
    let inner = client.get_mut();
    inner
        .write_all(&(kaputt.len() as u32).to_be_bytes())
        .await
        .unwrap();
    inner.write_all(kaputt).await.unwrap();
    inner.flush().await.unwrap();

    // Die Verbindung lebt weiter: die Anmeldung danach funktioniert
    client.send(ControlMessage::Dashboard).await.unwrap();
    assert!(matches!(
        naechste(&mut client).await,
        ControlMessage::DashboardOk
    ));
}

#[tokio::test]
async fn socket_ende_markiert_geraet_offline() {
    let state = test_state();
    let (shutdown, _) = watch::channel(false);

    let mut geraet = verbinden(&state, &shutdown);
    geraet
        .send(auth(
            "NVR-02",
            GeraeteStatus::Online,
            &[("CAM-001", KameraStatus::Online)],
        ))
        .await
        .unwrap();
    naechste(&mut geraet).await; // auth_ok

    let mut dashboard = dashboard_anmelden(&state, &shutdown).await;

    // Client beendet die Verbindung ohne Abmeldung
    drop(geraet);

    let event = naechste(&mut dashboard).await;
    if let ControlMessage::NvrOffline(e) = event {
        assert_eq!(e.hostname.as_str(), "NVR-02");
        assert_eq!(e.device_name, "Lager");
    } else {
        panic!("Erwartet nvr_offline, bekam {:?}", event);
    }

    let stats = naechste(&mut dashboard).await;
    if let ControlMessage::StatsUpdate(s) = stats {
        assert_eq!(s.zaehler.geraete_offline, 1);
    } else {
        panic!("Erwartet stats_update, bekam {:?}", stats);
    }

    // Genau ein Uebergangspaar im Verlauf: online + offline
    assert_eq!(state.verlauf.anzahl(), 2);
}

#[tokio::test]
async fn heartbeat_ohne_anmeldung_wird_ignoriert() {
    let state = test_state();
    let (shutdown, _) = watch::channel(false);

    let mut client = verbinden(&state, &shutdown);
    client
        .send(heartbeat(GeraeteStatus::Online, &[]))
        .await
        .unwrap();

    // Keine Antwort, keine Trennung: die Rollen-Anmeldung klappt danach
    client.send(ControlMessage::Dashboard).await.unwrap();
    assert!(matches!(
        naechste(&mut client).await,
        ControlMessage::DashboardOk
    ));

    // Der ignorierte Heartbeat hat keinen Flottenzustand erzeugt
    assert_eq!(state.aggregator.geraete_anzahl(), 0);
}

#[tokio::test]
async fn dashboards_sehen_stats_auch_ohne_uebergaenge() {
    let state = test_state();
    let (shutdown, _) = watch::channel(false);

    let mut geraet = verbinden(&state, &shutdown);
    geraet
        .send(auth("NVR-01", GeraeteStatus::Online, &[]))
        .await
        .unwrap();
    naechste(&mut geraet).await; // auth_ok

    let mut dashboard = dashboard_anmelden(&state, &shutdown).await;

    // Heartbeat ohne Aenderung: kein Event, aber ein frischer Stats-Frame
    geraet
        .send(heartbeat(GeraeteStatus::Online, &[]))
        .await
        .unwrap();

    let stats = naechste(&mut dashboard).await;
    assert!(
        matches!(stats, ControlMessage::StatsUpdate(_)),
        "Erwartet stats_update, bekam {:?}",
        stats
    );
}
