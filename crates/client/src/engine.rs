//! Reconnect-Engine – Selbstheilende Verbindung zum Status-Hub
//!
//! Die Engine besitzt die Socket-Verbindung und haelt sie am Leben:
//!
//! ```text
//! Getrennt --verbinden()--> Verbindet --ok--> Verbunden
//!                               ^               |
//!                               |               | unerwartetes Ende
//!                      WartetAufReconnect <-----+
//!                               |
//!                               +--max Versuche--> Aufgegeben
//! ```
//!
//! - Exponentieller Backoff: `min(start * 2^(versuch-1), max)`, Standard
//!   1000 ms bis 30000 ms, hoechstens 10 Versuche, dann terminal aufgegeben.
//!   Ein manuelles `verbinden()` setzt den Zaehler zurueck, ebenso jeder
//!   erfolgreiche Verbindungsaufbau.
//! - Offline-Warteschlange: `senden()` reiht ohne Verbindung unbegrenzt ein;
//!   nach dem Aufbau geht erst die Rollen-Anmeldung raus, dann die
//!   Warteschlange in FIFO-Reihenfolge.
//! - Liveness-Watchdog: kommt laenger als das konfigurierte Fenster kein
//!   Frame herein, wird die Verbindung zwangsgetrennt und der Reconnect-Pfad
//!   betreten. Geraete-Agenten schalten den Watchdog ab (`None`), da der Hub
//!   ihnen nach dem `auth_ok` nichts mehr pusht.
//! - `trennen()` ist gewollt und unterdrueckt den Auto-Reconnect.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use kamerad_protocol::{ControlMessage, DekodiertesFrame, FrameCodec};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::error::{ClientError, ClientResult};

// ---------------------------------------------------------------------------
// Verbinder
// ---------------------------------------------------------------------------

/// Baut den rohen Transport zum Hub auf
///
/// Die Engine ist ueber diesen Trait generisch, damit Tests mit
/// `tokio::io::duplex` denselben Pfad fahren wie der TCP-Client.
#[async_trait]
pub trait Verbinder: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Baut eine neue Verbindung auf
    async fn verbinden(&self) -> ClientResult<Self::Stream>;
}

/// TCP-Verbinder fuer den Produktivbetrieb
pub struct TcpVerbinder {
    adresse: String,
}

impl TcpVerbinder {
    /// Erstellt einen Verbinder fuer `host:port`
    pub fn neu(adresse: impl Into<String>) -> Self {
        Self {
            adresse: adresse.into(),
        }
    }
}

#[async_trait]
impl Verbinder for TcpVerbinder {
    type Stream = TcpStream;

    async fn verbinden(&self) -> ClientResult<TcpStream> {
        Ok(TcpStream::connect(&self.adresse).await?)
    }
}

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration des Reconnect-Verhaltens
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximale Anzahl fehlgeschlagener Versuche bis zur Aufgabe
    pub max_versuche: u32,
    /// Start-Verzoegerung in Millisekunden
    pub start_verzoegerung_ms: u64,
    /// Obergrenze der Verzoegerung in Millisekunden
    pub max_verzoegerung_ms: u64,
    /// Watchdog-Fenster: Zwangstrennung wenn so lange kein Frame hereinkommt
    /// (Standard: 2x das erwartete 30s-Heartbeat-Intervall). `None` schaltet
    /// den Watchdog ab.
    pub watchdog_fenster: Option<Duration>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_versuche: 10,
            start_verzoegerung_ms: 1000,
            max_verzoegerung_ms: 30_000,
            watchdog_fenster: Some(Duration::from_secs(60)),
        }
    }
}

impl ReconnectConfig {
    /// Verzoegerung vor dem gegebenen Versuch (1-basiert)
    pub fn verzoegerung_fuer_versuch(&self, versuch: u32) -> Duration {
        let exponent = versuch.saturating_sub(1).min(16);
        let ms = self
            .start_verzoegerung_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_verzoegerung_ms);
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// Zustand
// ---------------------------------------------------------------------------

/// Zustand der Engine, beobachtbar ueber einen watch-Kanal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Keine Verbindung, kein Reconnect geplant
    Getrennt,
    /// Verbindungsaufbau laeuft
    Verbindet,
    /// Verbunden und angemeldet
    Verbunden,
    /// Wartet auf den naechsten Reconnect-Versuch
    WartetAufReconnect { versuch: u32 },
    /// Alle Versuche erschoepft; erst ein manuelles `verbinden()` hilft
    Aufgegeben,
}

impl VerbindungsZustand {
    /// Prueft ob die Engine aktuell verbunden ist
    pub fn ist_verbunden(&self) -> bool {
        matches!(self, Self::Verbunden)
    }
}

/// Liefert die Rollen-Anmeldung fuer jeden (Neu-)Aufbau
///
/// Fuer Dashboards konstant `ControlMessage::Dashboard`; Geraete-Agenten
/// liefern hier ein `auth` mit ihrem aktuellen Gesundheitszustand.
pub type AnmeldungsQuelle = Arc<dyn Fn() -> ControlMessage + Send + Sync>;

// ---------------------------------------------------------------------------
// ReconnectEngine
// ---------------------------------------------------------------------------

enum EngineBefehl {
    Verbinden,
    Trennen,
    Senden(ControlMessage),
}

/// Handle auf die Engine-Task
///
/// `starten` spawnt die Schleife und gibt neben dem Handle den Empfaenger
/// fuer eingehende Nachrichten zurueck.
pub struct ReconnectEngine {
    befehl_tx: mpsc::UnboundedSender<EngineBefehl>,
    zustand_rx: watch::Receiver<VerbindungsZustand>,
}

impl ReconnectEngine {
    /// Startet die Engine-Task
    ///
    /// Die Engine beginnt im Zustand `Getrennt`; der erste Aufbau passiert
    /// erst mit `verbinden()`.
    pub fn starten<C: Verbinder>(
        verbinder: C,
        config: ReconnectConfig,
        anmeldung: AnmeldungsQuelle,
    ) -> (Self, mpsc::UnboundedReceiver<ControlMessage>) {
        let (befehl_tx, befehl_rx) = mpsc::unbounded_channel();
        let (eingehend_tx, eingehend_rx) = mpsc::unbounded_channel();
        let (zustand_tx, zustand_rx) = watch::channel(VerbindungsZustand::Getrennt);

        let lauf = EngineLauf {
            verbinder,
            config,
            anmeldung,
            befehl_rx,
            eingehend_tx,
            zustand_tx,
            warteschlange: VecDeque::new(),
            versuch: 0,
        };
        tokio::spawn(lauf.ausfuehren());

        (
            Self {
                befehl_tx,
                zustand_rx,
            },
            eingehend_rx,
        )
    }

    /// Startet den Verbindungsaufbau und setzt den Versuchszaehler zurueck
    pub fn verbinden(&self) -> ClientResult<()> {
        self.befehl(EngineBefehl::Verbinden)
    }

    /// Trennt gewollt; der Auto-Reconnect bleibt aus
    pub fn trennen(&self) -> ClientResult<()> {
        self.befehl(EngineBefehl::Trennen)
    }

    /// Sendet eine Nachricht; ohne Verbindung wird unbegrenzt eingereiht
    pub fn senden(&self, nachricht: ControlMessage) -> ClientResult<()> {
        self.befehl(EngineBefehl::Senden(nachricht))
    }

    /// Gibt den aktuellen Zustand zurueck
    pub fn zustand(&self) -> VerbindungsZustand {
        self.zustand_rx.borrow().clone()
    }

    /// Abonniert Zustandsaenderungen
    pub fn zustand_beobachten(&self) -> watch::Receiver<VerbindungsZustand> {
        self.zustand_rx.clone()
    }

    fn befehl(&self, befehl: EngineBefehl) -> ClientResult<()> {
        self.befehl_tx
            .send(befehl)
            .map_err(|_| ClientError::EngineBeendet)
    }
}

// ---------------------------------------------------------------------------
// Engine-Schleife
// ---------------------------------------------------------------------------

enum SitzungsEnde {
    /// Gewolltes `trennen()` durch den Besitzer
    Gewollt,
    /// Socket-Ende, Fehler oder Watchdog – Reconnect-Pfad
    Unerwartet,
    /// Engine-Handle wurde weggeworfen
    Beendet,
}

struct EngineLauf<C: Verbinder> {
    verbinder: C,
    config: ReconnectConfig,
    anmeldung: AnmeldungsQuelle,
    befehl_rx: mpsc::UnboundedReceiver<EngineBefehl>,
    eingehend_tx: mpsc::UnboundedSender<ControlMessage>,
    zustand_tx: watch::Sender<VerbindungsZustand>,
    warteschlange: VecDeque<ControlMessage>,
    versuch: u32,
}

impl<C: Verbinder> EngineLauf<C> {
    async fn ausfuehren(mut self) {
        loop {
            let zustand = self.zustand_tx.borrow().clone();
            match zustand {
                VerbindungsZustand::Getrennt | VerbindungsZustand::Aufgegeben => {
                    match self.befehl_rx.recv().await {
                        Some(EngineBefehl::Verbinden) => {
                            self.versuch = 0;
                            self.setzen(VerbindungsZustand::Verbindet);
                        }
                        Some(EngineBefehl::Senden(m)) => self.warteschlange.push_back(m),
                        Some(EngineBefehl::Trennen) => {}
                        None => break,
                    }
                }

                VerbindungsZustand::Verbindet => match self.verbinder.verbinden().await {
                    Ok(stream) => {
                        self.setzen(VerbindungsZustand::Verbunden);
                        match self.sitzung(stream).await {
                            SitzungsEnde::Gewollt => self.setzen(VerbindungsZustand::Getrennt),
                            SitzungsEnde::Unerwartet => {
                                if !self.reconnect_planen().await {
                                    break;
                                }
                            }
                            SitzungsEnde::Beendet => break,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(fehler = %e, "Verbindungsaufbau fehlgeschlagen");
                        if !self.reconnect_planen().await {
                            break;
                        }
                    }
                },

                // Uebergangszustaende werden nur von dieser Schleife gesetzt
                VerbindungsZustand::Verbunden
                | VerbindungsZustand::WartetAufReconnect { .. } => {
                    self.setzen(VerbindungsZustand::Getrennt);
                }
            }
        }
        tracing::debug!("Engine-Task beendet");
    }

    /// Eine aufgebaute Sitzung: anmelden, Warteschlange leeren, Frames pumpen
    async fn sitzung(&mut self, stream: C::Stream) -> SitzungsEnde {
        let mut framed = Framed::new(stream, FrameCodec::new());

        // Rollen-Anmeldung zuerst
        if let Err(e) = framed.send((self.anmeldung)()).await {
            tracing::warn!(fehler = %e, "Anmeldung senden fehlgeschlagen");
            return SitzungsEnde::Unerwartet;
        }

        // Offline-Warteschlange in FIFO-Reihenfolge leeren
        while let Some(nachricht) = self.warteschlange.pop_front() {
            if let Err(e) = framed.send(nachricht.clone()).await {
                tracing::warn!(fehler = %e, "Warteschlange leeren fehlgeschlagen");
                self.warteschlange.push_front(nachricht);
                return SitzungsEnde::Unerwartet;
            }
        }

        // Erfolgreicher Aufbau setzt den Zaehler zurueck
        self.versuch = 0;
        tracing::info!("Verbunden und angemeldet");

        // Abgeschalteter Watchdog = praktisch unendliches Fenster
        let fenster = self
            .config
            .watchdog_fenster
            .unwrap_or(Duration::from_secs(365 * 24 * 60 * 60));
        let watchdog = tokio::time::sleep(fenster);
        tokio::pin!(watchdog);

        loop {
            tokio::select! {
                frame = framed.next() => {
                    match frame {
                        Some(Ok(DekodiertesFrame::Nachricht(nachricht))) => {
                            watchdog.as_mut().reset(tokio::time::Instant::now() + fenster);
                            if self.eingehend_tx.send(nachricht).is_err() {
                                tracing::debug!("Kein Empfaenger fuer eingehende Nachrichten");
                            }
                        }
                        Some(Ok(DekodiertesFrame::Ungueltig(fehler))) => {
                            watchdog.as_mut().reset(tokio::time::Instant::now() + fenster);
                            tracing::warn!(fehler = %fehler, "Ungueltiges Frame vom Hub – verworfen");
                        }
                        Some(Err(e)) => {
                            tracing::warn!(fehler = %e, "Frame-Lesefehler");
                            return SitzungsEnde::Unerwartet;
                        }
                        None => {
                            tracing::info!("Hub hat die Verbindung beendet");
                            return SitzungsEnde::Unerwartet;
                        }
                    }
                }

                befehl = self.befehl_rx.recv() => {
                    match befehl {
                        Some(EngineBefehl::Senden(nachricht)) => {
                            if let Err(e) = framed.send(nachricht).await {
                                tracing::warn!(fehler = %e, "Senden fehlgeschlagen");
                                return SitzungsEnde::Unerwartet;
                            }
                        }
                        Some(EngineBefehl::Trennen) => {
                            let _ = framed.close().await;
                            tracing::info!("Gewollt getrennt");
                            return SitzungsEnde::Gewollt;
                        }
                        Some(EngineBefehl::Verbinden) => {
                            // Bereits verbunden
                        }
                        None => {
                            let _ = framed.close().await;
                            return SitzungsEnde::Beendet;
                        }
                    }
                }

                _ = &mut watchdog => {
                    tracing::warn!(
                        fenster_ms = fenster.as_millis() as u64,
                        "Watchdog: kein eingehender Frame im Fenster – Zwangstrennung"
                    );
                    let _ = framed.close().await;
                    return SitzungsEnde::Unerwartet;
                }
            }
        }
    }

    /// Plant den naechsten Versuch; `false` beendet die Engine-Task
    async fn reconnect_planen(&mut self) -> bool {
        self.versuch += 1;
        if self.versuch >= self.config.max_versuche {
            tracing::error!(
                versuche = self.versuch,
                "Reconnect aufgegeben – manuelles verbinden() noetig"
            );
            self.setzen(VerbindungsZustand::Aufgegeben);
            return true;
        }

        let verzoegerung = self.config.verzoegerung_fuer_versuch(self.versuch);
        tracing::info!(
            versuch = self.versuch,
            verzoegerung_ms = verzoegerung.as_millis() as u64,
            "Reconnect geplant"
        );
        self.setzen(VerbindungsZustand::WartetAufReconnect {
            versuch: self.versuch,
        });

        let schlafen = tokio::time::sleep(verzoegerung);
        tokio::pin!(schlafen);

        loop {
            tokio::select! {
                _ = &mut schlafen => {
                    self.setzen(VerbindungsZustand::Verbindet);
                    return true;
                }
                befehl = self.befehl_rx.recv() => {
                    match befehl {
                        Some(EngineBefehl::Trennen) => {
                            self.setzen(VerbindungsZustand::Getrennt);
                            return true;
                        }
                        Some(EngineBefehl::Verbinden) => {
                            self.versuch = 0;
                            self.setzen(VerbindungsZustand::Verbindet);
                            return true;
                        }
                        Some(EngineBefehl::Senden(m)) => self.warteschlange.push_back(m),
                        None => return false,
                    }
                }
            }
        }
    }

    fn setzen(&self, zustand: VerbindungsZustand) {
        let _ = self.zustand_tx.send(zustand);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
