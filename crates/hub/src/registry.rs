//! Verbindungsregister – Wer ist verbunden, mit welcher Rolle
//!
//! Das Register haelt die Send-Queues aller verbundenen Clients, den
//! Hostname-Index der Geraete und die Liveness-Zeitstempel fuer den
//! Heartbeat-Waechter.
//!
//! ## Eviction-Regeln
//! - Pro Hostname hoechstens eine lebende Verbindung: eine zweite
//!   Registrierung desselben Hostnames verdraengt die alte (last-writer-wins).
//!   Die alte Verbindung merkt das am Schliessen ihrer Send-Queue.
//! - Broadcast mit Fehler-Isolation pro Empfaenger: eine geschlossene oder
//!   volle Queue verdraengt diesen einen Empfaenger, die Zustellung an die
//!   uebrigen laeuft weiter. Ein Dashboard das nicht mitkommt wuerde sonst
//!   Uebergangs-Frames verlieren und seine Sicht dauerhaft veralten lassen;
//!   das Protokoll hat keinen Resync, der Client verbindet sich neu.

use dashmap::DashMap;
use kamerad_core::types::{ClientRolle, ConnectionId, Hostname};
use kamerad_protocol::ControlMessage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Client
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// VerbindungsEintrag
// ---------------------------------------------------------------------------

/// Registereintrag einer verbundenen Client-Verbindung
#[derive(Debug)]
struct VerbindungsEintrag {
    rolle: ClientRolle,
    hostname: Option<Hostname>,
    tx: mpsc::Sender<ControlMessage>,
    /// Zeitpunkt des letzten eingehenden Frames
    zuletzt_gesehen: Instant,
    registriert_am: Instant,
}

// ---------------------------------------------------------------------------
// VerbindungsRegister
// ---------------------------------------------------------------------------

/// Zentrales Register aller verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct VerbindungsRegister {
    inner: Arc<RegisterInner>,
}

struct RegisterInner {
    /// Alle Verbindungen, indiziert nach ConnectionId
    verbindungen: DashMap<ConnectionId, VerbindungsEintrag>,
    /// Hostname -> ConnectionId der aktuell lebenden Geraete-Verbindung
    hostname_index: DashMap<Hostname, ConnectionId>,
}

impl VerbindungsRegister {
    /// Erstellt ein neues, leeres Register
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RegisterInner {
                verbindungen: DashMap::new(),
                hostname_index: DashMap::new(),
            }),
        }
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Fuer Geraete (`hostname = Some(..)`) gilt last-writer-wins: eine
    /// bestehende Verbindung desselben Hostnames wird vor der Registrierung
    /// entfernt. Ihre Send-Queue schliesst, womit die alte Verbindungsschleife
    /// endet.
    pub fn registrieren(
        &self,
        rolle: ClientRolle,
        hostname: Option<Hostname>,
    ) -> (ConnectionId, mpsc::Receiver<ControlMessage>) {
        let id = ConnectionId::new();

        if let Some(ref h) = hostname {
            if let Some(alte_id) = self.inner.hostname_index.insert(h.clone(), id) {
                if self.inner.verbindungen.remove(&alte_id).is_some() {
                    tracing::info!(
                        hostname = %h,
                        alte_verbindung = %alte_id,
                        neue_verbindung = %id,
                        "Bestehende Geraete-Verbindung verdraengt"
                    );
                }
            }
        }

        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let jetzt = Instant::now();
        self.inner.verbindungen.insert(
            id,
            VerbindungsEintrag {
                rolle,
                hostname,
                tx,
                zuletzt_gesehen: jetzt,
                registriert_am: jetzt,
            },
        );
        tracing::debug!(verbindung = %id, rolle = ?rolle, "Verbindung registriert");
        (id, rx)
    }

    /// Entfernt eine Verbindung aus dem Register
    ///
    /// Gibt `true` zurueck wenn die Verbindung noch eingetragen war. No-op
    /// fuer unbekannte IDs (z.B. nach Verdraengung oder Sweep).
    pub fn entfernen(&self, id: &ConnectionId) -> bool {
        match self.inner.verbindungen.remove(id) {
            Some((_, eintrag)) => {
                if let Some(ref h) = eintrag.hostname {
                    // Index nur bereinigen wenn er noch auf diese Verbindung zeigt
                    self.inner.hostname_index.remove_if(h, |_, v| v == id);
                }
                tracing::debug!(verbindung = %id, "Verbindung aus Register entfernt");
                true
            }
            None => false,
        }
    }

    /// Schiebt die Liveness-Deadline einer Verbindung nach vorn
    pub fn beruehren(&self, id: &ConnectionId) {
        if let Some(mut eintrag) = self.inner.verbindungen.get_mut(id) {
            eintrag.zuletzt_gesehen = Instant::now();
        }
    }

    /// Gibt die ConnectionId der lebenden Verbindung eines Hostnames zurueck
    pub fn nach_hostname(&self, hostname: &Hostname) -> Option<ConnectionId> {
        self.inner.hostname_index.get(hostname).map(|e| *e)
    }

    /// Prueft ob ein Geraet aktuell verbunden ist
    pub fn ist_verbunden(&self, hostname: &Hostname) -> bool {
        self.inner.hostname_index.contains_key(hostname)
    }

    /// Sendet eine Nachricht an alle Dashboards
    ///
    /// Fehler-Isolation pro Empfaenger: eine geschlossene oder volle Queue
    /// verdraengt den Empfaenger, die uebrigen empfangen weiter. Gibt die
    /// Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_dashboards_senden(&self, nachricht: ControlMessage) -> usize {
        // Snapshot der Empfaenger, damit waehrend der Zustellung kein
        // Map-Zugriff gehalten wird
        let empfaenger: Vec<(ConnectionId, mpsc::Sender<ControlMessage>)> = self
            .inner
            .verbindungen
            .iter()
            .filter(|e| e.value().rolle == ClientRolle::Dashboard)
            .map(|e| (*e.key(), e.value().tx.clone()))
            .collect();

        let mut gesendet = 0;
        for (id, tx) in empfaenger {
            match tx.try_send(nachricht.clone()) {
                Ok(()) => gesendet += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        verbindung = %id,
                        "Send-Queue voll – langsames Dashboard verdraengt"
                    );
                    self.entfernen(&id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(verbindung = %id, "Send-Queue geschlossen – Dashboard verdraengt");
                    self.entfernen(&id);
                }
            }
        }
        gesendet
    }

    /// Geraete deren letzter eingehender Frame aelter als `timeout` ist
    ///
    /// Snapshot-Scan fuer den Heartbeat-Waechter; haelt keinen Lock ueber
    /// die Rueckgabe hinaus.
    pub fn abgelaufene_geraete(&self, timeout: Duration) -> Vec<(ConnectionId, Hostname)> {
        let jetzt = Instant::now();
        self.inner
            .verbindungen
            .iter()
            .filter_map(|e| {
                let eintrag = e.value();
                if eintrag.rolle != ClientRolle::Geraet {
                    return None;
                }
                let hostname = eintrag.hostname.clone()?;
                if jetzt.duration_since(eintrag.zuletzt_gesehen) > timeout {
                    Some((*e.key(), hostname))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Gibt die Anzahl aller Verbindungen zurueck
    pub fn verbindungs_anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }

    /// Gibt die Anzahl der verbundenen Geraete zurueck
    pub fn geraete_anzahl(&self) -> usize {
        self.inner.hostname_index.len()
    }

    /// Gibt die Anzahl der verbundenen Dashboards zurueck
    pub fn dashboard_anzahl(&self) -> usize {
        self.inner
            .verbindungen
            .iter()
            .filter(|e| e.value().rolle == ClientRolle::Dashboard)
            .count()
    }

    /// Verbindungsdauer einer Verbindung (fuer Logging)
    pub fn verbindungsdauer(&self, id: &ConnectionId) -> Option<Duration> {
        self.inner
            .verbindungen
            .get(id)
            .map(|e| e.registriert_am.elapsed())
    }
}

impl Default for VerbindungsRegister {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kamerad_protocol::ControlMessage;

    fn test_nachricht() -> ControlMessage {
        ControlMessage::Dashboard
    }

    #[tokio::test]
    async fn geraet_registrieren_und_entfernen() {
        let register = VerbindungsRegister::neu();
        let hostname = Hostname::neu("NVR-01");

        let (id, _rx) = register.registrieren(ClientRolle::Geraet, Some(hostname.clone()));
        assert!(register.ist_verbunden(&hostname));
        assert_eq!(register.nach_hostname(&hostname), Some(id));
        assert_eq!(register.geraete_anzahl(), 1);

        assert!(register.entfernen(&id));
        assert!(!register.ist_verbunden(&hostname));
        assert!(!register.entfernen(&id), "Zweites Entfernen ist ein No-op");
    }

    #[tokio::test]
    async fn doppelter_hostname_verdraengt_alte_verbindung() {
        let register = VerbindungsRegister::neu();
        let hostname = Hostname::neu("NVR-01");

        let (alte_id, mut alte_rx) =
            register.registrieren(ClientRolle::Geraet, Some(hostname.clone()));
        let (neue_id, _neue_rx) =
            register.registrieren(ClientRolle::Geraet, Some(hostname.clone()));

        // Genau eine lebende Verbindung, und zwar die neue
        assert_eq!(register.geraete_anzahl(), 1);
        assert_eq!(register.verbindungs_anzahl(), 1);
        assert_eq!(register.nach_hostname(&hostname), Some(neue_id));

        // Die alte Queue ist geschlossen – ihr Task beendet sich darueber
        assert!(alte_rx.recv().await.is_none());

        // Cleanup der alten Verbindung darf die neue nicht beruehren
        assert!(!register.entfernen(&alte_id));
        assert!(register.ist_verbunden(&hostname));
    }

    #[tokio::test]
    async fn dashboard_broadcast_mit_fehler_isolation() {
        let register = VerbindungsRegister::neu();

        let (_id1, mut rx1) = register.registrieren(ClientRolle::Dashboard, None);
        let (_id2, rx2) = register.registrieren(ClientRolle::Dashboard, None);
        let (_id3, mut rx3) = register.registrieren(ClientRolle::Dashboard, None);

        // Ein Dashboard ist tot (Receiver weggeworfen)
        drop(rx2);

        let gesendet = register.an_dashboards_senden(test_nachricht());
        assert_eq!(gesendet, 2, "Die lebenden Dashboards empfangen weiterhin");
        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());

        // Das tote Dashboard wurde verdraengt
        assert_eq!(register.dashboard_anzahl(), 2);
    }

    #[tokio::test]
    async fn volle_queue_verdraengt_langsames_dashboard() {
        let register = VerbindungsRegister::neu();
        let (_id, mut rx) = register.registrieren(ClientRolle::Dashboard, None);

        // Queue bis zum Rand fuellen, ohne zu lesen
        for _ in 0..SEND_QUEUE_GROESSE {
            assert_eq!(register.an_dashboards_senden(test_nachricht()), 1);
        }

        // Der naechste Broadcast passt nicht mehr: Empfaenger wird verdraengt
        assert_eq!(register.an_dashboards_senden(test_nachricht()), 0);
        assert_eq!(register.dashboard_anzahl(), 0);

        // Die gepufferten Frames bleiben lesbar, danach schliesst die Queue
        for _ in 0..SEND_QUEUE_GROESSE {
            assert!(rx.recv().await.is_some());
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn verbindungsdauer_nur_fuer_eingetragene_verbindungen() {
        let register = VerbindungsRegister::neu();
        let (id, _rx) = register.registrieren(ClientRolle::Dashboard, None);

        assert!(register.verbindungsdauer(&id).is_some());
        register.entfernen(&id);
        assert!(register.verbindungsdauer(&id).is_none());
    }

    #[tokio::test]
    async fn geraete_empfangen_keine_dashboard_broadcasts() {
        let register = VerbindungsRegister::neu();
        let (_gid, mut geraet_rx) =
            register.registrieren(ClientRolle::Geraet, Some(Hostname::neu("NVR-01")));
        let (_did, mut dash_rx) = register.registrieren(ClientRolle::Dashboard, None);

        let gesendet = register.an_dashboards_senden(test_nachricht());
        assert_eq!(gesendet, 1);
        assert!(dash_rx.try_recv().is_ok());
        assert!(geraet_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn abgelaufene_geraete_nach_timeout() {
        let register = VerbindungsRegister::neu();
        let hostname = Hostname::neu("NVR-01");
        let (id, _rx) = register.registrieren(ClientRolle::Geraet, Some(hostname.clone()));
        let (_did, _drx) = register.registrieren(ClientRolle::Dashboard, None);

        // Grosszuegige Deadline: nichts ist abgelaufen
        assert!(register
            .abgelaufene_geraete(Duration::from_secs(60))
            .is_empty());

        // Null-Deadline: das Geraet ist abgelaufen, das Dashboard nie
        let abgelaufen = register.abgelaufene_geraete(Duration::ZERO);
        assert_eq!(abgelaufen, vec![(id, hostname.clone())]);

        // Beruehren schiebt die Deadline nach vorn
        register.beruehren(&id);
        assert!(register
            .abgelaufene_geraete(Duration::from_secs(60))
            .is_empty());
    }

    #[test]
    fn clone_teilt_inneren_state() {
        let r1 = VerbindungsRegister::neu();
        let r2 = r1.clone();
        let (_id, _rx) = r1.registrieren(ClientRolle::Geraet, Some(Hostname::neu("NVR-01")));
        assert_eq!(r2.geraete_anzahl(), 1);
    }
}
