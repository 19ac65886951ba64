//! Status-Aggregator – Kanonischer Zustand der gesamten Flotte
//!
//! Der Aggregator haelt pro Hostname den zuletzt bekannten Geraete- und
//! Kamerazustand und erzeugt aus eingehenden Berichten Diff-basierte
//! `StatusWechsel`-Ereignisse. Nur echte Uebergaenge erzeugen Ereignisse;
//! ein Bericht der nichts aendert ist still.
//!
//! ## Regeln
//! - Erster Bericht eines Hostnames: das Geraet gilt als implizit offline,
//!   der Uebergang offline -> gemeldeter Status feuert genau einmal.
//! - Kameras die in einem Bericht fehlen behalten ihren letzten Status
//!   ("keine neue Information"), unbegrenzt.
//! - Zusammenfassungs-Zaehler werden immer als vollstaendiger Fold ueber den
//!   aktuellen Zustand berechnet, nie inkrementell fortgeschrieben.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kamerad_core::event::{StatusWechsel, StatusZusammenfassung};
use kamerad_core::types::{CameraId, GeraeteStatus, Hostname, KameraStatus};
use kamerad_protocol::SystemStatus;
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// GeraeteZustand
// ---------------------------------------------------------------------------

/// Zuletzt bekannter Zustand eines Geraets samt seiner Kameras
#[derive(Debug, Clone)]
pub struct GeraeteZustand {
    pub anzeige_name: String,
    pub status: GeraeteStatus,
    pub kameras: HashMap<CameraId, KameraStatus>,
    pub letzter_heartbeat: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// StatusAggregator
// ---------------------------------------------------------------------------

/// Kanonischer Flottenzustand mit Diff-basierter Event-Erzeugung
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct StatusAggregator {
    inner: Arc<AggregatorInner>,
}

struct AggregatorInner {
    geraete: DashMap<Hostname, GeraeteZustand>,
}

impl StatusAggregator {
    /// Erstellt einen neuen, leeren Aggregator
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                geraete: DashMap::new(),
            }),
        }
    }

    /// Wendet einen Gesundheitsbericht an und gibt die Uebergaenge zurueck
    ///
    /// Reihenfolge der Ereignisse: erst Kamera-Uebergaenge (nur fuer bereits
    /// bekannte Kameras deren Status sich aendert), dann der Geraete-Uebergang.
    /// Neue Kameras werden still in den Zustand aufgenommen; sie kommen mit
    /// dem Geraete-Ereignis an.
    pub fn bericht_anwenden(
        &self,
        hostname: &Hostname,
        anzeige_name: &str,
        bericht: &SystemStatus,
        jetzt: DateTime<Utc>,
    ) -> Vec<StatusWechsel> {
        let mut wechsel = Vec::new();

        let mut eintrag = self
            .inner
            .geraete
            .entry(hostname.clone())
            .or_insert_with(|| GeraeteZustand {
                anzeige_name: anzeige_name.to_string(),
                // Erster Kontakt: implizit offline, damit der erste Bericht
                // einen echten Uebergang erzeugt
                status: GeraeteStatus::Offline,
                kameras: HashMap::new(),
                letzter_heartbeat: jetzt,
            });

        eintrag.anzeige_name = anzeige_name.to_string();
        eintrag.letzter_heartbeat = jetzt;

        // Kamera-Diffs (nur gemeldete Kameras; fehlende behalten ihren Status)
        for kamera in &bericht.cameras {
            match eintrag.kameras.get(&kamera.identifier) {
                Some(&alt) if alt != kamera.status => {
                    wechsel.push(StatusWechsel::Kamera {
                        hostname: hostname.clone(),
                        kamera: kamera.identifier.clone(),
                        alt,
                        neu: kamera.status,
                        zeitpunkt: jetzt,
                    });
                }
                Some(_) => {}
                None => {
                    tracing::debug!(
                        hostname = %hostname,
                        kamera = %kamera.identifier,
                        status = %kamera.status,
                        "Neue Kamera aufgenommen"
                    );
                }
            }
            eintrag.kameras.insert(kamera.identifier.clone(), kamera.status);
        }

        // Geraete-Uebergang
        if eintrag.status != bericht.status {
            wechsel.push(StatusWechsel::Geraet {
                hostname: hostname.clone(),
                alt: eintrag.status,
                neu: bericht.status,
                zeitpunkt: jetzt,
            });
            eintrag.status = bericht.status;
        }

        wechsel
    }

    /// Markiert ein Geraet als offline (Heartbeat-Timeout, Socket-Ende)
    ///
    /// Erzeugt den Offline-Uebergang genau einmal: wiederholte Aufrufe fuer
    /// ein bereits offlines oder unbekanntes Geraet geben eine leere Liste
    /// zurueck.
    pub fn geraet_offline_markieren(
        &self,
        hostname: &Hostname,
        jetzt: DateTime<Utc>,
    ) -> Vec<StatusWechsel> {
        let mut eintrag = match self.inner.geraete.get_mut(hostname) {
            Some(e) => e,
            None => return Vec::new(),
        };

        if eintrag.status == GeraeteStatus::Offline {
            return Vec::new();
        }

        let alt = eintrag.status;
        eintrag.status = GeraeteStatus::Offline;

        vec![StatusWechsel::Geraet {
            hostname: hostname.clone(),
            alt,
            neu: GeraeteStatus::Offline,
            zeitpunkt: jetzt,
        }]
    }

    /// Berechnet die Zusammenfassungs-Zaehler als vollstaendigen Fold
    pub fn zusammenfassung(&self) -> StatusZusammenfassung {
        let mut z = StatusZusammenfassung::default();
        for eintrag in self.inner.geraete.iter() {
            match eintrag.status {
                GeraeteStatus::Online => z.geraete_online += 1,
                GeraeteStatus::Offline => z.geraete_offline += 1,
                GeraeteStatus::Instabil => z.geraete_instabil += 1,
            }
            for status in eintrag.kameras.values() {
                match status {
                    KameraStatus::Online => z.kameras_online += 1,
                    KameraStatus::Offline => z.kameras_offline += 1,
                }
            }
        }
        z
    }

    /// Gibt den zuletzt bekannten Zustand eines Geraets zurueck (Kopie)
    pub fn zustand_von(&self, hostname: &Hostname) -> Option<GeraeteZustand> {
        self.inner.geraete.get(hostname).map(|e| e.clone())
    }

    /// Gibt den Anzeigenamen eines bekannten Geraets zurueck
    pub fn anzeige_name(&self, hostname: &Hostname) -> Option<String> {
        self.inner.geraete.get(hostname).map(|e| e.anzeige_name.clone())
    }

    /// Gibt die Anzahl bekannter Geraete zurueck
    pub fn geraete_anzahl(&self) -> usize {
        self.inner.geraete.len()
    }
}

impl Default for StatusAggregator {
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
    use kamerad_protocol::KameraBericht;

    fn bericht(status: GeraeteStatus, kameras: &[(&str, KameraStatus)]) -> SystemStatus {
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

    fn nvr01() -> Hostname {
        Hostname::neu("NVR-01")
    }

    #[test]
    fn erster_bericht_feuert_implizit_offline_uebergang() {
        let agg = StatusAggregator::neu();
        let wechsel = agg.bericht_anwenden(
            &nvr01(),
            "Eingang Nord",
            &bericht(
                GeraeteStatus::Online,
                &[
                    ("CAM-001", KameraStatus::Online),
                    ("CAM-002", KameraStatus::Online),
                ],
            ),
            Utc::now(),
        );

        // Genau ein Geraete-Ereignis (offline -> online), keine Kamera-Events
        assert_eq!(wechsel.len(), 1);
        assert!(matches!(
            wechsel[0],
            StatusWechsel::Geraet {
                alt: GeraeteStatus::Offline,
                neu: GeraeteStatus::Online,
                ..
            }
        ));

        let z = agg.zusammenfassung();
        assert_eq!(z.geraete_online, 1);
        assert_eq!(z.kameras_online, 2);
    }

    #[test]
    fn kamera_uebergang_erzeugt_genau_ein_ereignis() {
        let agg = StatusAggregator::neu();
        let jetzt = Utc::now();
        agg.bericht_anwenden(
            &nvr01(),
            "Eingang Nord",
            &bericht(
                GeraeteStatus::Online,
                &[
                    ("CAM-001", KameraStatus::Online),
                    ("CAM-002", KameraStatus::Online),
                ],
            ),
            jetzt,
        );

        // CAM-002 faellt aus
        let wechsel = agg.bericht_anwenden(
            &nvr01(),
            "Eingang Nord",
            &bericht(
                GeraeteStatus::Online,
                &[
                    ("CAM-001", KameraStatus::Online),
                    ("CAM-002", KameraStatus::Offline),
                ],
            ),
            jetzt,
        );

        assert_eq!(wechsel.len(), 1);
        assert!(matches!(
            &wechsel[0],
            StatusWechsel::Kamera {
                alt: KameraStatus::Online,
                neu: KameraStatus::Offline,
                ..
            }
        ));

        let z = agg.zusammenfassung();
        assert_eq!(z.kameras_online, 1);
        assert_eq!(z.kameras_offline, 1);
    }

    #[test]
    fn unveraenderter_bericht_ist_still() {
        let agg = StatusAggregator::neu();
        let b = bericht(GeraeteStatus::Online, &[("CAM-001", KameraStatus::Online)]);
        agg.bericht_anwenden(&nvr01(), "Eingang Nord", &b, Utc::now());

        let wechsel = agg.bericht_anwenden(&nvr01(), "Eingang Nord", &b, Utc::now());
        assert!(wechsel.is_empty());
    }

    #[test]
    fn fehlende_kamera_behaelt_letzten_status() {
        let agg = StatusAggregator::neu();
        agg.bericht_anwenden(
            &nvr01(),
            "Eingang Nord",
            &bericht(
                GeraeteStatus::Online,
                &[
                    ("CAM-001", KameraStatus::Online),
                    ("CAM-002", KameraStatus::Offline),
                ],
            ),
            Utc::now(),
        );

        // Teilbericht ohne CAM-002
        let wechsel = agg.bericht_anwenden(
            &nvr01(),
            "Eingang Nord",
            &bericht(GeraeteStatus::Online, &[("CAM-001", KameraStatus::Online)]),
            Utc::now(),
        );
        assert!(wechsel.is_empty());

        let zustand = agg.zustand_von(&nvr01()).unwrap();
        assert_eq!(
            zustand.kameras.get(&CameraId::neu("CAM-002")),
            Some(&KameraStatus::Offline)
        );
    }

    #[test]
    fn offline_markieren_feuert_genau_einmal() {
        let agg = StatusAggregator::neu();
        agg.bericht_anwenden(
            &nvr01(),
            "Eingang Nord",
            &bericht(GeraeteStatus::Online, &[]),
            Utc::now(),
        );

        let erste = agg.geraet_offline_markieren(&nvr01(), Utc::now());
        assert_eq!(erste.len(), 1);

        // Wiederholter Sweep: nichts mehr
        let zweite = agg.geraet_offline_markieren(&nvr01(), Utc::now());
        assert!(zweite.is_empty());

        // Unbekannter Hostname: nichts
        assert!(agg
            .geraet_offline_markieren(&Hostname::neu("NVR-99"), Utc::now())
            .is_empty());
    }

    #[test]
    fn zusammenfassung_entspricht_frischem_fold() {
        let agg = StatusAggregator::neu();
        agg.bericht_anwenden(
            &Hostname::neu("NVR-01"),
            "Eingang Nord",
            &bericht(GeraeteStatus::Online, &[("CAM-001", KameraStatus::Online)]),
            Utc::now(),
        );
        agg.bericht_anwenden(
            &Hostname::neu("NVR-02"),
            "Lager",
            &bericht(
                GeraeteStatus::Instabil,
                &[
                    ("CAM-001", KameraStatus::Online),
                    ("CAM-002", KameraStatus::Offline),
                ],
            ),
            Utc::now(),
        );
        agg.geraet_offline_markieren(&Hostname::neu("NVR-01"), Utc::now());

        let z = agg.zusammenfassung();
        assert_eq!(z.geraete_online, 0);
        assert_eq!(z.geraete_offline, 1);
        assert_eq!(z.geraete_instabil, 1);
        assert_eq!(z.kameras_online, 2);
        assert_eq!(z.kameras_offline, 1);
        assert_eq!(z.geraete_gesamt(), 2);
        assert_eq!(z.kameras_gesamt(), 3);
    }

    #[test]
    fn kamera_erholt_sich_wieder() {
        let agg = StatusAggregator::neu();
        let jetzt = Utc::now();
        agg.bericht_anwenden(
            &nvr01(),
            "Eingang Nord",
            &bericht(GeraeteStatus::Online, &[("CAM-001", KameraStatus::Offline)]),
            jetzt,
        );

        let wechsel = agg.bericht_anwenden(
            &nvr01(),
            "Eingang Nord",
            &bericht(GeraeteStatus::Online, &[("CAM-001", KameraStatus::Online)]),
            jetzt,
        );
        assert_eq!(wechsel.len(), 1);
        assert!(matches!(
            &wechsel[0],
            StatusWechsel::Kamera {
                neu: KameraStatus::Online,
                ..
            }
        ));
    }
}
