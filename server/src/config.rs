//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Hub ohne Konfigurationsdatei
//! lauffaehig ist. Das Geraeteverzeichnis wird ueber `[[geraete]]`-Tabellen
//! befuellt.

use serde::{Deserialize, Serialize};

use kamerad_core::types::Hostname;
use kamerad_core::verzeichnis::{GeraetEintrag, StatischesVerzeichnis};
use kamerad_hub::HubConfig;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Heartbeat-Einstellungen
    pub heartbeat: HeartbeatEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Bekannte Geraete der Flotte
    pub geraete: Vec<GeraeteKonfig>,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Hubs
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen (Geraete + Dashboards)
    pub max_clients: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Kamerad Hub".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer die TCP-Verbindung
    pub bind_adresse: String,
    /// Port fuer die TCP-Verbindung
    pub tcp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 9800,
        }
    }
}

/// Heartbeat-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatEinstellungen {
    /// Erwartetes Heartbeat-Intervall der Geraete in Sekunden
    pub intervall_sek: u64,
    /// Deadline fuer stumme Geraete in Sekunden (Standard: 2x Intervall)
    pub timeout_sek: u64,
    /// Sweep-Intervall des Heartbeat-Waechters in Sekunden
    pub sweep_intervall_sek: u64,
}

impl Default for HeartbeatEinstellungen {
    fn default() -> Self {
        Self {
            intervall_sek: 30,
            timeout_sek: 60,
            sweep_intervall_sek: 5,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Ein bekanntes Geraet der Flotte (`[[geraete]]`-Tabelle)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeraeteKonfig {
    /// Hostname des NVR-Geraets (eindeutiger Schluessel)
    pub hostname: String,
    /// Menschlicher Anzeigename (z.B. Standort)
    pub anzeige_name: String,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Uebersetzt die Einstellungen in die Hub-Konfiguration
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            heartbeat_intervall_sek: self.heartbeat.intervall_sek,
            heartbeat_timeout_sek: self.heartbeat.timeout_sek,
            sweep_intervall_sek: self.heartbeat.sweep_intervall_sek,
            max_clients: self.server.max_clients,
        }
    }

    /// Baut das Geraeteverzeichnis aus den `[[geraete]]`-Tabellen
    pub fn verzeichnis(&self) -> StatischesVerzeichnis {
        StatischesVerzeichnis::aus_eintraegen(self.geraete.iter().map(|g| GeraetEintrag {
            hostname: Hostname::neu(&g.hostname),
            anzeige_name: g.anzeige_name.clone(),
        }))
    }
}
