//! Kamerad Hub – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Hub.

use anyhow::Result;
use kamerad_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("KAMERAD_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ServerConfig::laden(&config_pfad)?;

    // Logging initialisieren
    kamerad_observability::logging_initialisieren(&config.logging.level, &config.logging.format);

    if !kamerad_observability::log_level_gueltig(&config.logging.level) {
        tracing::warn!(
            level = %config.logging.level,
            "Unbekannter Log-Level in der Konfiguration, Fallback auf 'info'"
        );
    }
    if !kamerad_observability::log_format_gueltig(&config.logging.format) {
        tracing::warn!(
            format = %config.logging.format,
            "Unbekanntes Log-Format in der Konfiguration, Fallback auf 'text'"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Kamerad Hub wird initialisiert"
    );

    // Server starten
    let server = Server::neu(config);
    server.starten().await?;

    Ok(())
}
