//! kamerad-client – Client-Bibliothek fuer den Status-Hub
//!
//! Drei Bausteine, die Geraete-Agenten und Dashboards gemeinsam nutzen:
//!
//! - [`engine`]: selbstheilende Verbindung zum Hub mit exponentiellem
//!   Backoff, Offline-Warteschlange und Liveness-Watchdog
//! - [`bus`]: Themen-basierte Event-Fabrik (geordnete Abonnenten,
//!   explizites Objekt statt globalem Zustand)
//! - [`speicher`]: Status-Speicher, der eingehende Frames auf einen lokalen
//!   Flottenzustand anwendet und Aenderungen gebuendelt (100 ms Fenster)
//!   ueber die Fabrik meldet

pub mod bus;
pub mod engine;
pub mod error;
pub mod speicher;

// Bequeme Re-Exporte
pub use bus::EventFabrik;
pub use engine::{ReconnectConfig, ReconnectEngine, TcpVerbinder, Verbinder, VerbindungsZustand};
pub use error::{ClientError, ClientResult};
pub use speicher::StatusSpeicher;
