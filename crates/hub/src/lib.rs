//! kamerad-hub – Status-Fan-Out fuer die NVR-Flotte
//!
//! Dieser Crate implementiert den serverseitigen Status-Hub: Geraete-Agenten
//! melden ihren Gesundheitszustand ueber eine persistente Socket-Verbindung,
//! Dashboards abonnieren Status-Broadcasts. Der Hub erkennt stille
//! Verbindungsabbrueche ueber eine Heartbeat-Deadline.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (HubServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Rollen: Unauthentifiziert -> Geraet | Dashboard
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- auth_handler       (Geraete-Anmeldung, Verzeichnis-Aufloesung)
//!     +-- dashboard_handler  (Dashboard-Anmeldung, Initial-Stats)
//!     +-- status_handler     (Heartbeat-Berichte, Event-Verteilung)
//!
//! VerbindungsRegister – Wer ist verbunden, Send-Queues, Hostname-Index
//! StatusAggregator    – Kanonischer Flottenzustand, Diff-basierte Events
//! HeartbeatWaechter   – Periodischer Sweep, raeumt stumme Geraete ab
//! ```

pub mod aggregator;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod heartbeat;
pub mod registry;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use aggregator::StatusAggregator;
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{HubError, HubResult};
pub use heartbeat::HeartbeatWaechter;
pub use registry::VerbindungsRegister;
pub use server_state::{HubConfig, HubState};
pub use tcp::HubServer;
