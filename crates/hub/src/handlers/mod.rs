//! Handler fuer alle Protokoll-Nachrichten
//!
//! Jeder Handler ist fuer einen bestimmten Nachrichtentyp zustaendig
//! und hat Zugriff auf den gemeinsamen HubState.

pub mod auth_handler;
pub mod dashboard_handler;
pub mod status_handler;
