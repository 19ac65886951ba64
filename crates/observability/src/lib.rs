//! # kamerad-observability
//!
//! Structured Logging via tracing-subscriber, konfigurierbar ueber die
//! Umgebung (`KAMERAD_LOG_LEVEL`, `KAMERAD_LOG_FORMAT`).

pub mod logging;

pub use logging::{log_format_gueltig, log_level_gueltig, logging_initialisieren};
