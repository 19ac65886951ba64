//! Event-Fabrik – Themen-basierter Verteiler fuer Client-Events
//!
//! Bewusst ein explizites Objekt statt globalem Zustand: jede Komponente
//! bekommt ihre Fabrik-Referenz hereingereicht, Tests bauen sich eine eigene.
//! Abonnenten eines Themas werden in Registrierungs-Reihenfolge aufgerufen.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Callback fuer ein abonniertes Thema
pub type EventCallback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Themen-basierter Event-Verteiler
#[derive(Default)]
pub struct EventFabrik {
    abonnenten: Mutex<HashMap<String, Vec<EventCallback>>>,
}

impl EventFabrik {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registriert einen Abonnenten fuer ein Thema
    pub fn abonnieren(
        &self,
        thema: impl Into<String>,
        callback: impl Fn(&serde_json::Value) + Send + Sync + 'static,
    ) {
        self.abonnenten
            .lock()
            .entry(thema.into())
            .or_default()
            .push(Arc::new(callback));
    }

    /// Verteilt ein Event an alle Abonnenten des Themas
    ///
    /// Gibt die Anzahl der benachrichtigten Abonnenten zurueck. Die Callbacks
    /// laufen ausserhalb des internen Locks, damit sie selbst wieder
    /// abonnieren duerfen.
    pub fn veroeffentlichen(&self, thema: &str, daten: &serde_json::Value) -> usize {
        let faellig: Vec<EventCallback> = match self.abonnenten.lock().get(thema) {
            Some(liste) => liste.clone(),
            None => return 0,
        };
        for callback in &faellig {
            callback(daten);
        }
        faellig.len()
    }

    /// Anzahl der Abonnenten eines Themas
    pub fn abonnenten_anzahl(&self, thema: &str) -> usize {
        self.abonnenten
            .lock()
            .get(thema)
            .map(|l| l.len())
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
