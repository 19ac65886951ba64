//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 256 KB).
//!
//! ## Fehler-Ebenen
//!
//! Framing-Verletzungen (zu grosser Frame) sind `io::Error` und beenden die
//! Verbindung. Ungueltiges JSON innerhalb eines korrekt gerahmten Frames wird
//! dagegen als `DekodiertesFrame::Ungueltig` in-band geliefert – der Stream
//! bleibt synchronisiert und die Verbindung kann weiterlaufen.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::control::ControlMessage;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (256 KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Decoder-Ergebnis
// ---------------------------------------------------------------------------

/// Ergebnis der Dekodierung eines vollstaendigen Frames
///
/// `Ungueltig` traegt die Parse-Fehlermeldung; der Frame wurde vollstaendig
/// verbraucht und der naechste beginnt an der korrekten Position.
#[derive(Debug, Clone)]
pub enum DekodiertesFrame {
    /// Gueltiges JSON, erfolgreich deserialisiert
    Nachricht(ControlMessage),
    /// Korrekt gerahmt, aber kein gueltiges Protokoll-JSON
    Ungueltig(String),
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// Implementiert `Encoder<ControlMessage>` und `Decoder` fuer nahtlose
/// Integration mit `tokio_util::codec::Framed`.
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::Framed;
/// use kamerad_protocol::wire::FrameCodec;
///
/// // let stream = TcpStream::connect(...).await?;
/// // let framed = Framed::new(stream, FrameCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = DekodiertesFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        // Maximale Frame-Groesse pruefen – hier ist der Stream nicht mehr
        // vertrauenswuerdig, die Verbindung muss beendet werden
        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                    length, self.max_frame_size
                ),
            ));
        }

        // Pruefen ob der vollstaendige Frame bereits im Buffer ist
        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            // Speicher vorbelegen um Reallocations zu vermeiden
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        // Laengen-Feld verbrauchen
        src.advance(LENGTH_FIELD_SIZE);

        // Payload-Bytes extrahieren
        let payload = src.split_to(length);

        // JSON deserialisieren; Parse-Fehler bleiben in-band damit ein
        // fehlerhafter Frame nicht die ganze Sitzung beendet
        match serde_json::from_slice::<ControlMessage>(&payload) {
            Ok(message) => Ok(Some(DekodiertesFrame::Nachricht(message))),
            Err(e) => Ok(Some(DekodiertesFrame::Ungueltig(e.to_string()))),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<ControlMessage> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // JSON serialisieren
        let json = serde_json::to_vec(&item).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON-Serialisierung fehlgeschlagen: {}", e),
            )
        })?;

        // Groesse pruefen
        if json.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                    json.len(),
                    self.max_frame_size
                ),
            ));
        }

        // Laengen-Feld + Payload schreiben
        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlMessage, HeartbeatMessage, SystemStatus};
    use kamerad_core::types::GeraeteStatus;

    fn test_heartbeat(timestamp: u64) -> ControlMessage {
        ControlMessage::Heartbeat(HeartbeatMessage {
            timestamp,
            system_status: SystemStatus {
                status: GeraeteStatus::Online,
                cameras: Vec::new(),
            },
        })
    }

    fn erwarte_nachricht(frame: DekodiertesFrame) -> ControlMessage {
        match frame {
            DekodiertesFrame::Nachricht(m) => m,
            DekodiertesFrame::Ungueltig(e) => panic!("Unerwartet ungueltig: {}", e),
        }
    }

    #[test]
    fn frame_codec_encode_decode_round_trip() {
        let mut codec = FrameCodec::new();
        let original = test_heartbeat(42);

        // Kodieren
        let mut buf = BytesMut::new();
        codec.encode(original, &mut buf).unwrap();

        // Laengen-Feld pruefen
        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert!(payload_len > 0);
        assert_eq!(buf.len(), LENGTH_FIELD_SIZE + payload_len);

        // Dekodieren
        let decoded = erwarte_nachricht(
            codec
                .decode(&mut buf)
                .unwrap()
                .expect("Muss eine Nachricht enthalten"),
        );
        if let ControlMessage::Heartbeat(h) = decoded {
            assert_eq!(h.timestamp, 42);
        } else {
            panic!("Erwartet Heartbeat");
        }
    }

    #[test]
    fn frame_codec_unvollstaendiger_frame() {
        let mut codec = FrameCodec::new();
        let original = test_heartbeat(1);

        let mut buf = BytesMut::new();
        codec.encode(original, &mut buf).unwrap();

        // Nur die Haelfte der Bytes behalten
        let half = buf.len() / 2;
        let mut partial = buf.split_to(half);

        // Sollte None zurueckgeben (wartet auf mehr Daten)
        let result = codec.decode(&mut partial).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn frame_codec_zu_wenig_bytes_fuer_laengenfeld() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        let result = codec.decode(&mut buf).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn frame_codec_ablehnung_zu_grosser_frame() {
        let mut codec = FrameCodec::with_max_size(100);

        // Frame-Laenge von 200 Bytes im Buffer simulieren
        let mut buf = BytesMut::new();
        buf.put_u32(200);
        buf.put_slice(&[b'x'; 200]);

        let result = codec.decode(&mut buf);
        assert!(result.is_err());
    }

    #[test]
    fn frame_codec_ungueltiges_json_bleibt_in_band() {
        let mut codec = FrameCodec::new();

        // Korrekt gerahmter Frame mit kaputtem JSON, danach ein gueltiger
        let kaputt = b"{nicht json";
        let mut buf = BytesMut::new();
        buf.put_u32(kaputt.len() as u32);
        buf.put_slice(kaputt);
        codec.encode(test_heartbeat(7), &mut buf).unwrap();

        // Erster Frame: in-band Fehler, KEIN io::Error
        match codec.decode(&mut buf).unwrap() {
            Some(DekodiertesFrame::Ungueltig(_)) => {}
            other => panic!("Erwartet Ungueltig, bekam {:?}", other),
        }

        // Stream bleibt synchronisiert: der naechste Frame dekodiert sauber
        let decoded = erwarte_nachricht(codec.decode(&mut buf).unwrap().unwrap());
        assert!(matches!(decoded, ControlMessage::Heartbeat(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_codec_ablehnung_beim_encode_zu_grosse_nachricht() {
        // Kleines Limit setzen
        let mut codec = FrameCodec::with_max_size(10);
        let original = test_heartbeat(1); // JSON ist sicher > 10 Bytes

        let mut buf = BytesMut::new();
        let result = codec.encode(original, &mut buf);
        assert!(result.is_err());
    }

    #[test]
    fn frame_codec_mehrere_nachrichten_im_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        // Drei Nachrichten kodieren
        for i in 0..3u64 {
            codec.encode(test_heartbeat(i), &mut buf).unwrap();
        }

        // Alle drei dekodieren
        for i in 0..3u64 {
            let msg = erwarte_nachricht(codec.decode(&mut buf).unwrap().expect("Frame erwartet"));
            if let ControlMessage::Heartbeat(h) = msg {
                assert_eq!(h.timestamp, i);
            } else {
                panic!("Erwartet Heartbeat");
            }
        }

        // Buffer muss leer sein
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_codec_default_max_size() {
        let codec = FrameCodec::new();
        assert_eq!(codec.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }
}
