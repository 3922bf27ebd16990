//! Per-family notification decoders

use crate::MeasureKind;
use sensorhub_proto::ProtoError;

/// Tokens shorter than a letter plus two characters are line noise
const MIN_TOKEN_LEN: usize = 3;

/// Family A sends two bytes that read as `"{b0}.{b1}"`, so `[20, 5]` is
/// 20.5 and `[20, 50]` is 20.50.
pub fn decode_family_a(data: &[u8]) -> Result<f32, ProtoError> {
    match data {
        [whole, frac] => format!("{whole}.{frac}")
            .parse()
            .map_err(|_| ProtoError::InvalidReading(format!("{data:?}"))),
        _ => Err(ProtoError::InvalidReading(format!(
            "family A reading is exactly 2 bytes, got {}",
            data.len()
        ))),
    }
}

/// Family B sends a little-endian IEEE-754 float
pub fn decode_family_b(data: &[u8]) -> Result<f32, ProtoError> {
    let bytes: [u8; 4] = data.try_into().map_err(|_| {
        ProtoError::InvalidReading(format!("family B reading needs 4 bytes, got {}", data.len()))
    })?;
    Ok(f32::from_le_bytes(bytes))
}

/// Reassembles NUL-terminated `<letter><float>` tokens from a serial
/// bridge. Notifications split tokens anywhere.
#[derive(Debug, Default)]
pub struct SerialBridgeDecoder {
    pending: Vec<u8>,
}

impl SerialBridgeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one notification, returns every reading it completed
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<(MeasureKind, f32)>, ProtoError> {
        let mut readings = Vec::new();
        for &byte in data {
            if byte != 0 {
                self.pending.push(byte);
                continue;
            }
            let token = std::mem::take(&mut self.pending);
            if token.len() < MIN_TOKEN_LEN {
                continue;
            }
            readings.push(parse_token(&token)?);
        }
        Ok(readings)
    }

    /// Bytes buffered towards the next token
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

fn parse_token(token: &[u8]) -> Result<(MeasureKind, f32), ProtoError> {
    let invalid = || ProtoError::InvalidReading(String::from_utf8_lossy(token).into_owned());
    let (&letter, rest) = token.split_first().ok_or_else(invalid)?;
    let kind = MeasureKind::from_bridge_letter(letter).ok_or_else(invalid)?;
    let value = std::str::from_utf8(rest)
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .ok_or_else(invalid)?;
    Ok((kind, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_a_is_text_not_fixed_point() {
        assert_eq!(decode_family_a(&[20, 50]).unwrap(), "20.50".parse::<f32>().unwrap());
        assert_eq!(decode_family_a(&[20, 5]).unwrap(), 20.5);
        assert_eq!(decode_family_a(&[0, 7]).unwrap(), 0.7);
        assert!(decode_family_a(&[1]).is_err());
    }

    #[test]
    fn family_a_rejects_trailing_bytes() {
        assert!(matches!(
            decode_family_a(&[20, 50, 1]),
            Err(ProtoError::InvalidReading(_))
        ));
        assert!(decode_family_a(&[]).is_err());
    }

    #[test]
    fn family_b_is_ieee754() {
        assert_eq!(decode_family_b(&21.25f32.to_le_bytes()).unwrap(), 21.25);
        assert!(decode_family_b(&[0, 0]).is_err());
    }

    #[test]
    fn bridge_token_emitted_at_nul() {
        let mut decoder = SerialBridgeDecoder::new();
        assert_eq!(decoder.feed(b"T23.5").unwrap(), vec![]);
        assert_eq!(decoder.pending(), 5);
        assert_eq!(
            decoder.feed(b"\0").unwrap(),
            vec![(MeasureKind::Dht22Temperature, 23.5)]
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn bridge_tokens_split_across_notifications() {
        let mut decoder = SerialBridgeDecoder::new();
        assert_eq!(decoder.feed(b"H4").unwrap(), vec![]);
        assert_eq!(
            decoder.feed(b"1.0\0p2").unwrap(),
            vec![(MeasureKind::Dht22Humidity, 41.0)]
        );
        assert_eq!(
            decoder.feed(b"7.1\0t19\0").unwrap(),
            vec![
                (MeasureKind::BridgeTemperature, 27.1),
                (MeasureKind::Dht11Temperature, 19.0)
            ]
        );
    }

    #[test]
    fn short_tokens_are_skipped() {
        let mut decoder = SerialBridgeDecoder::new();
        assert_eq!(decoder.feed(b"\0T\0h1\0").unwrap(), vec![]);
    }

    #[test]
    fn unknown_letter_is_an_error() {
        let mut decoder = SerialBridgeDecoder::new();
        assert!(matches!(
            decoder.feed(b"X12.0\0"),
            Err(ProtoError::InvalidReading(_))
        ));
    }
}
