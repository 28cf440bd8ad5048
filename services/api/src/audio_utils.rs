use base64::Engine;

/// Decodes a base64 audio payload into raw bytes.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(payload)
}

/// Encodes raw audio bytes as base64.
pub fn encode_payload(audio: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(audio)
}

/// Decodes and re-encodes a base64 audio payload.
///
/// Both sides speak mu-law, so the bytes pass through untouched; the round
/// trip rejects corrupt payloads before they reach the caller.
pub fn reencode_payload(payload: &str) -> Result<String, base64::DecodeError> {
    decode_payload(payload).map(|audio| encode_payload(&audio))
}
