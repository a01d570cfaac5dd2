//! Minimal WAV container helpers for fallback audio.

/// Sample rate of the voice model's PCM output.
pub const SAMPLE_RATE: u32 = 24_000;

/// Wraps 16-bit little-endian mono PCM in a RIFF/WAVE header.
pub fn wrap_pcm16_mono(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate * 2;

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// `millis` of silence as a 24 kHz mono 16-bit WAV.
pub fn silence(millis: u32) -> Vec<u8> {
    let samples = (SAMPLE_RATE as u64 * millis as u64 / 1_000) as usize;
    wrap_pcm16_mono(&vec![0u8; samples * 2], SAMPLE_RATE)
}
