//! Small PCM WAV assets written on the fly for tests.

use std::path::PathBuf;

/// Write a 16-bit PCM WAV with `frames` frames of a quiet ramp into the temp dir.
///
/// `name` must be unique per test; tests run in parallel.
pub(crate) fn write_pcm16(name: &str, rate: u32, channels: u16, frames: u32) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "bookmark-player-{}-{name}.wav",
        std::process::id()
    ));

    let block_align = channels * 2;
    let data_len = frames * u32::from(block_align);
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&rate.to_le_bytes());
    bytes.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for frame in 0..frames {
        let sample = ((frame % 64) as i16 - 32) * 16;
        for _ in 0..channels {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    std::fs::write(&path, bytes).unwrap();
    path
}
