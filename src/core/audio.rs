//! Audio framing for the voice protocol.
//!
//! Clients stream raw PCM (16-bit signed little-endian, 16 kHz, mono) as
//! binary WebSocket frames. The session accumulates them in an
//! [`AudioBuffer`] until the client signals the end of a turn, at which point
//! the buffered samples are wrapped in a 44-byte WAV header and handed to the
//! pipeline. Synthesized audio travels back in fixed-size chunks.

use bytes::Bytes;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Sample rate of inbound client audio in Hz.
pub const SAMPLE_RATE: u32 = 16_000;

/// Number of channels of inbound client audio.
pub const CHANNELS: u16 = 1;

/// Bit depth of inbound client audio.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Length of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Minimum buffered PCM bytes for a turn to be processed (100 ms at 16 kHz).
pub const MIN_TURN_BYTES: usize = 3200;

/// Maximum size of a single outbound audio frame.
pub const AUDIO_CHUNK_SIZE: usize = 8192;

/// Upper bound on buffered PCM between turn boundaries (10MB).
pub const MAX_BUFFERED_AUDIO_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
    /// The buffer would exceed [`MAX_BUFFERED_AUDIO_BYTES`].
    #[error("Audio buffer exceeded {max} bytes")]
    BufferOverflow { max: usize },
}

// =============================================================================
// WAV framing
// =============================================================================

/// Create a WAV file header for PCM audio.
///
/// # Arguments
/// * `data_size` - Size of the audio data in bytes
/// * `sample_rate` - Sample rate in Hz (e.g., 16000)
/// * `channels` - Number of channels (1 for mono, 2 for stereo)
/// * `bits_per_sample` - Bits per sample (typically 16)
pub fn create_header(
    data_size: u32,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> [u8; WAV_HEADER_LEN] {
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bits_per_sample) / 8;
    let block_align = channels * bits_per_sample / 8;

    let mut header = [0u8; WAV_HEADER_LEN];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Wrap client PCM in a WAV container using the protocol's fixed format.
pub fn wrap_pcm(pcm: &[u8]) -> Bytes {
    let header = create_header(pcm.len() as u32, SAMPLE_RATE, CHANNELS, BITS_PER_SAMPLE);
    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    wav.extend_from_slice(&header);
    wav.extend_from_slice(pcm);
    Bytes::from(wav)
}

/// Playback duration of a PCM buffer in milliseconds.
pub fn pcm_duration_ms(len: usize) -> u64 {
    let bytes_per_second =
        u64::from(SAMPLE_RATE) * u64::from(CHANNELS) * u64::from(BITS_PER_SAMPLE) / 8;
    len as u64 * 1000 / bytes_per_second
}

/// Split synthesized audio into frames of at most `chunk_size` bytes.
///
/// Frames are zero-copy slices of `audio`. Every frame except possibly the
/// last is exactly `chunk_size` bytes; empty audio yields no frames.
pub fn chunk_audio(audio: &Bytes, chunk_size: usize) -> impl Iterator<Item = Bytes> + '_ {
    let chunk_size = chunk_size.max(1);
    (0..audio.len())
        .step_by(chunk_size)
        .map(move |start| audio.slice(start..(start + chunk_size).min(audio.len())))
}

// =============================================================================
// Turn buffer
// =============================================================================

/// Accumulates inbound PCM between turn boundaries.
#[derive(Debug, Default)]
pub struct AudioBuffer {
    data: Vec<u8>,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binary frame.
    ///
    /// On overflow the buffer is cleared and the frame dropped, so the caller
    /// only has to report the error.
    pub fn push(&mut self, frame: &[u8]) -> Result<(), AudioError> {
        if self.data.len() + frame.len() > MAX_BUFFERED_AUDIO_BYTES {
            self.data = Vec::new();
            return Err(AudioError::BufferOverflow {
                max: MAX_BUFFERED_AUDIO_BYTES,
            });
        }
        self.data.extend_from_slice(frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Close the current turn.
    ///
    /// Always empties the buffer. Returns the WAV-framed turn when at least
    /// [`MIN_TURN_BYTES`] of PCM were buffered, `None` otherwise.
    pub fn take_turn(&mut self) -> Option<Bytes> {
        let pcm = std::mem::take(&mut self.data);
        if pcm.len() < MIN_TURN_BYTES {
            return None;
        }
        Some(wrap_pcm(&pcm))
    }
}
