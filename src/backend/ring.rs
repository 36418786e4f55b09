//! Byte ring modelling a shared device buffer

use rtrb::{Consumer, Producer, RingBuffer};

use crate::backend::BufferWindow;
use crate::error::{RenderError, Result};
use crate::format::AudioFormat;
use crate::signal::NativeSample;

/// The writer half of a device buffer.
///
/// Frames are staged in a window of pre-allocated memory and copied into an
/// rtrb ring on commit, so the steady-state loop never allocates. The ring
/// capacity is a whole number of frames and every push and pop moves whole
/// frames, which keeps both halves of a wrapped read frame-aligned.
pub struct DeviceRing {
    producer: Producer<u8>,
    staging: Vec<u8>,
    format: AudioFormat,
    buffer_frames: u32,
    requested: Option<u32>,
}

impl DeviceRing {
    /// Create a ring holding `buffer_frames` frames of `format`.
    ///
    /// Returns the writer and the reader that the playback side drains.
    pub fn new(format: AudioFormat, buffer_frames: u32) -> Result<(Self, RingReader)> {
        if buffer_frames == 0 {
            return Err(RenderError::Negotiation("device buffer holds no frames".into()));
        }

        let capacity = buffer_frames as usize * format.block_align();
        let mut staging = Vec::new();
        staging.try_reserve_exact(capacity)?;
        staging.resize(capacity, 0);

        let (producer, consumer) = RingBuffer::<u8>::new(capacity);

        Ok((
            Self {
                producer,
                staging,
                format,
                buffer_frames,
                requested: None,
            },
            RingReader { consumer, format },
        ))
    }

    #[inline]
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    /// Frames committed but not yet consumed.
    #[inline]
    pub fn pending_frames(&self) -> u32 {
        let free_bytes = self.producer.slots();
        self.buffer_frames - (free_bytes / self.format.block_align()) as u32
    }

    #[inline]
    pub fn available_frames(&self) -> u32 {
        self.buffer_frames - self.pending_frames()
    }

    /// Lend out a window of `frames` frames.
    pub fn request(&mut self, frames: u32) -> Result<BufferWindow<'_>> {
        if self.requested.is_some() {
            return Err(RenderError::Backend("a buffer window is already outstanding".into()));
        }

        let available = self.available_frames();
        if frames > available {
            return Err(RenderError::Backend(format!(
                "requested {frames} frames but only {available} are free"
            )));
        }

        self.requested = Some(frames);
        let len = frames as usize * self.format.block_align();
        Ok(BufferWindow::new(&mut self.staging[..len], &self.format))
    }

    /// Queue the first `frames` frames of the outstanding window for playback.
    pub fn commit(&mut self, frames: u32, silent: bool) -> Result<()> {
        let requested = self
            .requested
            .take()
            .ok_or_else(|| RenderError::Backend("commit without an outstanding window".into()))?;
        if frames > requested {
            return Err(RenderError::Backend(format!(
                "committed {frames} frames but the window held {requested}"
            )));
        }

        let len = frames as usize * self.format.block_align();
        let staged = &mut self.staging[..len];
        if silent {
            staged.fill(0);
        }

        let chunk = self
            .producer
            .write_chunk_uninit(len)
            .map_err(|e| RenderError::Backend(e.to_string()))?;
        chunk.fill_from_iter(staged.iter().copied());
        Ok(())
    }

    /// Bytes of the most recent window, as last committed.
    pub fn staged(&self, frames: u32) -> &[u8] {
        &self.staging[..frames as usize * self.format.block_align()]
    }
}

/// The playback half of a [`DeviceRing`].
pub struct RingReader {
    consumer: Consumer<u8>,
    format: AudioFormat,
}

impl RingReader {
    #[inline]
    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Frames ready to be played.
    #[inline]
    pub fn readable_frames(&self) -> usize {
        self.consumer.slots() / self.format.block_align()
    }

    /// Pop up to `frames` frames, passing each decoded sample to `sink` in
    /// interleaved order. Returns the number of frames popped.
    pub fn pop_frames(&mut self, frames: usize, mut sink: impl FnMut(NativeSample)) -> usize {
        let block_align = self.format.block_align();
        let count = frames.min(self.readable_frames());
        if count == 0 {
            return 0;
        }

        let kind = self.format.kind();
        let width = kind.bytes_per_sample();
        match self.consumer.read_chunk(count * block_align) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                for bytes in first.chunks_exact(width).chain(second.chunks_exact(width)) {
                    sink(NativeSample::read_le(kind, bytes));
                }
                chunk.commit_all();
                count
            }
            Err(_) => 0,
        }
    }

    /// Discard up to `frames` frames as if they had been played.
    pub fn skip_frames(&mut self, frames: usize) -> usize {
        self.pop_frames(frames, |_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleKind;
    use crate::signal::{write_frame, NativeSample};

    fn stereo_pcm() -> AudioFormat {
        AudioFormat::new(48_000, 2, SampleKind::Int16).unwrap()
    }

    #[test]
    fn capacity_tracks_commits_and_reads() {
        let (mut ring, mut reader) = DeviceRing::new(stereo_pcm(), 8).unwrap();
        assert_eq!(ring.available_frames(), 8);

        ring.request(5).unwrap().fill_silence();
        ring.commit(5, true).unwrap();
        assert_eq!(ring.pending_frames(), 5);
        assert_eq!(ring.available_frames(), 3);

        assert_eq!(reader.skip_frames(2), 2);
        assert_eq!(ring.pending_frames(), 3);
        assert_eq!(reader.skip_frames(10), 3);
        assert_eq!(ring.pending_frames(), 0);
    }

    #[test]
    fn oversized_request_is_rejected() {
        let (mut ring, _reader) = DeviceRing::new(stereo_pcm(), 4).unwrap();
        assert!(matches!(ring.request(5), Err(RenderError::Backend(_))));
    }

    #[test]
    fn commit_requires_a_window() {
        let (mut ring, _reader) = DeviceRing::new(stereo_pcm(), 4).unwrap();
        assert!(ring.commit(1, false).is_err());

        ring.request(2).unwrap();
        assert!(ring.request(1).is_err());
        assert!(ring.commit(3, false).is_err());
    }

    #[test]
    fn samples_survive_wraparound() {
        let format = stereo_pcm();
        let (mut ring, mut reader) = DeviceRing::new(format, 4).unwrap();
        let mut next = 0i16;
        let mut expected = Vec::new();
        let mut played = Vec::new();

        for _ in 0..5 {
            {
                let mut window = ring.request(3).unwrap();
                for frame in window.frames_mut() {
                    write_frame(frame, NativeSample::Int16(next), SampleKind::Int16);
                    expected.extend([next, next]);
                    next += 1;
                }
            }
            ring.commit(3, false).unwrap();
            reader.pop_frames(3, |s| {
                if let NativeSample::Int16(v) = s {
                    played.push(v);
                }
            });
        }

        assert_eq!(played, expected);
    }
}
