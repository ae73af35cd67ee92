use std::borrow::Cow;

use crate::error::{AnalysisError, Result};

/// What to do with a trailing partial frame. Zero-padding keeps the tail
/// (spectral default); dropping skips it (loudness blocks are only measured
/// when complete).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPolicy {
    ZeroPad,
    Drop,
}

/// A fixed-length window of samples starting at `offset`. Full frames borrow
/// from the source buffer; a zero-padded tail owns its copy.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub offset: usize,
    pub samples: Cow<'a, [f32]>,
}

/// Lazy, finite iterator of analysis frames over a sample slice. Clone it to
/// restart from the beginning.
#[derive(Debug, Clone)]
pub struct FrameWindower<'a> {
    samples: &'a [f32],
    frame_len: usize,
    hop: usize,
    tail: TailPolicy,
    offset: usize,
}

impl<'a> FrameWindower<'a> {
    pub fn new(
        samples: &'a [f32],
        frame_len: usize,
        hop: usize,
        tail: TailPolicy,
    ) -> Result<Self> {
        if frame_len == 0 || hop == 0 {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "frame length {frame_len} and hop {hop} must be positive"
            )));
        }
        if tail == TailPolicy::Drop && frame_len > samples.len() {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "frame length {} exceeds buffer length {} and padding is disabled",
                frame_len,
                samples.len()
            )));
        }
        Ok(Self { samples, frame_len, hop, tail, offset: 0 })
    }

    /// Number of frames the iterator will yield.
    pub fn frame_count(&self) -> usize {
        let len = self.samples.len();
        match self.tail {
            TailPolicy::ZeroPad => len.div_ceil(self.hop),
            TailPolicy::Drop => {
                if len < self.frame_len {
                    0
                } else {
                    (len - self.frame_len) / self.hop + 1
                }
            }
        }
    }
}

impl<'a> Iterator for FrameWindower<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Frame<'a>> {
        if self.offset >= self.samples.len() {
            return None;
        }
        let end = self.offset + self.frame_len;
        let frame = if end <= self.samples.len() {
            Frame {
                offset: self.offset,
                samples: Cow::Borrowed(&self.samples[self.offset..end]),
            }
        } else {
            match self.tail {
                TailPolicy::Drop => return None,
                TailPolicy::ZeroPad => {
                    let mut padded = self.samples[self.offset..].to_vec();
                    padded.resize(self.frame_len, 0.0);
                    Frame { offset: self.offset, samples: Cow::Owned(padded) }
                }
            }
        };
        self.offset += self.hop;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn full_frames_cover_buffer() {
        let samples = ramp(10);
        let frames: Vec<_> =
            FrameWindower::new(&samples, 4, 2, TailPolicy::Drop).unwrap().collect();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].offset, 0);
        assert_eq!(frames[3].offset, 6);
        assert_eq!(&*frames[3].samples, &[6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn zero_pad_keeps_tail() {
        let samples = ramp(10);
        let frames: Vec<_> =
            FrameWindower::new(&samples, 4, 4, TailPolicy::ZeroPad).unwrap().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(&*frames[2].samples, &[8.0, 9.0, 0.0, 0.0]);
    }

    #[test]
    fn drop_skips_partial_tail() {
        let samples = ramp(10);
        let frames: Vec<_> =
            FrameWindower::new(&samples, 4, 4, TailPolicy::Drop).unwrap().collect();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn frame_count_matches_iteration() {
        let samples = ramp(1000);
        for (len, hop) in [(64, 16), (100, 100), (128, 32)] {
            for tail in [TailPolicy::ZeroPad, TailPolicy::Drop] {
                let w = FrameWindower::new(&samples, len, hop, tail).unwrap();
                assert_eq!(w.frame_count(), w.clone().count(), "len={len} hop={hop}");
            }
        }
    }

    #[test]
    fn clone_restarts_iteration() {
        let samples = ramp(8);
        let mut w = FrameWindower::new(&samples, 4, 2, TailPolicy::Drop).unwrap();
        w.next();
        w.next();
        let restarted = FrameWindower::new(&samples, 4, 2, TailPolicy::Drop).unwrap();
        assert_eq!(restarted.count(), 3);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let samples = ramp(8);
        assert!(FrameWindower::new(&samples, 0, 2, TailPolicy::Drop).is_err());
        assert!(FrameWindower::new(&samples, 4, 0, TailPolicy::Drop).is_err());
        assert!(FrameWindower::new(&samples, 16, 2, TailPolicy::Drop).is_err());
        assert!(FrameWindower::new(&samples, 16, 2, TailPolicy::ZeroPad).is_ok());
    }

    #[test]
    fn empty_input_yields_no_frames() {
        let frames: Vec<_> =
            FrameWindower::new(&[], 4, 2, TailPolicy::ZeroPad).unwrap().collect();
        assert!(frames.is_empty());
    }
}
