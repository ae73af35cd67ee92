use crate::error::{AnalysisError, Result};

/// Decoded PCM audio, one sample vector per channel. Immutable once built:
/// all channels have equal length and the sample rate is positive.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }
        if channels.is_empty() {
            return Err(AnalysisError::InvalidConfiguration(
                "audio buffer needs at least one channel".into(),
            ));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(AnalysisError::InvalidConfiguration(
                "all channels must have the same length".into(),
            ));
        }
        Ok(Self { channels, sample_rate })
    }

    // Internal constructor for slices of an already-validated buffer.
    fn with_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self { channels, sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(|c| c.as_slice())
    }

    /// Peak absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
    }

    /// Averaged downmix of all channels.
    pub fn mono_mix(&self) -> Vec<f32> {
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }
        let scale = 1.0 / self.channels.len() as f32;
        (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect()
    }

    /// Drop leading and trailing samples quieter than `top_db` below the
    /// signal peak. An all-quiet buffer is returned unchanged; the loudness
    /// estimator flags it as silent instead.
    pub fn trimmed(&self, top_db: f32) -> AudioBuffer {
        let peak = self.peak();
        if peak <= 0.0 {
            return self.clone();
        }
        let threshold = peak * 10f32.powf(-top_db / 20.0);
        let above = |i: usize| self.channels.iter().any(|c| c[i].abs() >= threshold);

        let start = (0..self.len()).find(|&i| above(i));
        let (start, end) = match start {
            Some(start) => {
                let end = (start..self.len()).rev().find(|&i| above(i)).unwrap_or(start);
                (start, end + 1)
            }
            None => return self.clone(),
        };

        let channels = self
            .channels
            .iter()
            .map(|c| c[start..end].to_vec())
            .collect();
        AudioBuffer::with_channels(channels, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(AudioBuffer::new(vec![vec![0.0; 4]], 0).is_err());
    }

    #[test]
    fn rejects_no_channels() {
        assert!(AudioBuffer::new(Vec::new(), 48000).is_err());
    }

    #[test]
    fn rejects_unequal_channel_lengths() {
        assert!(AudioBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 48000).is_err());
    }

    #[test]
    fn mono_mix_averages_channels() {
        let buf = AudioBuffer::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 48000).unwrap();
        assert_eq!(buf.mono_mix(), vec![0.5, 0.5]);
    }

    #[test]
    fn trims_edge_silence() {
        let mut samples = vec![0.0f32; 100];
        for s in &mut samples[40..60] {
            *s = 0.8;
        }
        let buf = AudioBuffer::new(vec![samples], 48000).unwrap();
        let trimmed = buf.trimmed(40.0);
        assert_eq!(trimmed.len(), 20);
        assert!(trimmed.channel(0).iter().all(|&s| s == 0.8));
    }

    #[test]
    fn trim_keeps_all_silent_buffer() {
        let buf = AudioBuffer::new(vec![vec![0.0; 50]], 48000).unwrap();
        assert_eq!(buf.trimmed(40.0).len(), 50);
    }

    #[test]
    fn duration_follows_sample_rate() {
        let buf = AudioBuffer::new(vec![vec![0.0; 24000]], 48000).unwrap();
        assert!((buf.duration_secs() - 0.5).abs() < 1e-9);
    }
}
