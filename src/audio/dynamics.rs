use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;

use super::buffer::AudioBuffer;
use super::spectral::hann_window;
use super::window::{FrameWindower, TailPolicy};
use super::amplitude_db;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};

const FLUX_FFT_SIZE: usize = 2048;
const FLUX_HOP_SIZE: usize = 1024;

/// Whole-buffer dynamics and stereo image measurements.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DynamicsProfile {
    pub peak_dbfs: f64,
    pub rms_dbfs: f64,
    /// Peak-to-RMS ratio in dB.
    pub crest_db: f64,
    /// Zero-lag L/R correlation in [-1, 1]; 1.0 for mono by convention.
    pub stereo_correlation: f64,
    /// Side share of the mid/side energy, in [0, 1]; 0.0 for mono.
    pub stereo_width: f64,
    /// 95th percentile of half-wave-rectified spectral flux.
    pub transient_index: f64,
}

pub fn analyze(buffer: &AudioBuffer, _cfg: &AnalysisConfig) -> Result<DynamicsProfile> {
    if buffer.channel_count() > 2 {
        return Err(AnalysisError::UnsupportedChannelLayout(buffer.channel_count()));
    }

    let mono = buffer.mono_mix();
    let peak = buffer.peak() as f64;
    let rms = if mono.is_empty() {
        0.0
    } else {
        (mono.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / mono.len() as f64).sqrt()
    };

    let peak_dbfs = amplitude_db(peak);
    let rms_dbfs = amplitude_db(rms);
    let crest_db = if peak <= 0.0 || rms <= 0.0 { 0.0 } else { peak_dbfs - rms_dbfs };

    let (stereo_correlation, stereo_width) = stereo_image(buffer);
    let transient_index = transient_index(&mono, buffer.sample_rate() as f64)?;

    Ok(DynamicsProfile {
        peak_dbfs,
        rms_dbfs,
        crest_db,
        stereo_correlation,
        stereo_width,
        transient_index,
    })
}

/// Zero-lag normalized cross-correlation plus a mid/side width estimate.
fn stereo_image(buffer: &AudioBuffer) -> (f64, f64) {
    if buffer.channel_count() < 2 {
        return (1.0, 0.0);
    }

    let left = buffer.channel(0);
    let right = buffer.channel(1);

    let mut cross = 0f64;
    let mut left_sq = 0f64;
    let mut right_sq = 0f64;
    let mut mid_sq = 0f64;
    let mut side_sq = 0f64;
    for (&l, &r) in left.iter().zip(right.iter()) {
        let (l, r) = (l as f64, r as f64);
        cross += l * r;
        left_sq += l * l;
        right_sq += r * r;
        let mid = 0.5 * (l + r);
        let side = 0.5 * (l - r);
        mid_sq += mid * mid;
        side_sq += side * side;
    }

    let correlation = if left_sq <= 0.0 && right_sq <= 0.0 {
        // Two silent channels are indistinguishable from dual mono.
        1.0
    } else if left_sq <= 0.0 || right_sq <= 0.0 {
        0.0
    } else {
        (cross / (left_sq * right_sq).sqrt()).clamp(-1.0, 1.0)
    };

    let mid_rms = mid_sq.sqrt();
    let side_rms = side_sq.sqrt();
    let width = if mid_rms + side_rms <= 0.0 { 0.0 } else { side_rms / (mid_rms + side_rms) };

    (correlation, width)
}

// Onset strength via spectral flux, sequential because each frame needs the
// previous frame's magnitudes.
fn transient_index(samples: &[f32], sample_rate: f64) -> Result<f64> {
    if samples.len() < FLUX_FFT_SIZE {
        return Ok(0.0);
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FLUX_FFT_SIZE);
    let hann = hann_window(FLUX_FFT_SIZE);

    let mut prev_magnitudes = vec![0.0f32; FLUX_FFT_SIZE / 2];
    let mut flux_values: Vec<(f64, f64)> = Vec::new(); // (time, flux)

    for frame in FrameWindower::new(samples, FLUX_FFT_SIZE, FLUX_HOP_SIZE, TailPolicy::Drop)? {
        let mut fft_input: Vec<Complex<f32>> = frame
            .samples
            .iter()
            .enumerate()
            .map(|(i, &s)| Complex::new(s * hann[i], 0.0))
            .collect();
        fft.process(&mut fft_input);

        let magnitudes: Vec<f32> =
            fft_input[..FLUX_FFT_SIZE / 2].iter().map(|c| c.norm()).collect();

        let flux: f32 = magnitudes
            .iter()
            .zip(prev_magnitudes.iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        let time = frame.offset as f64 / sample_rate;
        flux_values.push((time, flux as f64));
        prev_magnitudes = magnitudes;
    }

    if flux_values.is_empty() {
        return Ok(0.0);
    }
    if let Some(&(time, flux)) =
        flux_values.iter().max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    {
        log::debug!("Peak onset strength {flux:.1} at {time:.2}s");
    }

    let mut flux_only: Vec<f64> = flux_values.iter().map(|&(_, f)| f).collect();
    flux_only.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((flux_only.len() - 1) as f64 * 0.95).round() as usize;
    Ok(flux_only[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, amplitude: f32, secs: f64, sr: u32) -> Vec<f32> {
        let n = (secs * sr as f64) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sr as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn mono_reports_full_correlation() {
        let buf = AudioBuffer::new(vec![sine(440.0, 0.5, 0.5, 48000)], 48000).unwrap();
        let d = analyze(&buf, &AnalysisConfig::default()).unwrap();
        assert_eq!(d.stereo_correlation, 1.0);
        assert_eq!(d.stereo_width, 0.0);
    }

    #[test]
    fn duplicated_channels_correlate_fully() {
        let ch = sine(440.0, 0.5, 0.5, 48000);
        let buf = AudioBuffer::new(vec![ch.clone(), ch], 48000).unwrap();
        let d = analyze(&buf, &AnalysisConfig::default()).unwrap();
        assert!((d.stereo_correlation - 1.0).abs() < 1e-6);
        assert!(d.stereo_width < 1e-6);
    }

    #[test]
    fn inverted_channels_anticorrelate() {
        let ch = sine(440.0, 0.5, 0.5, 48000);
        let inverted: Vec<f32> = ch.iter().map(|&s| -s).collect();
        let buf = AudioBuffer::new(vec![ch, inverted], 48000).unwrap();
        let d = analyze(&buf, &AnalysisConfig::default()).unwrap();
        assert!((d.stereo_correlation + 1.0).abs() < 1e-6);
        assert!(d.stereo_width > 0.99);
    }

    #[test]
    fn sine_crest_is_three_db() {
        let buf = AudioBuffer::new(vec![sine(997.0, 0.5, 1.0, 48000)], 48000).unwrap();
        let d = analyze(&buf, &AnalysisConfig::default()).unwrap();
        assert!((d.crest_db - 3.01).abs() < 0.1, "got {}", d.crest_db);
    }

    #[test]
    fn rejects_more_than_two_channels() {
        let buf = AudioBuffer::new(vec![vec![0.0; 16]; 3], 48000).unwrap();
        match analyze(&buf, &AnalysisConfig::default()) {
            Err(AnalysisError::UnsupportedChannelLayout(3)) => {}
            other => panic!("expected UnsupportedChannelLayout, got {other:?}"),
        }
    }

    #[test]
    fn silent_buffer_has_zero_crest() {
        let buf = AudioBuffer::new(vec![vec![0.0; 48000]], 48000).unwrap();
        let d = analyze(&buf, &AnalysisConfig::default()).unwrap();
        assert_eq!(d.crest_db, 0.0);
        assert_eq!(d.transient_index, 0.0);
    }

    #[test]
    fn transients_raise_flux_index() {
        let sr = 48000;
        let steady = sine(440.0, 0.3, 2.0, sr);
        let mut clicky = steady.clone();
        // Periodic full-scale clicks.
        for i in (0..clicky.len()).step_by(4800) {
            clicky[i] = 1.0;
        }
        let steady_d = analyze(
            &AudioBuffer::new(vec![steady], sr).unwrap(),
            &AnalysisConfig::default(),
        )
        .unwrap();
        let clicky_d = analyze(
            &AudioBuffer::new(vec![clicky], sr).unwrap(),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert!(clicky_d.transient_index > steady_d.transient_index);
    }
}
