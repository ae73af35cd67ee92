use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;

use super::buffer::AudioBuffer;
use super::window::{Frame, FrameWindower, TailPolicy};
use super::{power_db, DB_FLOOR};
use crate::config::AnalysisConfig;
use crate::error::Result;

const LOWEST_BAND_HZ: f64 = 20.0;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpectralBand {
    pub center_hz: f64,
    pub energy_db: f64,
}

/// Per-band energy averaged in power across all frames, in dB. Bands are
/// ordered by ascending center frequency; the layout is fixed by the sample
/// rate, so two files analyzed at the same rate always line up.
#[derive(Debug, Clone, Serialize)]
pub struct SpectralProfile {
    pub bands: Vec<SpectralBand>,
}

impl SpectralProfile {
    pub fn centers(&self) -> impl Iterator<Item = f64> + '_ {
        self.bands.iter().map(|b| b.center_hz)
    }

    pub fn same_layout(&self, other: &SpectralProfile) -> bool {
        self.bands.len() == other.bands.len()
            && self.centers().zip(other.centers()).all(|(a, b)| a == b)
    }
}

/// 1/3-octave band centers from 20 Hz up to Nyquist.
pub fn band_centers(sample_rate: u32) -> Vec<f64> {
    let nyquist = sample_rate as f64 / 2.0;
    let step = 2f64.powf(1.0 / 3.0);
    let mut centers = Vec::new();
    let mut f = LOWEST_BAND_HZ;
    while f < nyquist {
        centers.push(f);
        f *= step;
    }
    centers
}

fn band_limits(center: f64) -> (f64, f64) {
    let k = 2f64.powf(1.0 / 6.0);
    (center / k, center * k)
}

pub fn analyze(buffer: &AudioBuffer, cfg: &AnalysisConfig) -> Result<SpectralProfile> {
    let centers = band_centers(buffer.sample_rate());
    let mono = buffer.mono_mix();
    let n = cfg.frame_len;
    let half = n / 2;

    let windower = FrameWindower::new(&mono, n, cfg.hop, TailPolicy::ZeroPad)?;
    log::debug!(
        "Spectral analysis: {} frames of {} samples (hop {})",
        windower.frame_count(),
        n,
        cfg.hop
    );
    let frames: Vec<Frame> = windower.collect();
    if frames.is_empty() {
        let bands = centers
            .into_iter()
            .map(|center_hz| SpectralBand { center_hz, energy_db: DB_FLOOR })
            .collect();
        return Ok(SpectralProfile { bands });
    }

    let hann = hann_window(n);
    let power_sum: Vec<f64> = frames
        .par_iter()
        .map(|frame| {
            let mut fft_input: Vec<Complex<f32>> = frame
                .samples
                .iter()
                .enumerate()
                .map(|(i, &s)| Complex::new(s * hann[i], 0.0))
                .collect();

            // Per-thread FFT planner (rayon-safe)
            let mut planner = FftPlanner::<f32>::new();
            let fft = planner.plan_fft_forward(n);
            fft.process(&mut fft_input);

            fft_input[..half].iter().map(|c| c.norm_sqr() as f64).collect::<Vec<f64>>()
        })
        .reduce(
            || vec![0.0; half],
            |mut acc, frame_power| {
                for (a, p) in acc.iter_mut().zip(&frame_power) {
                    *a += p;
                }
                acc
            },
        );

    let psd: Vec<f64> = power_sum.iter().map(|s| s / frames.len() as f64).collect();
    let freq_resolution = buffer.sample_rate() as f64 / n as f64;
    // One-sided power normalization; band energy is then independent of the
    // FFT size, so profiles from different frame lengths stay comparable.
    let window_power: f64 = hann.iter().map(|&w| (w as f64) * (w as f64)).sum();
    let scale = 2.0 / (n as f64 * window_power);

    let bands = centers
        .into_iter()
        .map(|center_hz| {
            let (lo, hi) = band_limits(center_hz);
            let lo_bin = (lo / freq_resolution).ceil() as usize;
            let hi_bin = ((hi / freq_resolution).ceil() as usize).min(half);
            let energy_db = if lo_bin >= hi_bin {
                DB_FLOOR
            } else {
                power_db(scale * psd[lo_bin..hi_bin].iter().sum::<f64>())
            };
            SpectralBand { center_hz, energy_db }
        })
        .collect();

    Ok(SpectralProfile { bands })
}

pub(crate) fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine_buffer(freq: f64, amplitude: f32, secs: f64, sr: u32) -> AudioBuffer {
        let n = (secs * sr as f64) as usize;
        let ch: Vec<f32> = (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sr as f64).sin() as f32)
            .collect();
        AudioBuffer::new(vec![ch], sr).unwrap()
    }

    fn loudest_band(profile: &SpectralProfile) -> &SpectralBand {
        profile
            .bands
            .iter()
            .max_by(|a, b| a.energy_db.partial_cmp(&b.energy_db).unwrap())
            .unwrap()
    }

    #[test]
    fn centers_ascend_below_nyquist() {
        let centers = band_centers(48000);
        assert!(centers.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(centers[0], 20.0);
        assert!(*centers.last().unwrap() < 24000.0);
    }

    #[test]
    fn same_rate_gives_same_layout() {
        assert_eq!(band_centers(44100), band_centers(44100));
        assert_ne!(band_centers(44100).len(), band_centers(96000).len());
    }

    #[test]
    fn sine_energy_lands_in_its_band() {
        let buf = sine_buffer(1000.0, 0.5, 2.0, 48000);
        let profile = analyze(&buf, &AnalysisConfig::default()).unwrap();
        let band = loudest_band(&profile);
        let (lo, hi) = band_limits(band.center_hz);
        assert!(lo <= 1000.0 && 1000.0 < hi, "peak band centered {}", band.center_hz);
    }

    #[test]
    fn band_energy_stable_across_frame_lengths() {
        let buf = sine_buffer(1000.0, 0.5, 2.0, 48000);
        let small = analyze(
            &buf,
            &AnalysisConfig { frame_len: 4096, hop: 1024, ..Default::default() },
        )
        .unwrap();
        let large = analyze(
            &buf,
            &AnalysisConfig { frame_len: 8192, hop: 2048, ..Default::default() },
        )
        .unwrap();
        let a = loudest_band(&small);
        let b = loudest_band(&large);
        assert_eq!(a.center_hz, b.center_hz);
        assert!((a.energy_db - b.energy_db).abs() < 1.0);
    }

    #[test]
    fn empty_buffer_reports_floor_bands() {
        let buf = AudioBuffer::new(vec![Vec::new()], 48000).unwrap();
        let profile = analyze(&buf, &AnalysisConfig::default()).unwrap();
        assert_eq!(profile.bands.len(), band_centers(48000).len());
        assert!(profile.bands.iter().all(|b| b.energy_db == DB_FLOOR));
    }
}
