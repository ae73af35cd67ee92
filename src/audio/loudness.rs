use serde::Serialize;
use std::f64::consts::PI;

use super::buffer::AudioBuffer;
use super::window::{FrameWindower, TailPolicy};
use super::{amplitude_db, DB_FLOOR};
use crate::config::AnalysisConfig;
use crate::error::Result;

// BS.1770 loudness constants.
const LOUDNESS_OFFSET: f64 = -0.691;
const BLOCK_SECS: f64 = 0.4;
const BLOCK_OVERLAP: usize = 4; // 75% overlap
const RELATIVE_GATE_LU: f64 = -10.0;

// Loudness range: short-term 3s windows at 1s hop, gated 20 LU below the
// integrated loudness, range = p95 - p10.
const SHORT_TERM_SECS: f64 = 3.0;
const SHORT_TERM_HOP_SECS: f64 = 1.0;
const LRA_GATE_LU: f64 = -20.0;

/// Loudness measurements for one file. When `silent` is set the signal had no
/// blocks above the absolute gate; the dB fields are clamped to a finite
/// floor instead of -inf.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LoudnessMetrics {
    pub integrated_lufs: f64,
    pub loudness_range: f64,
    pub true_peak_dbtp: f64,
    pub rms_dbfs: f64,
    pub silent: bool,
}

pub fn measure(buffer: &AudioBuffer, cfg: &AnalysisConfig) -> Result<LoudnessMetrics> {
    let sr = buffer.sample_rate() as f64;
    let rms_dbfs = amplitude_db(rms(&buffer.mono_mix()));
    let true_peak_dbtp = true_peak_dbtp(buffer);

    let block_len = (BLOCK_SECS * sr).round() as usize;
    let block_hop = (block_len / BLOCK_OVERLAP).max(1);
    if block_len == 0 || buffer.len() < block_len {
        // Too short to form a single gating block; no measurable loudness.
        return Ok(silent_metrics(rms_dbfs, true_peak_dbtp));
    }

    let filtered: Vec<Vec<f32>> = buffer.channels().map(|ch| k_weight(ch, sr)).collect();
    // Per-sample squared sum across channels; block power is its mean over
    // the block window, which matches summing per-channel mean squares.
    let squared: Vec<f32> = (0..buffer.len())
        .map(|i| filtered.iter().map(|c| c[i] * c[i]).sum())
        .collect();

    let abs_gate_power = lufs_to_power(cfg.silence_gate_lufs);
    let block_powers: Vec<f64> = FrameWindower::new(&squared, block_len, block_hop, TailPolicy::Drop)?
        .map(|f| mean(&f.samples))
        .filter(|&p| p >= abs_gate_power)
        .collect();

    if block_powers.is_empty() {
        return Ok(silent_metrics(rms_dbfs, true_peak_dbtp));
    }

    let ungated = power_to_lufs(block_powers.iter().sum::<f64>() / block_powers.len() as f64);
    let rel_gate_power = lufs_to_power(ungated + RELATIVE_GATE_LU);
    let gated: Vec<f64> = block_powers.iter().copied().filter(|&p| p >= rel_gate_power).collect();
    let integrated = if gated.is_empty() {
        ungated
    } else {
        power_to_lufs(gated.iter().sum::<f64>() / gated.len() as f64)
    };

    let loudness_range = loudness_range(&squared, sr, abs_gate_power, integrated)?;

    Ok(LoudnessMetrics {
        integrated_lufs: integrated,
        loudness_range,
        true_peak_dbtp,
        rms_dbfs,
        silent: false,
    })
}

fn silent_metrics(rms_dbfs: f64, true_peak_dbtp: f64) -> LoudnessMetrics {
    LoudnessMetrics {
        integrated_lufs: DB_FLOOR,
        loudness_range: 0.0,
        true_peak_dbtp,
        rms_dbfs,
        silent: true,
    }
}

fn loudness_range(
    squared: &[f32],
    sample_rate: f64,
    abs_gate_power: f64,
    integrated: f64,
) -> Result<f64> {
    let window = (SHORT_TERM_SECS * sample_rate).round() as usize;
    let hop = (SHORT_TERM_HOP_SECS * sample_rate).round() as usize;
    if window == 0 || hop == 0 || squared.len() < window {
        return Ok(0.0);
    }

    let short_term: Vec<f64> = FrameWindower::new(squared, window, hop, TailPolicy::Drop)?
        .map(|f| mean(&f.samples))
        .filter(|&p| p >= abs_gate_power)
        .map(power_to_lufs)
        .collect();
    if short_term.len() < 2 {
        return Ok(0.0);
    }

    let gate = integrated + LRA_GATE_LU;
    let mut gated: Vec<f64> = short_term.iter().copied().filter(|&l| l > gate).collect();
    if gated.len() < 3 {
        gated = short_term;
    }
    gated.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let low = percentile(&gated, 0.10);
    let high = percentile(&gated, 0.95);
    Ok((high - low).max(0.0))
}

// Nearest-rank percentile over an already sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn mean(samples: &[f32]) -> f64 {
    samples.iter().map(|&v| v as f64).sum::<f64>() / samples.len() as f64
}

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64).sqrt()
}

fn power_to_lufs(power: f64) -> f64 {
    if power <= 0.0 {
        DB_FLOOR
    } else {
        (LOUDNESS_OFFSET + 10.0 * power.log10()).max(DB_FLOOR)
    }
}

fn lufs_to_power(lufs: f64) -> f64 {
    10f64.powf((lufs - LOUDNESS_OFFSET) / 10.0)
}

// ---------------------------------------------------------------------------
// K-weighting pre-filter: high shelf followed by an RLB high-pass, with
// coefficients derived from the BS.1770 filter parameters for the actual
// sample rate instead of the 48 kHz reference table.

struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    // Direct form II transposed.
    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

fn shelf_filter(sample_rate: f64) -> Biquad {
    let f0 = 1681.974450955533;
    let gain_db = 3.999843853973347;
    let q = 0.7071752369554196;

    let k = (PI * f0 / sample_rate).tan();
    let vh = 10f64.powf(gain_db / 20.0);
    let vb = vh.powf(0.4996667741545416);
    let a0 = 1.0 + k / q + k * k;

    Biquad {
        b0: (vh + vb * k / q + k * k) / a0,
        b1: 2.0 * (k * k - vh) / a0,
        b2: (vh - vb * k / q + k * k) / a0,
        a1: 2.0 * (k * k - 1.0) / a0,
        a2: (1.0 - k / q + k * k) / a0,
        z1: 0.0,
        z2: 0.0,
    }
}

fn highpass_filter(sample_rate: f64) -> Biquad {
    let f0 = 38.13547087602444;
    let q = 0.5003270373238773;

    let k = (PI * f0 / sample_rate).tan();
    let a0 = 1.0 + k / q + k * k;

    Biquad {
        b0: 1.0,
        b1: -2.0,
        b2: 1.0,
        a1: 2.0 * (k * k - 1.0) / a0,
        a2: (1.0 - k / q + k * k) / a0,
        z1: 0.0,
        z2: 0.0,
    }
}

fn k_weight(channel: &[f32], sample_rate: f64) -> Vec<f32> {
    let mut shelf = shelf_filter(sample_rate);
    let mut highpass = highpass_filter(sample_rate);
    channel
        .iter()
        .map(|&s| highpass.process(shelf.process(s as f64)) as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// True peak: 4x oversampled peak via a polyphase windowed-sinc interpolator,
// each phase normalized to unit DC gain.

const OVERSAMPLE: usize = 4;
const TAPS_PER_PHASE: usize = 12;

fn polyphase_filters() -> [[f64; TAPS_PER_PHASE]; OVERSAMPLE] {
    let total = OVERSAMPLE * TAPS_PER_PHASE;
    let center = (total - 1) as f64 / 2.0;
    let taps: Vec<f64> = (0..total)
        .map(|i| {
            let t = (i as f64 - center) / OVERSAMPLE as f64;
            let sinc = if t.abs() < 1e-12 { 1.0 } else { (PI * t).sin() / (PI * t) };
            let window = 0.5 * (1.0 - (2.0 * PI * i as f64 / (total - 1) as f64).cos());
            sinc * window
        })
        .collect();

    let mut phases = [[0.0; TAPS_PER_PHASE]; OVERSAMPLE];
    for (p, phase) in phases.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (k, tap) in phase.iter_mut().enumerate() {
            *tap = taps[p + OVERSAMPLE * k];
            sum += *tap;
        }
        for tap in phase.iter_mut() {
            *tap /= sum;
        }
    }
    phases
}

pub fn true_peak_dbtp(buffer: &AudioBuffer) -> f64 {
    let phases = polyphase_filters();
    let mut peak = 0f64;
    for channel in buffer.channels() {
        for (i, &s) in channel.iter().enumerate() {
            peak = peak.max((s as f64).abs());
            for phase in phases.iter().skip(1) {
                let mut acc = 0.0;
                for (k, &tap) in phase.iter().enumerate() {
                    if let Some(j) = i.checked_sub(k) {
                        acc += tap * channel[j] as f64;
                    }
                }
                peak = peak.max(acc.abs());
            }
        }
    }
    amplitude_db(peak)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_buffer(freq: f64, amplitude: f32, secs: f64, sr: u32, channels: usize) -> AudioBuffer {
        let n = (secs * sr as f64) as usize;
        let ch: Vec<f32> = (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sr as f64).sin() as f32)
            .collect();
        AudioBuffer::new(vec![ch; channels], sr).unwrap()
    }

    #[test]
    fn silence_yields_sentinel_not_infinity() {
        let buf = AudioBuffer::new(vec![vec![0.0; 48000]], 48000).unwrap();
        let m = measure(&buf, &AnalysisConfig::default()).unwrap();
        assert!(m.silent);
        assert!(m.integrated_lufs.is_finite());
        assert!(m.rms_dbfs.is_finite());
        assert!(m.true_peak_dbtp.is_finite());
        assert_eq!(m.loudness_range, 0.0);
    }

    #[test]
    fn short_input_is_flagged_silent() {
        // Shorter than one 400ms gating block.
        let buf = sine_buffer(997.0, 0.5, 0.1, 48000, 1);
        let m = measure(&buf, &AnalysisConfig::default()).unwrap();
        assert!(m.silent);
        // Peak and RMS are still real measurements.
        assert!(m.true_peak_dbtp > -7.0);
    }

    #[test]
    fn mono_sine_loudness_near_reference() {
        // A 997 Hz sine at 0 dBFS in one channel reads -3.01 LKFS, so at
        // -20 dBFS the reference value is -23.01.
        let buf = sine_buffer(997.0, 0.1, 3.0, 48000, 1);
        let m = measure(&buf, &AnalysisConfig::default()).unwrap();
        assert!(!m.silent);
        assert!((m.integrated_lufs + 23.01).abs() < 0.5, "got {}", m.integrated_lufs);
    }

    #[test]
    fn stereo_doubles_power() {
        let mono = measure(&sine_buffer(997.0, 0.1, 3.0, 48000, 1), &AnalysisConfig::default())
            .unwrap();
        let stereo = measure(&sine_buffer(997.0, 0.1, 3.0, 48000, 2), &AnalysisConfig::default())
            .unwrap();
        assert!((stereo.integrated_lufs - mono.integrated_lufs - 3.01).abs() < 0.1);
    }

    #[test]
    fn true_peak_of_half_scale_sine() {
        let buf = sine_buffer(997.0, 0.5, 1.0, 48000, 1);
        let m = measure(&buf, &AnalysisConfig::default()).unwrap();
        assert!(m.true_peak_dbtp > -6.3 && m.true_peak_dbtp < -5.7, "got {}", m.true_peak_dbtp);
    }

    #[test]
    fn steady_sine_has_negligible_range() {
        let buf = sine_buffer(997.0, 0.2, 6.0, 48000, 1);
        let m = measure(&buf, &AnalysisConfig::default()).unwrap();
        assert!(m.loudness_range < 0.5, "got {}", m.loudness_range);
    }

    #[test]
    fn loudness_tracks_gain() {
        let quiet = measure(&sine_buffer(997.0, 0.05, 3.0, 48000, 1), &AnalysisConfig::default())
            .unwrap();
        let loud = measure(&sine_buffer(997.0, 0.1, 3.0, 48000, 1), &AnalysisConfig::default())
            .unwrap();
        assert!((loud.integrated_lufs - quiet.integrated_lufs - 6.02).abs() < 0.1);
    }
}
