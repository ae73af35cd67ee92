use serde::Serialize;

use super::buffer::AudioBuffer;
use super::dynamics::{self, DynamicsProfile};
use super::loudness::{self, LoudnessMetrics};
use super::spectral::{self, SpectralProfile};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};

/// Everything measured for one file. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub loudness: LoudnessMetrics,
    pub spectral: SpectralProfile,
    pub dynamics: DynamicsProfile,
}

pub fn analyze_file(buffer: &AudioBuffer, cfg: &AnalysisConfig) -> Result<AnalysisResult> {
    if buffer.channel_count() > 2 {
        return Err(AnalysisError::UnsupportedChannelLayout(buffer.channel_count()));
    }

    log::info!(
        "Analyzing {:.1}s of audio at {} Hz ({} channels)",
        buffer.duration_secs(),
        buffer.sample_rate(),
        buffer.channel_count()
    );

    let loudness = loudness::measure(buffer, cfg)?;
    let spectral = spectral::analyze(buffer, cfg)?;
    let dynamics = dynamics::analyze(buffer, cfg)?;

    if loudness.silent {
        log::warn!("Input is silent or too short to gate; loudness is a sentinel value");
    }

    Ok(AnalysisResult {
        sample_rate: buffer.sample_rate(),
        duration_secs: buffer.duration_secs(),
        loudness,
        spectral,
        dynamics,
    })
}

/// Analyze a before/after pair: trim edge silence, resolve the sample-rate
/// policy, then run both analyses in parallel. The comparator joins on both
/// results afterwards.
pub fn analyze_pair(
    before: &AudioBuffer,
    after: &AudioBuffer,
    cfg: &AnalysisConfig,
) -> Result<(AnalysisResult, AnalysisResult)> {
    cfg.validate()?;

    let before = before.trimmed(cfg.trim_db);
    let after = after.trimmed(cfg.trim_db);

    let (before, after) = match (before.sample_rate(), after.sample_rate()) {
        (b, a) if b == a => (before, after),
        (b, a) if cfg.resample_on_mismatch => {
            log::info!(
                "Sample rates differ ({b} vs {a} Hz); resampling both to {} Hz",
                cfg.target_sample_rate
            );
            (
                resample_buffer(&before, cfg.target_sample_rate)?,
                resample_buffer(&after, cfg.target_sample_rate)?,
            )
        }
        (b, a) => return Err(AnalysisError::SampleRateMismatch { before: b, after: a }),
    };

    let (before_result, after_result) =
        rayon::join(|| analyze_file(&before, cfg), || analyze_file(&after, cfg));
    Ok((before_result?, after_result?))
}

/// Resample all channels to `target` Hz with a windowed-sinc resampler.
fn resample_buffer(buffer: &AudioBuffer, target: u32) -> Result<AudioBuffer> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    if buffer.sample_rate() == target {
        return Ok(buffer.clone());
    }
    if buffer.is_empty() {
        let channels = vec![Vec::new(); buffer.channel_count()];
        return AudioBuffer::new(channels, target);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target as f64 / buffer.sample_rate() as f64;
    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0, // max relative ratio
        params,
        buffer.len(),
        buffer.channel_count(),
    )
    .map_err(|e| AnalysisError::Resample(e.to_string()))?;

    let input: Vec<Vec<f32>> = buffer.channels().map(|c| c.to_vec()).collect();
    let output = resampler
        .process(&input, None)
        .map_err(|e| AnalysisError::Resample(e.to_string()))?;

    AudioBuffer::new(output, target)
}
