use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AnalysisError, Result};

/// Immutable engine configuration, passed in at construction. Defaults follow
/// the values documented below; all of them can be overridden from the CLI or
/// a TOML config file.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// FFT size for spectral analysis (samples per frame).
    pub frame_len: usize,
    /// Hop between spectral frames (frame length minus overlap).
    pub hop: usize,
    /// Common rate both inputs are resampled to when their rates differ.
    pub target_sample_rate: u32,
    /// Resample on mismatch instead of failing with SampleRateMismatch.
    pub resample_on_mismatch: bool,
    /// Absolute gate below which loudness blocks are discarded (LUFS).
    pub silence_gate_lufs: f64,
    /// Edge-silence trim threshold relative to signal peak (dB).
    pub trim_db: f32,
    /// Loudness delta below which a change is not significant (dB).
    pub loudness_epsilon_db: f64,
    /// Spectral tilt below which tone is considered unchanged (dB).
    pub tilt_epsilon_db: f64,
    /// Crest factor delta below which dynamics are considered unchanged (dB).
    pub crest_epsilon_db: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_len: default_frame_len(),
            hop: default_hop(),
            target_sample_rate: default_sample_rate(),
            resample_on_mismatch: default_resample(),
            silence_gate_lufs: default_silence_gate(),
            trim_db: default_trim_db(),
            loudness_epsilon_db: default_loudness_epsilon(),
            tilt_epsilon_db: default_tilt_epsilon(),
            crest_epsilon_db: default_crest_epsilon(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_len == 0 || self.hop == 0 {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "frame length {} and hop {} must be positive",
                self.frame_len, self.hop
            )));
        }
        if self.hop > self.frame_len {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "hop {} exceeds frame length {}",
                self.hop, self.frame_len
            )));
        }
        if self.target_sample_rate == 0 {
            return Err(AnalysisError::InvalidConfiguration(
                "target sample rate must be positive".into(),
            ));
        }
        if self.loudness_epsilon_db < 0.0
            || self.tilt_epsilon_db < 0.0
            || self.crest_epsilon_db < 0.0
        {
            return Err(AnalysisError::InvalidConfiguration(
                "epsilon thresholds must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub compare: CompareSection,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisSection {
    #[serde(default = "default_frame_len")]
    pub frame_len: usize,
    #[serde(default = "default_hop")]
    pub hop: usize,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_resample")]
    pub resample: bool,
    #[serde(default = "default_trim_db")]
    pub trim_db: f32,
    #[serde(default = "default_silence_gate")]
    pub silence_gate_lufs: f64,
}

#[derive(Debug, Deserialize)]
pub struct CompareSection {
    #[serde(default = "default_loudness_epsilon")]
    pub loudness_epsilon_db: f64,
    #[serde(default = "default_tilt_epsilon")]
    pub tilt_epsilon_db: f64,
    #[serde(default = "default_crest_epsilon")]
    pub crest_epsilon_db: f64,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            frame_len: default_frame_len(),
            hop: default_hop(),
            sample_rate: default_sample_rate(),
            resample: default_resample(),
            trim_db: default_trim_db(),
            silence_gate_lufs: default_silence_gate(),
        }
    }
}

impl Default for CompareSection {
    fn default() -> Self {
        Self {
            loudness_epsilon_db: default_loudness_epsilon(),
            tilt_epsilon_db: default_tilt_epsilon(),
            crest_epsilon_db: default_crest_epsilon(),
        }
    }
}

fn default_frame_len() -> usize { 8192 }
fn default_hop() -> usize { 2048 }
fn default_sample_rate() -> u32 { 48000 }
fn default_resample() -> bool { true }
fn default_trim_db() -> f32 { 40.0 }
fn default_silence_gate() -> f64 { -70.0 }
fn default_loudness_epsilon() -> f64 { 1.0 }
fn default_tilt_epsilon() -> f64 { 0.75 }
fn default_crest_epsilon() -> f64 { 1.0 }

pub fn load_config(path: &PathBuf) -> Option<FileConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_hop() {
        let cfg = AnalysisConfig { hop: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_hop_larger_than_frame() {
        let cfg = AnalysisConfig { frame_len: 1024, hop: 2048, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: FileConfig = toml::from_str("[analysis]\nframe_len = 4096\n").unwrap();
        assert_eq!(cfg.analysis.frame_len, 4096);
        assert_eq!(cfg.analysis.hop, 2048);
        assert_eq!(cfg.compare.loudness_epsilon_db, 1.0);
    }
}
