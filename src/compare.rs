use serde::Serialize;
use std::fmt;

use crate::audio::analysis::AnalysisResult;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};

/// Categorical description of what the mastering pass did, chosen by the
/// first matching rule in RULES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Suggestion {
    NoSignificantChange,
    LouderBrighter,
    LouderWarmer,
    Louder,
    QuieterBrighter,
    QuieterWarmer,
    Quieter,
    Brighter,
    Warmer,
    MoreCompressed,
    MoreDynamic,
    Uncategorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Balanced,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Warm,
    Balanced,
    Bright,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeltaSummary {
    pub lufs_delta: f64,
    pub lra_delta: f64,
    pub rms_delta_db: f64,
    pub true_peak_delta_db: f64,
    pub crest_delta_db: f64,
    pub correlation_delta: f64,
    pub width_delta: f64,
    pub transient_index_delta: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BandDelta {
    pub center_hz: f64,
    pub before_db: f64,
    pub after_db: f64,
    pub delta_db: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresetSuggestion {
    pub label: Suggestion,
    pub suggested_intensity: Intensity,
    pub suggested_tone: Tone,
    pub tilt_indicator_db: f64,
    pub notes: &'static str,
}

/// Before/after results with their deltas and the preset suggestion. Borrows
/// the per-file results rather than copying them.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport<'a> {
    pub before: &'a AnalysisResult,
    pub after: &'a AnalysisResult,
    pub diff: DeltaSummary,
    pub band_deltas: Vec<BandDelta>,
    pub suggestion: PresetSuggestion,
}

pub fn compare<'a>(
    before: &'a AnalysisResult,
    after: &'a AnalysisResult,
    cfg: &AnalysisConfig,
) -> Result<ComparisonReport<'a>> {
    if !before.spectral.same_layout(&after.spectral) {
        return Err(AnalysisError::SampleRateMismatch {
            before: before.sample_rate,
            after: after.sample_rate,
        });
    }

    let band_deltas: Vec<BandDelta> = before
        .spectral
        .bands
        .iter()
        .zip(after.spectral.bands.iter())
        .map(|(b, a)| BandDelta {
            center_hz: b.center_hz,
            before_db: b.energy_db,
            after_db: a.energy_db,
            delta_db: a.energy_db - b.energy_db,
        })
        .collect();

    let diff = DeltaSummary {
        lufs_delta: after.loudness.integrated_lufs - before.loudness.integrated_lufs,
        lra_delta: after.loudness.loudness_range - before.loudness.loudness_range,
        rms_delta_db: after.loudness.rms_dbfs - before.loudness.rms_dbfs,
        true_peak_delta_db: after.loudness.true_peak_dbtp - before.loudness.true_peak_dbtp,
        crest_delta_db: after.dynamics.crest_db - before.dynamics.crest_db,
        correlation_delta: after.dynamics.stereo_correlation - before.dynamics.stereo_correlation,
        width_delta: after.dynamics.stereo_width - before.dynamics.stereo_width,
        transient_index_delta: after.dynamics.transient_index - before.dynamics.transient_index,
    };

    let tilt = spectral_tilt(&band_deltas);
    let input = RuleInput {
        loudness: diff.lufs_delta,
        tilt,
        crest: diff.crest_delta_db,
        eps_loudness: cfg.loudness_epsilon_db,
        eps_tilt: cfg.tilt_epsilon_db,
        eps_crest: cfg.crest_epsilon_db,
        silent: before.loudness.silent || after.loudness.silent,
    };

    let suggestion = PresetSuggestion {
        label: suggest(&input),
        suggested_intensity: intensity(&input),
        suggested_tone: tone(&input),
        tilt_indicator_db: tilt,
        notes: "Heuristic based on loudness change and spectral tilt (>=8 kHz vs 150-300 Hz).",
    };

    Ok(ComparisonReport { before, after, diff, band_deltas, suggestion })
}

/// Mean high-band delta minus mean low-band delta, in dB. Positive means the
/// master got brighter relative to its low mids.
fn spectral_tilt(band_deltas: &[BandDelta]) -> f64 {
    let mean_where = |pred: &dyn Fn(f64) -> bool| {
        let values: Vec<f64> = band_deltas
            .iter()
            .filter(|b| pred(b.center_hz))
            .map(|b| b.delta_db)
            .collect();
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };
    let high = mean_where(&|hz| hz >= 8000.0);
    let low = mean_where(&|hz| (150.0..=300.0).contains(&hz));
    high - low
}

struct RuleInput {
    loudness: f64,
    tilt: f64,
    crest: f64,
    eps_loudness: f64,
    eps_tilt: f64,
    eps_crest: f64,
    silent: bool,
}

impl RuleInput {
    fn louder(&self) -> bool {
        self.loudness > self.eps_loudness
    }
    fn quieter(&self) -> bool {
        self.loudness < -self.eps_loudness
    }
    fn brighter(&self) -> bool {
        self.tilt > self.eps_tilt
    }
    fn warmer(&self) -> bool {
        self.tilt < -self.eps_tilt
    }
}

// Ordered decision table: the first predicate that matches wins, and the
// final always-true rule guarantees the mapping is total.
const RULES: &[(fn(&RuleInput) -> bool, Suggestion)] = &[
    (|i| i.silent, Suggestion::Uncategorized),
    (
        |i| !i.louder() && !i.quieter() && !i.brighter() && !i.warmer()
            && i.crest.abs() <= i.eps_crest,
        Suggestion::NoSignificantChange,
    ),
    (|i| i.louder() && i.brighter(), Suggestion::LouderBrighter),
    (|i| i.louder() && i.warmer(), Suggestion::LouderWarmer),
    (|i| i.quieter() && i.brighter(), Suggestion::QuieterBrighter),
    (|i| i.quieter() && i.warmer(), Suggestion::QuieterWarmer),
    (|i| i.louder(), Suggestion::Louder),
    (|i| i.quieter(), Suggestion::Quieter),
    (|i| i.brighter(), Suggestion::Brighter),
    (|i| i.warmer(), Suggestion::Warmer),
    (|i| i.crest < -i.eps_crest, Suggestion::MoreCompressed),
    (|i| i.crest > i.eps_crest, Suggestion::MoreDynamic),
    (|_| true, Suggestion::Uncategorized),
];

fn suggest(input: &RuleInput) -> Suggestion {
    RULES
        .iter()
        .find(|(predicate, _)| predicate(input))
        .map(|&(_, label)| label)
        .unwrap_or(Suggestion::Uncategorized)
}

fn intensity(input: &RuleInput) -> Intensity {
    if input.quieter() {
        Intensity::Low
    } else if input.louder() {
        Intensity::High
    } else {
        Intensity::Balanced
    }
}

fn tone(input: &RuleInput) -> Tone {
    if input.brighter() {
        Tone::Bright
    } else if input.warmer() {
        Tone::Warm
    } else {
        Tone::Balanced
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Suggestion::NoSignificantChange => "no significant change",
            Suggestion::LouderBrighter => "louder + brighter",
            Suggestion::LouderWarmer => "louder + warmer",
            Suggestion::Louder => "louder",
            Suggestion::QuieterBrighter => "quieter + brighter",
            Suggestion::QuieterWarmer => "quieter + warmer",
            Suggestion::Quieter => "quieter",
            Suggestion::Brighter => "brighter",
            Suggestion::Warmer => "warmer",
            Suggestion::MoreCompressed => "more compressed",
            Suggestion::MoreDynamic => "more dynamic",
            Suggestion::Uncategorized => "uncategorized",
        };
        f.write_str(label)
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Intensity::Low => "low",
            Intensity::Balanced => "balanced",
            Intensity::High => "high",
        })
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tone::Warm => "warm",
            Tone::Balanced => "balanced",
            Tone::Bright => "bright",
        })
    }
}
