use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::compare::ComparisonReport;

/// Write report.json, bands_1_3_octave.csv and preset_suggestion.json into
/// the output directory.
pub fn emit(report: &ComparisonReport, outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("Failed to create output directory: {}", outdir.display()))?;

    let report_path = outdir.join("report.json");
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(&report_path, json)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    let mut csv = String::from("center_hz,before_db,after_db,diff_db\n");
    for band in &report.band_deltas {
        writeln!(
            csv,
            "{:.1},{:.3},{:.3},{:.3}",
            band.center_hz, band.before_db, band.after_db, band.delta_db
        )?;
    }
    let csv_path = outdir.join("bands_1_3_octave.csv");
    fs::write(&csv_path, csv)
        .with_context(|| format!("Failed to write {}", csv_path.display()))?;

    let suggestion_path = outdir.join("preset_suggestion.json");
    let json = serde_json::to_string_pretty(&report.suggestion)
        .context("Failed to serialize preset suggestion")?;
    fs::write(&suggestion_path, json)
        .with_context(|| format!("Failed to write {}", suggestion_path.display()))?;

    log::info!("Reports written to {}", outdir.display());
    Ok(())
}

pub fn print_summary(report: &ComparisonReport) {
    let diff = &report.diff;
    let suggestion = &report.suggestion;
    println!("=== SUMMARY ===");
    println!(
        "LUFS Δ: {:.2} | LRA Δ: {:.2} | RMS Δ (dB): {:.2}",
        diff.lufs_delta, diff.lra_delta, diff.rms_delta_db
    );
    println!(
        "TP Δ (dB): {:.2} | Crest Δ: {:.2} | Transients Δ: {:.2}",
        diff.true_peak_delta_db, diff.crest_delta_db, diff.transient_index_delta
    );
    println!(
        "Suggested Preset → {} | Intensity: {} | Tone: {} (tilt={:.2} dB)",
        suggestion.label,
        suggestion.suggested_intensity,
        suggestion.suggested_tone,
        suggestion.tilt_indicator_db
    );
    if report.before.loudness.silent || report.after.loudness.silent {
        println!("Note: at least one input was silent; loudness deltas use sentinel values.");
    }
}
