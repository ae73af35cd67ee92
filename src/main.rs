mod audio;
mod cli;
mod compare;
mod config;
mod error;
mod fetch;
mod report;

use anyhow::Result;
use clap::Parser;

use cli::Cli;
use config::AnalysisConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect masterlens.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = std::path::PathBuf::from("masterlens.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("masterlens").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("masterlens").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut file_config = config::FileConfig::default();
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            file_config = cfg;
            // Merge: config values apply only when CLI is at its default
            if cli.frame_len == 8192 { cli.frame_len = file_config.analysis.frame_len; }
            if cli.hop == 2048 { cli.hop = file_config.analysis.hop; }
            if cli.sample_rate == 48000 { cli.sample_rate = file_config.analysis.sample_rate; }
            if cli.trim_db == 40.0 { cli.trim_db = file_config.analysis.trim_db; }
            if cli.epsilon == 1.0 { cli.epsilon = file_config.compare.loudness_epsilon_db; }
            if !cli.no_resample { cli.no_resample = !file_config.analysis.resample; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let cfg = AnalysisConfig {
        frame_len: cli.frame_len,
        hop: cli.hop,
        target_sample_rate: cli.sample_rate,
        resample_on_mismatch: !cli.no_resample,
        silence_gate_lufs: file_config.analysis.silence_gate_lufs,
        trim_db: cli.trim_db,
        loudness_epsilon_db: cli.epsilon,
        tilt_epsilon_db: file_config.compare.tilt_epsilon_db,
        crest_epsilon_db: file_config.compare.crest_epsilon_db,
    };
    cfg.validate()?;

    log::info!("masterlens - before/after mastering analyzer");
    log::info!("Before: {}", cli.before);
    log::info!("After: {}", cli.after);
    log::info!("Output: {}", cli.outdir.display());

    let before_path = fetch::resolve_input(&cli.before, &cli.outdir, "before")?;
    let after_path = fetch::resolve_input(&cli.after, &cli.outdir, "after")?;

    log::info!("Decoding before: {}", before_path.display());
    let before = audio::decode::decode_audio(&before_path)?;
    log::info!("Decoding after: {}", after_path.display());
    let after = audio::decode::decode_audio(&after_path)?;

    let (before_result, after_result) = audio::analysis::analyze_pair(&before, &after, &cfg)?;
    let comparison = compare::compare(&before_result, &after_result, &cfg)?;

    report::emit(&comparison, &cli.outdir)?;
    report::print_summary(&comparison);

    Ok(())
}
