use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "masterlens", about = "Before/after mastering comparison analyzer")]
pub struct Cli {
    /// "Before" audio file (WAV, MP3, FLAC, OGG) or http(s) URL
    #[arg(long)]
    pub before: String,

    /// "After" audio file or http(s) URL
    #[arg(long)]
    pub after: String,

    /// Output directory for report files
    #[arg(short, long, default_value = "mastering_report")]
    pub outdir: PathBuf,

    /// Config file path (defaults to masterlens.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// FFT size for spectral analysis
    #[arg(long, default_value_t = 8192)]
    pub frame_len: usize,

    /// Hop size between spectral frames
    #[arg(long, default_value_t = 2048)]
    pub hop: usize,

    /// Common rate both inputs are resampled to when their rates differ
    #[arg(long, default_value_t = 48000)]
    pub sample_rate: u32,

    /// Fail on sample rate mismatch instead of resampling
    #[arg(long)]
    pub no_resample: bool,

    /// Edge-silence trim threshold below signal peak (dB)
    #[arg(long, default_value_t = 40.0)]
    pub trim_db: f32,

    /// Loudness delta below which changes are not significant (dB)
    #[arg(long, default_value_t = 1.0)]
    pub epsilon: f64,
}
