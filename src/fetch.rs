use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Resolve a CLI input that is either a local path or an http(s) URL.
/// URLs are downloaded into the output directory as `<label>.<ext>`.
pub fn resolve_input(input: &str, outdir: &Path, label: &str) -> Result<PathBuf> {
    if input.starts_with("http://") || input.starts_with("https://") {
        return download(input, outdir, label);
    }
    let path = PathBuf::from(input);
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(path)
}

fn download(url: &str, outdir: &Path, label: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(outdir)
        .with_context(|| format!("Failed to create output directory: {}", outdir.display()))?;

    log::info!("Downloading {label} from {url}");
    let mut response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to download: {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("Download failed: {} ({})", url, response.status());
    }

    let dest = outdir.join(format!("{label}.{}", url_extension(url)));
    let mut file = File::create(&dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let pb = match response.content_length() {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes}")
                    .unwrap()
                    .progress_chars("=>-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };
    response
        .copy_to(&mut pb.wrap_write(&mut file))
        .with_context(|| format!("Failed to save download from {url}"))?;
    pb.finish_and_clear();

    log::info!("Saved {label} to {}", dest.display());
    Ok(dest)
}

// Extension from the URL path component, for the decoder's format hint.
fn url_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5)
        .unwrap_or("bin")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_url_path() {
        assert_eq!(url_extension("https://example.com/mix.wav"), "wav");
        assert_eq!(url_extension("https://example.com/mix.mp3?token=abc"), "mp3");
        assert_eq!(url_extension("https://example.com/stream"), "bin");
    }

    #[test]
    fn missing_local_file_is_an_error() {
        let outdir = std::env::temp_dir();
        assert!(resolve_input("/definitely/not/here.wav", &outdir, "before").is_err());
    }

    #[test]
    fn existing_local_file_passes_through() {
        let outdir = std::env::temp_dir();
        let path = outdir.join(format!("masterlens-fetch-{}.wav", std::process::id()));
        std::fs::write(&path, b"stub").unwrap();
        let resolved = resolve_input(path.to_str().unwrap(), &outdir, "before").unwrap();
        assert_eq!(resolved, path);
        std::fs::remove_file(&path).unwrap();
    }
}
