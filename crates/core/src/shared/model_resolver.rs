use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Where a model's weights live: a file name plus the URL it can be
/// fetched from when no local copy exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSource {
    pub name: String,
    pub url: String,
}

impl ModelSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Resolve a model file, checking local locations before downloading.
///
/// Resolution order:
/// 1. `models_dir` (operator-supplied weights)
/// 2. User cache directory (platform-specific)
/// 3. Download from the source URL into the cache
pub fn resolve(source: &ModelSource, models_dir: Option<&Path>) -> Result<PathBuf, ModelResolveError> {
    resolve_with_cache(source, models_dir, &model_cache_dir()?)
}

/// Same as [`resolve`] with an explicit cache directory.
pub fn resolve_with_cache(
    source: &ModelSource,
    models_dir: Option<&Path>,
    cache_dir: &Path,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(dir) = models_dir {
        let local = dir.join(&source.name);
        if local.exists() {
            log::debug!("Using model {} from {}", source.name, dir.display());
            return Ok(local);
        }
    }

    let cached_path = cache_dir.join(&source.name);
    if cached_path.exists() {
        log::debug!("Using cached model {}", cached_path.display());
        return Ok(cached_path);
    }

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading model {} from {}", source.name, source.url);
    download(&source.url, &cached_path)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/deepscan/models/`
/// - Linux: `$XDG_CACHE_HOME/deepscan/models/` or `~/.cache/deepscan/models/`
/// - Windows: `%LOCALAPPDATA%/deepscan/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("deepscan").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("deepscan").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let download_err = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };

    let bytes = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(download_err)?;

    // Write next to the destination first so a failed transfer never
    // leaves a truncated model at the final path.
    let temp_path = dest.with_extension("part");
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ModelResolveError::Write { path, source }
    };

    let mut file = fs::File::create(&temp_path).map_err(write_err(&temp_path))?;
    file.write_all(&bytes).map_err(write_err(&temp_path))?;
    file.flush().map_err(write_err(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(write_err(dest))?;
    log::info!("Saved model to {} ({} bytes)", dest.display(), bytes.len());
    Ok(())
}
