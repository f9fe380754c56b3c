use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::ModelSpec;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model {name} not found (searched {searched:?}); pass --download-models to fetch it")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("no per-user cache directory on this platform")]
    NoCacheDir,
    #[error("fetching {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("saving model to {path} failed: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Called with `(bytes_so_far, content_length)`; the length is 0 when the
/// server does not announce one.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Finds `model` in `models_dir`, then in the user cache. When neither has
/// it and `allow_download` is set, the model is fetched into the cache.
pub fn resolve(
    model: &ModelSpec,
    models_dir: &Path,
    allow_download: bool,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache = model_cache_dir();
    let mut searched = vec![models_dir.join(model.file_name)];
    if let Some(dir) = &cache {
        searched.push(dir.join(model.file_name));
    }

    if let Some(found) = searched.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }
    if !allow_download {
        return Err(ModelResolveError::NotFound {
            name: model.file_name.to_string(),
            searched,
        });
    }

    let target = cache
        .ok_or(ModelResolveError::NoCacheDir)?
        .join(model.file_name);
    log::info!("Fetching {} into {}", model.url, target.display());
    fetch(model.url, &target, progress)?;
    Ok(target)
}

/// `<cache>/Moodscan/models`, using the data directory on macOS.
pub fn model_cache_dir() -> Option<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::data_dir()
    } else {
        dirs::cache_dir()
    };
    base.map(|d| d.join("Moodscan").join("models"))
}

/// Streams `url` into a sibling `.part` file and renames it into place, so
/// `target` only ever holds a complete model.
fn fetch(url: &str, target: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let partial = target.with_extension("part");
    let outcome = fetch_to(url, &partial, progress).and_then(|()| {
        fs::rename(&partial, target).map_err(|source| ModelResolveError::Save {
            path: target.to_path_buf(),
            source,
        })
    });
    if outcome.is_err() {
        let _ = fs::remove_file(&partial);
    }
    outcome
}

fn fetch_to(url: &str, partial: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let save_err = |source: io::Error| ModelResolveError::Save {
        path: partial.to_path_buf(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    if let Some(dir) = partial.parent() {
        fs::create_dir_all(dir).map_err(save_err)?;
    }
    let mut sink = ProgressWriter {
        inner: File::create(partial).map_err(save_err)?,
        written: 0,
        total: response.content_length().unwrap_or(0),
        progress,
    };
    io::copy(&mut response, &mut sink).map_err(save_err)?;
    sink.flush().map_err(save_err)
}

/// Forwards writes and reports the running byte count.
struct ProgressWriter<W> {
    inner: W,
    written: u64,
    total: u64,
    progress: Option<ProgressFn>,
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        if let Some(report) = &self.progress {
            report(self.written, self.total);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
