// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

/// Result of [`download_file`]: where the file lives and whether the network was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub cached: bool,
}

/// Local filename for `url`: its last non-empty path segment, or `download.csv`.
pub fn cache_filename(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .unwrap_or("download.csv")
        .to_string()
}

/// Download `url_str` into `dest_dir` unless a copy is already cached there.
/// With `force` the cached copy is replaced.
pub async fn download_file(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
    force: bool,
) -> Result<Downloaded> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url_str).with_context(|| format!("parsing source URL {}", url_str))?;
    let file_name = cache_filename(&url);
    let dest_path = dest_dir.join(&file_name);

    if !force {
        if let Ok(meta) = fs::metadata(&dest_path).await {
            if meta.is_file() {
                debug!(path = %dest_path.display(), "using cached download");
                return Ok(Downloaded {
                    path: dest_path,
                    size_bytes: meta.len(),
                    cached: true,
                });
            }
        }
    }

    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating {}", dest_dir.display()))?;

    info!(url = %url, "downloading");
    let bytes = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()?
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;

    // write next to the target then rename, so an interrupted download is never mistaken for a cache hit
    let tmp_path = dest_dir.join(format!("{}.part", file_name));
    fs::write(&tmp_path, &bytes)
        .await
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &dest_path)
        .await
        .with_context(|| format!("moving download into {}", dest_path.display()))?;

    Ok(Downloaded {
        path: dest_path,
        size_bytes: bytes.len() as u64,
        cached: false,
    })
}
