//! Saves resolved URLs into a local directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::download::{DownloadError, Downloader};

/// Streams a URL body to `<dir>/<filename>`.
///
/// The body goes to a hidden `.part` file first and is renamed into place
/// only once complete, so the final name never holds a partial document.
#[derive(Clone)]
pub struct HttpDownloader {
    dir: PathBuf,
    agent: ureq::Agent,
}

impl HttpDownloader {
    pub fn new(dir: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build();
        HttpDownloader {
            dir: dir.into(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, filename: &str) -> Result<PathBuf, DownloadError> {
        let agent = self.agent.clone();
        let dir = self.dir.clone();
        let url = url.to_string();
        let filename = filename.to_string();

        tokio::task::spawn_blocking(move || fetch_to_file(&agent, &url, &dir, &filename))
            .await
            .map_err(|e| DownloadError::Transport {
                message: format!("task join error: {e}"),
            })?
    }
}

fn fetch_to_file(
    agent: &ureq::Agent,
    url: &str,
    dir: &Path,
    filename: &str,
) -> Result<PathBuf, DownloadError> {
    let target = dir.join(filename);
    let partial = dir.join(format!(".{filename}.part"));
    let io_err = |path: &Path, e: io::Error| DownloadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let response = agent.get(url).call().map_err(|e| DownloadError::Transport {
        message: e.to_string(),
    })?;
    let status = response.status().as_u16();
    if !(200..=299).contains(&status) {
        return Err(DownloadError::Http { status });
    }

    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let mut file = fs::File::create(&partial).map_err(|e| io_err(&partial, e))?;
    let mut body = response.into_body().into_reader();
    let copied = io::copy(&mut body, &mut file);
    let finished = copied.and_then(|bytes| file.sync_all().map(|_| bytes));
    drop(file);

    let bytes = match finished {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(DownloadError::Transport {
                message: format!("error reading download body: {e}"),
            });
        }
    };
    fs::rename(&partial, &target).map_err(|e| io_err(&target, e))?;
    tracing::debug!(path = %target.display(), bytes, "download saved");
    Ok(target)
}
