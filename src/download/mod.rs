mod link;
mod scraper;

pub use link::*;
pub use scraper::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("not an Instagram post link: {0}")]
    InvalidLink(String),
    #[error("{0}")]
    Upstream(String),
    #[error("post has no video")]
    NoVideoFound,
    /// The scraper finished but left output the bot could not read
    #[error("unexpected scraper output: {0}")]
    ScraperOutput(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ScrapeError> for DownloadError {
    fn from(e: ScrapeError) -> Self {
        match e {
            ScrapeError::Platform(msg) => DownloadError::Upstream(msg),
            ScrapeError::Metadata(msg) => DownloadError::ScraperOutput(msg),
            ScrapeError::Io(e) => DownloadError::Io(e),
        }
    }
}

/// A downloaded video living in its own job directory.
///
/// The directory and everything in it is removed when this value is dropped
/// or `cleanup` is called.
#[derive(Debug)]
pub struct DownloadedVideo {
    pub shortcode: String,
    pub owner: Option<String>,
    path: PathBuf,
    workdir: TempDir,
}

impl DownloadedVideo {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    pub fn cleanup(self) {
        let dir = self.workdir.path().to_path_buf();
        if let Err(e) = self.workdir.close() {
            log::error!("Failed to remove job directory {:?}: {}", dir, e);
        }
    }
}

pub struct DownloadAgent {
    scraper: Arc<dyn PostScraper>,
    download_dir: PathBuf,
}

impl DownloadAgent {
    pub fn new(scraper: Arc<dyn PostScraper>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            scraper,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Resolves `text` to a post, downloads its video and returns a handle to it.
    ///
    /// Each call works in a fresh directory under the download dir. On every
    /// error path that directory is gone before this returns.
    pub async fn fetch_video(&self, text: &str) -> Result<DownloadedVideo, DownloadError> {
        let link = PostLink::parse(text)?;

        let workdir = tempfile::Builder::new()
            .prefix(&format!("{}-", link.shortcode))
            .tempdir_in(&self.download_dir)?;

        log::debug!(
            "Fetching {} with {} into {:?}",
            link.shortcode,
            self.scraper.name(),
            workdir.path()
        );

        let target = workdir.path().join(&link.shortcode);
        tokio::fs::create_dir_all(&target).await?;

        let post = self.scraper.download_post(&link.shortcode, &target).await?;
        if !post.has_video {
            return Err(DownloadError::NoVideoFound);
        }

        let path = find_video(&target).await?.ok_or(DownloadError::NoVideoFound)?;
        log::debug!("Found video {:?} for {}", path, post.shortcode);

        Ok(DownloadedVideo {
            shortcode: post.shortcode,
            owner: post.owner,
            path,
            workdir,
        })
    }
}

/// First file in `dir` (by name) whose guessed MIME type is `video/*`.
async fn find_video(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut videos = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_video = mime_guess::from_path(&path)
            .iter()
            .any(|mime| mime.type_() == mime_guess::mime::VIDEO);
        if is_video {
            videos.push(path);
        }
    }

    videos.sort();
    Ok(videos.into_iter().next())
}

/// Removes job directories left behind by a previous run that was killed.
pub async fn purge_stale_jobs(download_dir: &Path) -> std::io::Result<usize> {
    tokio::fs::create_dir_all(download_dir).await?;

    let mut entries = tokio::fs::read_dir(download_dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };

        match result {
            Ok(()) => {
                log::warn!("Removed stale download {:?}", path);
                removed += 1;
            }
            Err(e) => log::error!("Failed to remove stale download {:?}: {}", path, e),
        }
    }

    Ok(removed)
}
