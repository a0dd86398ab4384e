//! Seam to the external Instagram scraper.
//!
//! The bot never talks to Instagram itself. `InstaloaderScraper` drives the
//! `instaloader` command line tool, which owns login, rate limiting and the
//! private API.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Instagram side failure as reported by the scraper (rate limit, private post, login wall)
    #[error("{0}")]
    Platform(String),
    /// The scraper ran but its output could not be understood
    #[error("unexpected scraper output: {0}")]
    Metadata(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the bot needs to know about a post before downloading it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostInfo {
    pub shortcode: String,
    pub owner: Option<String>,
    pub has_video: bool,
}

#[async_trait]
pub trait PostScraper: Send + Sync {
    fn name(&self) -> &str;

    /// Downloads the post's videos into `target` in one pass and returns what
    /// the scraper learned about the post. A photo post downloads nothing but
    /// still yields its metadata.
    async fn download_post(&self, shortcode: &str, target: &Path) -> Result<PostInfo, ScrapeError>;
}

pub struct InstaloaderScraper {
    program: PathBuf,
}

impl InstaloaderScraper {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[String], shortcode: &str) -> Result<(), ScrapeError> {
        log::debug!("Running {:?} {:?} -- -{}", self.program, args, shortcode);

        let output = Command::new(&self.program)
            .args(args)
            .arg("--")
            .arg(format!("-{}", shortcode))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!(
                "{:?} exited with {} for {}: {}",
                self.program,
                output.status,
                shortcode,
                stderr.trim()
            );
            return Err(ScrapeError::Platform(last_error_line(&stderr).unwrap_or_else(
                || format!("instaloader exited with {}", output.status),
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl PostScraper for InstaloaderScraper {
    fn name(&self) -> &str {
        "instaloader"
    }

    async fn download_post(&self, shortcode: &str, target: &Path) -> Result<PostInfo, ScrapeError> {
        let args = vec![
            "--quiet".to_string(),
            "--no-pictures".to_string(),
            "--no-captions".to_string(),
            "--no-compress-json".to_string(),
            "--dirname-pattern".to_string(),
            target.to_string_lossy().into_owned(),
            "--filename-pattern".to_string(),
            "{shortcode}".to_string(),
        ];
        self.run(&args, shortcode).await?;

        let meta_file = target.join(format!("{}.json", shortcode));
        let raw = match tokio::fs::read_to_string(&meta_file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScrapeError::Platform(
                    "Post not found or media unavailable".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        parse_post_metadata(shortcode, &raw)
    }
}

/// Reads the JSON metadata instaloader stores next to a post.
///
/// The file looks like `{"node": {...GraphQL post node...}, "instaloader": {...}}`.
pub fn parse_post_metadata(shortcode: &str, raw: &str) -> Result<PostInfo, ScrapeError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ScrapeError::Metadata(e.to_string()))?;

    let node = value
        .get("node")
        .ok_or_else(|| ScrapeError::Metadata("missing post node".to_string()))?;

    let is_video = node.get("is_video").and_then(|v| v.as_bool()).unwrap_or(false);

    let child_is_video = node
        .pointer("/edge_sidecar_to_children/edges")
        .and_then(|v| v.as_array())
        .map(|edges| {
            edges.iter().any(|edge| {
                edge.pointer("/node/is_video")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);

    let owner = node
        .pointer("/owner/username")
        .and_then(|v| v.as_str())
        .map(String::from);

    Ok(PostInfo {
        shortcode: node
            .get("shortcode")
            .and_then(|v| v.as_str())
            .unwrap_or(shortcode)
            .to_string(),
        owner,
        has_video: is_video || child_is_video,
    })
}

fn last_error_line(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(|line| line.chars().take(300).collect())
}
