//! Test doubles for the chat transport and the scraper.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use teloxide::types::ChatId;

use crate::admin::AdminList;
use crate::download::{parse_post_metadata, DownloadAgent, PostInfo, PostScraper, ScrapeError};
use crate::handlers::send_message::Messenger;
use crate::stats::StatsStore;
use crate::types::{AppState, Incoming};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: ChatId,
        text: String,
    },
    Video {
        chat_id: ChatId,
        path: PathBuf,
        caption: String,
        existed: bool,
    },
}

/// Records every outbound message. Sends to `failing_chats` fail after being recorded.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<Sent>>,
    pub failing_chats: HashSet<i64>,
    pub fail_videos: bool,
}

impl RecordingMessenger {
    pub fn failing_for(chats: &[i64]) -> Self {
        Self {
            failing_chats: chats.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { chat_id: id, text } if id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn videos(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|sent| matches!(sent, Sent::Video { .. }))
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: ChatId, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text { chat_id, text });
        if self.failing_chats.contains(&chat_id.0) {
            bail!("Forbidden: bot was blocked by the user");
        }
        Ok(())
    }

    async fn send_video_file(&self, chat_id: ChatId, video: &Path, caption: String) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Video {
            chat_id,
            path: video.to_path_buf(),
            caption,
            existed: video.exists(),
        });
        if self.fail_videos || self.failing_chats.contains(&chat_id.0) {
            bail!("Request Entity Too Large");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum ScraperOutcome {
    Video,
    Photo,
    VideoWithoutFile,
    GarbageMetadata,
    Upstream(String),
}

/// Behaves like one instaloader run for one kind of post, writing files where it would.
pub struct ScriptedScraper {
    outcome: ScraperOutcome,
    pub runs: AtomicUsize,
}

impl ScriptedScraper {
    pub fn new(outcome: ScraperOutcome) -> Self {
        Self {
            outcome,
            runs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PostScraper for ScriptedScraper {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn download_post(&self, shortcode: &str, target: &Path) -> Result<PostInfo, ScrapeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        if let ScraperOutcome::Upstream(msg) = &self.outcome {
            return Err(ScrapeError::Platform(msg.clone()));
        }

        let is_video = !matches!(self.outcome, ScraperOutcome::Photo);
        let meta = match self.outcome {
            ScraperOutcome::GarbageMetadata => "<html>Please wait a few minutes</html>".to_string(),
            _ => format!(
                r#"{{"node": {{"shortcode": "{}", "is_video": {}, "owner": {{"username": "someone"}}}}}}"#,
                shortcode, is_video
            ),
        };
        tokio::fs::write(target.join(format!("{}.json", shortcode)), &meta).await?;

        if let ScraperOutcome::Video = self.outcome {
            tokio::fs::write(target.join(format!("{}.mp4", shortcode)), b"mp4").await?;
        }

        parse_post_metadata(shortcode, &meta)
    }
}

/// A fully wired state over scratch directories. Keep the `TempDir` alive for the test.
pub async fn app_state(
    outcome: ScraperOutcome,
    admins: &str,
) -> (Arc<AppState>, Arc<ScriptedScraper>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    std::fs::create_dir_all(&downloads).unwrap();

    let scraper = Arc::new(ScriptedScraper::new(outcome));
    let state = Arc::new(AppState {
        stats: Arc::new(StatsStore::load(dir.path().join("stats.json")).await),
        admins: AdminList::parse(admins),
        agent: DownloadAgent::new(scraper.clone(), &downloads),
        broadcast_delay: Duration::ZERO,
    });

    (state, scraper, dir)
}

pub fn incoming(user_id: i64, text: &str) -> Incoming {
    Incoming {
        chat_id: ChatId(user_id),
        user_id: user_id.to_string(),
        first_name: "Ali".to_string(),
        text: text.to_string(),
    }
}
