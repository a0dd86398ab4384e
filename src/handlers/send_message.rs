use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::{
    payloads::SendVideoSetters,
    requests::Requester,
    types::{ChatId, InputFile},
    Bot,
};

/// Outbound side of the chat transport, as far as the handlers need it.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: String) -> Result<()>;

    async fn send_video_file(&self, chat_id: ChatId, video: &Path, caption: String) -> Result<()>;
}

#[async_trait]
impl Messenger for Bot {
    async fn send_text(&self, chat_id: ChatId, text: String) -> Result<()> {
        self.send_message(chat_id, text).await?;
        Ok(())
    }

    async fn send_video_file(&self, chat_id: ChatId, video: &Path, caption: String) -> Result<()> {
        self.send_video(chat_id, InputFile::file(video))
            .caption(caption)
            .supports_streaming(true)
            .await?;
        Ok(())
    }
}
