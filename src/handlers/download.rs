use std::sync::Arc;

use teloxide::{types::Message, Bot};

use super::send_message::Messenger;
use crate::download::{DownloadError, INSTAGRAM_DOMAIN};
use crate::types::{AppState, HandlerResult, Incoming};

const VIDEO_CAPTION: &str =
    "✅ Video muvaffaqiyatli yuklab olindi!\n\nYana video yuklab olish uchun link yuboring.";

pub async fn receive_link(state: Arc<AppState>, bot: Bot, msg: Message) -> HandlerResult {
    let Some(incoming) = Incoming::from_message(&msg) else {
        return Ok(());
    };

    handle_link(&state, &bot, &incoming).await
}

pub async fn handle_link<M: Messenger + ?Sized>(
    state: &AppState,
    messenger: &M,
    incoming: &Incoming,
) -> HandlerResult {
    state.stats.record_active_user(&incoming.user_id);

    if !incoming.text.to_lowercase().contains(INSTAGRAM_DOMAIN) {
        return messenger
            .send_text(
                incoming.chat_id,
                "⚠️ Iltimos Instagram video linkini yuboring!".to_string(),
            )
            .await;
    }

    log::debug!("Got link {:?} from {:?}", incoming.text, incoming.user_id);

    messenger
        .send_text(
            incoming.chat_id,
            "📥 Video yuklanmoqda, iltimos kuting...".to_string(),
        )
        .await?;

    let video = match state.agent.fetch_video(&incoming.text).await {
        Ok(video) => video,
        Err(e) => {
            log::error!("Download for {:?} failed: {}", incoming.user_id, e);
            return messenger
                .send_text(incoming.chat_id, failure_reply(&e))
                .await;
        }
    };

    log::debug!("Sending {:?} from job dir {:?}", video.path(), video.workdir());

    let sent = messenger
        .send_video_file(incoming.chat_id, video.path(), VIDEO_CAPTION.to_string())
        .await;

    let shortcode = video.shortcode.clone();
    let owner = video.owner.clone();
    video.cleanup();

    match sent {
        Ok(()) => {
            state.stats.record_download();
            log::info!(
                "Sent {} (owner {:?}) to {:?}",
                shortcode,
                owner,
                incoming.user_id
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Failed to send video {} to {:?}: {}", shortcode, incoming.user_id, e);
            messenger
                .send_text(
                    incoming.chat_id,
                    "❌ Video yuborishda xatolik yuz berdi".to_string(),
                )
                .await
        }
    }
}

const UNEXPECTED_ERROR_REPLY: &str =
    "❌ Kutilmagan xatolik yuz berdi. Keyinroq qayta urinib ko'ring.";

/// Only upstream messages reach the user verbatim. Everything local stays in the log.
fn failure_reply(e: &DownloadError) -> String {
    match e {
        DownloadError::InvalidLink(_) => {
            "❌ Link noto'g'ri. Instagram post yoki reels linkini yuboring!".to_string()
        }
        DownloadError::Upstream(msg) => format!("❌ Instagram xatosi: {}", msg),
        DownloadError::NoVideoFound => "❌ Bu postda video topilmadi!".to_string(),
        DownloadError::ScraperOutput(_) => {
            "❌ Instagram javobini o'qib bo'lmadi. Keyinroq qayta urinib ko'ring.".to_string()
        }
        DownloadError::Io(_) => UNEXPECTED_ERROR_REPLY.to_string(),
    }
}
