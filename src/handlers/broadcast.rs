use std::time::Duration;

use teloxide::types::ChatId;

use super::command::{require_admin, CommandError};
use super::send_message::Messenger;
use crate::types::{AppState, HandlerResult, Incoming};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BroadcastReport {
    pub success: usize,
    pub failed: usize,
}

/// Sends `text` to every recipient in order, waiting `delay` between sends.
///
/// A failed send is counted and the loop moves on.
pub async fn send_broadcast<M: Messenger + ?Sized>(
    messenger: &M,
    recipients: &[String],
    text: &str,
    delay: Duration,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for (i, user_id) in recipients.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let chat_id = match user_id.parse::<i64>() {
            Ok(id) => ChatId(id),
            Err(_) => {
                log::warn!("Skipping broadcast to invalid user id {:?}", user_id);
                report.failed += 1;
                continue;
            }
        };

        match messenger.send_text(chat_id, text.to_string()).await {
            Ok(()) => report.success += 1,
            Err(e) => {
                log::warn!("Broadcast to {} failed: {}", user_id, e);
                report.failed += 1;
            }
        }
    }

    report
}

pub async fn broadcast<M: Messenger + ?Sized>(
    state: &AppState,
    messenger: &M,
    bot_username: &str,
    incoming: &Incoming,
    text: &str,
) -> HandlerResult {
    if let Err(e) = require_admin(state, incoming) {
        return messenger.send_text(incoming.chat_id, e.to_string()).await;
    }

    if text.trim().is_empty() {
        return messenger
            .send_text(incoming.chat_id, CommandError::MissingArgument.to_string())
            .await;
    }

    let recipients = state.stats.active_users();
    log::info!(
        "User {:?} started a broadcast to {} users",
        incoming.user_id,
        recipients.len()
    );

    messenger
        .send_text(
            incoming.chat_id,
            format!("📢 Xabar {} foydalanuvchiga yuborilmoqda...", recipients.len()),
        )
        .await?;

    let body = format!("📢 Yangilik:\n\n{}\n\n👉 @{}", text.trim(), bot_username);
    let report = send_broadcast(messenger, &recipients, &body, state.broadcast_delay).await;

    log::info!(
        "Broadcast finished: {} delivered, {} failed",
        report.success,
        report.failed
    );

    messenger
        .send_text(
            incoming.chat_id,
            format!(
                "✅ Xabar yuborish yakunlandi!\n\
                • Muvaffaqiyatli: {}\n\
                • Muvaffaqiyatsiz: {}",
                report.success, report.failed
            ),
        )
        .await
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{app_state, incoming, RecordingMessenger, ScraperOutcome, Sent};

    const BOT: &str = "insta_video_bot";

    #[tokio::test]
    async fn failed_sends_are_counted_and_do_not_stop_the_batch() {
        let (state, _, _dir) = app_state(ScraperOutcome::Video, "1").await;
        for id in ["1", "2", "3"] {
            state.stats.record_active_user(id);
        }
        let messenger = RecordingMessenger::failing_for(&[2, 3]);

        broadcast(&state, &messenger, BOT, &incoming(1, "/broadcast hello"), "hello")
            .await
            .unwrap();

        let body = "📢 Yangilik:\n\nhello\n\n👉 @insta_video_bot".to_string();
        let attempted: Vec<i64> = messenger
            .sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { chat_id, text } if text == body => Some(chat_id.0),
                _ => None,
            })
            .collect();
        assert_eq!(attempted, vec![1, 2, 3]);

        let to_admin = messenger.texts_to(ChatId(1));
        assert_eq!(to_admin.first().unwrap(), "📢 Xabar 3 foydalanuvchiga yuborilmoqda...");
        assert_eq!(
            to_admin.last().unwrap(),
            "✅ Xabar yuborish yakunlandi!\n• Muvaffaqiyatli: 1\n• Muvaffaqiyatsiz: 2"
        );
    }

    #[tokio::test]
    async fn non_admin_is_refused_before_anything_is_sent() {
        let (state, _, _dir) = app_state(ScraperOutcome::Video, "1").await;
        state.stats.record_active_user("1");
        state.stats.record_active_user("2");
        let messenger = RecordingMessenger::default();

        broadcast(&state, &messenger, BOT, &incoming(2, "/broadcast hi"), "hi")
            .await
            .unwrap();

        assert_eq!(
            messenger.sent(),
            vec![Sent::Text {
                chat_id: ChatId(2),
                text: CommandError::Unauthorized.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn empty_text_is_a_missing_argument() {
        let (state, _, _dir) = app_state(ScraperOutcome::Video, "1").await;
        state.stats.record_active_user("2");
        let messenger = RecordingMessenger::default();

        broadcast(&state, &messenger, BOT, &incoming(1, "/broadcast"), "  ")
            .await
            .unwrap();

        assert_eq!(
            messenger.sent(),
            vec![Sent::Text {
                chat_id: ChatId(1),
                text: CommandError::MissingArgument.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn invalid_recipient_ids_count_as_failures() {
        let messenger = RecordingMessenger::default();
        let recipients = vec!["10".to_string(), "not-a-number".to_string()];

        let report = send_broadcast(&messenger, &recipients, "x", Duration::ZERO).await;

        assert_eq!(report, BroadcastReport { success: 1, failed: 1 });
        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn sends_are_paced() {
        let messenger = RecordingMessenger::default();
        let recipients = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let delay = Duration::from_millis(20);

        let started = std::time::Instant::now();
        let report = send_broadcast(&messenger, &recipients, "x", delay).await;

        assert_eq!(report.success, 3);
        assert!(started.elapsed() >= delay * 2);
    }
}
