use std::sync::Arc;

use teloxide::{
    macros::BotCommands,
    types::{Me, Message},
    utils::command::{BotCommands as _, ParseError},
    Bot,
};
use thiserror::Error;

use super::broadcast::broadcast;
use super::send_message::Messenger;
use crate::types::{AppState, HandlerResult, Incoming};

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "Botni ishga tushirish")]
    Start,

    #[command(description = "Bot statistikasi")]
    Stats,

    #[command(hide)]
    Admin,

    #[command(hide, parse_with = rest_of_message)]
    Broadcast(String),
}

/// Hands everything after the command name to the variant, so an empty
/// `/broadcast` still parses and can be answered with a usage hint.
fn rest_of_message(input: String) -> Result<(String,), ParseError> {
    Ok((input.trim().to_string(),))
}

/// User-visible refusals. The display text is what the user receives.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("❌ Bu buyruq faqat adminlar uchun!")]
    Unauthorized,

    #[error("❌ Iltimos xabar matnini kiriting!\nMasalan: /broadcast Salom do'stlar!")]
    MissingArgument,
}

pub fn require_admin(state: &AppState, incoming: &Incoming) -> Result<(), CommandError> {
    if state.admins.is_admin(&incoming.user_id) {
        Ok(())
    } else {
        log::warn!("User {:?} tried an admin command", incoming.user_id);
        Err(CommandError::Unauthorized)
    }
}

pub async fn receive_command(
    state: Arc<AppState>,
    bot: Bot,
    me: Me,
    msg: Message,
) -> HandlerResult {
    let Some(incoming) = Incoming::from_message(&msg) else {
        return Ok(());
    };

    dispatch_command(&state, &bot, me.username(), &incoming).await
}

pub async fn dispatch_command<M: Messenger + ?Sized>(
    state: &AppState,
    messenger: &M,
    bot_username: &str,
    incoming: &Incoming,
) -> HandlerResult {
    match Command::parse(&incoming.text, bot_username) {
        Ok(command) => run_command(state, messenger, bot_username, incoming, command).await,
        // addressed to another bot in a group
        Err(ParseError::WrongBotName(name)) => {
            log::debug!("Ignoring command for @{}", name);
            Ok(())
        }
        Err(_) => {
            messenger
                .send_text(incoming.chat_id, "❓ Noma'lum buyruq".to_string())
                .await
        }
    }
}

pub async fn run_command<M: Messenger + ?Sized>(
    state: &AppState,
    messenger: &M,
    bot_username: &str,
    incoming: &Incoming,
    command: Command,
) -> HandlerResult {
    log::debug!("Got command {:?} from {:?}", command, incoming.user_id);

    match command {
        Command::Start => {
            state.stats.record_active_user(&incoming.user_id);
            let stats = state.stats.snapshot();
            messenger
                .send_text(
                    incoming.chat_id,
                    format!(
                        "👋 Assalomu alaykum {}!\n\n\
                        Instagram video linkini yuboring, men yuklab beraman.\n\n\
                        📊 Bot statistikasi:\n\
                        • Foydalanuvchilar: {}\n\
                        • Yuklab olishlar: {}",
                        incoming.first_name, stats.total_users, stats.total_downloads
                    ),
                )
                .await
        }
        Command::Stats => {
            state.stats.record_active_user(&incoming.user_id);
            let stats = state.stats.snapshot();
            messenger
                .send_text(
                    incoming.chat_id,
                    format!(
                        "📊 Bot statistikasi:\n\
                        • Jami foydalanuvchilar: {}\n\
                        • Yuklab olishlar: {}",
                        stats.total_users, stats.total_downloads
                    ),
                )
                .await
        }
        Command::Admin => {
            if let Err(e) = require_admin(state, incoming) {
                return messenger.send_text(incoming.chat_id, e.to_string()).await;
            }

            let stats = state.stats.snapshot();
            messenger
                .send_text(
                    incoming.chat_id,
                    format!(
                        "👑 Admin statistikasi:\n\
                        • Faol foydalanuvchilar: {}\n\
                        • Jami yuklab olishlar: {}\n\n\
                        📢 Xabar yuborish: /broadcast <xabar>",
                        stats.active_users.len(),
                        stats.total_downloads
                    ),
                )
                .await
        }
        Command::Broadcast(text) => broadcast(state, messenger, bot_username, incoming, &text).await,
    }
}
