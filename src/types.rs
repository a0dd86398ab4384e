use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{ChatId, Message};

use crate::admin::AdminList;
use crate::download::DownloadAgent;
use crate::stats::StatsStore;

pub type HandlerResult = anyhow::Result<()>;

/// Everything the handlers share, injected into the dispatcher once.
pub struct AppState {
    pub stats: Arc<StatsStore>,
    pub admins: AdminList,
    pub agent: DownloadAgent,
    pub broadcast_delay: Duration,
}

/// The parts of an inbound text message the handlers look at.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub chat_id: ChatId,
    pub user_id: String,
    pub first_name: String,
    pub text: String,
}

impl Incoming {
    pub fn from_message(msg: &Message) -> Option<Incoming> {
        let from = msg.from.as_ref()?;
        let text = msg.text()?;

        Some(Incoming {
            chat_id: msg.chat.id,
            user_id: from.id.to_string(),
            first_name: from.first_name.clone(),
            text: text.to_string(),
        })
    }
}
