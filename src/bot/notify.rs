//! Telegram outcome delivery
//!
//! Implements the runner's [`Notify`] seam. Delivery failures are logged
//! and swallowed: the job's terminal state is already persisted by the time
//! anything here runs, and the platform connection is allowed to flake.

use crate::jobs::Notify;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};
use tracing::error;

const SUCCESS_TEXT: &str = "Here's your result! /start to try again.";

/// [`Notify`] implementation speaking the Telegram Bot API
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn is_video_artifact(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "mp4")
}

#[async_trait]
impl Notify for TelegramNotifier {
    async fn job_succeeded(&self, user_id: i64, result_path: &Path) {
        let chat_id = ChatId(user_id);
        let artifact = InputFile::file(result_path.to_path_buf());

        let sent = if is_video_artifact(result_path) {
            self.bot.send_video(chat_id, artifact).await.map(drop)
        } else {
            self.bot.send_photo(chat_id, artifact).await.map(drop)
        };
        if let Err(e) = sent {
            error!(user_id, error = %e, "Failed to deliver result artifact");
            return;
        }

        if let Err(e) = self.bot.send_message(chat_id, SUCCESS_TEXT).await {
            error!(user_id, error = %e, "Failed to send success notice");
        }
    }

    async fn job_failed(&self, user_id: i64, error: &str) {
        let text = format!("Error: {error}\n/start to try again.");
        if let Err(e) = self.bot.send_message(ChatId(user_id), text).await {
            error!(user_id, error = %e, "Failed to send failure notice");
        }
    }
}
