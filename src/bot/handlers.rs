//! Conversation handlers for the submission wizard
//!
//! The wizard collects exactly two media inputs per submission: the source
//! face image, then the target image or video. Once both pass the intake
//! policy a job row is written, the usage counter bumped, and the job
//! handed to the in-memory queue.

use crate::bot::state::State;
use crate::config::{Settings, USAGE_QUOTA};
use crate::jobs::{JobQueue, JobStore, QueuedJob};
use crate::media::{self, probe, AttachmentMeta, MediaKind};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teloxide::{
    dispatching::dialogue::InMemStorage,
    net::Download,
    prelude::*,
    types::{ChatId, FileId},
    utils::command::BotCommands,
};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Begin a new submission
    #[command(description = "Start a new face swap.")]
    Start,
    /// Short usage description
    #[command(description = "Show what this bot does.")]
    Help,
}

/// Dialogue handle for the wizard state
pub type SwapDialogue = Dialogue<State, InMemStorage<State>>;

const FIRST_PROMPT: &str =
    "Please send the 1st photo with face (this face will be in the result image):";
const SECOND_PROMPT: &str =
    "Got it! Now, please send the 2nd photo with face (this face will be replaced in the final photo):";
const PROCESSING_TEXT: &str = "Processing your result...\nThis may take a while";
const QUOTA_TEXT: &str = "You have used the bot 5 times. Buy a subscription to continue.";
const HELP_TEXT: &str =
    "Send /start, then two media files: the face to keep, and the photo or video to put it into.";

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn user_handle(msg: &Message) -> Option<String> {
    msg.from.as_ref().and_then(|u| u.username.clone())
}

fn user_workdir(settings: &Settings, chat_id: ChatId) -> PathBuf {
    Path::new(&settings.user_dir).join(chat_id.0.to_string())
}

fn result_filename(usage_count: i64, target_kind: MediaKind) -> String {
    format!(
        "result_{}.{}",
        usage_count + 1,
        target_kind.canonical_extension()
    )
}

/// Update the dialogue, logging any move the wizard table does not allow.
async fn move_state(dialogue: &SwapDialogue, next: State) -> Result<()> {
    let current = dialogue
        .get()
        .await
        .map_err(|e| anyhow!(e.to_string()))?
        .unwrap_or_default();
    if !current.can_transition_to(&next) {
        warn!(?current, ?next, "Transition outside the wizard table");
    }
    dialogue
        .update(next)
        .await
        .map_err(|e| anyhow!(e.to_string()))
}

/// Returns the current usage count, or `None` when the user is over quota.
/// The denial message has already been sent in the `None` case.
async fn check_quota(bot: &Bot, msg: &Message, store: &dyn JobStore) -> Result<Option<i64>> {
    let user_id = get_user_id_safe(msg);
    let usage = store.usage_count(user_id).await?;
    if usage >= USAGE_QUOTA {
        info!(user_id, usage, "Submission denied by quota");
        bot.send_message(msg.chat.id, QUOTA_TEXT).await?;
        return Ok(None);
    }
    Ok(Some(usage))
}

async fn download_attachment(bot: &Bot, meta: &AttachmentMeta, dest: &Path) -> Result<()> {
    let file = bot.get_file(FileId(meta.file_id.clone())).await?;
    let mut dst = tokio::fs::File::create(dest).await?;
    bot.download_file(&file.path, &mut dst).await?;
    dst.flush().await?;
    Ok(())
}

/// `/start`: register the user, check the quota, prompt for the first input.
///
/// # Errors
///
/// Returns an error on store or Telegram API failures.
pub async fn start(
    bot: Bot,
    msg: Message,
    store: Arc<dyn JobStore>,
    settings: Arc<Settings>,
    dialogue: SwapDialogue,
) -> Result<()> {
    info!("/start command received from {}", msg.chat.id);
    let workdir = user_workdir(&settings, msg.chat.id);
    tokio::fs::create_dir_all(&workdir).await?;

    let user_id = get_user_id_safe(&msg);
    store
        .register_user_if_absent(user_id, user_handle(&msg))
        .await?;

    if check_quota(&bot, &msg, store.as_ref()).await?.is_none() {
        return move_state(&dialogue, State::Idle).await;
    }

    bot.send_message(msg.chat.id, FIRST_PROMPT).await?;
    move_state(&dialogue, State::AwaitingFirstInput).await
}

/// `/help`
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, HELP_TEXT).await?;
    Ok(())
}

/// First wizard step: the source face image.
///
/// Rejections re-prompt and leave the state unchanged.
///
/// # Errors
///
/// Returns an error on download, filesystem, or Telegram API failures.
pub async fn receive_first_input(
    bot: Bot,
    msg: Message,
    settings: Arc<Settings>,
    dialogue: SwapDialogue,
) -> Result<()> {
    let meta = media::classify_message(&msg);
    if let Err(rejection) = media::check_first_input(&meta) {
        bot.send_message(msg.chat.id, rejection.to_string()).await?;
        return Ok(());
    }

    let workdir = user_workdir(&settings, msg.chat.id);
    tokio::fs::create_dir_all(&workdir).await?;
    let dest = media::artifact_path(&workdir, &meta);
    download_attachment(&bot, &meta, &dest).await?;
    info!("Got 1st input from {}, saved to {}", msg.chat.id, dest.display());

    bot.send_message(msg.chat.id, SECOND_PROMPT).await?;
    move_state(
        &dialogue,
        State::AwaitingSecondInput {
            source_path: dest.to_string_lossy().into_owned(),
        },
    )
    .await
}

/// Second wizard step: the target image or video. On acceptance the job is
/// persisted, counted, and queued.
///
/// Unsupported types abort the submission; oversize and over-duration
/// inputs re-prompt.
///
/// # Errors
///
/// Returns an error on download, probe, store, or Telegram API failures.
pub async fn receive_second_input(
    bot: Bot,
    msg: Message,
    source_path: String,
    store: Arc<dyn JobStore>,
    queue: JobQueue,
    settings: Arc<Settings>,
    dialogue: SwapDialogue,
) -> Result<()> {
    let meta = media::classify_message(&msg);
    if let Err(rejection) = media::check_second_input(&meta) {
        bot.send_message(msg.chat.id, rejection.to_string()).await?;
        if rejection.aborts_session() {
            return move_state(&dialogue, State::Idle).await;
        }
        return Ok(());
    }

    let workdir = user_workdir(&settings, msg.chat.id);
    tokio::fs::create_dir_all(&workdir).await?;
    let target = media::artifact_path(&workdir, &meta);
    download_attachment(&bot, &meta, &target).await?;
    info!("Got 2nd input from {}, saved to {}", msg.chat.id, target.display());

    if meta.kind.is_video() {
        let duration = probe::video_duration_secs(&settings.ffprobe_bin, &target).await?;
        if let Err(rejection) = media::check_video_duration(duration) {
            bot.send_message(msg.chat.id, rejection.to_string()).await?;
            return Ok(());
        }
    }

    // The quota check and the usage increment below are separate
    // statements; concurrent submissions from one user can race past the
    // quota.
    let user_id = get_user_id_safe(&msg);
    let Some(usage) = check_quota(&bot, &msg, store.as_ref()).await? else {
        return move_state(&dialogue, State::Idle).await;
    };

    let target_path = target.to_string_lossy().into_owned();
    let result_path = workdir
        .join(result_filename(usage, meta.kind))
        .to_string_lossy()
        .into_owned();

    let task_id = store
        .create_job(user_id, &source_path, &target_path, &result_path)
        .await?;
    store.increment_usage(user_id).await?;
    info!(task_id = %task_id, user_id, "Task created");

    bot.send_message(msg.chat.id, PROCESSING_TEXT).await?;
    queue.enqueue(QueuedJob {
        task_id,
        user_id,
        source_path,
        target_path,
        result_path,
    });

    move_state(&dialogue, State::Idle).await
}
