use dotenvy::dotenv;
use faceswap_bot::bot::handlers::{self, Command, SwapDialogue};
use faceswap_bot::bot::{State, TelegramNotifier};
use faceswap_bot::config::Settings;
use faceswap_bot::jobs::{
    job_queue, JobQueue, JobRunner, JobStore, Notify, PgJobStore, StoreError, TransformConfig,
};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    init_logging();

    info!("Starting Face Swap TG Bot...");

    // Load settings
    let settings = init_settings();

    // Connect to the store and make sure the schema exists
    let store = init_store(&settings).await;

    // Queue pair: producers go to the dispatcher, the feed to the runner
    let (queue, feed) = job_queue();

    // Jobs that were queued but never started before the last shutdown
    if let Err(e) = recover_pending_jobs(store.as_ref(), &queue).await {
        error!("Failed to load pending tasks: {}", e);
        std::process::exit(1);
    }

    // Initialize Bot
    let bot = Bot::new(settings.telegram_token.clone());

    // Single sequential consumer
    let notifier: Arc<dyn Notify> = Arc::new(TelegramNotifier::new(bot.clone()));
    let transform = TransformConfig::from_settings(&settings);
    let runner = JobRunner::new(store.clone(), notifier, transform, feed);
    tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            error!("Job runner terminated: {}", e);
        }
    });

    // Initialize bot state
    let bot_state = init_bot_state();

    // Setup handlers
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![store, queue, settings, bot_state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_store(settings: &Settings) -> Arc<dyn JobStore> {
    match PgJobStore::connect(&settings.database_url).await {
        Ok(store) => {
            if let Err(e) = store.ensure_schema().await {
                error!("Failed to ensure database schema: {}", e);
                std::process::exit(1);
            }
            info!("Job store initialized.");
            Arc::new(store)
        }
        Err(e) => {
            error!("Failed to connect to the database: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_bot_state() -> Arc<InMemStorage<State>> {
    InMemStorage::<State>::new()
}

async fn recover_pending_jobs(store: &dyn JobStore, queue: &JobQueue) -> Result<(), StoreError> {
    info!("Loading pending tasks");
    for job in store.pending_jobs().await? {
        info!(task_id = %job.task_id, user_id = job.user_id, "Loaded pending task");
        queue.enqueue(job);
    }
    info!("All pending tasks were loaded. {} tasks in queue", queue.len());
    Ok(())
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().branch(
        Update::filter_message()
            .enter_dialogue::<Message, InMemStorage<State>, State>()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            )
            .branch(dptree::case![State::AwaitingFirstInput].endpoint(handle_first_input))
            .branch(
                dptree::case![State::AwaitingSecondInput { source_path }]
                    .endpoint(handle_second_input),
            ),
    )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    store: Arc<dyn JobStore>,
    settings: Arc<Settings>,
    dialogue: SwapDialogue,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg, store, settings, dialogue).await,
        Command::Help => handlers::help(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_first_input(
    bot: Bot,
    msg: Message,
    settings: Arc<Settings>,
    dialogue: SwapDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::receive_first_input(bot, msg, settings, dialogue).await {
        error!("First input handler error: {}", e);
    }
    respond(())
}

async fn handle_second_input(
    bot: Bot,
    msg: Message,
    source_path: String,
    store: Arc<dyn JobStore>,
    queue: JobQueue,
    settings: Arc<Settings>,
    dialogue: SwapDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::receive_second_input(
        bot, msg, source_path, store, queue, settings, dialogue,
    )
    .await
    {
        error!("Second input handler error: {}", e);
    }
    respond(())
}
