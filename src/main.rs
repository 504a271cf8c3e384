use std::sync::Arc;

use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::{info, warn};

use lunchvote::bot::PollBot;
use lunchvote::classifier::Classifier;
use lunchvote::config::Config;
use lunchvote::poll::{Announcements, VoteSession};
use lunchvote::schedule::Scheduler;
use lunchvote::telegram::{to_inbound, TelegramClient};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let _guard = match lunchvote::logging::init(config.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            std::process::exit(1);
        }
    };

    info!("🚀 Starting lunchvote...");
    let daily = &config.schedule;
    info!(
        "Open {}, remind {}, lunch {} on {:?} ({} clock)",
        daily.open_time.format("%H:%M"),
        daily.remind_time().format("%H:%M"),
        daily.close_time.format("%H:%M"),
        daily.weekdays,
        config.clock
    );
    info!("Reset policy: {:?}, max delay {} (not enforced)", config.reset_policy, config.max_delay);

    let scheduler = match Scheduler::new(daily, config.clock) {
        Ok(s) => s.with_catch_up_delay(config.catch_up_delay),
        Err(e) => {
            eprintln!("Invalid schedule: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    match config.chat_id {
        Some(chat_id) => {
            info!("Authorized chat: {}", chat_id);
            TelegramClient::new(bot.clone()).spawn_sender(chat_id, outbox_rx);
        }
        None => {
            warn!("LUNCH_VOTING_BOT_CHAT_ID is not set: all messages ignored, announcements dropped");
            drop(outbox_rx);
        }
    }

    let session = VoteSession::new(
        Announcements::new(daily.close_time, daily.remind_lead_minutes),
        config.reset_policy,
    );
    let classifier = Classifier::new(config.chat_id, config.max_delay);
    let state = Arc::new(PollBot::new(session, classifier, outbox_tx));

    let (phase_tx, phase_rx) = mpsc::unbounded_channel();
    state.clone().spawn_phase_listener(phase_rx);
    scheduler.spawn(phase_tx);

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .error_handler(LoggingErrorHandler::with_custom_text("An error from the update listener"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, state: Arc<PollBot>) -> ResponseResult<()> {
    if let Some(inbound) = to_inbound(&msg) {
        state.handle_message(&inbound).await;
    }
    Ok(())
}
