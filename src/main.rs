//! Headless console shell: reads lines from stdin as chat turns and logs
//! client commands instead of driving a viewport.

use hikari_engine::chat::LoggingDispatcher;
use hikari_engine::config::{data_dir, load_json_config, EngineConfig};
use hikari_engine::reaction::PhygitalPoller;
use hikari_engine::speech::NullSink;
use hikari_engine::Engine;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config: EngineConfig = load_json_config(&data_dir().join("engine_config.json"), "Engine");
    let mut engine = Engine::new(&config, Arc::new(LoggingDispatcher), Box::new(NullSink));

    let poller = PhygitalPoller::new();
    if config.phygital.enabled {
        poller.start(
            config.phygital.clone(),
            engine.speaker.clone(),
            engine.theme.clone(),
        );
    }

    tracing::info!("[Engine] Ready — type a message, Ctrl-D to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("[Engine] stdin read failed: {}", e);
                break;
            }
        };

        engine.session.run_turn(&line).await;
        if let Some(reply) = engine
            .session
            .transcript()
            .iter()
            .rev()
            .find(|m| m.role == hikari_engine::chat::Role::Assistant)
        {
            println!("{}", reply.content);
        }

        // One frame, mostly so headless runs exercise the controller path.
        let frame = engine.tick(1.0 / 60.0);
        tracing::debug!(
            "[Avatar] motion={:?} mood={} sleeping={}",
            frame.motion,
            engine.avatar.mood().name(),
            frame.sleeping
        );
    }

    poller.stop();
}
