//! Scripted call: drives a full conversation on the console without audio.
//!
//! A script posts recognition results the way a continuous recognizer would;
//! the placeholder synthesizer logs replies instead of playing them. Set
//! `PARLEY_CHAT_URL` in `.env` to answer through a chat API instead of echo.
//!
//! ```sh
//! RUST_LOG=info,parley_voice=debug cargo run -p parley-voice --example scripted_call
//! ```

use parley_voice::{
    CoordinatorNotice, EchoBackend, EventBus, HttpChatBackend, PlaceholderRecognizer,
    PlaceholderSynthesizer, RecognitionResult, ResponseBackend, TurnCoordinator, VoiceConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("📞 Parley scripted call");

    let mut config = VoiceConfig::from_env();
    // Keep the demo short.
    config.call_silence_ms = config.call_silence_ms.min(1200);

    let backend: Arc<dyn ResponseBackend> = match &config.chat_url {
        Some(url) => {
            info!("Backend: chat API at {}", url);
            Arc::new(HttpChatBackend::new(url.clone())?)
        }
        None => {
            info!("Backend: echo (set PARLEY_CHAT_URL for a real chat API)");
            Arc::new(EchoBackend)
        }
    };

    let bus = EventBus::new();
    let engine_events = bus.events();
    let recognizer = PlaceholderRecognizer::new(bus.events());
    let synthesizer =
        PlaceholderSynthesizer::new(bus.events()).with_per_char(Duration::from_millis(30));

    let (coordinator, handle) = TurnCoordinator::new(
        config,
        bus,
        Box::new(recognizer),
        Box::new(synthesizer),
        backend,
    )?;
    let mut notices = handle.subscribe();
    let coordinator_task = tokio::spawn(coordinator.run());

    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice {
                CoordinatorNotice::Committed { text, at } => {
                    info!("👤 [{}] {}", at.format("%H:%M:%S"), text)
                }
                CoordinatorNotice::Reply(text) => info!("🤖 {}", text),
                CoordinatorNotice::Interrupted => info!("✋ interrupted"),
                CoordinatorNotice::Recoverable(e) | CoordinatorNotice::BackendFailed(e) => {
                    warn!("⚠️ {}", e)
                }
                CoordinatorNotice::LiveTranscript(_) => {}
            }
        }
    });

    handle.start_call()?;
    tokio::time::sleep(Duration::from_millis(700)).await;

    // Turn 1: two final fragments, then silence.
    engine_events.recognition_result(0, vec![RecognitionResult::interim("oi")]);
    engine_events.recognition_result(0, vec![RecognitionResult::finalized("oi")]);
    tokio::time::sleep(Duration::from_millis(300)).await;
    engine_events.recognition_result(
        1,
        vec![
            RecognitionResult::finalized("oi"),
            RecognitionResult::finalized("tudo bem?"),
        ],
    );
    tokio::time::sleep(Duration::from_millis(1500)).await;
    info!("state: {:?}", handle.snapshot());

    // Turn 2: talk over the reply while it is still playing.
    tokio::time::sleep(Duration::from_millis(200)).await;
    engine_events.recognition_result(0, vec![RecognitionResult::interim("espera")]);
    engine_events.recognition_result(0, vec![RecognitionResult::finalized("espera, outra coisa")]);
    tokio::time::sleep(Duration::from_millis(3500)).await;

    handle.toggle_mute()?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    info!("muted: {:?}", handle.snapshot());

    handle.end_call()?;
    handle.shutdown()?;
    coordinator_task.await?;
    info!("✅ Done");
    Ok(())
}
