use anyhow::{Context, Result};
use focusclock::prelude::*;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Ticks per real second when the configuration asks for real time.
const DEMO_SPEEDUP: u32 = 120;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load the configuration. An optional TOML path may be given as the first argument.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = FocusclockConfig::load(config_path.as_deref())
        .context("failed to load focusclock configuration")?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with_target(false)
        .init();

    // 3. A demo nobody wants to watch for half an hour.
    if config.resolution == TickResolution::Realtime {
        config.resolution = TickResolution::Accelerated {
            factor: DEMO_SPEEDUP,
        };
    }
    if config.user_id.is_none() {
        config.user_id = Some("focusdev".to_string());
    }
    let session = config.defaults.to_configuration()?;

    // 4. Create the engine and attach listeners before anything starts.
    let engine = FocusclockEngine::from_config(config);
    spawn_event_listeners(&engine);
    engine
        .on_phase_completed(
            Some(Phase::Focus),
            |done| info!("[WATCHER] Focus block of {}s done. Time to stretch.", done.duration_seconds),
            true,
        )
        .await;

    // 5. Drive one scripted session from start to finish.
    let mut phases = engine.subscribe_phase_events();
    info!(
        "Starting a {} min session ({} focus / {} break)",
        session.total_session_minutes(),
        session.focus_minutes(),
        session.break_minutes()
    );
    engine.start_session(session).await?;
    engine.add_task_to_session("reading").await?;

    while let Ok(done) = phases.recv().await {
        match done.phase {
            Phase::Focus => {
                let mood = Mood::new(0.7, 0.6)?;
                info!("[FEEDBACK] mood {} / productivity 7", mood.color());
                let snapshot = engine.submit_focus_feedback(mood, 7).await?;
                if !snapshot.is_running {
                    // No break time in this configuration.
                    break;
                }
            }
            Phase::Break => break,
            Phase::Setup => {}
        }
    }

    match engine
        .submit_break_feedback(Some("walk".to_string()), 0)
        .await
    {
        Ok(record) => info!("[SAVED] {}", serde_json::to_string(&record)?),
        Err(err) => {
            warn!("Session ended but was not saved: {}", err);
            if let Some(draft) = engine.pending_record().await {
                info!("[PENDING] {:?}", draft.feedback);
            }
        }
    }

    engine.start_new_session().await?;
    engine.shutdown();
    Ok(())
}

/// Spawns several tasks, each subscribing to a different event stream from the engine.
fn spawn_event_listeners(engine: &FocusclockEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut session_rx = engine.subscribe_session_events();
    tokio::spawn(async move {
        while let Ok(event) = session_rx.recv().await {
            info!("[SESSION] => {:?}", event);
        }
    });

    // Logs once per timer minute to avoid spam.
    let mut tick_rx = engine.subscribe_tick_events();
    tokio::spawn(async move {
        while let Ok(event) = tick_rx.recv().await {
            if event.snapshot.time_left_seconds % 60 == 0 {
                info!(
                    "[TICK] {} {} left",
                    event.snapshot.phase,
                    event.snapshot.remaining_display()
                );
            }
        }
    });
}
