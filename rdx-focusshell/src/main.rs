use anyhow::{Context, Result};
use colored::Colorize;
use focusclock::format::progress_bar;
use focusclock::prelude::*;
use focusclock::session::DEFAULT_PRODUCTIVITY;
use focusclock::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-".repeat(79).dimmed());
    println!("{}", version_string);
    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    ";
    println!("{}", license_blurb.dimmed());
    println!("{}", "-".repeat(79).dimmed());
}

/// Spawns several tasks, each subscribing to a different event stream from the engine.
fn spawn_event_listeners(engine: &FocusclockEngine, is_watching_ticks: Arc<AtomicBool>) {
    let mut phase_rx = engine.subscribe_phase_events();
    tokio::spawn(async move {
        while let Ok(done) = phase_rx.recv().await {
            let next = match done.phase {
                Phase::Focus => "focus <x> <y> [productivity]",
                Phase::Break => "break <satisfaction> [activity]",
                Phase::Setup => "start",
            };
            println!(
                "\n<-- [{}] {} is over. Next: {}\n>> ",
                "PHASE".green().bold(),
                done.phase,
                next
            );
        }
    });

    let mut session_rx = engine.subscribe_session_events();
    tokio::spawn(async move {
        while let Ok(event) = session_rx.recv().await {
            match event {
                SessionEvent::Saved { record } => {
                    println!("\n<-- [SAVED] session {} stored\n>> ", record.id)
                }
                SessionEvent::SaveFailed { reason } => println!(
                    "\n<-- [{}] {} (type 'retry' to try again)\n>> ",
                    "NOT SAVED".red().bold(),
                    reason
                ),
                SessionEvent::Abandoned { at } => {
                    println!("\n<-- [ABANDONED] session dropped during {}\n>> ", at)
                }
                SessionEvent::StageChanged { .. } => {}
            }
        }
    });

    // Tick listener, controlled by the shared flag.
    let mut tick_rx = engine.subscribe_tick_events();
    tokio::spawn(async move {
        while let Ok(event) = tick_rx.recv().await {
            if is_watching_ticks.load(Ordering::Relaxed) && event.snapshot.time_left_seconds % 5 == 0 {
                println!(
                    "<-- [TICK] {} {} {}",
                    event.snapshot.phase,
                    event.snapshot.remaining_display(),
                    progress_bar(event.snapshot.progress(), 20)
                );
            }
        }
    });
}

fn print_status(stage: SessionStage, snapshot: &TimerSnapshot) {
    let state = match (snapshot.is_running, snapshot.is_paused) {
        (true, true) => "paused".yellow(),
        (true, false) => "running".green(),
        (false, _) => "stopped".dimmed(),
    };
    match stage.counting_phase() {
        Some(phase) => println!(
            "--> {} | {} {} {} [{}]",
            stage.to_string().cyan(),
            phase,
            snapshot.remaining_display().bold(),
            progress_bar(snapshot.progress(), 20),
            state
        ),
        None => println!("--> {} | waiting for input", stage.to_string().cyan()),
    }
}

fn report<T>(result: Result<T, FocusclockError>, on_ok: impl FnOnce(T)) {
    match result {
        Ok(value) => on_ok(value),
        Err(err) => println!("{} {}", "Error:".red().bold(), err),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("FOCUSCLOCK_CONFIG").ok())
        .map(PathBuf::from);
    let config = FocusclockConfig::load(config_path.as_deref())
        .context("failed to load focusclock configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let defaults = config.defaults;
    let engine = FocusclockEngine::from_config(config);

    let is_watching_ticks = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine, is_watching_ticks.clone());
    info!("{} ready", ENGINE_NAME);

    // The shell's notification handles.
    let mut active_listeners: HashMap<usize, ListenerId> = HashMap::new();
    let mut next_handle: usize = 0;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(MyHighlighter {}));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting focusshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();
        let Some(command) = args.first() else {
            continue;
        };

        match *command {
            "start" => {
                let total = args.get(1).map(|s| s.parse::<u32>());
                let focus = args.get(2).map(|s| s.parse::<u32>());
                let (total, focus) = match (total, focus) {
                    (None, _) => (defaults.total_session_minutes, defaults.focus_minutes),
                    (Some(Ok(total)), None) => (total, defaults.focus_minutes.min(total)),
                    (Some(Ok(total)), Some(Ok(focus))) => (total, focus),
                    _ => {
                        println!("Usage: start [TOTAL_MIN] [FOCUS_MIN]");
                        continue;
                    }
                };
                match TimerConfiguration::new(total, focus) {
                    Ok(session) => report(engine.start_session(session).await, |snap| {
                        println!(
                            "--> Session started: {} min focus, {} min break.",
                            session.focus_minutes(),
                            session.break_minutes()
                        );
                        print_status(SessionStage::Focus, &snap);
                    }),
                    Err(err) => println!("{} {}", "Error:".red().bold(), err),
                }
            }
            "pause" | "resume" => report(engine.pause_or_resume().await, |snap| {
                println!("--> {}", if snap.is_paused { "Paused." } else { "Resumed." });
            }),
            "reset" => report(engine.reset().await, |_| println!("--> Back to setup.")),
            "skip" => report(engine.skip_phase().await, |_| println!("--> Phase skipped.")),
            "restart" => report(engine.restart_phase().await, |snap| {
                println!("--> Restarted {} for {}.", snap.phase, snap.remaining_display());
            }),
            "status" => {
                let stage = engine.stage().await;
                print_status(stage, &engine.snapshot().await);
            }
            "focus" => {
                let parsed = (
                    args.get(1).and_then(|s| s.parse::<f64>().ok()),
                    args.get(2).and_then(|s| s.parse::<f64>().ok()),
                    args.get(3)
                        .map_or(Some(DEFAULT_PRODUCTIVITY), |s| s.parse::<u8>().ok()),
                );
                let (Some(x), Some(y), Some(productivity)) = parsed else {
                    println!("Usage: focus <MOOD_X 0..1> <MOOD_Y 0..1> [PRODUCTIVITY 1..10]");
                    continue;
                };
                match Mood::new(x, y) {
                    Ok(mood) => report(
                        engine.submit_focus_feedback(mood, productivity).await,
                        |snap| {
                            println!("--> Mood {} recorded.", mood.color());
                            if snap.is_running {
                                println!("--> Break started: {}.", snap.remaining_display());
                            }
                        },
                    ),
                    Err(err) => println!("{} {}", "Error:".red().bold(), err),
                }
            }
            "break" => {
                let Some(Ok(satisfaction)) = args.get(1).map(|s| s.parse::<i8>()) else {
                    println!("Usage: break <SATISFACTION -10..10> [ACTIVITY...]");
                    continue;
                };
                let activity = (args.len() > 2).then(|| args[2..].join(" "));
                report(
                    engine.submit_break_feedback(activity, satisfaction).await,
                    |record| {
                        println!(
                            "--> Session complete: {} min, productivity {}.",
                            record.session_minutes, record.prod_level
                        );
                    },
                );
            }
            "new" => report(engine.start_new_session().await, |_| {
                println!("--> Ready for a new session.")
            }),
            "retry" => report(engine.retry_save().await, |record| {
                println!("--> Saved session {}.", record.id)
            }),
            "task" => match (args.get(1).copied(), args.get(2).copied()) {
                (Some("add"), Some(task_id)) => {
                    report(engine.add_task_to_session(task_id).await, |added| {
                        if added {
                            println!("--> Task '{}' added to this session.", task_id);
                        } else {
                            println!("--> Task '{}' is already attached.", task_id);
                        }
                    })
                }
                (Some("remove"), Some(task_id)) => {
                    report(engine.remove_task_from_session(task_id).await, |removed| {
                        if removed {
                            println!("--> Task '{}' removed.", task_id);
                        } else {
                            println!("--> Task '{}' was not attached.", task_id);
                        }
                    })
                }
                (Some("time"), Some(task_id)) => {
                    let Some(Ok(minutes)) = args.get(3).map(|s| s.parse::<u64>()) else {
                        println!("Usage: task time <ID> <MINUTES>");
                        continue;
                    };
                    report(
                        engine.update_task_time(task_id, minutes * 60).await,
                        |()| println!("--> {} min logged on '{}'.", minutes, task_id),
                    )
                }
                (Some("list"), _) => {
                    let tasks = engine.session_tasks().await;
                    if tasks.is_empty() {
                        println!("No tasks attached to this session.");
                    }
                    for task in tasks {
                        println!("  {} ({} min)", task.task_id, task.task_seconds / 60);
                    }
                }
                _ => println!("Usage: task add <ID> | task remove <ID> | task time <ID> <MIN> | task list"),
            },
            "notify" => match (args.get(1).copied(), args.get(2).copied()) {
                (Some("add"), which) => {
                    let phase = match which {
                        Some("focus") => Some(Phase::Focus),
                        Some("break") => Some(Phase::Break),
                        None | Some("any") => None,
                        Some(other) => {
                            println!("Error: unknown phase '{}'.", other);
                            continue;
                        }
                    };
                    let handle = next_handle;
                    let id = engine
                        .on_phase_completed(
                            phase,
                            move |done| {
                                println!("\x07<-- [NOTIFY #{}] {} finished!", handle, done.phase)
                            },
                            false,
                        )
                        .await;
                    active_listeners.insert(handle, id);
                    next_handle += 1;
                    println!("--> Added notification with handle: #{}", handle);
                }
                (Some("remove"), Some(handle_str)) => match handle_str.parse::<usize>() {
                    Ok(handle) => match active_listeners.remove(&handle) {
                        Some(id) if engine.remove_listener(id).await => {
                            println!("--> Notification removed.")
                        }
                        Some(_) => println!("--> Error: Notification not found in engine."),
                        None => println!("Error: Invalid handle #{}.", handle),
                    },
                    Err(_) => println!("Error: Handle must be a number (e.g., '0', '1')."),
                },
                (Some("list"), _) => {
                    println!("Active notifications:");
                    for (handle, id) in &active_listeners {
                        println!("  Handle #{}: {:?}", handle, id);
                    }
                }
                _ => println!("Usage: notify add [focus|break|any] | notify remove <H> | notify list"),
            },
            "watch" => match args.get(1).copied() {
                Some("on") => {
                    is_watching_ticks.store(true, Ordering::Relaxed);
                    println!("--> Watching the countdown.");
                }
                Some("off") => {
                    is_watching_ticks.store(false, Ordering::Relaxed);
                    println!("--> Stopped watching the countdown.");
                }
                _ => println!("Usage: watch on|off"),
            },
            "help" => {
                println!("Available commands:");
                println!("  start [T] [F]          - Starts a T-minute session with F minutes of focus.");
                println!("  pause | resume         - Toggles the countdown.");
                println!("  skip                   - Ends the current phase now.");
                println!("  restart                - Runs the phase that just ended again.");
                println!("  reset                  - Abandons the session without saving.");
                println!("  status                 - Shows stage, time left and progress.");
                println!("  focus <X> <Y> [P]      - Mood (0..1, 0..1) and productivity (1..10, default 5) after focus.");
                println!("  break <S> [ACTIVITY]   - Break satisfaction (-10..10) and what you did.");
                println!("  new                    - Starts over after a finished session.");
                println!("  retry                  - Tries again to save the oldest session that failed to save.");
                println!("  task add|remove|time|list - Attributes tasks to the session in progress.");
                println!("  notify add|remove|list - Manages phase-completed notifications.");
                println!("  watch on|off           - Prints the countdown every 5 seconds.");
                println!("  exit                   - Quits the shell.");
            }
            "exit" => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line.trim()),
        }
    }

    engine.shutdown();
    Ok(())
}
