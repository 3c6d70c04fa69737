//! Run the scheduling engine against a task snapshot.
//!
//! Feeds the snapshot to a [`SchedulingEngine`] with the wall clock,
//! re-schedules periodically so tasks beyond the look-ahead window get
//! picked up, and prints every notification the in-app channel receives.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use taskbell_core::{
    EngineConfig, InAppSink, Notification, NotificationSettings, SchedulingEngine, SystemClock,
    TaskInput,
};

/// How often the watch loop re-feeds the snapshot to the engine. Well under
/// the look-ahead window, well over the admission cooldown.
const RESCHEDULE_SECS: u64 = 300;

#[derive(Debug, Default, Deserialize)]
struct WatchConfig {
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    notifications: NotificationSettings,
}

pub fn run(
    file: &Path,
    config_path: Option<&Path>,
    duration_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(file)?;
    let inputs: Vec<TaskInput> = serde_json::from_str(&raw)?;
    let config: WatchConfig = match config_path {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => WatchConfig::default(),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (sink, mut rx) = InAppSink::channel();
        let engine = SchedulingEngine::new(
            config.engine,
            config.notifications,
            Arc::new(SystemClock),
            vec![sink],
        );

        let outcome = engine.schedule(&inputs, Utc::now());
        println!("schedule: {outcome:?}");

        let watch = async {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(RESCHEDULE_SECS));
            interval.tick().await; // initial pass already done above
            loop {
                tokio::select! {
                    note = rx.recv() => match note {
                        Some(note) => print_notification(&note),
                        None => break,
                    },
                    _ = interval.tick() => {
                        let _ = engine.schedule(&inputs, Utc::now());
                    }
                }
            }
        };

        match duration_secs {
            Some(secs) => {
                let _ = tokio::time::timeout(std::time::Duration::from_secs(secs), watch).await;
            }
            None => watch.await,
        }
    });
    Ok(())
}

fn print_notification(note: &Notification) {
    if note.cue.is_some() {
        // Terminal bell stands in for the audio channel.
        print!("\x07");
    }
    println!(
        "[{}] {:?} {} -- {}",
        note.timestamp.format("%H:%M:%S"),
        note.priority,
        note.title,
        note.body
    );
    for action in &note.actions {
        println!("         [{}]", action.label);
    }
}
