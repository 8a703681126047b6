use combat_rumble::config::Config;
use combat_rumble::{sink, Bridge, RumbleEngine, Scheduler, SharedClock};

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("combat-rumble v{} starting...", env!("CARGO_PKG_VERSION"));

    let cfg = Config::load();
    let table = cfg.channels.to_table();

    // Host-driven clock: starts at the configured frame rate, updated by frame_time messages.
    let clock = Arc::new(SharedClock::from_frame_rate(cfg.scheduler.frame_rate_hz));
    let output = sink::connect(cfg.device.enabled);
    let engine = Arc::new(RumbleEngine::new(table, clock.clone(), output));

    let mut scheduler = match Scheduler::start(Arc::clone(&engine), cfg.scheduler.fallback_cadence()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to spawn rumble scheduler thread: {e}");
            std::process::exit(1);
        }
    };

    let bridge = Bridge::new(engine, clock);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut bad_lines = 0u32;

    log::info!("Reading host messages from stdin (one JSON object per line)");
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Err(e) = bridge.handle_line(&line) {
                        bad_lines += 1;
                        if bad_lines % 100 == 1 {
                            log::warn!("Skipping host message ({bad_lines} so far): {e}");
                        }
                    }
                }
                Ok(None) => {
                    log::info!("Host closed stdin");
                    break;
                }
                Err(e) => {
                    log::error!("Failed to read stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    // Join blocks; keep it off the async workers.
    tokio::task::block_in_place(|| scheduler.stop());
    log::info!("combat-rumble stopped");
}
