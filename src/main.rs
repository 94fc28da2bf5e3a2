//! kbqueue - stream per-key press/release scores from an input device
//!
//! Opens the configured (or default) device, then prints one JSON line per
//! non-empty check until interrupted.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use kbqueue::{
    config::Config,
    device::default_backend,
    report::CheckRecord,
    QueueController, QueueError,
};

fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config unreadable ({}), using defaults", e);
        Config::default()
    });

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
    }

    let backend = default_backend(&config.capture);
    let mut controller = QueueController::new(backend, config.queue.clone());

    for device in controller.devices()? {
        log::info!(
            "[{}] {:?} \"{}\"",
            device.handle.index(),
            device.category,
            device.name
        );
    }

    let handle = controller
        .create(config.session.device, config.session.keys.as_deref())
        .context("creating queue")?;
    controller.start(Some(handle.index())).context("starting capture")?;
    log::info!("capturing on {}, Ctrl-C to stop", handle);

    let interval = config.session.check_interval();
    let mut total_presses: u64 = 0;

    while running.load(Ordering::SeqCst) {
        thread::sleep(interval);
        match controller.check(Some(handle.index())) {
            Ok(report) if report.is_empty() && !report.overflowed => {}
            Ok(report) => {
                total_presses += report
                    .keys
                    .values()
                    .map(|s| u64::from(s.press_count))
                    .sum::<u64>();
                println!("{}", CheckRecord::from(&report).to_json_line()?);
            }
            Err(e @ QueueError::DeviceError { .. }) => {
                log::error!("{}", e);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Err(e) = controller.release(Some(handle.index())) {
        log::warn!("release: {}", e);
    }

    eprintln!("\nkbqueue session complete.");
    eprintln!("Total presses scored: {}", total_presses);

    Ok(())
}
