//! Live/paper trading loop.
//!
//! Ticks the strategy against a real broker every `interval`. Cancellation
//! is cooperative: the stop flag is checked between ticks and while
//! sleeping, never in the middle of a tick. `stop_on_ctrl_c` hands out a
//! flag wired to the interrupt signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sentitrade_core::broker::Broker;
use sentitrade_core::news::NewsSource;
use sentitrade_core::{SentimentStrategy, TickError, TickReport};

use crate::config::LiveSection;

/// Longest uninterrupted sleep between stop-flag checks.
const STOP_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOptions {
    pub interval: Duration,
    pub max_ticks: Option<u64>,
}

impl LiveOptions {
    pub fn from_section(section: &LiveSection) -> Self {
        Self {
            interval: Duration::from_secs(section.interval_hours.saturating_mul(3600)),
            max_ticks: section.max_ticks,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveSummary {
    pub ticks: u64,
    pub failed: u64,
    pub submitted: u64,
}

/// A stop flag that Ctrl-C sets.
///
/// Installs a process-wide handler; a second call fails with
/// `ctrlc::Error::MultipleHandlers`.
pub fn stop_on_ctrl_c() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, stopping after the current tick");
        flag.store(true, Ordering::SeqCst);
    })?;
    Ok(stop)
}

/// Run until `stop` is set or `max_ticks` ticks have completed.
///
/// `on_tick` sees every tick outcome, successful or not. A failed tick never
/// ends the session.
pub fn run_live<B, F>(
    strategy: &mut SentimentStrategy,
    broker: &mut B,
    news: &dyn NewsSource,
    options: LiveOptions,
    stop: &AtomicBool,
    mut on_tick: F,
) -> LiveSummary
where
    B: Broker + ?Sized,
    F: FnMut(&Result<TickReport, TickError>),
{
    let mut summary = LiveSummary::default();
    tracing::info!(
        symbol = %strategy.symbol(),
        interval_secs = options.interval.as_secs(),
        max_ticks = ?options.max_ticks,
        "live session started"
    );

    while !stop.load(Ordering::Relaxed) {
        let outcome = strategy.on_tick(broker, news);
        summary.ticks += 1;
        match &outcome {
            Ok(report) if report.submitted().is_some() => summary.submitted += 1,
            Ok(_) => {}
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(symbol = %strategy.symbol(), error = %e, "tick failed");
            }
        }
        on_tick(&outcome);

        if options.max_ticks.is_some_and(|max| summary.ticks >= max) {
            break;
        }
        sleep_unless_stopped(options.interval, stop);
    }

    tracing::info!(
        ticks = summary.ticks,
        failed = summary.failed,
        submitted = summary.submitted,
        last_trade = %strategy.state().last_trade,
        "live session ended"
    );
    summary
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(STOP_POLL));
    }
}
