// Event Queue - Internally injected work
//
// The runtime loop consumes a single FIFO carrying both transport input
// and injected events, so ticks and shutdown interleave with inbound
// messages without starving either side.

use crate::wire::Envelope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// An event consumed by the runtime loop
#[derive(Debug)]
pub enum Event {
    /// An envelope arrived on the transport
    Message(Envelope),
    /// The periodic ticker fired (gossip due)
    Tick,
    /// End of input, or a fatal protocol violation
    Shutdown,
}

/// Spawn the background ticker
///
/// Posts `Event::Tick` at the given interval until the stop flag is
/// observed. Cooperative: a tick already being produced when the flag
/// flips may still be posted once more.
pub(crate) fn spawn_ticker(
    interval: Duration,
    stopped: Arc<AtomicBool>,
    events: mpsc::Sender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; skip it so the
        // first posted tick lands one full interval after startup.
        timer.tick().await;
        loop {
            timer.tick().await;
            if stopped.load(Ordering::Relaxed) {
                break;
            }
            if events.send(Event::Tick).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_ticker_posts_ticks_until_stopped() {
        let (tx, mut rx) = mpsc::channel(16);
        let stopped = Arc::new(AtomicBool::new(false));
        spawn_ticker(Duration::from_millis(10), stopped.clone(), tx);

        for _ in 0..3 {
            let event = timeout(Duration::from_millis(500), rx.recv())
                .await
                .expect("tick expected")
                .expect("queue open");
            assert!(matches!(event, Event::Tick));
        }

        stopped.store(true, Ordering::Relaxed);
        // Drain at most the one in-flight tick, then the queue goes quiet
        // (the ticker exits and drops its sender, or simply stops posting).
        let _ = timeout(Duration::from_millis(50), rx.recv()).await;
        let quiet = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(quiet, Err(_) | Ok(None)));
    }
}
