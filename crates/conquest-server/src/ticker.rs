//! Background decay and reaping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::service::GameService;

/// Run [`GameService::maintain`] every `period` until `shutdown` turns true or its sender
/// goes away.
///
/// The ticker is an ordinary writer: it takes each session's lock with the same timeout as
/// player actions and skips sessions it cannot get in time.
pub fn spawn_ticker(
    service: Arc<GameService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick fires immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let summary = service.maintain(Instant::now()).await;
                    debug!(
                        decayed = summary.decayed,
                        reaped = summary.reaped,
                        busy = summary.busy,
                        sessions = service.session_count(),
                        "tick"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("ticker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use conquest_core::{load_map, MapSource};

    #[tokio::test]
    async fn stops_on_shutdown() {
        let map = Arc::new(load_map(MapSource::Embedded).unwrap());
        let service = Arc::new(GameService::new(&ServerConfig::default(), map));
        let (tx, rx) = watch::channel(false);

        let task = spawn_ticker(service, Duration::from_millis(10), rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("ticker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn stops_when_sender_dropped() {
        let map = Arc::new(load_map(MapSource::Embedded).unwrap());
        let service = Arc::new(GameService::new(&ServerConfig::default(), map));
        let (tx, rx) = watch::channel(false);

        let task = spawn_ticker(service, Duration::from_secs(60), rx);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("ticker did not stop")
            .unwrap();
    }
}
