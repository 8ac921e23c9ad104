use crate::config::MetricSource;
use crate::relay::Relay;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Fires a relay for every metric source on every tick of a fixed interval.
///
/// The first tick happens one full interval after the scheduler starts. Relays
/// are spawned as independent tasks: the scheduler never waits for them, and a
/// slow source may have several relays in flight at once. The tasks are kept
/// in a [`JoinSet`] so that they are reaped once finished and aborted when the
/// scheduler stops.
pub struct Scheduler<R> {
    interval: Duration,
    sources: Vec<Arc<MetricSource>>,
    relay: Arc<R>,
}

impl<R: Relay> Scheduler<R> {
    /// Create a scheduler. `interval` must be greater than zero.
    pub fn new(interval: Duration, sources: Vec<MetricSource>, relay: R) -> Self {
        Self {
            interval,
            sources: sources.into_iter().map(Arc::new).collect(),
            relay: Arc::new(relay),
        }
    }

    /// Run until `shutdown` completes. Relays that are still in flight at that
    /// point are aborted.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        info!(
            interval = %humantime::format_duration(self.interval),
            sources = self.sources.len(),
            "Scheduler started"
        );

        loop {
            select! {
                biased;

                _ = &mut shutdown => break,

                _ = ticker.tick() => self.dispatch(&mut tasks),

                Some(result) = tasks.join_next() => {
                    if let Err(err) = result {
                        if err.is_panic() {
                            error!(?err, "Relay task panicked");
                        }
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "Scheduler stopped, aborting in-flight relays");
        tasks.shutdown().await;
    }

    fn dispatch(&self, tasks: &mut JoinSet<()>) {
        debug!(sources = self.sources.len(), in_flight = tasks.len(), "Tick");

        for source in &self.sources {
            let relay = Arc::clone(&self.relay);
            let source = Arc::clone(source);
            tasks.spawn(async move { relay.relay(&source).await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    #[derive(Clone, Default)]
    struct RecordingRelay {
        started: Arc<Mutex<HashMap<String, usize>>>,
        finished: Arc<Mutex<HashMap<String, usize>>>,
        delay: Option<Duration>,
        panic_on: Option<&'static str>,
    }

    impl RecordingRelay {
        fn started(&self, name: &str) -> usize {
            self.started.lock().unwrap().get(name).copied().unwrap_or(0)
        }

        fn finished(&self, name: &str) -> usize {
            self.finished.lock().unwrap().get(name).copied().unwrap_or(0)
        }

        fn total_started(&self) -> usize {
            self.started.lock().unwrap().values().sum()
        }
    }

    impl Relay for RecordingRelay {
        async fn relay(&self, source: &MetricSource) {
            *self
                .started
                .lock()
                .unwrap()
                .entry(source.name.clone())
                .or_default() += 1;

            if self.panic_on == Some(source.name.as_str()) {
                panic!("relay for {} exploded", source.name);
            }

            if let Some(delay) = self.delay {
                time::sleep(delay).await;
            }

            *self
                .finished
                .lock()
                .unwrap()
                .entry(source.name.clone())
                .or_default() += 1;
        }
    }

    fn sources(names: &[&str]) -> Vec<MetricSource> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let url = Url::parse(&format!("http://localhost:{}/metrics", 9100 + i)).unwrap();
                MetricSource::new(*name, url)
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn relays_every_source_on_every_tick() {
        let relay = RecordingRelay::default();
        let scheduler = Scheduler::new(
            Duration::from_secs(5),
            sources(&["node", "app", "db"]),
            relay.clone(),
        );

        // Ticks at 5s, 10s, 15s and 20s.
        scheduler
            .run_until(time::sleep(Duration::from_secs(22)))
            .await;

        assert_eq!(relay.total_started(), 4 * 3);
        for name in ["node", "app", "db"] {
            assert_eq!(relay.started(name), 4);
            assert_eq!(relay.finished(name), 4);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_a_full_interval() {
        let relay = RecordingRelay::default();
        let scheduler = Scheduler::new(Duration::from_secs(60), sources(&["node"]), relay.clone());

        scheduler
            .run_until(time::sleep(Duration::from_secs(59)))
            .await;

        assert_eq!(relay.total_started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_relays_overlap_and_are_aborted_on_shutdown() {
        let relay = RecordingRelay {
            delay: Some(Duration::from_secs(12)),
            ..Default::default()
        };
        let scheduler = Scheduler::new(Duration::from_secs(5), sources(&["slow"]), relay.clone());

        // Ticks at 5s, 10s, 15s and 20s; only the relay started at 5s
        // completes (at 17s) before the shutdown.
        scheduler
            .run_until(time::sleep(Duration::from_secs(21)))
            .await;

        assert_eq!(relay.started("slow"), 4);
        assert_eq!(relay.finished("slow"), 1);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(relay.finished("slow"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_relay_does_not_stop_the_scheduler() {
        let relay = RecordingRelay {
            panic_on: Some("bad"),
            ..Default::default()
        };
        let scheduler = Scheduler::new(
            Duration::from_secs(5),
            sources(&["bad", "good"]),
            relay.clone(),
        );

        scheduler
            .run_until(time::sleep(Duration::from_secs(17)))
            .await;

        assert_eq!(relay.started("bad"), 3);
        assert_eq!(relay.started("good"), 3);
        assert_eq!(relay.finished("good"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn no_sources_is_fine() {
        let relay = RecordingRelay::default();
        let scheduler = Scheduler::new(Duration::from_secs(1), Vec::new(), relay.clone());

        scheduler
            .run_until(time::sleep(Duration::from_secs(10)))
            .await;

        assert_eq!(relay.total_started(), 0);
    }
}
