//! Weather state manager.
//!
//! # Responsibility
//! - Publish the current weather state and the stored last city.
//! - Funnel manual fetches, typed city input and last-city restore through
//!   one debounce register.
//! - Persist the city of every applied successful lookup.
//!
//! # Invariants
//! - Only the latest scheduled request may write `weather_state` or the
//!   last-city slot; superseded responses are dropped.
//! - A failed lookup leaves the last-city slot untouched.
//! - A stored city triggers a restore fetch only when it is not the latest
//!   requested city and not the echo of a write this manager made.
//! - Last-city writes land in the order their lookups were applied; an older
//!   write never overwrites a newer one.

use crate::model::note::LastCity;
use crate::repo::RepoResult;
use crate::service::debounce::{Debouncer, Ticket};
use crate::service::note_manager::NoteStateManager;
use crate::store::{CancelToken, Store, Subscription};
use crate::weather::{WeatherProvider, WeatherState};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Quiet period applied to typed input and restores.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Credentials and timing used by debounced lookups.
#[derive(Debug, Clone)]
pub struct WeatherSettings {
    pub api_key: String,
    pub language_code: String,
    pub quiet_period: Duration,
}

#[derive(Debug, Default)]
struct RequestLog {
    last_requested: Option<String>,
    /// Own slot writes the restore watcher has not observed yet, oldest first.
    pending_writes: VecDeque<String>,
    next_write: u64,
}

impl RequestLog {
    /// Registers an own write of `city` and returns its sequence number.
    ///
    /// A write of the city the slot already shows produces no change
    /// notification, so it is not queued.
    fn record_write(&mut self, city: &str, slot_shows_city: bool) -> u64 {
        if !slot_shows_city {
            self.pending_writes.push_back(city.to_string());
        }
        self.next_write += 1;
        self.next_write
    }

    /// Decides whether an observed slot value is an outside change.
    ///
    /// The watch channel may skip intermediate values, so a match also
    /// retires every older pending write.
    fn should_restore(&mut self, city: &str) -> bool {
        if let Some(position) = self.pending_writes.iter().position(|pending| pending == city) {
            self.pending_writes.drain(..=position);
            return false;
        }
        self.last_requested.as_deref() != Some(city)
    }
}

struct Inner {
    store: Arc<Store>,
    provider: Arc<dyn WeatherProvider>,
    settings: WeatherSettings,
    weather_state: watch::Sender<WeatherState>,
    last_city: Arc<watch::Sender<Option<LastCity>>>,
    debouncer: Debouncer,
    requests: Mutex<RequestLog>,
    /// Sequence number of the newest last-city write that reached the store.
    written: Arc<Mutex<u64>>,
    _last_city_subscription: Subscription,
    restore_task: Mutex<Option<AbortHandle>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self
            .restore_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

#[derive(Clone)]
pub struct WeatherStateManager {
    inner: Arc<Inner>,
}

impl WeatherStateManager {
    /// Creates the manager, opens the last-city live query and starts the
    /// restore watcher.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn new(
        store: Arc<Store>,
        provider: Arc<dyn WeatherProvider>,
        settings: WeatherSettings,
    ) -> Self {
        let (weather_state, _) = watch::channel(WeatherState::Loading);
        let (last_city, _) = watch::channel(None);
        let last_city = Arc::new(last_city);
        // Subscribe before the live query can publish the stored slot.
        let restore_rx = last_city.subscribe();
        let last_city_subscription =
            store.live_last_city(Arc::clone(&last_city), CancelToken::new());

        let inner = Arc::new(Inner {
            store,
            provider,
            settings,
            weather_state,
            last_city,
            debouncer: Debouncer::new(),
            requests: Mutex::new(RequestLog::default()),
            written: Arc::new(Mutex::new(0)),
            _last_city_subscription: last_city_subscription,
            restore_task: Mutex::new(None),
        });

        let restore = tokio::spawn(watch_last_city(Arc::downgrade(&inner), restore_rx));
        *inner
            .restore_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(restore.abort_handle());

        Self { inner }
    }

    pub fn subscribe_weather_state(&self) -> watch::Receiver<WeatherState> {
        self.inner.weather_state.subscribe()
    }

    pub fn subscribe_last_city(&self) -> watch::Receiver<Option<LastCity>> {
        self.inner.last_city.subscribe()
    }

    pub fn weather_state(&self) -> WeatherState {
        self.inner.weather_state.borrow().clone()
    }

    pub fn last_city(&self) -> Option<LastCity> {
        self.inner.last_city.borrow().clone()
    }

    /// Looks up `city` right away, superseding any pending or in-flight
    /// request. Does not switch the state to `Loading`.
    pub fn fetch_weather(&self, city: &str, api_key: &str, language_code: &str) {
        Inner::request(
            &self.inner,
            city.trim().to_string(),
            api_key.to_string(),
            language_code.to_string(),
            Duration::ZERO,
        );
    }

    /// Treats `input` as a typed city: the lookup runs once no newer input
    /// arrives within the quiet period. Blank input only cancels.
    pub fn submit_city(&self, input: &str) {
        Inner::submit(&self.inner, input);
    }

    /// Inserts the current successful report as a note.
    ///
    /// Returns `false` when there is no report to save.
    pub fn save_as_note(&self, notes: &NoteStateManager) -> bool {
        match self.weather_state() {
            WeatherState::Success(report) => {
                notes.insert(report.to_note());
                true
            }
            WeatherState::Loading | WeatherState::Error(_) => false,
        }
    }
}

impl Inner {
    fn requests(&self) -> MutexGuard<'_, RequestLog> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(this: &Arc<Self>, input: &str) {
        let city = input.trim();
        if city.is_empty() {
            this.debouncer.cancel();
            debug!("event=weather_input module=weather status=cleared");
            return;
        }

        Self::request(
            this,
            city.to_string(),
            this.settings.api_key.clone(),
            this.settings.language_code.clone(),
            this.settings.quiet_period,
        );
    }

    fn request(this: &Arc<Self>, city: String, api_key: String, language_code: String, delay: Duration) {
        this.requests().last_requested = Some(city.clone());
        let inner = Arc::clone(this);
        this.debouncer.schedule(delay, move |ticket| {
            inner.fetch(ticket, city, api_key, language_code)
        });
    }

    async fn fetch(self: Arc<Self>, ticket: Ticket, city: String, api_key: String, language_code: String) {
        info!(
            "event=weather_fetch module=weather status=start city={} lang={}",
            city, language_code
        );

        match self.provider.fetch(&city, &api_key, &language_code).await {
            Ok(report) => {
                let applied = self.debouncer.apply_if_current(ticket, || {
                    self.weather_state.send_replace(WeatherState::Success(report));
                    let slot_shows_city = self
                        .last_city
                        .borrow()
                        .as_ref()
                        .is_some_and(|slot| slot.city == city);
                    self.requests().record_write(&city, slot_shows_city)
                });
                let Some(write) = applied else {
                    debug!("event=weather_fetch module=weather status=superseded city={city}");
                    return;
                };
                info!("event=weather_fetch module=weather status=ok city={city}");
                self.persist_city(city, write).await;
            }
            Err(err) => {
                warn!(
                    "event=weather_fetch module=weather status=error city={} error={}",
                    city, err
                );
                let message = err.to_string();
                let applied = self.debouncer.apply_if_current(ticket, || {
                    self.weather_state.send_replace(WeatherState::Error(message));
                });
                if applied.is_none() {
                    debug!("event=weather_fetch module=weather status=superseded city={city}");
                }
            }
        }
    }

    async fn persist_city(&self, city: String, write: u64) {
        let store = Arc::clone(&self.store);
        let written = Arc::clone(&self.written);
        let outcome = tokio::task::spawn_blocking(move || -> RepoResult<bool> {
            let mut newest = written.lock().unwrap_or_else(PoisonError::into_inner);
            if *newest > write {
                return Ok(false);
            }
            store.upsert_last_city(&city)?;
            *newest = write;
            Ok(true)
        })
        .await;

        match outcome {
            Ok(Ok(true)) => debug!("event=last_city_write module=weather status=ok write={write}"),
            Ok(Ok(false)) => debug!("event=last_city_write module=weather status=stale write={write}"),
            Ok(Err(err)) => {
                error!("event=last_city_write module=weather status=error error={err}")
            }
            Err(err) => error!(
                "event=last_city_write module=weather status=error error_code=write_task_failed error={err}"
            ),
        }
    }

    fn should_restore(&self, city: &str) -> bool {
        self.requests().should_restore(city)
    }
}

async fn watch_last_city(inner: Weak<Inner>, mut last_city: watch::Receiver<Option<LastCity>>) {
    while last_city.changed().await.is_ok() {
        let observed = last_city
            .borrow_and_update()
            .as_ref()
            .map(|slot| slot.city.clone());
        let Some(city) = observed else {
            continue;
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.should_restore(&city) {
            info!("event=weather_restore module=weather status=scheduled city={city}");
            Inner::submit(&inner, &city);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RequestLog;

    #[test]
    fn own_writes_are_not_restored() {
        let mut log = RequestLog::default();
        log.last_requested = Some("Oslo".to_string());
        log.record_write("Helsinki", false);
        log.record_write("Oslo", false);

        // The echo of the older write arrives after a newer lookup.
        assert!(!log.should_restore("Helsinki"));
        assert!(!log.should_restore("Oslo"));
        assert!(log.pending_writes.is_empty());
    }

    #[test]
    fn skipped_echo_is_retired_by_a_later_one() {
        let mut log = RequestLog::default();
        log.record_write("Helsinki", false);
        log.record_write("Oslo", false);

        assert!(!log.should_restore("Oslo"));
        assert!(log.pending_writes.is_empty());
    }

    #[test]
    fn unchanged_slot_write_is_not_queued() {
        let mut log = RequestLog::default();
        let first = log.record_write("Oslo", true);
        let second = log.record_write("Oslo", false);

        assert!(second > first);
        assert_eq!(log.pending_writes.len(), 1);
    }

    #[test]
    fn outside_change_is_restored_unless_already_requested() {
        let mut log = RequestLog::default();
        assert!(log.should_restore("Oslo"));

        log.last_requested = Some("Oslo".to_string());
        assert!(!log.should_restore("Oslo"));
        assert!(log.should_restore("Tampere"));
    }
}
