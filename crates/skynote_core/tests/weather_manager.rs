use skynote_core::weather::BoxFuture;
use skynote_core::{
    App, LastCity, Store, WeatherError, WeatherProvider, WeatherReport, WeatherResult,
    WeatherSettings, WeatherState, WeatherStateManager, DEFAULT_QUIET_PERIOD,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, PartialEq)]
struct Call {
    city: String,
    api_key: String,
    language_code: String,
}

#[derive(Clone)]
enum Script {
    Report { kelvin: f64, delay: Duration },
    Fail,
}

/// Provider that answers from a per-city script and records every call.
#[derive(Default)]
struct ScriptedProvider {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    fn with(mut self, city: &str, script: Script) -> Self {
        self.scripts.insert(city.to_string(), script);
        self
    }

    fn report(self, city: &str, kelvin: f64) -> Self {
        self.with(
            city,
            Script::Report {
                kelvin,
                delay: Duration::ZERO,
            },
        )
    }

    fn cities(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.city.clone())
            .collect()
    }
}

impl WeatherProvider for ScriptedProvider {
    fn fetch<'a>(
        &'a self,
        city: &'a str,
        api_key: &'a str,
        language_code: &'a str,
    ) -> BoxFuture<'a, WeatherResult<WeatherReport>> {
        self.calls.lock().unwrap().push(Call {
            city: city.to_string(),
            api_key: api_key.to_string(),
            language_code: language_code.to_string(),
        });
        let script = self.scripts.get(city).cloned();

        Box::pin(async move {
            match script {
                Some(Script::Report { kelvin, delay }) => {
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    Ok(WeatherReport {
                        city: city.to_string(),
                        temperature_kelvin: kelvin,
                        description: "clear sky".to_string(),
                        wind_speed: 3.5,
                    })
                }
                Some(Script::Fail) | None => Err(WeatherError::Status { status: 404 }),
            }
        })
    }
}

fn settings() -> WeatherSettings {
    WeatherSettings {
        api_key: "settings-key".to_string(),
        language_code: "en".to_string(),
        quiet_period: DEFAULT_QUIET_PERIOD,
    }
}

fn store() -> Arc<Store> {
    Arc::new(Store::open_in_memory().expect("open store"))
}

async fn wait_for<T: Clone>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T {
    timeout(Duration::from_secs(30), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state sender dropped")
        .clone()
}

fn is_success_for(state: &WeatherState, city: &str) -> bool {
    matches!(state, WeatherState::Success(report) if report.city == city)
}

fn last_city_is(slot: &Option<LastCity>, city: &str) -> bool {
    slot.as_ref().is_some_and(|last| last.city == city)
}

#[tokio::test(start_paused = true)]
async fn starts_in_loading_with_empty_slot() {
    let provider = Arc::new(ScriptedProvider::default());
    let manager = WeatherStateManager::new(store(), provider.clone(), settings());

    assert_eq!(manager.weather_state(), WeatherState::Loading);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(manager.last_city(), None);
    assert!(provider.cities().is_empty());
}

#[tokio::test(start_paused = true)]
async fn typed_input_is_coalesced_into_one_lookup() {
    let provider = Arc::new(ScriptedProvider::default().report("Helsinki", 280.15));
    let manager = WeatherStateManager::new(store(), provider.clone(), settings());
    let mut state = manager.subscribe_weather_state();
    let mut last_city = manager.subscribe_last_city();

    manager.submit_city("H");
    sleep(Duration::from_millis(100)).await;
    manager.submit_city("Hel");
    sleep(Duration::from_millis(100)).await;
    manager.submit_city("  Helsinki ");

    let state = wait_for(&mut state, |s| is_success_for(s, "Helsinki")).await;
    let WeatherState::Success(report) = state else {
        panic!("expected success");
    };
    assert_eq!(report.display_temperature(), "7.00°C");
    wait_for(&mut last_city, |slot| last_city_is(slot, "Helsinki")).await;

    // Persisting the city must not trigger a restore lookup.
    sleep(Duration::from_secs(5)).await;
    let calls = provider.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![Call {
            city: "Helsinki".to_string(),
            api_key: "settings-key".to_string(),
            language_code: "en".to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn manual_fetch_uses_given_credentials() {
    let provider = Arc::new(ScriptedProvider::default().report("Oslo", 275.15));
    let manager = WeatherStateManager::new(store(), provider.clone(), settings());
    let mut state = manager.subscribe_weather_state();

    manager.fetch_weather("Oslo", "manual-key", "nb");
    wait_for(&mut state, |s| is_success_for(s, "Oslo")).await;

    let calls = provider.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].api_key, "manual-key");
    assert_eq!(calls[0].language_code, "nb");
}

#[tokio::test(start_paused = true)]
async fn stored_city_is_restored_once_and_survives_failures() {
    let store = store();
    store.upsert_last_city("Oslo").expect("seed last city");
    let provider = Arc::new(
        ScriptedProvider::default()
            .report("Oslo", 275.15)
            .with("Atlantis", Script::Fail),
    );
    let manager = WeatherStateManager::new(Arc::clone(&store), provider.clone(), settings());
    let mut state = manager.subscribe_weather_state();

    wait_for(&mut state, |s| is_success_for(s, "Oslo")).await;
    sleep(Duration::from_secs(2)).await;
    assert_eq!(provider.cities(), vec!["Oslo"]);

    manager.submit_city("Atlantis");
    let failed = wait_for(&mut state, |s| matches!(s, WeatherState::Error(_))).await;
    assert_eq!(
        failed,
        WeatherState::Error("weather provider returned status 404".to_string())
    );

    sleep(Duration::from_secs(2)).await;
    assert!(last_city_is(&manager.last_city(), "Oslo"));
    assert_eq!(store.get_last_city().unwrap().map(|slot| slot.city).as_deref(), Some("Oslo"));
    assert_eq!(provider.cities(), vec!["Oslo", "Atlantis"]);
}

#[tokio::test(start_paused = true)]
async fn superseded_slow_response_is_dropped() {
    let provider = Arc::new(
        ScriptedProvider::default()
            .with(
                "Slowtown",
                Script::Report {
                    kelvin: 300.0,
                    delay: Duration::from_secs(5),
                },
            )
            .report("Helsinki", 280.15),
    );
    let manager = WeatherStateManager::new(store(), provider.clone(), settings());
    let mut state = manager.subscribe_weather_state();

    manager.fetch_weather("Slowtown", "key", "en");
    sleep(Duration::from_millis(100)).await;
    manager.fetch_weather("Helsinki", "key", "en");

    wait_for(&mut state, |s| is_success_for(s, "Helsinki")).await;
    sleep(Duration::from_secs(10)).await;

    assert!(is_success_for(&manager.weather_state(), "Helsinki"));
    assert!(last_city_is(&manager.last_city(), "Helsinki"));
    assert_eq!(provider.cities(), vec!["Slowtown", "Helsinki"]);
}

#[tokio::test(start_paused = true)]
async fn back_to_back_lookups_keep_the_newest_city() {
    for _ in 0..50 {
        let provider = Arc::new(
            ScriptedProvider::default()
                .report("Helsinki", 280.15)
                .report("Oslo", 275.15),
        );
        let manager = WeatherStateManager::new(store(), provider.clone(), settings());
        let mut state = manager.subscribe_weather_state();

        manager.fetch_weather("Helsinki", "key", "en");
        wait_for(&mut state, |s| is_success_for(s, "Helsinki")).await;
        manager.fetch_weather("Oslo", "key", "en");
        wait_for(&mut state, |s| is_success_for(s, "Oslo")).await;
        sleep(Duration::from_secs(3)).await;

        assert_eq!(provider.cities(), vec!["Helsinki", "Oslo"]);
        assert!(is_success_for(&manager.weather_state(), "Oslo"));
        assert!(last_city_is(&manager.last_city(), "Oslo"));
    }
}

#[tokio::test(start_paused = true)]
async fn blank_input_cancels_pending_lookup() {
    let provider = Arc::new(ScriptedProvider::default().report("Helsinki", 280.15));
    let manager = WeatherStateManager::new(store(), provider.clone(), settings());

    manager.submit_city("Helsinki");
    sleep(Duration::from_millis(200)).await;
    manager.submit_city("   ");
    sleep(Duration::from_secs(2)).await;

    assert!(provider.cities().is_empty());
    assert_eq!(manager.weather_state(), WeatherState::Loading);
}

#[tokio::test(start_paused = true)]
async fn successful_report_can_be_saved_as_note() {
    let provider = Arc::new(ScriptedProvider::default().report("Helsinki", 280.15));
    let app = App::with_parts(store(), provider, settings());
    let mut state = app.weather().subscribe_weather_state();
    let mut notes = app.notes().subscribe_all_notes();

    assert!(!app.weather().save_as_note(app.notes()));

    app.weather().fetch_weather("Helsinki", "key", "en");
    wait_for(&mut state, |s| is_success_for(s, "Helsinki")).await;
    assert!(app.weather().save_as_note(app.notes()));

    let saved = wait_for(&mut notes, |list| !list.is_empty()).await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title, "Weather in Helsinki");
    assert_eq!(
        saved[0].content,
        "Temperature: 7.00°C\nStatus: clear sky\nWind: 3.50 m/s"
    );
    assert!(saved[0].id > 0);
}
