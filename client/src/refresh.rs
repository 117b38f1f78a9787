use std::cell::Cell;
use std::time::Duration;

use chrono::Utc;
use wasm_bindgen_futures::spawn_local;

use warmap_shared::RefreshTick;
use warmap_shared::refresh::{DEFAULT_REFRESH_LEAD, RefreshSchedule};

thread_local! {
    // Bumped on every start/stop; a loop exits once its generation is stale.
    static TIMER_GENERATION: Cell<u64> = const { Cell::new(0) };
}

fn bump_generation() -> u64 {
    TIMER_GENERATION.with(|generation| {
        let next = generation.get().wrapping_add(1);
        generation.set(next);
        next
    })
}

fn is_current(generation: u64) -> bool {
    TIMER_GENERATION.with(|current| current.get() == generation)
}

/// Stop the running loop. Takes effect after its current wait.
pub fn stop() {
    bump_generation();
}

/// Tick shortly before every top of the hour. Replaces any loop already running.
pub fn start(on_tick: impl Fn(RefreshTick) + 'static) {
    start_with_lead(DEFAULT_REFRESH_LEAD, on_tick);
}

pub fn start_with_lead(lead: Duration, on_tick: impl Fn(RefreshTick) + 'static) {
    let generation = bump_generation();
    spawn_local(async move {
        let mut schedule = RefreshSchedule::new(lead);
        loop {
            let (delay, tick) = schedule.next(Utc::now());
            web_sys::console::log_1(&format!("next data refresh in {}s", tick.delay_secs).into());
            gloo_timers::future::sleep(delay).await;
            if !is_current(generation) {
                break;
            }
            on_tick(tick);
        }
    });
}
