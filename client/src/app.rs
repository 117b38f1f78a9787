use gloo_storage::Storage;
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use warmap_shared::normalize::unique_site_types;
use warmap_shared::{FilterEngine, FilterPass, FilterState, Incident, Locale};

use crate::controller;
use crate::fetch;
use crate::filter_panel::FilterPanel;
use crate::leaflet::{self, LeafletSurface};
use crate::location;
use crate::refresh;
use crate::sse::{self, ConnectionStatus};

pub(crate) const MAP_CONTAINER_ID: &str = "map";
const SETTINGS_KEY: &str = "warmap_settings";

/// Filter state as last adopted by the engine, mirrored for the panel.
#[derive(Clone, Copy)]
pub(crate) struct CurrentFilters(pub RwSignal<FilterState>);
#[derive(Clone, Copy)]
pub(crate) struct SiteTypes(pub RwSignal<Vec<String>>);
#[derive(Clone, Copy)]
pub(crate) struct Clustering(pub RwSignal<bool>);
#[derive(Clone, Copy)]
pub(crate) struct LocaleSetting(pub RwSignal<Locale>);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LoadStatus {
    Loading,
    Ready(FilterPass),
    Failed(String),
}

/// Preferences that are not part of the shareable URL.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct Settings {
    clustering: bool,
    locale: Locale,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clustering: true,
            locale: Locale::English,
        }
    }
}

fn status_text(status: &LoadStatus) -> String {
    match status {
        LoadStatus::Loading => "Loading incidents…".to_owned(),
        LoadStatus::Ready(pass) => format!("{} incidents shown", pass.placed),
        LoadStatus::Failed(e) => format!("Could not load incidents: {e}"),
    }
}

/// Fetch the feed and hand it to the engine. Failures keep the current markers.
fn refresh_data(site_types: RwSignal<Vec<String>>, status: RwSignal<LoadStatus>) {
    spawn_local(async move {
        match fetch::fetch_incidents().await {
            Ok(records) => apply_records(records, site_types, status),
            Err(e) => {
                web_sys::console::error_1(&format!("Error fetching data: {e}").into());
                status.set(LoadStatus::Failed(e));
            }
        }
    });
}

fn apply_records(
    records: Vec<Incident>,
    site_types: RwSignal<Vec<String>>,
    status: RwSignal<LoadStatus>,
) {
    let Some(pass) = controller::replace_data(records) else {
        return;
    };
    site_types.set(controller::site_types().unwrap_or_else(|| unique_site_types(&[])));
    status.set(LoadStatus::Ready(pass));
}

/// Create the map and engine, then start data, URL, timer and SSE wiring.
fn boot(
    filters: RwSignal<FilterState>,
    site_types: RwSignal<Vec<String>>,
    status: RwSignal<LoadStatus>,
    connection: RwSignal<ConnectionStatus>,
    settings: &Settings,
) {
    let map = leaflet::init_map(MAP_CONTAINER_ID, &controller::url_view());
    leaflet::on_view_change(&map, |view| controller::push_view(&view));

    let border_map = map.clone();
    spawn_local(async move {
        match fetch::fetch_border().await {
            Ok(geojson) => leaflet::add_border(&border_map, &geojson),
            Err(e) => web_sys::console::warn_1(&format!("border overlay unavailable: {e}").into()),
        }
    });

    let mut engine = FilterEngine::new(LeafletSurface::new(map), settings.locale);
    engine.store_mut().set_clustering(settings.clustering);
    engine.subscribe(move |state, origin| {
        filters.set(state.clone());
        controller::push_url(state, origin);
    });
    controller::install(engine);
    controller::apply_url();
    location::on_history_navigation(controller::apply_url);

    refresh_data(site_types, status);

    refresh::start(move |tick| {
        web_sys::console::log_1(&format!("scheduled refresh #{}", tick.counter).into());
        refresh_data(site_types, status);
    });
    sse::connect(
        move |next| connection.set(next),
        move |seq| {
            web_sys::console::log_1(&format!("server dataset {seq} available").into());
            refresh_data(site_types, status);
        },
    );
    on_cleanup(|| {
        refresh::stop();
        sse::disconnect();
        location::stop_history_navigation();
    });
}

/// Root application component: map container plus the filter panel.
#[component]
pub fn App() -> impl IntoView {
    let saved: Settings = gloo_storage::LocalStorage::get(SETTINGS_KEY).unwrap_or_default();
    let filters: RwSignal<FilterState> = RwSignal::new(FilterState::default());
    let site_types: RwSignal<Vec<String>> = RwSignal::new(unique_site_types(&[]));
    let clustering: RwSignal<bool> = RwSignal::new(saved.clustering);
    let locale: RwSignal<Locale> = RwSignal::new(saved.locale);
    let status: RwSignal<LoadStatus> = RwSignal::new(LoadStatus::Loading);
    let connection: RwSignal<ConnectionStatus> = RwSignal::new(ConnectionStatus::Connecting);
    let hide_ui = controller::hide_ui();

    provide_context(CurrentFilters(filters));
    provide_context(SiteTypes(site_types));
    provide_context(Clustering(clustering));
    provide_context(LocaleSetting(locale));

    Effect::new(move || {
        let settings = Settings {
            clustering: clustering.get(),
            locale: locale.get(),
        };
        let _ = gloo_storage::LocalStorage::set(SETTINGS_KEY, &settings);
    });

    // Runs once after mount, when the map container exists.
    Effect::new(move || {
        if controller::is_installed() {
            return;
        }
        boot(filters, site_types, status, connection, &saved);
    });

    view! {
        <div id=MAP_CONTAINER_ID class="map"></div>
        <Show when=move || !hide_ui>
            <FilterPanel />
            <div class="info-section">
                <span class="load-status">{move || status_text(&status.get())}</span>
                <span
                    class="connection-status"
                    class:live=move || connection.get() == ConnectionStatus::Live
                ></span>
            </div>
        </Show>
    }
}
