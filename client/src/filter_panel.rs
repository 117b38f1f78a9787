use std::collections::BTreeSet;

use chrono::NaiveDate;
use leptos::prelude::*;
use wasm_bindgen::JsCast;

use warmap_shared::category::display_label;
use warmap_shared::filter::TIME_OPTIONS;
use warmap_shared::{Locale, TimeFilter};

use crate::app::{Clustering, CurrentFilters, LocaleSetting, SiteTypes};
use crate::controller;

const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// Selection after toggling one checkbox.
fn toggled_types(selected: &BTreeSet<String>, token: &str, on: bool) -> BTreeSet<String> {
    let mut next = selected.clone();
    if on {
        next.insert(token.to_lowercase());
    } else {
        next.remove(&token.to_lowercase());
    }
    next
}

/// "Select all" is ticked only when every listed type is ticked.
fn all_selected(selected: &BTreeSet<String>, types: &[String]) -> bool {
    !types.is_empty() && types.iter().all(|token| selected.contains(&token.to_lowercase()))
}

/// Dropdown value for the current time filter. Ranges show as unrestricted in the dropdown.
fn time_select_value(time: &TimeFilter) -> String {
    match time {
        TimeFilter::LastDays { days } => days.to_string(),
        _ => String::new(),
    }
}

fn time_option_label(option: &str) -> String {
    match option {
        "" => "All time".to_owned(),
        "1" => "Last 24 hours".to_owned(),
        days => format!("Last {days} days"),
    }
}

fn parse_date_input(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_INPUT_FORMAT).ok()
}

fn date_input_value(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format(DATE_INPUT_FORMAT).to_string())
        .unwrap_or_default()
}

/// Range bounds currently in effect, if the time filter is a range.
fn range_bounds(time: &TimeFilter) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match time {
        TimeFilter::Range { start, end } => (*start, *end),
        _ => (None, None),
    }
}

fn input_from(e: &leptos::ev::Event) -> Option<web_sys::HtmlInputElement> {
    e.target()?.dyn_into::<web_sys::HtmlInputElement>().ok()
}

fn select_from(e: &leptos::ev::Event) -> Option<web_sys::HtmlSelectElement> {
    e.target()?.dyn_into::<web_sys::HtmlSelectElement>().ok()
}

#[component]
pub fn FilterPanel() -> impl IntoView {
    view! {
        <div class="filter-container">
            <TypeFilter />
            <TimeFilterControl />
            <DisplayToggles />
            <MapSettings />
        </div>
    }
}

#[component]
fn TypeFilter() -> impl IntoView {
    let CurrentFilters(filters) = expect_context();
    let SiteTypes(site_types) = expect_context();

    let on_select_all = move |e: leptos::ev::Event| {
        let Some(input) = input_from(&e) else {
            return;
        };
        let types = if input.checked() {
            site_types.get_untracked()
        } else {
            Vec::new()
        };
        controller::apply_ui(move |state| state.select_types(types));
    };

    view! {
        <div class="filter-group filter-group-type" id="siteTypeFilterContainer">
            <label class="filter-label">"Filter by Site Type:"</label>
            <div class="checkbox-container">
                <div class="checkbox-all">
                    <input
                        type="checkbox"
                        id="type-all"
                        class="type-checkbox-all"
                        prop:checked=move || {
                            all_selected(&filters.get().selected_types, &site_types.get())
                        }
                        on:change=on_select_all
                    />
                    <label for="type-all">"Select All"</label>
                </div>
                {move || {
                    site_types
                        .get()
                        .into_iter()
                        .map(|token| {
                            let id = format!("type-{token}");
                            let label = display_label(&token);
                            let checked_token = token.to_lowercase();
                            let on_change = move |e: leptos::ev::Event| {
                                let Some(input) = input_from(&e) else {
                                    return;
                                };
                                let on = input.checked();
                                let token = token.clone();
                                controller::apply_ui(move |state| {
                                    state.selected_types = toggled_types(&state.selected_types, &token, on);
                                });
                            };
                            view! {
                                <div class="checkbox-row">
                                    <input
                                        type="checkbox"
                                        id=id.clone()
                                        class="type-checkbox"
                                        prop:checked=move || {
                                            filters.get().selected_types.contains(&checked_token)
                                        }
                                        on:change=on_change
                                    />
                                    <label for=id>{label}</label>
                                </div>
                            }
                        })
                        .collect::<Vec<_>>()
                }}
            </div>
        </div>
    }
}

#[component]
fn TimeFilterControl() -> impl IntoView {
    let CurrentFilters(filters) = expect_context();

    let on_days = move |e: leptos::ev::Event| {
        let Some(select) = select_from(&e) else {
            return;
        };
        let days = select.value().trim().parse::<u32>().unwrap_or(0);
        controller::apply_ui(move |state| state.time = TimeFilter::last_days(days));
    };

    let on_start = move |e: leptos::ev::Event| {
        let Some(input) = input_from(&e) else {
            return;
        };
        let start = parse_date_input(&input.value());
        controller::apply_ui(move |state| {
            let (_, end) = range_bounds(&state.time);
            state.time = TimeFilter::range(start, end);
        });
    };

    let on_end = move |e: leptos::ev::Event| {
        let Some(input) = input_from(&e) else {
            return;
        };
        let end = parse_date_input(&input.value());
        controller::apply_ui(move |state| {
            let (start, _) = range_bounds(&state.time);
            state.time = TimeFilter::range(start, end);
        });
    };

    view! {
        <div class="filter-group filter-group-time">
            <label class="filter-label" for="timeFilter">"Time:"</label>
            <select id="timeFilter" on:change=on_days>
                {TIME_OPTIONS
                    .iter()
                    .map(|option| {
                        let value = (*option).to_owned();
                        let current = value.clone();
                        view! {
                            <option
                                value=value
                                selected=move || time_select_value(&filters.get().time) == current
                            >
                                {time_option_label(option)}
                            </option>
                        }
                    })
                    .collect::<Vec<_>>()}
            </select>
            <div class="date-range">
                <input
                    type="date"
                    id="startDate"
                    prop:value=move || date_input_value(range_bounds(&filters.get().time).0)
                    on:change=on_start
                />
                <input
                    type="date"
                    id="endDate"
                    prop:value=move || date_input_value(range_bounds(&filters.get().time).1)
                    on:change=on_end
                />
            </div>
        </div>
    }
}

#[component]
fn ToggleRow(
    id: &'static str,
    label: &'static str,
    checked: Signal<bool>,
    on_toggle: fn(bool),
) -> impl IntoView {
    let on_change = move |e: leptos::ev::Event| {
        if let Some(input) = input_from(&e) {
            on_toggle(input.checked());
        }
    };

    view! {
        <div class="toggle-row">
            <input type="checkbox" id=id prop:checked=move || checked.get() on:change=on_change />
            <label for=id>{label}</label>
        </div>
    }
}

#[component]
fn DisplayToggles() -> impl IntoView {
    let CurrentFilters(filters) = expect_context();
    let show_names = Signal::derive(move || filters.get().show_labels);
    let show_circles = Signal::derive(move || filters.get().show_circles);

    view! {
        <div class="filter-group filter-group-names">
            <ToggleRow
                id="showNames"
                label="Show names"
                checked=show_names
                on_toggle=|on| controller::apply_ui(move |state| state.set_show_labels(on))
            />
        </div>
        <div class="filter-group filter-group-circles">
            <ToggleRow
                id="showCircles"
                label="Show as circles"
                checked=show_circles
                on_toggle=|on| controller::apply_ui(move |state| state.set_show_circles(on))
            />
        </div>
    }
}

#[component]
fn MapSettings() -> impl IntoView {
    let Clustering(clustering) = expect_context();
    let LocaleSetting(locale) = expect_context();

    let on_cluster = move |e: leptos::ev::Event| {
        let Some(input) = input_from(&e) else {
            return;
        };
        let on = input.checked();
        clustering.set(on);
        controller::set_clustering(on);
    };

    let on_locale = move |e: leptos::ev::Event| {
        let Some(select) = select_from(&e) else {
            return;
        };
        let next = if select.value() == "fa" {
            Locale::Farsi
        } else {
            Locale::English
        };
        locale.set(next);
        controller::set_locale(next);
    };

    view! {
        <div class="filter-group filter-group-settings">
            <div class="toggle-row">
                <input
                    type="checkbox"
                    id="clusterToggle"
                    prop:checked=move || clustering.get()
                    on:change=on_cluster
                />
                <label for="clusterToggle">"Cluster markers"</label>
            </div>
            <select id="localeSelect" on:change=on_locale>
                <option value="en" selected=move || locale.get() == Locale::English>
                    "English"
                </option>
                <option value="fa" selected=move || locale.get() == Locale::Farsi>
                    "فارسی"
                </option>
            </select>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| (*t).to_owned()).collect()
    }

    #[test]
    fn toggling_adds_and_removes_lowercased_tokens() {
        let selected = set(&["oil"]);
        assert_eq!(toggled_types(&selected, "Military", true), set(&["military", "oil"]));
        assert_eq!(toggled_types(&selected, "OIL", false), set(&[]));
    }

    #[test]
    fn select_all_tracks_every_checkbox() {
        let types = vec!["military".to_owned(), "oil".to_owned()];
        assert!(all_selected(&set(&["military", "oil"]), &types));
        assert!(!all_selected(&set(&["oil"]), &types));
        assert!(!all_selected(&set(&[]), &types));
        assert!(!all_selected(&set(&["oil"]), &[]));
    }

    #[test]
    fn time_dropdown_reflects_last_days_only() {
        assert_eq!(time_select_value(&TimeFilter::last_days(7)), "7");
        assert_eq!(time_select_value(&TimeFilter::Unrestricted), "");
        let day = NaiveDate::from_ymd_opt(2025, 6, 1);
        assert_eq!(time_select_value(&TimeFilter::range(day, None)), "");
        assert_eq!(time_option_label(""), "All time");
        assert_eq!(time_option_label("14"), "Last 14 days");
    }

    #[test]
    fn date_inputs_round_trip_iso_days() {
        let day = parse_date_input(" 2025-06-13 ");
        assert_eq!(day, NaiveDate::from_ymd_opt(2025, 6, 13));
        assert_eq!(date_input_value(day), "2025-06-13");
        assert_eq!(parse_date_input(""), None);
        assert_eq!(date_input_value(None), "");
    }

    #[test]
    fn range_bounds_only_for_ranges() {
        let start = NaiveDate::from_ymd_opt(2025, 6, 1);
        assert_eq!(range_bounds(&TimeFilter::range(start, None)), (start, None));
        assert_eq!(range_bounds(&TimeFilter::last_days(3)), (None, None));
    }
}
