use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::{self, FilterState};
use crate::incident::Incident;
use crate::marker::{MapSurface, MarkerStore};
use crate::normalize::{expand_multi_type, normalize_coordinates, primary_token, unique_site_types};
use crate::popup::Locale;

/// Which representation produced a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateOrigin {
    Ui,
    Url,
    Data,
}

/// Outcome of one filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPass {
    pub visible: usize,
    pub placed: usize,
    pub skipped_without_coordinates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&FilterState, StateOrigin)>;

/// Owns the dataset, the filter state and the marker store.
pub struct FilterEngine<S: MapSurface> {
    records: Vec<Incident>,
    state: FilterState,
    store: MarkerStore<S>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl<S: MapSurface> FilterEngine<S> {
    pub fn new(surface: S, locale: Locale) -> Self {
        Self {
            records: Vec::new(),
            state: FilterState::default(),
            store: MarkerStore::new(surface, locale),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn records(&self) -> &[Incident] {
        &self.records
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn store(&self) -> &MarkerStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MarkerStore<S> {
        &mut self.store
    }

    /// Distinct site types of the current dataset, for the type checkboxes.
    pub fn site_types(&self) -> Vec<String> {
        unique_site_types(&self.records)
    }

    /// Replace the dataset wholesale and re-run the pass.
    pub fn replace_data<I>(&mut self, records: I) -> FilterPass
    where
        I: IntoIterator<Item = Incident>,
    {
        self.replace_data_at(records, Utc::now())
    }

    pub fn replace_data_at<I>(&mut self, records: I, now: DateTime<Utc>) -> FilterPass
    where
        I: IntoIterator<Item = Incident>,
    {
        self.records = expand_multi_type(records);
        self.apply_filters_at(now)
    }

    /// Adopt `state`. A change that only touches labels relabels in place; anything else runs a pass.
    /// Returns the pass report when one ran.
    pub fn set_state(&mut self, state: FilterState, origin: StateOrigin) -> Option<FilterPass> {
        self.set_state_at(state, origin, Utc::now())
    }

    pub fn set_state_at(
        &mut self,
        mut state: FilterState,
        origin: StateOrigin,
        now: DateTime<Utc>,
    ) -> Option<FilterPass> {
        state.resolve_toggles();
        if state == self.state {
            return None;
        }

        let labels_only = state.same_selection(&self.state);
        self.state = state;

        let pass = if labels_only {
            self.store.set_labels(self.state.show_labels);
            None
        } else {
            Some(self.apply_filters_at(now))
        };
        self.notify(origin);
        pass
    }

    /// Edit the current state in place, then adopt it as [`FilterEngine::set_state`] does.
    pub fn update_state(
        &mut self,
        origin: StateOrigin,
        edit: impl FnOnce(&mut FilterState),
    ) -> Option<FilterPass> {
        let mut state = self.state.clone();
        edit(&mut state);
        self.set_state(state, origin)
    }

    pub fn set_clustering(&mut self, on: bool) -> FilterPass {
        self.store.set_clustering(on);
        self.apply_filters()
    }

    pub fn apply_filters(&mut self) -> FilterPass {
        self.apply_filters_at(Utc::now())
    }

    /// Clear every marker and repopulate from the full dataset.
    pub fn apply_filters_at(&mut self, now: DateTime<Utc>) -> FilterPass {
        self.store.clear_all();
        self.store.set_circle_mode(self.state.show_circles);
        self.store.set_labels(self.state.show_labels);

        let visible = filter::visible(&self.records, &self.state, now);
        let mut pass = FilterPass {
            visible: visible.len(),
            ..FilterPass::default()
        };
        for record in visible {
            match normalize_coordinates(record) {
                Some(position) => {
                    self.store.add(position, &primary_token(record), record);
                    pass.placed += 1;
                }
                None => pass.skipped_without_coordinates += 1,
            }
        }
        pass
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&FilterState, StateOrigin) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// `false` if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, origin: StateOrigin) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&self.state, origin);
        }
    }
}
