pub mod casualties;
pub mod category;
pub mod colors;
pub mod engine;
pub mod events;
pub mod filter;
pub mod incident;
pub mod marker;
pub mod normalize;
pub mod popup;
pub mod query;
pub mod refresh;
pub mod url_sync;

pub use casualties::{CasualtyCount, CasualtyField, CasualtySummary};
pub use category::Category;
pub use engine::{FilterEngine, FilterPass, StateOrigin, SubscriptionId};
pub use events::*;
pub use filter::{FilterState, TimeFilter};
pub use incident::{Incident, IncidentBody, LatLng};
pub use marker::{MapSurface, MarkerIcon, MarkerStore, Placement};
pub use popup::Locale;
pub use query::{MapView, QueryParams};
pub use refresh::RefreshTick;
pub use url_sync::{QueryLocation, UrlSync};
