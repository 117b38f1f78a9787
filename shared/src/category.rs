use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical incident site category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Oil,
    Military,
    Civilian,
    Nuclear,
    Utility,
    PersonOfInterest,
    Other,
}

/// Tokens that have a dedicated marker icon under `svg/`.
const ICON_TOKENS: [&str; 9] = [
    "industry",
    "energy",
    "civilian",
    "injured",
    "military",
    "nuclear",
    "oil",
    "personofinterest",
    "utility",
];

/// Fallback marker icon for anything without a dedicated SVG.
pub const DEFAULT_ICON: &str = "svg/un.svg";

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Oil,
        Category::Military,
        Category::Civilian,
        Category::Nuclear,
        Category::Utility,
        Category::PersonOfInterest,
        Category::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oil => "oil",
            Self::Military => "military",
            Self::Civilian => "civilian",
            Self::Nuclear => "nuclear",
            Self::Utility => "utility",
            Self::PersonOfInterest => "personofinterest",
            Self::Other => "other",
        }
    }

    /// Case-insensitive match of a single trimmed token. `None` for unknown tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(token))
    }

    /// Like [`Category::from_token`] but unknown tokens collapse to `Other`.
    pub fn from_token_or_other(token: &str) -> Self {
        Self::from_token(token).unwrap_or(Self::Other)
    }

    /// Every category name, sorted. Used when a dataset has no site types at all.
    pub fn fallback_names() -> Vec<String> {
        let mut names: Vec<String> = Self::ALL.iter().map(|c| c.as_str().to_owned()).collect();
        names.sort();
        names
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker icon path for a raw site-type token.
pub fn icon_path(token: &str) -> String {
    let normalized = token.trim().to_ascii_lowercase();
    if ICON_TOKENS.contains(&normalized.as_str()) {
        format!("svg/{normalized}.svg")
    } else {
        DEFAULT_ICON.to_owned()
    }
}

/// Capitalize the first letter for checkbox labels ("military" -> "Military").
pub fn display_label(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
