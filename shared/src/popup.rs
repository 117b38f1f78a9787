use std::fmt::Write;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::casualties::{CasualtyCount, CasualtySummary};
use crate::category::display_label;
use crate::incident::Incident;
use crate::normalize::display_name;

/// Popup and label language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    English,
    Farsi,
}

const PERSIAN_DIGITS: [char; 10] = ['۰', '۱', '۲', '۳', '۴', '۵', '۶', '۷', '۸', '۹'];

const PERSIAN_MONTHS: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

const FARSI_WORDS: [(&str, &str); 18] = [
    ("military", "نظامی"),
    ("utility", "خدماتی"),
    ("oil", "نفتی"),
    ("nuclear", "هسته‌ای"),
    ("target", "هدف"),
    ("injured", "مجروح"),
    ("killed", "کشته"),
    ("other", "سایر"),
    ("personofinterest", "شخص مورد نظر"),
    ("civilian", "غیرنظامی"),
    ("energy", "انرژی"),
    ("industry", "صنعتی"),
    ("site", "محل"),
    ("sitetype", "نوع"),
    ("unknown", "ناشناخته"),
    ("government", "دولتی"),
    ("casualties", "تلفات"),
    ("transport", "حمل و نقل"),
];

/// Replace ASCII digits with Persian ones.
pub fn to_persian_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => PERSIAN_DIGITS[d as usize],
            _ => c,
        })
        .collect()
}

/// Farsi word for a known token, or the token unchanged.
pub fn translate_fa(token: &str) -> String {
    let lowered = token.trim().to_lowercase();
    FARSI_WORDS
        .iter()
        .find(|(en, _)| *en == lowered)
        .map(|(_, fa)| (*fa).to_owned())
        .unwrap_or_else(|| token.to_owned())
}

/// Solar Hijri (Jalali) date as `(year, month, day)`.
pub fn gregorian_to_jalali(date: NaiveDate) -> (i32, u32, u32) {
    const MONTH_OFFSETS: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

    let gy = i64::from(date.year());
    let gm = date.month() as usize;
    let gd = i64::from(date.day());
    let gy2 = if gm > 2 { gy + 1 } else { gy };

    let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400
        + gd
        + MONTH_OFFSETS[gm - 1];
    let mut jy = -1595 + 33 * (days / 12_053);
    days %= 12_053;
    jy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }
    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };
    (jy as i32, jm as u32, jd as u32)
}

/// Long-form date: "June 1, 2025" or "۱۱ خرداد ۱۴۰۴".
pub fn format_date(date: DateTime<Utc>, locale: Locale) -> String {
    match locale {
        Locale::English => date.format("%B %-d, %Y").to_string(),
        Locale::Farsi => {
            let (year, month, day) = gregorian_to_jalali(date.date_naive());
            let month_name = PERSIAN_MONTHS[(month as usize).saturating_sub(1).min(11)];
            to_persian_digits(&format!("{day} {month_name} {year}"))
        }
    }
}

pub fn format_number(value: u64, locale: Locale) -> String {
    match locale {
        Locale::English => value.to_string(),
        Locale::Farsi => to_persian_digits(&value.to_string()),
    }
}

/// Text shown on a cluster bubble.
pub fn cluster_count_label(count: usize) -> String {
    to_persian_digits(&count.to_string())
}

/// Escape text for HTML element content and single- or double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Only http(s) and relative URLs are rendered.
fn safe_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let scheme = trimmed
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .filter(|scheme| !scheme.contains('/'));
    match scheme.as_deref() {
        None | Some("http") | Some("https") => Some(escape_html(trimmed)),
        Some(_) => None,
    }
}

struct Labels {
    kind: &'static str,
    date: &'static str,
    province: &'static str,
    city: &'static str,
    address: &'static str,
    military: &'static str,
    civilian: &'static str,
    uncategorised: &'static str,
    link: &'static str,
}

const ENGLISH: Labels = Labels {
    kind: "Type:",
    date: "Date:",
    province: "Province:",
    city: "City:",
    address: "Address:",
    military: "Military",
    civilian: "Civilian",
    uncategorised: "Uncategorised",
    link: "Link",
};

const FARSI: Labels = Labels {
    kind: "نوع:",
    date: "تاریخ:",
    province: "استان:",
    city: "شهر:",
    address: "آدرس:",
    military: "نظامی",
    civilian: "غیرنظامی",
    uncategorised: "سایر",
    link: "لینک",
};

const fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::English => &ENGLISH,
        Locale::Farsi => &FARSI,
    }
}

fn type_text(incident: &Incident, locale: Locale) -> String {
    let tokens = incident.type_tokens();
    if tokens.is_empty() {
        return match locale {
            Locale::English => "Unknown".to_owned(),
            Locale::Farsi => translate_fa("unknown"),
        };
    }
    tokens
        .iter()
        .map(|token| match locale {
            Locale::English => display_label(token),
            Locale::Farsi => translate_fa(token),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn casualty_line(count: CasualtyCount, locale: Locale) -> String {
    let injured = format_number(u64::from(count.injured), locale);
    let killed = format_number(u64::from(count.killed), locale);
    match locale {
        Locale::English => format!("{injured} injured, {killed} killed"),
        Locale::Farsi => format!("{injured} {}، {killed} {}", translate_fa("injured"), translate_fa("killed")),
    }
}

/// Popup HTML for one record. Every interpolated value is escaped.
pub fn popup_html(incident: &Incident, locale: Locale) -> String {
    let body = &incident.body;
    let text = labels(locale);
    let mut content = String::new();

    let _ = write!(content, "<strong>{}</strong><br>", escape_html(&display_name(incident)));
    let _ = write!(
        content,
        "<span>{} {}</span><br>",
        text.kind,
        escape_html(&type_text(incident, locale))
    );

    if let Some(date) = incident.parsed_date() {
        let _ = write!(content, "<span>{} {}</span><br>", text.date, format_date(date, locale));
    }

    for (label, value) in [
        (text.province, &body.province),
        (text.city, &body.city),
        (text.address, &body.address),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            let _ = write!(content, "<span>{label} {}</span><br>", escape_html(value));
        }
    }

    if let Some(details) = incident.details() {
        let _ = write!(content, "<span>{}</span><br>", escape_html(details));
    }

    let casualties = CasualtySummary::from_incident(incident);
    if casualties.total > 0 {
        let total = format_number(casualties.total, locale);
        let _ = match locale {
            Locale::English => write!(content, "<span>Casualties: {total}</span><br>"),
            Locale::Farsi => write!(content, "<span>{}: {total} نفر</span><br>", translate_fa("casualties")),
        };
        for (label, count) in [
            (text.military, casualties.military),
            (text.civilian, casualties.civilian),
            (text.uncategorised, casualties.uncategorised),
        ] {
            if count.total() > 0 {
                let _ = write!(
                    content,
                    "<span class='casualty-detail'>{label}: {}</span><br>",
                    casualty_line(count, locale)
                );
            }
        }
    }

    if let Some(image) = body.main_image.as_deref().and_then(safe_url) {
        let _ = write!(content, "<img class='popup-image' src='{image}' alt=''><br>");
    }

    if !body.people.is_empty() {
        content.push_str("<div class='popup-people'>");
        for person in &body.people {
            content.push_str("<div class='popup-person'>");
            if let Some(image) = person.image.as_deref().and_then(safe_url) {
                let _ = write!(content, "<img src='{image}' alt=''>");
            }
            if let Some(name) = person.name.as_deref() {
                let _ = write!(content, "<span>{}</span>", escape_html(name));
            }
            if let Some(role) = person.role.as_deref() {
                let _ = write!(content, " <em>{}</em>", escape_html(role));
            }
            content.push_str("</div>");
        }
        content.push_str("</div>");
    }

    if let Some(link) = body.link.as_deref().and_then(safe_url) {
        let _ = write!(
            content,
            "<a href='{link}' target='_blank' rel='noopener noreferrer'>{}</a>",
            text.link
        );
    }

    match locale {
        Locale::English => format!("<div class='leaflet-popup-content'>{content}</div>"),
        Locale::Farsi => format!("<div class='leaflet-popup-content' dir='rtl'>{content}</div>"),
    }
}

/// Marker label text, or `None` when the record has no usable name.
pub fn marker_label(incident: &Incident) -> Option<String> {
    let name = display_name(incident);
    (name != crate::normalize::UNKNOWN_NAME).then_some(name)
}

/// Labeled-marker HTML: icon image followed by the name.
pub fn labeled_icon_html(icon_url: &str, label: &str) -> String {
    format!(
        "<div class='marker-with-background'><img src='{}' alt=''><span>{}</span></div>",
        escape_html(icon_url),
        escape_html(label)
    )
}

/// Cluster bubble HTML.
pub fn cluster_icon_html(count: usize) -> String {
    format!("<span>{}</span>", cluster_count_label(count))
}
