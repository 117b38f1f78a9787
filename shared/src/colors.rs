use crate::category::Category;

/// Circle-marker fill per category.
pub fn category_color(category: Category) -> (u8, u8, u8) {
    match category {
        Category::Oil => (0x2b, 0x2b, 0x2b),
        Category::Military => (0xc0, 0x39, 0x2b),
        Category::Civilian => (0x29, 0x80, 0xb9),
        Category::Nuclear => (0xf1, 0xc4, 0x0f),
        Category::Utility => (0x27, 0xae, 0x60),
        Category::PersonOfInterest => (0x8e, 0x44, 0xad),
        Category::Other => (0x7f, 0x8c, 0x8d),
    }
}

/// Fill color for a raw site-type token. Unknown tokens get a stable hashed color.
pub fn token_color(token: &str) -> (u8, u8, u8) {
    match Category::from_token(token) {
        Some(category) if category != Category::Other => category_color(category),
        _ if token.trim().eq_ignore_ascii_case("other") || token.trim().is_empty() => {
            category_color(Category::Other)
        }
        _ => hashed_color(&token.trim().to_lowercase()),
    }
}

/// Deterministic color via CRC32 of the name, clamped to a readable saturation and lightness.
pub fn hashed_color(name: &str) -> (u8, u8, u8) {
    let hash = crc32fast::hash(name.as_bytes());
    let bytes = hash.to_be_bytes();
    let (h, s, l) = rgb_to_hsl(bytes[0], bytes[1], bytes[2]);
    hsl_to_rgb(h, s.clamp(0.45, 0.85), l.clamp(0.35, 0.6))
}

pub fn rgb_hex((r, g, b): (u8, u8, u8)) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Scale each channel of `#rrggbb` by `1 - percent`. Unparseable input comes back unchanged.
pub fn darken_hex(hex: &str, percent: f64) -> String {
    let Some((r, g, b)) = parse_hex(hex) else {
        return hex.to_owned();
    };
    let factor = (1.0 - percent).clamp(0.0, 1.0);
    let scale = |channel: u8| (f64::from(channel) * factor).floor().clamp(0.0, 255.0) as u8;
    rgb_hex((scale(r), scale(g), scale(b)))
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Convert RGB to HSL. Returns (h: 0..360, s: 0..1, l: 0..1).
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f64::EPSILON {
        let mut h = (g - b) / d;
        if g < b {
            h += 6.0;
        }
        h
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h * 60.0, s, l)
}

/// Convert HSL to RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    if s.abs() < f64::EPSILON {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;
    let h = h / 360.0;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_rgb_through_hsl_is_identity() {
        let samples = [
            (0, 0, 0),
            (255, 255, 255),
            (128, 128, 128),
            (255, 0, 0),
            (37, 91, 201),
            (250, 180, 20),
        ];

        for (r, g, b) in samples {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            assert_eq!(hsl_to_rgb(h, s, l), (r, g, b));
        }
    }

    #[test]
    fn known_tokens_use_category_palette() {
        assert_eq!(token_color("Military"), category_color(Category::Military));
        assert_eq!(token_color("other"), category_color(Category::Other));
        assert_eq!(token_color(""), category_color(Category::Other));
    }

    #[test]
    fn unknown_tokens_hash_deterministically() {
        assert_eq!(token_color("energy"), token_color("Energy "));
        assert_ne!(token_color("energy"), token_color("industry"));
    }

    #[test]
    fn darken_scales_channels_down() {
        assert_eq!(darken_hex("#ffffff", 0.2), "#cccccc");
        assert_eq!(darken_hex("808080", 0.5), "#404040");
        assert_eq!(darken_hex("#123", 0.2), "#123");
        assert_eq!(rgb_hex((0, 15, 255)), "#000fff");
    }
}
