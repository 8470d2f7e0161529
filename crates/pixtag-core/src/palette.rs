//! Content-aware color palettes
//!
//! Maps a caption and tag set to a fixed three-color palette by keyword
//! lookup, and normalizes color strings coming back from remote models.

/// Category keyword → palette, in lookup order. First match wins.
pub const CATEGORY_PALETTES: &[(&str, [&str; 4])] = &[
    ("nature", ["#228B22", "#32CD32", "#006400", "#8FBC8F"]),
    ("sky", ["#87CEEB", "#4682B4", "#1E90FF", "#00BFFF"]),
    ("portrait", ["#8B4513", "#D2B48C", "#F4A460", "#DEB887"]),
    ("city", ["#696969", "#808080", "#A9A9A9", "#708090"]),
    ("food", ["#FF6347", "#FF4500", "#FF8C00", "#FFA500"]),
    ("beach", ["#00BFFF", "#FFD700", "#F0E68C", "#FFE4B5"]),
    ("mountain", ["#708090", "#2F4F4F", "#696969", "#778899"]),
    ("animal", ["#8B4513", "#A0522D", "#CD853F", "#D2691E"]),
    ("forest", ["#228B22", "#006400", "#8FBC8F", "#2E8B57"]),
];

pub const DEFAULT_PALETTE: [&str; 3] = ["#4A6572", "#344955", "#F9AA33"];

pub const PALETTE_SIZE: usize = 3;

/// Pick a palette for an image from its description, falling back to its tags.
pub fn resolve_palette(description: &str, tags: &[String]) -> Vec<String> {
    let description = description.to_lowercase();

    let by_description = CATEGORY_PALETTES
        .iter()
        .find(|(keyword, _)| description.contains(keyword));

    let by_tags = || {
        tags.iter().find_map(|tag| {
            CATEGORY_PALETTES
                .iter()
                .find(|(keyword, _)| tag.contains(keyword))
        })
    };

    match by_description.or_else(by_tags) {
        Some((_, colors)) => colors[..PALETTE_SIZE].iter().map(|c| c.to_string()).collect(),
        None => DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
    }
}

/// Normalize one color to uppercase `#RRGGBB`.
///
/// Accepts `#rrggbb`, `rrggbb`, `#rrggbbaa` (alpha dropped) and `rgb(r, g, b)`.
/// Anything else yields `None`.
pub fn normalize_color(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Some(inner) = raw
        .strip_prefix("rgb(")
        .or_else(|| raw.strip_prefix("RGB("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let channels: Vec<u8> = inner
            .split(',')
            .map(|part| part.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .ok()?;
        if channels.len() != 3 {
            return None;
        }
        return Some(format!(
            "#{:02X}{:02X}{:02X}",
            channels[0], channels[1], channels[2]
        ));
    }

    let hex = raw.strip_prefix('#').unwrap_or(raw);
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", hex[..6].to_ascii_uppercase()))
}

/// Normalize a provider's colors to exactly three entries.
///
/// Invalid entries are dropped, the list is cut to three, and a short list is
/// padded from the resolved palette for `(description, tags)`.
pub fn normalize_colors(colors: &[String], description: &str, tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = colors
        .iter()
        .filter_map(|c| normalize_color(c))
        .take(PALETTE_SIZE)
        .collect();

    if normalized.len() < PALETTE_SIZE {
        for fill in resolve_palette(description, tags) {
            if normalized.len() == PALETTE_SIZE {
                break;
            }
            if !normalized.contains(&fill) {
                normalized.push(fill);
            }
        }
    }

    normalized
}
