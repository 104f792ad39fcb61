//! Expressive-symbol detection.

/// Codepoint ranges treated as emoji/pictographs.
const EXPRESSIVE_RANGES: &[(u32, u32)] = &[
    (0x1F300, 0x1F5FF), // misc symbols and pictographs
    (0x1F600, 0x1F64F), // emoticons
    (0x1F680, 0x1F6FF), // transport and map
    (0x1F900, 0x1F9FF), // supplemental symbols and pictographs
    (0x1FA70, 0x1FAFF), // symbols and pictographs extended-A
    (0x2600, 0x26FF),   // misc symbols
    (0x2700, 0x27BF),   // dingbats, includes U+2764 heavy heart
    (0x2B50, 0x2B50),   // white medium star
];

/// Whether a single character is an emoji or pictograph.
pub fn is_expressive(c: char) -> bool {
    let cp = c as u32;
    EXPRESSIVE_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&cp))
}

/// Whether `text` contains at least one expressive symbol.
pub fn has_expressive_symbol(text: &str) -> bool {
    text.chars().any(is_expressive)
}
