use xxhash_rust::xxh32::xxh32;

/// Size of the general-purpose color pool.
pub const NUM_GENERAL_PURPOSE_COLOR_IDS: u32 = 23;
/// Reserved color ids live in a band above the general-purpose pool.
pub const NUM_RESERVED_COLOR_IDS: u32 = 8;

/// Stable color id for an arbitrary display string.
pub fn color_id_for_general_purpose_string(text: &str) -> u32 {
    xxh32(text.as_bytes(), 0) % NUM_GENERAL_PURPOSE_COLOR_IDS
}

/// Stable color id for a reserved color name (the `cname` event field).
pub fn color_id_for_reserved_name(name: &str) -> u32 {
    NUM_GENERAL_PURPOSE_COLOR_IDS + xxh32(name.as_bytes(), 0) % NUM_RESERVED_COLOR_IDS
}
