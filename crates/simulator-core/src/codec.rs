//! Conversions between composite values and their big-endian word layout.

/// Splits `value` into `[high, low]` words.
#[must_use]
pub const fn u32_to_words(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, (value & 0xFFFF) as u16]
}

/// Joins `[high, low]` words into a 32-bit value.
#[must_use]
pub const fn words_to_u32(words: [u16; 2]) -> u32 {
    ((words[0] as u32) << 16) | words[1] as u32
}

/// Splits an IEEE-754 binary32 value into `[high, low]` words.
#[must_use]
pub const fn f32_to_words(value: f32) -> [u16; 2] {
    u32_to_words(value.to_bits())
}

/// Joins `[high, low]` words into an IEEE-754 binary32 value.
#[must_use]
pub const fn words_to_f32(words: [u16; 2]) -> f32 {
    f32::from_bits(words_to_u32(words))
}

/// Encodes `text` into exactly `word_count` words, two bytes per word with
/// the first byte in the high half, padding the tail with `pad`.
///
/// Returns `None` when the encoded text does not fit.
#[must_use]
pub fn string_to_words(text: &str, word_count: usize, pad: u8) -> Option<Vec<u16>> {
    let bytes = text.as_bytes();
    if bytes.len() > word_count * 2 {
        return None;
    }

    let mut padded = bytes.to_vec();
    padded.resize(word_count * 2, pad);
    Some(
        padded
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

/// Decodes words produced by [`string_to_words`] and strips trailing `pad`
/// and NUL bytes.
#[must_use]
pub fn words_to_string(words: &[u16], pad: u8) -> String {
    let mut bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
    while bytes.last().is_some_and(|byte| *byte == pad || *byte == 0) {
        let _ = bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
