//! Byte-level helpers for AML patching.
//!
//! [`AmlCorpus`] is the concatenation of every loaded table with a position
//! index keyed by the first two bytes of each offset, so occurrence counts do
//! not rescan the whole corpus for every candidate pad.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::ops::Range;

use crate::AcpiError;

/// Decodes a hex string, ignoring any non-hex characters (spaces, `:`).
///
/// # Errors
///
/// Returns [`AcpiError::InvalidHex`] carrying the input unchanged if the
/// remaining digits are of odd length or empty.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, AcpiError> {
    let digits: String = s.chars().filter(char::is_ascii_hexdigit).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(AcpiError::InvalidHex(s.to_string()));
    }
    hex::decode(&digits).map_err(|_| AcpiError::InvalidHex(s.to_string()))
}

/// Formats a byte as two uppercase hex digits.
#[must_use]
pub fn int_to_hex(n: u8) -> String {
    format!("{n:02X}")
}

/// Uppercase hex of a byte slice with no separators.
#[must_use]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Reverses the byte order of a hex string: `"001F0000"` becomes `"00001F00"`.
///
/// A trailing odd nibble is dropped.
#[must_use]
pub fn to_little_endian_hex(s: &str) -> String {
    let digits: Vec<char> = s.chars().filter(char::is_ascii_hexdigit).collect();
    let mut out = String::with_capacity(digits.len());
    for pair in digits.chunks_exact(2).rev() {
        let _ = write!(out, "{}{}", pair[0].to_ascii_uppercase(), pair[1].to_ascii_uppercase());
    }
    out
}

/// Returns the offset of the first occurrence of `needle` in `haystack` at
/// or after `from`.
#[must_use]
pub fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Every offset at which `needle` occurs in `haystack`, overlaps included.
#[must_use]
pub fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter_map(|(i, w)| (w == needle).then_some(i))
        .collect()
}

/// All loaded raw AML, concatenated in load order.
#[derive(Debug, Clone, Default)]
pub struct AmlCorpus {
    data: Vec<u8>,
    spans: Vec<(String, Range<usize>)>,
    index: HashMap<[u8; 2], Vec<usize>>,
}

impl AmlCorpus {
    /// Builds the corpus from `(slot, raw bytes)` pairs.
    pub fn new<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut data = Vec::new();
        let mut spans = Vec::new();
        for (slot, raw) in tables {
            let start = data.len();
            data.extend_from_slice(raw);
            spans.push((slot.to_string(), start..data.len()));
        }
        let mut index: HashMap<[u8; 2], Vec<usize>> = HashMap::new();
        for (i, w) in data.windows(2).enumerate() {
            index.entry([w[0], w[1]]).or_default().push(i);
        }
        Self { data, spans, index }
    }

    /// Total corpus length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no table is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte range a table occupies inside the corpus.
    #[must_use]
    pub fn span(&self, slot: &str) -> Option<Range<usize>> {
        self.spans.iter().find(|(s, _)| s == slot).map(|(_, r)| r.clone())
    }

    /// Raw bytes of one table.
    #[must_use]
    pub fn table(&self, slot: &str) -> Option<&[u8]> {
        self.span(slot).map(|r| &self.data[r])
    }

    /// Absolute corpus offsets at which `needle` occurs.
    #[must_use]
    pub fn positions(&self, needle: &[u8]) -> Vec<usize> {
        match needle.len() {
            0 => Vec::new(),
            1 => self
                .data
                .iter()
                .enumerate()
                .filter_map(|(i, b)| (*b == needle[0]).then_some(i))
                .collect(),
            n => self
                .index
                .get(&[needle[0], needle[1]])
                .map(|starts| {
                    starts
                        .iter()
                        .copied()
                        .filter(|&p| self.data.get(p..p + n) == Some(needle))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Number of times `needle` occurs across every loaded table.
    #[must_use]
    pub fn count_occurrences(&self, needle: &[u8]) -> usize {
        self.positions(needle).len()
    }

    /// Finds the shortest `(left, right)` context around `pattern` so that
    /// `left + pattern + right` occurs exactly once in the corpus.
    ///
    /// The pattern is located at its first occurrence at or after `anchor`
    /// (a byte offset inside table `slot`). Pads never extend past that
    /// table's bounds. Three growth strategies are tried (left only, right
    /// only, and alternating left then right) and the shortest result wins.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::TableNotFound`], [`AcpiError::PatternNotFound`]
    /// or [`AcpiError::NotUnique`].
    pub fn shortest_unique_pad(
        &self,
        slot: &str,
        pattern: &[u8],
        anchor: usize,
    ) -> Result<(Vec<u8>, Vec<u8>), AcpiError> {
        let table = self.table(slot).ok_or_else(|| AcpiError::TableNotFound(slot.to_string()))?;
        let pos = find_from(table, pattern, anchor).ok_or_else(|| AcpiError::PatternNotFound {
            pattern: bytes_to_hex(pattern),
            table: slot.to_string(),
            offset: anchor,
        })?;
        let (l, r) = self.pad_at(table, pos, pattern.len()).ok_or_else(|| AcpiError::NotUnique {
            pattern: bytes_to_hex(pattern),
            table: slot.to_string(),
            offset: anchor,
        })?;
        Ok((table[pos - l..pos].to_vec(), table[pos + pattern.len()..pos + pattern.len() + r].to_vec()))
    }

    fn pad_at(&self, table: &[u8], pos: usize, len: usize) -> Option<(usize, usize)> {
        let max_l = pos;
        let max_r = table.len() - pos - len;
        let unique = |l: usize, r: usize| self.count_occurrences(&table[pos - l..pos + len + r]) == 1;

        let mut best: Option<(usize, usize)> = None;
        let fits = |best: Option<(usize, usize)>, total: usize| best.is_none_or(|(bl, br)| total < bl + br);

        for l in 0..=max_l {
            if !fits(best, l) {
                break;
            }
            if unique(l, 0) {
                best = Some((l, 0));
                break;
            }
        }
        for r in 0..=max_r {
            if !fits(best, r) {
                break;
            }
            if unique(0, r) {
                best = Some((0, r));
                break;
            }
        }
        let (mut l, mut r) = (0, 0);
        while fits(best, l + r) {
            if unique(l, r) {
                best = Some((l, r));
                break;
            }
            if l == max_l && r == max_r {
                break;
            }
            if (l <= r && l < max_l) || r == max_r {
                l += 1;
            } else {
                r += 1;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips_and_rejects_odd_lengths() {
        assert_eq!(hex_to_bytes("5F 53 54 41").unwrap(), b"_STA".to_vec());
        assert!(matches!(hex_to_bytes("ABC"), Err(AcpiError::InvalidHex(s)) if s == "ABC"));
        assert_eq!(int_to_hex(0x0f), "0F");
        assert_eq!(to_little_endian_hex("001F0000"), "00001F00");
    }

    #[test]
    fn counts_span_every_table() {
        let corpus = AmlCorpus::new([("DSDT", &b"xx_STAyy"[..]), ("SSDT-1", &b"_STAzz"[..])]);
        assert_eq!(corpus.count_occurrences(b"_STA"), 2);
        assert_eq!(corpus.count_occurrences(b"z"), 2);
        assert_eq!(corpus.span("SSDT-1"), Some(8..14));
    }

    #[test]
    fn pad_grows_until_unique() {
        let dsdt = b"AB_STACD__EF_STAGH".to_vec();
        let corpus = AmlCorpus::new([("DSDT", dsdt.as_slice())]);
        let (l, r) = corpus.shortest_unique_pad("DSDT", b"_STA", 10).unwrap();
        let mut padded = l.clone();
        padded.extend_from_slice(b"_STA");
        padded.extend_from_slice(&r);
        assert_eq!(corpus.count_occurrences(&padded), 1);
        assert_eq!(l.len() + r.len(), 1);
    }

    #[test]
    fn pad_fails_when_pattern_repeats_whole_table() {
        let corpus = AmlCorpus::new([("DSDT", &b"ABAB"[..]), ("SSDT-1", &b"ABAB"[..])]);
        assert!(matches!(
            corpus.shortest_unique_pad("DSDT", b"AB", 0),
            Err(AcpiError::NotUnique { .. })
        ));
    }
}
