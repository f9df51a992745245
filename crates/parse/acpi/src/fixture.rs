//! Synthetic mixed listings for tests.
//!
//! Each item is an ASL line plus the bytes it encodes. A hex line is emitted
//! after every line that has bytes, with offsets counting from the end of
//! the header, the same shape `iasl -l` produces.

use std::fmt::Write as _;

use crate::sdt::{SdtHeader, build_header, fix_checksum};
use crate::table::AcpiTable;

/// Builds `(raw, listing)` for a table.
#[must_use]
pub fn build(signature: &[u8; 4], items: &[(&str, &[u8])]) -> (Vec<u8>, String) {
    build_with_oem(signature, b"OCFTEST ", items)
}

/// [`build`] with an explicit OEM table id.
#[must_use]
pub fn build_with_oem(signature: &[u8; 4], oem_table_id: &[u8; 8], items: &[(&str, &[u8])]) -> (Vec<u8>, String) {
    let body_len: usize = items.iter().map(|(_, b)| b.len()).sum();
    let mut raw = build_header(signature, oem_table_id, body_len);
    let mut listing = String::new();
    for (line, bytes) in items {
        listing.push_str(line);
        listing.push('\n');
        if !bytes.is_empty() {
            let offset = raw.len();
            let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
            let _ = writeln!(listing, "    {offset:08X}: {}  // ....", hex.join(" "));
            raw.extend_from_slice(bytes);
        }
    }
    debug_assert_eq!(raw.len(), SdtHeader::SIZE + body_len);
    fix_checksum(&mut raw);
    (raw, listing)
}

/// Builds a loaded table directly.
///
/// # Panics
///
/// Never; the synthetic header is always valid.
#[must_use]
pub fn table(slot: &str, signature: &[u8; 4], items: &[(&str, &[u8])]) -> AcpiTable {
    let (raw, listing) = build(signature, items);
    AcpiTable::new(slot, raw, &listing).unwrap_or_else(|| unreachable!("synthetic header is valid"))
}
