//! Multiple APIC Description Table (MADT) parsing.
//!
//! The MADT describes the interrupt controller topology of the system. The
//! generator only needs the processor-local entries, but the walker keeps the
//! byte offset of every entry so a field can be rewritten in place.

use crate::sdt::SdtHeader;

/// MADT table signature (`b"APIC"`).
pub const MADT_SIGNATURE: &[u8; 4] = b"APIC";

/// Size of the fixed MADT fields after the SDT header (address + flags).
const FIELDS_SIZE: usize = 8;

/// A single MADT interrupt controller structure entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MadtEntry {
    /// Type 0: Processor Local APIC.
    LocalApic {
        /// ACPI processor UID.
        acpi_processor_id: u8,
        /// The processor's local APIC ID.
        apic_id: u8,
        /// Flags (bit 0: enabled, bit 1: online capable).
        flags: u32,
    },
    /// Type 1: I/O APIC.
    IoApic {
        /// The I/O APIC ID.
        io_apic_id: u8,
        /// Physical address of the I/O APIC registers.
        io_apic_address: u32,
        /// Global System Interrupt base for this I/O APIC.
        gsi_base: u32,
    },
    /// Type 9: Processor Local x2APIC.
    LocalX2Apic {
        /// The processor's x2APIC ID.
        x2apic_id: u32,
        /// Flags.
        flags: u32,
        /// ACPI processor UID.
        acpi_processor_uid: u32,
    },
    /// An entry type that we do not parse.
    Unknown {
        /// The entry type byte.
        entry_type: u8,
        /// The entry length including the 2-byte header.
        length: u8,
    },
}

impl MadtEntry {
    /// Offset of the processor-id byte inside a type-0 entry.
    pub const LOCAL_APIC_PROCESSOR_ID: usize = 2;
}

fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    let b = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Iterator over `(table offset, entry)` pairs of a raw MADT.
#[derive(Clone)]
pub struct MadtEntryIter<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Walks the entries of a raw `APIC` table (header included).
#[must_use]
pub fn entries(raw: &[u8]) -> MadtEntryIter<'_> {
    MadtEntryIter { data: raw, pos: SdtHeader::SIZE + FIELDS_SIZE }
}

impl Iterator for MadtEntryIter<'_> {
    type Item = (usize, MadtEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.pos;
        let entry_type = *self.data.get(offset)?;
        let length = *self.data.get(offset + 1)?;
        if length < 2 || offset + length as usize > self.data.len() {
            return None;
        }
        let body = &self.data[offset..offset + length as usize];
        self.pos += length as usize;

        let entry = match (entry_type, length) {
            (0, 8..) => MadtEntry::LocalApic {
                acpi_processor_id: body[2],
                apic_id: body[3],
                flags: u32_at(body, 4)?,
            },
            (1, 12..) => MadtEntry::IoApic {
                io_apic_id: body[2],
                io_apic_address: u32_at(body, 4)?,
                gsi_base: u32_at(body, 8)?,
            },
            (9, 16..) => MadtEntry::LocalX2Apic {
                x2apic_id: u32_at(body, 4)?,
                flags: u32_at(body, 8)?,
                acpi_processor_uid: u32_at(body, 12)?,
            },
            _ => MadtEntry::Unknown { entry_type, length },
        };
        Some((offset, entry))
    }
}

/// Returns the table offset and processor id of the first Processor Local
/// APIC entry.
#[must_use]
pub fn first_local_apic(raw: &[u8]) -> Option<(usize, u8)> {
    entries(raw).find_map(|(offset, entry)| match entry {
        MadtEntry::LocalApic { acpi_processor_id, .. } => {
            Some((offset + MadtEntry::LOCAL_APIC_PROCESSOR_ID, acpi_processor_id))
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdt::build_header;

    fn madt(entries: &[&[u8]]) -> Vec<u8> {
        let body: Vec<u8> = entries.concat();
        let mut raw = build_header(MADT_SIGNATURE, b"APIC    ", FIELDS_SIZE + body.len());
        raw.extend_from_slice(&0xFEE0_0000u32.to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&body);
        raw
    }

    #[test]
    fn walks_mixed_entries() {
        let raw = madt(&[
            &[1, 12, 2, 0, 0, 0, 0xC0, 0xFE, 0, 0, 0, 0],
            &[0, 8, 1, 0, 1, 0, 0, 0],
            &[0, 8, 2, 1, 1, 0, 0, 0],
        ]);
        let all: Vec<_> = entries(&raw).map(|(_, e)| e).collect();
        assert_eq!(all.len(), 3);
        assert!(matches!(all[0], MadtEntry::IoApic { io_apic_id: 2, .. }));
        assert_eq!(first_local_apic(&raw), Some((44 + 12 + 2, 1)));
    }

    #[test]
    fn stops_on_zero_length_entry() {
        let raw = madt(&[&[0, 0, 0, 0]]);
        assert_eq!(entries(&raw).count(), 0);
    }
}
