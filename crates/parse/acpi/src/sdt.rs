//! System Description Table (SDT) header and checksum utilities.

/// Standard ACPI System Description Table header.
///
/// This 36-byte header is present at the start of every ACPI table dumped
/// from firmware (DSDT, SSDT, APIC, FACP, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdtHeader {
    /// 4-byte ASCII signature identifying the table type.
    pub signature: [u8; 4],
    /// Total length of the table, including the header, in bytes.
    pub length: u32,
    /// Revision of the table structure.
    pub revision: u8,
    /// Checksum byte. The entire table, including the header, must sum to zero.
    pub checksum: u8,
    /// OEM-supplied identification string.
    pub oem_id: [u8; 6],
    /// OEM-supplied table identification string.
    pub oem_table_id: [u8; 8],
    /// OEM-supplied revision number.
    pub oem_revision: u32,
    /// Vendor ID of the utility that created the table.
    pub creator_id: u32,
    /// Revision of the utility that created the table.
    pub creator_revision: u32,
}

/// Offset of the checksum byte within the header.
pub const CHECKSUM_OFFSET: usize = 9;

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

impl SdtHeader {
    /// The size of an SDT header in bytes.
    pub const SIZE: usize = 36;

    /// Read an [`SdtHeader`] from a byte slice.
    ///
    /// Returns `None` if the slice is shorter than [`SdtHeader::SIZE`] bytes.
    #[must_use]
    pub fn read_from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[0..4]);
        let mut oem_id = [0u8; 6];
        oem_id.copy_from_slice(&data[10..16]);
        let mut oem_table_id = [0u8; 8];
        oem_table_id.copy_from_slice(&data[16..24]);
        Some(Self {
            signature,
            length: u32_at(data, 4),
            revision: data[8],
            checksum: data[CHECKSUM_OFFSET],
            oem_id,
            oem_table_id,
            oem_revision: u32_at(data, 24),
            creator_id: u32_at(data, 28),
            creator_revision: u32_at(data, 32),
        })
    }

    /// Returns the signature as a string (`"DSDT"`).
    #[must_use]
    pub fn signature_str(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }

    /// Returns the OEM table id with trailing spaces and NULs removed.
    #[must_use]
    pub fn oem_table_id_str(&self) -> String {
        String::from_utf8_lossy(&self.oem_table_id)
            .trim_end_matches([' ', '\0'])
            .to_string()
    }
}

/// Validate the checksum of a byte slice.
///
/// ACPI tables are designed so that the sum of all bytes in the table equals
/// zero (mod 256). This function computes that sum and returns `true` when
/// the checksum is valid.
#[must_use]
pub fn validate_checksum(data: &[u8]) -> bool {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)) == 0
}

/// Rewrites the checksum byte so the table sums to zero again.
///
/// Does nothing on slices shorter than a header.
pub fn fix_checksum(data: &mut [u8]) {
    if data.len() < SdtHeader::SIZE {
        return;
    }
    data[CHECKSUM_OFFSET] = 0;
    let sum = data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));
    data[CHECKSUM_OFFSET] = 0u8.wrapping_sub(sum);
}

/// Builds a header for tests and synthetic tables. The checksum is left zero.
#[must_use]
pub fn build_header(signature: &[u8; 4], oem_table_id: &[u8; 8], body_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(SdtHeader::SIZE + body_len);
    out.extend_from_slice(signature);
    let length = u32::try_from(SdtHeader::SIZE + body_len).unwrap_or(u32::MAX);
    out.extend_from_slice(&length.to_le_bytes());
    out.push(2);
    out.push(0);
    out.extend_from_slice(b"OCFRGE");
    out.extend_from_slice(oem_table_id);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(b"INTL");
    out.extend_from_slice(&0x2022_0331u32.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_are_little_endian() {
        let mut raw = build_header(b"DSDT", b"CpuPm\0\0\0", 4);
        raw.extend_from_slice(&[1, 2, 3, 4]);
        let header = SdtHeader::read_from_bytes(&raw).unwrap();
        assert_eq!(header.signature_str(), "DSDT");
        assert_eq!(header.length, 40);
        assert_eq!(header.oem_table_id_str(), "CpuPm");
        assert!(SdtHeader::read_from_bytes(&raw[..20]).is_none());
    }

    #[test]
    fn fix_checksum_makes_table_valid() {
        let mut raw = build_header(b"APIC", b"APIC    ", 2);
        raw.extend_from_slice(&[0xAA, 0x55]);
        fix_checksum(&mut raw);
        assert!(validate_checksum(&raw));
    }
}
