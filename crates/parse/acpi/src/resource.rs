//! ACPI small resource descriptors.
//!
//! Parses the byte-encoded small descriptors found inside `_CRS` buffers as
//! defined in ACPI 6.5 §6.4.2. Only the forms the IRQ and RTC fixes rewrite
//! are decoded; everything else is surfaced as [`SmallResource::Other`].

/// Tag byte of an `IRQNoFlags` descriptor (type 0x04, length 2).
pub const IRQ_NO_FLAGS_TAG: u8 = 0x22;
/// Tag byte of an `IRQ` descriptor with a flags byte (type 0x04, length 3).
pub const IRQ_TAG: u8 = 0x23;
/// Tag byte of an `IO` descriptor (type 0x08, length 7).
pub const IO_TAG: u8 = 0x47;
/// Tag byte of an end tag (type 0x0F, length 1).
pub const END_TAG: u8 = 0x79;

/// A decoded small resource descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallResource {
    /// IRQ descriptor (tags 0x22/0x23).
    Irq {
        /// 16-bit IRQ bitmask.
        mask: u16,
        /// Flags byte when present (tag 0x23).
        flags: Option<u8>,
    },
    /// I/O port range (tag 0x47).
    Io {
        /// Decode type (1 = 16-bit).
        decode: u8,
        /// Minimum base address.
        min: u16,
        /// Maximum base address.
        max: u16,
        /// Alignment.
        alignment: u8,
        /// Number of ports.
        length: u8,
    },
    /// End tag.
    End,
    /// Any other small descriptor.
    Other {
        /// Raw tag byte.
        tag: u8,
    },
}

impl SmallResource {
    /// Encodes an `IRQNoFlags` descriptor for `irqs`.
    #[must_use]
    pub fn irq_no_flags(irqs: &[u8]) -> [u8; 3] {
        let [lo, hi] = irqs_to_mask(irqs).to_le_bytes();
        [IRQ_NO_FLAGS_TAG, lo, hi]
    }
}

/// Expands an IRQ bitmask into IRQ numbers.
#[must_use]
pub fn mask_to_irqs(mask: u16) -> Vec<u8> {
    (0..16u8).filter(|i| mask & (1 << i) != 0).collect()
}

/// Folds IRQ numbers into a bitmask; numbers above 15 are ignored.
#[must_use]
pub fn irqs_to_mask(irqs: &[u8]) -> u16 {
    irqs.iter().filter(|&&i| i < 16).fold(0, |m, &i| m | (1 << i))
}

/// Iterator over `(offset, descriptor)` pairs of a resource template.
///
/// Stops at the end tag, at a large descriptor, or on truncated data.
#[derive(Clone)]
pub struct SmallResourceIter<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> SmallResourceIter<'a> {
    /// Walks descriptors starting at `data[0]`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, done: false }
    }

    fn read_u16_le(&self, at: usize) -> Option<u16> {
        let lo = u16::from(*self.data.get(at)?);
        let hi = u16::from(*self.data.get(at + 1)?);
        Some(lo | (hi << 8))
    }
}

impl Iterator for SmallResourceIter<'_> {
    type Item = (usize, SmallResource);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let offset = self.pos;
        let tag = *self.data.get(offset)?;
        if tag & 0x80 != 0 {
            self.done = true;
            return None;
        }
        let length = usize::from(tag & 0x07);
        if offset + 1 + length > self.data.len() {
            self.done = true;
            return None;
        }
        self.pos += 1 + length;
        let body = offset + 1;

        let res = match (tag >> 3) & 0x0F {
            0x04 if length >= 2 => SmallResource::Irq {
                mask: self.read_u16_le(body)?,
                flags: (length >= 3).then(|| self.data[body + 2]),
            },
            0x08 if length >= 7 => SmallResource::Io {
                decode: self.data[body],
                min: self.read_u16_le(body + 1)?,
                max: self.read_u16_le(body + 3)?,
                alignment: self.data[body + 5],
                length: self.data[body + 6],
            },
            0x0F => {
                self.done = true;
                SmallResource::End
            }
            _ => SmallResource::Other { tag },
        };
        Some((offset, res))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_irq_and_io_descriptors() {
        let data = [0x47, 0x01, 0x70, 0x00, 0x70, 0x00, 0x01, 0x08, 0x22, 0x00, 0x01, 0x79, 0x00];
        let all: Vec<_> = SmallResourceIter::new(&data).collect();
        assert_eq!(all.len(), 3);
        assert!(matches!(all[0].1, SmallResource::Io { min: 0x70, length: 8, .. }));
        assert_eq!(all[1], (8, SmallResource::Irq { mask: 0x0100, flags: None }));
        assert_eq!(all[2].1, SmallResource::End);
    }

    #[test]
    fn masks_round_trip() {
        assert_eq!(mask_to_irqs(irqs_to_mask(&[0, 8, 11])), vec![0, 8, 11]);
        assert_eq!(SmallResource::irq_no_flags(&[0, 8, 11]), [0x22, 0x01, 0x09]);
    }
}
