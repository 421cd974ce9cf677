//! Pure translation between region descriptors and the MPU register
//! encodings.
//!
//! Nothing in this module touches hardware or carries state: identical
//! inputs always produce identical outputs, so every bit position can be
//! checked exhaustively on the host. The bit layout is the ARMv6-M PMSAv7
//! one; it must match the core's reference manual exactly, since a wrong
//! field lands silently in a neighbouring field.

use crate::bus::{
    RASR_AP_MASK, RASR_AP_SHIFT, RASR_ENABLE, RASR_SIZE_MASK, RASR_SIZE_SHIFT, RASR_SRD_MASK,
    RASR_SRD_SHIFT, RASR_TYPE_MASK, RASR_TYPE_SHIFT, RASR_XN, RBAR_ADDR_MASK, RBAR_REGION_MASK,
    RBAR_VALID,
};
use crate::{AccessPermission, ConfigError, MemoryType, RegionAttributes, Size, Subregions};

/// Packs a [`RegionAttributes`] payload into the RASR word.
///
/// The typed descriptor cannot hold a reserved permission or memory type
/// encoding, so this is total; the fallible direction is
/// [`decode_attributes`].
pub fn encode_attributes(attrs: &RegionAttributes) -> u32 {
    let xn = if attrs.executable { 0 } else { RASR_XN };
    let ap = u32::from(attrs.permissions.bits()) << RASR_AP_SHIFT;
    let mem = u32::from(attrs.memory.bits()) << RASR_TYPE_SHIFT;
    let srd = u32::from(attrs.subregions.bits()) << RASR_SRD_SHIFT;
    let size = u32::from(attrs.size.bits()) << RASR_SIZE_SHIFT;
    let enable = if attrs.enabled { RASR_ENABLE } else { 0 };

    xn | ap | mem | srd | size | enable
}

/// Unpacks a RASR word back into a [`RegionAttributes`] payload.
///
/// Fails with [`ConfigError::InvalidPermission`] or
/// [`ConfigError::InvalidMemoryType`] if the word carries one of the
/// reserved field encodings.
pub fn decode_attributes(word: u32) -> Result<RegionAttributes, ConfigError> {
    let ap = ((word >> RASR_AP_SHIFT) & RASR_AP_MASK) as u8;
    let permissions = AccessPermission::from_bits(ap).ok_or(ConfigError::InvalidPermission)?;
    let mem = ((word >> RASR_TYPE_SHIFT) & RASR_TYPE_MASK) as u8;
    let memory = MemoryType::from_bits(mem).ok_or(ConfigError::InvalidMemoryType)?;

    Ok(RegionAttributes {
        enabled: word & RASR_ENABLE != 0,
        size: Size::from_raw_bits(((word >> RASR_SIZE_SHIFT) & RASR_SIZE_MASK) as u8),
        subregions: Subregions::from_disable_bits(((word >> RASR_SRD_SHIFT) & RASR_SRD_MASK) as u8),
        executable: word & RASR_XN == 0,
        permissions,
        memory,
    })
}

/// Packs a base address and region index into the RBAR word.
///
/// The valid bit is set so the write selects the slot by itself, without
/// a separate RNR write. `region_count` is the hardware-reported
/// capability; the codec takes it as a parameter to stay free of hidden
/// state.
///
/// Fails with [`ConfigError::IndexOutOfRange`] if `index` is not below
/// `region_count` or does not fit the 4-bit REGION field.
///
/// The low five address bits do not exist in the register; callers that
/// care about them must check alignment first (the driver does).
pub fn encode_base_address(
    base_addr: u32,
    index: u8,
    region_count: u8,
) -> Result<u32, ConfigError> {
    if index >= region_count || u32::from(index) > RBAR_REGION_MASK {
        return Err(ConfigError::IndexOutOfRange);
    }

    Ok((base_addr & RBAR_ADDR_MASK) | RBAR_VALID | u32::from(index))
}

/// Unpacks an RBAR word into its `(base_address, region_index)` pair.
pub fn decode_base_address(word: u32) -> (u32, u8) {
    (word & RBAR_ADDR_MASK, (word & RBAR_REGION_MASK) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERMISSIONS: [AccessPermission; 6] = [
        AccessPermission::NoAccess,
        AccessPermission::PrivilegedReadWrite,
        AccessPermission::PrivilegedReadWriteUnprivilegedReadOnly,
        AccessPermission::ReadWrite,
        AccessPermission::PrivilegedReadOnly,
        AccessPermission::ReadOnly,
    ];

    const MEMORY_TYPES: [MemoryType; 3] = [
        MemoryType::StronglyOrdered,
        MemoryType::Device,
        MemoryType::Normal,
    ];

    #[test]
    fn attributes_word_layout() {
        // 4 KiB read-write normal region: size exponent 11, AP 0b011.
        let attrs = RegionAttributes {
            enabled: true,
            size: Size::S4K,
            subregions: Subregions::ALL,
            executable: true,
            permissions: AccessPermission::ReadWrite,
            memory: MemoryType::Normal,
        };
        let word = encode_attributes(&attrs);
        assert_eq!(word, 0x0302_0017);
        assert_eq!(word & 1, 1);
        assert_eq!((word >> 1) & 0x1f, 11);
        assert_eq!((word >> 24) & 0x7, 0b011);
    }

    #[test]
    fn execute_never_sets_bit_28() {
        let attrs = RegionAttributes {
            enabled: true,
            size: Size::S256B,
            subregions: Subregions::ALL,
            executable: false,
            permissions: AccessPermission::ReadOnly,
            memory: MemoryType::Device,
        };
        let word = encode_attributes(&attrs);
        assert_eq!(word & (1 << 28), 1 << 28);
        assert_eq!((word >> 16) & 0x7, 0b001);
    }

    #[test]
    fn subregion_bits_land_in_srd_field() {
        let attrs = RegionAttributes {
            enabled: false,
            size: Size::S1K,
            subregions: Subregions::from_disable_bits(0b1010_0101),
            executable: true,
            permissions: AccessPermission::NoAccess,
            memory: MemoryType::StronglyOrdered,
        };
        let word = encode_attributes(&attrs);
        assert_eq!((word >> 8) & 0xff, 0b1010_0101);
        assert_eq!(word & 1, 0);
    }

    #[test]
    fn attributes_round_trip() {
        for &permissions in &PERMISSIONS {
            for &memory in &MEMORY_TYPES {
                for &executable in &[false, true] {
                    for &enabled in &[false, true] {
                        let attrs = RegionAttributes {
                            enabled,
                            size: Size::S64K,
                            subregions: Subregions::from_disable_bits(0x3c),
                            executable,
                            permissions,
                            memory,
                        };
                        assert_eq!(decode_attributes(encode_attributes(&attrs)), Ok(attrs));
                    }
                }
            }
        }
    }

    #[test]
    fn decode_rejects_reserved_permission() {
        for &ap in &[0b100u32, 0b111] {
            let word = (ap << 24) | (0b010 << 16) | 1;
            assert_eq!(decode_attributes(word), Err(ConfigError::InvalidPermission));
        }
    }

    #[test]
    fn decode_rejects_reserved_memory_type() {
        for mem in 0b011u32..=0b111 {
            let word = (0b011 << 24) | (mem << 16) | 1;
            assert_eq!(decode_attributes(word), Err(ConfigError::InvalidMemoryType));
        }
    }

    #[test]
    fn base_address_word_layout() {
        let word = encode_base_address(0x2000_0000, 3, 8).unwrap();
        assert_eq!(word, 0x2000_0013);
        assert_eq!(decode_base_address(word), (0x2000_0000, 3));
    }

    #[test]
    fn base_address_round_trip_is_alignment_precise() {
        // Bits 31:5 survive the trip; the register has no room for less.
        let word = encode_base_address(0x0804_0020, 1, 8).unwrap();
        assert_eq!(decode_base_address(word), (0x0804_0020, 1));
    }

    #[test]
    fn base_address_index_bound() {
        assert_eq!(
            encode_base_address(0x2000_0000, 8, 8),
            Err(ConfigError::IndexOutOfRange)
        );
        assert_eq!(
            encode_base_address(0x2000_0000, 0, 0),
            Err(ConfigError::IndexOutOfRange)
        );
        // The REGION field is four bits even if a core reported more slots.
        assert_eq!(
            encode_base_address(0x2000_0000, 16, 17),
            Err(ConfigError::IndexOutOfRange)
        );
        assert!(encode_base_address(0x2000_0000, 15, 16).is_ok());
    }
}
