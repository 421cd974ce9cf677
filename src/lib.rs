//! A driver for the Memory Protection Unit (MPU) of Cortex-M0+ (ARMv6-M)
//! microcontrollers.
//!
//! The crate splits the MPU into three layers:
//!
//! * [`MpuBus`]: raw access to the five MPU registers and the memory
//!   barriers. Implemented by `MpuPeripheral` on hardware and by test
//!   doubles on the host.
//! * [`codec`]: pure functions translating a [`Region`] descriptor to and
//!   from the RBAR/RASR register encodings.
//! * [`Mpu`]: validates descriptors against the hardware's alignment and
//!   capability rules, performs the ordered register writes that apply
//!   them, and drives the global enable/disable protocol.
//!
//! Regions may be configured while the MPU is globally disabled; they take
//! effect once [`Mpu::enable`] is called. On the Cortex-M0+ a violation of
//! an enforced region raises a *HardFault* (this core has no dedicated
//! memory management exception).
//!
//! MPU operations are not interrupt-safe with respect to each other: if an
//! interrupt handler may touch the MPU, bracket multi-region updates with
//! `cortex_m::interrupt::free`. The driver never masks interrupts itself,
//! so the interrupt-latency cost stays visible to the caller.

#![no_std]

pub use arrayvec::ArrayVec;

mod bus;
pub mod codec;
mod mpu;

pub use crate::bus::MpuBus;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use crate::bus::MpuPeripheral;
pub use crate::mpu::{Mpu, MAX_REGIONS};

/// Errors reported when a region descriptor fails validation.
///
/// All of these are deterministic caller errors, detected before any
/// register is written. A failed call leaves the hardware untouched.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The region index is not below the hardware-reported region count.
    IndexOutOfRange,
    /// The base address is not a multiple of the region size.
    ///
    /// The hardware would silently mask the low address bits and protect
    /// an unintended range, so this is never truncated away.
    MisalignedBaseAddress,
    /// A reserved access permission encoding was supplied.
    InvalidPermission,
    /// A reserved memory type encoding was supplied.
    InvalidMemoryType,
    /// A sub-region disable mask was given for a region too small to be
    /// subdivided.
    SubRegionMaskNotApplicable,
}

/// A full MPU region descriptor: which slot it occupies, where it starts,
/// and the attribute payload.
///
/// Writing a descriptor to a slot replaces the previous contents of that
/// slot entirely; base address and attributes are always rewritten
/// together.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    /// Hardware region slot, `0..region_count`.
    pub index: u8,
    /// Starting address of the region (lowest address).
    ///
    /// This must be naturally aligned, ie. a multiple of the region size.
    pub base_addr: u32,
    /// Size, permissions and memory type of the region.
    pub attrs: RegionAttributes,
}

/// The attribute payload of a region: everything that lives in the
/// attribute/size word, as opposed to the base address and slot index in
/// the base address word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionAttributes {
    /// Whether the region is active.
    ///
    /// An enabled region is only enforced while the MPU itself is enabled.
    pub enabled: bool,
    /// Size of the region.
    pub size: Size,
    /// The subregions to enable or disable.
    pub subregions: Subregions,
    /// Whether to allow instruction fetches from this region.
    ///
    /// If this is `false`, the region will be marked as XN (eXecute
    /// Never).
    pub executable: bool,
    /// Data access permissions for the region.
    pub permissions: AccessPermission,
    /// Memory type of the region.
    pub memory: MemoryType,
}

/// Data access permissions for a memory region.
///
/// The values are the 3-bit AP field encodings. The reserved encodings
/// (`0b100` and `0b111`) are not representable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessPermission {
    /// Any access (privileged or not) generates a fault.
    NoAccess = 0b000,

    /// Privileged read-write access; any unprivileged access faults.
    PrivilegedReadWrite = 0b001,

    /// Privileged read-write access; unprivileged writes fault.
    PrivilegedReadWriteUnprivilegedReadOnly = 0b010,

    /// Full access at any privilege level.
    ReadWrite = 0b011,

    /// Privileged read-only access; any unprivileged access faults.
    PrivilegedReadOnly = 0b101,

    /// Read-only at any privilege level; all writes fault.
    ReadOnly = 0b110,
}

impl AccessPermission {
    /// Decodes a raw 3-bit AP field value.
    ///
    /// Returns `None` for the reserved encodings.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b000 => Some(AccessPermission::NoAccess),
            0b001 => Some(AccessPermission::PrivilegedReadWrite),
            0b010 => Some(AccessPermission::PrivilegedReadWriteUnprivilegedReadOnly),
            0b011 => Some(AccessPermission::ReadWrite),
            0b101 => Some(AccessPermission::PrivilegedReadOnly),
            0b110 => Some(AccessPermission::ReadOnly),
            _ => None,
        }
    }

    /// Returns the raw 3-bit AP field value.
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Memory type of a region.
///
/// The reserved encodings are not representable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryType {
    /// Strongly-ordered memory: all accesses complete in program order,
    /// never buffered. Always considered shareable.
    StronglyOrdered = 0b000,

    /// Device peripheral memory.
    Device = 0b001,

    /// Normal memory (ie. "actual" memory, such as Flash or SRAM).
    Normal = 0b010,
}

impl MemoryType {
    /// Decodes a raw memory type field value.
    ///
    /// Returns `None` for the reserved encodings.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b000 => Some(MemoryType::StronglyOrdered),
            0b001 => Some(MemoryType::Device),
            0b010 => Some(MemoryType::Normal),
            _ => None,
        }
    }

    /// Returns the raw memory type field value.
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Subregion Disable (SRD) bits for the 8 subregions in a region.
///
/// Each set bit disables one eighth of the region, starting with the
/// lowest-addressed eighth at bit 0. Regions smaller than
/// [`Mpu::MIN_SUBDIVIDABLE_SIZE`] cannot be subdivided and must use
/// [`Subregions::ALL`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Subregions(u8);

impl Subregions {
    /// None of the 8 subregions are enabled. Equivalent to disabling the
    /// entire region.
    pub const NONE: Self = Subregions(0xff);

    /// All 8 subregions are enabled.
    pub const ALL: Self = Subregions(0);

    /// Creates a `Subregions` mask from raw Subregion Disable (SRD) bits.
    ///
    /// The least significant bit disables the lowest 1/8th of the region,
    /// and so on.
    pub const fn from_disable_bits(bits: u8) -> Self {
        Subregions(bits)
    }

    /// Returns the raw 8-bit Subregion Disable Bits value.
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// By default, all subregions are enabled.
impl Default for Subregions {
    fn default() -> Self {
        Self::ALL
    }
}

/// Memory region size value (5 bits).
///
/// A raw value of `n` encodes a region size of `2^(n+1)` bytes. Memory
/// regions must have a power-of-two size, and their base address must be
/// naturally aligned (ie. aligned to their size).
///
/// The Cortex-M0+ only supports sizes of [`Mpu::MIN_REGION_SIZE`] (256
/// bytes) and up; the smaller values exist because other cores in the
/// family accept them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Size(u8);

impl Size {
    pub const S32B: Self = Size(4);

    pub const S64B: Self = Size(5);

    pub const S128B: Self = Size(6);

    pub const S256B: Self = Size(7);

    pub const S512B: Self = Size(8);

    pub const S1K: Self = Size(9);

    pub const S2K: Self = Size(10);

    pub const S4K: Self = Size(11);

    pub const S8K: Self = Size(12);

    pub const S16K: Self = Size(13);

    pub const S32K: Self = Size(14);

    pub const S64K: Self = Size(15);

    pub const S128K: Self = Size(16);

    pub const S256K: Self = Size(17);

    pub const S512K: Self = Size(18);

    pub const S1M: Self = Size(19);

    pub const S2M: Self = Size(20);

    pub const S4M: Self = Size(21);

    pub const S8M: Self = Size(22);

    pub const S16M: Self = Size(23);

    pub const S32M: Self = Size(24);

    pub const S64M: Self = Size(25);

    pub const S128M: Self = Size(26);

    pub const S256M: Self = Size(27);

    pub const S512M: Self = Size(28);

    pub const S1G: Self = Size(29);

    pub const S2G: Self = Size(30);

    /// The entire 4 GiB memory space.
    pub const S4G: Self = Size(31);

    /// Creates a `Size` from a raw 5-bit value.
    ///
    /// The `bits` encode a region size of `2^(bits + 1)`. For example, a
    /// 1 KiB region would use `0b01001` (9): `2^(9+1) = 2^10 = 1024`.
    pub const fn from_raw_bits(bits: u8) -> Self {
        Size(bits & 0x1f)
    }

    /// Creates a `Size` from a size in bytes.
    ///
    /// Returns `None` unless `bytes` is a representable power of two
    /// (32 bytes up to 4 GiB).
    pub fn from_bytes(bytes: u64) -> Option<Self> {
        if !bytes.is_power_of_two() {
            return None;
        }
        let exp = bytes.trailing_zeros();
        if exp < 5 || exp > 32 {
            return None;
        }
        Some(Size((exp - 1) as u8))
    }

    /// Returns the raw 5-bit value encoding the region size.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns the region size in bytes, `2^(bits + 1)`.
    ///
    /// `u64` because [`Size::S4G`] covers the entire 32-bit address space.
    pub const fn bytes(self) -> u64 {
        1 << (self.0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_bytes_round_trip() {
        for bits in 4..=31 {
            let size = Size::from_raw_bits(bits);
            assert_eq!(Size::from_bytes(size.bytes()), Some(size));
        }
    }

    #[test]
    fn size_from_bytes_rejects_unrepresentable() {
        assert_eq!(Size::from_bytes(0), None);
        assert_eq!(Size::from_bytes(16), None);
        assert_eq!(Size::from_bytes(100_000), None);
        assert_eq!(Size::from_bytes(3 * 1024), None);
        assert_eq!(Size::from_bytes(1u64 << 33), None);
    }

    #[test]
    fn size_constants_match_encoding() {
        assert_eq!(Size::S256B.bits(), 7);
        assert_eq!(Size::S256B.bytes(), 256);
        assert_eq!(Size::S4K.bits(), 11);
        assert_eq!(Size::S4K.bytes(), 4096);
        assert_eq!(Size::S4G.bytes(), 1 << 32);
    }

    #[test]
    fn permission_bits_round_trip() {
        for bits in 0..8 {
            match AccessPermission::from_bits(bits) {
                Some(ap) => assert_eq!(ap.bits(), bits),
                None => assert!(bits == 0b100 || bits == 0b111),
            }
        }
    }

    #[test]
    fn memory_type_bits_round_trip() {
        for bits in 0..8 {
            match MemoryType::from_bits(bits) {
                Some(mem) => assert_eq!(mem.bits(), bits),
                None => assert!(bits >= 0b011),
            }
        }
    }
}
