//! The region manager and the global enable control.

use arrayvec::ArrayVec;

use crate::bus::{
    MpuBus, CTRL_ENABLE, CTRL_HFNMIENA, CTRL_PRIVDEFENA, RBAR_VALID, TYPE_DREGION_MASK,
    TYPE_DREGION_SHIFT,
};
use crate::codec;
use crate::{ConfigError, Region, Size, Subregions};

/// The most region slots a Cortex-M0+ MPU implements; capacity of the
/// batch region lists.
pub const MAX_REGIONS: usize = 8;

/// Driver for the Cortex-M0+ Memory Protection Unit.
///
/// Region descriptors are validated in full before the first register
/// write, so a failed call never leaves a half-applied slot behind. Every
/// successful update ends with a DSB/ISB pair: the register writes are
/// globally visible and stale instruction fetches are discarded before
/// control returns to the caller.
///
/// A violation of an enforced region raises a *HardFault*; the Cortex-M0+
/// has no dedicated memory management exception.
///
/// The driver never masks interrupts. A caller that must keep a handler
/// from observing a partially-applied multi-region transition wraps the
/// calls in `cortex_m::interrupt::free`.
pub struct Mpu<B: MpuBus> {
    bus: B,
    region_count: u8,
}

impl<B: MpuBus> Mpu<B> {
    /// The smallest supported region size.
    pub const MIN_REGION_SIZE: Size = Size::S256B;

    /// The smallest region size that can be split into subregions.
    ///
    /// Regions below this must keep [`Subregions::ALL`].
    pub const MIN_SUBDIVIDABLE_SIZE: Size = Size::S256B;

    /// Creates a driver over a register bus.
    ///
    /// The region count is read once from the TYPE register and cached;
    /// it is immutable hardware metadata. A core without an MPU reports
    /// zero regions, making every `configure` fail.
    pub fn with_bus(bus: B) -> Self {
        let region_count = ((bus.read_type() >> TYPE_DREGION_SHIFT) & TYPE_DREGION_MASK) as u8;
        Mpu { bus, region_count }
    }

    /// Consumes `self` and returns the underlying bus.
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Number of region slots reported by the hardware.
    pub fn region_count(&self) -> u8 {
        self.region_count
    }

    /// Applies a region descriptor to its hardware slot.
    ///
    /// The descriptor must name a slot below [`Mpu::region_count`], its
    /// base address must be a multiple of its size (the hardware would
    /// otherwise silently drop the low address bits), and a sub-region
    /// mask is only accepted from [`Mpu::MIN_SUBDIVIDABLE_SIZE`] up.
    ///
    /// The base address word is written before the attributes word so the
    /// address is stable by the time the enable bit lands, then the
    /// DSB/ISB pair publishes the new mapping.
    pub fn configure(&mut self, region: &Region) -> Result<(), ConfigError> {
        let (base_word, attr_word) = self.encode_checked(region)?;

        self.bus.write_rbar(base_word);
        self.bus.write_rasr(attr_word);
        self.barrier();
        Ok(())
    }

    /// Applies several regions as one update and disables every slot they
    /// do not mention.
    ///
    /// All descriptors are validated before the first register write, so
    /// a failed call leaves the hardware untouched. Descriptors are
    /// applied in order; if two name the same slot the later one wins.
    /// One DSB/ISB pair follows the whole update.
    pub fn configure_all(
        &mut self,
        regions: &ArrayVec<[Region; MAX_REGIONS]>,
    ) -> Result<(), ConfigError> {
        let mut words = ArrayVec::<[(u32, u32); MAX_REGIONS]>::new();
        let mut mentioned = 0u32;
        for region in regions {
            words.push(self.encode_checked(region)?);
            mentioned |= 1 << region.index;
        }

        for &(base_word, attr_word) in &words {
            self.bus.write_rbar(base_word);
            self.bus.write_rasr(attr_word);
        }
        for index in 0..self.addressable_regions() {
            if mentioned & (1 << index) == 0 {
                self.disable_slot(index);
            }
        }
        self.barrier();
        Ok(())
    }

    /// Disables one region slot.
    pub fn disable_region(&mut self, index: u8) -> Result<(), ConfigError> {
        if index >= self.region_count {
            return Err(ConfigError::IndexOutOfRange);
        }

        self.disable_slot(index);
        self.barrier();
        Ok(())
    }

    /// Disables every region slot.
    ///
    /// Useful at boot when a bootloader may have left regions behind.
    pub fn clear_regions(&mut self) {
        for index in 0..self.addressable_regions() {
            self.disable_slot(index);
        }
        self.barrier();
    }

    /// Reads back the descriptor currently held in a region slot.
    ///
    /// Fails with [`ConfigError::IndexOutOfRange`] for a slot the
    /// hardware does not have, and propagates the codec errors if the
    /// slot holds a reserved encoding (eg. from a bootloader).
    pub fn read_region(&mut self, index: u8) -> Result<Region, ConfigError> {
        if index >= self.region_count {
            return Err(ConfigError::IndexOutOfRange);
        }

        self.bus.write_rnr(u32::from(index));
        let (base_addr, _) = codec::decode_base_address(self.bus.read_rbar());
        let attrs = codec::decode_attributes(self.bus.read_rasr())?;
        Ok(Region {
            index,
            base_addr,
            attrs,
        })
    }

    /// Turns the MPU on.
    ///
    /// With `privileged_default_map`, privileged accesses that hit no
    /// enabled region fall back to the default memory map instead of
    /// faulting (PRIVDEFENA). With `enable_in_fault_handlers`, the MPU
    /// stays enforced inside HardFault and NMI handlers (HFNMIENA);
    /// otherwise those handlers run against the default map.
    ///
    /// The control write is followed by the DSB/ISB pair, so protection
    /// is in force before this returns.
    pub fn enable(&mut self, privileged_default_map: bool, enable_in_fault_handlers: bool) {
        let mut ctrl = CTRL_ENABLE;
        if privileged_default_map {
            ctrl |= CTRL_PRIVDEFENA;
        }
        if enable_in_fault_handlers {
            ctrl |= CTRL_HFNMIENA;
        }

        self.bus.write_ctrl(ctrl);
        self.barrier();
    }

    /// Turns the MPU off.
    ///
    /// A DMB precedes the clearing write so outstanding accesses complete
    /// under the old mapping, then the usual DSB/ISB pair follows it.
    /// The region registers keep their values; they are merely no longer
    /// enforced.
    pub fn disable(&mut self) {
        self.bus.dmb();
        self.bus.write_ctrl(0);
        self.barrier();
    }

    /// Whether the MPU is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.bus.read_ctrl() & CTRL_ENABLE != 0
    }

    /// Validates a descriptor and returns its `(RBAR, RASR)` encoding.
    ///
    /// Performs every check before anything is written anywhere: index
    /// bound, natural alignment, sub-region applicability.
    fn encode_checked(&self, region: &Region) -> Result<(u32, u32), ConfigError> {
        let base_word =
            codec::encode_base_address(region.base_addr, region.index, self.region_count)?;

        if u64::from(region.base_addr) % region.attrs.size.bytes() != 0 {
            return Err(ConfigError::MisalignedBaseAddress);
        }
        if region.attrs.size < Self::MIN_SUBDIVIDABLE_SIZE
            && region.attrs.subregions != Subregions::ALL
        {
            return Err(ConfigError::SubRegionMaskNotApplicable);
        }

        Ok((base_word, codec::encode_attributes(&region.attrs)))
    }

    fn disable_slot(&mut self, index: u8) {
        self.bus.write_rbar(RBAR_VALID | u32::from(index));
        self.bus.write_rasr(0);
    }

    /// Slots the 4-bit RBAR REGION field can address.
    fn addressable_regions(&self) -> u8 {
        self.region_count.min(16)
    }

    fn barrier(&mut self) {
        self.bus.dsb();
        self.bus.isb();
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
impl Mpu<crate::MpuPeripheral> {
    /// Creates the driver from the `MPU` peripheral singleton.
    ///
    /// # Safety
    ///
    /// This is safe to call if the processor is a Cortex-M0+ and has an
    /// MPU.
    pub unsafe fn new(raw: cortex_m::peripheral::MPU) -> Self {
        Mpu::with_bus(crate::MpuPeripheral::new(raw))
    }
}
