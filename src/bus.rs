//! The raw register surface of the MPU.
//!
//! Five 32-bit words at `0xE000_ED90`: TYPE, CTRL, RNR, RBAR and RASR.
//! [`MpuBus`] exposes them together with the barrier instructions the
//! configuration protocol needs; no validation or caching happens at this
//! layer. The driver is generic over the trait so the register writes can
//! be observed by a test double on the host.

/// Enable bit in MPU_CTRL.
pub(crate) const CTRL_ENABLE: u32 = 1 << 0;
/// Enable during HardFault and NMI handlers bit in MPU_CTRL.
pub(crate) const CTRL_HFNMIENA: u32 = 1 << 1;
/// Default memory map for privileged mode bit in MPU_CTRL.
pub(crate) const CTRL_PRIVDEFENA: u32 = 1 << 2;

/// DREGION field of MPU_TYPE: the number of supported regions.
pub(crate) const TYPE_DREGION_SHIFT: u32 = 8;
pub(crate) const TYPE_DREGION_MASK: u32 = 0xff;

/// ADDR field of MPU_RBAR, bits 31:5 in place.
pub(crate) const RBAR_ADDR_MASK: u32 = 0xffff_ffe0;
/// Valid bit of MPU_RBAR: the write also selects the region in REGION.
pub(crate) const RBAR_VALID: u32 = 1 << 4;
/// REGION field of MPU_RBAR.
pub(crate) const RBAR_REGION_MASK: u32 = 0xf;

/// Region enable bit of MPU_RASR.
pub(crate) const RASR_ENABLE: u32 = 1 << 0;
/// SIZE field of MPU_RASR, region size is `2^(SIZE+1)` bytes.
pub(crate) const RASR_SIZE_SHIFT: u32 = 1;
pub(crate) const RASR_SIZE_MASK: u32 = 0x1f;
/// SRD field of MPU_RASR, subregion disable bits.
pub(crate) const RASR_SRD_SHIFT: u32 = 8;
pub(crate) const RASR_SRD_MASK: u32 = 0xff;
/// Memory type field of MPU_RASR.
pub(crate) const RASR_TYPE_SHIFT: u32 = 16;
pub(crate) const RASR_TYPE_MASK: u32 = 0x7;
/// AP field of MPU_RASR, access permissions.
pub(crate) const RASR_AP_SHIFT: u32 = 24;
pub(crate) const RASR_AP_MASK: u32 = 0x7;
/// Instruction access disable bit of MPU_RASR.
pub(crate) const RASR_XN: u32 = 1 << 28;

/// Access to the MPU register block and the synchronization barriers used
/// by the configuration protocol.
///
/// Every method is a single volatile register access or a single barrier
/// instruction. Implementations must not reorder, cache or coalesce them;
/// the [`Mpu`](crate::Mpu) driver depends on the exact sequence reaching
/// the hardware.
pub trait MpuBus {
    /// Reads MPU_TYPE.
    fn read_type(&self) -> u32;

    /// Reads MPU_CTRL.
    fn read_ctrl(&self) -> u32;

    /// Writes MPU_CTRL.
    fn write_ctrl(&mut self, value: u32);

    /// Writes MPU_RNR, selecting the region addressed by RBAR/RASR.
    fn write_rnr(&mut self, value: u32);

    /// Reads MPU_RBAR for the selected region.
    fn read_rbar(&self) -> u32;

    /// Writes MPU_RBAR. With [`RBAR_VALID`] set this also updates the
    /// region selector from the REGION field.
    fn write_rbar(&mut self, value: u32);

    /// Reads MPU_RASR for the selected region.
    fn read_rasr(&self) -> u32;

    /// Writes MPU_RASR for the selected region.
    fn write_rasr(&mut self, value: u32);

    /// Data memory barrier.
    fn dmb(&mut self);

    /// Data synchronization barrier.
    fn dsb(&mut self);

    /// Instruction synchronization barrier.
    fn isb(&mut self);
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod hw {
    use super::MpuBus;
    use cortex_m::{asm, peripheral::MPU};

    /// The memory-mapped MPU register block of the running core.
    ///
    /// Created once from the `cortex_m` `MPU` singleton and kept for the
    /// rest of the program; the hardware it stands for never goes away.
    pub struct MpuPeripheral {
        periph: MPU,
    }

    impl MpuPeripheral {
        /// Wraps the `MPU` peripheral, taking ownership of the singleton.
        ///
        /// # Safety
        ///
        /// This is safe to call if the processor is a Cortex-M0+ and has
        /// an MPU.
        pub unsafe fn new(periph: MPU) -> Self {
            MpuPeripheral { periph }
        }

        /// Consumes `self` and returns the raw MPU peripheral.
        pub fn into_inner(self) -> MPU {
            self.periph
        }
    }

    impl MpuBus for MpuPeripheral {
        fn read_type(&self) -> u32 {
            self.periph._type.read()
        }

        fn read_ctrl(&self) -> u32 {
            self.periph.ctrl.read()
        }

        fn write_ctrl(&mut self, value: u32) {
            unsafe { self.periph.ctrl.write(value) }
        }

        fn write_rnr(&mut self, value: u32) {
            unsafe { self.periph.rnr.write(value) }
        }

        fn read_rbar(&self) -> u32 {
            self.periph.rbar.read()
        }

        fn write_rbar(&mut self, value: u32) {
            unsafe { self.periph.rbar.write(value) }
        }

        fn read_rasr(&self) -> u32 {
            self.periph.rasr.read()
        }

        fn write_rasr(&mut self, value: u32) {
            unsafe { self.periph.rasr.write(value) }
        }

        fn dmb(&mut self) {
            asm::dmb();
        }

        fn dsb(&mut self) {
            asm::dsb();
        }

        fn isb(&mut self) {
            asm::isb();
        }
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use hw::MpuPeripheral;
