#![no_std]
#![no_main]

use core::ptr;

use cortex_m::interrupt;
use cortex_m0p_mpu::{
    AccessPermission, ArrayVec, MemoryType, Mpu, Region, RegionAttributes, Size, Subregions,
};
use cortex_m_rt::{entry, exception, ExceptionFrame};
use cortex_m_semihosting::hprintln;
use panic_semihosting as _;
use stm32l0xx_hal as hal;

/// Any violation of the MPU configuration results in a HardFault, since the
/// M0(+) doesn't have dedicated memory management exceptions.
#[exception]
fn HardFault(frame: &ExceptionFrame) -> ! {
    hprintln!("HardFault (MPU violation?) frame={:?}", frame).ok();
    loop {}
}

#[exception]
fn DefaultHandler(irqn: i16) {
    hprintln!("unhandled IRQ {}", irqn).ok();
}

#[repr(align(256))]
struct Aligned<T>(T);

/// Reads from this array fault once the no-access region is enforced.
static PROTECTED: Aligned<[u8; 256]> = Aligned([0x55; 256]);

#[entry]
fn main() -> ! {
    hprintln!("\nmain()").ok();

    let core_periph = hal::pac::CorePeripherals::take().unwrap();

    // Safe: This is an STM32L072, which has a Cortex-M0+ with MPU.
    let mut mpu = unsafe { Mpu::new(core_periph.MPU) };
    hprintln!("{} MPU regions", mpu.region_count()).ok();

    let mut regions = ArrayVec::new();
    regions.push(Region {
        index: 0,
        base_addr: &PROTECTED as *const _ as u32,
        attrs: RegionAttributes {
            enabled: true,
            size: Size::S256B,
            subregions: Subregions::ALL,
            executable: false,
            permissions: AccessPermission::NoAccess,
            memory: MemoryType::Normal,
        },
    });

    // No interrupt handler may observe the half-applied region set, so the
    // whole transition runs under the interrupt gate.
    interrupt::free(|_| {
        mpu.configure_all(&regions).unwrap();

        // Privileged accesses outside the regions keep using the default
        // memory map; HardFault and NMI handlers run unprotected.
        mpu.enable(true, false);
    });

    let applied = mpu.read_region(0).unwrap();
    hprintln!(
        "region 0 at 0x{:08x}, {} bytes",
        applied.base_addr,
        applied.attrs.size.bytes()
    )
    .ok();
    hprintln!("MPU enabled, touching the protected array...").ok();

    // This read violates region 0 and vectors to the HardFault handler.
    let value = unsafe { ptr::read_volatile(&PROTECTED.0[0]) };
    hprintln!("read {} - the MPU did not fault?!", value).ok();

    loop {}
}
