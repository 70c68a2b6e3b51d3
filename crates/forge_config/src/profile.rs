//! The built-in Fomu-class UP5K SoC profile.
//!
//! Used when `forge.toml` declares no peripherals. The CSR indices are pinned
//! so that firmware built against an older register map keeps working.

use forge_compose::{BusRole, PeripheralKind, PeripheralSpec, RequestKind};

/// Size of the UP5K single-port RAM block used as main memory.
pub const SPRAM_SIZE: u64 = 128 * 1024;

/// Base address of main memory on the system bus.
pub const SRAM_BASE: u64 = 0x1000_0000;

/// Name of the system bus.
pub const SYSTEM_BUS: &str = "wishbone";

/// Returns the board resources of the built-in platform.
pub fn default_resources() -> Vec<RequestKind> {
    vec![
        RequestKind::Clk,
        RequestKind::Usb,
        RequestKind::SpiFlash,
        RequestKind::Touch,
        RequestKind::RgbLed,
    ]
}

/// Returns the peripherals of the built-in SoC.
pub fn default_peripherals() -> Vec<PeripheralSpec> {
    use PeripheralKind as K;

    vec![
        PeripheralSpec::new("ctrl", K::Ctrl).with_csr(0),
        PeripheralSpec::new("crg", K::Crg).with_csr(1),
        PeripheralSpec::new("timer0", K::Timer).with_csr(5),
        PeripheralSpec::new("usb", K::UsbDebug)
            .with_csr(9)
            .with_attach(SYSTEM_BUS, BusRole::Master),
        PeripheralSpec::new("touch", K::Touch).with_csr(11),
        PeripheralSpec::new("reboot", K::Reboot).with_csr(12),
        PeripheralSpec::new("rgb", K::Rgb).with_csr(13),
        PeripheralSpec::new("version", K::Version).with_csr(14),
        PeripheralSpec::new("sram", K::Sram)
            .with_region(SRAM_BASE, SPRAM_SIZE, SYSTEM_BUS)
            .with_attach(SYSTEM_BUS, BusRole::Slave),
    ]
}
