//! Peripheral kinds and the capabilities each one declares.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wiring::RoleSet;

/// A board resource a peripheral needs from the platform.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// The board clock input.
    Clk,
    /// USB D+/D- pads and pull-up.
    Usb,
    /// SPI flash pins.
    SpiFlash,
    /// Capacitive touch pads.
    Touch,
    /// RGB LED driver pins.
    RgbLed,
    /// A serial port.
    Serial,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Clk => "clk",
            RequestKind::Usb => "usb",
            RequestKind::SpiFlash => "spi_flash",
            RequestKind::Touch => "touch",
            RequestKind::RgbLed => "rgb_led",
            RequestKind::Serial => "serial",
        };
        f.write_str(name)
    }
}

/// What a peripheral kind can do: which bus roles it may take, which board
/// resources it requests, and whether it exposes a CSR bank.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Capabilities {
    /// Bus roles the peripheral supports.
    pub roles: RoleSet,
    /// Board resources the peripheral needs.
    pub requests: &'static [RequestKind],
    /// Whether the peripheral has a CSR bank.
    pub has_csr: bool,
}

/// The closed set of peripheral variants a composition can contain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeripheralKind {
    /// SoC control block (reset, scratch, bus errors).
    Ctrl,
    /// Clock and reset generator.
    Crg,
    /// UART physical layer.
    UartPhy,
    /// UART controller.
    Uart,
    /// SoC identifier ROM.
    IdentifierMem,
    /// General purpose timer.
    Timer,
    /// CPU, or a bridge standing in for one.
    CpuOrBridge,
    /// USB device core with a debug bridge that can master the bus.
    UsbDebug,
    /// SPI flash controller with a memory-mapped window.
    SpiFlash,
    /// Capacitive touch pads.
    Touch,
    /// Warm-boot controller.
    Reboot,
    /// RGB LED PWM driver.
    Rgb,
    /// Gateware version registers.
    Version,
    /// On-chip RAM.
    Sram,
    /// Any other CSR peripheral that only responds on the bus.
    Generic,
}

impl PeripheralKind {
    /// Returns the capability set of this kind.
    pub fn capabilities(self) -> Capabilities {
        use PeripheralKind::*;
        use RequestKind as R;

        match self {
            Ctrl | Uart | IdentifierMem | Timer | Reboot | Version => caps(RoleSet::NONE, &[], true),
            Crg => caps(RoleSet::NONE, &[R::Clk], true),
            UartPhy => caps(RoleSet::NONE, &[R::Serial], true),
            CpuOrBridge => caps(RoleSet::MASTER, &[], true),
            UsbDebug => caps(RoleSet::MASTER_SLAVE, &[R::Usb], true),
            SpiFlash => caps(RoleSet::SLAVE, &[R::SpiFlash], true),
            Touch => caps(RoleSet::NONE, &[R::Touch], true),
            Rgb => caps(RoleSet::NONE, &[R::RgbLed], true),
            Sram => caps(RoleSet::SLAVE, &[], false),
            Generic => caps(RoleSet::SLAVE, &[], true),
        }
    }

    /// Returns the configuration name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            PeripheralKind::Ctrl => "ctrl",
            PeripheralKind::Crg => "crg",
            PeripheralKind::UartPhy => "uart_phy",
            PeripheralKind::Uart => "uart",
            PeripheralKind::IdentifierMem => "identifier_mem",
            PeripheralKind::Timer => "timer",
            PeripheralKind::CpuOrBridge => "cpu_or_bridge",
            PeripheralKind::UsbDebug => "usb_debug",
            PeripheralKind::SpiFlash => "spi_flash",
            PeripheralKind::Touch => "touch",
            PeripheralKind::Reboot => "reboot",
            PeripheralKind::Rgb => "rgb",
            PeripheralKind::Version => "version",
            PeripheralKind::Sram => "sram",
            PeripheralKind::Generic => "generic",
        }
    }
}

fn caps(roles: RoleSet, requests: &'static [RequestKind], has_csr: bool) -> Capabilities {
    Capabilities {
        roles,
        requests,
        has_csr,
    }
}

impl fmt::Display for PeripheralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The target board, described by the resources it can hand to peripherals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Platform {
    /// Board name, used in diagnostics.
    pub name: String,
    resources: BTreeSet<RequestKind>,
}

impl Platform {
    /// Creates a platform offering the given resources.
    pub fn new(name: impl Into<String>, resources: impl IntoIterator<Item = RequestKind>) -> Self {
        Self {
            name: name.into(),
            resources: resources.into_iter().collect(),
        }
    }

    /// Returns `true` if the platform provides `request`.
    pub fn supports(&self, request: RequestKind) -> bool {
        self.resources.contains(&request)
    }

    /// Iterates the provided resources in a stable order.
    pub fn resources(&self) -> impl Iterator<Item = RequestKind> + '_ {
        self.resources.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiring::BusRole;

    #[test]
    fn usb_debug_can_master() {
        let caps = PeripheralKind::UsbDebug.capabilities();
        assert!(caps.roles.contains(BusRole::Master));
        assert!(caps.roles.contains(BusRole::Slave));
        assert_eq!(caps.requests, &[RequestKind::Usb]);
        assert!(caps.has_csr);
    }

    #[test]
    fn sram_is_slave_without_csr() {
        let caps = PeripheralKind::Sram.capabilities();
        assert!(!caps.roles.contains(BusRole::Master));
        assert!(caps.roles.contains(BusRole::Slave));
        assert!(!caps.has_csr);
    }

    #[test]
    fn csr_only_kinds_take_no_bus_role() {
        for kind in [PeripheralKind::Ctrl, PeripheralKind::Version, PeripheralKind::Reboot] {
            let caps = kind.capabilities();
            assert!(!caps.roles.contains(BusRole::Master));
            assert!(!caps.roles.contains(BusRole::Slave));
        }
    }

    #[test]
    fn kind_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: PeripheralKind,
        }
        let w: Wrapper = toml::from_str(r#"kind = "usb_debug""#).unwrap();
        assert_eq!(w.kind, PeripheralKind::UsbDebug);
        assert_eq!(w.kind.to_string(), "usb_debug");
    }

    #[test]
    fn platform_supports_declared_resources() {
        let platform = Platform::new("fomu_evt", [RequestKind::Usb, RequestKind::Touch]);
        assert!(platform.supports(RequestKind::Usb));
        assert!(!platform.supports(RequestKind::Serial));
        let listed: Vec<_> = platform.resources().collect();
        assert_eq!(listed, vec![RequestKind::Usb, RequestKind::Touch]);
    }
}
