//! Channel and session types shared by the board session, the channel store
//! and the host component.
//!
//! - `ActivityMask` - Subsystem gate for the polling engine
//! - `DioConfig` - Per-bank output mask/value pair
//! - `OpenStage` - Stages of the board open sequence
//! - `Subsystem` - Polled subsystem tag for diagnostics

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Subsystems polled by the polling engine each cycle.
    ///
    /// Bit values match the integer hosts send to `setActivePublishing`:
    /// `3` enables ADC and ENC, `7` enables everything.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActivityMask: u8 {
        /// Analog inputs.
        const ADC = 0x01;
        /// Quadrature encoders.
        const ENC = 0x02;
        /// Digital banks.
        const DIO = 0x04;
    }
}

impl ActivityMask {
    /// Build a mask from a host integer, ignoring undefined bits.
    pub const fn from_host(state: u32) -> Self {
        Self::from_bits_truncate((state & 0xFF) as u8)
    }
}

/// Output mask/value pair for one digital bank.
///
/// Bits set in `mask` are driven as outputs with the matching bit of `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DioConfig {
    /// Output line selector.
    pub mask: u16,
    /// Output line levels.
    pub value: u16,
}

impl DioConfig {
    /// Create a new bank configuration.
    pub const fn new(mask: u16, value: u16) -> Self {
        Self { mask, value }
    }

    /// Apply a masked write: bits inside `mask` take `value`, all other
    /// bits keep their current level. The output mask itself is unchanged.
    #[inline]
    pub const fn merged(self, mask: u16, value: u16) -> Self {
        Self {
            mask: self.mask,
            value: (self.value & !mask) | (value & mask),
        }
    }
}

/// Stages of the board open sequence, in execution order.
///
/// The numeric tag (1..=5) is what hosts see in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum OpenStage {
    /// Allocate the driver handle.
    Allocate = 1,
    /// Allocate and set driver link options.
    Options = 2,
    /// Bind the PCI bus number.
    Bus = 3,
    /// Bind the PCI slot number.
    Slot = 4,
    /// Open, attach and describe the device.
    Device = 5,
}

impl OpenStage {
    /// All stages in execution order.
    pub const ALL: [OpenStage; 5] = [
        OpenStage::Allocate,
        OpenStage::Options,
        OpenStage::Bus,
        OpenStage::Slot,
        OpenStage::Device,
    ];

    /// Numeric stage tag (1..=5).
    #[inline]
    pub const fn number(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for OpenStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpenStage::Allocate => "allocate",
            OpenStage::Options => "options",
            OpenStage::Bus => "bus",
            OpenStage::Slot => "slot",
            OpenStage::Device => "device",
        };
        write!(f, "{} ({name})", self.number())
    }
}

/// A polled subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Digital banks.
    Dio,
    /// Quadrature encoders.
    Enc,
    /// Analog inputs.
    Adc,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Subsystem::Dio => "DIO",
            Subsystem::Enc => "ENC",
            Subsystem::Adc => "ADC",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_mask_host_values() {
        assert_eq!(ActivityMask::from_host(3), ActivityMask::ADC | ActivityMask::ENC);
        assert_eq!(ActivityMask::from_host(7), ActivityMask::all());
        assert_eq!(ActivityMask::from_host(0), ActivityMask::empty());
        // Undefined bits are dropped.
        assert_eq!(ActivityMask::from_host(0x0C), ActivityMask::DIO);
    }

    #[test]
    fn dio_merge_keeps_bits_outside_mask() {
        let cfg = DioConfig::new(0xFFFF, 0b1010_0000);
        let merged = cfg.merged(0x000F, 0x0005);
        assert_eq!(merged.value, 0b1010_0101);
        assert_eq!(merged.mask, 0xFFFF);

        // Bits of `value` outside `mask` are ignored.
        let merged = merged.merged(0x00F0, 0xFF00);
        assert_eq!(merged.value, 0x0005);
    }

    #[test]
    fn dio_merge_is_idempotent() {
        let cfg = DioConfig::new(0x00FF, 0x1234);
        let once = cfg.merged(0x0F0F, 0xABCD);
        assert_eq!(once, once.merged(0x0F0F, 0xABCD));
    }

    #[test]
    fn open_stage_numbers() {
        let numbers: Vec<u8> = OpenStage::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(OpenStage::Allocate < OpenStage::Device);
        assert_eq!(OpenStage::Bus.to_string(), "3 (bus)");
    }
}
