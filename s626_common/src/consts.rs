//! Board-wide constants for the S626 workspace.
//!
//! Single source of truth for channel counts, sample widths and default
//! settings. Imported by all crates.

use static_assertions::const_assert;

/// Number of 16-line digital I/O banks.
pub const DIO_BANKS: usize = 3;

/// Number of analog input channels.
pub const ADC_CHANNELS: usize = 16;

/// Number of analog output channels.
pub const DAC_CHANNELS: usize = 4;

/// Number of quadrature encoder channels.
pub const ENC_CHANNELS: usize = 6;

/// Significant bits of an analog sample.
pub const ADC_SAMPLE_MASK: u16 = 0x3FFF;

/// Largest value accepted by an analog output (14-bit, 0x2000 = 0 V).
pub const DAC_MAX_VALUE: u16 = 0x3FFF;

/// Sign bit of the 24-bit encoder counter.
pub const ENC_SIGN_BIT: u32 = 0x0080_0000;

/// Bits replicated from the encoder sign bit when widening to 32 bits.
pub const ENC_SIGN_EXTENSION: u32 = 0xFF00_0000;

/// Length of the bulk digital initializer: one (mask, value) pair per bank.
pub const INITIAL_DIO_LEN: usize = DIO_BANKS * 2;

/// Maximum number of queued batches drained per host update, per port.
pub const MAX_BATCHES_PER_UPDATE: usize = 15;

/// Default polling period in microseconds (1 kHz).
pub const CYCLE_TIME_US: u64 = 1000;

/// Default name of the polling thread.
pub const DEFAULT_THREAD_NAME: &str = "SensorayInterface";

/// Default analogy device node.
pub const DEFAULT_DEVICE: &str = "analogy0";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/s626/s626.toml";

// Channel selectors are packed into these integer widths.
const_assert!(ADC_CHANNELS <= u16::BITS as usize);
const_assert!(ENC_CHANNELS <= u8::BITS as usize);
const_assert!(DAC_CHANNELS <= u8::BITS as usize);
const_assert!(DIO_BANKS <= u8::BITS as usize);

/// Bitmask with one bit set for each of the first `count` channels.
pub const fn all_channels(count: usize) -> u32 {
    if count >= 32 {
        u32::MAX
    } else {
        (1u32 << count) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert_eq!(INITIAL_DIO_LEN, 6);
        assert!(CYCLE_TIME_US > 0);
        assert_eq!(ENC_SIGN_BIT << 1, 0x0100_0000);
        assert_eq!(ENC_SIGN_EXTENSION & 0x00FF_FFFF, 0);
    }

    #[test]
    fn all_channels_masks() {
        assert_eq!(all_channels(ADC_CHANNELS), 0xFFFF);
        assert_eq!(all_channels(ENC_CHANNELS), 0x3F);
        assert_eq!(all_channels(DAC_CHANNELS), 0x0F);
        assert_eq!(all_channels(0), 0);
        assert_eq!(all_channels(32), u32::MAX);
    }
}
