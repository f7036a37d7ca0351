//! I/O simulator for the digital banks, encoders, analog inputs and outputs.
//!
//! The `IoSimulator` manages:
//! - Digital lines per bank with masked writes (loopback on read)
//! - Encoder counters advancing by a fixed step per read once configured
//! - Analog inputs as per-channel ramps, or pinned values set by tests
//! - Analog output values

use s626_common::consts::{ADC_CHANNELS, DAC_CHANNELS, DIO_BANKS, ENC_CHANNELS};
use tracing::trace;

/// 24-bit encoder counter wrap.
const ENC_COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Status bits the simulated converter reports above the 14-bit sample.
const ADC_STATUS_BITS: u16 = 0xC000;

/// Simulated board I/O state.
#[derive(Debug, Clone)]
pub struct IoSimulator {
    /// Line levels per digital bank
    dio_lines: [u16; DIO_BANKS],
    /// Raw 24-bit counters
    enc_counts: [u32; ENC_CHANNELS],
    /// Quadrature mode enabled per encoder
    enc_configured: [bool; ENC_CHANNELS],
    /// Counts added per read of a configured encoder
    enc_step: i32,
    /// Ramp position per analog input
    adc_ramp: [u16; ADC_CHANNELS],
    /// Pinned raw samples (test hooks)
    adc_pinned: [Option<u16>; ADC_CHANNELS],
    /// Last value written per analog output
    dac_values: [u16; DAC_CHANNELS],
}

impl Default for IoSimulator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IoSimulator {
    /// Create a simulator whose encoders advance by `enc_step` per read.
    pub fn new(enc_step: i32) -> Self {
        Self {
            dio_lines: [0; DIO_BANKS],
            enc_counts: [0; ENC_CHANNELS],
            enc_configured: [false; ENC_CHANNELS],
            enc_step,
            adc_ramp: [0; ADC_CHANNELS],
            adc_pinned: [None; ADC_CHANNELS],
            dac_values: [0; DAC_CHANNELS],
        }
    }

    /// Current line levels of a bank.
    pub fn dio_read(&self, bank: usize) -> Option<u16> {
        self.dio_lines.get(bank).copied()
    }

    /// Masked write: lines in `mask` take `value`.
    pub fn dio_write(&mut self, bank: usize, mask: u16, value: u16) -> Option<()> {
        let lines = self.dio_lines.get_mut(bank)?;
        *lines = (*lines & !mask) | (value & mask);
        trace!("sim DIO bank {bank} -> {:#06x}", *lines);
        Some(())
    }

    /// Force line levels, as if driven externally.
    pub fn set_dio_lines(&mut self, bank: usize, lines: u16) {
        if let Some(slot) = self.dio_lines.get_mut(bank) {
            *slot = lines;
        }
    }

    /// Enable quadrature counting and zero the counter.
    pub fn enc_configure(&mut self, channel: usize) -> Option<()> {
        *self.enc_configured.get_mut(channel)? = true;
        self.enc_counts[channel] = 0;
        Some(())
    }

    /// Read a raw counter; configured counters advance by the step.
    ///
    /// Unconfigured counters read back frozen.
    pub fn enc_read(&mut self, channel: usize) -> Option<u32> {
        let count = self.enc_counts.get_mut(channel)?;
        let raw = *count;
        if self.enc_configured[channel] {
            *count = count.wrapping_add_signed(self.enc_step) & ENC_COUNTER_MASK;
        }
        Some(raw)
    }

    /// Force a raw counter word.
    pub fn set_enc_raw(&mut self, channel: usize, raw: u32) {
        if let Some(count) = self.enc_counts.get_mut(channel) {
            *count = raw;
        }
    }

    /// Sample an analog input.
    ///
    /// Pinned channels return their pinned raw value. Others return a ramp
    /// with status bits above the 14-bit sample; the ±10 V range halves the
    /// ramp amplitude.
    pub fn adc_read(&mut self, channel: usize, high_range: bool) -> Option<u16> {
        if let Some(pinned) = *self.adc_pinned.get(channel)? {
            return Some(pinned);
        }
        let ramp = &mut self.adc_ramp[channel];
        *ramp = ramp.wrapping_add(0x0101 * (channel as u16 + 1));
        let sample = if high_range { *ramp >> 1 } else { *ramp };
        Some(ADC_STATUS_BITS | (sample & 0x3FFF))
    }

    /// Pin an analog input to a raw value, or release it with `None`.
    pub fn pin_adc(&mut self, channel: usize, raw: Option<u16>) {
        if let Some(slot) = self.adc_pinned.get_mut(channel) {
            *slot = raw;
        }
    }

    /// Latch an analog output value.
    pub fn dac_write(&mut self, channel: usize, value: u16) -> Option<()> {
        *self.dac_values.get_mut(channel)? = value;
        Some(())
    }

    /// Last value written to an analog output.
    pub fn dac_value(&self, channel: usize) -> Option<u16> {
        self.dac_values.get(channel).copied()
    }

    /// Whether an encoder was configured.
    pub fn enc_configured(&self, channel: usize) -> bool {
        self.enc_configured.get(channel).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dio_masked_loopback() {
        let mut io = IoSimulator::default();
        io.dio_write(0, 0x00FF, 0xFFFF).unwrap();
        assert_eq!(io.dio_read(0), Some(0x00FF));
        io.dio_write(0, 0x000F, 0x0000).unwrap();
        assert_eq!(io.dio_read(0), Some(0x00F0));
        assert_eq!(io.dio_read(1), Some(0));
        assert!(io.dio_read(DIO_BANKS).is_none());
        assert!(io.dio_write(DIO_BANKS, 1, 1).is_none());
    }

    #[test]
    fn encoder_counts_only_when_configured() {
        let mut io = IoSimulator::new(3);
        assert_eq!(io.enc_read(0), Some(0));
        assert_eq!(io.enc_read(0), Some(0));

        io.enc_configure(0).unwrap();
        assert!(io.enc_configured(0));
        assert_eq!(io.enc_read(0), Some(0));
        assert_eq!(io.enc_read(0), Some(3));
        assert_eq!(io.enc_read(0), Some(6));
    }

    #[test]
    fn encoder_wraps_at_24_bits() {
        let mut io = IoSimulator::new(-1);
        io.enc_configure(2).unwrap();
        io.enc_read(2).unwrap();
        assert_eq!(io.enc_read(2), Some(0x00FF_FFFF));
    }

    #[test]
    fn adc_ramp_carries_status_bits() {
        let mut io = IoSimulator::default();
        let raw = io.adc_read(0, false).unwrap();
        assert_eq!(raw & ADC_STATUS_BITS, ADC_STATUS_BITS);
        assert_eq!(raw & 0x3FFF, 0x0101);

        io.pin_adc(5, Some(0xFFFF));
        assert_eq!(io.adc_read(5, false), Some(0xFFFF));
        io.pin_adc(5, None);
        assert_ne!(io.adc_read(5, false), Some(0xFFFF));
        assert!(io.adc_read(ADC_CHANNELS, false).is_none());
    }

    #[test]
    fn dac_latches_value() {
        let mut io = IoSimulator::default();
        io.dac_write(3, 0x2000).unwrap();
        assert_eq!(io.dac_value(3), Some(0x2000));
        assert!(io.dac_write(DAC_CHANNELS, 0).is_none());
    }
}
