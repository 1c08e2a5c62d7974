//! RC channel command reader
//!
//! Converts CRSF-scaled RC channels into the packed anti-jam command byte.
//! CRSF carries 16 channels as integers where 172 maps to 1000 µs and 1811
//! to 2000 µs. Channel 4 carries the enable switch; channel 5 carries the
//! three-position mode switch (down = AUTO, middle = LOW, up = HIGH).
//!
//! Both switches apply a ±33 µs dead-band around their decision
//! boundaries: inside the band the previously decoded position is held, so
//! a channel hovering on a boundary cannot toggle the link state.

use crate::mode_switch::{encode_command, SwitchMode};

/// CRSF value that maps to 1000 µs.
const CRSF_MIN: i32 = 172;
/// CRSF value that maps to 2000 µs.
const CRSF_MAX: i32 = 1811;

/// Enable channel (1-based), per the receiver's channel map.
pub const ENABLE_CHANNEL: u8 = 4;
/// Mode channel (1-based).
pub const MODE_CHANNEL: u8 = 5;

/// Dead-band half-width around switch boundaries (µs).
const DEAD_BAND_US: u16 = 33;

/// Enable threshold (µs): stick above centre means enabled.
const ENABLE_MID_US: u16 = 1500;
/// Three-position boundaries (µs).
const MODE_LOW_BOUNDARY_US: u16 = 1333;
const MODE_HIGH_BOUNDARY_US: u16 = 1666;

/// Convert channel `ch` (1..=16) to microseconds (1000..=2000).
///
/// Out-of-range channel numbers return centre (1500 µs); channel values
/// outside the CRSF range clamp to the endpoints.
pub fn channel_us(channels: &[u16; 16], ch: u8) -> u16 {
    if !(1..=16).contains(&ch) {
        return 1500;
    }
    let raw = i32::from(channels[usize::from(ch) - 1]);
    let us = (raw - CRSF_MIN) * 1000 / (CRSF_MAX - CRSF_MIN) + 1000;
    us.clamp(1000, 2000) as u16
}

/// Stateful CH4/CH5 decoder with dead-band hold.
#[derive(Debug, Clone)]
pub struct RcCommandReader {
    enabled: bool,
    mode: SwitchMode,
}

impl Default for RcCommandReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RcCommandReader {
    /// Starts disabled in `Auto`, matching the switch's reset state.
    pub fn new() -> Self {
        Self {
            enabled: false,
            mode: SwitchMode::Auto,
        }
    }

    /// Decode the current channel frame into a packed command byte.
    ///
    /// Positions inside a dead-band keep their previous decode, so the
    /// returned byte is always a complete command.
    pub fn process(&mut self, channels: &[u16; 16]) -> u8 {
        let enable_us = channel_us(channels, ENABLE_CHANNEL);
        if enable_us > ENABLE_MID_US + DEAD_BAND_US {
            self.enabled = true;
        } else if enable_us < ENABLE_MID_US - DEAD_BAND_US {
            self.enabled = false;
        }

        let mode_us = channel_us(channels, MODE_CHANNEL);
        if mode_us < MODE_LOW_BOUNDARY_US - DEAD_BAND_US {
            self.mode = SwitchMode::Auto;
        } else if mode_us > MODE_HIGH_BOUNDARY_US + DEAD_BAND_US {
            self.mode = SwitchMode::High;
        } else if mode_us > MODE_LOW_BOUNDARY_US + DEAD_BAND_US
            && mode_us < MODE_HIGH_BOUNDARY_US - DEAD_BAND_US
        {
            self.mode = SwitchMode::Low;
        }

        encode_command(self.enabled, self.mode)
    }

    /// Last decoded enable position.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Last decoded mode position.
    pub fn mode(&self) -> SwitchMode {
        self.mode
    }
}
