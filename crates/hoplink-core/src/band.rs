//! Regulatory band tables and radio-variant constants
//!
//! A [`BandPlan`] describes one regulatory domain: the first and last channel
//! centre frequencies, the channel count, and the band centre. The tables are
//! `'static` and read-only; a receiver selects a primary band (and, on
//! dual-radio hardware, a secondary band) once at link setup.
//!
//! [`RadioVariant`] captures the chip-dependent constants that differ between
//! radio families: the spread scale used by the channel-to-frequency map,
//! the synthesizer step, and the largest automatic-frequency-correction
//! offset the chip can absorb. They are looked up from a value table rather
//! than compiled in, so a dual-chip receiver can hold two variants at once.

use serde::{Deserialize, Serialize};

/// One regulatory domain's frequency plan.
///
/// `freq_start` and `freq_stop` are the centre frequencies of the first and
/// last channels in Hz; the remaining channels are evenly spread between
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandPlan {
    /// Human-readable domain tag, e.g. `"ISM2G4"`
    pub domain: &'static str,
    /// First channel centre frequency (Hz)
    pub freq_start: u32,
    /// Last channel centre frequency (Hz)
    pub freq_stop: u32,
    /// Number of hop channels in the band
    pub freq_count: u32,
    /// Band centre frequency (Hz)
    pub freq_center: u32,
}

impl BandPlan {
    /// Default sync channel for this band (middle of the channel set).
    pub fn sync_channel(&self) -> u8 {
        (self.freq_count / 2) as u8
    }
}

/// Regulatory domain selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Worldwide 2.4 GHz ISM band
    Ism2g4,
    /// FCC 915 MHz
    Fcc915,
    /// AU 915 MHz
    Au915,
    /// EU 868 MHz
    Eu868,
    /// EU 433 MHz
    Eu433,
}

impl Domain {
    /// Band descriptor for this domain.
    pub fn plan(self) -> &'static BandPlan {
        &BAND_TABLE[self as usize]
    }
}

/// Band descriptor table, indexed by [`Domain`].
static BAND_TABLE: [BandPlan; 5] = [
    BandPlan {
        domain: "ISM2G4",
        freq_start: 2_400_400_000,
        freq_stop: 2_479_400_000,
        freq_count: 80,
        freq_center: 2_439_900_000,
    },
    BandPlan {
        domain: "FCC915",
        freq_start: 903_500_000,
        freq_stop: 926_900_000,
        freq_count: 40,
        freq_center: 915_200_000,
    },
    BandPlan {
        domain: "AU915",
        freq_start: 915_500_000,
        freq_stop: 926_900_000,
        freq_count: 20,
        freq_center: 921_200_000,
    },
    BandPlan {
        domain: "EU868",
        freq_start: 865_275_000,
        freq_stop: 869_575_000,
        freq_count: 13,
        freq_center: 867_425_000,
    },
    BandPlan {
        domain: "EU433",
        freq_start: 433_420_000,
        freq_stop: 434_420_000,
        freq_count: 3,
        freq_center: 433_920_000,
    },
];

/// Radio silicon family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioVariant {
    /// Sub-GHz LoRa transceiver with a 61 Hz synthesizer step
    Sx127x,
    /// 2.4 GHz transceiver with a 198 Hz synthesizer step
    Sx128x,
    /// Dual-band transceiver programmed directly in Hz
    Lr1121,
}

/// Chip-dependent constants for one [`RadioVariant`].
#[derive(Debug, Clone, Copy)]
pub struct RadioTraits {
    /// Fixed-point scale applied to the channel spread (1 = direct Hz,
    /// 256 = step-register radios needing sub-step placement)
    pub spread_scale: u32,
    /// Synthesizer frequency step (Hz per register LSB)
    pub freq_step_hz: f64,
    /// Largest AFC correction the map will apply, in Hz
    pub max_correction_hz: i32,
}

impl RadioTraits {
    /// Convert a frequency in Hz to the chip's register representation.
    pub fn freq_to_reg(&self, freq_hz: u32) -> u32 {
        (freq_hz as f64 / self.freq_step_hz) as u32
    }
}

static RADIO_TABLE: [RadioTraits; 3] = [
    // Sx127x
    RadioTraits {
        spread_scale: 256,
        freq_step_hz: 61.035_156_25,
        max_correction_hz: 100_000,
    },
    // Sx128x
    RadioTraits {
        spread_scale: 256,
        freq_step_hz: 198.364_257_812_5,
        max_correction_hz: 200_000,
    },
    // Lr1121
    RadioTraits {
        spread_scale: 1,
        freq_step_hz: 1.0,
        max_correction_hz: 100_000,
    },
];

impl RadioVariant {
    /// Constant table entry for this variant.
    pub fn traits(self) -> &'static RadioTraits {
        &RADIO_TABLE[self as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_table_sane() {
        for domain in [
            Domain::Ism2g4,
            Domain::Fcc915,
            Domain::Au915,
            Domain::Eu868,
            Domain::Eu433,
        ] {
            let plan = domain.plan();
            assert!(plan.freq_start < plan.freq_stop, "{}", plan.domain);
            assert!(plan.freq_count >= 2, "{}", plan.domain);
            assert!(
                plan.freq_center > plan.freq_start && plan.freq_center < plan.freq_stop,
                "{}",
                plan.domain
            );
        }
    }

    #[test]
    fn test_sync_channel_in_range() {
        let plan = Domain::Ism2g4.plan();
        assert!(u32::from(plan.sync_channel()) < plan.freq_count);
        assert_eq!(plan.sync_channel(), 40);
    }

    #[test]
    fn test_variant_traits() {
        assert_eq!(RadioVariant::Sx127x.traits().spread_scale, 256);
        assert_eq!(RadioVariant::Lr1121.traits().spread_scale, 1);
        assert_eq!(RadioVariant::Sx128x.traits().max_correction_hz, 200_000);
    }

    #[test]
    fn test_freq_to_reg_direct_hz() {
        let traits = RadioVariant::Lr1121.traits();
        assert_eq!(traits.freq_to_reg(915_000_000), 915_000_000);
    }
}
