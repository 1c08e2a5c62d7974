//! Channel-to-frequency mapping
//!
//! A [`FreqPlan`] binds the hop sequence tables to carrier frequencies:
//! `(band, sequence index) → Hz`. It owns one sequence per active band
//! (primary, plus secondary on dual-band hardware), the per-radio AFC
//! corrections, and the primary/secondary selector.
//!
//! The map is `freq = start + spread · channel / scale − correction`, with
//! the spread held pre-scaled (`(stop − start) · scale / (count − 1)`) so
//! step-register radios keep sub-step placement accuracy.
//!
//! On a single-band diversity pair the second radio listens half the channel
//! set away from the first, so both radios never sit on the same carrier; on
//! dual-band hardware the second radio follows the secondary band's own
//! sequence at the shared cursor.

use crate::band::{BandPlan, Domain, RadioVariant};
use crate::sequence::{build_sequence, usable_entries, SEQUENCE_LEN};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// First radio of a diversity pair.
pub const RADIO_1: u8 = 0;
/// Second radio of a diversity pair.
pub const RADIO_2: u8 = 1;

/// Per-band derived state: descriptor, sequence table, pre-scaled spread.
#[derive(Debug)]
struct BandState {
    plan: &'static BandPlan,
    sequence: [u8; SEQUENCE_LEN],
    sync_channel: u8,
    /// `(stop - start) * scale / (count - 1)`
    spread: u64,
    entries: u16,
}

impl BandState {
    fn new(domain: Domain, seed: u32, scale: u32) -> Self {
        let plan = domain.plan();
        let sync_channel = plan.sync_channel();
        let spread = u64::from(plan.freq_stop - plan.freq_start) * u64::from(scale)
            / u64::from((plan.freq_count - 1).max(1));
        Self {
            plan,
            sequence: build_sequence(seed, plan.freq_count, sync_channel),
            sync_channel,
            spread,
            entries: usable_entries(plan.freq_count),
        }
    }

    fn channel_freq(&self, channel: u8, scale: u32, correction: i32) -> u32 {
        let base =
            u64::from(self.plan.freq_start) + self.spread * u64::from(channel) / u64::from(scale);
        (base as i64 - i64::from(correction)) as u32
    }

    fn channel_for_freq(&self, freq: u32, scale: u32, correction: i32) -> u8 {
        let offset = (i64::from(freq) + i64::from(correction)
            - i64::from(self.plan.freq_start))
        .max(0) as u64;
        let channel = (offset * u64::from(scale) + self.spread / 2) / self.spread.max(1);
        channel.min(u64::from(self.plan.freq_count - 1)) as u8
    }
}

/// Frequency plan for one receiver: bands, sequences, and corrections.
///
/// Construction happens once at link setup; afterwards all state is either
/// read-only (tables) or a single atomic word (corrections, band selector),
/// so hop-time lookups are safe from radio interrupt context.
#[derive(Debug)]
pub struct FreqPlan {
    variant: RadioVariant,
    primary: BandState,
    secondary: Option<BandState>,
    use_primary: AtomicBool,
    correction: AtomicI32,
    correction_2: AtomicI32,
}

impl FreqPlan {
    /// Single-band plan.
    pub fn new(variant: RadioVariant, domain: Domain, seed: u32) -> Self {
        let scale = variant.traits().spread_scale;
        Self {
            variant,
            primary: BandState::new(domain, seed, scale),
            secondary: None,
            use_primary: AtomicBool::new(true),
            correction: AtomicI32::new(0),
            correction_2: AtomicI32::new(0),
        }
    }

    /// Dual-band plan: the second radio follows `secondary`'s sequence.
    pub fn new_dual(
        variant: RadioVariant,
        primary: Domain,
        secondary: Domain,
        seed: u32,
    ) -> Self {
        let scale = variant.traits().spread_scale;
        Self {
            variant,
            primary: BandState::new(primary, seed, scale),
            secondary: Some(BandState::new(secondary, seed, scale)),
            use_primary: AtomicBool::new(true),
            correction: AtomicI32::new(0),
            correction_2: AtomicI32::new(0),
        }
    }

    /// Radio variant this plan was built for.
    pub fn variant(&self) -> RadioVariant {
        self.variant
    }

    /// Whether a secondary band is configured.
    pub fn is_dual_band(&self) -> bool {
        self.secondary.is_some()
    }

    /// Select the primary (`true`) or secondary (`false`) band for the
    /// first radio's lookups. Ignored when no secondary band exists.
    pub fn set_use_primary(&self, use_primary: bool) {
        if self.secondary.is_some() {
            self.use_primary.store(use_primary, Ordering::Relaxed);
        }
    }

    /// Whether the primary band is currently active.
    pub fn use_primary(&self) -> bool {
        self.use_primary.load(Ordering::Relaxed)
    }

    fn active(&self) -> &BandState {
        if self.use_primary() {
            &self.primary
        } else {
            self.secondary.as_ref().unwrap_or(&self.primary)
        }
    }

    /// Number of sequence entries the cursor cycles through. Dual-band uses
    /// the smaller of the two bands so neither sequence is over-run.
    pub fn sequence_count(&self) -> u16 {
        match &self.secondary {
            Some(sec) => self.primary.entries.min(sec.entries).max(1),
            None => self.active().entries.max(1),
        }
    }

    /// Number of hop channels in the active band.
    pub fn channel_count(&self) -> u32 {
        self.active().plan.freq_count
    }

    /// Lowest carrier of the active band (Hz).
    pub fn min_freq(&self) -> u32 {
        self.active().plan.freq_start
    }

    /// Highest carrier of the active band (Hz).
    pub fn max_freq(&self) -> u32 {
        self.active().plan.freq_stop
    }

    /// Domain tag of the active band.
    pub fn domain(&self) -> &'static str {
        self.active().plan.domain
    }

    /// Update the first radio's AFC correction (Hz), clamped to the
    /// variant's limit.
    pub fn set_correction(&self, hz: i32) {
        let max = self.variant.traits().max_correction_hz;
        self.correction.store(hz.clamp(-max, max), Ordering::Relaxed);
    }

    /// Current first-radio correction (Hz).
    pub fn correction(&self) -> i32 {
        self.correction.load(Ordering::Relaxed)
    }

    /// Update the second radio's AFC correction (Hz), clamped.
    pub fn set_correction_2(&self, hz: i32) {
        let max = self.variant.traits().max_correction_hz;
        self.correction_2.store(hz.clamp(-max, max), Ordering::Relaxed);
    }

    /// Current second-radio correction (Hz).
    pub fn correction_2(&self) -> i32 {
        self.correction_2.load(Ordering::Relaxed)
    }

    /// Carrier frequency for `radio` at sequence index `cursor`.
    pub fn freq_at(&self, cursor: u8, radio: u8) -> u32 {
        let scale = self.variant.traits().spread_scale;
        let idx = usize::from(cursor) % SEQUENCE_LEN;

        if radio == RADIO_2 {
            if let Some(sec) = &self.secondary {
                return sec.channel_freq(sec.sequence[idx], scale, self.correction_2());
            }
            let band = self.active();
            return band.channel_freq(
                self.offset_channel(band.sequence[idx]),
                scale,
                self.correction_2(),
            );
        }

        let band = self.active();
        band.channel_freq(band.sequence[idx], scale, self.correction())
    }

    /// Initial (sync-channel) frequency for `radio`, used before the first
    /// hop and whenever the receiver falls back to searching.
    pub fn initial_freq(&self, radio: u8) -> u32 {
        let scale = self.variant.traits().spread_scale;

        if radio == RADIO_2 {
            if let Some(sec) = &self.secondary {
                return sec.channel_freq(sec.sync_channel, scale, self.correction_2());
            }
            let band = self.active();
            return band.channel_freq(
                self.offset_channel(band.sync_channel),
                scale,
                self.correction_2(),
            );
        }

        let band = self.active();
        band.channel_freq(band.sync_channel, scale, self.correction())
    }

    /// Whether the active band's sequence entry at `cursor` is the sync
    /// channel.
    pub fn on_sync_channel(&self, cursor: u8) -> bool {
        let band = self.active();
        band.sequence[usize::from(cursor) % SEQUENCE_LEN] == band.sync_channel
    }

    /// Channel index of the active band's sequence entry at `cursor`.
    pub fn channel_at(&self, cursor: u8) -> u8 {
        let band = self.active();
        band.sequence[usize::from(cursor) % SEQUENCE_LEN]
    }

    /// Invert the map: recover the channel index a carrier frequency on the
    /// active band corresponds to, assuming the first radio's correction.
    pub fn channel_for_freq(&self, freq: u32) -> u8 {
        let scale = self.variant.traits().spread_scale;
        self.active().channel_for_freq(freq, scale, self.correction())
    }

    /// Diversity offset: half the channel set away, modulo the set.
    fn offset_channel(&self, channel: u8) -> u8 {
        let count = self.active().plan.freq_count;
        ((u32::from(channel) + count / 2) % count) as u8
    }
}
