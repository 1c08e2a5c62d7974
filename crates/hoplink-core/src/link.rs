//! Integration façade
//!
//! [`AntiJamLink`] owns the three coordination subsystems (detector, mode
//! switch, hop barrier) and wires them together:
//!
//! ```text
//!   packet outcomes ──► detector ──suggestion──► barrier (begin + 2×next)
//!   RC frame / cmd  ──► switch ───enable 0→1───► detector reset
//! ```
//!
//! The switch gates everything: while disabled, recommendations are logged
//! and dropped. An enable transition resets the detector so stale window
//! contents cannot trigger an immediate hop. A group-switch hint flips the
//! active band on dual-band plans, rate-limited by a cooldown.
//!
//! The façade is the main loop's handle. Radio interrupts never touch it;
//! they go straight to [`Glock::next_synced`] via [`AntiJamLink::glock`].

use crate::anti_jam::{AntiJamDetector, DetectorConfig, HopSuggestion, JamReport};
use crate::config::LinkConfig;
use crate::freq_plan::{FreqPlan, RADIO_1, RADIO_2};
use crate::glock::Glock;
use crate::mode_switch::{ModeSwitch, SwitchMode, SwitchOutcome};
use crate::rc_channels::RcCommandReader;
use tracing::{debug, info};

/// Minimum interval between band flips driven by group-switch hints (ms).
const BAND_SWITCH_COOLDOWN_MS: u32 = 500;

/// Result of a synchronized hop: both radios' frequencies at the shared
/// post-advance index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncedHop {
    /// Sequence index both frequencies derive from
    pub index: u8,
    /// First radio's carrier (Hz)
    pub freq_radio_1: u32,
    /// Second radio's carrier (Hz)
    pub freq_radio_2: u32,
}

/// Owns and wires the detector, switch, and barrier.
pub struct AntiJamLink {
    detector: AntiJamDetector,
    switch: ModeSwitch,
    glock: Glock,
    rc_reader: RcCommandReader,
    last_band_switch_ms: u32,
    band_switched_once: bool,
}

impl std::fmt::Debug for AntiJamLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntiJamLink")
            .field("detector", &self.detector)
            .field("switch", &self.switch)
            .field("glock", &self.glock)
            .finish_non_exhaustive()
    }
}

impl AntiJamLink {
    /// Assemble a link from a frequency plan and detector configuration.
    /// The switch starts disabled in `Auto`.
    pub fn new(plan: FreqPlan, detector_cfg: &DetectorConfig) -> Self {
        Self {
            detector: AntiJamDetector::new(detector_cfg),
            switch: ModeSwitch::new(),
            glock: Glock::new(plan),
            rc_reader: RcCommandReader::new(),
            last_band_switch_ms: 0,
            band_switched_once: false,
        }
    }

    /// Assemble a link from a loaded configuration: frequency plan,
    /// detector settings, and switch policy.
    pub fn from_config(config: &LinkConfig) -> Self {
        let mut link = Self::new(config.fhss.build_plan(), &config.detector);
        link.switch
            .set_controller_only(config.switch.controller_only);
        link.switch.set_debounce_ms(config.switch.debounce_ms);
        link
    }

    /// The hop barrier; radio interrupt handlers call
    /// [`Glock::next_synced`] through this.
    pub fn glock(&self) -> &Glock {
        &self.glock
    }

    /// The detector, for direct inspection and reconfiguration.
    pub fn detector_mut(&mut self) -> &mut AntiJamDetector {
        &mut self.detector
    }

    /// The mode switch, for policy configuration and status.
    pub fn switch_mut(&mut self) -> &mut ModeSwitch {
        &mut self.switch
    }

    /// Last detector report.
    pub fn report(&self) -> JamReport {
        self.detector.report()
    }

    /// Feed one packet outcome. When the detector recommends a hop and the
    /// switch is enabled, runs a full synchronized hop cycle and returns
    /// the landing frequencies.
    pub fn register_packet(&mut self, good: bool, time_ms: u32) -> Option<SyncedHop> {
        let suggestion = self.detector.register_packet(good, time_ms)?;
        self.act_on_suggestion(&suggestion, time_ms)
    }

    /// Feed an external jam indication.
    pub fn register_external_jam(&mut self, time_ms: u32) -> Option<SyncedHop> {
        let suggestion = self.detector.register_external_jam(time_ms)?;
        self.act_on_suggestion(&suggestion, time_ms)
    }

    /// Periodic maintenance from the main loop. Never hops.
    pub fn service_tick(&mut self, now_ms: u32) {
        self.detector.tick(now_ms);
    }

    /// Decode an RC channel frame into a command and apply it with
    /// controller permissions (RC frames originate at the transmitter).
    pub fn process_rc(&mut self, channels: &[u16; 16], now_ms: u32) -> SwitchOutcome {
        let byte = self.rc_reader.process(channels);
        self.apply_controller_command(byte, now_ms)
    }

    /// Apply a pre-validated controller command byte.
    pub fn apply_controller_command(&mut self, byte: u8, now_ms: u32) -> SwitchOutcome {
        let was_enabled = self.switch.is_enabled();
        let outcome = self.switch.apply_command(byte, now_ms);
        self.after_switch_change(was_enabled, outcome);
        outcome
    }

    /// Local enable/disable (receiver-side UI).
    pub fn set_enabled(&mut self, enable: bool, now_ms: u32) -> SwitchOutcome {
        let was_enabled = self.switch.is_enabled();
        let outcome = self.switch.set_enabled(enable, now_ms);
        self.after_switch_change(was_enabled, outcome);
        outcome
    }

    /// Local mode change; subject to controller-only policy.
    pub fn set_mode_local(&mut self, mode: SwitchMode, now_ms: u32) -> SwitchOutcome {
        self.switch.set_mode_local(mode, now_ms)
    }

    /// Hop both radios now, without a detector recommendation. Still
    /// honours the enable switch.
    pub fn force_synced_hop(&mut self, now_ms: u32) -> Option<SyncedHop> {
        if !self.switch.is_enabled() {
            debug!("forced hop request ignored while disabled");
            return None;
        }
        let hop = self.run_hop_cycle();
        info!(
            index = hop.index,
            f1 = hop.freq_radio_1,
            f2 = hop.freq_radio_2,
            now_ms,
            "forced synchronized hop"
        );
        Some(hop)
    }

    // ---- internals ------------------------------------------------------

    fn after_switch_change(&mut self, was_enabled: bool, outcome: SwitchOutcome) {
        if outcome != SwitchOutcome::Applied {
            return;
        }
        let enabled = self.switch.is_enabled();
        if enabled && !was_enabled {
            // Stale window contents would recommend a hop immediately.
            self.detector.reset();
            info!(mode = ?self.switch.mode(), "anti-jam hopping engaged");
        } else if !enabled && was_enabled {
            info!("anti-jam hopping disengaged");
        }
    }

    fn act_on_suggestion(
        &mut self,
        suggestion: &HopSuggestion,
        now_ms: u32,
    ) -> Option<SyncedHop> {
        if !self.switch.is_enabled() {
            debug!(
                confidence = suggestion.confidence,
                "hop recommended but link disabled"
            );
            return None;
        }

        if suggestion.suggest_group_switch {
            self.maybe_switch_band(now_ms);
        }

        let hop = self.run_hop_cycle();
        info!(
            index = hop.index,
            f1 = hop.freq_radio_1,
            f2 = hop.freq_radio_2,
            confidence = suggestion.confidence,
            hint = suggestion.aggressiveness_hint,
            group_switch = suggestion.suggest_group_switch,
            "anti-jam hop fired"
        );
        Some(hop)
    }

    fn run_hop_cycle(&self) -> SyncedHop {
        self.glock.begin_cycle();
        let freq_radio_1 = self.glock.next_synced(RADIO_1);
        let freq_radio_2 = self.glock.next_synced(RADIO_2);
        SyncedHop {
            index: self.glock.synced_index(),
            freq_radio_1,
            freq_radio_2,
        }
    }

    /// Flip the active band on a group-switch hint, at most once per
    /// cooldown interval. No-op on single-band plans.
    fn maybe_switch_band(&mut self, now_ms: u32) {
        let plan = self.glock.plan();
        if !plan.is_dual_band() {
            return;
        }
        if self.band_switched_once
            && now_ms.wrapping_sub(self.last_band_switch_ms) < BAND_SWITCH_COOLDOWN_MS
        {
            return;
        }
        plan.set_use_primary(!plan.use_primary());
        self.last_band_switch_ms = now_ms;
        self.band_switched_once = true;
        info!(domain = plan.domain(), "switched active band");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{Domain, RadioVariant};
    use crate::anti_jam::{JamState, WindowMode};
    use crate::mode_switch::encode_command;

    fn detector_cfg() -> DetectorConfig {
        DetectorConfig {
            window_size_packets: 100,
            window_mode: WindowMode::ByCount,
            jam_threshold_percent: 30,
            min_bad_packets: 5,
            consecutive_windows_to_jam: 1,
            jam_state_hold_time_ms: 0,
            min_time_between_reco_ms: 1,
            ..Default::default()
        }
    }

    fn link() -> AntiJamLink {
        AntiJamLink::new(
            FreqPlan::new(RadioVariant::Sx128x, Domain::Ism2g4, 0xB10C_5EED),
            &detector_cfg(),
        )
    }

    /// Register `window` packets with `bad` uniformly-spread bad outcomes.
    fn drive_window(
        link: &mut AntiJamLink,
        window: u16,
        bad: u16,
        t0: u32,
    ) -> Vec<SyncedHop> {
        let mut hops = Vec::new();
        for i in 0..window {
            let is_bad = (u32::from(i) * u32::from(bad)) % u32::from(window) < u32::from(bad);
            if let Some(hop) = link.register_packet(!is_bad, t0 + u32::from(i)) {
                hops.push(hop);
            }
        }
        hops
    }

    // -- end-to-end scenarios ---------------------------------------------

    #[test]
    fn scenario_detection_threshold() {
        let mut link = link();
        let _ = link.set_enabled(true, 0);

        let hops = drive_window(&mut link, 100, 30, 0);
        let rpt = link.report();
        assert_eq!(rpt.state, JamState::Jammed);
        assert_eq!(hops.len(), 1, "one hop per entry to Jammed");
        assert!((28..=32).contains(&rpt.score), "score {}", rpt.score);
    }

    #[test]
    fn scenario_debounce() {
        let mut link = link();
        let _ = link.set_enabled(true, 0);
        link.detector_mut()
            .configure(&DetectorConfig {
                consecutive_windows_to_jam: 3,
                ..detector_cfg()
            })
            .unwrap();

        let mut hops = Vec::new();
        hops.extend(drive_window(&mut link, 100, 30, 0));
        assert_eq!(link.report().state, JamState::Suspect);
        hops.extend(drive_window(&mut link, 100, 30, 100));
        assert_eq!(link.report().state, JamState::Suspect);
        hops.extend(drive_window(&mut link, 100, 30, 200));
        assert_eq!(link.report().state, JamState::Jammed);
        assert_eq!(hops.len(), 1, "hop only on entry to Jammed");
    }

    #[test]
    fn scenario_hold_time() {
        let mut link = link();
        let _ = link.set_enabled(true, 0);
        link.detector_mut()
            .configure(&DetectorConfig {
                jam_state_hold_time_ms: 2000,
                ..detector_cfg()
            })
            .unwrap();

        drive_window(&mut link, 100, 30, 0);
        assert_eq!(link.report().state, JamState::Jammed);

        drive_window(&mut link, 100, 0, 1000);
        assert_eq!(
            link.report().state,
            JamState::Jammed,
            "clean window inside the hold interval must not soften"
        );

        drive_window(&mut link, 100, 0, 3000);
        assert_eq!(link.report().state, JamState::Suspect);
    }

    #[test]
    fn scenario_glock_dual_radio() {
        let link = link();
        let glock = link.glock();

        glock.begin_cycle();
        let f1 = glock.next_synced(RADIO_1);
        let f2 = glock.next_synced(RADIO_2);
        let idx = glock.synced_index();
        assert_eq!(f1, glock.plan().freq_at(idx, RADIO_1));
        assert_eq!(f2, glock.plan().freq_at(idx, RADIO_2));

        // Without a new begin_cycle the same frequency comes back.
        assert_eq!(glock.next_synced(RADIO_1), f1);
        assert_eq!(glock.synced_index(), idx);
    }

    #[test]
    fn scenario_controller_lock() {
        let mut link = link();
        let notifies: u32;
        // Count notifies through the switch's observer.
        {
            use std::cell::Cell;
            use std::rc::Rc;
            let count = Rc::new(Cell::new(0u32));
            let count_cb = Rc::clone(&count);
            link.switch_mut().set_notify(Some(Box::new(move |_, _, _| {
                count_cb.set(count_cb.get() + 1);
            })));
            link.switch_mut().set_controller_only(true);

            assert_eq!(
                link.set_mode_local(SwitchMode::High, 10),
                SwitchOutcome::Denied
            );
            assert_eq!(link.switch_mut().mode(), SwitchMode::Auto);

            assert_eq!(
                link.switch_mut().set_mode_from_controller(SwitchMode::High, 20),
                SwitchOutcome::Applied
            );
            assert_eq!(link.switch_mut().mode(), SwitchMode::High);
            notifies = count.get();
        }
        assert_eq!(notifies, 1);
    }

    #[test]
    fn scenario_external_jam_bump() {
        let mut link = AntiJamLink::new(
            FreqPlan::new(RadioVariant::Sx128x, Domain::Ism2g4, 0xB10C_5EED),
            &DetectorConfig {
                allow_group_switch_suggestions: true,
                ..detector_cfg()
            },
        );
        let _ = link.set_enabled(true, 0);

        for i in 0..10u32 {
            link.register_packet(true, 500 + i);
        }
        assert_eq!(link.report().score, 0);

        link.register_external_jam(510);
        assert_eq!(link.report().score, 10);
        assert!(link.detector_mut().evaluate_hop().suggest_group_switch);
    }

    // -- façade wiring ----------------------------------------------------

    #[test]
    fn test_disabled_link_drops_recommendations() {
        let mut link = link();
        let hops = drive_window(&mut link, 100, 50, 0);
        assert!(hops.is_empty(), "disabled link must not hop");
        assert_eq!(link.glock().synced_index(), 0);
        // The detector still observed everything.
        assert_eq!(link.report().state, JamState::Jammed);
    }

    #[test]
    fn test_enable_transition_resets_detector() {
        let mut link = link();
        drive_window(&mut link, 100, 50, 0);
        assert_eq!(link.report().state, JamState::Jammed);

        let _ = link.set_enabled(true, 200);
        assert_eq!(
            link.report().state,
            JamState::NotJammed,
            "stale jam evidence must not survive the enable transition"
        );
    }

    #[test]
    fn test_force_hop_honours_enable() {
        let mut link = link();
        assert!(link.force_synced_hop(10).is_none());

        let _ = link.set_enabled(true, 20);
        let hop = link.force_synced_hop(30).expect("enabled link hops");
        assert_eq!(hop.index, link.glock().synced_index());
        assert_eq!(link.glock().epoch(), 1);
    }

    #[test]
    fn test_rc_frame_controls_switch() {
        let mut link = link();
        link.switch_mut().set_controller_only(true);

        // CH4 high, CH5 up: enable + HIGH, via controller permissions.
        let mut channels = [992u16; 16];
        channels[3] = 1811;
        channels[4] = 1811;
        assert_eq!(link.process_rc(&channels, 5), SwitchOutcome::Applied);
        assert!(link.switch_mut().is_enabled());
        assert_eq!(link.switch_mut().mode(), SwitchMode::High);

        // Same frame again: no change.
        assert_eq!(link.process_rc(&channels, 10), SwitchOutcome::NoChange);
    }

    #[test]
    fn test_controller_command_enable_resets_detector() {
        let mut link = link();
        drive_window(&mut link, 100, 50, 0);

        let byte = encode_command(true, SwitchMode::Auto);
        assert_eq!(link.apply_controller_command(byte, 500), SwitchOutcome::Applied);
        assert_eq!(link.report().state, JamState::NotJammed);
    }

    #[test]
    fn test_group_switch_flips_band_with_cooldown() {
        let mut link = AntiJamLink::new(
            FreqPlan::new_dual(
                RadioVariant::Lr1121,
                Domain::Ism2g4,
                Domain::Fcc915,
                0xB10C_5EED,
            ),
            &DetectorConfig {
                window_size_packets: 10,
                min_bad_packets: 1,
                allow_group_switch_suggestions: true,
                min_time_between_reco_ms: 1,
                consecutive_windows_to_jam: 1,
                jam_state_hold_time_ms: 0,
                ..Default::default()
            },
        );
        let _ = link.set_enabled(true, 0);
        assert!(link.glock().plan().use_primary());

        // Saturate: every window is 100% bad, hints allowed.
        for i in 0..10u32 {
            link.register_packet(false, i);
        }
        assert!(!link.glock().plan().use_primary(), "hint flips the band");

        // Within the cooldown the band must not flip back.
        for i in 10..20u32 {
            link.register_packet(false, i);
        }
        assert!(!link.glock().plan().use_primary());

        // Past the cooldown it may flip again.
        for i in 0..10u32 {
            link.register_packet(false, 600 + i);
        }
        assert!(link.glock().plan().use_primary());
    }

    #[test]
    fn test_from_config_applies_switch_policy() {
        let mut config = LinkConfig::default();
        config.switch.controller_only = true;
        config.fhss.seed = 0xB10C_5EED;

        let mut link = AntiJamLink::from_config(&config);
        assert!(link.switch_mut().is_controller_only());
        assert_eq!(
            link.set_mode_local(SwitchMode::High, 1),
            SwitchOutcome::Denied
        );
    }

    #[test]
    fn test_hop_advances_cursor_each_recommendation() {
        let mut link = AntiJamLink::new(
            FreqPlan::new(RadioVariant::Sx128x, Domain::Ism2g4, 0xB10C_5EED),
            &DetectorConfig {
                window_size_packets: 10,
                min_bad_packets: 1,
                min_time_between_reco_ms: 100,
                consecutive_windows_to_jam: 1,
                jam_state_hold_time_ms: 0,
                ..Default::default()
            },
        );
        let _ = link.set_enabled(true, 0);

        let mut hops = Vec::new();
        for i in 0..100u32 {
            if let Some(hop) = link.register_packet(false, i * 20) {
                hops.push(hop);
            }
        }
        assert!(hops.len() >= 2);
        assert_eq!(u32::from(link.glock().synced_index()), hops.len() as u32);
        assert_eq!(link.glock().epoch(), hops.len() as u32);
    }
}
