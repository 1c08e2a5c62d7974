//! Packet-quality jamming detector
//!
//! Watches the stream of per-packet CRC outcomes through a sliding window
//! and drives a debounced state machine:
//!
//! ```text
//!              jammy window                 streak >= debounce
//!  NotJammed ──────────────► Suspect ──────────────────────► Jammed
//!      ▲                        │  ▲                            │
//!      │   clean (score < T/2)  │  │   clean + hold expired     │
//!      └────────────────────────┘  └────────────────────────────┘
//! ```
//!
//! A window is *jammy* when the bad-packet ratio meets the configured
//! threshold and an absolute bad-packet floor. Entering `Jammed` (or a
//! strongly-degraded `Suspect`) produces a hop recommendation, paced by a
//! minimum interval so a persistent jammer cannot spin the link through
//! its whole hop set.
//!
//! The detector performs no I/O and never allocates after construction:
//! the packet ring is sized once and reconfiguration may only shrink the
//! usable window. Timestamps come from the caller's millisecond clock and
//! all interval arithmetic is wrapping, so a clock rollover inside a
//! window is harmless.

use crate::LinkError;
use serde::{Deserialize, Serialize};

/// How the observation window is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Window closes every `window_size_packets` packets
    ByCount,
    /// Window holds the last `window_duration_ms` of packets
    ByTime,
}

/// Jamming assessment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JamState {
    /// Link quality within expectations
    NotJammed,
    /// One or more jammy windows, below the debounce count
    Suspect,
    /// Debounce satisfied; interference assumed hostile or persistent
    Jammed,
}

/// Detector configuration. Out-of-range values are clamped at apply time:
/// counts and intervals to a minimum of 1, the threshold into `1..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Ring capacity / count-mode window length (packets)
    pub window_size_packets: u16,
    /// Time-mode window length (ms)
    pub window_duration_ms: u32,
    /// Window bounding mode
    pub window_mode: WindowMode,
    /// Bad-packet percentage at which a window is jammy
    pub jam_threshold_percent: u8,
    /// Absolute bad-packet floor before any window is jammy
    pub min_bad_packets: u16,
    /// Consecutive jammy windows required to enter `Jammed`
    pub consecutive_windows_to_jam: u8,
    /// Minimum dwell in `Jammed` before softening (ms)
    pub jam_state_hold_time_ms: u32,
    /// Floor on the recommendation cadence (ms)
    pub min_time_between_reco_ms: u32,
    /// Allow `suggest_group_switch` hints in suggestions
    pub allow_group_switch_suggestions: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size_packets: 100,
            window_duration_ms: 1000,
            window_mode: WindowMode::ByCount,
            jam_threshold_percent: 30,
            min_bad_packets: 5,
            consecutive_windows_to_jam: 2,
            jam_state_hold_time_ms: 2000,
            min_time_between_reco_ms: 500,
            allow_group_switch_suggestions: false,
        }
    }
}

impl DetectorConfig {
    fn clamped(&self) -> Self {
        let mut cfg = self.clone();
        cfg.window_size_packets = cfg.window_size_packets.max(1);
        cfg.window_duration_ms = cfg.window_duration_ms.max(1);
        cfg.min_time_between_reco_ms = cfg.min_time_between_reco_ms.max(1);
        cfg.consecutive_windows_to_jam = cfg.consecutive_windows_to_jam.max(1);
        cfg.jam_threshold_percent = cfg.jam_threshold_percent.clamp(1, 100);
        cfg
    }
}

/// Hop recommendation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopSuggestion {
    /// Whether a hop is recommended now
    pub recommend: bool,
    /// 0..=100, driven by evidence volume and threshold margin
    pub confidence: u8,
    /// 0..=255 aggressiveness hint (score rescaled)
    pub aggressiveness_hint: u8,
    /// Hint that moving to the other band/group is worthwhile
    pub suggest_group_switch: bool,
}

/// Snapshot of the detector's last assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JamReport {
    /// Current state-machine state
    pub state: JamState,
    /// 0 (clean) ..= 100 (fully jammed)
    pub score: u8,
    /// Whether the assessment would recommend a hop (pacing respected)
    pub recommend_hop: bool,
    /// 0..=100
    pub confidence: u8,
    /// Timestamp the report was computed at (ms)
    pub when_ms: u32,
    /// 0..=255 aggressiveness hint
    pub aggressiveness_hint: u8,
}

impl JamReport {
    fn idle(when_ms: u32) -> Self {
        Self {
            state: JamState::NotJammed,
            score: 0,
            recommend_hop: false,
            confidence: 0,
            when_ms,
            aggressiveness_hint: 0,
        }
    }
}

/// Observer invoked when a paced recommendation fires.
pub type HopCallback = Box<dyn FnMut(&HopSuggestion)>;

#[derive(Debug, Clone, Copy, Default)]
struct PacketEntry {
    good: bool,
    ts_ms: u32,
}

/// Sliding-window jamming detector.
pub struct AntiJamDetector {
    cfg: DetectorConfig,
    /// Ring storage, allocated once; length never changes after `new`
    entries: Vec<PacketEntry>,
    /// Usable ring capacity (≤ `entries.len()`)
    capacity: u16,
    count: u16,
    head: u16,
    bad_count: u16,
    window_start_ms: u32,
    last_now_ms: u32,
    state: JamState,
    jam_streak: u8,
    last_jam_change_ms: u32,
    ext_jam_recent: bool,
    ext_jam_since_ms: u32,
    last_reco_ms: u32,
    last_report: JamReport,
    hop_cb: Option<HopCallback>,
}

impl std::fmt::Debug for AntiJamDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntiJamDetector")
            .field("cfg", &self.cfg)
            .field("capacity", &self.capacity)
            .field("count", &self.count)
            .field("bad_count", &self.bad_count)
            .field("state", &self.state)
            .field("jam_streak", &self.jam_streak)
            .finish_non_exhaustive()
    }
}

impl AntiJamDetector {
    /// Build a detector. The ring is sized to `window_size_packets` and
    /// that allocation is final: later `configure` calls may only shrink
    /// the usable window.
    pub fn new(cfg: &DetectorConfig) -> Self {
        let cfg = cfg.clamped();
        let capacity = cfg.window_size_packets;
        Self {
            cfg,
            entries: vec![PacketEntry::default(); usize::from(capacity)],
            capacity,
            count: 0,
            head: 0,
            bad_count: 0,
            window_start_ms: 0,
            last_now_ms: 0,
            state: JamState::NotJammed,
            jam_streak: 0,
            last_jam_change_ms: 0,
            ext_jam_recent: false,
            ext_jam_since_ms: 0,
            last_reco_ms: 0,
            last_report: JamReport::idle(0),
            hop_cb: None,
        }
    }

    /// Replace the configuration.
    ///
    /// Growing the window beyond the ring allocated at construction is
    /// rejected; the context is left untouched. A capacity change resets
    /// ring usage, and the streak always restarts so the new thresholds
    /// re-debounce from scratch.
    pub fn configure(&mut self, cfg: &DetectorConfig) -> Result<(), LinkError> {
        let cfg = cfg.clamped();
        if usize::from(cfg.window_size_packets) > self.entries.len() {
            return Err(LinkError::WindowExceedsRing {
                requested: cfg.window_size_packets,
                allocated: self.entries.len() as u16,
            });
        }

        let old_capacity = self.capacity;
        self.capacity = cfg.window_size_packets;
        self.cfg = cfg;
        if self.capacity != old_capacity {
            self.count = 0;
            self.head = 0;
            self.bad_count = 0;
        }
        self.window_start_ms = self.last_now_ms;
        self.jam_streak = 0;
        Ok(())
    }

    /// Clear all observations and return to `NotJammed`. The last seen
    /// timestamp is kept so subsequent intervals stay sane.
    pub fn reset(&mut self) {
        self.count = 0;
        self.head = 0;
        self.bad_count = 0;
        self.window_start_ms = self.last_now_ms;
        self.state = JamState::NotJammed;
        self.jam_streak = 0;
        self.last_jam_change_ms = self.last_now_ms;
        self.ext_jam_recent = false;
        self.ext_jam_since_ms = 0;
        self.last_reco_ms = 0;
        self.last_report = JamReport::idle(self.last_now_ms);
    }

    /// Register an observer for paced recommendations. `None` unregisters.
    pub fn set_hop_callback(&mut self, cb: Option<HopCallback>) {
        self.hop_cb = cb;
    }

    /// Record one packet outcome (`good` = CRC OK) observed at `time_ms`.
    ///
    /// Returns the suggestion when this packet made a paced recommendation
    /// fire; the registered callback (if any) observes the same suggestion.
    pub fn register_packet(&mut self, good: bool, time_ms: u32) -> Option<HopSuggestion> {
        self.last_now_ms = time_ms;
        self.prune_old(time_ms);

        if self.count == self.capacity {
            let evicted = self.entries[usize::from(self.head)];
            if !evicted.good {
                self.bad_count = self.bad_count.saturating_sub(1);
            }
        } else {
            self.count += 1;
        }

        self.entries[usize::from(self.head)] = PacketEntry {
            good,
            ts_ms: time_ms,
        };
        if !good {
            self.bad_count += 1;
        }
        self.head = (self.head + 1) % self.capacity;

        // Count mode: the wrap right after filling marks a window boundary.
        if self.cfg.window_mode == WindowMode::ByCount
            && self.count == self.capacity
            && self.head == 0
        {
            self.on_window_boundary(time_ms);
        }

        self.update_report(time_ms);
        self.fire_if_recommended(time_ms)
    }

    /// Record an external jam indication (RF front-end overload, spectrum
    /// scan, telemetry from the peer). Sticky until one window duration
    /// passes without renewal.
    pub fn register_external_jam(&mut self, time_ms: u32) -> Option<HopSuggestion> {
        self.last_now_ms = time_ms;
        self.ext_jam_recent = true;
        self.ext_jam_since_ms = time_ms;

        self.prune_old(time_ms);
        self.update_report(time_ms);
        self.fire_if_recommended(time_ms)
    }

    /// Periodic maintenance: prune time windows, process elapsed window
    /// boundaries, age out the external-jam flag, refresh the report.
    /// Never fires the callback.
    pub fn tick(&mut self, now_ms: u32) {
        self.last_now_ms = now_ms;

        if self.cfg.window_mode == WindowMode::ByTime {
            self.prune_old(now_ms);

            let dur = self.cfg.window_duration_ms;
            let elapsed = now_ms.wrapping_sub(self.window_start_ms);
            if elapsed >= dur {
                let steps = (elapsed / dur).max(1);
                self.window_start_ms = self.window_start_ms.wrapping_add(steps * dur);
                self.on_window_boundary(now_ms);
            }
        }

        if self.ext_jam_recent {
            let age = now_ms.wrapping_sub(self.ext_jam_since_ms);
            let limit = match self.cfg.window_mode {
                WindowMode::ByTime => self.cfg.window_duration_ms,
                WindowMode::ByCount => 1000,
            };
            if age >= limit {
                self.ext_jam_recent = false;
            }
        }

        self.update_report(now_ms);
    }

    /// Last computed report.
    pub fn report(&self) -> JamReport {
        self.last_report
    }

    /// Whether the state machine currently reads `Jammed`.
    pub fn is_jammed(&self) -> bool {
        self.state == JamState::Jammed
    }

    /// Current state.
    pub fn state(&self) -> JamState {
        self.state
    }

    /// Number of bad packets in the current window.
    pub fn bad_count(&self) -> u16 {
        self.bad_count
    }

    /// Number of packets in the current window.
    pub fn window_count(&self) -> u16 {
        self.count
    }

    /// Active configuration (after clamping).
    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Compute a suggestion from the cached report without touching the
    /// recommendation pacing.
    pub fn evaluate_hop(&self) -> HopSuggestion {
        let rpt = &self.last_report;
        let recommend = match self.state {
            JamState::Jammed => true,
            JamState::Suspect => rpt.score >= self.suspect_reco_threshold(),
            JamState::NotJammed => false,
        };
        HopSuggestion {
            recommend,
            confidence: rpt.confidence,
            aggressiveness_hint: rpt.aggressiveness_hint,
            suggest_group_switch: self.group_switch_hint(rpt.score),
        }
    }

    // ---- internals ------------------------------------------------------

    /// Evict entries older than the time window (time mode only), oldest
    /// side first.
    fn prune_old(&mut self, now_ms: u32) {
        if self.cfg.window_mode != WindowMode::ByTime {
            return;
        }
        let dur = self.cfg.window_duration_ms;
        while self.count > 0 {
            let tail = (self.head + self.capacity - self.count) % self.capacity;
            let entry = self.entries[usize::from(tail)];
            if now_ms.wrapping_sub(entry.ts_ms) <= dur {
                break;
            }
            if !entry.good {
                self.bad_count = self.bad_count.saturating_sub(1);
            }
            self.count -= 1;
        }
    }

    /// Bad-packet score 0..=100, lifted slightly while an external jam
    /// indication is fresh.
    fn score(&self) -> u8 {
        if self.count == 0 {
            return 0;
        }
        let mut pct = u32::from(self.bad_count) * 100 / u32::from(self.count);
        if self.ext_jam_recent {
            pct = (pct + 10).min(100);
        }
        pct as u8
    }

    fn window_jammy(&self) -> bool {
        self.bad_count >= self.cfg.min_bad_packets
            && self.score() >= self.cfg.jam_threshold_percent
    }

    fn suspect_reco_threshold(&self) -> u8 {
        (self.cfg.jam_threshold_percent as u32 + 10).min(100) as u8
    }

    fn group_switch_hint(&self, score: u8) -> bool {
        self.cfg.allow_group_switch_suggestions && (score >= 80 || self.ext_jam_recent)
    }

    /// Debounce / streak logic, run once per closed window.
    fn on_window_boundary(&mut self, now_ms: u32) {
        if self.window_jammy() {
            self.jam_streak = self.jam_streak.saturating_add(1);
            if self.jam_streak >= self.cfg.consecutive_windows_to_jam {
                if self.state != JamState::Jammed {
                    self.state = JamState::Jammed;
                    self.last_jam_change_ms = now_ms;
                }
            } else if self.state == JamState::NotJammed {
                self.state = JamState::Suspect;
                self.last_jam_change_ms = now_ms;
            }
            return;
        }

        self.jam_streak = 0;
        match self.state {
            JamState::Jammed => {
                let held = now_ms.wrapping_sub(self.last_jam_change_ms);
                if held >= self.cfg.jam_state_hold_time_ms {
                    self.state = JamState::Suspect;
                    self.last_jam_change_ms = now_ms;
                }
            }
            JamState::Suspect => {
                if self.count == 0 || self.score() < self.cfg.jam_threshold_percent / 2 {
                    self.state = JamState::NotJammed;
                    self.last_jam_change_ms = now_ms;
                }
            }
            JamState::NotJammed => {}
        }
    }

    fn update_report(&mut self, now_ms: u32) {
        let score = self.score();

        let confidence = if self.count == 0 {
            0
        } else {
            let over = u32::from(score.saturating_sub(self.cfg.jam_threshold_percent));
            let base = u32::from(self.count.min(100));
            (base / 2 + over).min(100) as u8
        };

        let hint = (u32::from(score) * 255 / 100) as u8;

        let paced = now_ms.wrapping_sub(self.last_reco_ms) >= self.cfg.min_time_between_reco_ms;
        let recommend = paced
            && match self.state {
                JamState::Jammed => true,
                JamState::Suspect => score >= self.suspect_reco_threshold(),
                JamState::NotJammed => false,
            };

        self.last_report = JamReport {
            state: self.state,
            score,
            recommend_hop: recommend,
            confidence,
            when_ms: now_ms,
            aggressiveness_hint: hint,
        };
    }

    /// If the fresh report recommends a hop, consume the pacing budget,
    /// notify the observer, and hand the suggestion back.
    fn fire_if_recommended(&mut self, now_ms: u32) -> Option<HopSuggestion> {
        if !self.last_report.recommend_hop {
            return None;
        }

        let suggestion = HopSuggestion {
            recommend: true,
            confidence: self.last_report.confidence,
            aggressiveness_hint: self.last_report.aggressiveness_hint,
            suggest_group_switch: self.group_switch_hint(self.last_report.score),
        };

        self.last_reco_ms = now_ms;
        if let Some(cb) = self.hop_cb.as_mut() {
            cb(&suggestion);
        }
        Some(suggestion)
    }
}
