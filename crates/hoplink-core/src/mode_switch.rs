//! Anti-jam enable and mode arbitration
//!
//! The switch holds the link's anti-jam enable flag and operating mode
//! (AUTO / LOW / HIGH) and arbitrates who may change them. Two request
//! origins exist:
//!
//! - **local**: receiver-side UI or configuration. Mode changes are
//!   refused while the controller-only policy bit is set.
//! - **controller**: commands that arrived over the authenticated control
//!   link. These bypass the controller-only lock. Authentication itself is
//!   the transport's job; callers hand the switch pre-validated requests.
//!
//! Every successful change stamps `last_change_ms` and invokes the notify
//! observer exactly once, even when a packed command changes both fields.
//! A debounce interval can turn a well-formed change into [`SwitchOutcome::NoChange`].

use serde::{Deserialize, Serialize};

/// Anti-jam operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    /// Detector-driven hopping
    #[default]
    Auto = 0,
    /// Conservative hopping
    Low = 1,
    /// Aggressive hopping
    High = 2,
}

impl SwitchMode {
    /// Decode the two-bit wire encoding; the reserved value `3` falls back
    /// to `Auto`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => SwitchMode::Low,
            2 => SwitchMode::High,
            _ => SwitchMode::Auto,
        }
    }

    /// Two-bit wire encoding.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Strict decode for raw-indexed callers (configuration files,
    /// telemetry): only `0..=2` are valid.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(SwitchMode::Auto),
            1 => Some(SwitchMode::Low),
            2 => Some(SwitchMode::High),
            _ => None,
        }
    }
}

/// Outcome of a set/request operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SwitchOutcome {
    /// State changed; notify fired
    Applied,
    /// Requested value already active, or debounced
    NoChange,
    /// Refused by the controller-only policy
    Denied,
    /// Malformed request (out-of-range raw mode index)
    Invalid,
}

/// Telemetry snapshot of the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchStatus {
    pub enabled: bool,
    pub mode: SwitchMode,
    pub controller_only: bool,
    pub last_change_ms: u32,
}

/// Controller command byte: bit 0 = enable, bits 1..=2 = mode. Bits 3..=7
/// are reserved: zero on send, ignored on receive.
pub fn encode_command(enabled: bool, mode: SwitchMode) -> u8 {
    u8::from(enabled) | (mode.bits() << 1)
}

/// Split a command byte into `(enabled, mode)`.
pub fn decode_command(byte: u8) -> (bool, SwitchMode) {
    (byte & 0x01 != 0, SwitchMode::from_bits(byte >> 1))
}

/// Observer invoked after each applied change with the new state.
pub type NotifyCallback = Box<dyn FnMut(bool, SwitchMode, u32)>;

/// Enable/mode state with origin-based permissions.
pub struct ModeSwitch {
    enabled: bool,
    mode: SwitchMode,
    controller_only: bool,
    last_change_ms: u32,
    debounce_ms: u32,
    notify: Option<NotifyCallback>,
}

impl std::fmt::Debug for ModeSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeSwitch")
            .field("enabled", &self.enabled)
            .field("mode", &self.mode)
            .field("controller_only", &self.controller_only)
            .field("last_change_ms", &self.last_change_ms)
            .finish_non_exhaustive()
    }
}

impl Default for ModeSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeSwitch {
    /// Disabled, `Auto`, controller-only off, no debounce.
    pub fn new() -> Self {
        Self {
            enabled: false,
            mode: SwitchMode::Auto,
            controller_only: false,
            last_change_ms: 0,
            debounce_ms: 0,
            notify: None,
        }
    }

    /// Return to defaults. Keeps the notify observer.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.mode = SwitchMode::Auto;
        self.controller_only = false;
        self.last_change_ms = 0;
    }

    /// Minimum interval between applied changes; changes arriving sooner
    /// resolve to `NoChange`.
    pub fn set_debounce_ms(&mut self, ms: u32) {
        self.debounce_ms = ms;
    }

    /// Register a change observer. `None` unregisters.
    pub fn set_notify(&mut self, cb: Option<NotifyCallback>) {
        self.notify = cb;
    }

    /// Enable or disable anti-jam hopping. Allowed from any origin.
    pub fn set_enabled(&mut self, enable: bool, when_ms: u32) -> SwitchOutcome {
        self.apply(Some(enable), None, when_ms)
    }

    /// Controller-originated enable/disable; identical permissions to
    /// [`Self::set_enabled`], kept separate so call sites document origin.
    pub fn request_enable_from_controller(&mut self, enable: bool, when_ms: u32) -> SwitchOutcome {
        self.apply(Some(enable), None, when_ms)
    }

    /// Receiver-side mode change; refused while controller-only is set.
    pub fn set_mode_local(&mut self, mode: SwitchMode, when_ms: u32) -> SwitchOutcome {
        if self.controller_only {
            return SwitchOutcome::Denied;
        }
        self.apply(None, Some(mode), when_ms)
    }

    /// Receiver-side mode change from a raw index (configuration paths).
    pub fn set_mode_local_indexed(&mut self, index: u8, when_ms: u32) -> SwitchOutcome {
        match SwitchMode::from_index(index) {
            Some(mode) => self.set_mode_local(mode, when_ms),
            None => SwitchOutcome::Invalid,
        }
    }

    /// Controller-originated mode change; bypasses controller-only.
    pub fn set_mode_from_controller(&mut self, mode: SwitchMode, when_ms: u32) -> SwitchOutcome {
        self.apply(None, Some(mode), when_ms)
    }

    /// Apply a validated controller command byte: both fields atomically,
    /// one notify if either changed.
    pub fn apply_command(&mut self, byte: u8, when_ms: u32) -> SwitchOutcome {
        let (enable, mode) = decode_command(byte);
        self.apply(Some(enable), Some(mode), when_ms)
    }

    /// Set the controller-only policy bit. Not a state change: no notify,
    /// no timestamp update.
    pub fn set_controller_only(&mut self, controller_only: bool) {
        self.controller_only = controller_only;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> SwitchMode {
        self.mode
    }

    pub fn is_controller_only(&self) -> bool {
        self.controller_only
    }

    /// Telemetry snapshot.
    pub fn status(&self) -> SwitchStatus {
        SwitchStatus {
            enabled: self.enabled,
            mode: self.mode,
            controller_only: self.controller_only,
            last_change_ms: self.last_change_ms,
        }
    }

    /// Shared apply path: permission checks already done by the caller.
    fn apply(
        &mut self,
        enable: Option<bool>,
        mode: Option<SwitchMode>,
        when_ms: u32,
    ) -> SwitchOutcome {
        let enable_changes = enable.is_some_and(|e| e != self.enabled);
        let mode_changes = mode.is_some_and(|m| m != self.mode);
        if !enable_changes && !mode_changes {
            return SwitchOutcome::NoChange;
        }

        if self.debounce_ms > 0
            && when_ms.wrapping_sub(self.last_change_ms) < self.debounce_ms
        {
            return SwitchOutcome::NoChange;
        }

        if let Some(enable) = enable {
            self.enabled = enable;
        }
        if let Some(mode) = mode {
            self.mode = mode;
        }
        self.last_change_ms = when_ms;

        if let Some(cb) = self.notify.as_mut() {
            cb(self.enabled, self.mode, when_ms);
        }
        SwitchOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn with_counter() -> (ModeSwitch, Rc<RefCell<Vec<(bool, SwitchMode)>>>) {
        let mut sw = ModeSwitch::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_cb = Rc::clone(&log);
        sw.set_notify(Some(Box::new(move |en, mode, _when| {
            log_cb.borrow_mut().push((en, mode));
        })));
        (sw, log)
    }

    #[test]
    fn test_enable_notifies_once() {
        let (mut sw, log) = with_counter();
        assert_eq!(sw.set_enabled(true, 10), SwitchOutcome::Applied);
        assert!(sw.is_enabled());
        assert_eq!(sw.status().last_change_ms, 10);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_no_change_is_silent() {
        let (mut sw, log) = with_counter();
        let _ = sw.set_enabled(true, 10);
        assert_eq!(sw.set_enabled(true, 20), SwitchOutcome::NoChange);
        assert_eq!(sw.status().last_change_ms, 10);
        assert_eq!(log.borrow().len(), 1);

        assert_eq!(sw.set_mode_local(SwitchMode::Auto, 30), SwitchOutcome::NoChange);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_controller_only_denies_local() {
        let (mut sw, log) = with_counter();
        sw.set_controller_only(true);

        assert_eq!(sw.set_mode_local(SwitchMode::High, 10), SwitchOutcome::Denied);
        assert_eq!(sw.mode(), SwitchMode::Auto);
        assert!(log.borrow().is_empty());

        assert_eq!(
            sw.set_mode_from_controller(SwitchMode::High, 20),
            SwitchOutcome::Applied
        );
        assert_eq!(sw.mode(), SwitchMode::High);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_controller_enable_bypasses_lock() {
        let (mut sw, _log) = with_counter();
        sw.set_controller_only(true);
        assert_eq!(
            sw.request_enable_from_controller(true, 5),
            SwitchOutcome::Applied
        );
        assert!(sw.is_enabled());
    }

    #[test]
    fn test_command_byte_round_trip() {
        for enabled in [false, true] {
            for mode in [SwitchMode::Auto, SwitchMode::Low, SwitchMode::High] {
                let byte = encode_command(enabled, mode);
                assert_eq!(decode_command(byte), (enabled, mode));
                assert_eq!(byte & 0xF8, 0, "reserved bits must stay clear");
            }
        }
    }

    #[test]
    fn test_reserved_mode_bits_fall_back_to_auto() {
        // bits1..2 == 3 is the reserved encoding
        let (enabled, mode) = decode_command(0b0000_0111);
        assert!(enabled);
        assert_eq!(mode, SwitchMode::Auto);
    }

    #[test]
    fn test_command_applies_both_with_one_notify() {
        let (mut sw, log) = with_counter();
        let byte = encode_command(true, SwitchMode::High);
        assert_eq!(sw.apply_command(byte, 42), SwitchOutcome::Applied);
        assert!(sw.is_enabled());
        assert_eq!(sw.mode(), SwitchMode::High);
        assert_eq!(log.borrow().as_slice(), &[(true, SwitchMode::High)]);
    }

    #[test]
    fn test_command_ignores_reserved_bits() {
        let mut sw = ModeSwitch::new();
        assert_eq!(sw.apply_command(0b1010_0001, 1), SwitchOutcome::Applied);
        assert!(sw.is_enabled());
        assert_eq!(sw.mode(), SwitchMode::Auto);
    }

    #[test]
    fn test_invalid_raw_index() {
        let (mut sw, log) = with_counter();
        assert_eq!(sw.set_mode_local_indexed(7, 5), SwitchOutcome::Invalid);
        assert_eq!(sw.mode(), SwitchMode::Auto);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_debounce_turns_change_into_nochange() {
        let (mut sw, log) = with_counter();
        sw.set_debounce_ms(100);

        assert_eq!(sw.set_enabled(true, 1000), SwitchOutcome::Applied);
        assert_eq!(sw.set_mode_local(SwitchMode::Low, 1050), SwitchOutcome::NoChange);
        assert_eq!(sw.mode(), SwitchMode::Auto);
        assert_eq!(sw.set_mode_local(SwitchMode::Low, 1100), SwitchOutcome::Applied);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_reset_keeps_observer() {
        let (mut sw, log) = with_counter();
        let _ = sw.set_enabled(true, 1);
        sw.reset();
        assert!(!sw.is_enabled());
        let _ = sw.set_enabled(true, 2);
        assert_eq!(log.borrow().len(), 2);
    }
}
