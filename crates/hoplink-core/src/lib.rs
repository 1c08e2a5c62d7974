//! # hoplink Core
//!
//! Coordination core of a dual-radio frequency-hopping (FHSS) RC link:
//! the deterministic hop schedule shared with the transmitter, the barrier
//! that keeps both receiver radios on the same hop index, a packet-quality
//! jamming detector, and the policy switch that decides who may turn the
//! detector on and off.
//!
//! ## Signal Flow
//!
//! ```text
//! packet CRC outcomes ──► AntiJamDetector ──recommendation──┐
//!                                                           ▼
//! RC frame / command ──► ModeSwitch ──enabled?──► Glock barrier
//!                                                  │ begin_cycle()
//!                          radio 1 IRQ ───────────►│ next_synced(0) ─► f1
//!                          radio 2 IRQ ───────────►│ next_synced(1) ─► f2
//!                                                  └── same sequence index
//! ```
//!
//! The core performs no I/O and does not touch radio hardware: callers
//! feed it timestamps and packet outcomes, and it hands back carrier
//! frequencies and recommendations. All state is sized at construction;
//! nothing allocates on the packet path.
//!
//! ## Example
//!
//! ```rust
//! use hoplink_core::{
//!     AntiJamLink, DetectorConfig, Domain, FreqPlan, RadioVariant,
//! };
//!
//! let plan = FreqPlan::new(RadioVariant::Sx128x, Domain::Ism2g4, 0x1234_5678);
//! let mut link = AntiJamLink::new(plan, &DetectorConfig::default());
//!
//! // Engage hopping and feed packet outcomes from the receive loop.
//! let _ = link.set_enabled(true, 0);
//! for t in 0..200u32 {
//!     if let Some(hop) = link.register_packet(t % 3 != 0, t) {
//!         println!("hop to {} / {} Hz", hop.freq_radio_1, hop.freq_radio_2);
//!     }
//! }
//! ```

pub mod anti_jam;
pub mod band;
pub mod config;
pub mod freq_plan;
pub mod glock;
pub mod link;
pub mod logging;
pub mod mode_switch;
pub mod rc_channels;
pub mod sequence;

pub use anti_jam::{
    AntiJamDetector, DetectorConfig, HopSuggestion, JamReport, JamState, WindowMode,
};
pub use band::{BandPlan, Domain, RadioTraits, RadioVariant};
pub use config::LinkConfig;
pub use freq_plan::{FreqPlan, RADIO_1, RADIO_2};
pub use glock::Glock;
pub use link::{AntiJamLink, SyncedHop};
pub use logging::{init_logging, LogConfig};
pub use mode_switch::{ModeSwitch, SwitchMode, SwitchOutcome, SwitchStatus};
pub use sequence::{build_sequence, SEQUENCE_LEN};

/// Errors from construction and configuration paths.
///
/// Steady-state operations are infallible: the detector clamps soft
/// inputs, and the switch reports policy results through
/// [`SwitchOutcome`] values rather than errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkError {
    /// A reconfiguration asked for a larger window than the ring
    /// allocated at construction
    #[error("window of {requested} packets exceeds the allocated ring of {allocated}")]
    WindowExceedsRing { requested: u16, allocated: u16 },

    /// Configuration file could not be read or written
    #[error("failed to read config: {0}")]
    ConfigRead(String),

    /// Configuration file could not be parsed
    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    /// Configuration value out of range
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
