//! Dual-radio hop barrier ("Glock")
//!
//! Both radios of a diversity pair must land on the same sequence index
//! every hop cycle, even though each radio's interrupt asks for "the next
//! frequency" independently. The barrier guarantees single advancement:
//! the main loop arms a cycle, the first radio to ask advances the cursor
//! and disarms, and every later caller in the same cycle observes the
//! already-advanced cursor.
//!
//! ```text
//!  main loop          radio 1 IRQ          radio 2 IRQ
//!  begin_cycle()
//!      armed=1  ──►   next_synced(0)
//!                     cursor+=1, armed=0
//!                     returns f(cursor)──► next_synced(1)
//!                                          returns f(cursor)   same index
//! ```
//!
//! The armed flag and the cursor live in one atomic word, so the
//! read-modify-write is a single compare-and-swap and needs no interrupt
//! masking at the call sites.

use crate::freq_plan::FreqPlan;
use std::sync::atomic::{AtomicU32, Ordering};

/// Armed bit in the packed barrier word; low byte is the cursor.
const ARMED: u32 = 1 << 8;
const CURSOR_MASK: u32 = 0xFF;

/// Hop barrier plus the frequency plan it indexes.
#[derive(Debug)]
pub struct Glock {
    plan: FreqPlan,
    /// Packed `(armed, cursor)` word
    word: AtomicU32,
    /// Cycle counter, incremented on every `begin_cycle`
    epoch: AtomicU32,
}

impl Glock {
    /// Wrap a frequency plan in a disarmed barrier at cursor 0.
    pub fn new(plan: FreqPlan) -> Self {
        Self {
            plan,
            word: AtomicU32::new(0),
            epoch: AtomicU32::new(0),
        }
    }

    /// The frequency plan behind the barrier.
    pub fn plan(&self) -> &FreqPlan {
        &self.plan
    }

    /// Open a hop cycle: arm the barrier so the next `next_synced` caller
    /// advances the cursor. Each call starts a new epoch.
    pub fn begin_cycle(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.word.fetch_or(ARMED, Ordering::AcqRel);
    }

    /// Hop to the next synchronized frequency for `radio`.
    ///
    /// The first caller while armed advances the cursor exactly once and
    /// disarms; any concurrent or subsequent caller in the same cycle
    /// observes the advanced cursor. Every caller's frequency therefore
    /// derives from the same index.
    pub fn next_synced(&self, radio: u8) -> u32 {
        let count = u32::from(self.plan.sequence_count());
        let mut word = self.word.load(Ordering::Acquire);
        let cursor = loop {
            if word & ARMED == 0 {
                break word & CURSOR_MASK;
            }
            let advanced = ((word & CURSOR_MASK) + 1) % count;
            match self.word.compare_exchange_weak(
                word,
                advanced,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break advanced,
                Err(observed) => word = observed,
            }
        };
        self.plan.freq_at(cursor as u8, radio)
    }

    /// Current synchronized sequence index.
    pub fn synced_index(&self) -> u8 {
        (self.word.load(Ordering::Acquire) & CURSOR_MASK) as u8
    }

    /// Number of completed `begin_cycle` calls.
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Resynchronize the cursor from a received SYNC packet. Leaves the
    /// armed state untouched.
    pub fn set_index(&self, index: u8) {
        let count = u32::from(self.plan.sequence_count());
        let index = u32::from(index) % count;
        let mut word = self.word.load(Ordering::Acquire);
        loop {
            let updated = (word & ARMED) | index;
            match self.word.compare_exchange_weak(
                word,
                updated,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => word = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{Domain, RadioVariant};
    use crate::freq_plan::{RADIO_1, RADIO_2};

    fn glock() -> Glock {
        Glock::new(FreqPlan::new(
            RadioVariant::Sx128x,
            Domain::Ism2g4,
            0x600D_5EED,
        ))
    }

    #[test]
    fn test_single_advance_per_cycle() {
        let g = glock();
        assert_eq!(g.synced_index(), 0);

        g.begin_cycle();
        let f1 = g.next_synced(RADIO_1);
        let idx = g.synced_index();
        assert_eq!(idx, 1);

        // Further callers in the same cycle see the same index.
        let f2 = g.next_synced(RADIO_2);
        let f1_again = g.next_synced(RADIO_1);
        assert_eq!(g.synced_index(), idx);
        assert_eq!(f1, f1_again);
        assert_eq!(f1, g.plan().freq_at(idx, RADIO_1));
        assert_eq!(f2, g.plan().freq_at(idx, RADIO_2));
    }

    #[test]
    fn test_k_cycles_advance_k_times() {
        let g = glock();
        let start_epoch = g.epoch();
        for k in 1..=10u8 {
            g.begin_cycle();
            // Interleave callers; order varies by cycle.
            if k % 2 == 0 {
                g.next_synced(RADIO_2);
                g.next_synced(RADIO_1);
            } else {
                g.next_synced(RADIO_1);
                g.next_synced(RADIO_2);
            }
            assert_eq!(g.synced_index(), k);
        }
        assert_eq!(g.epoch() - start_epoch, 10);
    }

    #[test]
    fn test_next_without_begin_does_not_advance() {
        let g = glock();
        let f = g.next_synced(RADIO_1);
        assert_eq!(g.synced_index(), 0);
        assert_eq!(f, g.plan().freq_at(0, RADIO_1));
    }

    #[test]
    fn test_cursor_wraps_at_sequence_count() {
        let g = glock();
        let count = g.plan().sequence_count();
        g.set_index((count - 1) as u8);
        g.begin_cycle();
        g.next_synced(RADIO_1);
        assert_eq!(g.synced_index(), 0);
    }

    #[test]
    fn test_set_index_preserves_armed() {
        let g = glock();
        g.begin_cycle();
        g.set_index(42);
        assert_eq!(g.synced_index(), 42);
        // Barrier is still armed: next call advances.
        g.next_synced(RADIO_1);
        assert_eq!(g.synced_index(), 43);
    }

    #[test]
    fn test_begin_is_idempotent_before_advance() {
        let g = glock();
        g.begin_cycle();
        g.begin_cycle();
        g.next_synced(RADIO_1);
        g.next_synced(RADIO_2);
        // Two begins without an intervening next still advance only once
        // per armed period.
        assert_eq!(g.synced_index(), 1);
        assert_eq!(g.epoch(), 2);
    }

    #[test]
    fn test_concurrent_callers_one_advance() {
        use std::sync::Arc;

        let g = Arc::new(glock());
        for cycle in 1..=50u32 {
            g.begin_cycle();
            let a = {
                let g = Arc::clone(&g);
                std::thread::spawn(move || g.next_synced(RADIO_1))
            };
            let b = {
                let g = Arc::clone(&g);
                std::thread::spawn(move || g.next_synced(RADIO_2))
            };
            a.join().unwrap();
            b.join().unwrap();
            let count = u32::from(g.plan().sequence_count());
            assert_eq!(u32::from(g.synced_index()), cycle % count);
        }
    }
}
