//! Hop sequence generation
//!
//! Builds the 256-entry channel sequence shared by transmitter and receiver.
//! Every `freq_count`-th slot is pinned to the sync channel so a searching
//! receiver can re-acquire the link; the slots between anchors hold a
//! per-block permutation of the remaining channels, drawn from a seeded
//! generator. Both ends build the table independently from the binding seed,
//! so the generator below is a compatibility contract: its output must match
//! bit-for-bit across implementations and platforms.

/// Number of entries in a hop sequence table.
pub const SEQUENCE_LEN: usize = 256;

/// Seeded linear-congruential generator used for sequence shuffling.
///
/// Parameters `a = 214013`, `c = 2531011`, `m = 2^31`; the output is the
/// high half of the state. Do not change these; the paired transmitter
/// builds its table with the same constants.
#[derive(Debug, Clone)]
pub struct SeqRng {
    state: u32,
}

impl SeqRng {
    /// Create a generator from the binding seed.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next raw value in `0..0x8000`.
    fn next(&mut self) -> u16 {
        const A: u32 = 214_013;
        const C: u32 = 2_531_011;
        const M: u32 = 0x8000_0000;
        self.state = A.wrapping_mul(self.state).wrapping_add(C) % M;
        (self.state >> 16) as u16
    }

    /// Next value in `0..max` (`max` ≤ 255, non-zero).
    pub fn next_below(&mut self, max: u8) -> u8 {
        (self.next() % u16::from(max)) as u8
    }
}

/// Build the hop sequence for `(seed, freq_count, sync_channel)`.
///
/// Slot `k * freq_count` is the sync channel for every `k`. Within each
/// block the remaining slots are filled in increasing slot order from a
/// fresh shuffle of the non-sync channels, so across any window of full
/// blocks every non-sync channel occurs once per block. The trailing
/// partial block takes a prefix of its shuffled list.
///
/// Deterministic: identical inputs produce identical tables.
pub fn build_sequence(seed: u32, freq_count: u32, sync_channel: u8) -> [u8; SEQUENCE_LEN] {
    let n = freq_count.clamp(1, SEQUENCE_LEN as u32) as usize;
    let sync_channel = if usize::from(sync_channel) < n {
        sync_channel
    } else {
        (n / 2) as u8
    };
    let mut seq = [sync_channel; SEQUENCE_LEN];

    let mut pool: Vec<u8> = (0..n)
        .map(|ch| ch as u8)
        .filter(|&ch| ch != sync_channel)
        .collect();
    if pool.is_empty() {
        return seq;
    }

    let mut rng = SeqRng::new(seed);
    let mut block = 0;
    while block < SEQUENCE_LEN {
        seq[block] = sync_channel;
        shuffle(&mut pool, &mut rng);
        for (offset, &ch) in pool.iter().enumerate() {
            let slot = block + 1 + offset;
            if slot >= SEQUENCE_LEN || slot >= block + n {
                break;
            }
            seq[slot] = ch;
        }
        block += n;
    }

    seq
}

/// Fisher–Yates shuffle driven by the sequence generator.
fn shuffle(pool: &mut [u8], rng: &mut SeqRng) {
    for i in (1..pool.len()).rev() {
        let j = usize::from(rng.next_below((i + 1) as u8));
        pool.swap(i, j);
    }
}

/// Number of usable entries for a band: the largest whole-block multiple
/// of `freq_count` that fits the table.
pub fn usable_entries(freq_count: u32) -> u16 {
    let n = freq_count.clamp(1, SEQUENCE_LEN as u32) as u16;
    (SEQUENCE_LEN as u16 / n) * n
}
