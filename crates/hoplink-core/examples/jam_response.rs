//! Simulated jam-and-recover run.
//!
//! Drives the full coordination core with synthetic packet outcomes: a
//! clean phase, a jammed phase where 60% of packets fail CRC, and a
//! recovery phase. Watch the log for the detector entering `Jammed`, the
//! synchronized hops it fires, and the state softening afterwards.
//!
//! ```sh
//! cargo run --example jam_response
//! ```

use hoplink_core::{
    init_logging, AntiJamLink, DetectorConfig, Domain, FreqPlan, LogConfig, RadioVariant,
};

fn main() {
    init_logging(&LogConfig::development());

    let plan = FreqPlan::new_dual(
        RadioVariant::Lr1121,
        Domain::Ism2g4,
        Domain::Fcc915,
        0x1234_5678,
    );
    let mut link = AntiJamLink::new(
        plan,
        &DetectorConfig {
            window_size_packets: 50,
            jam_threshold_percent: 30,
            min_bad_packets: 5,
            consecutive_windows_to_jam: 2,
            jam_state_hold_time_ms: 1000,
            min_time_between_reco_ms: 200,
            allow_group_switch_suggestions: true,
            ..Default::default()
        },
    );

    let _ = link.set_enabled(true, 0);

    let mut now_ms = 0u32;
    let mut hops = 0usize;

    // 4 ms per packet: a 250 Hz link.
    fn drive(link: &mut AntiJamLink, packets: u32, bad_percent: u32, now: &mut u32) -> usize {
        let mut fired = 0;
        for i in 0..packets {
            let bad = (i * bad_percent) % 100 < bad_percent;
            if link.register_packet(!bad, *now).is_some() {
                fired += 1;
            }
            *now += 4;
            link.service_tick(*now);
        }
        fired
    }

    println!("--- clean air ---");
    hops += drive(&mut link, 200, 2, &mut now_ms);

    println!("--- jammer up (60% loss) ---");
    hops += drive(&mut link, 400, 60, &mut now_ms);

    println!("--- jammer down ---");
    hops += drive(&mut link, 600, 2, &mut now_ms);

    let report = link.report();
    println!(
        "final: state={:?} score={} hops={} index={} domain={}",
        report.state,
        report.score,
        hops,
        link.glock().synced_index(),
        link.glock().plan().domain(),
    );
}
