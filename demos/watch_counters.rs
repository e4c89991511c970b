//! Periodically re-scan a monitored VM and print counters matching a
//! pattern, picking up entries the VM appends while we watch.
//!
//! Usage: `watch_counters <pid> [pattern]`. The pattern defaults to
//! `sun.gc`, anchored at the start of the counter name.

use log::info;
use perfdata_utils::{CounterSnapshot, MappedRegion, Prologue, Scanner};
use std::time::Duration;

fn main() -> perfdata_utils::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let pid: u32 = args
        .next()
        .expect("usage: watch_counters <pid> [pattern]")
        .parse()
        .expect("pid must be a number");
    let pattern = args.next().unwrap_or_else(|| String::from("sun.gc"));

    let region = MappedRegion::attach(pid)?;
    let prologue = Prologue::open(&region)?;
    let mut scanner = Scanner::new(prologue)?;

    loop {
        let snapshots: Vec<CounterSnapshot> = scanner
            .find_by_pattern(&pattern)?
            .iter()
            .map(|c| c.snapshot())
            .collect();
        info!("pass over {} matching counters", snapshots.len());
        for snapshot in &snapshots {
            println!("{} = {:?}", snapshot.name(), snapshot.data());
        }
        println!("---");
        std::thread::sleep(Duration::from_secs(2));
    }
}
