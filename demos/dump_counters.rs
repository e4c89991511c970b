//! Dump every counter published by a monitored VM.
//!
//! Usage: `dump_counters [pid]`. Without a pid, the first monitored VM
//! found on the system is used.

use log::info;
use perfdata_utils::{CounterData, MappedRegion, Prologue, Scanner};

fn main() -> perfdata_utils::Result<()> {
    env_logger::init();

    let pid = match std::env::args().skip(1).next() {
        Some(a) => a.parse().expect("pid must be a number"),
        None => *perfdata_utils::region::monitored_pids()?
            .first()
            .expect("no monitored VM found"),
    };

    let region = MappedRegion::attach(pid)?;
    let prologue = Prologue::open(&region)?;
    info!(
        "attached to pid {}: format {}.{}, {} of {} bytes used, {} entries",
        pid,
        prologue.major_version(),
        prologue.minor_version(),
        prologue.used()?,
        region.len(),
        prologue.num_entries()?,
    );

    let mut scanner = Scanner::new(prologue)?;
    for counter in scanner.find_all()? {
        match counter.value() {
            CounterData::Long(v) => println!("{} = {}", counter.name(), v),
            CounterData::Longs(vs) => println!("{} = {:?}", counter.name(), vs),
            CounterData::Bytes(bs) => println!("{} = {} raw bytes", counter.name(), bs.len()),
            CounterData::Text(s) => println!("{} = \"{}\"", counter.name(), s),
        }
    }
    Ok(())
}
