//! Incremental scanner and name index over a region's entry stream.

use crate::perfdata::entry::{self, ENTRY_ALIGNMENT};
use crate::perfdata::{Counter, Prologue};
use crate::region::Region;
use crate::util::hexdump;
use crate::{Error, Result};
use derive_more::{Index, IntoIterator};
use log::debug;
use regex::Regex;
use std::collections::HashMap;

/// Name-keyed, insertion-ordered collection of decoded counters.
///
/// Duplicate names overwrite the earlier counter in place; the producer is
/// not expected to re-emit a name, but the index does not assume
/// uniqueness.
#[derive(Default, Index, IntoIterator)]
pub struct CounterIndex<'m> {
    /// Counters in the order the scan encountered them.
    #[index]
    #[into_iterator(owned, ref)]
    counters: Vec<Counter<'m>>,
    by_name: HashMap<String, usize>,
}

impl<'m> CounterIndex<'m> {
    /// Insert a counter, silently replacing any previous one of the same
    /// name without disturbing its position.
    pub(crate) fn insert(&mut self, counter: Counter<'m>) {
        match self.by_name.get(counter.name()) {
            Some(&pos) => self.counters[pos] = counter,
            None => {
                self.by_name
                    .insert(String::from(counter.name()), self.counters.len());
                self.counters.push(counter);
            }
        }
    }

    /// Look up a counter by exact name.
    pub fn get(&self, name: &str) -> Option<&Counter<'m>> {
        self.by_name.get(name).map(|&pos| &self.counters[pos])
    }

    /// Iterate over counters in insertion order.
    pub fn iter(&self) -> std::slice::Iter<Counter<'m>> {
        self.counters.iter()
    }

    /// Number of indexed counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the index holds no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn clear(&mut self) {
        self.counters.clear();
        self.by_name.clear();
    }
}

impl<'m> std::fmt::Debug for CounterIndex<'m> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CounterIndex")
            .field("len", &self.counters.len())
            .finish()
    }
}

/// Stateful cursor and index over a region's entry stream.
///
/// The scanner consumes entries from the prologue's first-entry offset up
/// to the producer's live `used` mark, which it re-reads on every step so
/// that growth is observed without re-attaching. All methods take `&mut
/// self`: a scanner's cursor and index form one unit of mutable state, and
/// exclusive access is the concurrency contract. Callers that share a
/// scanner across threads wrap it in a `Mutex`; independent scanners over
/// the same region are safe concurrently.
///
/// The producer updates payloads without synchronization, so a scan can
/// observe torn values; only structural corruption is detectable, and it
/// surfaces as [`Error::CorruptEntry`]. A corrupt entry aborts the scan
/// with the index retaining everything decoded before it. The caller
/// decides whether to retry with [`Scanner::rewind`] once the producer has
/// settled.
pub struct Scanner<'m, R: Region + ?Sized> {
    prologue: Prologue<'m, R>,
    next_entry: usize,
    index: CounterIndex<'m>,
}

impl<'m, R: Region + ?Sized> Scanner<'m, R> {
    /// Create a scanner positioned at the region's first entry.
    pub fn new(prologue: Prologue<'m, R>) -> Result<Self> {
        let mut scanner = Scanner {
            prologue,
            next_entry: 0,
            index: CounterIndex::default(),
        };
        scanner.next_entry = scanner.first_entry_offset()?;
        Ok(scanner)
    }

    /// The prologue this scanner was created from.
    pub fn prologue(&self) -> &Prologue<'m, R> {
        &self.prologue
    }

    /// The counters indexed so far, in insertion order.
    pub fn index(&self) -> &CounterIndex<'m> {
        &self.index
    }

    /// Whether unconsumed entries are currently available.
    ///
    /// Re-reads the producer's `used` mark, so this can turn true again
    /// after returning false once the producer appends more entries.
    pub fn has_next(&self) -> Result<bool> {
        let used = std::cmp::max(self.prologue.used()?, 0) as usize;
        Ok(self.next_entry < used)
    }

    /// Decode the entry at the cursor and advance past it.
    ///
    /// Returns `None` for entries of unrecognized shape; the cursor still
    /// advances by the entry's declared length, keeping the scan aligned
    /// with producers that emit record shapes this reader does not know.
    pub fn advance_one(&mut self) -> Result<Option<Counter<'m>>> {
        let buf = self.prologue.region().bytes()?;
        let off = self.next_entry;
        if off % ENTRY_ALIGNMENT != 0 {
            return Err(Error::CorruptEntry {
                offset: off,
                reason: "scan cursor is not 4-byte aligned",
            });
        }
        if off > buf.len() {
            return Err(Error::CorruptEntry {
                offset: off,
                reason: "scan cursor out of range",
            });
        }
        let used = std::cmp::max(self.prologue.used()?, 0) as usize;
        let limit = std::cmp::min(used, buf.len());
        let decoded = entry::decode_entry(buf, off, limit, self.prologue.byte_order())
            .map_err(|e| {
                let window = &buf[off..std::cmp::min(off + 64, buf.len())];
                debug!("corrupt entry:\n{}", hexdump(window, off));
                e
            })?;
        self.next_entry = off + decoded.length;
        if decoded.counter.is_none() {
            debug!("skipping entry of unrecognized shape at offset {:#x}", off);
        }
        Ok(decoded.counter)
    }

    /// Drain all currently available entries into the index.
    ///
    /// Entries already consumed stay indexed; re-invoking after the
    /// producer appends more picks up exactly the new entries.
    pub fn scan_all(&mut self) -> Result<()> {
        while self.has_next()? {
            if let Some(counter) = self.advance_one()? {
                self.index.insert(counter);
            }
        }
        Ok(())
    }

    /// Reset the cursor to the first entry and clear the index.
    ///
    /// The next scan rebuilds the index from scratch; use this for a full
    /// re-sync rather than incremental catch-up.
    pub fn rewind(&mut self) -> Result<()> {
        self.next_entry = self.first_entry_offset()?;
        self.index.clear();
        Ok(())
    }

    /// Scan to the end of the region and return all counters in insertion
    /// order.
    pub fn find_all(&mut self) -> Result<Vec<&Counter<'m>>> {
        self.scan_all()?;
        Ok(self.index.iter().collect())
    }

    /// Scan to the end of the region and look up a counter by exact name.
    pub fn find_by_name(&mut self, name: &str) -> Result<Option<&Counter<'m>>> {
        self.scan_all()?;
        Ok(self.index.get(name))
    }

    /// Scan to the end of the region and return the counters whose names
    /// match `pattern` from their start, in insertion order.
    ///
    /// The pattern is a regex anchored at the beginning of the name but
    /// not at its end, so `"sun.gc"` matches `sun.gc.count`.
    pub fn find_by_pattern(&mut self, pattern: &str) -> Result<Vec<&Counter<'m>>> {
        self.scan_all()?;
        let re = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(self
            .index
            .iter()
            .filter(|c| re.is_match(c.name()))
            .collect())
    }

    fn first_entry_offset(&self) -> Result<usize> {
        let off = self.prologue.entry_offset()?;
        if off < 0 {
            return Err(Error::CorruptHeader(String::from(
                "negative first-entry offset",
            )));
        }
        Ok(off as usize)
    }
}

impl<'m, R: Region + ?Sized> std::fmt::Debug for Scanner<'m, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("next_entry", &self.next_entry)
            .field("indexed", &self.index.len())
            .finish()
    }
}
