//! Acquisition of monitoring regions exported by local VMs.
//!
//! The format decoder in [`crate::perfdata`] is written against the
//! [`Region`] trait so that it never cares how the bytes were obtained.
//! The common production path is [`MappedRegion`], a read-only shared
//! mapping of the per-process region file a VM publishes under the
//! system temporary directory; plain byte slices work for everything
//! else, tests included.

use crate::{Error, Result};
use glob::glob;
use lazy_static::lazy_static;
use nix::sys::mman;
use regex::Regex;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// A readable monitoring region.
///
/// Implementations hand out the region's current bytes on every call; the
/// producer may be mutating them concurrently, which is the format's
/// documented consistency model. A region that can no longer be read at
/// all fails with [`Error::RegionUnavailable`].
pub trait Region {
    /// Borrow the region's bytes.
    fn bytes(&self) -> Result<&[u8]>;
}

impl Region for [u8] {
    fn bytes(&self) -> Result<&[u8]> {
        Ok(self)
    }
}

impl Region for Vec<u8> {
    fn bytes(&self) -> Result<&[u8]> {
        Ok(self.as_slice())
    }
}

/// Directory name prefix under which VMs publish per-process region files.
const PERF_DATA_DIR_PREFIX: &str = "hsperfdata_";

lazy_static! {
    static ref PID_FILE_RE: Regex = Regex::new(r"^\d+$").unwrap();
}

fn dir_pattern() -> String {
    format!(
        "{}/{}*",
        std::env::temp_dir().display(),
        PERF_DATA_DIR_PREFIX
    )
}

/// List the process ids of all VMs currently publishing a region file.
///
/// Scans every user's publication directory; entries whose names are not
/// plain pids are ignored, as are directories the caller cannot read.
pub fn monitored_pids() -> Result<Vec<u32>> {
    let mut pids: Vec<u32> = glob(&format!("{}/*", dir_pattern()))?
        .filter_map(std::result::Result::ok)
        .filter_map(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(String::from)
        })
        .filter(|n| PID_FILE_RE.is_match(n))
        .filter_map(|n| n.parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    Ok(pids)
}

/// Locate the region file published by the VM with process id `pid`.
pub fn region_path(pid: u32) -> Result<PathBuf> {
    glob(&format!("{}/{}", dir_pattern(), pid))?
        .filter_map(std::result::Result::ok)
        .next()
        .ok_or(Error::RegionUnavailable)
}

/// A read-only shared mapping of a region file.
///
/// The mapping tracks the producer live: values read through it change as
/// the VM updates its counters. Unmapped on drop; counters that must
/// outlive the mapping are copied out with
/// [`crate::Counter::snapshot`].
#[derive(Debug)]
pub struct MappedRegion {
    base: *mut std::ffi::c_void,
    len: usize,
}

impl MappedRegion {
    /// Map the region file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            return Err(Error::RegionUnavailable);
        }
        let base = unsafe {
            mman::mmap(
                std::ptr::null_mut(),
                len,
                mman::ProtFlags::PROT_READ,
                mman::MapFlags::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )?
        };
        Ok(MappedRegion { base, len })
    }

    /// Locate and map the region published by the VM with process id `pid`.
    pub fn attach(pid: u32) -> Result<Self> {
        MappedRegion::open(region_path(pid)?)
    }

    /// Size of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty. Never true for an open mapping.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Region for MappedRegion {
    fn bytes(&self) -> Result<&[u8]> {
        Ok(unsafe { std::slice::from_raw_parts(self.base as *const u8, self.len) })
    }
}

// The mapping is read-only and lives until drop, so sharing references
// across threads is sound.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        unsafe {
            let _ = mman::munmap(self.base, self.len);
        }
    }
}
