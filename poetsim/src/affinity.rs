//! Rank-to-core placement.
//!
//! Ranks are plain threads; keeping each one on its own core stops the
//! scheduler from migrating them mid-measurement. A [`CoreMap`] is detected
//! once by the main thread and each rank thread pins itself through it;
//! failures are reported to the caller, which decides whether an unpinned
//! run is acceptable (it is, the numbers are just noisier).

use std::fmt;
use std::fs;
use std::io;

/// Why a rank could not be pinned.
#[derive(Debug)]
pub enum PinError {
    /// Core discovery came up empty; nothing to pin to.
    NoCores,
    /// The kernel rejected the affinity mask for this core.
    Affinity { core: usize, source: io::Error },
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinError::NoCores => write!(f, "no online cores discovered"),
            PinError::Affinity { core, source } => {
                write!(f, "cannot pin to core {}: {}", core, source)
            }
        }
    }
}

impl std::error::Error for PinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PinError::Affinity { source, .. } => Some(source),
            PinError::NoCores => None,
        }
    }
}

/// Round-robin assignment of ranks onto the machine's online cores.
///
/// With more ranks than cores the assignment wraps; oversubscribed ranks
/// share a core rather than float free.
#[derive(Debug, Clone)]
pub struct CoreMap {
    cores: Vec<usize>,
}

impl CoreMap {
    /// Discover the online cores once, on the main thread.
    pub fn detect() -> Self {
        Self {
            cores: online_core_ids(),
        }
    }

    /// The core `rank` is assigned to, if any were discovered.
    pub fn core_for(&self, rank: usize) -> Option<usize> {
        if self.cores.is_empty() {
            None
        } else {
            Some(self.cores[rank % self.cores.len()])
        }
    }

    /// Pin the calling thread (rank `rank`) to its assigned core.
    /// Returns the core on success so the caller can log the placement.
    pub fn pin(&self, rank: usize) -> Result<usize, PinError> {
        let core = self.core_for(rank).ok_or(PinError::NoCores)?;
        let ret = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(core, &mut set);
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if ret == 0 {
            Ok(core)
        } else {
            Err(PinError::Affinity {
                core,
                source: io::Error::last_os_error(),
            })
        }
    }
}

/// Online core IDs, ascending. Reads the sysfs cpulist ("0-3,8,10-11"
/// format); falls back to counting processors when sysfs is unreadable.
fn online_core_ids() -> Vec<usize> {
    if let Ok(list) = fs::read_to_string("/sys/devices/system/cpu/online") {
        let cores = parse_cpu_list(&list);
        if !cores.is_empty() {
            return cores;
        }
    }
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n > 0 {
        (0..n as usize).collect()
    } else {
        Vec::new()
    }
}

/// Expand a sysfs cpulist into sorted, deduplicated core IDs. Malformed
/// entries are skipped rather than failing the whole list.
fn parse_cpu_list(list: &str) -> Vec<usize> {
    let mut cores: Vec<usize> = list
        .trim()
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            let (lo, hi) = match entry.split_once('-') {
                Some((a, b)) => (a.parse().ok()?, b.parse().ok()?),
                None => {
                    let core = entry.parse().ok()?;
                    (core, core)
                }
            };
            Some(lo..=hi)
        })
        .flatten()
        .collect();
    cores.sort_unstable();
    cores.dedup();
    cores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_list_expansion() {
        assert_eq!(parse_cpu_list("0-3"), vec![0, 1, 2, 3]);
        assert_eq!(parse_cpu_list("0,2,4"), vec![0, 2, 4]);
        assert_eq!(parse_cpu_list("0-2,8-9\n"), vec![0, 1, 2, 8, 9]);
        assert_eq!(parse_cpu_list("3,0-1,3"), vec![0, 1, 3]);
        assert_eq!(parse_cpu_list("7,bad,2-x"), vec![7]);
        assert!(parse_cpu_list("garbage").is_empty());
    }

    #[test]
    fn ranks_wrap_round_robin_over_cores() {
        let map = CoreMap {
            cores: vec![2, 3, 5],
        };
        assert_eq!(map.core_for(0), Some(2));
        assert_eq!(map.core_for(1), Some(3));
        assert_eq!(map.core_for(2), Some(5));
        assert_eq!(map.core_for(3), Some(2));

        let empty = CoreMap { cores: Vec::new() };
        assert_eq!(empty.core_for(0), None);
        assert!(matches!(empty.pin(0), Err(PinError::NoCores)));
    }

    #[test]
    fn detection_finds_a_core() {
        let map = CoreMap::detect();
        assert!(map.core_for(0).is_some());
    }
}
