use std::collections::BTreeMap;
use std::fmt;

use storage::{Disk, DiskError};
use thiserror::Error;

/// Key prefix for segments swapped out to disk.
pub const SWAP_KEY_PREFIX: &str = "swap";

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("out of memory: requested {requested} bytes, largest free region is {largest_free}")]
    OutOfMemory { requested: usize, largest_free: usize },

    #[error("segments must hold at least one byte")]
    EmptySegment,

    #[error("segmentation fault: address 0x{addr:04x} outside segment [0x{base:04x}, 0x{limit:04x})")]
    SegmentationFault { addr: usize, base: usize, limit: usize },

    #[error("segment [0x{base:04x}, 0x{limit:04x}) is not allocated")]
    UnknownSegment { base: usize, limit: usize },

    #[error(transparent)]
    Disk(#[from] DiskError),
}

pub type Result<T> = core::result::Result<T, MemoryError>;

/// A contiguous allocated range `[base, limit)` of the memory space.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    base: usize,
    limit: usize,
}

impl Segment {
    fn new(base: usize, limit: usize) -> Self {
        Self { base, limit }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// One past the last address of the segment.
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.limit - self.base
    }

    pub fn is_empty(&self) -> bool {
        self.base == self.limit
    }

    pub fn contains(&self, addr: usize) -> bool {
        self.base <= addr && addr < self.limit
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04x}, 0x{:04x})", self.base, self.limit)
    }
}

/// A free run of cells `[base, base + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRegion {
    pub base: usize,
    pub len: usize,
}

impl FreeRegion {
    fn end(&self) -> usize {
        self.base + self.len
    }
}

/// One row of the inspection view: a hex label for the first address and the
/// cell values that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRow {
    pub base: usize,
    pub values: Vec<u8>,
}

impl MemoryRow {
    pub fn label(&self) -> String {
        format!("0x{:04X}", self.base)
    }
}

/// Memory Manager: the sole owner of the simulated machine's memory space.
///
/// EDUCATIONAL PURPOSE: this is the "RAM" of the simulated computer plus the
/// bookkeeping an OS needs to share it between processes.
///
/// DESIGN AT A GLANCE:
/// - Memory is one flat `Vec<u8>`. Rows shown by [`MemoryManager::snapshot_rows`]
///   are only a view; execution never sees them.
/// - Processes get contiguous [`Segment`]s. Allocation is first-fit over a
///   free list kept sorted by address, so results are deterministic.
/// - Freed regions are merged with free neighbours (coalescing), which keeps
///   the free list short and lets large requests succeed again.
/// - Every process access goes through [`MemoryManager::read`] /
///   [`MemoryManager::write`], which reject addresses outside the caller's
///   segment. A process can never touch another process's memory.
/// - Under memory pressure a segment can be evicted to a [`Disk`] and
///   restored later, possibly at a different base address.
///
/// REAL OS COMPARISON: real kernels page fixed-size frames through an MMU.
/// Contiguous segments with base/limit checks are the older, simpler scheme
/// and are much easier to follow step by step.
#[derive(Debug)]
pub struct MemoryManager {
    cells: Vec<u8>,
    /// Sorted by base, never adjacent (always coalesced).
    free: Vec<FreeRegion>,
    /// Live segments: base -> limit.
    live: BTreeMap<usize, usize>,
    next_swap_id: u64,
}

impl MemoryManager {
    pub fn new(size: usize) -> Self {
        let free = if size == 0 {
            Vec::new()
        } else {
            vec![FreeRegion { base: 0, len: size }]
        };
        Self {
            cells: vec![0u8; size],
            free,
            live: BTreeMap::new(),
            next_swap_id: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn free_regions(&self) -> &[FreeRegion] {
        &self.free
    }

    pub fn free_bytes(&self) -> usize {
        self.free.iter().map(|r| r.len).sum()
    }

    pub fn largest_free(&self) -> usize {
        self.free.iter().map(|r| r.len).max().unwrap_or(0)
    }

    pub fn live_segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.live.iter().map(|(&base, &limit)| Segment::new(base, limit))
    }

    pub fn is_live(&self, segment: Segment) -> bool {
        self.live.get(&segment.base) == Some(&segment.limit)
    }

    /// Allocates `size` contiguous bytes from the lowest free region that fits.
    /// On failure nothing changes.
    pub fn allocate(&mut self, size: usize) -> Result<Segment> {
        if size == 0 {
            return Err(MemoryError::EmptySegment);
        }
        let idx = self
            .free
            .iter()
            .position(|r| r.len >= size)
            .ok_or(MemoryError::OutOfMemory {
                requested: size,
                largest_free: self.largest_free(),
            })?;

        let region = self.free[idx];
        if region.len == size {
            self.free.remove(idx);
        } else {
            self.free[idx] = FreeRegion {
                base: region.base + size,
                len: region.len - size,
            };
        }
        let segment = Segment::new(region.base, region.base + size);
        self.live.insert(segment.base, segment.limit);
        log::debug!("allocated {:?} ({} bytes)", segment, size);
        Ok(segment)
    }

    /// Returns `segment` to the free list, merging it with adjacent free regions.
    /// Cell contents are left as they were.
    pub fn free(&mut self, segment: Segment) -> Result<()> {
        if !self.is_live(segment) {
            return Err(MemoryError::UnknownSegment {
                base: segment.base,
                limit: segment.limit,
            });
        }
        self.live.remove(&segment.base);

        let idx = self.free.partition_point(|r| r.base < segment.base);
        self.free.insert(
            idx,
            FreeRegion {
                base: segment.base,
                len: segment.len(),
            },
        );
        // merge with the right neighbour, then the left one
        if idx + 1 < self.free.len() && self.free[idx].end() == self.free[idx + 1].base {
            self.free[idx].len += self.free[idx + 1].len;
            self.free.remove(idx + 1);
        }
        if idx > 0 && self.free[idx - 1].end() == self.free[idx].base {
            self.free[idx - 1].len += self.free[idx].len;
            self.free.remove(idx);
        }
        log::debug!("freed {:?}", segment);
        Ok(())
    }

    fn check(&self, segment: Segment, addr: usize) -> Result<()> {
        if self.is_live(segment) && segment.contains(addr) {
            Ok(())
        } else {
            Err(MemoryError::SegmentationFault {
                addr,
                base: segment.base,
                limit: segment.limit,
            })
        }
    }

    /// Reads the cell at absolute address `addr` on behalf of `segment`'s owner.
    pub fn read(&self, segment: Segment, addr: usize) -> Result<u8> {
        self.check(segment, addr)?;
        Ok(self.cells[addr])
    }

    /// Writes the cell at absolute address `addr` on behalf of `segment`'s owner.
    pub fn write(&mut self, segment: Segment, addr: usize, value: u8) -> Result<()> {
        self.check(segment, addr)?;
        self.cells[addr] = value;
        Ok(())
    }

    /// Copies `bytes` into the segment starting at absolute address `addr`.
    /// Either the whole run fits inside the segment or nothing is written.
    pub fn write_slice(&mut self, segment: Segment, addr: usize, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let last = addr + bytes.len() - 1;
        self.check(segment, addr)?;
        self.check(segment, last)?;
        self.cells[addr..=last].copy_from_slice(bytes);
        Ok(())
    }

    /// Sets every cell of the segment to `value`.
    pub fn fill(&mut self, segment: Segment, value: u8) -> Result<()> {
        if !self.is_live(segment) {
            return Err(MemoryError::UnknownSegment {
                base: segment.base,
                limit: segment.limit,
            });
        }
        self.cells[segment.base..segment.limit].fill(value);
        Ok(())
    }

    /// Copies the segment's bytes.
    pub fn segment_bytes(&self, segment: Segment) -> Result<Vec<u8>> {
        if !self.is_live(segment) {
            return Err(MemoryError::UnknownSegment {
                base: segment.base,
                limit: segment.limit,
            });
        }
        Ok(self.cells[segment.base..segment.limit].to_vec())
    }

    /// Deletes swap records left on `disk` by an earlier run. Records under
    /// other keys are kept. Returns the deleted keys.
    pub fn discard_stale_swap(&self, disk: &mut dyn Disk) -> Result<Vec<String>> {
        let prefix = format!("{}:", SWAP_KEY_PREFIX);
        let stale: Vec<String> = disk
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&prefix))
            .collect();
        for key in &stale {
            disk.delete(key)?;
        }
        if !stale.is_empty() {
            log::debug!("discarded {} stale swap record(s)", stale.len());
        }
        Ok(stale)
    }

    /// Copies the segment to `disk` under a fresh key, then frees it.
    ///
    /// If the disk refuses the write (for example `DiskFull`) the error is
    /// returned and the segment stays allocated with its contents intact.
    pub fn evict(&mut self, segment: Segment, disk: &mut dyn Disk) -> Result<String> {
        let bytes = self.segment_bytes(segment)?;
        let key = format!("{}:{}", SWAP_KEY_PREFIX, self.next_swap_id);
        disk.write(&key, &bytes)?;
        self.next_swap_id += 1;
        self.free(segment)?;
        log::debug!("evicted {:?} to `{}`", segment, key);
        Ok(key)
    }

    /// Brings the record under `key` back into a freshly allocated segment and
    /// deletes the record. The new base may differ from the original one.
    ///
    /// If no region fits, the record stays on disk and `OutOfMemory` is returned.
    pub fn restore(&mut self, key: &str, disk: &mut dyn Disk) -> Result<Segment> {
        let bytes = disk.read(key)?;
        let segment = self.allocate(bytes.len())?;
        self.cells[segment.base..segment.limit].copy_from_slice(&bytes);
        if let Err(e) = disk.delete(key) {
            self.free(segment)?;
            return Err(e.into());
        }
        log::debug!("restored `{}` into {:?}", key, segment);
        Ok(segment)
    }

    /// Unchecked read for inspection. `None` past the end of memory.
    pub fn peek(&self, addr: usize) -> Option<u8> {
        self.cells.get(addr).copied()
    }

    /// Groups the flat memory into rows of `width` cells. The final row is
    /// shorter when the size is not a multiple of `width`.
    pub fn snapshot_rows(&self, width: usize) -> Vec<MemoryRow> {
        let width = width.max(1);
        self.cells
            .chunks(width)
            .enumerate()
            .map(|(i, chunk)| MemoryRow {
                base: i * width,
                values: chunk.to_vec(),
            })
            .collect()
    }
}
