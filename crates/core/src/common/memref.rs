//! Memory reference records.
//!
//! This module defines the unit of work the stats core consumes. It provides:
//! 1. **Reference kinds:** Instruction fetches, data reads/writes, prefetches,
//!    and control markers (invalidate, flush).
//! 2. **Classification:** Predicates used by the engine and tools to route a
//!    reference to the right accounting structure.
//! 3. **Constructors:** Shorthand builders that keep the `addr == pc`
//!    invariant for instruction fetches.

/// Machine-pointer-sized address. All arithmetic is modulo the address space.
pub type Addr = u64;

/// Classification of a memory reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// Instruction fetch; `addr == pc`.
    InstrFetch,
    /// Data load.
    DataRead,
    /// Data store.
    DataWrite,
    /// Data prefetch.
    Prefetch,
    /// Instruction prefetch.
    PrefetchInstr,
    /// Invalidation event marker.
    Invalidate,
    /// Flush event marker.
    Flush,
    /// Any other trace record (markers, metadata).
    Other,
}

impl RefKind {
    /// True only for retired instruction fetches; instruction prefetches are
    /// speculative and do not advance the instruction clock.
    #[inline]
    pub fn is_instr(self) -> bool {
        self == RefKind::InstrFetch
    }

    /// True for data and instruction prefetches.
    #[inline]
    pub fn is_prefetch(self) -> bool {
        matches!(self, RefKind::Prefetch | RefKind::PrefetchInstr)
    }

    /// True for the kinds that move data through a cache: reads, writes and
    /// prefetches. Markers (invalidate, flush, other) are excluded.
    #[inline]
    pub fn is_data(self) -> bool {
        matches!(
            self,
            RefKind::DataRead | RefKind::DataWrite | RefKind::Prefetch
        )
    }
}

/// A single memory reference handed to the stats core by the host simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemRef {
    /// Reference classification.
    pub kind: RefKind,
    /// Referenced address.
    pub addr: Addr,
    /// Program counter of the issuing instruction.
    pub pc: Addr,
    /// Reference size in bytes.
    pub size: u64,
}

impl MemRef {
    /// An instruction fetch at `addr`; the program counter is the address.
    pub fn instr(addr: Addr, size: u64) -> Self {
        Self {
            kind: RefKind::InstrFetch,
            addr,
            pc: addr,
            size,
        }
    }

    /// An instruction prefetch at `addr`.
    pub fn prefetch_instr(addr: Addr, size: u64) -> Self {
        Self {
            kind: RefKind::PrefetchInstr,
            addr,
            pc: addr,
            size,
        }
    }

    /// A data load of `size` bytes at `addr`, issued by the instruction at `pc`.
    pub fn read(pc: Addr, addr: Addr, size: u64) -> Self {
        Self {
            kind: RefKind::DataRead,
            addr,
            pc,
            size,
        }
    }

    /// A data store of `size` bytes at `addr`, issued by the instruction at `pc`.
    pub fn write(pc: Addr, addr: Addr, size: u64) -> Self {
        Self {
            kind: RefKind::DataWrite,
            addr,
            pc,
            size,
        }
    }

    /// A data prefetch of `size` bytes at `addr`, issued by the instruction at `pc`.
    pub fn prefetch(pc: Addr, addr: Addr, size: u64) -> Self {
        Self {
            kind: RefKind::Prefetch,
            addr,
            pc,
            size,
        }
    }

    /// A bare marker record of the given kind (invalidate, flush, other).
    pub fn marker(kind: RefKind) -> Self {
        Self {
            kind,
            addr: 0,
            pc: 0,
            size: 0,
        }
    }
}
