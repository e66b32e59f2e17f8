//! Request-scoped scratch arena.
//!
//! # Responsibilities
//! - Hand out fixed-size scratch regions for the duration of one pipeline run
//! - Record high-water marks and release everything above a mark in bulk
//!
//! # Design Decisions
//! - Regions are offset/length handles, not references, so the arena can be
//!   rolled back while the pipeline still holds other borrows
//! - A region above the current top is stale and can no longer be accessed
//! - `ArenaScope` rolls back on drop, so every exit path releases its scratch

use std::ops::{Deref, DerefMut};
use thiserror::Error;

/// Allocation granularity of the bump arena.
const ALIGN: usize = 8;

/// Errors raised by a scratch arena.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    /// Not enough room left for the requested allocation.
    #[error("requested {requested} bytes, {available} available")]
    Exhausted { requested: usize, available: usize },

    /// The region was released by a rollback.
    #[error("region at offset {offset} was rolled back")]
    Stale { offset: usize },
}

/// Opaque high-water mark of an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot(usize);

impl Snapshot {
    /// Create a mark at the given arena offset.
    pub fn at(offset: usize) -> Self {
        Self(offset)
    }

    /// Arena offset this mark refers to.
    pub fn offset(&self) -> usize {
        self.0
    }
}

/// Handle to bytes allocated from an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    offset: usize,
    len: usize,
}

impl Region {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Contract of a bump allocator with mark/rollback.
pub trait ScratchArena {
    /// Allocate `size` bytes above the current top.
    fn allocate(&mut self, size: usize) -> Result<Region, ArenaError>;

    /// Mutable access to a live region.
    fn region_mut(&mut self, region: Region) -> Result<&mut [u8], ArenaError>;

    /// Record the current high-water mark.
    fn snapshot(&self) -> Snapshot;

    /// Release every allocation made since `snapshot`.
    fn rollback(&mut self, snapshot: Snapshot);

    /// Bytes currently allocated.
    fn used(&self) -> usize;
}

/// Fixed-capacity bump allocator backing one request.
#[derive(Debug)]
pub struct BumpArena {
    storage: Vec<u8>,
    top: usize,
}

impl BumpArena {
    /// Create an arena able to hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity],
            top: 0,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes still available for allocation.
    pub fn available(&self) -> usize {
        self.storage.len() - self.top
    }
}

impl ScratchArena for BumpArena {
    fn allocate(&mut self, size: usize) -> Result<Region, ArenaError> {
        let offset = self.top.next_multiple_of(ALIGN);
        let end = offset.checked_add(size).filter(|end| *end <= self.storage.len());
        match end {
            Some(end) => {
                self.top = end;
                Ok(Region::new(offset, size))
            }
            None => Err(ArenaError::Exhausted {
                requested: size,
                available: self.storage.len().saturating_sub(offset),
            }),
        }
    }

    fn region_mut(&mut self, region: Region) -> Result<&mut [u8], ArenaError> {
        if region.end() > self.top {
            return Err(ArenaError::Stale {
                offset: region.offset,
            });
        }
        Ok(&mut self.storage[region.offset..region.end()])
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot(self.top)
    }

    fn rollback(&mut self, snapshot: Snapshot) {
        // Marks are LIFO; a mark above the top was already released.
        debug_assert!(snapshot.0 <= self.top, "rollback past a newer mark");
        self.top = snapshot.0.min(self.top);
    }

    fn used(&self) -> usize {
        self.top
    }
}

/// Guard that rolls an arena back to its entry mark when dropped.
pub struct ArenaScope<'a, A: ScratchArena + ?Sized> {
    arena: &'a mut A,
    mark: Snapshot,
}

impl<'a, A: ScratchArena + ?Sized> ArenaScope<'a, A> {
    /// Take a mark on `arena` that is restored when the scope ends.
    pub fn enter(arena: &'a mut A) -> Self {
        let mark = arena.snapshot();
        Self { arena, mark }
    }

    /// The mark this scope returns to.
    pub fn mark(&self) -> Snapshot {
        self.mark
    }
}

impl<A: ScratchArena + ?Sized> Deref for ArenaScope<'_, A> {
    type Target = A;

    fn deref(&self) -> &A {
        self.arena
    }
}

impl<A: ScratchArena + ?Sized> DerefMut for ArenaScope<'_, A> {
    fn deref_mut(&mut self) -> &mut A {
        self.arena
    }
}

impl<A: ScratchArena + ?Sized> Drop for ArenaScope<'_, A> {
    fn drop(&mut self) {
        self.arena.rollback(self.mark);
        tracing::trace!(mark = self.mark.0, "Workspace rolled back");
    }
}
