//! Object pool implementation
//!
//! Fixed-capacity storage handing out generation-tagged handles. The free
//! list is a circular buffer (head/tail), so slots are reused in FIFO order
//! and a freed handle is never confused with the object that later occupies
//! the same slot: every free bumps the slot generation.

use std::fmt;

/// Handle to an object stored in an [`OgsPool`]
///
/// A handle stays valid until its object is freed. After that every lookup
/// through it misses, even once the slot has been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OgsPoolId {
    index: u32,
    generation: u32,
}

impl OgsPoolId {
    /// Slot index inside the pool (0-based)
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Generation of the slot at the time the handle was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for OgsPoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    item: Option<T>,
}

/// Generic fixed-capacity object pool
#[derive(Debug)]
pub struct OgsPool<T> {
    /// Name of the pool (for logging)
    name: String,
    head: usize,
    tail: usize,
    size: usize,
    avail: usize,
    /// Free list (circular buffer of slot indices)
    free: Vec<Option<usize>>,
    array: Vec<Slot<T>>,
}

impl<T> OgsPool<T> {
    /// Create a new pool with the given capacity
    pub fn new(name: &str, size: usize) -> Self {
        let free = (0..size).map(Some).collect();
        let array = (0..size)
            .map(|_| Slot {
                generation: 1,
                item: None,
            })
            .collect();

        OgsPool {
            name: name.to_string(),
            head: 0,
            tail: 0,
            size,
            avail: size,
            free,
            array,
        }
    }

    /// Store an item, returning its handle, or None when the pool is full
    pub fn alloc(&mut self, item: T) -> Option<OgsPoolId> {
        self.alloc_with(|_| item)
    }

    /// Store an item built from its own handle
    ///
    /// Useful for objects that keep their handle as a back-reference.
    pub fn alloc_with<F>(&mut self, init: F) -> Option<OgsPoolId>
    where
        F: FnOnce(OgsPoolId) -> T,
    {
        self.try_alloc_with(|id| Ok::<T, ()>(init(id)))
            .and_then(Result::ok)
    }

    /// Like [`alloc_with`](Self::alloc_with), but `init` may fail
    ///
    /// None when the pool is full. When `init` fails the slot is left free
    /// and its handle is never handed out.
    pub fn try_alloc_with<F, E>(&mut self, init: F) -> Option<Result<OgsPoolId, E>>
    where
        F: FnOnce(OgsPoolId) -> Result<T, E>,
    {
        if self.avail == 0 {
            log::debug!("[{}] pool exhausted ({})", self.name, self.size);
            return None;
        }
        let idx = self.free[self.head]?;
        let id = OgsPoolId {
            index: idx as u32,
            generation: self.array[idx].generation,
        };
        let item = match init(id) {
            Ok(item) => item,
            Err(e) => return Some(Err(e)),
        };

        self.free[self.head] = None;
        self.head = (self.head + 1) % self.size;
        self.avail -= 1;
        self.array[idx].item = Some(item);
        Some(Ok(id))
    }

    /// Free an item, returning it
    ///
    /// A stale or foreign handle frees nothing and returns None.
    pub fn free(&mut self, id: OgsPoolId) -> Option<T> {
        let idx = id.index();
        let slot = self.array.get_mut(idx)?;
        if slot.generation != id.generation || slot.item.is_none() {
            return None;
        }
        let item = slot.item.take();
        slot.generation = slot.generation.wrapping_add(1).max(1);

        self.free[self.tail] = Some(idx);
        self.tail = (self.tail + 1) % self.size;
        self.avail += 1;
        item
    }

    /// Get item by handle
    pub fn find(&self, id: OgsPoolId) -> Option<&T> {
        let slot = self.array.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.item.as_ref()
    }

    /// Get mutable item by handle
    pub fn find_mut(&mut self, id: OgsPoolId) -> Option<&mut T> {
        let slot = self.array.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.item.as_mut()
    }

    /// Check whether a handle still refers to a live object
    pub fn contains(&self, id: OgsPoolId) -> bool {
        self.find(id).is_some()
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.avail
    }

    /// Total capacity
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Number of allocated objects
    pub fn allocated(&self) -> usize {
        self.size - self.avail
    }

    pub fn is_empty(&self) -> bool {
        self.avail == self.size
    }

    pub fn is_full(&self) -> bool {
        self.avail == 0
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterate over allocated items in slot order
    pub fn iter(&self) -> impl Iterator<Item = (OgsPoolId, &T)> {
        self.array.iter().enumerate().filter_map(|(i, slot)| {
            slot.item.as_ref().map(|item| {
                (
                    OgsPoolId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    item,
                )
            })
        })
    }

    /// Iterate over allocated items mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (OgsPoolId, &mut T)> {
        self.array.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.item.as_mut().map(|item| {
                (
                    OgsPoolId {
                        index: i as u32,
                        generation,
                    },
                    item,
                )
            })
        })
    }

    /// Handles of every allocated item
    pub fn ids(&self) -> Vec<OgsPoolId> {
        self.iter().map(|(id, _)| id).collect()
    }
}
