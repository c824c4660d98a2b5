use serde::{Deserialize, Serialize};

/// Index of a slot in a [`SlotPool`]. Stable for the pool's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(usize);

impl SlotId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: T,
    in_use: bool,
}

/// Growable slot arena with a LIFO free-index stack.
///
/// A slot is either in use or on the free stack, never both. Released values
/// stay in their slot so the next `acquire` can reuse them in place.
#[derive(Debug, Clone)]
pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

/// How [`SlotPool::acquire`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Reused(SlotId),
    Allocated(SlotId),
}

impl Acquired {
    #[must_use]
    pub fn id(self) -> SlotId {
        match self {
            Self::Reused(id) | Self::Allocated(id) => id,
        }
    }
}

impl<T> SlotPool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the most recently freed slot, or allocates one with `make`.
    pub fn acquire(&mut self, make: impl FnOnce() -> T) -> Acquired {
        if let Some(index) = self.free.pop() {
            self.slots[index].in_use = true;
            return Acquired::Reused(SlotId(index));
        }
        self.slots.push(Slot {
            value: make(),
            in_use: true,
        });
        Acquired::Allocated(SlotId(self.slots.len() - 1))
    }

    /// Returns a slot to the free stack. `false` when it was not in use.
    pub fn release(&mut self, id: SlotId) -> bool {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return false;
        };
        if !slot.in_use {
            return false;
        }
        slot.in_use = false;
        self.free.push(id.0);
        true
    }

    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots.get(id.0).map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots.get_mut(id.0).map(|slot| &mut slot.value)
    }

    #[must_use]
    pub fn is_in_use(&self, id: SlotId) -> bool {
        self.slots.get(id.0).is_some_and(|slot| slot.in_use)
    }

    /// Allocated slots, in use or free.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn in_use_len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Drops every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_slot_is_reused_before_allocating() {
        let mut pool = SlotPool::new();
        let first = pool.acquire(|| "a").id();
        let second = pool.acquire(|| "b").id();
        assert!(pool.release(first));
        assert!(!pool.release(first));

        assert_eq!(pool.acquire(|| "c"), Acquired::Reused(first));
        assert_eq!(pool.get(first), Some(&"a"));
        assert_eq!(pool.acquire(|| "d"), Acquired::Allocated(SlotId(2)));
        assert!(pool.is_in_use(second));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.free_len(), 0);
    }
}
