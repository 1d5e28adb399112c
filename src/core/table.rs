/*!
 * Object Tables
 * Fixed-capacity slot arenas with O(1) allocate/release
 *
 * # Design
 *
 * - Slots are allocated once at construction; the table never grows
 * - A free-index stack gives O(1) allocation and release
 * - Each slot carries a generation, bumped on release, so stale ids
 *   are detected instead of aliasing the slot's next occupant
 * - Lowest indices are handed out first on a fresh table
 */

use super::types::SlotId;
use std::marker::PhantomData;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity table of `T` records addressed by generational ids `I`
pub struct ObjectTable<I, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    _id: PhantomData<fn() -> I>,
}

impl<I: SlotId, T> ObjectTable<I, T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                value: None,
            })
            .collect();
        // Reverse so that index 0 is popped first
        let free = (0..capacity as u32).rev().collect();

        Self {
            slots,
            free,
            _id: PhantomData,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of free slots
    #[inline]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Allocate a slot; `None` when the table is exhausted
    pub fn insert(&mut self, value: T) -> Option<I> {
        self.insert_with(|_| value)
    }

    /// Allocate a slot, building the record from its own id
    pub fn insert_with(&mut self, build: impl FnOnce(I) -> T) -> Option<I> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index as usize];
        let id = I::from_parts(index, slot.generation);
        slot.value = Some(build(id));
        Some(id)
    }

    /// Release a slot, returning its record; stale ids are ignored
    pub fn remove(&mut self, id: I) -> Option<T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        Some(value)
    }

    #[inline]
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    #[inline]
    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Occupied slots in index order
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (I::from_parts(index as u32, slot.generation), value))
        })
    }
}
