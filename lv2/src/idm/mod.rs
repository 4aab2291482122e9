//! Id manager: maps 32-bit guest-visible ids to shared kernel objects.
//!
//! An id is `base + slot * step + generation % step`. Releasing a slot bumps its
//! generation, so a stale id held by the guest misses instead of aliasing the
//! next object placed in the same slot.
//!
//! Lookups run under a shared lock and may nest. `check` keeps the shared lock
//! for the duration of its closure, which is how a syscall keeps the object it
//! works on from being withdrawn underneath it.

use crate::sync::RWLock;
use crate::task::allocator::RecycleAllocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdLayout {
    pub base: u32,
    pub step: u32,
    pub count: usize,
}

impl IdLayout {
    fn encode(&self, index: usize, generation: u32) -> u32 {
        self.base + index as u32 * self.step + generation % self.step
    }

    fn decode(&self, id: u32) -> Option<(usize, u32)> {
        let offset = id.checked_sub(self.base)?;
        let index = (offset / self.step) as usize;
        (index < self.count).then(|| (index, offset % self.step))
    }
}

struct Slot<T> {
    generation: u32,
    object: Option<T>,
}

/// Outcome of [`IdManager::withdraw`]. The object is removed only when `result` is `Ok`.
pub struct Withdrawal<T, E> {
    pub object: T,
    pub result: Result<(), E>,
}

pub struct IdManager<T> {
    layout: IdLayout,
    slots: RWLock<Vec<Slot<T>>>,
    allocator: RecycleAllocator,
}

impl<T: Clone> IdManager<T> {
    pub fn new(layout: IdLayout, capacity: usize) -> Self {
        let capacity = capacity.min(layout.count);
        Self {
            layout,
            slots: RWLock::new(Vec::new()),
            allocator: RecycleAllocator::new(capacity),
        }
    }

    /// Places a new object in a free slot. `f` receives the id the object will live at.
    ///
    /// Returns `None` when every slot is taken.
    pub fn make(&self, f: impl FnOnce(u32) -> T) -> Option<(u32, T)> {
        let index = self.allocator.alloc()?;
        let mut slots = self.slots.write();
        if slots.len() <= index {
            slots.resize_with(index + 1, || Slot {
                generation: 0,
                object: None,
            });
        }
        let slot = &mut slots[index];
        let id = self.layout.encode(index, slot.generation);
        let object = f(id);
        slot.object = Some(object.clone());
        Some((id, object))
    }

    /// Places `object` at exactly `id`. Fails if the id is out of range or taken.
    pub fn make_at(&self, id: u32, object: T) -> bool {
        let Some((index, generation)) = self.layout.decode(id) else {
            return false;
        };
        if !self.allocator.reserve(index) {
            return false;
        }
        let mut slots = self.slots.write();
        if slots.len() <= index {
            slots.resize_with(index + 1, || Slot {
                generation: 0,
                object: None,
            });
        }
        slots[index] = Slot {
            generation,
            object: Some(object),
        };
        true
    }

    /// Runs `f` on the object while the registry stays read-locked.
    pub fn check<R>(&self, id: u32, f: impl FnOnce(&T) -> R) -> Option<R> {
        let (index, _) = self.layout.decode(id)?;
        let slots = self.slots.read();
        let slot = slots.get(index)?;
        let object = slot.object.as_ref()?;
        (self.layout.encode(index, slot.generation) == id).then(|| f(object))
    }

    pub fn get(&self, id: u32) -> Option<T> {
        self.check(id, T::clone)
    }

    /// Removes the object at `id` if `pred` approves, all under the write lock.
    ///
    /// `None` means nothing lives at `id`.
    pub fn withdraw<E>(
        &self,
        id: u32,
        pred: impl FnOnce(&T) -> Result<(), E>,
    ) -> Option<Withdrawal<T, E>> {
        let (index, _) = self.layout.decode(id)?;
        let mut slots = self.slots.write();
        let slot = slots.get_mut(index)?;
        if slot.object.is_none() || self.layout.encode(index, slot.generation) != id {
            return None;
        }
        let result = pred(slot.object.as_ref()?);
        let object = match result {
            Ok(()) => {
                slot.generation = slot.generation.wrapping_add(1);
                let object = slot.object.take()?;
                self.allocator.dealloc(index);
                object
            }
            Err(_) => slot.object.clone()?,
        };
        Some(Withdrawal { object, result })
    }

    /// Visits every live object in slot order.
    pub fn for_each(&self, mut f: impl FnMut(u32, &T)) {
        let slots = self.slots.read();
        for (index, slot) in slots.iter().enumerate() {
            if let Some(object) = &slot.object {
                f(self.layout.encode(index, slot.generation), object);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().iter().filter(|s| s.object.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
