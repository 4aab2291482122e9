use crate::sync::TicketMutex;

/// Hands out small integer slots, reusing released ones before growing.
pub struct RecycleAllocator {
    inner: TicketMutex<RecycleInner>,
    limit: usize,
}

struct RecycleInner {
    current: usize,
    recycled: Vec<usize>,
}

impl RecycleAllocator {
    pub fn new(limit: usize) -> Self {
        RecycleAllocator {
            inner: TicketMutex::new(RecycleInner {
                current: 0,
                recycled: Vec::new(),
            }),
            limit,
        }
    }

    /// `None` once `limit` slots are live.
    pub fn alloc(&self) -> Option<usize> {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.recycled.pop() {
            return Some(id);
        }
        if inner.current >= self.limit {
            return None;
        }
        inner.current += 1;
        Some(inner.current - 1)
    }

    /// Claims one particular slot, as when objects are rebuilt at their saved ids.
    pub fn reserve(&self, id: usize) -> bool {
        if id >= self.limit {
            return false;
        }
        let mut inner = self.inner.lock();
        if id >= inner.current {
            let skipped = inner.current..id;
            inner.recycled.extend(skipped.rev());
            inner.current = id + 1;
            return true;
        }
        match inner.recycled.iter().position(|i| *i == id) {
            Some(pos) => {
                inner.recycled.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn dealloc(&self, id: usize) {
        let mut inner = self.inner.lock();
        assert!(id < inner.current);
        assert!(
            !inner.recycled.iter().any(|i| *i == id),
            "id {} has been deallocated!",
            id
        );
        inner.recycled.push(id);
    }
}
