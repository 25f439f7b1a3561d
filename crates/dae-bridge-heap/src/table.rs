//! Slot+generation object table.
//!
//! Swept slots bump their generation, so a reference kept past a collection
//! reads as stale instead of aliasing whatever reuses the slot.

use std::fmt;

/// Reference to a heap object: upper 32 bits slot, lower 32 bits generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(u64);

impl ObjRef {
    fn new(slot: u32, generation: u32) -> Self {
        Self(((slot as u64) << 32) | generation as u64)
    }

    fn slot(self) -> u32 {
        (self.0 >> 32) as u32
    }

    fn generation(self) -> u32 {
        self.0 as u32
    }

    /// Raw encoded value.
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.slot(), self.generation())
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

pub(crate) struct ObjectTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> ObjectTable<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> ObjRef {
        self.live += 1;
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.data = Some(value);
            ObjRef::new(slot_idx, slot.generation)
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                data: Some(value),
            });
            ObjRef::new(slot_idx, 0)
        }
    }

    pub(crate) fn get(&self, r: ObjRef) -> Option<&T> {
        let slot = self.slots.get(r.slot() as usize)?;
        if slot.generation != r.generation() {
            return None;
        }
        slot.data.as_ref()
    }

    pub(crate) fn get_mut(&mut self, r: ObjRef) -> Option<&mut T> {
        let slot = self.slots.get_mut(r.slot() as usize)?;
        if slot.generation != r.generation() {
            return None;
        }
        slot.data.as_mut()
    }

    /// Free every live object for which `keep` returns `false`.
    ///
    /// A slot whose generation wraps to 0 is never recycled.
    pub(crate) fn sweep(&mut self, mut keep: impl FnMut(ObjRef, &T) -> bool) -> usize {
        let mut freed = 0;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let Some(value) = slot.data.as_ref() else {
                continue;
            };
            if keep(ObjRef::new(idx as u32, slot.generation), value) {
                continue;
            }
            slot.data = None;
            slot.generation = slot.generation.wrapping_add(1);
            if slot.generation != 0 {
                self.free_list.push(idx as u32);
            }
            freed += 1;
        }
        self.live -= freed;
        freed
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_round_trip() {
        let mut table = ObjectTable::new();
        let r = table.insert(42i32);
        assert_eq!(table.get(r), Some(&42));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn swept_reference_is_stale() {
        let mut table = ObjectTable::new();
        let keep = table.insert(1i32);
        let drop = table.insert(2i32);
        assert_eq!(table.sweep(|r, _| r == keep), 1);
        assert_eq!(table.get(drop), None);
        assert_eq!(table.get_mut(drop), None);
        assert_eq!(table.get(keep), Some(&1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn recycled_slot_gets_new_generation() {
        let mut table = ObjectTable::new();
        let old = table.insert(1i32);
        table.sweep(|_, _| false);
        let new = table.insert(2i32);
        assert_eq!(old.slot(), new.slot());
        assert_eq!(new.generation(), old.generation() + 1);
        assert_eq!(table.get(old), None);
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn wrapped_generation_retires_slot() {
        let mut table = ObjectTable::new();
        table.insert(1i32);
        table.slots[0].generation = u32::MAX;
        table.sweep(|_, _| false);
        assert_eq!(table.slots[0].generation, 0);
        assert!(!table.free_list.contains(&0));
        let r = table.insert(2i32);
        assert_ne!(r.slot(), 0);
        assert_eq!(table.get(ObjRef::new(0, 0)), None);
    }
}
