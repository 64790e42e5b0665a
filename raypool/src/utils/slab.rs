use std::mem::MaybeUninit;

/// A slab arena with reusable slots.
///
/// A `Slab` stores values of type `T` in a contiguous array and hands out
/// indices that stay valid until the value is removed. Freed slots are
/// recycled by later insertions.
///
/// Internally, it keeps track of:
/// - initialized slots,
/// - free indices,
/// - uninitialized memory using [`MaybeUninit`].
pub(crate) struct Slab<T> {
    /// Storage for items (may contain uninitialized slots).
    items: Vec<MaybeUninit<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Marks whether a slot is currently initialized.
    used: Vec<bool>,
    /// Number of initialized slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with `size` free slots.
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| MaybeUninit::<T>::uninit()).collect();
        // Reversed so that low indices are handed out first.
        let free = (0..size).rev().collect();
        let used = vec![false; size];

        Self {
            items,
            free,
            used,
            len: 0,
        }
    }

    /// Inserts a value and returns its slot index.
    ///
    /// A free slot is reused when available, otherwise the slab doubles
    /// in size.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        let index = match self.free.pop() {
            Some(i) => i,
            None => {
                let len = self.items.len();
                let new_len = if len == 0 { 1 } else { 2 * len };

                self.items
                    .extend((len..new_len).map(|_| MaybeUninit::<T>::uninit()));
                self.free.extend(((len + 1)..new_len).rev());
                self.used.resize(new_len, false);

                len
            }
        };

        self.items[index] = MaybeUninit::new(item);
        self.used[index] = true;
        self.len += 1;

        index
    }

    /// Removes and returns the value stored at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the slot is not in use.
    pub(crate) fn remove(&mut self, index: usize) -> T {
        assert!(self.is_used(index), "slab slot {index} is not in use");

        self.free.push(index);
        self.used[index] = false;
        self.len -= 1;

        // Safety: the slot was marked used, so it holds an initialized value,
        // and it is marked free before anyone can read it again.
        unsafe { self.items[index].assume_init_read() }
    }

    /// Returns a reference to the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the slot is not in use.
    pub(crate) fn get(&self, index: usize) -> &T {
        assert!(self.is_used(index), "slab slot {index} is not in use");

        // Safety: checked above that the slot is initialized.
        unsafe { self.items[index].assume_init_ref() }
    }

    /// Returns a mutable reference to the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the slot is not in use.
    pub(crate) fn get_mut(&mut self, index: usize) -> &mut T {
        assert!(self.is_used(index), "slab slot {index} is not in use");

        // Safety: checked above that the slot is initialized.
        unsafe { self.items[index].assume_init_mut() }
    }

    /// Number of values currently stored.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn is_used(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }
}

impl<T> Drop for Slab<T> {
    /// Drops all initialized elements stored in the slab.
    fn drop(&mut self) {
        for (slot, &used) in self.items.iter_mut().zip(self.used.iter()) {
            if used {
                // Safety: `used` marks exactly the initialized slots.
                unsafe {
                    slot.assume_init_drop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Slab;

    #[test]
    fn insert_reuses_freed_slots() {
        let mut slab = Slab::new(2);

        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_eq!((a, b), (0, 1));

        assert_eq!(slab.remove(a), "a");
        assert_eq!(slab.insert("c"), a);
        assert_eq!(*slab.get(b), "b");
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut slab = Slab::new(0);
        let indices: Vec<_> = (0..5).map(|i| slab.insert(i)).collect();

        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        *slab.get_mut(3) += 10;
        assert_eq!(*slab.get(3), 13);
    }

    #[test]
    #[should_panic(expected = "is not in use")]
    fn remove_twice_panics() {
        let mut slab = Slab::new(1);
        let index = slab.insert(1u8);
        slab.remove(index);
        slab.remove(index);
    }
}
