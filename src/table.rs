//! Table: open-addressing slot array with insertion-ordered iteration.
//!
//! Physical placement is positional: a key's home slot is a byte-sum
//! checksum of the key modulo the capacity, and collisions resolve by
//! linear probing with wraparound. Two [`OrderedIndex`] lists ride along
//! (`insertion` remembers first-insertion order for iteration, `collision`
//! locates keys displaced from their home slot) and every mutation keeps
//! slot array, count and both lists consistent with each other, including
//! when an allocation is denied partway through.

use crate::alloc::{AllocError, AllocPolicy, SystemAlloc};
use crate::ordered_index::{self, OrderedIndex};
use core::mem;
use std::rc::Rc;

/// Home-slot checksum: byte-wise wraparound addition of the key into
/// `[0, limit)`. `None` on an empty key or a zero limit.
///
/// The running total folds at every step (`% limit` only once the sum
/// reaches `limit`), so intermediate values never leave `[0, limit)`.
pub(crate) fn home_slot(key: &str, limit: usize) -> Option<usize> {
    if key.is_empty() || limit == 0 {
        return None;
    }
    let mut hash = 0usize;
    for byte in key.bytes() {
        let sum = hash + byte as usize;
        hash = if sum >= limit { sum % limit } else { sum };
    }
    Some(hash)
}

/// Failure modes of [`Table::set`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// The probe walked a full cycle without finding an empty slot. Growth
    /// ahead of the 0.75 load factor keeps this from happening unless
    /// growth itself keeps failing.
    #[error("no empty slot along the probe cycle")]
    Full,
}

#[derive(Debug)]
struct Slot<V> {
    key: Rc<str>,
    value: V,
}

/// Insertion-ordered open-addressing map from string keys to `V`.
///
/// The table copies each key into table-owned storage on first insertion
/// and releases that copy exactly once, on removal or drop. Values move in
/// by value and move back out of [`remove`](Self::remove) and the overwrite
/// path of [`set`](Self::set); the table never clones a value.
///
/// Single-threaded by design: `Rc`-shared keys make the type `!Send` and
/// `!Sync`, and nothing blocks or suspends. All operations are bounded by
/// O(capacity).
pub struct Table<V, A = SystemAlloc> {
    slots: Vec<Option<Slot<V>>>,
    insertion: OrderedIndex<A>,
    collision: OrderedIndex<A>,
    len: usize,
    // Modulus for home_slot; equals slots.len() except while grow() is
    // computing placements against the next capacity.
    hash_limit: usize,
    // Bumped each time grow() swaps internals; cursors snapshot it.
    epoch: u64,
    policy: A,
}

impl<V> Table<V> {
    /// Table with `capacity` slots (clamped to at least 1) and the
    /// always-granting allocation policy.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Self::with_capacity_and_policy(capacity, SystemAlloc)
    }
}

impl<V, A> Table<V, A>
where
    A: AllocPolicy + Clone,
{
    /// Table with `capacity` slots (clamped to at least 1), consulting
    /// `policy` before every allocation. Fails cleanly: an `Err` leaves no
    /// partially constructed table behind.
    pub fn with_capacity_and_policy(capacity: usize, policy: A) -> Result<Self, AllocError> {
        let capacity = capacity.max(1);
        let slots = new_slot_array(capacity, &policy)?;
        Ok(Self {
            slots,
            insertion: OrderedIndex::with_policy(policy.clone()),
            collision: OrderedIndex::with_policy(policy.clone()),
            len: 0,
            hash_limit: capacity,
            epoch: 0,
            policy,
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lookup_slot(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        let slot = self.occupied(self.lookup_slot(key)?);
        Some(&slot.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let idx = self.lookup_slot(key)?;
        let slot = self.slots[idx]
            .as_mut()
            .expect("located slots are occupied");
        Some(&mut slot.value)
    }

    /// Insert or overwrite `key`.
    ///
    /// An empty key is ignored (`Ok(None)`). Overwriting returns the
    /// displaced value and leaves count and insertion order unchanged. A
    /// denied allocation abandons the insertion with every existing entry,
    /// both indexes and the count exactly as they were.
    ///
    /// The key is copied into table-owned storage; the caller keeps
    /// ownership of `key` itself.
    pub fn set(&mut self, key: &str, value: V) -> Result<Option<V>, TableError> {
        if key.is_empty() {
            return Ok(None);
        }

        // Grow ahead of the 0.75 load factor, before placement, so the
        // probe below always has room.
        if 4 * (self.len + 1) > 3 * self.capacity() {
            self.grow(self.capacity() * 2)?;
        }

        if let Some(idx) = self.lookup_slot(key) {
            let slot = self.slots[idx]
                .as_mut()
                .expect("located slots are occupied");
            return Ok(Some(mem::replace(&mut slot.value, value)));
        }

        let home = home_slot(key, self.hash_limit).expect("key is non-empty");
        let dest = if self.slots[home].is_none() {
            home
        } else {
            self.probe_from(home)?
        };

        // Take the owned key copy first; index bookkeeping happens before
        // the slot is occupied so a denied allocation can still back out.
        self.policy.grant(key.len())?;
        let owned: Rc<str> = Rc::from(key);
        if dest != home {
            self.collision.upsert(&owned, dest)?;
        }
        if let Err(e) = self.insertion.upsert(&owned, dest) {
            if dest != home {
                self.collision.remove(&owned);
            }
            return Err(e.into());
        }
        self.slots[dest] = Some(Slot { key: owned, value });
        self.len += 1;
        Ok(None)
    }

    /// Remove `key`, returning its value to the caller. `None` (and no
    /// other effect) when the key is absent or empty.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = self.lookup_slot(key)?;
        let slot = self.slots[idx].take().expect("located slots are occupied");
        self.len -= 1;
        self.insertion.remove(key);
        self.collision.remove(key);
        Some(slot.value)
    }

    /// Detached cursor over the entries in insertion order; `None` for an
    /// empty table. See [`Cursor`].
    pub fn cursor(&self) -> Option<Cursor> {
        let inner = self.insertion.cursor()?;
        Some(Cursor {
            epoch: self.epoch,
            inner,
        })
    }

    /// Borrowing iterator over `(key, value)` in insertion order.
    pub fn iter(&self) -> Iter<'_, V, A> {
        Iter {
            table: self,
            inner: self.insertion.iter(),
        }
    }

    /// Where `key` currently lives: its home slot if that slot holds it,
    /// otherwise wherever the collision index recorded it.
    fn lookup_slot(&self, key: &str) -> Option<usize> {
        let home = home_slot(key, self.hash_limit)?;
        if let Some(slot) = self.slots[home].as_ref() {
            if *slot.key == *key {
                return Some(home);
            }
        }
        self.collision.get(key)
    }

    /// Linear probe with wraparound, starting just past `home`. Coming
    /// back around to `home` means no slot is free along the cycle.
    fn probe_from(&self, home: usize) -> Result<usize, TableError> {
        let capacity = self.capacity();
        let mut idx = home;
        loop {
            idx = (idx + 1) % capacity;
            if idx == home {
                return Err(TableError::Full);
            }
            if self.slots[idx].is_none() {
                return Ok(idx);
            }
        }
    }

    /// Rebuild at `new_capacity` and swap the rebuilt internals in.
    ///
    /// Phase 1 performs every fallible step against fresh storage:
    /// allocate the new slot array, replay the keys in insertion order
    /// against the new modulus and build both fresh indexes plus the
    /// old-slot → new-slot move list. An error returns with the live table
    /// untouched. Phase 2 then moves the slots and swaps fields in place
    /// (nothing in it can fail) and bumps the epoch so outstanding cursors
    /// report invalid instead of resolving against reshuffled slots.
    fn grow(&mut self, new_capacity: usize) -> Result<(), TableError> {
        let mut fresh_slots = new_slot_array::<V, A>(new_capacity, &self.policy)?;
        let mut fresh_insertion = OrderedIndex::with_policy(self.policy.clone());
        let mut fresh_collision = OrderedIndex::with_policy(self.policy.clone());

        self.policy.grant(new_capacity * mem::size_of::<bool>())?;
        let mut taken = Vec::new();
        taken.try_reserve_exact(new_capacity).map_err(AllocError::from)?;
        taken.resize(new_capacity, false);

        self.policy
            .grant(self.len * mem::size_of::<(usize, usize)>())?;
        let mut moves = Vec::new();
        moves.try_reserve_exact(self.len).map_err(AllocError::from)?;

        for (key, old_idx) in self.insertion.iter() {
            let owned = &self.occupied(old_idx).key;
            let home = home_slot(key, new_capacity).expect("stored keys are non-empty");
            let mut dest = home;
            if taken[home] {
                loop {
                    dest = (dest + 1) % new_capacity;
                    if dest == home {
                        return Err(TableError::Full);
                    }
                    if !taken[dest] {
                        break;
                    }
                }
                fresh_collision.upsert(owned, dest)?;
            }
            fresh_insertion.upsert(owned, dest)?;
            taken[dest] = true;
            moves.push((old_idx, dest));
        }

        for (old_idx, new_idx) in moves {
            fresh_slots[new_idx] = self.slots[old_idx].take();
        }
        self.slots = fresh_slots;
        self.insertion = fresh_insertion;
        self.collision = fresh_collision;
        self.hash_limit = new_capacity;
        self.epoch += 1;
        Ok(())
    }

    fn occupied(&self, idx: usize) -> &Slot<V> {
        self.slots[idx].as_ref().expect("located slots are occupied")
    }
}

fn new_slot_array<V, A>(capacity: usize, policy: &A) -> Result<Vec<Option<Slot<V>>>, AllocError>
where
    A: AllocPolicy,
{
    policy.grant(capacity * mem::size_of::<Option<Slot<V>>>())?;
    let mut slots = Vec::new();
    slots.try_reserve_exact(capacity)?;
    slots.resize_with(capacity, || None);
    Ok(slots)
}

/// Cursor over a [`Table`], yielding entries in insertion order.
///
/// The cursor holds no borrow of the table; every accessor takes the table
/// again, so the table remains free to mutate between steps. The cursor
/// goes through three states (fresh, advancing, exhausted) and a fourth,
/// absorbing one: if the table rebuilds its internals (a growth triggered
/// by [`Table::set`]) while the cursor is outstanding, the cursor becomes
/// invalid rather than resolving against reshuffled slots.
///
/// ```
/// use probemap::Table;
///
/// let mut table: Table<i32> = Table::with_capacity(7)?;
/// table.set("one", 1)?;
/// table.set("two", 2)?;
///
/// let mut cursor = table.cursor().expect("non-empty");
/// let mut seen = Vec::new();
/// while cursor.is_valid(&table) {
///     let (key, value) = cursor.entry(&table).unwrap();
///     seen.push((key.to_string(), *value));
///     cursor.advance(&table);
/// }
/// assert_eq!(seen, [("one".to_string(), 1), ("two".to_string(), 2)]);
/// # Ok::<(), probemap::TableError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Cursor {
    epoch: u64,
    inner: ordered_index::Cursor,
}

impl Cursor {
    /// False once exhausted, once the current entry has been removed, or
    /// once the table has rebuilt its internals since the cursor was made.
    pub fn is_valid<V, A>(&self, table: &Table<V, A>) -> bool
    where
        A: AllocPolicy + Clone,
    {
        self.epoch == table.epoch && self.inner.is_valid(&table.insertion)
    }

    pub fn key<'t, V, A>(&self, table: &'t Table<V, A>) -> Option<&'t str>
    where
        A: AllocPolicy + Clone,
    {
        self.entry(table).map(|(key, _)| key)
    }

    pub fn value<'t, V, A>(&self, table: &'t Table<V, A>) -> Option<&'t V>
    where
        A: AllocPolicy + Clone,
    {
        self.entry(table).map(|(_, value)| value)
    }

    /// Current `(key, value)` pair, resolved through the live slot array.
    pub fn entry<'t, V, A>(&self, table: &'t Table<V, A>) -> Option<(&'t str, &'t V)>
    where
        A: AllocPolicy + Clone,
    {
        if self.epoch != table.epoch {
            return None;
        }
        let (key, idx) = self.inner.entry(&table.insertion)?;
        let slot = table.slots.get(idx)?.as_ref()?;
        if *slot.key != *key {
            return None;
        }
        Some((&*slot.key, &slot.value))
    }

    /// Step to the next entry in insertion order. No-op when already
    /// invalid; a rebuild since creation invalidates instead of stepping.
    pub fn advance<V, A>(&mut self, table: &Table<V, A>)
    where
        A: AllocPolicy + Clone,
    {
        if self.epoch != table.epoch {
            self.inner.invalidate();
            return;
        }
        self.inner.advance(&table.insertion);
    }
}

/// Borrowing iterator over `(key, value)` in insertion order.
pub struct Iter<'a, V, A = SystemAlloc> {
    table: &'a Table<V, A>,
    inner: ordered_index::Iter<'a, A>,
}

impl<'a, V, A> Iterator for Iter<'a, V, A>
where
    A: AllocPolicy + Clone,
{
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (_, idx) = self.inner.next()?;
        let slot = self.table.slots.get(idx)?.as_ref()?;
        Some((&*slot.key, &slot.value))
    }
}
