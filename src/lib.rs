//! probemap: a single-threaded, insertion-ordered open-addressing hash map
//! resilient to allocation failure.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the table in safe, verifiable layers so each piece can be
//!   reasoned about independently.
//! - Layers:
//!   - AllocPolicy (`alloc`): the injected allocation facility. Every
//!     allocating step asks the policy first, so a harness can deny any
//!     single allocation and the structures must come through unscathed.
//!   - OrderedIndex (`ordered_index`): hashing-free association list from
//!     key to slot index, preserving first-insertion order; nodes live in a
//!     slotmap arena and link by generational key, never by address.
//!   - Table (`table`): the slot array itself: positional byte-sum hash,
//!     linear probing with wraparound, proactive doubling at a 0.75 load
//!     factor, and two OrderedIndex instances: one for iteration order, one
//!     for keys displaced from their home slot.
//!   - Cursor (`table`): detached iteration protocol. A cursor borrows
//!     nothing; each accessor takes the table again, so mutation between
//!     steps is allowed and a rebuild (growth) is *detected*: the cursor
//!     reports invalid instead of resolving against reshuffled slots.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` by design (`Rc`-shared keys, no
//!   atomics).
//! - No hashing beyond the positional checksum; the index lists scan
//!   linearly precisely because they sit underneath the hash table.
//! - One key-ownership rule: the table copies each key into an `Rc<str>` on
//!   first insertion and every holder releases exactly one reference.
//!   Values move in and move back out (`remove`, overwrite); the table
//!   never clones a value.
//! - Any allocation may fail: a denied or failed allocation either leaves
//!   the table unchanged (create, grow, abandoned insert) or is not
//!   observable at all. There is no torn state in which the count, the slot
//!   array and the two index lists disagree.
//!
//! Why this split?
//! - Localize invariants: the index lists know nothing about hashing; the
//!   table alone owns placement; the cursor alone owns invalidation.
//! - Keep unsafe out entirely: physical slots are indices into a `Vec`,
//!   list links are generational keys, so stale references degrade into
//!   lookups that miss instead of dangling pointers.
//!
//! Non-goals
//! - Thread safety, persistence, wire formats, cryptographic hashing.
//! - The fault-injecting allocator itself is a test collaborator; the table
//!   only ever consumes the "allocation may fail" contract.

pub mod alloc;
pub mod ordered_index;
mod table;
mod table_proptest;

// Public surface
pub use alloc::{AllocError, AllocPolicy, SystemAlloc};
pub use table::{Cursor, Iter, Table, TableError};
