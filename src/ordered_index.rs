//! OrderedIndex: insertion-ordered association list from key to slot index.
//!
//! This is the structure the table leans on twice (once to remember
//! insertion order for iteration, once to find keys displaced from their
//! home slot), so it must not itself hash anything. Lookups are plain O(n)
//! scans over a singly linked list. Nodes live in a `SlotMap` arena and
//! link to each other by generational key rather than by address: a removed
//! node's key never resolves again, which is what lets a detached [`Cursor`]
//! notice that its current entry is gone instead of reading reused storage.

use crate::alloc::{AllocError, AllocPolicy, SystemAlloc};
use slotmap::{DefaultKey, SlotMap};
use std::rc::Rc;

#[derive(Debug)]
struct Node {
    key: Rc<str>,
    slot: usize,
    next: Option<DefaultKey>,
}

/// Key → slot-index list preserving first-insertion order.
///
/// Keys are `Rc<str>` shared with the owner; the index never deep-copies a
/// key and dropping it releases only its own references.
pub struct OrderedIndex<A = SystemAlloc> {
    nodes: SlotMap<DefaultKey, Node>,
    head: Option<DefaultKey>,
    policy: A,
}

impl OrderedIndex {
    pub fn new() -> Self {
        Self::with_policy(SystemAlloc)
    }
}

impl Default for OrderedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> OrderedIndex<A>
where
    A: AllocPolicy + Clone,
{
    pub fn with_policy(policy: A) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Update `key` in place when present (position in the order is
    /// unchanged), append it at the tail otherwise. Appending allocates a
    /// node and may fail; a failed upsert leaves the index unchanged.
    pub fn upsert(&mut self, key: &Rc<str>, slot: usize) -> Result<(), AllocError> {
        let mut tail = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let node = self.node(k);
            if *node.key == **key {
                self.nodes[k].slot = slot;
                return Ok(());
            }
            tail = Some(k);
            cur = node.next;
        }

        self.policy.grant(core::mem::size_of::<Node>())?;
        let appended = self.nodes.insert(Node {
            key: Rc::clone(key),
            slot,
            next: None,
        });
        match tail {
            Some(t) => self.nodes[t].next = Some(appended),
            None => self.head = Some(appended),
        }
        Ok(())
    }

    /// Unlink `key` and return its slot index; `None` when absent.
    pub fn remove(&mut self, key: &str) -> Option<usize> {
        let mut prev = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let node = self.node(k);
            let next = node.next;
            if *node.key == *key {
                match prev {
                    Some(p) => self.nodes[p].next = next,
                    None => self.head = next,
                }
                return self.nodes.remove(k).map(|n| n.slot);
            }
            prev = Some(k);
            cur = next;
        }
        None
    }

    /// Slot index recorded for `key`, or `None` when absent or the key is
    /// empty.
    pub fn get(&self, key: &str) -> Option<usize> {
        if key.is_empty() {
            return None;
        }
        let mut cur = self.head;
        while let Some(k) = cur {
            let node = self.node(k);
            if *node.key == *key {
                return Some(node.slot);
            }
            cur = node.next;
        }
        None
    }

    /// Detached cursor positioned at the first entry; `None` when empty.
    /// The cursor holds no borrow; every accessor takes the index again.
    pub fn cursor(&self) -> Option<Cursor> {
        self.head.map(|k| Cursor { node: Some(k) })
    }

    pub fn iter(&self) -> Iter<'_, A> {
        Iter {
            index: self,
            node: self.head,
        }
    }

    fn node(&self, k: DefaultKey) -> &Node {
        self.nodes.get(k).expect("list links reference live nodes")
    }
}

/// Cursor over an [`OrderedIndex`], advanced explicitly.
///
/// Exhaustion is terminal; request a fresh cursor to iterate again. A
/// cursor whose current entry has been removed stops resolving and reports
/// itself invalid.
#[derive(Clone, Debug)]
pub struct Cursor {
    node: Option<DefaultKey>,
}

impl Cursor {
    pub fn is_valid<A>(&self, index: &OrderedIndex<A>) -> bool
    where
        A: AllocPolicy + Clone,
    {
        self.entry(index).is_some()
    }

    pub fn key<'i, A>(&self, index: &'i OrderedIndex<A>) -> Option<&'i str>
    where
        A: AllocPolicy + Clone,
    {
        self.entry(index).map(|(key, _)| key)
    }

    pub fn slot<A>(&self, index: &OrderedIndex<A>) -> Option<usize>
    where
        A: AllocPolicy + Clone,
    {
        self.entry(index).map(|(_, slot)| slot)
    }

    pub fn entry<'i, A>(&self, index: &'i OrderedIndex<A>) -> Option<(&'i str, usize)>
    where
        A: AllocPolicy + Clone,
    {
        let node = index.nodes.get(self.node?)?;
        Some((&*node.key, node.slot))
    }

    /// Step to the next entry. No-op when already invalid; stepping past
    /// the tail, or from an entry that has since been removed, is terminal.
    pub fn advance<A>(&mut self, index: &OrderedIndex<A>)
    where
        A: AllocPolicy + Clone,
    {
        self.node = match self.node.and_then(|k| index.nodes.get(k)) {
            Some(node) => node.next,
            None => None,
        };
    }

    pub(crate) fn invalidate(&mut self) {
        self.node = None;
    }
}

/// Borrowing iterator over `(key, slot)` entries in insertion order.
pub struct Iter<'a, A = SystemAlloc> {
    index: &'a OrderedIndex<A>,
    node: Option<DefaultKey>,
}

impl<'a, A> Iterator for Iter<'a, A>
where
    A: AllocPolicy + Clone,
{
    type Item = (&'a str, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.index.nodes.get(self.node?)?;
        self.node = node.next;
        Some((&*node.key, node.slot))
    }
}
