// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod common;

use std::mem::offset_of;
use std::pin::Pin;
use std::ptr::NonNull;
use std::rc::Rc;

use avltree::{AvlTree, Error, Linked, Links};
use rand::seq::SliceRandom;

use crate::common::{Entry, init_tracing};

fn keys(tree: &AvlTree<Entry>) -> Vec<u32> {
    tree.iter().map(|entry| entry.key).collect()
}

#[test]
fn smoke() {
    init_tracing();

    let mut input: Vec<u32> = (0..100).collect();
    input.shuffle(&mut rand::rng());

    let mut tree = AvlTree::<Entry>::new();
    assert!(tree.is_empty());

    for key in input.iter().copied() {
        tracing::debug!("inserting {key}");
        let cursor = tree.insert(Entry::boxed(key)).unwrap();
        assert_eq!(cursor.get().map(|entry| entry.key), Some(key));
        tree.assert_valid();
    }

    assert_eq!(tree.len(), 100);
    assert_eq!(keys(&tree), (0..100).collect::<Vec<_>>());

    for key in 0..100 {
        assert!(tree.contains(&key));
        assert_eq!(tree.find(&key).get().map(|entry| entry.value), Some(u64::from(key)));
    }
    assert!(!tree.contains(&100));
    assert!(tree.find(&100).get().is_none());
}

#[test]
fn insert_duplicate_returns_handle() {
    let mut tree = AvlTree::<Entry>::new();
    tree.insert(Box::pin(Entry::with_value(7, 1))).unwrap();

    let rejected = tree
        .insert(Box::pin(Entry::with_value(7, 2)))
        .map(|_| ())
        .unwrap_err();
    assert_eq!(rejected.key, 7);
    assert_eq!(rejected.value, 2);
    assert!(!rejected.links().is_linked());

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.find(&7).get().map(|entry| entry.value), Some(1));
}

#[test]
fn remove_by_key() {
    let mut tree = AvlTree::<Entry>::new();
    for key in [5, 3, 8, 1, 4, 7, 9] {
        tree.insert(Box::pin(Entry::with_value(key, u64::from(key) * 10)))
            .unwrap();
    }

    let removed = tree.remove(&5).unwrap();
    assert_eq!(removed.key, 5);
    assert_eq!(removed.value, 50);
    assert!(!removed.links().is_linked());
    tree.assert_valid();

    assert!(tree.remove(&5).is_none());
    assert!(tree.remove(&42).is_none());
    assert_eq!(keys(&tree), [1, 3, 4, 7, 8, 9]);

    // removed entries can be inserted again
    tree.insert(removed).unwrap();
    assert_eq!(keys(&tree), [1, 3, 4, 5, 7, 8, 9]);
    tree.assert_valid();
}

#[test]
fn find_by_predicate() {
    let mut tree = AvlTree::<Entry>::new();
    for key in (0..50).map(|i| i * 2) {
        tree.insert(Entry::boxed(key)).unwrap();
    }

    assert_eq!(
        tree.find_by(|entry| 42.cmp(&entry.key)).get().map(|e| e.key),
        Some(42)
    );
    assert!(tree.find_by(|entry| 43.cmp(&entry.key)).get().is_none());

    // find_mut hands out the entry for in-place updates of the payload
    let mut cursor = tree.find_by_mut(|entry| 42.cmp(&entry.key));
    let entry = cursor.get_mut().unwrap();
    // Safety: the payload is not structurally pinned
    unsafe { entry.get_unchecked_mut().value = 4242 };
    assert_eq!(tree.find(&42).get().map(|e| e.value), Some(4242));

    let entry = tree.find_mut(&10).into_mut().unwrap();
    // Safety: the payload is not structurally pinned
    unsafe { entry.get_unchecked_mut().value = 1010 };
    assert_eq!(tree.find(&10).get().map(|e| e.value), Some(1010));
    tree.assert_valid();
}

#[test]
fn find_or_insert_with() {
    let mut tree = AvlTree::<Entry>::new();

    let cursor = tree.find_or_insert_with(|entry| 3.cmp(&entry.key), || Some(Entry::boxed(3)));
    assert_eq!(cursor.get().map(|entry| entry.key), Some(3));

    let cursor = tree.find_or_insert_with(
        |entry| 3.cmp(&entry.key),
        || panic!("attempted to create a node that already exists"),
    );
    assert_eq!(cursor.get().map(|entry| entry.key), Some(3));

    let cursor = tree.find_or_insert_with(|entry| 4.cmp(&entry.key), || None);
    assert!(cursor.get().is_none());

    assert_eq!(keys(&tree), [3]);
    tree.assert_valid();
}

#[test]
fn iteration() {
    let mut tree = AvlTree::<Entry>::new();
    for key in [40, 10, 30, 20, 50] {
        tree.insert(Entry::boxed(key)).unwrap();
    }

    assert_eq!(keys(&tree), [10, 20, 30, 40, 50]);
    assert_eq!(
        tree.iter().rev().map(|entry| entry.key).collect::<Vec<_>>(),
        [50, 40, 30, 20, 10]
    );

    // both ends meet in the middle
    let mut iter = tree.iter();
    assert_eq!(iter.next().map(|e| e.key), Some(10));
    assert_eq!(iter.next_back().map(|e| e.key), Some(50));
    assert_eq!(iter.next().map(|e| e.key), Some(20));
    assert_eq!(iter.next_back().map(|e| e.key), Some(40));
    assert_eq!(iter.next().map(|e| e.key), Some(30));
    assert!(iter.next().is_none());
    assert!(iter.next_back().is_none());

    let mut sum = 0;
    for entry in &tree {
        sum += entry.key;
    }
    assert_eq!(sum, 150);

    for entry in &mut tree {
        // Safety: the payload is not structurally pinned
        unsafe { entry.get_unchecked_mut().value += 1 };
    }
    assert_eq!(
        tree.iter().map(|entry| entry.value).collect::<Vec<_>>(),
        [11, 21, 31, 41, 51]
    );
    tree.assert_valid();

    let empty = AvlTree::<Entry>::new();
    assert!(empty.iter().next().is_none());
    assert!(empty.iter().next_back().is_none());
}

#[test]
fn cursors() {
    let mut tree = AvlTree::<Entry>::new();
    for key in 1..=9 {
        tree.insert(Entry::boxed(key)).unwrap();
    }

    let mut cursor = tree.first();
    assert_eq!(cursor.get().map(|e| e.key), Some(1));
    assert!(cursor.peek_prev().is_none());
    assert_eq!(cursor.peek_next().map(|e| e.key), Some(2));
    cursor.move_next();
    cursor.move_next();
    assert_eq!(cursor.get().map(|e| e.key), Some(3));

    let mut back = cursor.clone();
    back.move_prev();
    assert_eq!(back.get().map(|e| e.key), Some(2));
    assert_eq!(cursor.get().map(|e| e.key), Some(3));
    assert_eq!(cursor.tree().len(), 9);

    let mut cursor = tree.last();
    assert_eq!(cursor.get().map(|e| e.key), Some(9));
    assert!(cursor.peek_next().is_none());
    cursor.move_next();
    assert!(cursor.get().is_none());

    let mut cursor = tree.last_mut();
    cursor.move_prev();
    assert_eq!(cursor.get().map(|e| e.key), Some(8));
    assert_eq!(cursor.peek_next().map(|e| e.key), Some(9));
    assert_eq!(cursor.peek_prev().map(|e| e.key), Some(7));
    assert_eq!(cursor.as_cursor().get().map(|e| e.key), Some(8));

    // drain the tree from the back
    let mut removed = Vec::new();
    loop {
        let mut cursor = tree.last_mut();
        let Some(entry) = cursor.remove() else {
            break;
        };
        // the greatest element has no successor
        assert!(cursor.get().is_none());
        removed.push(entry.key);
        tree.assert_valid();
    }
    assert_eq!(removed, [9, 8, 7, 6, 5, 4, 3, 2, 1]);
    assert!(tree.is_empty());
}

#[test]
fn cursor_remove_moves_to_successor() {
    let mut tree = AvlTree::<Entry>::new();
    for key in 0..32 {
        tree.insert(Entry::boxed(key)).unwrap();
    }

    let mut cursor = tree.find_mut(&10);
    for expected in 10..20 {
        let removed = cursor.remove().unwrap();
        assert_eq!(removed.key, expected);
    }
    assert_eq!(cursor.get().map(|e| e.key), Some(20));
    tree.assert_valid();
    assert_eq!(tree.len(), 22);

    let mut cursor = tree.last_mut();
    assert_eq!(cursor.remove().map(|e| e.key), Some(31));
    assert!(cursor.get().is_none());
    assert!(cursor.remove().is_none());
    tree.assert_valid();
}

#[test]
fn remove_through_raw_pointer() {
    let mut tree = AvlTree::<Entry>::new();
    let mut ptrs = Vec::new();
    for key in 0..16 {
        let cursor = tree.insert(Entry::boxed(key)).unwrap();
        // Safety: only used to look the entry up again while it is linked
        ptrs.push(unsafe { cursor.get_ptr() }.unwrap());
    }

    for (key, ptr) in ptrs.into_iter().enumerate().rev().step_by(3) {
        // Safety: every pointer still refers to a linked entry of this tree
        let cursor = unsafe { tree.cursor_from_ptr(ptr) };
        assert_eq!(cursor.get().map(|e| e.key as usize), Some(key));

        // Safety: as above
        let removed = unsafe { tree.cursor_mut_from_ptr(ptr) }.remove().unwrap();
        assert_eq!(removed.key as usize, key);
        tree.assert_valid();
    }
    assert_eq!(keys(&tree), [1, 2, 4, 5, 7, 8, 10, 11, 13, 14]);
}

#[test]
fn height() {
    let mut tree = AvlTree::<Entry>::new();
    assert_eq!(tree.height(), 0);

    tree.insert(Entry::boxed(0)).unwrap();
    assert_eq!(tree.height(), 1);

    // ascending inserts still produce a perfect tree
    for key in 1..127 {
        tree.insert(Entry::boxed(key)).unwrap();
    }
    assert_eq!(tree.len(), 127);
    assert_eq!(tree.height(), 7);
    assert_eq!(tree.check(), Ok(127));
}

#[test]
fn error_display() {
    assert_eq!(
        Error::SizeMismatch {
            expected: 3,
            found: 2
        }
        .to_string(),
        "expected 3 nodes, but found 2"
    );
    assert_eq!(
        Error::Imbalance { balance_factor: 2 }.to_string(),
        "balance factor 2 is out of range"
    );
}

/// An entry that keeps a reference count alive for as long as it exists.
struct Tracked {
    key: u32,
    _guard: Rc<()>,
    links: Links<Self>,
}

impl Tracked {
    fn boxed(key: u32, guard: &Rc<()>) -> Pin<Box<Self>> {
        Box::pin(Self {
            key,
            _guard: Rc::clone(guard),
            links: Links::new(),
        })
    }
}

// Safety: entries are boxed and pinned for as long as they are part of a tree
unsafe impl Linked for Tracked {
    type Handle = Pin<Box<Self>>;
    type Key = u32;

    fn into_ptr(handle: Self::Handle) -> NonNull<Self> {
        // Safety: the tree never moves out of the pointer
        unsafe { NonNull::from(Box::leak(Pin::into_inner_unchecked(handle))) }
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        // Safety: the pointer was produced by `into_ptr`
        unsafe { Pin::new_unchecked(Box::from_raw(ptr.as_ptr())) }
    }

    unsafe fn links(target: NonNull<Self>) -> NonNull<Links<Self>> {
        target
            .map_addr(|addr| {
                let offset = offset_of!(Self, links);
                addr.checked_add(offset).unwrap()
            })
            .cast()
    }

    fn get_key(&self) -> &Self::Key {
        &self.key
    }
}

#[test]
fn clear_take_and_drop_release_entries() {
    let guard = Rc::new(());

    let mut tree = AvlTree::<Tracked>::new();
    for key in 0..64 {
        assert!(tree.insert(Tracked::boxed(key, &guard)).is_ok());
    }
    assert_eq!(Rc::strong_count(&guard), 65);

    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    assert_eq!(Rc::strong_count(&guard), 1);

    for key in 0..64 {
        assert!(tree.insert(Tracked::boxed(key, &guard)).is_ok());
    }
    let taken = tree.take();
    assert!(tree.is_empty());
    assert_eq!(taken.len(), 64);
    taken.assert_valid();
    assert_eq!(Rc::strong_count(&guard), 65);

    drop(taken);
    assert_eq!(Rc::strong_count(&guard), 1);

    // a rejected duplicate is handed back rather than dropped
    let mut tree = AvlTree::<Tracked>::new();
    assert!(tree.insert(Tracked::boxed(1, &guard)).is_ok());
    let rejected = tree.insert(Tracked::boxed(1, &guard)).map(|_| ()).unwrap_err();
    assert_eq!(Rc::strong_count(&guard), 3);
    drop(rejected);
    drop(tree);
    assert_eq!(Rc::strong_count(&guard), 1);
}

#[cfg(feature = "dot")]
#[test]
fn dot() {
    let mut tree = AvlTree::<Entry>::new();
    for key in [2, 1, 3, 4] {
        tree.insert(Entry::boxed(key)).unwrap();
    }

    let dot = tree.dot().to_string();
    assert!(dot.starts_with("digraph {"));
    assert!(dot.ends_with("}\n"));
    assert_eq!(dot.matches("->").count(), 3);
    // 2 and 3 lean right
    assert_eq!(dot.matches("fillcolor=orange").count(), 2);
}
