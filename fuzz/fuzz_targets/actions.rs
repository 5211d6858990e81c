// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![no_main]

use std::collections::BTreeSet;
use std::mem::offset_of;
use std::ops::Bound;
use std::pin::Pin;
use std::ptr::NonNull;

use avltree::{AvlTree, Linked, Links};
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

struct TestEntry {
    links: Links<Self>,
    value: u16,
}

impl TestEntry {
    pub fn new(value: u16) -> Self {
        Self {
            links: Links::new(),
            value,
        }
    }
}

// Safety: entries are boxed and pinned for as long as they are part of a tree
unsafe impl Linked for TestEntry {
    type Handle = Pin<Box<Self>>;
    type Key = u16;

    fn into_ptr(handle: Self::Handle) -> NonNull<Self> {
        // Safety: the tree never moves out of the pointer
        unsafe { NonNull::from(Box::leak(Pin::into_inner_unchecked(handle))) }
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        // Safety: `NonNull` *must* be constructed from a pinned reference
        // which the tree implementation upholds.
        unsafe { Pin::new_unchecked(Box::from_raw(ptr.as_ptr())) }
    }

    unsafe fn links(target: NonNull<Self>) -> NonNull<Links<TestEntry>> {
        target
            .map_addr(|addr| {
                let offset = offset_of!(Self, links);
                addr.checked_add(offset).unwrap()
            })
            .cast()
    }

    fn get_key(&self) -> &Self::Key {
        &self.value
    }
}

#[derive(Debug, Arbitrary)]
enum Action {
    Clear,
    Insert(u16),
    FindOrInsert(u16),
    Remove(u16),
    Find(u16),
    Cursor(u16, Vec<CursorAction>),
}

#[derive(Debug, Arbitrary)]
enum CursorAction {
    Next,
    Prev,
    Remove,
}

fuzz_target!(|actions: Vec<Action>| {
    let mut tree: AvlTree<TestEntry> = AvlTree::new();
    let mut set: BTreeSet<u16> = BTreeSet::new();

    for action in actions {
        match action {
            Action::Clear => {
                tree.clear();
                set.clear();
            }
            Action::Insert(key) => {
                let res = tree.insert(Box::pin(TestEntry::new(key)));
                assert_eq!(res.is_ok(), set.insert(key));
            }
            Action::FindOrInsert(key) => {
                let cursor = tree.find_or_insert_with(
                    |entry| key.cmp(&entry.value),
                    || Some(Box::pin(TestEntry::new(key))),
                );
                assert_eq!(cursor.get().map(|entry| entry.value), Some(key));
                set.insert(key);
            }
            Action::Remove(key) => {
                let removed = tree.remove(&key).map(|entry| entry.value);
                assert_eq!(removed, set.take(&key));
            }
            Action::Find(key) => {
                assert_eq!(tree.contains(&key), set.contains(&key));
            }
            Action::Cursor(start, actions) => {
                // start at the smallest element not less than `start`
                let mut cursor = tree.first_mut();
                while cursor.get().is_some_and(|entry| entry.value < start) {
                    cursor.move_next();
                }
                let mut expected = set.range(start..).next().copied();

                for action in actions {
                    assert_eq!(cursor.get().map(|entry| entry.value), expected);
                    let Some(current) = expected else {
                        break;
                    };

                    match action {
                        CursorAction::Next => {
                            cursor.move_next();
                            expected = set
                                .range((Bound::Excluded(current), Bound::Unbounded))
                                .next()
                                .copied();
                        }
                        CursorAction::Prev => {
                            cursor.move_prev();
                            expected = set.range(..current).next_back().copied();
                        }
                        CursorAction::Remove => {
                            let removed = cursor.remove().map(|entry| entry.value);
                            assert_eq!(removed, Some(current));
                            set.remove(&current);
                            expected = set.range(current..).next().copied();
                        }
                    }
                }
            }
        }

        assert_eq!(tree.check(), Ok(set.len()));
    }

    assert!(tree.iter().map(|entry| entry.value).eq(set.iter().copied()));
});
