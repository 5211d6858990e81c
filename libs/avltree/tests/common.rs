// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![allow(unused, reason = "not used by all tests")]

use std::fmt;
use std::mem::offset_of;
use std::pin::Pin;
use std::ptr::NonNull;

use avltree::{Linked, Links};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A heap allocated tree entry with a payload.
pub struct Entry {
    pub key: u32,
    pub value: u64,
    links: Links<Self>,
}

impl Entry {
    pub fn new(key: u32) -> Self {
        Self::with_value(key, u64::from(key))
    }

    pub fn with_value(key: u32, value: u64) -> Self {
        Self {
            key,
            value,
            links: Links::new(),
        }
    }

    pub fn boxed(key: u32) -> Pin<Box<Self>> {
        Box::pin(Self::new(key))
    }

    pub fn links(&self) -> &Links<Self> {
        &self.links
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

// Safety: entries are boxed and pinned for as long as they are part of a tree
unsafe impl Linked for Entry {
    type Handle = Pin<Box<Self>>;
    type Key = u32;

    fn into_ptr(handle: Self::Handle) -> NonNull<Self> {
        // Safety: the tree never moves out of the pointer
        unsafe { NonNull::from(Box::leak(Pin::into_inner_unchecked(handle))) }
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        // Safety: `NonNull` *must* be constructed from a pinned reference
        // which the tree implementation upholds.
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
