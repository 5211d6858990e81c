// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::{Link, Linked};
use core::fmt;
use core::ptr::NonNull;

/// One of the two child slots of a node.
///
/// `Left` is slot `lr[0]` (strictly smaller keys), `Right` is slot `lr[1]` (strictly greater keys).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

impl Side {
    #[inline]
    pub(crate) fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// The balance factor sign contributed by growth on this side.
    #[inline]
    pub(crate) fn sign(self) -> i8 {
        match self {
            Side::Left => -1,
            Side::Right => 1,
        }
    }
}

/// Returns the side of `parent` that `child` hangs off.
///
/// # Safety
///
/// Both pointers must point to live nodes and `child` must be a child of `parent`.
pub(crate) unsafe fn side_of<T>(parent: NonNull<T>, child: NonNull<T>) -> Side
where
    T: Linked + ?Sized,
{
    // Safety: ensured by caller
    let parent_links = unsafe { T::links(parent).as_ref() };
    debug_assert!(
        parent_links.left() == Some(child) || parent_links.right() == Some(child),
        "node is not a child of its parent"
    );

    if parent_links.right() == Some(child) {
        Side::Right
    } else {
        Side::Left
    }
}

/// Follows the `side` links starting at `curr` until there are none left.
///
/// # Safety
///
/// `curr` must point to a live node of a well-formed tree.
pub(crate) unsafe fn find_extremum<T>(mut curr: NonNull<T>, side: Side) -> NonNull<T>
where
    T: Linked + ?Sized,
{
    // Safety: ensured by caller
    while let Some(child) = unsafe { T::links(curr).as_ref().child(side) } {
        curr = child;
    }

    curr
}

/// # Safety
///
/// `curr` must point to a live node of a well-formed tree.
pub(crate) unsafe fn find_minimum<T: Linked + ?Sized>(curr: NonNull<T>) -> NonNull<T> {
    // Safety: ensured by caller
    unsafe { find_extremum(curr, Side::Left) }
}

/// # Safety
///
/// `curr` must point to a live node of a well-formed tree.
pub(crate) unsafe fn find_maximum<T: Linked + ?Sized>(curr: NonNull<T>) -> NonNull<T> {
    // Safety: ensured by caller
    unsafe { find_extremum(curr, Side::Right) }
}

/// Returns the in-order neighbour of `node` in direction `side` (`Right` = next greater).
///
/// # Safety
///
/// `node` must point to a live node of a well-formed tree.
pub(crate) unsafe fn neighbour<T>(node: NonNull<T>, side: Side) -> Link<T>
where
    T: Linked + ?Sized,
{
    // Safety: ensured by caller
    unsafe {
        // If we have a child on that side, its extremum toward us is the neighbour
        if let Some(child) = T::links(node).as_ref().child(side) {
            return Some(find_extremum(child, side.opposite()));
        }

        // Otherwise climb until we arrive from the opposite side
        let mut curr = node;
        while let Some(parent) = T::links(curr).as_ref().parent() {
            if T::links(parent).as_ref().child(side) != Some(curr) {
                return Some(parent);
            }
            curr = parent;
        }

        // we reached the tree root without finding a neighbour
        None
    }
}

/// # Safety
///
/// `node` must point to a live node of a well-formed tree.
pub(crate) unsafe fn next<T: Linked + ?Sized>(node: NonNull<T>) -> Link<T> {
    // Safety: ensured by caller
    unsafe { neighbour(node, Side::Right) }
}

/// # Safety
///
/// `node` must point to a live node of a well-formed tree.
pub(crate) unsafe fn prev<T: Linked + ?Sized>(node: NonNull<T>) -> Link<T> {
    // Safety: ensured by caller
    unsafe { neighbour(node, Side::Left) }
}
