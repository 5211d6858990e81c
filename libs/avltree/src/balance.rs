// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Structural primitives that restore the AVL balance after a node was attached or detached.
//!
//! None of these functions know about the tree object itself; whenever the root of the whole tree
//! may have changed they report the new root back to the caller who then updates its root link.

use crate::utils::{self, Side};
use crate::{Link, Linked};
use core::ptr::NonNull;

#[cfg(test)]
std::thread_local! {
    /// Number of times [`rebalance`] ran on the current thread.
    pub(crate) static REBALANCE_CALLS: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
}

/// Direction of the height change that is being propagated by [`retrace`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Delta {
    /// A node was attached, the subtree grew by one level.
    Growth,
    /// A node was detached, the subtree shrank by one level.
    Shrink,
}

/// Rotates `x` down toward `dir`, promoting its child on the opposite side into `x`'s former
/// position. Returns the promoted node.
///
/// ```text
///     x                z
///    / \              / \
///   a   z    =>      x   c      (dir = Left)
///      / \          / \
///     b   c        a   b
/// ```
///
/// Balance factors are left untouched.
///
/// # Safety
///
/// `x` must point to a live node of a well-formed tree and must have a child on `dir.opposite()`.
pub(crate) unsafe fn rotate<T>(x: NonNull<T>, dir: Side) -> NonNull<T>
where
    T: Linked + ?Sized,
{
    // Safety: ensured by caller
    unsafe {
        let x_links = T::links(x).as_ref();
        let Some(z) = x_links.child(dir.opposite()) else {
            unreachable!("rotating {dir} requires a {} child", dir.opposite());
        };
        let z_links = T::links(z).as_ref();

        // Hook z into x's former parent (or leave it parentless if x was the root)
        let up = x_links.parent();
        if let Some(up) = up {
            let side = utils::side_of(up, x);
            T::links(up).as_ref().replace_child(side, Some(z));
        }
        z_links.replace_parent(up);

        // x becomes the `dir`-child of z and adopts z's inner subtree
        x_links.replace_parent(Some(z));
        let inner = z_links.replace_child(dir, Some(x));
        x_links.replace_child(dir.opposite(), inner);
        if let Some(inner) = inner {
            T::links(inner).as_ref().replace_parent(Some(x));
        }

        z
    }
}

/// Adds `delta` to the balance factor of `x`, rebalancing if `x` becomes unbalanced.
///
/// Returns the root of the subtree formerly rooted at `x`, which is `x` itself unless a rotation
/// took place.
///
/// # Safety
///
/// `x` must point to a live node of a well-formed tree whose descendants are balanced.
pub(crate) unsafe fn adjust_balance<T>(x: NonNull<T>, delta: i8) -> NonNull<T>
where
    T: Linked + ?Sized,
{
    // Safety: ensured by caller
    unsafe {
        let x_links = T::links(x).as_ref();
        let bf = x_links.balance_factor() + delta;

        if bf.abs() <= 1 {
            x_links.set_balance_factor(bf);
            x
        } else {
            rebalance(x, bf)
        }
    }
}

/// Restores the balance of `x` whose new balance factor `bf` is `-2` or `+2`.
///
/// The balance factors of all nodes that moved are derived from their values before the rotation,
/// no heights are measured. Returns the new root of the subtree.
///
/// # Safety
///
/// `x` must point to a live node of a well-formed tree and its child on the heavy side must exist.
pub(crate) unsafe fn rebalance<T>(x: NonNull<T>, bf: i8) -> NonNull<T>
where
    T: Linked + ?Sized,
{
    debug_assert_eq!(bf.abs(), 2);

    #[cfg(test)]
    REBALANCE_CALLS.with(|calls| calls.set(calls.get() + 1));

    // Safety: ensured by caller
    unsafe {
        let heavy = if bf < 0 { Side::Left } else { Side::Right };
        let sign = heavy.sign();

        let x_links = T::links(x).as_ref();
        let Some(z) = x_links.child(heavy) else {
            unreachable!("node leaning {heavy} has no {heavy} child");
        };
        let z_links = T::links(z).as_ref();
        let z_bf = z_links.balance_factor();

        if z_bf * sign >= 0 {
            // z leans the same way as x (or not at all), a single rotation suffices
            tracing::trace!(%heavy, z_bf, "single rotation");
            rotate(x, heavy.opposite());

            if z_bf == 0 {
                // only possible after a removal, the subtree height is unchanged
                x_links.set_balance_factor(sign);
                z_links.set_balance_factor(-sign);
            } else {
                x_links.set_balance_factor(0);
                z_links.set_balance_factor(0);
            }

            z
        } else {
            // z leans the other way: lift its inner child y above both z and x
            let Some(y) = z_links.child(heavy.opposite()) else {
                unreachable!("node leaning {} has no such child", heavy.opposite());
            };
            let y_links = T::links(y).as_ref();
            let y_bf = y_links.balance_factor();
            tracing::trace!(%heavy, z_bf, y_bf, "double rotation");

            rotate(z, heavy);
            rotate(x, heavy.opposite());

            x_links.set_balance_factor(if y_bf == sign { -sign } else { 0 });
            z_links.set_balance_factor(if y_bf == -sign { sign } else { 0 });
            y_links.set_balance_factor(0);

            y
        }
    }
}

/// Propagates a height change on the `side` child slot of `parent` toward the root.
///
/// At every level the balance factor is adjusted, and an imbalance is repaired through
/// [`rebalance`]. The walk stops as soon as the height of the visited subtree is provably unchanged.
///
/// Returns the root of the whole tree if the walk reached it (it may be a new node after a
/// rotation), `None` if it stopped below the root.
///
/// # Safety
///
/// `parent` must point to a live node of a tree that is well-formed except for the balance factors
/// along the path from `parent` to the root.
pub(crate) unsafe fn retrace<T>(mut parent: NonNull<T>, mut side: Side, delta: Delta) -> Link<T>
where
    T: Linked + ?Sized,
{
    // Safety: ensured by caller
    unsafe {
        loop {
            let step = match delta {
                Delta::Growth => side.sign(),
                Delta::Shrink => -side.sign(),
            };

            let c = adjust_balance(parent, step);
            let c_links = T::links(c).as_ref();

            // After growth a balanced subtree absorbed the extra level (this includes every
            // rotation). After shrinking, only a balanced subtree actually lost a level.
            let height_changed = match delta {
                Delta::Growth => c_links.balance_factor() != 0,
                Delta::Shrink => c_links.balance_factor() == 0,
            };

            match c_links.parent() {
                None => {
                    tracing::trace!(?delta, "retrace reached the root");
                    return Some(c);
                }
                Some(up) if height_changed => {
                    side = utils::side_of(up, c);
                    parent = up;
                }
                Some(_) => return None,
            }
        }
    }
}

/// Retraces after `added` was attached as a leaf.
///
/// Returns the root of the whole tree if the walk reached it, `None` otherwise.
///
/// # Safety
///
/// `added` must be a freshly attached leaf of an otherwise balanced tree.
pub(crate) unsafe fn retrace_on_growth<T>(added: NonNull<T>) -> Link<T>
where
    T: Linked + ?Sized,
{
    // Safety: ensured by caller
    unsafe {
        match T::links(added).as_ref().parent() {
            Some(parent) => retrace(parent, utils::side_of(parent, added), Delta::Growth),
            None => Some(added),
        }
    }
}
