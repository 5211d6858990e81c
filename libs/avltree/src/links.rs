// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::Error;
use crate::utils::Side;
use crate::{Link, Linked};
use core::cell::UnsafeCell;
use core::marker::PhantomPinned;
use core::ptr::NonNull;
use core::{fmt, mem};

/// Links to other nodes in an [`AvlTree`](crate::AvlTree).
///
/// In order to be part of an [`AvlTree`](crate::AvlTree), a type must contain an instance of this
/// type, and must implement the [`Linked`] trait.
///
/// The links hold the parent pointer, the two child pointers (`lr[0]` for the smaller, `lr[1]` for
/// the greater subtree) and the balance factor, i.e. the height of the right subtree minus the height
/// of the left subtree.
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    up: Link<T>,
    lr: [Link<T>; 2],
    bf: i8,
    /// Links must always be `!Unpin`, in order to ensure that they
    /// never receive LLVM `noalias` annotations; see also
    /// <https://github.com/rust-lang/rust/issues/63818>.
    _unpin: PhantomPinned,
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("self", &format_args!("{self:p}"))
            .field("bf", &self.balance_factor())
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .finish()
    }
}

/// # Safety
///
/// Types containing [`Links`] may be `Send`: the pointers within the `Links` may
/// mutably alias another value, but the links can only be _accessed_ by the
/// owner of the [`AvlTree`](crate::AvlTree) itself, because the pointers are private. As long as
/// the tree upholds its own invariants, `Links` should not make a type `!Send`.
unsafe impl<T> Send for Links<T> where T: Send + ?Sized {}

/// # Safety
///
/// Types containing [`Links`] may be `Sync`: the pointers within the `Links` may
/// mutably alias another value, but the links can only be _mutated_ through a `&mut`
/// borrow of the [`AvlTree`](crate::AvlTree) they belong to.
unsafe impl<T> Sync for Links<T> where T: Sync + ?Sized {}

impl<T: ?Sized> Links<T> {
    /// Returns new, unlinked links for an [AVL tree](crate::AvlTree).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                up: None,
                lr: [None, None],
                bf: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns `true` if this node is currently linked to an [`AvlTree`](crate::AvlTree).
    ///
    /// Note that the root of a single-element tree has no links at all and therefore reports `false`.
    pub fn is_linked(&self) -> bool {
        self.parent().is_some() || self.left().is_some() || self.right().is_some()
    }

    /// Returns the balance factor of this node, `height(right) - height(left)`.
    #[inline]
    pub fn balance_factor(&self) -> i8 {
        // Safety: we never hand out references into the cell
        unsafe { (*self.inner.get()).bf }
    }

    /// Clears all links and resets the balance factor.
    ///
    /// Calling this on a node that is still reachable from a tree will corrupt the tree.
    pub(crate) fn unlink(&self) {
        // Safety: we never hand out references into the cell
        unsafe {
            let inner = &mut *self.inner.get();
            inner.up = None;
            inner.lr = [None, None];
            inner.bf = 0;
        }
    }

    #[inline]
    pub(crate) fn set_balance_factor(&self, bf: i8) {
        debug_assert!((-2..=2).contains(&bf), "balance factor out of range: {bf}");
        // Safety: we never hand out references into the cell
        unsafe {
            (*self.inner.get()).bf = bf;
        }
    }

    #[inline]
    pub(crate) fn parent(&self) -> Link<T> {
        // Safety: we never hand out references into the cell
        unsafe { (*self.inner.get()).up }
    }
    #[inline]
    pub(crate) fn left(&self) -> Link<T> {
        self.child(Side::Left)
    }
    #[inline]
    pub(crate) fn right(&self) -> Link<T> {
        self.child(Side::Right)
    }
    #[inline]
    pub(crate) fn child(&self, side: Side) -> Link<T> {
        // Safety: we never hand out references into the cell
        unsafe { (*self.inner.get()).lr[side.index()] }
    }

    #[inline]
    pub(crate) fn replace_parent(&self, lk: Link<T>) -> Link<T> {
        // Safety: we never hand out references into the cell
        unsafe { mem::replace(&mut (*self.inner.get()).up, lk) }
    }
    #[inline]
    pub(crate) fn replace_child(&self, side: Side, lk: Link<T>) -> Link<T> {
        // Safety: we never hand out references into the cell
        unsafe { mem::replace(&mut (*self.inner.get()).lr[side.index()], lk) }
    }

    /// Checks the invariants that can be established by looking at this node alone: no self
    /// references, and parent and children are pairwise distinct.
    pub(crate) fn check(&self) -> Result<(), Error>
    where
        T: Linked,
    {
        let this = NonNull::from(self);
        // Safety: all nodes reachable through the links are live per the `Linked` contract
        let links_of = |lk: Link<T>| lk.map(|ptr| unsafe { T::links(ptr) });

        let up = links_of(self.parent());
        let left = links_of(self.left());
        let right = links_of(self.right());

        if up == Some(this) || left == Some(this) || right == Some(this) {
            return Err(Error::SelfLink);
        }
        if (up.is_some() && (up == left || up == right)) || (left.is_some() && left == right) {
            return Err(Error::DuplicateLink);
        }
        if self.balance_factor().abs() > 1 {
            return Err(Error::Imbalance {
                balance_factor: self.balance_factor(),
            });
        }

        Ok(())
    }
}
