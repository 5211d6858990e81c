// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::{utils, AvlTree, Link, Linked};
use core::pin::Pin;

/// A cursor which provides read-only access to an [`AvlTree`].
///
/// The cursor either points at an element or is empty. Moving past either end of the tree leaves
/// the cursor empty.
pub struct Cursor<'a, T>
where
    T: Linked + ?Sized,
{
    pub(crate) current: Link<T>,
    pub(crate) tree: &'a AvlTree<T>,
}

impl<'a, T> Cursor<'a, T>
where
    T: Linked + ?Sized,
{
    /// Returns the raw pointer to the current node
    ///
    /// # Safety
    ///
    /// Caller has to ensure the ptr is *never* used to move out of the current location, as the tree
    /// requires pinned memory locations.
    pub unsafe fn get_ptr(&self) -> Link<T> {
        self.current
    }
    pub fn get(&self) -> Option<&'a T> {
        // Safety: elements linked into the tree are live for as long as the tree is borrowed
        unsafe { self.current.map(|ptr| ptr.as_ref()) }
    }
    /// Moves the cursor to the next greater element.
    pub fn move_next(&mut self) {
        // Safety: the current element is linked into the borrowed tree
        self.current = self.current.and_then(|current| unsafe { utils::next(current) });
    }
    /// Moves the cursor to the next smaller element.
    pub fn move_prev(&mut self) {
        // Safety: the current element is linked into the borrowed tree
        self.current = self.current.and_then(|current| unsafe { utils::prev(current) });
    }
    pub fn peek_next(&self) -> Option<&'a T> {
        // Safety: the current element is linked into the borrowed tree
        unsafe {
            self.current
                .and_then(|current| utils::next(current))
                .map(|ptr| ptr.as_ref())
        }
    }
    pub fn peek_prev(&self) -> Option<&'a T> {
        // Safety: the current element is linked into the borrowed tree
        unsafe {
            self.current
                .and_then(|current| utils::prev(current))
                .map(|ptr| ptr.as_ref())
        }
    }
    /// Returns the tree this cursor walks.
    pub fn tree(&self) -> &'a AvlTree<T> {
        self.tree
    }
}

impl<T> Clone for Cursor<'_, T>
where
    T: Linked + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            current: self.current,
            tree: self.tree,
        }
    }
}

/// A cursor which provides mutable access to an [`AvlTree`].
///
/// In addition to moving around, a `CursorMut` can detach the element it points at.
pub struct CursorMut<'a, T>
where
    T: Linked + ?Sized,
{
    pub(crate) current: Link<T>,
    pub(crate) tree: &'a mut AvlTree<T>,
}

impl<'a, T> CursorMut<'a, T>
where
    T: Linked + ?Sized,
{
    /// Returns the raw pointer to the current node
    ///
    /// # Safety
    ///
    /// Caller has to ensure the ptr is *never* used to move out of the current location, as the tree
    /// requires pinned memory locations.
    pub unsafe fn get_ptr(&self) -> Link<T> {
        self.current
    }
    pub fn get(&self) -> Option<&T> {
        // Safety: elements linked into the tree are live for as long as the tree is borrowed
        unsafe { self.current.map(|ptr| ptr.as_ref()) }
    }
    /// Returns a pinned mutable reference to the current element.
    ///
    /// The key of the element **must not** be changed in a way that alters its position within the
    /// tree.
    pub fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        // Safety: the tree is mutably borrowed, and elements are pinned while linked
        unsafe { self.current.map(|mut ptr| Pin::new_unchecked(ptr.as_mut())) }
    }
    /// Consumes the cursor, returning a pinned mutable reference to the current element that lives
    /// as long as the tree borrow.
    pub fn into_mut(self) -> Option<Pin<&'a mut T>> {
        // Safety: the tree is mutably borrowed for 'a, and elements are pinned while linked
        unsafe { self.current.map(|mut ptr| Pin::new_unchecked(ptr.as_mut())) }
    }
    /// Moves the cursor to the next greater element.
    pub fn move_next(&mut self) {
        // Safety: the current element is linked into the borrowed tree
        self.current = self.current.and_then(|current| unsafe { utils::next(current) });
    }
    /// Moves the cursor to the next smaller element.
    pub fn move_prev(&mut self) {
        // Safety: the current element is linked into the borrowed tree
        self.current = self.current.and_then(|current| unsafe { utils::prev(current) });
    }
    pub fn peek_next(&self) -> Option<&T> {
        self.as_cursor().peek_next()
    }
    pub fn peek_prev(&self) -> Option<&T> {
        self.as_cursor().peek_prev()
    }
    /// Detaches the current element from the tree and returns its owning handle.
    ///
    /// The cursor moves on to the next greater element. Returns `None` if the cursor is empty.
    pub fn remove(&mut self) -> Option<T::Handle> {
        let current = self.current?;
        // Safety: the current element is linked into the borrowed tree; the successor stays linked
        // and does not move in memory while `current` is detached.
        unsafe {
            self.current = utils::next(current);
            Some(self.tree.remove_internal(current))
        }
    }
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            current: self.current,
            tree: self.tree,
        }
    }
}
