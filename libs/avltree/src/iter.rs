// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::{utils, AvlTree, Link, Linked};
use core::iter::FusedIterator;
use core::pin::Pin;

/// An iterator over references to the entries of an [`AvlTree`], in ascending key order.
pub struct Iter<'a, T: Linked + ?Sized> {
    pub(crate) head: Link<T>,
    pub(crate) tail: Link<T>,
    pub(crate) tree: &'a AvlTree<T>,
}
impl<'a, T> Clone for Iter<'a, T>
where
    T: Linked + ?Sized,
{
    #[inline]
    fn clone(&self) -> Iter<'a, T> {
        Iter {
            head: self.head,
            tail: self.tail,
            tree: self.tree,
        }
    }
}
impl<'a, T> Iterator for Iter<'a, T>
where
    T: Linked + ?Sized + 'a,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let head = self.head?;

        if Some(head) == self.tail {
            self.head = None;
            self.tail = None;
        } else {
            // Safety: head is linked into the borrowed tree
            self.head = unsafe { utils::next(head) };
        }

        // Safety: head is linked into the borrowed tree
        Some(unsafe { head.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.head.is_some() {
            (1, Some(self.tree.len()))
        } else {
            (0, Some(0))
        }
    }
}
impl<'a, T> DoubleEndedIterator for Iter<'a, T>
where
    T: Linked + ?Sized + 'a,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        let tail = self.tail?;

        if Some(tail) == self.head {
            self.head = None;
            self.tail = None;
        } else {
            // Safety: tail is linked into the borrowed tree
            self.tail = unsafe { utils::prev(tail) };
        }

        // Safety: tail is linked into the borrowed tree
        Some(unsafe { tail.as_ref() })
    }
}
impl<'a, T> FusedIterator for Iter<'a, T> where T: Linked + ?Sized + 'a {}

impl<'a, T> IntoIterator for &'a AvlTree<T>
where
    T: Linked + ?Sized,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over mutable references to the entries of an [`AvlTree`], in ascending key order.
pub struct IterMut<'a, T>
where
    T: Linked + ?Sized,
{
    pub(crate) head: Link<T>,
    pub(crate) tail: Link<T>,
    pub(crate) tree: &'a mut AvlTree<T>,
}

impl<'a, T> Iterator for IterMut<'a, T>
where
    T: Linked + ?Sized + 'a,
{
    type Item = Pin<&'a mut T>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut head = self.head?;

        if Some(head) == self.tail {
            self.head = None;
            self.tail = None;
        } else {
            // Safety: head is linked into the borrowed tree
            self.head = unsafe { utils::next(head) };
        }

        // Safety: the tree is mutably borrowed, every element is yielded once and stays pinned
        Some(unsafe { Pin::new_unchecked(head.as_mut()) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.head.is_some() {
            (1, Some(self.tree.len()))
        } else {
            (0, Some(0))
        }
    }
}
impl<'a, T> DoubleEndedIterator for IterMut<'a, T>
where
    T: Linked + ?Sized + 'a,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        let mut tail = self.tail?;

        if Some(tail) == self.head {
            self.head = None;
            self.tail = None;
        } else {
            // Safety: tail is linked into the borrowed tree
            self.tail = unsafe { utils::prev(tail) };
        }

        // Safety: the tree is mutably borrowed, every element is yielded once and stays pinned
        Some(unsafe { Pin::new_unchecked(tail.as_mut()) })
    }
}
impl<'a, T> FusedIterator for IterMut<'a, T> where T: Linked + ?Sized + 'a {}

impl<'a, T> IntoIterator for &'a mut AvlTree<T>
where
    T: Linked + ?Sized,
{
    type Item = Pin<&'a mut T>;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
