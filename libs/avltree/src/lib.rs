// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # An intrusive AVL Tree.
//!
//! A Rust implementation of AVL trees for environments where dynamic memory allocation is not
//! available or not allowed, such as kernels, firmware and hard real-time code.
//!
//! AVL trees are *self-balancing binary search trees* that keep, for every node, the heights of the
//! left and right subtrees within one level of each other. This gives them the tightest height bound
//! of the common balanced trees (~1.44log2(n)), which makes searches cheap. Insertions require at most
//! a single (or double) rotation, while removals may rotate at every level on the way up to the root.
//!
//! This implementation is *intrusive* meaning node data (pointers to other nodes and the balance
//! factor) are stored _within_ participating values, rather than being allocated and owned by the tree
//! itself. The tree never allocates, copies or frees anything, it only links and unlinks nodes.
//!
//! This crate is self-contained and fully `no_std`.
//!
//! ## when to use this
//!
//! - **want binary search** - AVL trees are *sorted* collections that are efficient to search.
//! - **search a lot more than you edit** - AVL trees are more rigidly balanced than red-black or
//!   weak AVL trees, at the cost of more rotations during removal.
//! - **have no allocator at all** - When elements have fixed memory locations (such as statically
//!   allocated pools or `static`s), they can be added without *any allocations at all*.
//! - **need bounded execution time** - Every operation is iterative and completes in `O(log n)` steps.
//!
//! ## when not to use this
//!
//! - **need to store primitives** - Intrusive collections require elements to store the node data,
//!   which excludes primitives such as strings or numbers, since they can't hold this metadata.
//! - **can't use unsafe** - Both this implementation and code consuming it require `unsafe`, the
//!   `Linked` trait is unsafe to implement since it requires implementors uphold special invariants.
//!
//! ## example
//!
//! ```rust
//! use avltree::{AvlTree, Linked, Links};
//! use core::mem::offset_of;
//! use core::pin::Pin;
//! use core::ptr::NonNull;
//!
//! #[derive(Default)]
//! struct Entry {
//!     links: Links<Self>,
//!     id: u32,
//! }
//!
//! unsafe impl Linked for Entry {
//!     type Handle = Pin<Box<Self>>;
//!     type Key = u32;
//!
//!     fn into_ptr(handle: Self::Handle) -> NonNull<Self> {
//!         unsafe { NonNull::from(Box::leak(Pin::into_inner_unchecked(handle))) }
//!     }
//!     unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
//!         unsafe { Pin::new_unchecked(Box::from_raw(ptr.as_ptr())) }
//!     }
//!     unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Self>> {
//!         ptr.map_addr(|addr| addr.checked_add(offset_of!(Self, links)).unwrap())
//!             .cast()
//!     }
//!     fn get_key(&self) -> &Self::Key {
//!         &self.id
//!     }
//! }
//!
//! let mut tree = AvlTree::<Entry>::new();
//! for id in [3, 1, 2] {
//!     assert!(tree.insert(Box::pin(Entry { id, ..Default::default() })).is_ok());
//! }
//!
//! // Search with an arbitrary ordering predicate, inserting on a miss.
//! let cursor = tree.find_or_insert_with(
//!     |entry| 4.cmp(&entry.id),
//!     || Some(Box::pin(Entry { id: 4, ..Default::default() })),
//! );
//! assert_eq!(cursor.get().map(|entry| entry.id), Some(4));
//!
//! assert_eq!(tree.iter().map(|entry| entry.id).collect::<Vec<_>>(), [1, 2, 3, 4]);
//! assert!(tree.remove(&2).is_some());
//! assert!(tree.find_by(|entry| 2.cmp(&entry.id)).get().is_none());
//! tree.assert_valid();
//! ```
//!
//! ## features
//!
//! The following features are available:
//!
//! | Feature | Default | Explanation                                                                              |
//! |:--------|:--------|:-----------------------------------------------------------------------------------------|
//! | `dot`   | `false` | Enables the `AvlTree::dot` method, which allows display of the tree in [graphviz format] |
//!
//! [graphviz format]: https://graphviz.org/doc/info/lang.html

#![cfg_attr(not(test), no_std)]

mod balance;
mod cursor;
#[cfg(feature = "dot")]
mod dot;
mod error;
mod iter;
mod links;
mod utils;

use crate::balance::Delta;
use crate::utils::Side;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::mem;
use core::ptr::NonNull;

pub use cursor::{Cursor, CursorMut};
#[cfg(feature = "dot")]
pub use dot::Dot;
pub use error::Error;
pub use iter::{Iter, IterMut};
pub use links::Links;

/// Trait implemented by types which can be members of an [intrusive AVL tree][AvlTree].
///
/// In order to be part of an intrusive AVL tree, a type must contain a
/// `Links` type that stores the pointers to other nodes in the tree.
///
/// # Safety
///
/// This is unsafe to implement because it's the implementation's responsibility
/// to ensure that types implementing this trait are valid intrusive collection
/// nodes. In particular:
///
/// - Implementations **must** ensure that implementors are pinned in memory while they
///   are in an intrusive collection. While a given `Linked` type is in an intrusive
///   data structure, it may not be deallocated or moved to a different memory
///   location.
/// - The type implementing this trait **must not** implement [`Unpin`].
/// - Additional safety requirements for individual methods on this trait are
///   documented on those methods.
///
/// Failure to uphold these invariants will result in corruption of the
/// intrusive data structure, including dangling pointers.
///
/// # Implementing `Linked::links`
///
/// The [`Linked::links`] method provides access to a `Linked` type's `Links`
/// field through a [`NonNull`] pointer. This is the intrusive equivalent of a
/// "container of" projection and is somewhat difficult to implement correctly.
///
/// The naive implementation borrows the target's `links` field through a temporary
/// reference (`NonNull::from(&mut target.as_mut().links)`). This **is not sound** under
/// [Stacked Borrows], since the new raw pointer is derived from that temporary reference.
/// Instead, compute the field address from the raw pointer directly:
///
/// ```
/// use core::ptr::NonNull;
/// # use avltree::Linked;
/// # struct Entry {
/// #    links: avltree::Links<Self>,
/// #    data: usize,
/// # }
///
/// unsafe impl Linked for Entry {
///     # type Handle = NonNull<Self>;
///     # type Key = usize;
///     # fn get_key(&self) -> &Self::Key { &self.data }
///     # fn into_ptr(r: Self::Handle) -> NonNull<Self> { r }
///     # unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle { ptr }
///     // ...
///
///     unsafe fn links(target: NonNull<Self>) -> NonNull<avltree::Links<Self>> {
///         target
///             .map_addr(|addr| {
///                 // `offset_of!` gives us the offset of the `links` field
///                 // in our overall struct.
///                 let offset = core::mem::offset_of!(Self, links);
///                 addr.checked_add(offset).unwrap()
///             })
///             .cast()
///     }
/// }
/// ```
///
/// [Stacked Borrows]: https://github.com/rust-lang/unsafe-code-guidelines/blob/master/wip/stacked-borrows.md
pub unsafe trait Linked {
    /// The handle owning nodes in the tree.
    ///
    /// This type must have ownership over a `Self`-typed value. When a `Handle`
    /// is dropped, it should drop the corresponding `Linked` type.
    ///
    /// A quintessential example of a `Handle` is `Pin<Box<Self>>`. Allocation-free users
    /// typically use `NonNull<Self>` or `&'static Self` pointing into a statically allocated pool.
    type Handle;

    /// The type by which entries are identified.
    ///
    /// This type must be a unique identifier of an element, as it is used as the key for the
    /// key-based methods (e.g. [`AvlTree::find`], [`AvlTree::insert`]). Entries must form a
    /// total order under this key. Predicate-based methods (e.g. [`AvlTree::find_by`]) must order
    /// entries consistently with it.
    type Key: Ord;

    /// Convert a [`Self::Handle`] to a raw pointer to `Self`, taking ownership
    /// of it in the process.
    fn into_ptr(r: Self::Handle) -> NonNull<Self>;

    /// Convert a raw pointer to Self into an owning Self::Handle.
    ///
    /// # Safety
    ///
    /// It must be valid to construct a Self::Handle from the raw pointer and the pointer must
    /// point to a valid instance of Self (e.g. it does not dangle).
    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle;

    /// Return the links of the node pointed to by ptr.
    ///
    /// # Safety
    ///
    /// The pointer must point to a valid instance of Self (e.g. it does not dangle).
    /// See the [the trait-level documentation](#implementing-linkedlinks) for details on how to
    /// correctly implement this method.
    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Self>>;

    /// Retrieve the key identifying this node within the collection. See [`Linked::Key`] for details.
    fn get_key(&self) -> &Self::Key;
}

type Link<T> = Option<NonNull<T>>;

/// Outcome of descending the tree with an ordering predicate.
enum Search<T: ?Sized> {
    /// The predicate returned `Equal` for this node.
    Found(NonNull<T>),
    /// No node matched; a new node would have to be attached at `side` of `parent`
    /// (or become the root if `parent` is `None`).
    Vacant { parent: Link<T>, side: Side },
}

/// An intrusive AVL Tree.
///
/// This data structure supports efficient O(log n) lookup of elements and may be used for binary search.
/// All operations complete in logarithmic time without recursion and without allocating.
///
/// The tree itself only holds the root link and the number of elements; every node carries its
/// own [`Links`]. Because rotations may change which node is the root, the tree is updated in place by
/// every mutating operation.
pub struct AvlTree<T>
where
    T: Linked + ?Sized,
{
    pub(crate) root: Link<T>,
    size: usize,
}

// Safety: the tree owns its elements through their handles, the raw pointers are never shared
// outside of borrows of the tree.
unsafe impl<T> Send for AvlTree<T>
where
    T: Linked + Send + ?Sized,
    T::Handle: Send,
{
}
// Safety: shared access only hands out shared references to elements.
unsafe impl<T> Sync for AvlTree<T> where T: Linked + Sync + ?Sized {}

impl<T> Drop for AvlTree<T>
where
    T: Linked + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for AvlTree<T>
where
    T: Linked + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AvlTree<T>
where
    T: Linked + ?Sized,
{
    /// Creates a new, empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            size: 0,
        }
    }

    /// Returns the number of entries in the tree.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the tree contains no entries.
    pub fn is_empty(&self) -> bool {
        debug_assert_eq!(self.root.is_none(), self.size == 0);
        self.size == 0
    }

    /// Returns the height of the tree, i.e. the number of nodes on the longest path from the root to
    /// a leaf. The empty tree has height 0.
    ///
    /// This is derived from the balance factors in O(log n) by always descending into the taller
    /// subtree.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut curr = self.root;
        while let Some(node) = curr {
            height += 1;
            // Safety: all nodes reachable from the root are live
            let links = unsafe { T::links(node).as_ref() };
            curr = if links.balance_factor() < 0 {
                links.left()
            } else {
                links.right()
            };
        }
        height
    }

    /// Returns a `Cursor` pointing to an element with the given key.
    ///
    /// The key may be any borrowed form of the entry’s key type, but the ordering on the borrowed
    /// form *must* match the ordering on the key type.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_by(|node| key.cmp(node.get_key().borrow()))
    }

    /// Returns a `CursorMut` pointing to an element with the given key.
    ///
    /// The key may be any borrowed form of the entry’s key type, but the ordering on the borrowed
    /// form *must* match the ordering on the key type.
    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_by_mut(|node| key.cmp(node.get_key().borrow()))
    }

    /// Returns `true` if the tree contains an element with the given key.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).get().is_some()
    }

    /// Returns a `Cursor` pointing to the element matched by `predicate`, or an empty cursor if
    /// there is no such element.
    ///
    /// The predicate compares the searched-for key against the given element: it returns
    /// [`Ordering::Less`] if the key is smaller than the element, [`Ordering::Greater`] if it is
    /// greater and [`Ordering::Equal`] on a match. It must be consistent with [`Linked::Key`].
    pub fn find_by<F>(&self, predicate: F) -> Cursor<'_, T>
    where
        F: FnMut(&T) -> Ordering,
    {
        let current = match self.search(predicate) {
            Search::Found(ptr) => Some(ptr),
            Search::Vacant { .. } => None,
        };
        Cursor {
            current,
            tree: self,
        }
    }

    /// Returns a `CursorMut` pointing to the element matched by `predicate`, or an empty cursor if
    /// there is no such element. See [`AvlTree::find_by`] for the predicate contract.
    pub fn find_by_mut<F>(&mut self, predicate: F) -> CursorMut<'_, T>
    where
        F: FnMut(&T) -> Ordering,
    {
        let current = match self.search(predicate) {
            Search::Found(ptr) => Some(ptr),
            Search::Vacant { .. } => None,
        };
        CursorMut {
            current,
            tree: self,
        }
    }

    /// Looks for the element matched by `predicate` and inserts a new element if there is none.
    ///
    /// If no element matches, `factory` is invoked exactly once and the element it returns is
    /// attached at the position the search ended at, without traversing the tree again. If the
    /// factory returns `None` the tree is left untouched and the returned cursor is empty.
    ///
    /// See [`AvlTree::find_by`] for the predicate contract. The new element must sort exactly where
    /// the predicate placed it.
    ///
    /// # Panics
    ///
    /// Panics if the new entry is already linked to a different intrusive collection.
    pub fn find_or_insert_with<F, G>(&mut self, predicate: F, factory: G) -> CursorMut<'_, T>
    where
        F: FnMut(&T) -> Ordering,
        G: FnOnce() -> Option<T::Handle>,
    {
        let current = match self.search(predicate) {
            Search::Found(ptr) => Some(ptr),
            Search::Vacant { parent, side } => factory().map(|handle| {
                let ptr = T::into_ptr(handle);
                // Safety: the search just located this gap and the factory returned a fresh node
                unsafe { self.link_at(ptr, parent, side) };
                ptr
            }),
        };
        CursorMut {
            current,
            tree: self,
        }
    }

    /// Insert a new entry into the `AvlTree`, ordered by its [`Linked::Key`].
    ///
    /// Returns a cursor pointing at the new entry, or gives the handle back if an entry with
    /// the same key is already part of the tree.
    ///
    /// # Panics
    ///
    /// Panics if the new entry is already linked to a different intrusive collection.
    pub fn insert(&mut self, element: T::Handle) -> Result<CursorMut<'_, T>, T::Handle> {
        let ptr = T::into_ptr(element);

        // Safety: `into_ptr` returns a pointer to a valid element
        let key = unsafe { ptr.as_ref() }.get_key();

        match self.search(|node| key.cmp(node.get_key())) {
            // Safety: the pointer was produced by `into_ptr` above
            Search::Found(_) => Err(unsafe { T::from_ptr(ptr) }),
            Search::Vacant { parent, side } => {
                // Safety: the search just located this gap
                unsafe { self.link_at(ptr, parent, side) };
                Ok(CursorMut {
                    current: Some(ptr),
                    tree: self,
                })
            }
        }
    }

    /// Removes an entry - identified by the given key - from the tree, returning the owned handle
    /// if the associated entry was part of the tree.
    ///
    /// The key may be any borrowed form of the entry’s key type, but the ordering on the borrowed
    /// form *must* match the ordering on the key type.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(|node| key.cmp(node.get_key().borrow())) {
            // Safety: the node was just found in this tree
            Search::Found(ptr) => Some(unsafe { self.remove_internal(ptr) }),
            Search::Vacant { .. } => None,
        }
    }

    /// Returns a `Cursor` pointing to the smallest element of the tree, or an empty cursor if the
    /// tree is empty.
    pub fn first(&self) -> Cursor<'_, T> {
        Cursor {
            // Safety: the root is live
            current: self.root.map(|root| unsafe { utils::find_minimum(root) }),
            tree: self,
        }
    }

    /// Returns a `CursorMut` pointing to the smallest element of the tree.
    pub fn first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut {
            // Safety: the root is live
            current: self.root.map(|root| unsafe { utils::find_minimum(root) }),
            tree: self,
        }
    }

    /// Returns a `Cursor` pointing to the greatest element of the tree, or an empty cursor if the
    /// tree is empty.
    pub fn last(&self) -> Cursor<'_, T> {
        Cursor {
            // Safety: the root is live
            current: self.root.map(|root| unsafe { utils::find_maximum(root) }),
            tree: self,
        }
    }

    /// Returns a `CursorMut` pointing to the greatest element of the tree.
    pub fn last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut {
            // Safety: the root is live
            current: self.root.map(|root| unsafe { utils::find_maximum(root) }),
            tree: self,
        }
    }

    /// Returns a `Cursor` pointing at the given element.
    ///
    /// # Safety
    ///
    /// `ptr` must point to an element that is currently linked into *this* tree.
    pub unsafe fn cursor_from_ptr(&self, ptr: NonNull<T>) -> Cursor<'_, T> {
        Cursor {
            current: Some(ptr),
            tree: self,
        }
    }

    /// Returns a `CursorMut` pointing at the given element. Combined with [`CursorMut::remove`]
    /// this detaches an element the caller already holds in O(log n) without searching for it.
    ///
    /// # Safety
    ///
    /// `ptr` must point to an element that is currently linked into *this* tree.
    pub unsafe fn cursor_mut_from_ptr(&mut self, ptr: NonNull<T>) -> CursorMut<'_, T> {
        CursorMut {
            current: Some(ptr),
            tree: self,
        }
    }

    /// Gets an iterator over the entries in the tree, sorted by their key.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            // Safety: the root is live
            head: self.root.map(|root| unsafe { utils::find_minimum(root) }),
            tail: self.root.map(|root| unsafe { utils::find_maximum(root) }),
            tree: self,
        }
    }

    /// Gets a mutable iterator over the entries in the tree, sorted by their key.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            // Safety: the root is live
            head: self.root.map(|root| unsafe { utils::find_minimum(root) }),
            tail: self.root.map(|root| unsafe { utils::find_maximum(root) }),
            tree: self,
        }
    }

    /// Removes all elements from the tree.
    ///
    /// This unlinks every entry and drops its handle. Nodes are detached bottom-up without
    /// recursion and without rebalancing.
    pub fn clear(&mut self) {
        let mut curr = self.root.take();
        self.size = 0;

        while let Some(node) = curr {
            // Safety: every node reachable from the former root is live and owned by the tree
            unsafe {
                let links = T::links(node).as_ref();

                if let Some(child) = links.left().or(links.right()) {
                    curr = Some(child);
                    continue;
                }

                // `node` is a leaf, detach it from its parent and hand it back
                let parent = links.parent();
                if let Some(parent) = parent {
                    let side = utils::side_of(parent, node);
                    T::links(parent).as_ref().replace_child(side, None);
                }
                links.unlink();
                drop(T::from_ptr(node));

                curr = parent;
            }
        }
    }

    /// Moves all elements out of this tree into a new one, leaving `self` empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::new())
    }

    /// Checks all of the tree's invariants, returning the number of elements on success.
    ///
    /// This verifies that:
    /// - no node links to itself or twice to the same node,
    /// - every child points back at its parent and the root has no parent,
    /// - every balance factor matches the measured subtree heights and lies within `-1..=1`,
    /// - an in-order traversal yields strictly ascending keys,
    /// - the number of reachable nodes matches [`AvlTree::len`].
    ///
    /// Runs in O(n) time with recursion as deep as the tree is high.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant found.
    pub fn check(&self) -> Result<usize, Error> {
        let Some(root) = self.root else {
            return if self.size == 0 {
                Ok(0)
            } else {
                Err(Error::SizeMismatch {
                    expected: self.size,
                    found: 0,
                })
            };
        };

        let mut found = 0;
        // Safety: all nodes reachable from the root are live
        unsafe {
            if T::links(root).as_ref().parent().is_some() {
                return Err(Error::RootHasParent);
            }
            self.check_subtree(root, &mut found)?;
        }
        if found != self.size {
            return Err(Error::SizeMismatch {
                expected: self.size,
                found,
            });
        }

        let mut prev: Option<&T> = None;
        for node in self.iter() {
            if prev.is_some_and(|prev| prev.get_key() >= node.get_key()) {
                return Err(Error::Ordering);
            }
            prev = Some(node);
        }

        Ok(found)
    }

    /// Asserts all of the tree's invariants, see [`AvlTree::check`].
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    #[track_caller]
    pub fn assert_valid(&self) {
        if let Err(err) = self.check() {
            panic!("AVL tree invariant violated: {err}");
        }
    }

    /// Returns the measured height of the subtree rooted at `node`.
    unsafe fn check_subtree(&self, node: NonNull<T>, found: &mut usize) -> Result<isize, Error> {
        *found += 1;
        // More nodes than we track means a cycle or a foreign node, bail before looping forever
        if *found > self.size {
            return Err(Error::SizeMismatch {
                expected: self.size,
                found: *found,
            });
        }

        // Safety: ensured by caller
        unsafe {
            let links = T::links(node).as_ref();
            links.check()?;

            let mut heights = [0isize; 2];
            for side in [Side::Left, Side::Right] {
                if let Some(child) = links.child(side) {
                    if T::links(child).as_ref().parent() != Some(node) {
                        return Err(Error::BrokenAncestry);
                    }
                    heights[side.index()] = self.check_subtree(child, found)?;
                }
            }

            let measured = heights[1] - heights[0];
            if measured != isize::from(links.balance_factor()) {
                return Err(Error::BalanceFactor {
                    stored: links.balance_factor(),
                    measured,
                });
            }

            Ok(1 + heights[0].max(heights[1]))
        }
    }

    /// Returns a helper that renders the tree in graphviz format through its `Display` impl.
    #[cfg(feature = "dot")]
    pub fn dot(&self) -> Dot<'_, T> {
        Dot { tree: self }
    }

    /// Descends from the root guided by `predicate`.
    fn search<F>(&self, mut predicate: F) -> Search<T>
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut parent = None;
        let mut side = Side::Left;
        let mut tree = self.root;

        while let Some(curr) = tree {
            // Safety: all nodes reachable from the root are live
            let (node, curr_lks) = unsafe { (curr.as_ref(), T::links(curr).as_ref()) };

            side = match predicate(node) {
                Ordering::Equal => return Search::Found(curr),
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
            };
            parent = Some(curr);
            tree = curr_lks.child(side);
        }

        Search::Vacant { parent, side }
    }

    /// Attaches the unlinked node `ptr` as the `side` child of `parent` (or as the root) and
    /// restores the balance.
    unsafe fn link_at(&mut self, ptr: NonNull<T>, parent: Link<T>, side: Side) {
        // Safety: ensured by caller
        unsafe {
            let ptr_links = T::links(ptr).as_ref();
            assert!(!ptr_links.is_linked(), "node is already linked to a tree");

            ptr_links.unlink();
            ptr_links.replace_parent(parent);

            if let Some(parent) = parent {
                debug_assert!(T::links(parent).as_ref().child(side).is_none());
                T::links(parent).as_ref().replace_child(side, Some(ptr));

                if let Some(root) = balance::retrace_on_growth(ptr) {
                    self.root = Some(root);
                }
            } else {
                debug_assert!(self.root.is_none());
                self.root = Some(ptr);
            }
        }

        self.size += 1;
    }

    /// Detaches `node` from the tree, restores the balance and hands the node back.
    pub(crate) unsafe fn remove_internal(&mut self, node: NonNull<T>) -> T::Handle {
        // Safety: ensured by caller
        unsafe {
            let node_links = T::links(node).as_ref();
            let up = node_links.parent();

            // The lowest node whose subtree lost a level, and on which side.
            let shrunk = if let (Some(left), Some(right)) = (node_links.left(), node_links.right())
            {
                // Replace node with its in-order neighbour from the taller side; ties favour the
                // right. The neighbour has no child on the side facing `node`.
                let (side, subtree, other) = if node_links.balance_factor() < 0 {
                    (Side::Left, left, right)
                } else {
                    (Side::Right, right, left)
                };
                let near = side.opposite();

                let re = utils::find_extremum(subtree, near);
                let re_links = T::links(re).as_ref();
                debug_assert!(re_links.child(near).is_none());
                tracing::trace!(%side, "promoting in-order neighbour");

                re_links.set_balance_factor(node_links.balance_factor());
                re_links.replace_child(near, Some(other));
                T::links(other).as_ref().replace_parent(Some(re));

                let shrunk = match re_links.parent() {
                    Some(p) if p != node => {
                        // Lift re's only child into re's old slot
                        let far = re_links.child(side);
                        T::links(p).as_ref().replace_child(near, far);
                        if let Some(far) = far {
                            T::links(far).as_ref().replace_parent(Some(p));
                        }

                        re_links.replace_child(side, Some(subtree));
                        T::links(subtree).as_ref().replace_parent(Some(re));
                        (p, near)
                    }
                    // re was the direct child of node and keeps its own subtree
                    _ => (re, side),
                };

                re_links.replace_parent(up);
                match up {
                    Some(up) => {
                        let node_side = utils::side_of(up, node);
                        T::links(up).as_ref().replace_child(node_side, Some(re));
                    }
                    None => self.root = Some(re),
                }

                Some(shrunk)
            } else {
                let child = node_links.left().or(node_links.right());
                if let Some(child) = child {
                    T::links(child).as_ref().replace_parent(up);
                }

                match up {
                    Some(up) => {
                        let side = utils::side_of(up, node);
                        T::links(up).as_ref().replace_child(side, child);
                        Some((up, side))
                    }
                    None => {
                        self.root = child;
                        None
                    }
                }
            };

            if let Some((parent, side)) = shrunk {
                if let Some(root) = balance::retrace(parent, side, Delta::Shrink) {
                    self.root = Some(root);
                }
            }

            self.size -= 1;
            node_links.unlink();
            T::from_ptr(node)
        }
    }
}
