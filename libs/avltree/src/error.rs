// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// An invariant violation detected by [`AvlTree::check`](crate::AvlTree::check).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A node links to itself as parent or child.
    SelfLink,
    /// Two of a node's links (parent, left, right) point to the same node.
    DuplicateLink,
    /// A child's parent link does not point back at the node holding it.
    BrokenAncestry,
    /// The root node has a parent.
    RootHasParent,
    /// An in-order traversal did not yield strictly ascending keys.
    Ordering,
    /// A node's stored balance factor disagrees with its measured subtree heights.
    BalanceFactor { stored: i8, measured: isize },
    /// A node's balance factor is outside of `-1..=1`.
    Imbalance { balance_factor: i8 },
    /// The number of reachable nodes disagrees with the tracked size.
    SizeMismatch { expected: usize, found: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SelfLink => write!(f, "node links to itself"),
            Error::DuplicateLink => write!(f, "node links to the same node twice"),
            Error::BrokenAncestry => write!(f, "child does not point back at its parent"),
            Error::RootHasParent => write!(f, "root node has a parent"),
            Error::Ordering => write!(f, "in-order traversal is not strictly ascending"),
            Error::BalanceFactor { stored, measured } => write!(
                f,
                "stored balance factor {stored} does not match measured balance factor {measured}"
            ),
            Error::Imbalance { balance_factor } => {
                write!(f, "balance factor {balance_factor} is out of range")
            }
            Error::SizeMismatch { expected, found } => {
                write!(f, "expected {expected} nodes, but found {found}")
            }
        }
    }
}

impl core::error::Error for Error {}
