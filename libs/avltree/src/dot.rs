// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::utils::Side;
use crate::AvlTree;
use crate::Linked;
use core::fmt;
use core::ptr::NonNull;

/// Renders an [`AvlTree`] in [graphviz format](https://graphviz.org/doc/info/lang.html).
///
/// Balanced nodes are drawn black, left-leaning nodes blue and right-leaning nodes orange.
pub struct Dot<'a, T>
where
    T: Linked + ?Sized,
{
    pub(crate) tree: &'a AvlTree<T>,
}

fn node_id<T: ?Sized>(node: NonNull<T>) -> usize {
    node.as_ptr().cast::<u8>().addr()
}

impl<T> fmt::Display for Dot<'_, T>
where
    T: Linked + fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("digraph {\n")?;
        f.write_str("node [style=filled,fontcolor=white,fontname=\"monospace\"];\n")?;
        f.write_str("edge [arrowhead=none];\n")?;

        // Visit in order, edges only ever point down so the output is a valid DAG
        for node in self.tree.iter() {
            let ptr = NonNull::from(node);
            let id = node_id(ptr);
            // Safety: the node is linked into the borrowed tree
            let links = unsafe { T::links(ptr).as_ref() };

            let fill = match links.balance_factor() {
                0 => "black",
                bf if bf < 0 => "blue",
                _ => "orange",
            };
            writeln!(
                f,
                r#"{id} [label="{node:?} [{bf}]",fillcolor={fill}];"#,
                bf = links.balance_factor()
            )?;

            for side in [Side::Left, Side::Right] {
                if let Some(child) = links.child(side) {
                    writeln!(f, r#"{id} -> {} [label="{side}"];"#, node_id(child))?;
                }
            }
        }

        f.write_str("}\n")
    }
}

impl<T> fmt::Debug for Dot<'_, T>
where
    T: Linked + fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
