//! Structure dumps and invariant checks, for tests and debugging.

use std::cmp::Ordering;
use std::fmt;

use crate::name::{full_compare, Name, Relation};
use crate::node::{Color, NodeId};
use crate::NameTree;

struct Audit {
    issues: Vec<String>,
    data_nodes: usize,
    reachable: usize,
}

impl<T, X> NameTree<T, X> {
    /// Writes every node, one per line, indented by depth within its level.
    ///
    /// A node's `down` level is printed between `++ BEG` and `-- END`
    /// markers right after the node; empty left and right links print as
    /// `NULL`, empty `down` links are left out.
    pub fn dump(&self, out: &mut impl fmt::Write) -> fmt::Result {
        match self.root {
            Some(root) => self.dump_node(out, root, 0),
            None => writeln!(out, "NULL"),
        }
    }

    fn dump_node(&self, out: &mut impl fmt::Write, id: NodeId, depth: usize) -> fmt::Result {
        let node = &self.nodes[id];
        let indent = depth * 4;
        let color = match node.color {
            Color::Red => "red",
            Color::Black => "black",
        };
        write!(
            out,
            "{:indent$}{} ({color})",
            "",
            Name::display(node.labels())
        )?;
        if node.has_data() {
            out.write_str(" [data]")?;
        }
        if node.find_callback {
            out.write_str(" [callback]")?;
        }
        out.write_char('\n')?;

        if let Some(down) = node.down {
            let labels = Name::display(node.labels());
            writeln!(out, "{:indent$}++ BEG down from {labels}", "")?;
            self.dump_node(out, down, 0)?;
            writeln!(out, "{:indent$}-- END down from {labels}", "")?;
        }

        for child in [node.left, node.right] {
            match child {
                Some(child) => self.dump_node(out, child, depth + 1)?,
                None => writeln!(out, "{:width$}NULL", "", width = indent + 4)?,
            }
        }
        Ok(())
    }

    /// The dump as a string.
    pub fn dump_string(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.dump(&mut out);
        out
    }

    /// Checks the red-black rules on every level, in-level ordering,
    /// suffix disjointness of siblings, label placement and the data and
    /// node counts. Returns one message per violation found.
    pub fn check_integrity(&self) -> Vec<String> {
        let mut audit = Audit {
            issues: Vec::new(),
            data_nodes: 0,
            reachable: 0,
        };
        if let Some(root) = self.root {
            self.audit_level(root, &Name::root(), true, &mut audit);
        }
        if audit.data_nodes != self.len() {
            audit.issues.push(format!(
                "len() is {} but {} nodes carry data",
                self.len(),
                audit.data_nodes
            ));
        }
        if audit.reachable != self.node_count() {
            audit.issues.push(format!(
                "{} nodes are live but {} are reachable",
                self.node_count(),
                audit.reachable
            ));
        }
        audit.issues
    }

    fn audit_level(&self, root: NodeId, origin: &Name, top: bool, audit: &mut Audit) {
        if self.nodes[root].color != Color::Black {
            audit.issues.push(format!("level below {origin} has a red root"));
        }

        let mut members = Vec::new();
        self.audit_subtree(root, origin, &mut members, audit);

        if top && members.len() > 1 {
            audit
                .issues
                .push(format!("top level holds {} nodes", members.len()));
        }
        for pair in members.windows(2) {
            let (a, b) = (self.nodes[pair[0]].labels(), self.nodes[pair[1]].labels());
            let cmp = full_compare(a, b);
            if cmp.order != Ordering::Less {
                audit.issues.push(format!(
                    "level below {origin}: {} is not before {}",
                    Name::display(a),
                    Name::display(b)
                ));
            }
            if cmp.relation != Relation::None {
                audit.issues.push(format!(
                    "level below {origin}: {} and {} share a suffix",
                    Name::display(a),
                    Name::display(b)
                ));
            }
        }

        for id in members {
            let node = &self.nodes[id];
            let labels = node.labels();
            match labels.last() {
                None => audit.issues.push(format!("node {id:?} has no labels")),
                Some(last) if last.is_root() != top => audit.issues.push(format!(
                    "node {} below {origin} is misplaced",
                    Name::display(labels)
                )),
                _ => {}
            }
            if labels[..labels.len().saturating_sub(1)]
                .iter()
                .any(|l| l.is_root())
            {
                audit.issues.push(format!(
                    "node {} holds an inner root label",
                    Name::display(labels)
                ));
            }
            if let Some(down) = node.down {
                let below = if top {
                    labels.to_vec()
                } else {
                    [labels, origin.labels()].concat()
                };
                let below = Name::from_labels_unchecked(below);
                self.audit_level(down, &below, false, audit);
            }
        }
    }

    /// Collects the level's nodes in order and returns the black height.
    fn audit_subtree(
        &self,
        id: NodeId,
        origin: &Name,
        members: &mut Vec<NodeId>,
        audit: &mut Audit,
    ) -> usize {
        let node = &self.nodes[id];
        audit.reachable += 1;
        if node.has_data() {
            audit.data_nodes += 1;
        }
        if node.color == Color::Red {
            for child in [node.left, node.right].into_iter().flatten() {
                if self.nodes[child].color == Color::Red {
                    audit.issues.push(format!(
                        "level below {origin}: red node {} has a red child",
                        Name::display(node.labels())
                    ));
                }
            }
        }

        let left = node
            .left
            .map_or(1, |l| self.audit_subtree(l, origin, members, audit));
        members.push(id);
        let right = node
            .right
            .map_or(1, |r| self.audit_subtree(r, origin, members, audit));
        if left != right {
            audit.issues.push(format!(
                "level below {origin}: black heights {left} and {right} differ under {}",
                Name::display(node.labels())
            ));
        }
        left + usize::from(node.color == Color::Black)
    }

    /// Checks that the tree is as compressed as deletions leave it: every
    /// node has data, a `down` level or a callback flag, and a bare node
    /// without data or flag owns a level of at least two nodes.
    pub fn check_compression(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            stack.extend([node.left, node.right, node.down].into_iter().flatten());
            if node.has_data() || node.find_callback {
                continue;
            }
            let name = Name::display(node.labels());
            match node.down {
                None => issues.push(format!("node {name} is an empty leaf")),
                Some(down) => {
                    let only = &self.nodes[down];
                    if only.left.is_none() && only.right.is_none() {
                        issues.push(format!("node {name} could be joined with its only child"));
                    }
                }
            }
        }
        issues
    }
}
