//! The hierarchical value tree produced by a decode.
//!
//! Every field emitted through the cursor becomes a [`Node`]: either a leaf holding a
//! [`Scalar`], or a compound (struct or array) holding children. Each node carries the
//! exact [`BitRange`] it was decoded from, and compounds cover the union of their
//! children's ranges. Trees are immutable once the decode that built them returns;
//! query evaluators consume them through the read-only accessors on [`Node`].

use crate::{bitbuf::BitBuf, scalar::Scalar};

/// A half-open bit range `(start, len)` over the underlying bit source.
///
/// Zero-length ranges are legal and are used by synthesized value fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRange {
    /// First bit of the range
    pub start: u64,
    /// Length in bits
    pub len: u64,
}

impl BitRange {
    /// One past the last bit of the range.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// The three node shapes of a value tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    /// Named children, insertion order preserved, sibling names unique
    Struct,
    /// Integer-indexed children
    Array,
    /// A scalar with no children
    Leaf,
}

/// The payload of a node.
#[derive(Debug, Clone)]
pub enum Value {
    /// Ordered named children
    Struct(Vec<Node>),
    /// Ordered indexed children
    Array(Vec<Node>),
    /// A decoded scalar
    Leaf(Scalar),
}

/// One node of a decoded value tree.
///
/// Nodes under a struct parent carry a name; nodes under an array parent are
/// addressed by index and their name is the element name chosen by the format body.
/// A node decoded from a different bit source than its parent (a reassembled
/// buffer) carries that source in [`Node::buf`]; its range is relative to that
/// source, not to the enclosing tree's.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: Option<String>,
    pub(crate) range: BitRange,
    pub(crate) value: Value,
    pub(crate) errors: Vec<String>,
    pub(crate) buf: Option<BitBuf>,
}

impl Node {
    pub(crate) fn new(name: Option<String>, range: BitRange, value: Value) -> Self {
        Node {
            name,
            range,
            value,
            errors: Vec::new(),
            buf: None,
        }
    }

    /// The node's shape.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self.value {
            Value::Struct(_) => NodeKind::Struct,
            Value::Array(_) => NodeKind::Array,
            Value::Leaf(_) => NodeKind::Leaf,
        }
    }

    /// The node's name, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The bit range the node was decoded from.
    #[must_use]
    pub fn range(&self) -> BitRange {
        self.range
    }

    /// The node's children, in emission order. Empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        match &self.value {
            Value::Struct(children) | Value::Array(children) => children,
            Value::Leaf(_) => &[],
        }
    }

    /// The scalar of a leaf node.
    #[must_use]
    pub fn scalar(&self) -> Option<&Scalar> {
        match &self.value {
            Value::Leaf(s) => Some(s),
            _ => None,
        }
    }

    /// Look a child up by name under a struct node.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children().iter().find(|c| c.name() == Some(name))
    }

    /// A child by index.
    #[must_use]
    pub fn index(&self, i: usize) -> Option<&Node> {
        self.children().get(i)
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children().len()
    }

    /// True if the node has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children().is_empty()
    }

    /// Non-fatal warnings attached to this node during the decode.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The node's own bit source, set only on roots decoded from a different
    /// (reassembled) buffer than the enclosing tree.
    #[must_use]
    pub fn buf(&self) -> Option<&BitBuf> {
        self.buf.as_ref()
    }

    /// True if `other` has the same name, kind, and range, recursively.
    ///
    /// Scalars are ignored, which makes this the structural-equality check for
    /// comparing a decode against a re-decode or against a mapper-free decode.
    #[must_use]
    pub fn same_shape(&self, other: &Node) -> bool {
        if self.name != other.name || self.kind() != other.kind() || self.range != other.range {
            return false;
        }
        self.children().len() == other.children().len()
            && self
                .children()
                .iter()
                .zip(other.children())
                .all(|(a, b)| a.same_shape(b))
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.value {
            Value::Struct(children) | Value::Array(children) => Some(children),
            Value::Leaf(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Actual;

    fn leaf(name: &str, start: u64, len: u64) -> Node {
        Node::new(
            Some(name.to_string()),
            BitRange { start, len },
            Value::Leaf(Scalar::from(Actual::U64(0))),
        )
    }

    #[test]
    fn kind_names_render_lowercase() {
        assert_eq!(NodeKind::Struct.to_string(), "struct");
        assert_eq!(NodeKind::Array.to_string(), "array");
        assert_eq!(NodeKind::Leaf.to_string(), "leaf");
    }

    #[test]
    fn child_lookup_by_name() {
        let root = Node::new(
            None,
            BitRange { start: 0, len: 16 },
            Value::Struct(vec![leaf("a", 0, 8), leaf("b", 8, 8)]),
        );
        assert_eq!(root.child("b").unwrap().range().start, 8);
        assert!(root.child("c").is_none());
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn same_shape_ignores_scalars() {
        let a = leaf("x", 0, 4);
        let mut b = leaf("x", 0, 4);
        if let Value::Leaf(s) = &mut b.value {
            s.sym = Some("other".to_string());
        }
        assert!(a.same_shape(&b));

        let c = leaf("x", 0, 8);
        assert!(!a.same_shape(&c));
    }
}
