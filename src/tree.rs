//! The command tree.
//!
//! Nodes live in an arena owned by [`CommandTree`] and are addressed by
//! [`NodeId`]. Parent links are plain handles, so a node never owns its parent.
//! Removing a node detaches it without destroying it: the detached subtree can
//! be inspected, edited and attached again. Clearing the tree drops every node
//! and invalidates all handles issued before.

use crate::command::Command;
use crate::error::{EngineResult, PathError, TreeError};
use crate::registry::Registry;
use regex::Regex;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::OnceLock;

/// Handle to a node of a [`CommandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    epoch: u64,
}

#[derive(Debug)]
struct Node {
    command: Command,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Command nodes arranged by block nesting.
#[derive(Debug, Default)]
pub struct CommandTree {
    nodes: Vec<Node>,
    head: Option<NodeId>,
    size: usize,
    epoch: u64,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached nodes, head included.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    /// Puts `command` into the arena without attaching it.
    pub fn create(&mut self, command: Command) -> NodeId {
        self.nodes.push(Node {
            command,
            parent: None,
            children: Vec::new(),
        });
        NodeId {
            index: self.nodes.len() - 1,
            epoch: self.epoch,
        }
    }

    /// Creates a node for `command` and attaches it under `parent`.
    pub fn insert(&mut self, parent: Option<NodeId>, command: Command) -> Result<NodeId, TreeError> {
        let id = self.create(command);
        self.add(parent, id)?;
        Ok(id)
    }

    /// Attaches the detached subtree rooted at `node`.
    ///
    /// An empty tree takes `node` as its head whatever `parent` is. Otherwise
    /// `node` becomes the last child of `parent`, which must be attached.
    pub fn add(&mut self, parent: Option<NodeId>, node: NodeId) -> Result<(), TreeError> {
        self.check(node)?;
        if self.slot(node).parent.is_some() || self.head == Some(node) {
            return Err(TreeError::AlreadyAttached(node));
        }
        let grown = self.descendant_count(node) + 1;

        if self.head.is_none() {
            self.head = Some(node);
            self.size = grown;
            return Ok(());
        }

        let parent = parent.ok_or(TreeError::MissingParent)?;
        self.check(parent)?;
        if !self.is_attached(parent) {
            return Err(TreeError::NotAttached(parent));
        }
        if self.ancestors(parent).any(|a| a == node) {
            return Err(TreeError::Cycle(node));
        }

        self.slot_mut(node).parent = Some(parent);
        self.slot_mut(parent).children.push(node);
        self.size += grown;
        Ok(())
    }

    /// Detaches `node` and its subtree. Removing the head clears the tree.
    pub fn remove(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.check(node)?;
        if self.head == Some(node) {
            self.clear();
            return Ok(());
        }
        if !self.is_attached(node) {
            return Err(TreeError::NotAttached(node));
        }
        if let Some(parent) = self.slot_mut(node).parent.take() {
            self.slot_mut(parent).children.retain(|c| *c != node);
        }
        self.size -= self.descendant_count(node) + 1;
        Ok(())
    }

    /// Detaches all children of `node` and returns them.
    pub fn remove_all_children(&mut self, node: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.check(node)?;
        if self.is_attached(node) {
            self.size -= self.descendant_count(node);
        }
        let children = std::mem::take(&mut self.slot_mut(node).children);
        for child in &children {
            self.slot_mut(*child).parent = None;
        }
        Ok(children)
    }

    /// Drops every node. Handles issued before are no longer valid.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.size = 0;
        self.epoch += 1;
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.check(node).is_ok()
    }

    /// `true` if `node` is the head or one of its descendants.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(node) && self.ancestors(node).last() == self.head
    }

    pub fn command(&self, node: NodeId) -> Option<&Command> {
        self.check(node).ok().map(|_| &self.slot(node).command)
    }

    pub fn command_mut(&mut self, node: NodeId) -> Option<&mut Command> {
        self.check(node).ok()?;
        Some(&mut self.slot_mut(node).command)
    }

    /// Parent of `node`; `None` for the head, detached roots and stale handles.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.check(node).ok().and_then(|_| self.slot(node).parent)
    }

    pub fn children(&self, node: NodeId) -> Option<&[NodeId]> {
        self.check(node).ok().map(|_| self.slot(node).children.as_slice())
    }

    /// Number of nodes below `node`.
    pub fn descendant_count(&self, node: NodeId) -> usize {
        if !self.contains(node) {
            return 0;
        }
        self.preorder(node).len() - 1
    }

    /// `node` followed by its subtree in pre-order.
    pub fn preorder(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(node) {
            return out;
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.slot(current).children.iter().rev().copied());
        }
        out
    }

    /// Resolves `path` relative to `from` (the path names children of `from`).
    pub fn get(&self, from: NodeId, path: &CPath) -> Option<NodeId> {
        self.check(from).ok()?;
        let mut current = from;
        for segment in path.segments() {
            current = self
                .slot(current)
                .children
                .iter()
                .copied()
                .filter(|c| self.slot(*c).command.name() == segment.name)
                .nth(segment.skip)?;
        }
        Some(current)
    }

    /// Resolves `path` relative to the head.
    pub fn find(&self, path: &CPath) -> Option<NodeId> {
        self.get(self.head?, path)
    }

    /// Executes `from` and its subtree in pre-order. The first failure aborts
    /// the traversal.
    pub fn execute(&self, from: NodeId, registry: &Registry, quotes: &Rc<[char]>) -> EngineResult {
        for node in self.preorder(from) {
            self.slot(node).command.execute(registry, quotes)?;
        }
        Ok(())
    }

    fn check(&self, node: NodeId) -> Result<(), TreeError> {
        if node.epoch == self.epoch && node.index < self.nodes.len() {
            Ok(())
        } else {
            Err(TreeError::UnknownNode(node))
        }
    }

    fn slot(&self, node: NodeId) -> &Node {
        &self.nodes[node.index]
    }

    fn slot_mut(&mut self, node: NodeId) -> &mut Node {
        &mut self.nodes[node.index]
    }

    /// `node` and then each of its ancestors.
    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), |n| self.slot(*n).parent)
    }
}

/// One step of a [`CPath`]: a child name and how many matches to skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub skip: usize,
}

/// Path to a node, e.g. `outer/inner[1]`.
///
/// `inner[1]` selects the second child named `inner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CPath {
    segments: Vec<Segment>,
}

impl CPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

fn segment_pattern() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| {
        Regex::new(r"^([^\[\]/]+)(?:\[(\d+)\])?$").expect("segment pattern is valid")
    })
}

impl FromStr for CPath {
    type Err = PathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = path
            .split('/')
            .map(|part| {
                let caps = segment_pattern()
                    .captures(part)
                    .ok_or_else(|| PathError::MalformedSegment(part.to_string()))?;
                let skip = match caps.get(2) {
                    Some(k) => k
                        .as_str()
                        .parse()
                        .map_err(|_| PathError::MalformedSegment(part.to_string()))?,
                    None => 0,
                };
                Ok(Segment {
                    name: caps[1].to_string(),
                    skip,
                })
            })
            .collect::<Result<Vec<_>, PathError>>()?;
        Ok(Self { segments })
    }
}

impl fmt::Display for CPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(&segment.name)?;
            if segment.skip > 0 {
                write!(f, "[{}]", segment.skip)?;
            }
        }
        Ok(())
    }
}
