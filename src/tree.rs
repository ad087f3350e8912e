//! Rooted phylogenetic trees with branch lengths.
//!
//! Trees are built by external tools and read from the Newick format with [`Tree::from_newick`].
//! See [`query`] for resolving tree neighborhoods into sample sets.

use crate::{utils, Error, Result};

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub mod query;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A node in a [`Tree`].
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    /// Node label, if any.
    pub name: Option<String>,
    /// Parent node identifier, or [`None`] for the root.
    pub parent: Option<usize>,
    /// Child node identifiers in input order.
    pub children: Vec<usize>,
    /// Length of the branch to the parent.
    pub branch_length: f64,
}

impl TreeNode {
    fn new(parent: Option<usize>) -> Self {
        TreeNode { name: None, parent, children: Vec::new(), branch_length: 0.0 }
    }

    /// Returns `true` if the node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted tree stored as an arena of nodes.
///
/// Node identifiers are indexes in the arena.
/// Every parent has a smaller identifier than its children, and the root is node 0.
/// The tree is immutable once built.
///
/// # Examples
///
/// ```
/// use variant_base::tree::Tree;
///
/// let tree = Tree::from_newick("((A:1,B:2):0.5,C:3);").unwrap();
/// assert_eq!(tree.leaf_names(), vec!["A", "B", "C"]);
/// let a = tree.find_leaves("A")[0];
/// let b = tree.find_leaves("B")[0];
/// let c = tree.find_leaves("C")[0];
/// assert_eq!(tree.distance(a, b), 3.0);
/// assert_eq!(tree.distance(a, c), 4.5);
/// let ancestor = tree.common_ancestor(&[a, b]).unwrap();
/// assert_eq!(tree.leaves_under(ancestor), vec![a, b]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    // Distance from the root.
    depths: Vec<f64>,
    // Number of edges from the root.
    levels: Vec<usize>,
}

impl Tree {
    /// Identifier of the root node.
    pub const ROOT: usize = 0;

    /// Returns the number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree is empty.
    ///
    /// Trees built with [`Tree::from_newick`] always have at least one node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node with the given identifier.
    pub fn node(&self, id: usize) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    /// Returns an iterator over the leaf identifiers in ascending order.
    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().enumerate().filter(|(_, node)| node.is_leaf()).map(|(id, _)| id)
    }

    /// Returns the names of the named leaves in identifier order.
    pub fn leaf_names(&self) -> Vec<&str> {
        self.leaves().filter_map(|id| self.nodes[id].name.as_deref()).collect()
    }

    /// Returns the leaves with the given name.
    pub fn find_leaves(&self, name: &str) -> Vec<usize> {
        self.leaves().filter(|id| self.nodes[*id].name.as_deref() == Some(name)).collect()
    }

    /// Returns a mapping from leaf names to leaf identifiers.
    pub fn leaves_by_name(&self) -> BTreeMap<&str, Vec<usize>> {
        let mut result: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for id in self.leaves() {
            if let Some(name) = self.nodes[id].name.as_deref() {
                result.entry(name).or_default().push(id);
            }
        }
        result
    }

    /// Returns the sum of branch lengths from the root to the node.
    pub fn depth(&self, id: usize) -> f64 {
        self.depths[id]
    }

    /// Returns the most recent common ancestor of two nodes.
    pub fn lca(&self, mut a: usize, mut b: usize) -> usize {
        while self.levels[a] > self.levels[b] {
            a = self.nodes[a].parent.unwrap_or(Self::ROOT);
        }
        while self.levels[b] > self.levels[a] {
            b = self.nodes[b].parent.unwrap_or(Self::ROOT);
        }
        while a != b {
            a = self.nodes[a].parent.unwrap_or(Self::ROOT);
            b = self.nodes[b].parent.unwrap_or(Self::ROOT);
        }
        a
    }

    /// Returns the most recent common ancestor of the nodes, or [`None`] if there are no nodes.
    pub fn common_ancestor(&self, nodes: &[usize]) -> Option<usize> {
        let (first, rest) = nodes.split_first()?;
        Some(rest.iter().fold(*first, |acc, id| self.lca(acc, *id)))
    }

    /// Returns the patristic distance between two nodes.
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        let ancestor = self.lca(a, b);
        (self.depths[a] - self.depths[ancestor]) + (self.depths[b] - self.depths[ancestor])
    }

    /// Returns the leaves in the subtree rooted at the node in ascending order.
    pub fn leaves_under(&self, id: usize) -> Vec<usize> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if self.nodes[node].is_leaf() {
                result.push(node);
            }
            stack.extend(self.nodes[node].children.iter().copied());
        }
        result.sort_unstable();
        result
    }
}

//-----------------------------------------------------------------------------

/// Reading Newick trees.
impl Tree {
    /// Reads a tree in the Newick format from a file, which may be gzip-compressed.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let mut reader = utils::open_file(&filename)?;
        let mut newick = String::new();
        reader.read_to_string(&mut newick)?;
        Self::from_newick(&newick)
    }

    /// Parses a tree in the Newick format.
    ///
    /// Supports unquoted and single-quoted labels, branch lengths, and bracketed comments.
    /// Missing branch lengths are 0.
    /// The final semicolon is optional.
    pub fn from_newick(newick: &str) -> Result<Self> {
        let mut parser = NewickParser { input: newick.as_bytes(), offset: 0, nodes: Vec::new(), stack: Vec::new(), current: None };
        parser.parse()?;

        let nodes = parser.nodes;
        let mut depths = vec![0.0; nodes.len()];
        let mut levels = vec![0; nodes.len()];
        for id in 1..nodes.len() {
            if let Some(parent) = nodes[id].parent {
                depths[id] = depths[parent] + nodes[id].branch_length;
                levels[id] = levels[parent] + 1;
            }
        }
        Ok(Tree { nodes, depths, levels })
    }
}

struct NewickParser<'a> {
    input: &'a [u8],
    offset: usize,
    nodes: Vec<TreeNode>,
    // Open internal nodes.
    stack: Vec<usize>,
    // The node the next label or branch length belongs to.
    current: Option<usize>,
}

impl<'a> NewickParser<'a> {
    fn error(&self, message: &str) -> Error {
        Error::invalid_argument(format!("Invalid Newick tree at offset {}: {}", self.offset, message))
    }

    // Adds a node under the innermost open node.
    fn add_node(&mut self) -> Result<usize> {
        let parent = self.stack.last().copied();
        if parent.is_none() && !self.nodes.is_empty() {
            return Err(self.error("multiple roots"));
        }
        let id = self.nodes.len();
        self.nodes.push(TreeNode::new(parent));
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        Ok(id)
    }

    fn current_or_new(&mut self) -> Result<usize> {
        match self.current {
            Some(id) => Ok(id),
            None => {
                let id = self.add_node()?;
                self.current = Some(id);
                Ok(id)
            },
        }
    }

    fn parse(&mut self) -> Result<()> {
        while self.offset < self.input.len() {
            let c = self.input[self.offset];
            match c {
                b'(' => {
                    if self.current.is_some() {
                        return Err(self.error("unexpected '('"));
                    }
                    let id = self.add_node()?;
                    self.stack.push(id);
                    self.offset += 1;
                },
                b',' | b')' => {
                    if self.stack.is_empty() {
                        return Err(self.error("unbalanced parentheses"));
                    }
                    self.current_or_new()?;
                    self.current = if c == b')' { self.stack.pop() } else { None };
                    self.offset += 1;
                },
                b':' => {
                    let id = self.current_or_new()?;
                    self.offset += 1;
                    self.nodes[id].branch_length = self.branch_length()?;
                },
                b';' => {
                    self.offset += 1;
                    if self.input[self.offset..].iter().any(|x| !x.is_ascii_whitespace()) {
                        return Err(self.error("data after the end of the tree"));
                    }
                    break;
                },
                b'[' => self.skip_comment()?,
                _ if c.is_ascii_whitespace() => self.offset += 1,
                _ => {
                    let label = self.label()?;
                    let id = self.current_or_new()?;
                    if self.nodes[id].name.is_some() {
                        return Err(self.error("unexpected label"));
                    }
                    self.nodes[id].name = Some(label);
                },
            }
        }
        if !self.stack.is_empty() {
            return Err(self.error("unbalanced parentheses"));
        }
        if self.nodes.is_empty() {
            return Err(self.error("empty tree"));
        }
        Ok(())
    }

    fn skip_comment(&mut self) -> Result<()> {
        let end = self.input[self.offset..].iter().position(|x| *x == b']').ok_or(self.error("unterminated comment"))?;
        self.offset += end + 1;
        Ok(())
    }

    fn label(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        if self.input[self.offset] == b'\'' {
            self.offset += 1;
            loop {
                match self.input.get(self.offset) {
                    Some(b'\'') if self.input.get(self.offset + 1) == Some(&b'\'') => {
                        bytes.push(b'\'');
                        self.offset += 2;
                    },
                    Some(b'\'') => {
                        self.offset += 1;
                        break;
                    },
                    Some(c) => {
                        bytes.push(*c);
                        self.offset += 1;
                    },
                    None => return Err(self.error("unterminated quoted label")),
                }
            }
        } else {
            while let Some(c) = self.input.get(self.offset) {
                if b"():,;[".contains(c) || c.is_ascii_whitespace() {
                    break;
                }
                bytes.push(*c);
                self.offset += 1;
            }
        }
        String::from_utf8(bytes).map_err(|_| self.error("label is not valid UTF-8"))
    }

    fn branch_length(&mut self) -> Result<f64> {
        while self.input.get(self.offset).map_or(false, |x| x.is_ascii_whitespace()) {
            self.offset += 1;
        }
        let start = self.offset;
        while let Some(c) = self.input.get(self.offset) {
            if !(c.is_ascii_digit() || b"+-.eE".contains(c)) {
                break;
            }
            self.offset += 1;
        }
        let value = std::str::from_utf8(&self.input[start..self.offset]).ok().and_then(|x| x.parse::<f64>().ok());
        value.ok_or(self.error("invalid branch length"))
    }
}

//-----------------------------------------------------------------------------
