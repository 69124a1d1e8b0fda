//==================================================
// File: trie/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Prefix cache for hierarchical identifiers
// Objective: Longest-prefix-match lookup of memoized base path bindings
//==================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Memoized outcome for an identifier prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    /// Files under this prefix live below the base path.
    Resolved(PathBuf),
    /// An exhaustive search for this prefix already failed.
    Unresolvable,
}

impl Binding {
    pub fn base_path(&self) -> Option<&Path> {
        match self {
            Binding::Resolved(path) => Some(path),
            Binding::Unresolvable => None,
        }
    }
}

/// Result of [`PrefixTrie::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrieMatch<'a> {
    Resolved { base: &'a Path, matched: usize },
    Unresolvable { matched: usize },
    NotFound,
}

impl TrieMatch<'_> {
    pub fn matched_len(&self) -> usize {
        match self {
            TrieMatch::Resolved { matched, .. } | TrieMatch::Unresolvable { matched } => *matched,
            TrieMatch::NotFound => 0,
        }
    }
}

/// One terminal entry, flattened for snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixBinding {
    pub prefix: Vec<String>,
    pub binding: Binding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TrieNode {
    terminal: Option<Binding>,
    children: HashMap<String, TrieNode>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.terminal.is_none() && self.children.is_empty()
    }
}

/// Nested map keyed by consecutive identifier segments.
///
/// A node may hold a terminal binding and children at the same time; the
/// deepest terminal on the identifier's path wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixTrie {
    root: TrieNode,
    len: usize,
}

impl PrefixTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = PrefixBinding>,
    {
        let mut trie = Self::new();
        for entry in entries {
            trie.bind(&entry.prefix, entry.binding);
        }
        trie
    }

    pub fn lookup<S: AsRef<str>>(&self, segments: &[S]) -> TrieMatch<'_> {
        let mut node = &self.root;
        let mut best = TrieMatch::NotFound;
        for (depth, segment) in segments.iter().enumerate() {
            match node.children.get(segment.as_ref()) {
                Some(child) => node = child,
                None => break,
            }
            match &node.terminal {
                Some(Binding::Resolved(base)) => {
                    best = TrieMatch::Resolved {
                        base,
                        matched: depth + 1,
                    }
                }
                Some(Binding::Unresolvable) => best = TrieMatch::Unresolvable { matched: depth + 1 },
                None => {}
            }
        }
        best
    }

    /// Exact terminal entry at `prefix`, ignoring ancestors.
    pub fn get<S: AsRef<str>>(&self, prefix: &[S]) -> Option<&Binding> {
        let mut node = &self.root;
        for segment in prefix {
            node = node.children.get(segment.as_ref())?;
        }
        node.terminal.as_ref()
    }

    /// Insert or overwrite the terminal entry at `prefix`.
    ///
    /// An empty prefix is ignored: the root never carries a binding.
    pub fn bind<S: AsRef<str>>(&mut self, prefix: &[S], binding: Binding) {
        if prefix.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for segment in prefix {
            node = node.children.entry(segment.as_ref().to_string()).or_default();
        }
        if node.terminal.replace(binding).is_none() {
            self.len += 1;
        }
    }

    /// Remove the terminal entry at `prefix`, pruning nodes left empty.
    pub fn invalidate<S: AsRef<str>>(&mut self, prefix: &[S]) -> Option<Binding> {
        let removed = Self::remove_in(&mut self.root, prefix);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn remove_in<S: AsRef<str>>(node: &mut TrieNode, prefix: &[S]) -> Option<Binding> {
        let Some((first, rest)) = prefix.split_first() else {
            return node.terminal.take();
        };
        let child = node.children.get_mut(first.as_ref())?;
        let removed = Self::remove_in(child, rest);
        if child.is_empty() {
            node.children.remove(first.as_ref());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::default();
        self.len = 0;
    }

    /// All terminal entries, sorted by prefix for stable snapshots.
    pub fn entries(&self) -> Vec<PrefixBinding> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<(Vec<String>, &TrieNode)> = vec![(Vec::new(), &self.root)];
        while let Some((prefix, node)) = stack.pop() {
            if let Some(binding) = &node.terminal {
                out.push(PrefixBinding {
                    prefix: prefix.clone(),
                    binding: binding.clone(),
                });
            }
            for (segment, child) in &node.children {
                let mut next = prefix.clone();
                next.push(segment.clone());
                stack.push((next, child));
            }
        }
        out.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        out
    }
}
