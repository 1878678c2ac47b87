//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Helpers for the data-path subset used by datastore change records.
//!
//! A data path is a sequence of `/`-separated nodes, each one optionally
//! prefixed by its module name (`ietf-ip:ipv4`) and optionally followed by
//! one or more list key predicates (`address[ip='10.0.0.1']`). Predicate
//! values may be single-quoted, double-quoted or bare.

// A single node of a data path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathNode<'a> {
    pub module: Option<&'a str>,
    pub name: &'a str,
    pub keys: Vec<(&'a str, &'a str)>,
}

// ===== impl PathNode =====

impl<'a> PathNode<'a> {
    pub fn parse(node: &'a str) -> PathNode<'a> {
        let (ident, mut rest) = match node.find('[') {
            Some(pos) => node.split_at(pos),
            None => (node, ""),
        };
        let (module, name) = match ident.split_once(':') {
            Some((module, name)) => (Some(module), name),
            None => (None, ident),
        };

        let mut keys = vec![];
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = predicate_end(stripped) else {
                break;
            };
            let predicate = &stripped[..end];
            if let Some((key, value)) = predicate.split_once('=') {
                keys.push((strip_module(key.trim()), unquote(value.trim())));
            }
            rest = &stripped[end + 1..];
        }

        PathNode { module, name, keys }
    }

    // Returns the value of the given key predicate.
    pub fn key(&self, key: &str) -> Option<&'a str> {
        self.keys
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
    }
}

impl std::fmt::Display for PathNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.keys {
            write!(f, "[{key}='{value}']")?;
        }
        Ok(())
    }
}

// ===== helper functions =====

// Returns the position of the closing bracket of a predicate, honoring quoted
// values.
fn predicate_end(predicate: &str) -> Option<usize> {
    let mut quote = None;
    for (pos, ch) in predicate.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), ch) if q == ch => quote = None,
            (None, ']') => return Some(pos),
            _ => (),
        }
    }
    None
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(value) = value
            .strip_prefix(quote)
            .and_then(|value| value.strip_suffix(quote))
        {
            return value;
        }
    }
    value
}

// Returns the offset of a node within the path it was split from.
fn offset_of(path: &str, node: &str) -> usize {
    node.as_ptr() as usize - path.as_ptr() as usize
}

fn strip_module(ident: &str) -> &str {
    ident.split_once(':').map(|(_, name)| name).unwrap_or(ident)
}

// ===== global functions =====

// Splits a data path into its nodes, ignoring separators found inside
// predicates.
pub fn split(path: &str) -> Vec<&str> {
    let mut nodes = vec![];
    let mut depth = 0;
    let mut quote = None;
    let mut start = 0;

    for (pos, ch) in path.char_indices() {
        match (quote, ch) {
            (Some(q), ch) if q == ch => quote = None,
            (Some(_), _) => (),
            (None, '\'' | '"') if depth > 0 => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth -= 1,
            (None, '/') if depth == 0 => {
                if pos > start {
                    nodes.push(&path[start..pos]);
                }
                start = pos + 1;
            }
            _ => (),
        }
    }
    if start < path.len() {
        nodes.push(&path[start..]);
    }

    nodes
}

// Parses all nodes of a data path.
pub fn parse(path: &str) -> Vec<PathNode<'_>> {
    split(path).into_iter().map(PathNode::parse).collect()
}

// Returns the schema path of a data path: predicates and module prefixes
// removed.
pub fn schema_path(path: &str) -> String {
    split(path)
        .into_iter()
        .map(|node| PathNode::parse(node).name)
        .fold(String::new(), |mut acc, name| {
            acc.push('/');
            acc.push_str(name);
            acc
        })
}

// Returns the canonical form of a data path, used to compare paths coming
// from different sources: module prefixes removed and predicate values
// single-quoted.
pub fn normalize(path: &str) -> String {
    parse(path)
        .into_iter()
        .fold(String::new(), |mut acc, node| {
            acc.push('/');
            acc.push_str(&node.to_string());
            acc
        })
}

// Extracts the value of a list key from a data path.
//
// Example: `key_value(path, "interface", "name")`.
pub fn key_value<'a>(path: &'a str, list: &str, key: &str) -> Option<&'a str> {
    parse(path)
        .into_iter()
        .find(|node| node.name == list)
        .and_then(|node| node.key(key))
}

// Returns the name of the last node of a data path, without module prefix or
// predicates.
pub fn node_name(path: &str) -> Option<&str> {
    split(path).last().map(|node| PathNode::parse(node).name)
}

// Returns the parent of a data path.
pub fn parent(path: &str) -> Option<&str> {
    let last = *split(path).last()?;
    let parent = path[..offset_of(path, last)].trim_end_matches('/');
    (!parent.is_empty()).then_some(parent)
}

// Returns the prefix of `path` that ends with the node named `list`,
// including its predicates.
//
// Example: the instance path of
// `/ietf-interfaces:interfaces/interface[name='eth0']/enabled` for the
// `interface` list is `/ietf-interfaces:interfaces/interface[name='eth0']`.
pub fn list_entry_path<'a>(path: &'a str, list: &str) -> Option<&'a str> {
    split(path)
        .into_iter()
        .find(|node| PathNode::parse(node).name == list)
        .map(|node| &path[..offset_of(path, node) + node.len()])
}

// Tells whether a data path matches a selector.
//
// The selector matches when both schema paths are equal and every key
// predicate present in the selector has the same value in the path.
pub fn matches(selector: &str, path: &str) -> bool {
    let selector = parse(selector);
    let path = parse(path);
    if selector.len() != path.len() {
        return false;
    }

    selector.iter().zip(path.iter()).all(|(sel, node)| {
        sel.name == node.name
            && sel
                .keys
                .iter()
                .all(|(key, value)| node.key(key) == Some(*value))
    })
}
