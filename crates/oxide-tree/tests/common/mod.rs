#![allow(dead_code)]

use oxide_tree::{Node, Params};

/// Builds a tree where every pattern is its own value.
pub fn build(patterns: &[&'static str]) -> Node<&'static str> {
    let mut root = Node::new();
    for pattern in patterns {
        root.insert(pattern, *pattern)
            .unwrap_or_else(|e| panic!("Failed to insert: {pattern}\nError: {e}"));
    }
    root
}

/// Result of matching one path.
#[derive(Debug)]
pub struct Lookup {
    pub value: Option<&'static str>,
    pub full_path: String,
    pub params: Vec<(String, String)>,
    pub tsr: bool,
}

pub fn lookup(root: &Node<&'static str>, path: &str) -> Lookup {
    let mut params = Params::new();
    let mut skipped = Vec::new();
    let found = root.get_value(path, &mut params, &mut skipped, false);
    Lookup {
        value: found.value.copied(),
        full_path: found.full_path.to_string(),
        params: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        tsr: found.tsr,
    }
}

/// Asserts that `path` matches `pattern` with the given parameters.
pub fn assert_match(root: &Node<&'static str>, path: &str, pattern: &str, params: &[(&str, &str)]) {
    let found = lookup(root, path);
    assert_eq!(found.value, Some(pattern), "value for {path}");
    assert_eq!(found.full_path, pattern, "full path for {path}");
    let expected: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    assert_eq!(found.params, expected, "params for {path}");
}

pub fn assert_miss(root: &Node<&'static str>, path: &str, tsr: bool) {
    let found = lookup(root, path);
    assert_eq!(found.value, None, "expected no match for {path}, got {found:?}");
    assert_eq!(found.tsr, tsr, "tsr for {path}");
}
