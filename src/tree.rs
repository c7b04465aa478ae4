use crate::models::FileNode;
use log::debug;
use std::collections::HashSet;

/// Builds the directory tree and its indented listing from relative,
/// `/`-separated paths. Callers pass the paths already sorted.
///
/// Each unique cumulative prefix is materialized once, in first-seen order.
/// A segment is a file only when it is the last one of its path. Repeated
/// full paths are skipped here without complaint.
pub fn build_tree<S: AsRef<str>>(paths: &[S]) -> (FileNode, String) {
    let mut root = FileNode::root();
    let mut listing = String::new();
    let mut seen: HashSet<String> = HashSet::new();

    for path in paths {
        let parts: Vec<&str> = path.as_ref().split('/').collect();
        let mut current_path = String::new();

        for (index, part) in parts.iter().enumerate() {
            if !current_path.is_empty() {
                current_path.push('/');
            }
            current_path.push_str(part);

            if !seen.insert(current_path.clone()) {
                continue;
            }

            listing.push_str(&"  ".repeat(index));
            listing.push_str("- ");
            listing.push_str(part);
            listing.push('\n');

            let node = if index == parts.len() - 1 {
                FileNode::file(part, &current_path)
            } else {
                FileNode::directory(part, &current_path)
            };

            // A parent that turned out to be a file has no children to attach to.
            if let Some(children) =
                find_node_mut(&mut root, &parts[..index]).and_then(|p| p.children.as_mut())
            {
                children.push(node);
            }
        }
    }

    debug!("Built tree with {} unique entries from {} paths.", seen.len(), paths.len());
    (root, listing)
}

fn find_node_mut<'a>(node: &'a mut FileNode, segments: &[&str]) -> Option<&'a mut FileNode> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(node);
    };
    let child = node.children.as_mut()?.iter_mut().find(|c| c.name == *first)?;
    find_node_mut(child, rest)
}
