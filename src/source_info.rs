//! C5: the `SourceCodeInfo` remapper.
//!
//! `SourceCodeInfo.location` is a flat list of `(path, span, comments)`
//! triples, each keyed by a source path into the file's descriptor
//! tree (see `paths.rs`). After C4 has rewritten a file and recorded
//! every deletion/reindex into a [`RemapTrie`], this module replays
//! those decisions against each location: a location whose path no
//! longer resolves (its declaration, or an ancestor of it, was deleted)
//! is dropped outright; everything else is kept with its path rewritten
//! and its comments cleared if the trie marked that exact path
//! `mark_no_comment`.
//!
//! Kept deliberately dumb: this module makes no filtering decisions of
//! its own, just replays ones C4 already made, which keeps it a single
//! straight-line pass over `location` with no descriptor-tree
//! recursion of its own.

use crate::remap::RemapTrie;
use prost_types::{source_code_info::Location, SourceCodeInfo};

/// Rewrites `info` using `trie`, which must be the same trie C4 built
/// while rewriting the file `info` came from.
pub fn remap_source_code_info(info: &SourceCodeInfo, trie: &mut RemapTrie) -> SourceCodeInfo {
    let mut location = Vec::with_capacity(info.location.len());
    for loc in &info.location {
        let Some(new_path) = trie.new_path(&loc.path) else {
            continue;
        };
        let mut new_loc = Location {
            path: new_path,
            span: loc.span.clone(),
            leading_comments: loc.leading_comments.clone(),
            trailing_comments: loc.trailing_comments.clone(),
            leading_detached_comments: loc.leading_detached_comments.clone(),
        };
        if trie.comment_dropped(&loc.path) {
            new_loc.leading_comments = None;
            new_loc.trailing_comments = None;
            new_loc.leading_detached_comments = Vec::new();
        }
        location.push(new_loc);
    }
    SourceCodeInfo { location }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(path: Vec<i32>) -> Location {
        Location {
            path,
            span: vec![1, 0, 1],
            leading_comments: Some("a comment".into()),
            trailing_comments: None,
            leading_detached_comments: Vec::new(),
        }
    }

    #[test]
    fn dropped_declaration_drops_its_location() {
        let mut trie = RemapTrie::new();
        trie.mark_deleted(&[4, 0]);
        let info = SourceCodeInfo {
            location: vec![loc(vec![4, 0]), loc(vec![4, 1])],
        };
        let remapped = remap_source_code_info(&info, &mut trie);
        assert_eq!(remapped.location.len(), 1);
        assert_eq!(remapped.location[0].path, vec![4, 0]);
    }

    #[test]
    fn no_comment_mark_clears_comments_but_keeps_location() {
        let mut trie = RemapTrie::new();
        trie.mark_no_comment(&[12]);
        let info = SourceCodeInfo {
            location: vec![loc(vec![12])],
        };
        let remapped = remap_source_code_info(&info, &mut trie);
        assert_eq!(remapped.location.len(), 1);
        assert_eq!(remapped.location[0].leading_comments, None);
    }
}
