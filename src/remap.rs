//! C1: the source-path remap trie.
//!
//! When the rewriter (C4) drops or reorders an element of a repeated
//! field (a message, a field, an enum value, ...), every `SourceCodeInfo
//! .Location.path` that addressed that element, or anything nested
//! beneath it, needs to follow along: indices shift down to close the
//! gap left by deletions, and a path whose owning element was deleted
//! outright has nowhere to go and is dropped. Rather than thread that
//! bookkeeping through the rewriter itself, C4 records each decision
//! here as it walks the tree, and C5 replays `new_path` once per
//! original location afterward.
//!
//! A source path is a flat `[tag, index, tag, index, ...]` list (see
//! `paths.rs`); this trie is keyed the same way, one trie level per path
//! element, with the list-index levels additionally holding the old→new
//! index mapping for whichever repeated field that level addresses.

use crate::paths::SourcePath;
use std::collections::BTreeMap;

#[derive(Default)]
struct ListEntry {
    /// `None` until explicitly moved or until the trie is resolved.
    new_index: Option<i32>,
    deleted: bool,
    no_comment: bool,
    child: TrieNode,
}

#[derive(Default)]
struct ListRemap {
    /// Keyed by old index; `BTreeMap` keeps survivors in old-index order,
    /// which is exactly the order `resolve` assigns default new indices in.
    entries: BTreeMap<i32, ListEntry>,
    resolved: bool,
}

impl ListRemap {
    fn entry(&mut self, old_index: i32) -> &mut ListEntry {
        self.resolved = false;
        self.entries.entry(old_index).or_default()
    }

    /// Assigns a default new index (old-order rank among survivors) to
    /// every entry that wasn't given an explicit one via `mark_moved`.
    /// Idempotent; re-run lazily whenever a lookup follows a mutation.
    fn resolve(&mut self) {
        if self.resolved {
            return;
        }
        let mut next = 0;
        for entry in self.entries.values_mut() {
            if entry.deleted {
                continue;
            }
            if entry.new_index.is_none() {
                entry.new_index = Some(next);
            }
            next = entry.new_index.unwrap() + 1;
        }
        self.resolved = true;
    }
}

#[derive(Default)]
struct TrieNode {
    /// Keyed by the tag of the repeated field this level of the tree
    /// addresses (a node may have more than one, e.g. a message has
    /// both a `field` list and a `nested_type` list).
    lists: BTreeMap<i32, ListRemap>,
}

impl TrieNode {
    fn list(&mut self, tag: i32) -> &mut ListRemap {
        self.lists.entry(tag).or_default()
    }
}

/// The remap trie itself. One instance per file being rewritten.
#[derive(Default)]
pub struct RemapTrie {
    root: TrieNode,
}

/// Whether `tag` addresses a *repeated* field — the only field tags
/// this trie ever walks through that consume `(tag, index)` pairs.
/// Every other tag it sees addresses a singular slot (an `..._OPTIONS`
/// bag, `syntax`, `package`, or — one level further down — a custom
/// option's extension field number) and consumes just the bare tag,
/// with no following index, since there's only ever one instance to
/// address. This has to be a fixed table rather than inferred from
/// path parity: a path can carry more than one bare tag in a row (a
/// message's `options` bag, tag 7, followed by a custom option's
/// extension number nested inside it), so overall length alone can't
/// tell a caller how many trailing elements are bare.
fn tag_is_list(tag: i32) -> bool {
    use crate::paths::*;
    matches!(
        tag,
        FILE_MESSAGE_TYPE
            | FILE_ENUM_TYPE
            | FILE_SERVICE
            | FILE_EXTENSION
            | FILE_DEPENDENCY
            | FILE_PUBLIC_DEPENDENCY
            | FILE_WEAK_DEPENDENCY
            | MESSAGE_FIELD
            | MESSAGE_NESTED_TYPE
            | MESSAGE_ENUM_TYPE
            | MESSAGE_EXTENSION_RANGE
            | MESSAGE_EXTENSION
            | MESSAGE_ONEOF_DECL
            | MESSAGE_RESERVED_RANGE
            | MESSAGE_RESERVED_NAME
            | ENUM_VALUE
            | SERVICE_METHOD
    )
}

/// The reserved list index a singular field's lone entry is filed under.
/// Singular fields never move or reorder, so there is nothing the usual
/// old-order-rank machinery needs to do beyond delete/no-comment marking.
const SINGULAR: i32 = 0;

impl RemapTrie {
    pub fn new() -> Self {
        RemapTrie::default()
    }

    /// Walks (creating as needed) the chain of trie nodes for `path`,
    /// returning the final list-entry so callers can mark it.
    fn entry_for(&mut self, path: &[i32]) -> &mut ListEntry {
        assert!(!path.is_empty(), "empty source path");
        let mut node = &mut self.root;
        let mut i = 0;
        loop {
            let tag = path[i];
            if tag_is_list(tag) {
                let index = path[i + 1];
                let is_last = i + 2 == path.len();
                let entry = node.list(tag).entry(index);
                if is_last {
                    return entry;
                }
                node = &mut entry.child;
                i += 2;
            } else {
                let is_last = i + 1 == path.len();
                let entry = node.list(tag).entry(SINGULAR);
                if is_last {
                    return entry;
                }
                node = &mut entry.child;
                i += 1;
            }
        }
    }

    /// Records that `path` merely exists, without yet marking it deleted,
    /// moved, or comment-stripped. Useful to guarantee a stable default
    /// new index for an element that survives untouched.
    pub fn insert(&mut self, path: &[i32]) {
        self.entry_for(path);
    }

    pub fn mark_deleted(&mut self, path: &[i32]) {
        self.entry_for(path).deleted = true;
    }

    /// Overrides the default old-order new index with an explicit one,
    /// for rewrites that reorder elements rather than merely remove some.
    pub fn mark_moved(&mut self, path: &[i32], new_index: i32) {
        self.entry_for(path).new_index = Some(new_index);
    }

    /// Marks that the comment attached to this exact path should be
    /// dropped even though the element itself survives. The association
    /// between a comment and its declaration is by source path, so a
    /// declaration that gets renumbered without this mark keeps its
    /// comment; one that's reinterpreted — e.g. the file's `syntax`
    /// leading comment when syntax itself was cleared — does not.
    pub fn mark_no_comment(&mut self, path: &[i32]) {
        self.entry_for(path).no_comment = true;
    }

    /// Resolves `old_path` to its new location, or `None` if the path
    /// (or an ancestor of it) was deleted. O(depth): one `BTreeMap`
    /// lookup per path element.
    pub fn new_path(&mut self, old_path: &[i32]) -> Option<SourcePath> {
        let mut result = SourcePath::with_capacity(old_path.len());
        let mut node = &mut self.root;
        let mut i = 0;
        while i < old_path.len() {
            let tag = old_path[i];
            if tag_is_list(tag) {
                let index = old_path[i + 1];
                let list = match node.lists.get_mut(&tag) {
                    Some(list) => list,
                    // No trie entry at this tag means nothing under it
                    // was ever touched: the rest of the path keeps its
                    // original shape.
                    None => {
                        result.extend_from_slice(&old_path[i..]);
                        return Some(result);
                    }
                };
                list.resolve();
                let entry = match list.entries.get_mut(&index) {
                    Some(entry) => entry,
                    None => {
                        result.extend_from_slice(&old_path[i..]);
                        return Some(result);
                    }
                };
                if entry.deleted {
                    return None;
                }
                result.push(tag);
                result.push(entry.new_index.unwrap_or(index));
                node = &mut entry.child;
                i += 2;
            } else {
                let list = match node.lists.get_mut(&tag) {
                    Some(list) => list,
                    None => {
                        result.extend_from_slice(&old_path[i..]);
                        return Some(result);
                    }
                };
                let entry = match list.entries.get_mut(&SINGULAR) {
                    Some(entry) => entry,
                    None => {
                        result.extend_from_slice(&old_path[i..]);
                        return Some(result);
                    }
                };
                if entry.deleted {
                    return None;
                }
                result.push(tag);
                node = &mut entry.child;
                i += 1;
            }
        }
        Some(result)
    }

    /// True if `path` or any ancestor of it was marked `mark_no_comment`.
    pub fn comment_dropped(&mut self, path: &[i32]) -> bool {
        let mut node = &mut self.root;
        let mut i = 0;
        while i < path.len() {
            let tag = path[i];
            if tag_is_list(tag) {
                let index = path[i + 1];
                let list = match node.lists.get_mut(&tag) {
                    Some(list) => list,
                    None => return false,
                };
                let entry = match list.entries.get_mut(&index) {
                    Some(entry) => entry,
                    None => return false,
                };
                if entry.no_comment {
                    return true;
                }
                node = &mut entry.child;
                i += 2;
            } else {
                let list = match node.lists.get_mut(&tag) {
                    Some(list) => list,
                    None => return false,
                };
                let entry = match list.entries.get_mut(&SINGULAR) {
                    Some(entry) => entry,
                    None => return false,
                };
                if entry.no_comment {
                    return true;
                }
                node = &mut entry.child;
                i += 1;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_path_is_unchanged() {
        let mut trie = RemapTrie::new();
        assert_eq!(trie.new_path(&[4, 2, 2, 0]), Some(vec![4, 2, 2, 0]));
    }

    #[test]
    fn deleted_element_has_no_new_path() {
        let mut trie = RemapTrie::new();
        trie.mark_deleted(&[4, 1]);
        assert_eq!(trie.new_path(&[4, 1]), None);
        assert_eq!(trie.new_path(&[4, 1, 2, 0]), None);
    }

    #[test]
    fn deleting_earlier_sibling_shifts_later_indices_down() {
        let mut trie = RemapTrie::new();
        trie.insert(&[4, 0]);
        trie.insert(&[4, 1]);
        trie.insert(&[4, 2]);
        trie.mark_deleted(&[4, 0]);
        assert_eq!(trie.new_path(&[4, 0]), None);
        assert_eq!(trie.new_path(&[4, 1]), Some(vec![4, 0]));
        assert_eq!(trie.new_path(&[4, 2]), Some(vec![4, 1]));
    }

    #[test]
    fn nested_path_follows_parent_reindex() {
        let mut trie = RemapTrie::new();
        trie.mark_deleted(&[4, 0]);
        assert_eq!(trie.new_path(&[4, 1, 2, 3]), Some(vec![4, 0, 2, 3]));
    }

    #[test]
    fn explicit_move_overrides_default_order() {
        let mut trie = RemapTrie::new();
        trie.mark_moved(&[4, 0], 2);
        trie.mark_moved(&[4, 1], 0);
        trie.mark_moved(&[4, 2], 1);
        assert_eq!(trie.new_path(&[4, 0]), Some(vec![4, 2]));
        assert_eq!(trie.new_path(&[4, 1]), Some(vec![4, 0]));
    }

    #[test]
    fn no_comment_mark_on_a_singular_field_is_readable_back() {
        let mut trie = RemapTrie::new();
        trie.mark_no_comment(&[12]);
        assert!(trie.comment_dropped(&[12]));
        assert_eq!(trie.new_path(&[12]), Some(vec![12]));
    }

    #[test]
    fn deleted_singular_field_under_a_list_entry_has_no_new_path() {
        // path [4, 0, 7] addresses message_type[0]'s `options` bag: a
        // singular field (tag 7, no index) nested under a list entry
        // (tag 4, index 0). Deleting the whole bag also takes out
        // whatever's nested under it, e.g. a custom option at [4, 0, 7,
        // 50000] — a second bare tag chained after the first, not a
        // list index sibling of it.
        let mut trie = RemapTrie::new();
        trie.insert(&[4, 0]);
        trie.mark_deleted(&[4, 0, 7]);
        assert_eq!(trie.new_path(&[4, 0, 7]), None);
        assert_eq!(trie.new_path(&[4, 0, 7, 50000]), None);
        assert_eq!(trie.new_path(&[4, 0]), Some(vec![4, 0]));
    }

    #[test]
    fn deleting_one_custom_option_leaves_its_sibling_under_the_same_options_bag() {
        // [8, 50000] and [8, 50001]: file options (tag 8, bare) holding
        // two distinct extension fields (also bare, chained beneath it).
        let mut trie = RemapTrie::new();
        trie.mark_deleted(&[8, 50000]);
        assert_eq!(trie.new_path(&[8, 50000]), None);
        assert_eq!(trie.new_path(&[8, 50001]), Some(vec![8, 50001]));
    }
}
