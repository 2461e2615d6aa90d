//! C6: the image assembler.
//!
//! C4 rewrites files independently and may drop any of them entirely
//! (`rewrite_file` returning `None`). This module decides which of the
//! *surviving* files actually belong in the output image — a file whose
//! own content survived is obviously kept, but a file that only existed
//! to be imported by something now-dropped should drop out too, unless
//! something else still depends on it.
//!
//! The decision has to run in reverse dependency order: whether file X
//! is still needed can depend on whether the files that import X are
//! still needed, which isn't known until *their* dependents have been
//! decided. Walking the image back-to-front (it arrives topologically
//! sorted, dependencies before dependents) and re-reversing at the end
//! keeps this a single linear pass instead of a fixpoint loop.

use crate::image::{Image, ImageFile};
use std::collections::BTreeSet;

/// One file's rewrite outcome, as produced by `rewrite::rewrite_file`
/// for every file in the input image (in input/DAG order).
pub struct RewriteOutcome {
    pub file: ImageFile,
    /// `true` if the file's own descriptors survived filtering (as
    /// opposed to surviving only as a dependency of something else).
    pub has_own_content: bool,
}

/// Assembles the final image from per-file rewrite outcomes.
///
/// A file is kept if it has its own surviving content, or if a
/// still-kept file in the (already-decided) remainder of the list
/// depends on it. Files newly reachable only as dependencies are
/// marked `is_import` in their metadata.
pub fn assemble_image(outcomes: Vec<RewriteOutcome>) -> Image {
    let mut needed: BTreeSet<String> = BTreeSet::new();
    let mut kept_reversed = Vec::with_capacity(outcomes.len());

    for outcome in outcomes.into_iter().rev() {
        let path = outcome.file.path().to_string();
        let required_by_dependent = needed.remove(&path);
        if !outcome.has_own_content && !required_by_dependent {
            continue;
        }
        let mut file = outcome.file;
        if !outcome.has_own_content {
            file.metadata.is_import = true;
        }
        for dep in &file.proto.dependency {
            needed.insert(dep.clone());
        }
        kept_reversed.push(file);
    }

    kept_reversed.reverse();
    Image::new(kept_reversed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::FileDescriptorProto;

    fn file(name: &str, deps: &[&str]) -> ImageFile {
        ImageFile::new(FileDescriptorProto {
            name: Some(name.to_string()),
            dependency: deps.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn unreferenced_import_only_file_is_dropped() {
        let outcomes = vec![
            RewriteOutcome {
                file: file("base.proto", &[]),
                has_own_content: false,
            },
            RewriteOutcome {
                file: file("top.proto", &[]),
                has_own_content: true,
            },
        ];
        let image = assemble_image(outcomes);
        assert_eq!(image.len(), 1);
        assert_eq!(image.files[0].path(), "top.proto");
    }

    #[test]
    fn dependency_of_surviving_file_is_kept_as_import() {
        let outcomes = vec![
            RewriteOutcome {
                file: file("base.proto", &[]),
                has_own_content: false,
            },
            RewriteOutcome {
                file: file("top.proto", &["base.proto"]),
                has_own_content: true,
            },
        ];
        let image = assemble_image(outcomes);
        assert_eq!(image.len(), 2);
        assert!(image.file("base.proto").unwrap().metadata.is_import);
        assert!(!image.file("top.proto").unwrap().metadata.is_import);
    }

    #[test]
    fn output_order_matches_input_dag_order() {
        let outcomes = vec![
            RewriteOutcome {
                file: file("a.proto", &[]),
                has_own_content: true,
            },
            RewriteOutcome {
                file: file("b.proto", &["a.proto"]),
                has_own_content: true,
            },
        ];
        let image = assemble_image(outcomes);
        let names: Vec<&str> = image.files.iter().map(|f| f.path()).collect();
        assert_eq!(names, vec!["a.proto", "b.proto"]);
    }
}
