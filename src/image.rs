//! The image: an ordered, self-contained bundle of file descriptors.
//!
//! Mirrors the role of `grpcurl_core::descriptor::FileSource`'s
//! `DescriptorPool`, but ordered (a file's dependencies always precede
//! it, for deterministic output) and carrying per-file metadata (import
//! flag, module identity, commit, paths, unused-dependency indexes)
//! rather than a query-only pool.

use crate::proto::FileDescriptorProto;

/// Per-file metadata that rides alongside a `FileDescriptorProto` but is
/// not part of the descriptor itself.
#[derive(Clone, Debug, Default)]
pub struct ImageFileMetadata {
    /// True if this file is present only because something else in the
    /// image depends on it, i.e. it was not itself a filter target.
    pub is_import: bool,
    /// Identity of the module (package registry coordinate) this file
    /// was resolved from, if the image was built from a module-aware
    /// source. Opaque to the filter; copied through unchanged.
    pub module_identity: Option<String>,
    /// Commit id of the module revision this file came from, if any.
    pub commit: Option<String>,
    /// Path as seen outside the module root (e.g. on local disk).
    pub external_path: Option<String>,
    /// Path as addressed within the module (matches `FileDescriptorProto::name`
    /// in the common case, but is tracked separately since image
    /// construction may rewrite `name`).
    pub local_path: Option<String>,
    /// Indexes into `dependency` that were declared but never referenced.
    /// Cleared on output by the top-level filter entry point, since
    /// filtering can itself turn a previously-used dependency unused.
    pub unused_dependency_indexes: Vec<i32>,
    /// True if the file's `syntax` field was absent in the source and
    /// defaulted to `proto2` rather than being explicit.
    pub syntax_unspecified: bool,
}

/// A single file within an image: its descriptor plus metadata.
#[derive(Clone, Debug, Default)]
pub struct ImageFile {
    pub proto: FileDescriptorProto,
    pub metadata: ImageFileMetadata,
}

impl ImageFile {
    pub fn new(proto: FileDescriptorProto) -> Self {
        ImageFile {
            proto,
            metadata: ImageFileMetadata::default(),
        }
    }

    pub fn path(&self) -> &str {
        self.proto.name.as_deref().unwrap_or_default()
    }
}

/// A self-contained bundle of file descriptors, topologically ordered:
/// a file's dependencies always appear before it.
#[derive(Clone, Debug, Default)]
pub struct Image {
    pub files: Vec<ImageFile>,
}

impl Image {
    pub fn new(files: Vec<ImageFile>) -> Self {
        Image { files }
    }

    pub fn file(&self, path: &str) -> Option<&ImageFile> {
        self.files.iter().find(|f| f.path() == path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
