//! Filters a protobuf descriptor image down to the transitive closure
//! of a type selection.
//!
//! The crate is organized as six small components strung together by
//! [`filter_image`], the single entry point most callers need:
//!
//! - [`index`] (C2) builds a name/location index over the image once.
//! - [`closure`] (C3) walks that index to decide, per declaration,
//!   whether it survives in full, survives as scaffolding around
//!   something nested, or is dropped.
//! - [`rewrite`] (C4) applies that decision per file, producing a
//!   filtered descriptor tree and recording every index shift.
//! - [`source_info`] (C5) replays those shifts against `SourceCodeInfo`.
//! - [`assemble`] (C6) decides which filtered files actually belong in
//!   the output image.
//! - [`remap`] (C1) is the trie C4 and C5 share to do that replay.
//!
//! See `DESIGN.md` for how each module is grounded and which open
//! questions were decided which way.

pub mod assemble;
pub mod closure;
pub mod error;
pub mod image;
pub mod index;
pub mod options;
pub mod paths;
pub mod proto;
pub mod remap;
pub mod rewrite;
pub mod source_info;

pub use closure::{FilterOptions, InclusionMode};
pub use error::{FilterError, Result};
pub use image::{Image, ImageFile, ImageFileMetadata};

use index::ImageIndex;
use proto::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto, ServiceDescriptorProto};

/// Filters `image` according to `opts`, returning a new, self-contained
/// image holding the transitive closure of `opts.include_types` minus
/// `opts.exclude_types`, with custom options pared down per
/// `opts.include_options`/`opts.exclude_options`.
///
/// An empty `include_types` selects the whole image, so `filter_image`
/// with default options is a (mostly) identity transform — it still
/// clears each file's `unused_dependency_indexes`, per the recompute-
/// on-output decision in `DESIGN.md`.
pub fn filter_image(image: &Image, opts: &FilterOptions) -> error::Result<Image> {
    let idx = index::new_index_for_image(image)?;

    let selection = closure::compute(
        &idx,
        opts,
        |fqn| lookup_message(image, &idx, fqn),
        |fqn| lookup_enum(image, &idx, fqn),
        |fqn| lookup_service(image, &idx, fqn),
        |fqn| lookup_field(image, &idx, fqn),
    )?;

    let mut outcomes = Vec::with_capacity(image.files.len());
    for file in &image.files {
        match rewrite::rewrite_file(&file.proto, &idx, &selection)? {
            Some((mut new_proto, mut trie)) => {
                if let Some(info) = &file.proto.source_code_info {
                    new_proto.source_code_info = Some(source_info::remap_source_code_info(info, &mut trie));
                }
                let mut metadata = file.metadata.clone();
                metadata.unused_dependency_indexes = Vec::new();
                outcomes.push(assemble::RewriteOutcome {
                    file: ImageFile {
                        proto: new_proto,
                        metadata,
                    },
                    has_own_content: true,
                });
            }
            None => {
                outcomes.push(assemble::RewriteOutcome {
                    file: file.clone(),
                    has_own_content: false,
                });
            }
        }
    }

    Ok(assemble::assemble_image(outcomes))
}

/// Convenience wrapper: filters `image` down to the closure of `types`
/// with every other option at its default.
pub fn filter_by_types(image: &Image, types: &[&str]) -> error::Result<Image> {
    filter_by_types_with_options(image, types, FilterOptions::default())
}

/// Like [`filter_by_types`], but starting from caller-supplied options
/// (whose `include_types` is overwritten with `types`).
pub fn filter_by_types_with_options(image: &Image, types: &[&str], mut opts: FilterOptions) -> error::Result<Image> {
    opts.include_types = types.iter().map(|s| s.to_string()).collect();
    filter_image(image, &opts)
}

/// Strips the named custom options from every descriptor in `image`
/// without otherwise narrowing the type selection.
pub fn exclude_options(image: &Image, extension_names: &[&str]) -> error::Result<Image> {
    let mut opts = FilterOptions::default();
    opts.exclude_options = extension_names.iter().map(|s| s.to_string()).collect();
    filter_image(image, &opts)
}

fn lookup_message(image: &Image, idx: &ImageIndex, fqn: &str) -> Option<DescriptorProto> {
    let loc = idx.by_name(fqn)?;
    if loc.kind != index::DescriptorKind::Message {
        return None;
    }
    message_at_path(image, &loc.file, &loc.path)
}

fn lookup_enum(image: &Image, idx: &ImageIndex, fqn: &str) -> Option<EnumDescriptorProto> {
    let loc = idx.by_name(fqn)?;
    if loc.kind != index::DescriptorKind::Enum {
        return None;
    }
    let file = image.file(&loc.file)?;
    if loc.path.len() == 2 {
        if loc.path[0] != paths::FILE_ENUM_TYPE {
            return None;
        }
        return file.proto.enum_type.get(loc.path[1] as usize).cloned();
    }
    let (msg_path, last) = loc.path.split_at(loc.path.len() - 2);
    if last[0] != paths::MESSAGE_ENUM_TYPE {
        return None;
    }
    let msg = message_at_path(image, &loc.file, msg_path)?;
    msg.enum_type.get(last[1] as usize).cloned()
}

fn lookup_service(image: &Image, idx: &ImageIndex, fqn: &str) -> Option<ServiceDescriptorProto> {
    let loc = idx.by_name(fqn)?;
    if loc.kind != index::DescriptorKind::Service {
        return None;
    }
    if loc.path.len() != 2 || loc.path[0] != paths::FILE_SERVICE {
        return None;
    }
    image.file(&loc.file)?.proto.service.get(loc.path[1] as usize).cloned()
}

/// Looks up a field declaration by FQN — either a top-level `extend`
/// (`[FILE_EXTENSION, i]`) or a field/nested `extend` declared inside a
/// message (a message path followed by `[MESSAGE_FIELD|MESSAGE_EXTENSION,
/// i]`). Used by the known-extension sweep (`closure::compute`'s
/// `field_body`) to read an extension's payload type without fetching
/// its whole containing message.
fn lookup_field(image: &Image, idx: &ImageIndex, fqn: &str) -> Option<FieldDescriptorProto> {
    let loc = idx.by_name(fqn)?;
    if loc.kind != index::DescriptorKind::Field {
        return None;
    }
    let split_at = loc.path.len().checked_sub(2)?;
    let (container, last) = loc.path.split_at(split_at);
    let index_in_list = last[1] as usize;
    if container.is_empty() {
        if last[0] != paths::FILE_EXTENSION {
            return None;
        }
        return image.file(&loc.file)?.proto.extension.get(index_in_list).cloned();
    }
    let msg = message_at_path(image, &loc.file, container)?;
    if last[0] == paths::MESSAGE_FIELD {
        msg.field.get(index_in_list).cloned()
    } else if last[0] == paths::MESSAGE_EXTENSION {
        msg.extension.get(index_in_list).cloned()
    } else {
        None
    }
}

/// Walks `path` from a file's top-level `message_type` list down
/// through `nested_type` to find the `DescriptorProto` it addresses.
/// `path` must be a message path: `[FILE_MESSAGE_TYPE, i, (MESSAGE_NESTED_TYPE, j)*]`.
fn message_at_path(image: &Image, file: &str, path: &[i32]) -> Option<DescriptorProto> {
    let file = image.file(file)?;
    let mut chunks = path.chunks(2);
    let first = chunks.next()?;
    if first[0] != paths::FILE_MESSAGE_TYPE {
        return None;
    }
    let mut cur = file.proto.message_type.get(first[1] as usize)?.clone();
    for chunk in chunks {
        if chunk[0] != paths::MESSAGE_NESTED_TYPE {
            return None;
        }
        cur = cur.nested_type.get(chunk[1] as usize)?.clone();
    }
    Some(cur)
}

/// The protocol-wide reserved field-number range: no field in any
/// message may use a number inside it.
const RESERVED_SYSTEM_RANGE: (i32, i32) = (19000, 19999);
/// The highest field number a message may declare.
const MAX_FIELD_NUMBER: i32 = 536_870_911;

/// Walks every message — recursively through nested types — in the
/// named files and reports each one's free field-number ranges,
/// concatenated across messages and files in declaration order. Unlike
/// the rest of this crate, this utility does no filtering: it reuses
/// the descriptor walk to render ranges, not to decide what survives.
pub fn free_message_range_strings(file_paths: &[&str], image: &Image) -> Vec<String> {
    let mut out = Vec::new();
    for path in file_paths {
        let Some(file) = image.file(path) else { continue };
        for m in &file.proto.message_type {
            collect_message_free_ranges(m, &mut out);
        }
    }
    out
}

fn collect_message_free_ranges(m: &DescriptorProto, out: &mut Vec<String>) {
    out.extend(message_free_ranges(m));
    for nested in &m.nested_type {
        collect_message_free_ranges(nested, out);
    }
}

/// Computes the field-number ranges a message has neither declared,
/// reserved, nor opened up for extensions — the gaps a schema author
/// could still safely add a field into. Returned as human-readable
/// strings (`"100"` for a single free number, `"101 to 150"` for a
/// run), in ascending order. The protocol's own reserved system range
/// is treated as always unavailable, splitting any free run that would
/// otherwise span it.
fn message_free_ranges(m: &DescriptorProto) -> Vec<String> {
    let mut used: Vec<(i32, i32)> = Vec::new();
    for field in &m.field {
        if let Some(n) = field.number {
            used.push((n, n));
        }
    }
    for range in &m.extension_range {
        if let (Some(start), Some(end)) = (range.start, range.end) {
            used.push((start, end - 1));
        }
    }
    for range in &m.reserved_range {
        if let (Some(start), Some(end)) = (range.start, range.end) {
            used.push((start, end - 1));
        }
    }
    used.push(RESERVED_SYSTEM_RANGE);
    used.sort_unstable();

    let mut free = Vec::new();
    let mut next_free = 1;
    for (start, end) in used {
        if start > next_free {
            free.push((next_free, start - 1));
        }
        next_free = next_free.max(end + 1);
    }
    if next_free <= MAX_FIELD_NUMBER {
        free.push((next_free, MAX_FIELD_NUMBER));
    }

    free.into_iter()
        .map(|(start, end)| if start == end { start.to_string() } else { format!("{start} to {end}") })
        .collect()
}
