//! C4: the descriptor rewriter.
//!
//! Walks one file's descriptor tree and produces a filtered copy:
//! dropped declarations (mode `None`) are omitted, `Enclosing` messages
//! keep only the nested chain leading to something `Explicit`, fields
//! that reference an excluded type (or are themselves an excluded
//! extension) are dropped from their parent's field list, and surviving
//! options bags have their custom options pared down to whatever
//! [`Selection::has_option`] allows. Every deletion is simultaneously
//! recorded into a [`RemapTrie`](crate::remap::RemapTrie) so C5 can
//! replay the same decisions against `SourceCodeInfo` afterward;
//! survivors are always inserted too, since a deletion anywhere in a
//! list shifts every later sibling's index.
//!
//! Mutually recursive `remap_*` functions mirror the descriptor tree's
//! own recursive shape, the same structure
//! `grpcurl_core::descriptor_text::format_proto_file` used to walk a
//! `FileDescriptorProto` for human-readable output; here the walk
//! produces a new tree instead of text.

use crate::closure::{InclusionMode, Selection};
use crate::error::{FilterError, Result};
use crate::index::ImageIndex;
use crate::options::Options;
use crate::paths;
use crate::proto::descriptor_proto::{ExtensionRange, ReservedRange};
use crate::proto::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    MethodDescriptorProto, OneofDescriptorProto, ServiceDescriptorProto,
};
use crate::remap::RemapTrie;
use std::collections::{BTreeMap, BTreeSet};

/// Filters the custom options on one options bag, recording each
/// stripped extension's own source path into `trie` so C5 drops its
/// comment along with it (`options_path` is the bag's own path, e.g.
/// `[FILE_OPTIONS]`; an individual custom option lives one bare tag
/// further down, at `options_path + [extension_number]`).
///
/// Per §4.4, an options message that ends empty is deleted outright
/// rather than kept around as `Some(Options::default())`: if every
/// custom option is stripped and the known fields are all at their
/// default (nothing was ever set on them either), the whole node goes
/// and `options_path` itself is recorded as deleted.
fn filter_custom<T>(opts: &Option<Options<T>>, selection: &Selection, options_path: &[i32], trie: &mut RemapTrie) -> Option<Options<T>>
where
    T: Clone + Default + PartialEq,
{
    let opts = opts.as_ref()?;
    let custom = opts
        .custom
        .iter()
        .filter(|c| {
            let keep = selection.has_option(&c.extension_name);
            if !keep {
                trie.mark_deleted(&paths::field(options_path, c.number));
            }
            keep
        })
        .cloned()
        .collect::<Vec<_>>();
    let known = opts.known.clone();
    let empty = Options { known, custom };
    if empty.is_empty_of_custom() && empty.known == T::default() {
        trie.mark_deleted(options_path);
        return None;
    }
    Some(empty)
}

/// Shared context threaded through the recursive walk: the index (for
/// path-to-FQN lookups), the selection, and the file path the walk is
/// currently inside (the index keys locations by `(file, path)`).
struct Ctx<'a> {
    index: &'a ImageIndex,
    selection: &'a Selection<'a>,
    file: &'a str,
}

impl<'a> Ctx<'a> {
    fn mode_at(&self, path: &[i32]) -> InclusionMode {
        match self.index.by_location(self.file, path) {
            Some(fqn) => self.selection.mode(fqn),
            None => InclusionMode::None,
        }
    }

    fn fqn_at(&self, path: &[i32]) -> Option<&str> {
        self.index.by_location(self.file, path)
    }
}

/// Whether `f` (declared at `path`) must be dropped from its parent's
/// field list, per the two field-drop rules: an extension field whose
/// own FQN was explicitly excluded, or any field whose message/enum/
/// group type was excluded. Scalar fields of a surviving (even merely
/// `Enclosing`) message otherwise always survive.
fn field_dropped(f: &FieldDescriptorProto, path: &[i32], ctx: &Ctx) -> bool {
    if f.is_extension() {
        if let Some(fqn) = ctx.fqn_at(path) {
            if ctx.selection.is_excluded(fqn) {
                return true;
            }
        }
    }
    if f.is_message_or_enum() {
        if let Some(type_name) = &f.type_name {
            let referenced = paths::normalize_type_name(type_name);
            if !ctx.selection.has_type(referenced) {
                return true;
            }
        }
    }
    false
}

/// Rewrites one file against `selection`, returning the filtered
/// descriptor and the trie C5 replays. Returns `Ok(None)` if the whole
/// file has nothing left worth keeping: a file survives if and only if
/// at least one of its top-level declarations does.
pub fn rewrite_file<'a>(
    file: &FileDescriptorProto,
    index: &'a ImageIndex,
    selection: &'a Selection<'a>,
) -> Result<Option<(FileDescriptorProto, RemapTrie)>> {
    let path = file.name.clone().unwrap_or_default();
    let ctx = Ctx {
        index,
        selection,
        file: &path,
    };
    let mut trie = RemapTrie::new();

    let message_type = remap_message_list(&file.message_type, &[], paths::FILE_MESSAGE_TYPE, &ctx, &mut trie)?;
    let enum_type = remap_enum_list(&file.enum_type, &[], paths::FILE_ENUM_TYPE, &ctx, &mut trie);
    let service = remap_service_list(&file.service, &[], paths::FILE_SERVICE, &ctx, &mut trie)?;
    let extension = remap_field_list(&file.extension, &[], paths::FILE_EXTENSION, &ctx, &mut trie);

    if message_type.is_empty() && enum_type.is_empty() && service.is_empty() && extension.is_empty() {
        return Ok(None);
    }

    let options_path = paths::field(&[], paths::FILE_OPTIONS);
    let options = filter_custom(&file.options, selection, &options_path, &mut trie);
    let (dependency, weak_dependency) = rewrite_dependencies(file, &path, selection);

    let new_file = FileDescriptorProto {
        name: file.name.clone(),
        package: file.package.clone(),
        dependency,
        public_dependency: Vec::new(),
        weak_dependency,
        message_type,
        enum_type,
        service,
        extension,
        options,
        source_code_info: None,
        syntax: file.syntax.clone(),
    };

    Ok(Some((new_file, trie)))
}

/// Rebuilds `dependency`/`weak_dependency` down to exactly what the
/// surviving descriptors in this file still reference (§4.4): surviving
/// entries keep their relative order and are renumbered, anything the
/// selection's `required_imports` still needs but isn't already present
/// is appended in sorted order, and `weak_dependency`'s indices follow
/// the same old-index -> new-index map. `public_dependency` has no
/// surviving-reference concept of its own — C4 drops it unconditionally.
fn rewrite_dependencies(file: &FileDescriptorProto, path: &str, selection: &Selection) -> (Vec<String>, Vec<i32>) {
    let required = selection.required_imports(path);
    let mut dependency = Vec::new();
    let mut old_to_new: BTreeMap<i32, i32> = BTreeMap::new();
    let mut present: BTreeSet<String> = BTreeSet::new();

    for (i, dep) in file.dependency.iter().enumerate() {
        if required.contains(dep) {
            old_to_new.insert(i as i32, dependency.len() as i32);
            present.insert(dep.clone());
            dependency.push(dep.clone());
        }
    }
    for dep in &required {
        if !present.contains(dep) {
            dependency.push(dep.clone());
        }
    }

    let weak_dependency = file.weak_dependency.iter().filter_map(|old| old_to_new.get(old).copied()).collect();
    (dependency, weak_dependency)
}

fn remap_message_list(
    items: &[DescriptorProto],
    prefix: &[i32],
    tag: i32,
    ctx: &Ctx,
    trie: &mut RemapTrie,
) -> Result<Vec<DescriptorProto>> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let child_path = paths::child(prefix, tag, i as i32);
        match remap_message(item, &child_path, ctx, trie)? {
            Some(rewritten) => {
                trie.insert(&child_path);
                out.push(rewritten);
            }
            None => trie.mark_deleted(&child_path),
        }
    }
    Ok(out)
}

fn remap_enum_list(items: &[EnumDescriptorProto], prefix: &[i32], tag: i32, ctx: &Ctx, trie: &mut RemapTrie) -> Vec<EnumDescriptorProto> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let child_path = paths::child(prefix, tag, i as i32);
        match remap_enum(item, &child_path, ctx, trie) {
            Some(rewritten) => {
                trie.insert(&child_path);
                out.push(rewritten);
            }
            None => trie.mark_deleted(&child_path),
        }
    }
    out
}

fn remap_service_list(
    items: &[ServiceDescriptorProto],
    prefix: &[i32],
    tag: i32,
    ctx: &Ctx,
    trie: &mut RemapTrie,
) -> Result<Vec<ServiceDescriptorProto>> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let child_path = paths::child(prefix, tag, i as i32);
        match remap_service(item, &child_path, ctx, trie)? {
            Some(rewritten) => {
                trie.insert(&child_path);
                out.push(rewritten);
            }
            None => trie.mark_deleted(&child_path),
        }
    }
    Ok(out)
}

/// Drops fields per [`field_dropped`] and otherwise keeps the list
/// intact, filtering each survivor's options. `oneof_index` is left
/// untouched here — `remap_message` fixes it up afterward once it knows
/// which oneofs survived the field drop.
fn remap_field_list(items: &[FieldDescriptorProto], prefix: &[i32], tag: i32, ctx: &Ctx, trie: &mut RemapTrie) -> Vec<FieldDescriptorProto> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let child_path = paths::child(prefix, tag, i as i32);
        if field_dropped(item, &child_path, ctx) {
            trie.mark_deleted(&child_path);
            continue;
        }
        trie.insert(&child_path);
        out.push(remap_field(item, &child_path, ctx.selection, trie));
    }
    out
}

/// Rewrites a single message. Returns `None` if it should be dropped
/// outright (mode `None`). An `Enclosing` message keeps its name,
/// nested messages/enums, and extensions (per spec §4.4, an enclosing
/// message is scaffolding for *any* surviving descendant, including an
/// `extend` block declared inside it), but sheds its own fields,
/// oneofs, extension ranges, reserved ranges and options: it only
/// exists in the output to give a surviving nested declaration
/// somewhere to live.
fn remap_message(m: &DescriptorProto, path: &[i32], ctx: &Ctx, trie: &mut RemapTrie) -> Result<Option<DescriptorProto>> {
    let mode = ctx.mode_at(path);
    if mode == InclusionMode::None {
        return Ok(None);
    }

    let nested_type = remap_message_list(&m.nested_type, path, paths::MESSAGE_NESTED_TYPE, ctx, trie)?;
    let enum_type = remap_enum_list(&m.enum_type, path, paths::MESSAGE_ENUM_TYPE, ctx, trie);

    if mode == InclusionMode::Enclosing {
        let extension = remap_field_list(&m.extension, path, paths::MESSAGE_EXTENSION, ctx, trie);
        if nested_type.is_empty() && enum_type.is_empty() && extension.is_empty() {
            return Ok(None);
        }
        trie.mark_no_comment(path);
        return Ok(Some(DescriptorProto {
            name: m.name.clone(),
            field: Vec::new(),
            extension,
            nested_type,
            enum_type,
            extension_range: Vec::new(),
            oneof_decl: Vec::new(),
            options: None,
            reserved_range: Vec::new(),
            reserved_name: Vec::new(),
        }));
    }

    let mut field = remap_field_list(&m.field, path, paths::MESSAGE_FIELD, ctx, trie);
    let extension = remap_field_list(&m.extension, path, paths::MESSAGE_EXTENSION, ctx, trie);

    let used_oneofs: BTreeSet<i32> = field.iter().filter_map(|f| f.oneof_index).collect();
    let (oneof_decl, oneof_remap) = remap_oneof_list(&m.oneof_decl, path, &used_oneofs, ctx.selection, trie);
    for f in &mut field {
        f.oneof_index = f.oneof_index.and_then(|old| oneof_remap.get(&old).copied());
    }

    let extension_range = m
        .extension_range
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let range_path = paths::child(path, paths::MESSAGE_EXTENSION_RANGE, i as i32);
            let options_path = paths::field(&range_path, paths::EXTENSION_RANGE_OPTIONS);
            ExtensionRange {
                start: r.start,
                end: r.end,
                options: filter_custom(&r.options, ctx.selection, &options_path, trie),
            }
        })
        .collect();

    let options_path = paths::field(path, paths::MESSAGE_OPTIONS);
    Ok(Some(DescriptorProto {
        name: m.name.clone(),
        field,
        extension,
        nested_type,
        enum_type,
        extension_range,
        oneof_decl,
        options: filter_custom(&m.options, ctx.selection, &options_path, trie),
        reserved_range: m.reserved_range.iter().map(|r| ReservedRange { start: r.start, end: r.end }).collect(),
        reserved_name: m.reserved_name.clone(),
    }))
}

/// Drops any oneof whose index isn't in `used` (every field that
/// pointed at it was itself dropped) and returns the surviving list
/// alongside an old-index -> new-index map so the caller can fix up
/// `oneof_index` on the fields that remain.
fn remap_oneof_list(
    items: &[OneofDescriptorProto],
    prefix: &[i32],
    used: &BTreeSet<i32>,
    selection: &Selection,
    trie: &mut RemapTrie,
) -> (Vec<OneofDescriptorProto>, BTreeMap<i32, i32>) {
    let mut out = Vec::new();
    let mut remap = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        let child_path = paths::child(prefix, paths::MESSAGE_ONEOF_DECL, i as i32);
        if !used.contains(&(i as i32)) {
            trie.mark_deleted(&child_path);
            continue;
        }
        trie.insert(&child_path);
        let options_path = paths::field(&child_path, paths::ONEOF_OPTIONS);
        remap.insert(i as i32, out.len() as i32);
        out.push(OneofDescriptorProto {
            name: item.name.clone(),
            options: filter_custom(&item.options, selection, &options_path, trie),
        });
    }
    (out, remap)
}

fn remap_field(field: &FieldDescriptorProto, path: &[i32], selection: &Selection, trie: &mut RemapTrie) -> FieldDescriptorProto {
    let options_path = paths::field(path, paths::FIELD_OPTIONS);
    FieldDescriptorProto {
        name: field.name.clone(),
        number: field.number,
        label: field.label,
        r#type: field.r#type,
        type_name: field.type_name.clone(),
        extendee: field.extendee.clone(),
        default_value: field.default_value.clone(),
        oneof_index: field.oneof_index,
        json_name: field.json_name.clone(),
        options: filter_custom(&field.options, selection, &options_path, trie),
    }
}

fn remap_enum(e: &EnumDescriptorProto, path: &[i32], ctx: &Ctx, trie: &mut RemapTrie) -> Option<EnumDescriptorProto> {
    if ctx.mode_at(path) == InclusionMode::None {
        return None;
    }
    let mut value = Vec::with_capacity(e.value.len());
    for (i, v) in e.value.iter().enumerate() {
        let value_path = paths::child(path, paths::ENUM_VALUE, i as i32);
        trie.insert(&value_path);
        value.push(remap_enum_value(v, &value_path, ctx.selection, trie));
    }
    let options_path = paths::field(path, paths::ENUM_OPTIONS);
    Some(EnumDescriptorProto {
        name: e.name.clone(),
        value,
        options: filter_custom(&e.options, ctx.selection, &options_path, trie),
    })
}

fn remap_enum_value(v: &EnumValueDescriptorProto, path: &[i32], selection: &Selection, trie: &mut RemapTrie) -> EnumValueDescriptorProto {
    let options_path = paths::field(path, paths::ENUM_VALUE_OPTIONS);
    EnumValueDescriptorProto {
        name: v.name.clone(),
        number: v.number,
        options: filter_custom(&v.options, selection, &options_path, trie),
    }
}

fn remap_service(s: &ServiceDescriptorProto, path: &[i32], ctx: &Ctx, trie: &mut RemapTrie) -> Result<Option<ServiceDescriptorProto>> {
    if ctx.mode_at(path) == InclusionMode::None {
        return Ok(None);
    }
    let mut method = Vec::with_capacity(s.method.len());
    for (i, m) in s.method.iter().enumerate() {
        let method_path = paths::child(path, paths::SERVICE_METHOD, i as i32);
        trie.insert(&method_path);
        method.push(remap_method(m, &method_path, ctx.selection, trie)?);
    }
    let options_path = paths::field(path, paths::SERVICE_OPTIONS);
    Ok(Some(ServiceDescriptorProto {
        name: s.name.clone(),
        method,
        options: filter_custom(&s.options, ctx.selection, &options_path, trie),
    }))
}

/// A method whose input or output type was already excluded is an
/// error, not a drop: unlike an ordinary field, there's no sensible way
/// to keep a service around with a hole where one of its methods used
/// to be, since the caller asked for that exact RPC shape.
fn remap_method(m: &MethodDescriptorProto, path: &[i32], selection: &Selection, trie: &mut RemapTrie) -> Result<MethodDescriptorProto> {
    for type_name in [&m.input_type, &m.output_type].into_iter().flatten() {
        let referenced = paths::normalize_type_name(type_name);
        if !selection.has_type(referenced) {
            return Err(FilterError::Invariant(format!(
                "method {} references excluded type {referenced}",
                m.name.clone().unwrap_or_default()
            )));
        }
    }
    let options_path = paths::field(path, paths::METHOD_OPTIONS);
    Ok(MethodDescriptorProto {
        name: m.name.clone(),
        input_type: m.input_type.clone(),
        output_type: m.output_type.clone(),
        options: filter_custom(&m.options, selection, &options_path, trie),
        client_streaming: m.client_streaming,
        server_streaming: m.server_streaming,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::{self, FilterOptions};
    use crate::image::{Image, ImageFile};
    use crate::index::new_index_for_image;
    use crate::options::{CustomOption, OptionValue};
    use crate::proto::field_descriptor_proto::Type;

    #[test]
    fn excluded_top_level_message_drops_file_to_none() {
        let file = FileDescriptorProto {
            name: Some("only.proto".into()),
            message_type: vec![DescriptorProto {
                name: Some("Foo".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut opts = FilterOptions::default();
        opts.exclude_types.push("Foo".into());
        let image = Image::new(vec![ImageFile::new(file.clone())]);
        let index = new_index_for_image(&image).unwrap();
        let selection = closure::compute(&index, &opts, |_| None, |_| None, |_| None, |_| None).unwrap();
        let rewritten = rewrite_file(&file, &index, &selection).unwrap();
        assert!(rewritten.is_none());
    }

    #[test]
    fn unrelated_message_survives_alongside_excluded_one() {
        let file = FileDescriptorProto {
            name: Some("both.proto".into()),
            message_type: vec![
                DescriptorProto {
                    name: Some("Foo".into()),
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Bar".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut opts = FilterOptions::default();
        opts.exclude_types.push("Foo".into());
        let image = Image::new(vec![ImageFile::new(file.clone())]);
        let index = new_index_for_image(&image).unwrap();
        let selection = closure::compute(&index, &opts, |_| None, |_| None, |_| None, |_| None).unwrap();
        let (rewritten, mut trie) = rewrite_file(&file, &index, &selection).unwrap().unwrap();
        assert_eq!(rewritten.message_type.len(), 1);
        assert_eq!(rewritten.message_type[0].name.as_deref(), Some("Bar"));
        assert_eq!(trie.new_path(&[4, 0]), None);
        assert_eq!(trie.new_path(&[4, 1]), Some(vec![4, 0]));
    }

    #[test]
    fn field_referencing_excluded_message_type_is_dropped_not_errored() {
        let excluded = DescriptorProto {
            name: Some("Excluded".into()),
            ..Default::default()
        };
        let holder = DescriptorProto {
            name: Some("Holder".into()),
            field: vec![
                FieldDescriptorProto {
                    name: Some("gone".into()),
                    number: Some(1),
                    r#type: Some(Type::Message),
                    type_name: Some(".Excluded".into()),
                    ..Default::default()
                },
                FieldDescriptorProto {
                    name: Some("stays".into()),
                    number: Some(2),
                    r#type: Some(Type::Int32),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("f.proto".into()),
            message_type: vec![excluded, holder],
            ..Default::default()
        };
        let mut opts = FilterOptions::default();
        opts.exclude_types.push("Excluded".into());
        let image = Image::new(vec![ImageFile::new(file.clone())]);
        let index = new_index_for_image(&image).unwrap();
        let selection = closure::compute(&index, &opts, |_| None, |_| None, |_| None, |_| None).unwrap();
        let (rewritten, _trie) = rewrite_file(&file, &index, &selection).unwrap().unwrap();
        assert_eq!(rewritten.message_type.len(), 1);
        let holder = &rewritten.message_type[0];
        assert_eq!(holder.name.as_deref(), Some("Holder"));
        assert_eq!(holder.field.len(), 1);
        assert_eq!(holder.field[0].name.as_deref(), Some("stays"));
    }

    #[test]
    fn enclosing_mode_message_strips_own_content_and_drops_its_comment() {
        let inner = DescriptorProto {
            name: Some("Inner".into()),
            ..Default::default()
        };
        let outer = DescriptorProto {
            name: Some("Outer".into()),
            field: vec![FieldDescriptorProto {
                name: Some("scalar".into()),
                number: Some(1),
                r#type: Some(Type::Int32),
                ..Default::default()
            }],
            nested_type: vec![inner],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("f.proto".into()),
            package: Some("x".into()),
            message_type: vec![outer],
            ..Default::default()
        };
        let mut opts = FilterOptions::default();
        opts.include_types.push("x.Outer.Inner".into());
        let image = Image::new(vec![ImageFile::new(file.clone())]);
        let index = new_index_for_image(&image).unwrap();
        let selection = closure::compute(&index, &opts, |_| None, |_| None, |_| None, |_| None).unwrap();
        assert_eq!(selection.mode("x.Outer"), crate::closure::InclusionMode::Enclosing);
        let (rewritten, mut trie) = rewrite_file(&file, &index, &selection).unwrap().unwrap();
        let outer_out = &rewritten.message_type[0];
        assert_eq!(outer_out.nested_type.len(), 1);
        // `Enclosing` strips the message's own content: it only exists
        // to host the nested `Inner` that was actually selected.
        assert!(outer_out.field.is_empty());
        assert!(trie.comment_dropped(&[4, 0]));
    }

    #[test]
    fn enclosing_message_survives_solely_to_host_a_nested_extend() {
        let outer = DescriptorProto {
            name: Some("Outer".into()),
            field: vec![FieldDescriptorProto {
                name: Some("scalar".into()),
                number: Some(1),
                r#type: Some(Type::Int32),
                ..Default::default()
            }],
            extension: vec![FieldDescriptorProto {
                name: Some("y".into()),
                number: Some(2),
                r#type: Some(Type::Int32),
                extendee: Some(".x.Ext".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let ext = DescriptorProto {
            name: Some("Ext".into()),
            extension_range: vec![ExtensionRange {
                start: Some(2),
                end: Some(3),
                options: None,
            }],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("f.proto".into()),
            package: Some("x".into()),
            message_type: vec![outer, ext],
            ..Default::default()
        };
        let mut opts = FilterOptions::default();
        opts.include_types.push("x.Outer.y".into());
        let image = Image::new(vec![ImageFile::new(file.clone())]);
        let index = new_index_for_image(&image).unwrap();
        let selection = closure::compute(&index, &opts, |_| None, |_| None, |_| None, |_| None).unwrap();
        assert_eq!(selection.mode("x.Outer"), crate::closure::InclusionMode::Enclosing);
        let (rewritten, _trie) = rewrite_file(&file, &index, &selection).unwrap().unwrap();
        let outer_out = &rewritten.message_type[0];
        assert_eq!(outer_out.name.as_deref(), Some("Outer"));
        // Only the `extend` block is why `Outer` survives: no nested
        // message or enum, its own field is shed, but the extension stays.
        assert!(outer_out.nested_type.is_empty());
        assert!(outer_out.enum_type.is_empty());
        assert!(outer_out.field.is_empty());
        assert_eq!(outer_out.extension.len(), 1);
        assert_eq!(outer_out.extension[0].name.as_deref(), Some("y"));
    }

    #[test]
    fn oneof_with_every_field_dropped_is_itself_removed() {
        let excluded = DescriptorProto {
            name: Some("Excluded".into()),
            ..Default::default()
        };
        let holder = DescriptorProto {
            name: Some("Holder".into()),
            field: vec![
                FieldDescriptorProto {
                    name: Some("a".into()),
                    number: Some(1),
                    r#type: Some(Type::Message),
                    type_name: Some(".Excluded".into()),
                    oneof_index: Some(0),
                    ..Default::default()
                },
                FieldDescriptorProto {
                    name: Some("b".into()),
                    number: Some(2),
                    r#type: Some(Type::Int32),
                    oneof_index: Some(1),
                    ..Default::default()
                },
            ],
            oneof_decl: vec![
                OneofDescriptorProto {
                    name: Some("dead".into()),
                    options: None,
                },
                OneofDescriptorProto {
                    name: Some("alive".into()),
                    options: None,
                },
            ],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("f.proto".into()),
            message_type: vec![excluded, holder],
            ..Default::default()
        };
        let mut opts = FilterOptions::default();
        opts.exclude_types.push("Excluded".into());
        let image = Image::new(vec![ImageFile::new(file.clone())]);
        let index = new_index_for_image(&image).unwrap();
        let selection = closure::compute(&index, &opts, |_| None, |_| None, |_| None, |_| None).unwrap();
        let (rewritten, _trie) = rewrite_file(&file, &index, &selection).unwrap().unwrap();
        let holder = &rewritten.message_type[0];
        assert_eq!(holder.oneof_decl.len(), 1);
        assert_eq!(holder.oneof_decl[0].name.as_deref(), Some("alive"));
        assert_eq!(holder.field.len(), 1);
        assert_eq!(holder.field[0].name.as_deref(), Some("b"));
        // "alive" moved from index 1 to index 0 once "dead" was dropped.
        assert_eq!(holder.field[0].oneof_index, Some(0));
    }

    #[test]
    fn excluded_extension_field_is_dropped_from_its_own_declaration_list() {
        let ext_field = FieldDescriptorProto {
            name: Some("my_option".into()),
            number: Some(50000),
            r#type: Some(Type::Int32),
            extendee: Some("google.protobuf.FieldOptions".into()),
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("opts.proto".into()),
            package: Some("my.pkg".into()),
            extension: vec![ext_field],
            ..Default::default()
        };
        let mut opts = FilterOptions::default();
        opts.exclude_types.push("my.pkg.my_option".into());
        let image = Image::new(vec![ImageFile::new(file.clone())]);
        let index = new_index_for_image(&image).unwrap();
        let selection = closure::compute(&index, &opts, |_| None, |_| None, |_| None, |_| None).unwrap();
        let rewritten = rewrite_file(&file, &index, &selection).unwrap();
        assert!(rewritten.is_none());
    }

    #[test]
    fn stripped_custom_option_records_its_own_source_path() {
        let file = FileDescriptorProto {
            name: Some("f.proto".into()),
            message_type: vec![DescriptorProto {
                name: Some("Kept".into()),
                options: Some(Options {
                    known: Default::default(),
                    custom: vec![CustomOption {
                        extension_name: "my.pkg.my_option".into(),
                        number: 50000,
                        value: OptionValue::Scalar,
                    }],
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut opts = FilterOptions::default();
        opts.exclude_options.push("my.pkg.my_option".into());
        let image = Image::new(vec![ImageFile::new(file.clone())]);
        let index = new_index_for_image(&image).unwrap();
        let selection = closure::compute(&index, &opts, |_| None, |_| None, |_| None, |_| None).unwrap();
        let (rewritten, mut trie) = rewrite_file(&file, &index, &selection).unwrap().unwrap();
        // The bag held nothing but the stripped custom option, so it's
        // gone entirely rather than surviving as `Some(Options::default())`.
        assert!(rewritten.message_type[0].options.is_none());
        // [4, 0, 7]: message_type[0]'s options bag, then [50000] for the
        // custom option itself, chained beneath it.
        assert_eq!(trie.new_path(&[4, 0, 7, 50000]), None);
        assert_eq!(trie.new_path(&[4, 0, 7]), None);
    }

    #[test]
    fn dependency_list_drops_unneeded_imports_and_keeps_required_ones() {
        use crate::proto::FieldDescriptorProto as Field;

        let a = FileDescriptorProto {
            name: Some("a.proto".into()),
            package: Some("pkg".into()),
            dependency: vec!["unused.proto".into(), "needed.proto".into()],
            public_dependency: vec![0],
            message_type: vec![DescriptorProto {
                name: Some("A".into()),
                field: vec![Field {
                    name: Some("b".into()),
                    number: Some(1),
                    r#type: Some(Type::Message),
                    type_name: Some(".pkg.B".into()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let needed = FileDescriptorProto {
            name: Some("needed.proto".into()),
            package: Some("pkg".into()),
            message_type: vec![DescriptorProto {
                name: Some("B".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let unused = FileDescriptorProto {
            name: Some("unused.proto".into()),
            package: Some("pkg".into()),
            message_type: vec![DescriptorProto {
                name: Some("Unused".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let a_msg = a.message_type[0].clone();
        let image = Image::new(vec![
            ImageFile::new(a.clone()),
            ImageFile::new(needed),
            ImageFile::new(unused),
        ]);
        let index = new_index_for_image(&image).unwrap();
        let opts = FilterOptions {
            include_types: vec!["pkg.A".into()],
            ..Default::default()
        };
        let selection = closure::compute(
            &index,
            &opts,
            move |fqn| if fqn == "pkg.A" { Some(a_msg.clone()) } else { None },
            |_| None,
            |_| None,
            |_| None,
        )
        .unwrap();
        let (rewritten, _trie) = rewrite_file(&a, &index, &selection).unwrap().unwrap();
        assert_eq!(rewritten.dependency, vec!["needed.proto".to_string()]);
        assert!(rewritten.public_dependency.is_empty());
    }

    #[test]
    fn dependency_list_appends_missing_required_imports_in_sorted_order() {
        let a = FileDescriptorProto {
            name: Some("a.proto".into()),
            package: Some("pkg".into()),
            dependency: Vec::new(),
            message_type: vec![DescriptorProto {
                name: Some("A".into()),
                field: vec![FieldDescriptorProto {
                    name: Some("b".into()),
                    number: Some(1),
                    r#type: Some(Type::Message),
                    type_name: Some(".pkg.B".into()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let b = FileDescriptorProto {
            name: Some("b.proto".into()),
            package: Some("pkg".into()),
            message_type: vec![DescriptorProto {
                name: Some("B".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let a_msg = a.message_type[0].clone();
        let image = Image::new(vec![ImageFile::new(a.clone()), ImageFile::new(b)]);
        let index = new_index_for_image(&image).unwrap();
        let opts = FilterOptions {
            include_types: vec!["pkg.A".into()],
            ..Default::default()
        };
        let selection = closure::compute(
            &index,
            &opts,
            move |fqn| if fqn == "pkg.A" { Some(a_msg.clone()) } else { None },
            |_| None,
            |_| None,
            |_| None,
        )
        .unwrap();
        let (rewritten, _trie) = rewrite_file(&a, &index, &selection).unwrap().unwrap();
        assert_eq!(rewritten.dependency, vec!["b.proto".to_string()]);
    }
}
