//! C3: transitive closure and selection.
//!
//! Given a set of type names to include (or, if none are given, the
//! whole image) and a set to exclude, computes which declarations
//! survive filtering and in what capacity: kept in full (`Explicit`),
//! kept only as scaffolding around something nested inside it
//! (`Enclosing`), or dropped (`None`). C4 reads this selection back out
//! while it rewrites each file; this module only decides, it doesn't
//! mutate anything.
//!
//! The state machine is monotone: a type only ever moves
//! `None -> Enclosing -> Explicit`, never backward, so the closure walk
//! can be a straightforward worklist without needing to undo decisions.

use crate::error::{FilterError, Result};
use crate::index::{DescriptorKind, ImageIndex};
use crate::options::{CustomOption, OptionValue};
use crate::proto::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, ServiceDescriptorProto};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// How a declaration survives filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum InclusionMode {
    /// Dropped entirely.
    #[default]
    None,
    /// Kept only because something explicit is nested inside it; its own
    /// fields/values/methods that don't lead to that explicit descendant
    /// are stripped by C4.
    Enclosing,
    /// Kept in full, including everything it in turn depends on.
    Explicit,
}

/// Knobs controlling a filter run. Mirrors the parameters
/// `grpcurl_core`'s connection/dial configuration groups into a single
/// struct, but for selection rather than transport.
#[derive(Clone, Debug)]
pub struct FilterOptions {
    /// Fully-qualified type names to pull in, along with their full
    /// transitive dependency closure. Empty means "the whole image".
    pub include_types: Vec<String>,
    /// Fully-qualified type names to drop, overriding `include_types`
    /// when a name appears (or is required) by both.
    pub exclude_types: Vec<String>,
    /// Fully-qualified custom-option extension names to keep on
    /// surviving descriptors. Empty means "all of them", subject to
    /// `include_custom_options`.
    pub include_options: Vec<String>,
    /// Fully-qualified custom-option extension names to strip.
    pub exclude_options: Vec<String>,
    /// Master switch for custom options: `false` strips every custom
    /// option from every surviving descriptor regardless of the two
    /// lists above.
    pub include_custom_options: bool,
    /// Whether the known-extension sweep (pulling in the extension
    /// field declarations backing surviving custom options, and their
    /// own type closure) runs at all.
    pub include_known_extensions: bool,
    /// Whether `include_types`/`exclude_types` may name a type declared
    /// in a file the image marks as an import. `false` (the default)
    /// rejects such a name with `FilterError::TypeIsImport`.
    pub allow_imported_types: bool,
    /// Whether C4 mutates descriptors in place (when nothing upstream
    /// still holds a reference to the input image) or shallow-clones
    /// anything it touches.
    pub mutate_in_place: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            include_types: Vec::new(),
            exclude_types: Vec::new(),
            include_options: Vec::new(),
            exclude_options: Vec::new(),
            include_custom_options: true,
            include_known_extensions: true,
            allow_imported_types: false,
            mutate_in_place: false,
        }
    }
}

/// The result of a closure computation: the inclusion mode of every
/// type the walk touched, the option-name filter derived from
/// `FilterOptions`, and the per-file required-import set (§4.3's
/// `imports` output) C4's dependency-list rewrite reads back out.
pub struct Selection<'a> {
    opts: &'a FilterOptions,
    modes: BTreeMap<String, InclusionMode>,
    imports: BTreeMap<String, BTreeSet<String>>,
    excluded: BTreeSet<String>,
}

impl<'a> Selection<'a> {
    pub fn mode(&self, fqn: &str) -> InclusionMode {
        self.modes.get(fqn).copied().unwrap_or_default()
    }

    pub fn has_type(&self, fqn: &str) -> bool {
        self.mode(fqn) != InclusionMode::None
    }

    /// Whether `fqn` was explicitly excluded (named by `exclude_types`,
    /// its sugar expansion, or a descendant of one of those). Distinct
    /// from `!has_type`: an extension field's own FQN is never seeded
    /// into `modes` by the closure walk (only messages/enums/services
    /// are), so checking `mode()` for it would read as "excluded" even
    /// under whole-image default filtering.
    pub fn is_excluded(&self, fqn: &str) -> bool {
        self.excluded.contains(fqn)
    }

    /// Whether a custom option with this extension name survives on any
    /// descriptor that keeps it set, independent of type selection.
    pub fn has_option(&self, extension_fqn: &str) -> bool {
        option_survives(self.opts, extension_fqn)
    }

    /// The file paths `file` must import in the output image: the
    /// declaring file of every externally-declared type a surviving
    /// descriptor in `file` still references. Empty if `file` needs no
    /// imports (or wasn't touched by the walk at all).
    pub fn required_imports(&self, file: &str) -> BTreeSet<String> {
        self.imports.get(file).cloned().unwrap_or_default()
    }

    /// One line per touched FQN and its inclusion mode, sorted by name.
    /// Debug-only: lets tests assert closure shape without reaching into
    /// the private `modes` map directly.
    #[cfg(test)]
    pub fn describe_selection(&self) -> String {
        self.modes
            .iter()
            .map(|(fqn, mode)| format!("{fqn}: {mode:?}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// §4.3's `has_option` predicate, standalone so both `Selection` and the
/// imports pass (which runs before a `Selection` exists) can use it.
fn option_survives(opts: &FilterOptions, extension_fqn: &str) -> bool {
    if !opts.include_custom_options {
        return false;
    }
    if opts.exclude_options.iter().any(|n| n == extension_fqn) {
        return false;
    }
    if !opts.include_options.is_empty() {
        return opts.include_options.iter().any(|n| n == extension_fqn);
    }
    true
}

fn check_requested_type(index: &ImageIndex, opts: &FilterOptions, fqn: &str) -> Result<()> {
    let loc = index
        .by_name(fqn)
        .ok_or_else(|| FilterError::TypeNotFound(fqn.to_string()))?;
    if !opts.allow_imported_types && index.file_is_import(&loc.file) {
        return Err(FilterError::TypeIsImport(fqn.to_string()));
    }
    Ok(())
}

/// Resolves `include_types`/`exclude_types` entries to the names the
/// closure walk actually operates on, expanding any entry that names a
/// package rather than a type (§9: "package-name selection").
/// `recurse_into_subpackages` distinguishes include's conservative sugar
/// (direct children only) from exclude's aggressive one (full subtree).
fn resolve_names(index: &ImageIndex, opts: &FilterOptions, names: &[String], recurse_into_subpackages: bool) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for name in names {
        if index.has_package(name) {
            if recurse_into_subpackages {
                out.extend(index.types_under_package_or_subpackages(name));
            } else {
                out.extend(index.direct_types_of_package(name).iter().cloned());
            }
            continue;
        }
        check_requested_type(index, opts, name)?;
        out.push(name.clone());
    }
    Ok(out)
}

/// Walks one message's immediate field/nested types, without recursing.
pub fn message_dependencies(msg: &DescriptorProto) -> Vec<String> {
    let mut deps = Vec::new();
    for field in msg.field.iter().chain(msg.extension.iter()) {
        if field.is_message_or_enum() {
            if let Some(type_name) = &field.type_name {
                deps.push(normalize_type_name(type_name));
            }
        }
        if let Some(extendee) = &field.extendee {
            deps.push(normalize_type_name(extendee));
        }
    }
    deps
}

pub fn service_dependencies(svc: &ServiceDescriptorProto) -> Vec<String> {
    let mut deps = Vec::new();
    for method in &svc.method {
        if let Some(input) = &method.input_type {
            deps.push(normalize_type_name(input));
        }
        if let Some(output) = &method.output_type {
            deps.push(normalize_type_name(output));
        }
    }
    deps
}

pub fn enum_dependencies(_e: &EnumDescriptorProto) -> Vec<String> {
    Vec::new()
}

fn normalize_type_name(name: &str) -> String {
    crate::paths::normalize_type_name(name).to_string()
}

/// Extracts the message type name from a `google.protobuf.Any.type_url`,
/// e.g. `type.googleapis.com/pkg.v1.Foo` -> `pkg.v1.Foo`.
pub fn type_name_from_any_url(type_url: &str) -> Option<&str> {
    type_url.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Scans a set of custom options for `google.protobuf.Any` values and
/// returns the type names they reference. A type packed into an
/// `Any`-typed option is referenced dynamically, not through an
/// ordinary field, so the closure walk has to look inside option
/// values rather than just at declared field types.
fn any_type_names_in(custom: &[CustomOption]) -> Vec<String> {
    let mut out = Vec::new();
    for option in custom {
        collect_any_type_names(&option.value, &mut out);
    }
    out
}

fn collect_any_type_names(value: &OptionValue, out: &mut Vec<String>) {
    match value {
        OptionValue::Scalar => {}
        OptionValue::Message(msg) => {
            if let Some(url) = &msg.any_type_url {
                if let Some(name) = type_name_from_any_url(url) {
                    out.push(name.to_string());
                }
            }
            for (_, nested) in &msg.nested {
                collect_any_type_names(nested, out);
            }
        }
        OptionValue::List(items) => {
            for item in items {
                collect_any_type_names(item, out);
            }
        }
    }
}

/// Every custom option attached anywhere within a message declaration:
/// on the message itself, its fields, its oneofs, and (recursively)
/// its nested types — everything that travels with the message when
/// it's kept at `Explicit`.
fn message_custom_options(m: &DescriptorProto) -> Vec<CustomOption> {
    let mut out = Vec::new();
    if let Some(opts) = &m.options {
        out.extend(opts.custom.iter().cloned());
    }
    for field in m.field.iter().chain(m.extension.iter()) {
        if let Some(opts) = &field.options {
            out.extend(opts.custom.iter().cloned());
        }
    }
    for oneof in &m.oneof_decl {
        if let Some(opts) = &oneof.options {
            out.extend(opts.custom.iter().cloned());
        }
    }
    for nested in &m.nested_type {
        out.extend(message_custom_options(nested));
    }
    out
}

fn enum_custom_options(e: &EnumDescriptorProto) -> Vec<CustomOption> {
    let mut out = Vec::new();
    if let Some(opts) = &e.options {
        out.extend(opts.custom.iter().cloned());
    }
    for value in &e.value {
        if let Some(opts) = &value.options {
            out.extend(opts.custom.iter().cloned());
        }
    }
    out
}

fn service_custom_options(s: &ServiceDescriptorProto) -> Vec<CustomOption> {
    let mut out = Vec::new();
    if let Some(opts) = &s.options {
        out.extend(opts.custom.iter().cloned());
    }
    for method in &s.method {
        if let Some(opts) = &method.options {
            out.extend(opts.custom.iter().cloned());
        }
    }
    out
}

struct Walker<'a> {
    index: &'a ImageIndex,
    excluded: BTreeSet<String>,
    modes: BTreeMap<String, InclusionMode>,
    queue: VecDeque<String>,
}

impl<'a> Walker<'a> {
    fn upgrade(&mut self, fqn: &str, mode: InclusionMode) {
        if self.excluded.contains(fqn) {
            return;
        }
        let current = self.modes.get(fqn).copied().unwrap_or_default();
        if mode > current {
            self.modes.insert(fqn.to_string(), mode);
        }
    }

    fn enqueue_explicit(&mut self, fqn: &str) {
        if self.excluded.contains(fqn) || self.index.by_name(fqn).is_none() {
            return;
        }
        let already_explicit = self.modes.get(fqn).copied() == Some(InclusionMode::Explicit);
        self.upgrade(fqn, InclusionMode::Explicit);
        if !already_explicit {
            self.queue.push_back(fqn.to_string());
        }
    }

    /// Marks every message enclosing `fqn` (by dotted-name prefix) as at
    /// least `Enclosing`, stopping once an ancestor is already at least
    /// that mode (its ancestors were already visited in a prior walk).
    fn mark_enclosing_chain(&mut self, fqn: &str) {
        let mut scope = fqn;
        while let Some(idx) = scope.rfind('.') {
            scope = &scope[..idx];
            if self.index.by_name(scope).is_none() {
                continue;
            }
            let current = self.modes.get(scope).copied().unwrap_or_default();
            if current >= InclusionMode::Enclosing {
                break;
            }
            self.modes.insert(scope.to_string(), InclusionMode::Enclosing);
        }
    }
}

/// Computes the closure for an image given its index and an already
/// mutually-consistent set of lookup callbacks for descriptor bodies.
/// `message_body`/`enum_body`/`service_body` let the walker read a
/// declaration's children without this module owning a copy of the
/// whole image; `field_body` does the same for a single extension field
/// (the known-extension sweep needs its payload type, not a whole
/// message). `lib.rs` supplies all four backed by the real image.
pub fn compute<'a>(
    index: &'a ImageIndex,
    opts: &'a FilterOptions,
    message_body: impl Fn(&str) -> Option<DescriptorProto>,
    enum_body: impl Fn(&str) -> Option<EnumDescriptorProto>,
    service_body: impl Fn(&str) -> Option<ServiceDescriptorProto>,
    field_body: impl Fn(&str) -> Option<FieldDescriptorProto>,
) -> Result<Selection<'a>> {
    if !opts.include_options.is_empty() && !opts.include_custom_options {
        return Err(FilterError::InvalidOptions(
            "include_options was given but include_custom_options is false",
        ));
    }

    let include_names = resolve_names(index, opts, &opts.include_types, false)?;
    let exclude_names = resolve_names(index, opts, &opts.exclude_types, true)?;

    // Excluding a message or service excludes everything nested inside
    // it too: a message's nested messages/enums, a service's methods.
    let mut excluded: BTreeSet<String> = BTreeSet::new();
    let mut stack: Vec<String> = exclude_names.clone();
    for fqn in &exclude_names {
        excluded.insert(fqn.clone());
    }
    while let Some(cur) = stack.pop() {
        for child in index.children_of(&cur) {
            if excluded.insert(child.clone()) {
                stack.push(child.clone());
            }
        }
    }

    let mut walker = Walker {
        index,
        excluded,
        modes: Default::default(),
        queue: VecDeque::new(),
    };

    if include_names.is_empty() {
        for (fqn, _kind) in index.all_type_names() {
            walker.enqueue_explicit(&fqn);
        }
    } else {
        for fqn in &include_names {
            walker.enqueue_explicit(fqn);
        }
    }

    // Every dependency edge the walk follows, kept around (rather than
    // discarded after use) so the import pass below can tell, for each
    // surviving declaration, which other files it still reaches into.
    let mut dep_edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    while let Some(fqn) = walker.queue.pop_front() {
        walker.mark_enclosing_chain(&fqn);
        let Some(loc) = index.by_name(&fqn) else { continue };
        let (deps, custom) = match loc.kind {
            DescriptorKind::Message => message_body(&fqn)
                .map(|m| (message_dependencies(&m), message_custom_options(&m)))
                .unwrap_or_default(),
            DescriptorKind::Enum => enum_body(&fqn)
                .map(|e| (enum_dependencies(&e), enum_custom_options(&e)))
                .unwrap_or_default(),
            DescriptorKind::Service => service_body(&fqn)
                .map(|s| (service_dependencies(&s), service_custom_options(&s)))
                .unwrap_or_default(),
            _ => (Vec::new(), Vec::new()),
        };
        for dep in deps {
            walker.enqueue_explicit(&dep);
            dep_edges.entry(fqn.clone()).or_default().insert(dep);
        }
        if opts.include_custom_options {
            for type_name in any_type_names_in(&custom) {
                walker.enqueue_explicit(&type_name);
                dep_edges.entry(fqn.clone()).or_default().insert(type_name);
            }
        }

        // §4.3 step 5: the known-extension sweep is its own toggle,
        // independent of `include_custom_options` (a plain, non-option
        // extension like Scenario B's `extend p.Foo { int32 x = 2; }`
        // still needs to be pulled in when custom options are disabled).
        if opts.include_known_extensions {
            for ext_fqn in index.extensions_of(&fqn).to_vec() {
                let payload = field_body(&ext_fqn).and_then(|f| {
                    if f.is_message_or_enum() {
                        f.type_name.as_deref().map(|t| normalize_type_name(t))
                    } else {
                        None
                    }
                });
                // Scalar payloads always pass; a message/enum payload
                // only passes if it's already included independently.
                // The sweep gates on reachability, it doesn't itself
                // pull a payload type in.
                let keep = match &payload {
                    Some(payload_fqn) => walker.modes.get(payload_fqn).copied().unwrap_or_default() != InclusionMode::None,
                    None => true,
                };
                if !keep {
                    continue;
                }
                walker.enqueue_explicit(&ext_fqn);
                dep_edges.entry(fqn.clone()).or_default().insert(ext_fqn.clone());
                if let Some(payload_fqn) = payload {
                    walker.enqueue_explicit(&payload_fqn);
                    dep_edges.entry(ext_fqn.clone()).or_default().insert(payload_fqn);
                }
            }
        }
    }

    // §4.3's `imports`: for every surviving declaration, the file of
    // each dependency it still reaches whose declaring file differs
    // from its own. C4 reads this back out per file to rewrite that
    // file's `dependency` list down to exactly what it still needs.
    let mut imports: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (fqn, mode) in &walker.modes {
        if *mode == InclusionMode::None {
            continue;
        }
        let Some(loc) = index.by_name(fqn) else { continue };
        let Some(deps) = dep_edges.get(fqn) else { continue };
        for dep in deps {
            let Some(dep_loc) = index.by_name(dep) else { continue };
            if dep_loc.file != loc.file {
                imports.entry(loc.file.clone()).or_default().insert(dep_loc.file.clone());
            }
        }
    }

    Ok(Selection {
        opts,
        modes: walker.modes,
        imports,
        excluded: walker.excluded,
    })
}
