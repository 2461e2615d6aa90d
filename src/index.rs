//! C2: the image index.
//!
//! A one-time pass over an [`Image`](crate::image::Image) that builds
//! the lookup tables every other component needs: fully-qualified name
//! (FQN) to descriptor location, descriptor location back to FQN, the
//! package hierarchy, and a registry of extension (custom option) fields
//! keyed by the message type they extend. Building this once up front,
//! rather than walking the image repeatedly, is what lets C3's selection
//! pass and C4's rewrite pass both work in terms of FQNs.
//!
//! Grounded on `grpcurl_core::descriptor::FileSource`'s `find_symbol_in_pool`
//! (a by-name index over a `prost_types::FileDescriptorSet`), generalized
//! here to also carry the reverse mapping and the extension registry.

use crate::error::{FilterError, Result};
use crate::image::Image;
use crate::paths;
use crate::proto::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto, ServiceDescriptorProto};
use std::collections::{BTreeMap, BTreeSet};

/// What kind of declaration a [`DescriptorLocation`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DescriptorKind {
    Message,
    Enum,
    EnumValue,
    Service,
    Method,
    /// A field: either an ordinary message field or a top-level/nested
    /// `extend` declaration. `is_extension` on the underlying
    /// `FieldDescriptorProto` distinguishes the two.
    Field,
    Oneof,
}

/// Where a descriptor with a given FQN lives: which file, what kind it
/// is, and its source path within that file (for C4/C5 to address it).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorLocation {
    pub file: String,
    pub kind: DescriptorKind,
    pub path: Vec<i32>,
}

/// An extension (custom option) field registered against the message
/// type it extends, e.g. a field extending `google.protobuf.FieldOptions`.
#[derive(Clone, Debug)]
pub struct ExtensionInfo {
    pub fqn: String,
    pub number: i32,
    pub extendee: String,
    pub location: DescriptorLocation,
}

/// The built index over an image.
#[derive(Default)]
pub struct ImageIndex {
    by_name: BTreeMap<String, DescriptorLocation>,
    by_location: BTreeMap<(String, Vec<i32>), String>,
    files: BTreeMap<String, usize>,
    file_is_import: BTreeMap<String, bool>,
    packages: BTreeSet<String>,
    /// Package name -> FQNs of the messages/enums/services declared
    /// directly in that package (not in a subpackage). Backs
    /// `include_types` naming a package, which is sugar for "every
    /// direct child of this package" (§9's package-name-selection note).
    package_direct_types: BTreeMap<String, Vec<String>>,
    /// Structural parent -> child FQNs: a message's nested messages and
    /// enums, a service's methods. Backs exclude's "mark it and all
    /// descendants" fanout (§4.3 step 2); include never recurses through
    /// this map (only through field/method type references).
    children_of: BTreeMap<String, Vec<String>>,
    name_to_extensions: BTreeMap<String, Vec<String>>,
    name_to_options: BTreeMap<String, ExtensionInfo>,
}

impl ImageIndex {
    pub fn by_name(&self, fqn: &str) -> Option<&DescriptorLocation> {
        self.by_name.get(fqn)
    }

    pub fn by_location(&self, file: &str, path: &[i32]) -> Option<&str> {
        self.by_location
            .get(&(file.to_string(), path.to_vec()))
            .map(String::as_str)
    }

    pub fn file_index(&self, path: &str) -> Option<usize> {
        self.files.get(path).copied()
    }

    /// True if `path` is present in the image only as a dependency (not
    /// itself a filter target). Unrecognized paths are treated as not
    /// an import, matching the fail-open default `allow_imported_types`
    /// uses for names the rest of lookup already rejects.
    pub fn file_is_import(&self, path: &str) -> bool {
        self.file_is_import.get(path).copied().unwrap_or(false)
    }

    pub fn has_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    /// The messages/enums/services declared directly under `package`
    /// (not in any subpackage).
    pub fn direct_types_of_package(&self, package: &str) -> &[String] {
        self.package_direct_types
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every message/enum/service FQN whose package is `package` or a
    /// dotted subpackage of it, e.g. `types_under_package_or_subpackages
    /// ("a")` includes declarations in packages `a`, `a.b`, `a.b.c`, ...
    /// Exclude's package fanout (§9: "exclude of a package ... DOES
    /// recurse into subpackages") uses this; include's package sugar
    /// uses `direct_types_of_package` instead, deliberately not
    /// recursing (§9).
    pub fn types_under_package_or_subpackages(&self, package: &str) -> Vec<String> {
        let prefix = format!("{package}.");
        self.package_direct_types
            .iter()
            .filter(|(pkg, _)| pkg.as_str() == package || pkg.starts_with(&prefix))
            .flat_map(|(_, types)| types.iter().cloned())
            .collect()
    }

    /// The direct structural children of `fqn`: a message's nested
    /// messages/enums, or a service's methods. Used to fan an exclude
    /// out to everything nested inside it.
    pub fn children_of(&self, fqn: &str) -> &[String] {
        self.children_of.get(fqn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every file path present in the image.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Extension fields that extend `extendee_fqn`, e.g. every field
    /// extending `google.protobuf.MethodOptions`. Used by C3's
    /// known-extension sweep.
    pub fn extensions_of(&self, extendee_fqn: &str) -> &[String] {
        self.name_to_extensions
            .get(extendee_fqn)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn extension(&self, fqn: &str) -> Option<&ExtensionInfo> {
        self.name_to_options.get(fqn)
    }

    /// Every message/enum/service FQN in the image, in no particular
    /// order. Used to seed the closure walk when `include_types` is
    /// empty (no include filter means "the whole image").
    pub fn all_type_names(&self) -> Vec<(String, DescriptorKind)> {
        self.by_name
            .iter()
            .filter(|(_, loc)| {
                matches!(
                    loc.kind,
                    DescriptorKind::Message | DescriptorKind::Enum | DescriptorKind::Service
                )
            })
            .map(|(fqn, loc)| (fqn.clone(), loc.kind))
            .collect()
    }
}

struct Builder<'a> {
    index: ImageIndex,
    image: &'a Image,
}

impl<'a> Builder<'a> {
    fn insert(&mut self, fqn: String, loc: DescriptorLocation) -> Result<()> {
        if self.index.by_name.contains_key(&fqn) {
            return Err(FilterError::Invariant(format!(
                "duplicate fully-qualified name in image: {fqn}"
            )));
        }
        self.index
            .by_location
            .insert((loc.file.clone(), loc.path.clone()), fqn.clone());
        self.index.by_name.insert(fqn, loc);
        Ok(())
    }

    fn register_extension(&mut self, field: &FieldDescriptorProto, fqn: &str, loc: DescriptorLocation) {
        let Some(extendee) = field.extendee.as_deref() else {
            return;
        };
        let extendee = paths::normalize_type_name(extendee).to_string();
        self.index
            .name_to_extensions
            .entry(extendee.clone())
            .or_default()
            .push(fqn.to_string());
        self.index.name_to_options.insert(
            fqn.to_string(),
            ExtensionInfo {
                fqn: fqn.to_string(),
                number: field.number.unwrap_or_default(),
                extendee,
                location: loc,
            },
        );
    }

    fn register_package(&mut self, package: &str) {
        if package.is_empty() {
            return;
        }
        let mut prefix = String::new();
        for part in package.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(part);
            self.index.packages.insert(prefix.clone());
        }
    }

    fn qualify(scope: &str, name: &str) -> String {
        if scope.is_empty() {
            name.to_string()
        } else {
            format!("{scope}.{name}")
        }
    }

    fn walk_field(&mut self, field: &FieldDescriptorProto, scope: &str, file: &str, path: Vec<i32>) -> Result<()> {
        let Some(name) = &field.name else {
            return Ok(());
        };
        let fqn = Self::qualify(scope, name);
        let loc = DescriptorLocation {
            file: file.to_string(),
            kind: DescriptorKind::Field,
            path,
        };
        self.register_extension(field, &fqn, loc.clone());
        self.insert(fqn, loc)
    }

    fn walk_enum(&mut self, e: &EnumDescriptorProto, scope: &str, file: &str, path: Vec<i32>) -> Result<()> {
        let Some(name) = &e.name else {
            return Ok(());
        };
        let fqn = Self::qualify(scope, name);
        self.insert(
            fqn.clone(),
            DescriptorLocation {
                file: file.to_string(),
                kind: DescriptorKind::Enum,
                path: path.clone(),
            },
        )?;
        for (i, value) in e.value.iter().enumerate() {
            if let Some(vname) = &value.name {
                self.insert(
                    Self::qualify(&fqn, vname),
                    DescriptorLocation {
                        file: file.to_string(),
                        kind: DescriptorKind::EnumValue,
                        path: paths::child(&path, paths::ENUM_VALUE, i as i32),
                    },
                )?;
            }
        }
        Ok(())
    }

    fn walk_message(&mut self, m: &DescriptorProto, scope: &str, file: &str, path: Vec<i32>) -> Result<()> {
        let Some(name) = &m.name else {
            return Ok(());
        };
        let fqn = Self::qualify(scope, name);
        self.insert(
            fqn.clone(),
            DescriptorLocation {
                file: file.to_string(),
                kind: DescriptorKind::Message,
                path: path.clone(),
            },
        )?;
        for (i, field) in m.field.iter().enumerate() {
            self.walk_field(field, &fqn, file, paths::child(&path, paths::MESSAGE_FIELD, i as i32))?;
        }
        for (i, field) in m.extension.iter().enumerate() {
            self.walk_field(field, &fqn, file, paths::child(&path, paths::MESSAGE_EXTENSION, i as i32))?;
        }
        for (i, oneof) in m.oneof_decl.iter().enumerate() {
            if let Some(oname) = &oneof.name {
                self.insert(
                    Self::qualify(&fqn, oname),
                    DescriptorLocation {
                        file: file.to_string(),
                        kind: DescriptorKind::Oneof,
                        path: paths::child(&path, paths::MESSAGE_ONEOF_DECL, i as i32),
                    },
                )?;
            }
        }
        for (i, nested) in m.nested_type.iter().enumerate() {
            let nested_fqn = Self::qualify(&fqn, nested.name.as_deref().unwrap_or_default());
            self.index.children_of.entry(fqn.clone()).or_default().push(nested_fqn);
            self.walk_message(nested, &fqn, file, paths::child(&path, paths::MESSAGE_NESTED_TYPE, i as i32))?;
        }
        for (i, nested_enum) in m.enum_type.iter().enumerate() {
            let nested_fqn = Self::qualify(&fqn, nested_enum.name.as_deref().unwrap_or_default());
            self.index.children_of.entry(fqn.clone()).or_default().push(nested_fqn);
            self.walk_enum(nested_enum, &fqn, file, paths::child(&path, paths::MESSAGE_ENUM_TYPE, i as i32))?;
        }
        Ok(())
    }

    fn walk_service(&mut self, s: &ServiceDescriptorProto, scope: &str, file: &str, path: Vec<i32>) -> Result<()> {
        let Some(name) = &s.name else {
            return Ok(());
        };
        let fqn = Self::qualify(scope, name);
        self.insert(
            fqn.clone(),
            DescriptorLocation {
                file: file.to_string(),
                kind: DescriptorKind::Service,
                path: path.clone(),
            },
        )?;
        for (i, method) in s.method.iter().enumerate() {
            if let Some(mname) = &method.name {
                let method_fqn = Self::qualify(&fqn, mname);
                self.index.children_of.entry(fqn.clone()).or_default().push(method_fqn.clone());
                self.insert(
                    method_fqn,
                    DescriptorLocation {
                        file: file.to_string(),
                        kind: DescriptorKind::Method,
                        path: paths::child(&path, paths::SERVICE_METHOD, i as i32),
                    },
                )?;
            }
        }
        Ok(())
    }

    fn walk_file(&mut self, proto: &FileDescriptorProto, index_in_image: usize) -> Result<()> {
        let file = proto.name.clone().unwrap_or_default();
        self.index.files.insert(file.clone(), index_in_image);
        let is_import = self
            .image
            .files
            .get(index_in_image)
            .map(|f| f.metadata.is_import)
            .unwrap_or(false);
        self.index.file_is_import.insert(file.clone(), is_import);
        let package = proto.package.clone().unwrap_or_default();
        self.register_package(&package);

        for (i, m) in proto.message_type.iter().enumerate() {
            if let Some(name) = &m.name {
                self.index
                    .package_direct_types
                    .entry(package.clone())
                    .or_default()
                    .push(Self::qualify(&package, name));
            }
            self.walk_message(m, &package, &file, paths::child(&[], paths::FILE_MESSAGE_TYPE, i as i32))?;
        }
        for (i, e) in proto.enum_type.iter().enumerate() {
            if let Some(name) = &e.name {
                self.index
                    .package_direct_types
                    .entry(package.clone())
                    .or_default()
                    .push(Self::qualify(&package, name));
            }
            self.walk_enum(e, &package, &file, paths::child(&[], paths::FILE_ENUM_TYPE, i as i32))?;
        }
        for (i, s) in proto.service.iter().enumerate() {
            if let Some(name) = &s.name {
                self.index
                    .package_direct_types
                    .entry(package.clone())
                    .or_default()
                    .push(Self::qualify(&package, name));
            }
            self.walk_service(s, &package, &file, paths::child(&[], paths::FILE_SERVICE, i as i32))?;
        }
        for (i, field) in proto.extension.iter().enumerate() {
            self.walk_field(field, &package, &file, paths::child(&[], paths::FILE_EXTENSION, i as i32))?;
        }
        Ok(())
    }
}

/// Builds an [`ImageIndex`] for `image`. Fails if the image contains two
/// declarations with the same fully-qualified name: a fatal,
/// non-retryable condition — images are expected to have been built by
/// a compiler that already rejects this).
pub fn new_index_for_image(image: &Image) -> Result<ImageIndex> {
    let mut builder = Builder {
        index: ImageIndex::default(),
        image,
    };
    for (i, file) in image.files.iter().enumerate() {
        builder.walk_file(&file.proto, i)?;
    }
    Ok(builder.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFile;
    use crate::proto::FieldDescriptorProto as Field;

    fn sample_image() -> Image {
        let message = DescriptorProto {
            name: Some("HelloRequest".into()),
            field: vec![Field {
                name: Some("name".into()),
                number: Some(1),
                ..Default::default()
            }],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("hello.proto".into()),
            package: Some("pkg.v1".into()),
            message_type: vec![message],
            ..Default::default()
        };
        Image::new(vec![ImageFile::new(file)])
    }

    #[test]
    fn indexes_message_and_field_by_fqn() {
        let image = sample_image();
        let idx = new_index_for_image(&image).unwrap();
        let loc = idx.by_name("pkg.v1.HelloRequest").unwrap();
        assert_eq!(loc.kind, DescriptorKind::Message);
        assert_eq!(loc.file, "hello.proto");
        let field_loc = idx.by_name("pkg.v1.HelloRequest.name").unwrap();
        assert_eq!(field_loc.kind, DescriptorKind::Field);
    }

    #[test]
    fn indexes_package_hierarchy() {
        let image = sample_image();
        let idx = new_index_for_image(&image).unwrap();
        assert!(idx.has_package("pkg"));
        assert!(idx.has_package("pkg.v1"));
        assert!(!idx.has_package("pkg.v2"));
    }

    #[test]
    fn duplicate_fqn_is_rejected() {
        let message = DescriptorProto {
            name: Some("Dup".into()),
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("a.proto".into()),
            message_type: vec![message.clone(), message],
            ..Default::default()
        };
        let image = Image::new(vec![ImageFile::new(file)]);
        assert!(new_index_for_image(&image).is_err());
    }

    #[test]
    fn registers_extension_against_extendee() {
        let ext_field = Field {
            name: Some("my_option".into()),
            number: Some(50000),
            extendee: Some("google.protobuf.FieldOptions".into()),
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("opts.proto".into()),
            package: Some("my.pkg".into()),
            extension: vec![ext_field],
            ..Default::default()
        };
        let image = Image::new(vec![ImageFile::new(file)]);
        let idx = new_index_for_image(&image).unwrap();
        assert_eq!(
            idx.extensions_of("google.protobuf.FieldOptions"),
            &["my.pkg.my_option".to_string()]
        );
        assert_eq!(idx.extension("my.pkg.my_option").unwrap().number, 50000);
    }
}
