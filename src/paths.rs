//! `descriptor.proto` field-tag constants used to build source paths.
//!
//! A source path addresses a node in a `FileDescriptorProto` tree by the
//! same field-number/list-index alternation `SourceCodeInfo.Location.path`
//! uses (see `prost_types::source_code_info::Location`'s doc comment for
//! the canonical worked example): a nested message's second field,
//! `file.messages[4].nested_messages[2].fields[0]`, becomes
//! `[4, 4, 3, 2, 2, 0]`. These constants are that encoding's vocabulary.

pub type SourcePath = Vec<i32>;

// FileDescriptorProto field tags.
pub const FILE_PACKAGE: i32 = 2;
pub const FILE_DEPENDENCY: i32 = 3;
pub const FILE_MESSAGE_TYPE: i32 = 4;
pub const FILE_ENUM_TYPE: i32 = 5;
pub const FILE_SERVICE: i32 = 6;
pub const FILE_EXTENSION: i32 = 7;
pub const FILE_OPTIONS: i32 = 8;
pub const FILE_SOURCE_CODE_INFO: i32 = 9;
pub const FILE_PUBLIC_DEPENDENCY: i32 = 10;
pub const FILE_WEAK_DEPENDENCY: i32 = 11;
pub const FILE_SYNTAX: i32 = 12;

// DescriptorProto (message) field tags.
pub const MESSAGE_FIELD: i32 = 2;
pub const MESSAGE_NESTED_TYPE: i32 = 3;
pub const MESSAGE_ENUM_TYPE: i32 = 4;
pub const MESSAGE_EXTENSION_RANGE: i32 = 5;
pub const MESSAGE_EXTENSION: i32 = 6;
pub const MESSAGE_OPTIONS: i32 = 7;
pub const MESSAGE_ONEOF_DECL: i32 = 8;
pub const MESSAGE_RESERVED_RANGE: i32 = 9;
pub const MESSAGE_RESERVED_NAME: i32 = 10;

// EnumDescriptorProto field tags.
pub const ENUM_VALUE: i32 = 2;
pub const ENUM_OPTIONS: i32 = 3;

// ServiceDescriptorProto field tags.
pub const SERVICE_METHOD: i32 = 2;
pub const SERVICE_OPTIONS: i32 = 3;

// FieldDescriptorProto field tags.
pub const FIELD_OPTIONS: i32 = 8;

// OneofDescriptorProto field tags.
pub const ONEOF_OPTIONS: i32 = 2;

// EnumValueDescriptorProto field tags.
pub const ENUM_VALUE_OPTIONS: i32 = 3;

// DescriptorProto.ExtensionRange field tags.
pub const EXTENSION_RANGE_OPTIONS: i32 = 3;

// MethodDescriptorProto field tags.
pub const METHOD_OPTIONS: i32 = 4;

/// Appends an index to a source path, returning the extended path. Kept
/// as a small helper since the rewriter builds one of these at every
/// recursion step.
pub fn child(path: &[i32], tag: i32, index: i32) -> SourcePath {
    let mut p = Vec::with_capacity(path.len() + 2);
    p.extend_from_slice(path);
    p.push(tag);
    p.push(index);
    p
}

/// Appends a bare field tag (no index), for paths addressing a whole
/// repeated field or an optional singular field.
pub fn field(path: &[i32], tag: i32) -> SourcePath {
    let mut p = Vec::with_capacity(path.len() + 1);
    p.extend_from_slice(path);
    p.push(tag);
    p
}

/// `FieldDescriptorProto::type_name` and `::extendee` are written fully
/// qualified with a leading dot (e.g. `.pkg.v1.Foo`) per descriptor.proto
/// convention. Everywhere else in this crate FQNs are stored without the
/// leading dot, so every reader of those two fields normalizes at the
/// boundary through this helper.
pub fn normalize_type_name(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_type_name_strips_one_leading_dot() {
        assert_eq!(normalize_type_name(".pkg.v1.Foo"), "pkg.v1.Foo");
        assert_eq!(normalize_type_name("pkg.v1.Foo"), "pkg.v1.Foo");
    }
}
