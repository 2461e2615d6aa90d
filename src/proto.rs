//! A local mirror of the `descriptor.proto` message family.
//!
//! `prost_types` ships typed `FileDescriptorProto`/`DescriptorProto`/etc.
//! structs, and the filter engine follows their field names and
//! `Option<T>`-for-optional-scalar conventions closely (compare the field
//! layout here against `prost_types::FileDescriptorProto`). The one place
//! this mirror diverges is the `options` slot on every descriptor kind:
//! `prost_types`' `*Options` structs are closed to the custom extension
//! fields a *different* `.proto` file may declare against them, so every
//! `options` field here is wrapped in [`crate::options::Options`], which
//! pairs the typed "known fields" struct with a self-maintained registry
//! of whichever custom options are actually set. See DESIGN.md for the
//! rationale.
//!
//! Wire-level encode/decode of these messages is explicitly out of scope
//! (the filter operates on already-constructed descriptor trees), so
//! unlike `prost_types`, nothing here derives `prost::Message`.

use crate::options::Options;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    EnumOptions, EnumValueOptions, ExtensionRangeOptions, FieldOptions, FileOptions,
    MethodOptions, OneofOptions, ServiceOptions, SourceCodeInfo,
};
pub use prost_types::field_descriptor_proto;
pub use prost_types::{MessageOptions};

/// Describes a complete `.proto` file.
#[derive(Clone, Debug, Default)]
pub struct FileDescriptorProto {
    /// File path, relative to the root of the source tree. Acts as the
    /// file's identity throughout the index and the import graph.
    pub name: Option<String>,
    pub package: Option<String>,

    /// Names of files imported by this file, in declaration order.
    pub dependency: Vec<String>,
    /// Indexes into `dependency` of the `import public` entries.
    pub public_dependency: Vec<i32>,
    /// Indexes into `dependency` of the `import weak` entries.
    pub weak_dependency: Vec<i32>,

    pub message_type: Vec<DescriptorProto>,
    pub enum_type: Vec<EnumDescriptorProto>,
    pub service: Vec<ServiceDescriptorProto>,
    /// Top-level `extend` declarations (fields with `extendee` set).
    pub extension: Vec<FieldDescriptorProto>,

    pub options: Option<Options<FileOptions>>,

    /// May safely be absent; only consumed by C5 and by tooling.
    pub source_code_info: Option<SourceCodeInfo>,

    pub syntax: Option<String>,
}

pub mod descriptor_proto {
    use super::*;

    #[derive(Clone, Debug, Default)]
    pub struct ExtensionRange {
        /// Inclusive.
        pub start: Option<i32>,
        /// Exclusive.
        pub end: Option<i32>,
        pub options: Option<Options<ExtensionRangeOptions>>,
    }

    #[derive(Clone, Debug, Default)]
    pub struct ReservedRange {
        /// Inclusive.
        pub start: Option<i32>,
        /// Exclusive.
        pub end: Option<i32>,
    }
}

/// Describes a message type.
#[derive(Clone, Debug, Default)]
pub struct DescriptorProto {
    pub name: Option<String>,

    pub field: Vec<FieldDescriptorProto>,
    /// Extensions declared *inside* this message (`message Foo { extend Bar {...} }`).
    pub extension: Vec<FieldDescriptorProto>,

    pub nested_type: Vec<DescriptorProto>,
    pub enum_type: Vec<EnumDescriptorProto>,

    pub extension_range: Vec<descriptor_proto::ExtensionRange>,
    pub oneof_decl: Vec<OneofDescriptorProto>,

    pub options: Option<Options<MessageOptions>>,

    pub reserved_range: Vec<descriptor_proto::ReservedRange>,
    pub reserved_name: Vec<String>,
}

/// Describes a field within a message, or a top-level/nested extension.
#[derive(Clone, Debug, Default)]
pub struct FieldDescriptorProto {
    pub name: Option<String>,
    pub number: Option<i32>,
    pub label: Option<Label>,
    pub r#type: Option<Type>,

    /// For message/enum/group fields: the (possibly relative) type name.
    pub type_name: Option<String>,

    /// Set only on extension fields: the FQN of the extended message.
    pub extendee: Option<String>,

    pub default_value: Option<String>,
    pub oneof_index: Option<i32>,
    pub json_name: Option<String>,

    pub options: Option<Options<FieldOptions>>,
}

impl FieldDescriptorProto {
    pub fn is_extension(&self) -> bool {
        self.extendee.is_some()
    }

    pub fn is_message_or_enum(&self) -> bool {
        matches!(self.r#type, Some(Type::Message) | Some(Type::Group) | Some(Type::Enum))
    }
}

/// Describes a oneof.
#[derive(Clone, Debug, Default)]
pub struct OneofDescriptorProto {
    pub name: Option<String>,
    pub options: Option<Options<OneofOptions>>,
}

/// Describes an enum type.
#[derive(Clone, Debug, Default)]
pub struct EnumDescriptorProto {
    pub name: Option<String>,
    pub value: Vec<EnumValueDescriptorProto>,
    pub options: Option<Options<EnumOptions>>,
}

/// Describes a value within an enum.
#[derive(Clone, Debug, Default)]
pub struct EnumValueDescriptorProto {
    pub name: Option<String>,
    pub number: Option<i32>,
    pub options: Option<Options<EnumValueOptions>>,
}

/// Describes a service.
#[derive(Clone, Debug, Default)]
pub struct ServiceDescriptorProto {
    pub name: Option<String>,
    pub method: Vec<MethodDescriptorProto>,
    pub options: Option<Options<ServiceOptions>>,
}

/// Describes a method of a service.
#[derive(Clone, Debug, Default)]
pub struct MethodDescriptorProto {
    pub name: Option<String>,
    pub input_type: Option<String>,
    pub output_type: Option<String>,
    pub options: Option<Options<MethodOptions>>,
    pub client_streaming: Option<bool>,
    pub server_streaming: Option<bool>,
}
