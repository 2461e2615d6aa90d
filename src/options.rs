//! The open-schema options model.
//!
//! Every `*Options` message in `descriptor.proto` (`FileOptions`,
//! `MessageOptions`, ...) declares `extensions 1000 to max;`, so any
//! `.proto` file can widen it with `extend google.protobuf.FieldOptions {
//! optional X my_option = 50000; }` and then set `(my_option)` wherever
//! that options message appears. `prost_types`' typed structs have no
//! slot for a field number they don't know about, so this module pairs
//! the typed "known fields" with a small self-maintained registry of
//! whichever custom extensions are actually present, rather than pulling
//! in a full dynamic-reflection layer. See DESIGN.md.

/// An options message together with whatever custom (extension) options
/// are set on it.
#[derive(Clone, Debug, Default)]
pub struct Options<T> {
    /// The subset of fields `descriptor.proto` declares by name
    /// (`java_package`, `deprecated`, `map_entry`, ...). Filtering never
    /// needs to inspect these; they ride along unchanged.
    pub known: T,
    /// Custom options set on this bag, in declaration order.
    pub custom: Vec<CustomOption>,
}

impl<T> Options<T> {
    pub fn new(known: T) -> Self {
        Options {
            known,
            custom: Vec::new(),
        }
    }

    /// True once every custom option has been filtered out and there is
    /// nothing left worth keeping the bag around for. Known-field state
    /// is intentionally ignored: an options message that only sets e.g.
    /// `deprecated = true` still needs to round-trip, but for the
    /// purposes of "did filtering empty this bag" (§4.4) we only track
    /// whether any *custom* option survived, since stripping custom
    /// options is the only thing this filter ever removes from a bag.
    pub fn is_empty_of_custom(&self) -> bool {
        self.custom.is_empty()
    }
}

/// One extension field set inside an options message.
#[derive(Clone, Debug)]
pub struct CustomOption {
    /// Fully qualified name of the extension field, e.g. `my.pkg.my_option`.
    pub extension_name: String,
    /// The extension's field number within the options message.
    pub number: i32,
    pub value: OptionValue,
}

/// A deliberately small model of an option's payload.
///
/// The filter never needs to interpret a custom option's scalar content
/// (it matches options purely by extension name), with one exception:
/// §4.3 step 6 requires scanning `google.protobuf.Any`-typed option
/// values for their `type_url`. `Message`/`List` carry enough structure
/// for that scan to recurse; anything else collapses to `Scalar`.
#[derive(Clone, Debug)]
pub enum OptionValue {
    Scalar,
    Message(Box<MessageValue>),
    List(Vec<OptionValue>),
}

/// The payload of a message-typed option value.
#[derive(Clone, Debug, Default)]
pub struct MessageValue {
    /// Fully qualified name of the value's message type, e.g.
    /// `google.protobuf.Any` or a user type referenced through one.
    pub type_name: String,
    /// `google.protobuf.Any.type_url` (field 1), when `type_name` is
    /// `google.protobuf.Any`. `None` for ordinary message values.
    pub any_type_url: Option<String>,
    /// Nested fields that are themselves message-typed, keyed by field
    /// name — enough to walk into an `Any`'s packed value or into a
    /// map/repeated field of option messages per §4.3 step 6.
    pub nested: Vec<(String, OptionValue)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_has_no_custom() {
        let opts: Options<()> = Options::new(());
        assert!(opts.is_empty_of_custom());
    }

    #[test]
    fn options_with_custom_is_not_empty() {
        let mut opts: Options<()> = Options::new(());
        opts.custom.push(CustomOption {
            extension_name: "my.pkg.my_option".into(),
            number: 50000,
            value: OptionValue::Scalar,
        });
        assert!(!opts.is_empty_of_custom());
    }
}
