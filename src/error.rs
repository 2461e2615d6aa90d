use std::fmt;

/// All error types produced by the filter engine.
///
/// A hand-written enum with `Display`/`Error` impls rather than a
/// `thiserror` derive, matching `grpcurl_core::error::GrpcurlError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// A name in `include_types`/`exclude_types`/`include_options`/
    /// `exclude_options` does not resolve to anything in the image.
    TypeNotFound(String),

    /// A name resolved, but to a descriptor declared in a file the image
    /// marks as an import, and `allow_imported_types` is `false`.
    TypeIsImport(String),

    /// `include_options` was non-empty while `include_custom_options`
    /// was `false`.
    InvalidOptions(&'static str),

    /// A fatal, non-retryable condition: duplicate FQN in the input
    /// image, a descriptor of unknown kind, a field of unknown wire
    /// type, a method referencing a type that was just excluded, or an
    /// internal consistency failure (a filtered-out file still required
    /// by another file, an unexpected remap result).
    Invariant(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::TypeNotFound(name) => write!(f, "type not found: {name}"),
            FilterError::TypeIsImport(name) => {
                write!(f, "type is declared in an imported file: {name}")
            }
            FilterError::InvalidOptions(msg) => write!(f, "invalid filter options: {msg}"),
            FilterError::Invariant(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for FilterError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_type_not_found() {
        let err = FilterError::TypeNotFound("pkg.Foo".into());
        assert_eq!(err.to_string(), "type not found: pkg.Foo");
    }

    #[test]
    fn display_type_is_import() {
        let err = FilterError::TypeIsImport("pkg.Foo".into());
        assert_eq!(
            err.to_string(),
            "type is declared in an imported file: pkg.Foo"
        );
    }
}
