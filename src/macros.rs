//! Public macros for constructing option structs without relying on struct literal syntax.

/// Construct [`crate::Options`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// use refjson::UnresolvedReferencePolicy;
///
/// let options = refjson::options! {
///     unresolved_references: UnresolvedReferencePolicy::Error,
///     allow_unquoted_object_keys: true,
/// };
/// assert!(options.allow_unquoted_object_keys);
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::Options::default();
        $(
            {
                opt.$field = $value;
            }
        )*
        opt
    }};
}

/// Construct [`crate::WriterOptions`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// let opts = refjson::writer_options! {
///     pretty: true,
///     indent_step: 4,
/// };
/// assert_eq!(opts.indent_step, 4);
/// ```
#[macro_export]
macro_rules! writer_options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::WriterOptions::default();
        $(
            {
                opt.$field = $value;
            }
        )*
        opt
    }};
}
