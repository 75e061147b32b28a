//! Not-found detection for untyped failure messages.
//!
//! Store adapters report typed [`AccessError`](crate::AccessError)s where
//! the underlying crate gives them a kind to go on (e.g.
//! `object_store::Error::NotFound`). Errors that only carry a message are
//! sniffed here, and only here.

/// Lowercase substrings that mark a missing store, array or key.
pub const NOT_FOUND_SIGNATURES: &[&str] = &[
    "keyerror",
    "404",
    "nosuchkey",
    "nosuchbucket",
    "not found",
    "no such file",
    "metadata is missing",
    "missing metadata",
];

/// Heuristic: does this failure description look like a not-found condition?
pub fn looks_like_not_found(message: &str) -> bool {
    let lower = message.to_lowercase();
    NOT_FOUND_SIGNATURES.iter().any(|sig| lower.contains(sig))
}
