//! Repository and branch name validation.
//!
//! Repository names double as archive file names and archive root folders on
//! clone, so they are restricted to a single path component. Branch names
//! follow git-style conventions:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` (double dot) or `@{`
//! - Must not start or end with `.` or `/`
//! - Must not end with `.lock`
//! - Components between slashes must be non-empty

use crate::error::TypeError;

/// Characters that are forbidden anywhere in a name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Longest accepted repository name, in bytes.
pub const MAX_REPOSITORY_NAME_LEN: usize = 100;

fn invalid(kind: &'static str, name: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use codechain_types::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("feature/auth").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<(), TypeError> {
    const KIND: &str = "branch";

    if name.is_empty() {
        return Err(invalid(KIND, name, "must not be empty"));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(KIND, name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(KIND, name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(KIND, name, "must not contain '@{'"));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(KIND, name, "must not start or end with '.'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(KIND, name, "must not start or end with '/'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(KIND, name, "must not end with '.lock'"));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(KIND, name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                KIND,
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }

    Ok(())
}

/// Validate a repository name. Same character rules as branches, but a single
/// component only.
pub fn validate_repository_name(name: &str) -> Result<(), TypeError> {
    const KIND: &str = "repository";

    if name.is_empty() {
        return Err(invalid(KIND, name, "must not be empty"));
    }
    if name.len() > MAX_REPOSITORY_NAME_LEN {
        return Err(invalid(
            KIND,
            name,
            format!("longer than {MAX_REPOSITORY_NAME_LEN} bytes"),
        ));
    }
    if name.contains('/') {
        return Err(invalid(KIND, name, "must not contain '/'"));
    }
    validate_branch_name(name).map_err(|e| match e {
        TypeError::InvalidName { reason, .. } => invalid(KIND, name, reason),
        other => other,
    })
}
