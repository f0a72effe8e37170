//! Qualified action name resolution.
//!
//! An action name's canonical form is `/namespace/[package/]action`: a
//! leading slash, two or three non-empty slash-separated segments, the
//! default namespace spelled as a single underscore.

/// A name could not be resolved to canonical form.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid name: {0:?}")]
pub struct NameError(pub String);

/// Default namespace token used when a shorthand name omits one.
pub const DEFAULT_NAMESPACE: &str = "_";

/// Parse and canonicalize an action identifier.
///
/// Accepts shorthand forms (`a`, `p/a`, `ns/p/a`) and already-qualified
/// forms (`/ns/a`, `/ns/p/a`), returning the canonical `/ns/[p/]a` form.
/// Rejects empty input, whitespace-only segments, and both of the
/// forbidden shapes `/x` (namespace with no action) and `a/b/c/d` (four
/// parts with no namespace).
pub fn canonicalize(raw: &str) -> Result<String, NameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NameError(raw.to_string()));
    }

    let qualified = trimmed.strip_prefix('/');
    let body = qualified.unwrap_or(trimmed);

    let parts: Vec<&str> = body.split('/').collect();
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(NameError(raw.to_string()));
    }

    match (qualified.is_some(), parts.len()) {
        // Already qualified: namespace+action, or namespace+package+action.
        (true, 2) | (true, 3) => Ok(format!("/{}", parts.join("/"))),
        // `/x` — namespace present but no action.
        (true, _) => Err(NameError(raw.to_string())),
        // Shorthand action, or package/action: default namespace.
        (false, 1) => Ok(format!("/{DEFAULT_NAMESPACE}/{}", parts[0])),
        (false, 2) => Ok(format!("/{DEFAULT_NAMESPACE}/{}/{}", parts[0], parts[1])),
        // Shorthand namespace/package/action: leading slash only.
        (false, 3) => Ok(format!("/{}/{}/{}", parts[0], parts[1], parts[2])),
        // `a/b/c/d` — too many parts without a namespace.
        (false, _) => Err(NameError(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_bare_action() {
        assert_eq!(canonicalize("echo").unwrap(), "/_/echo");
    }

    #[test]
    fn shorthand_package_action() {
        assert_eq!(canonicalize("pkg/echo").unwrap(), "/_/pkg/echo");
    }

    #[test]
    fn shorthand_namespace_package_action() {
        assert_eq!(canonicalize("ns/pkg/echo").unwrap(), "/ns/pkg/echo");
    }

    #[test]
    fn already_qualified_namespace_action() {
        assert_eq!(canonicalize("/ns/echo").unwrap(), "/ns/echo");
    }

    #[test]
    fn already_qualified_namespace_package_action() {
        assert_eq!(canonicalize("/ns/pkg/echo").unwrap(), "/ns/pkg/echo");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(canonicalize("  echo  ").unwrap(), "/_/echo");
    }

    #[test]
    fn rejects_empty() {
        assert!(canonicalize("").is_err());
        assert!(canonicalize("   ").is_err());
    }

    #[test]
    fn rejects_namespace_without_action() {
        assert!(canonicalize("/x").is_err());
    }

    #[test]
    fn rejects_too_many_parts_without_namespace() {
        assert!(canonicalize("a/b/c/d").is_err());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(canonicalize("/ns//echo").is_err());
        assert!(canonicalize("ns//echo").is_err());
        assert!(canonicalize("/ns/ /echo").is_err());
    }

    #[test]
    fn idempotent() {
        for raw in ["echo", "pkg/echo", "ns/pkg/echo", "/ns/echo", "/ns/pkg/echo"] {
            let once = canonicalize(raw).unwrap();
            let twice = canonicalize(&once).unwrap();
            assert_eq!(once, twice);
        }
    }
}
