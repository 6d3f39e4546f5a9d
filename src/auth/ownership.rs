//! Per-resource ownership checks.

/// Outcome of an ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Decide whether `subject` may act on a resource owned by `resource_owner`.
///
/// Resources with no recorded owner are unrestricted: legacy ownerless rows
/// are permitted through, not denied. Applied after the resource is located,
/// so a missing resource yields NotFound rather than Deny.
pub fn authorize(resource_owner: Option<&str>, subject: &str) -> Access {
    match resource_owner {
        None => Access::Allow,
        Some(owner) if owner == subject => Access::Allow,
        Some(_) => Access::Deny,
    }
}
