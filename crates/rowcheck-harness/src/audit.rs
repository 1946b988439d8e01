//! Encapsulation audit over a subject's retained field graph.
//!
//! Walks the subject's own fields and then each embedded base in turn,
//! resolving every non-empty, non-primitive field to its element types and
//! collecting every type the allow-list does not cover. All violations are
//! reported together.

use std::collections::BTreeSet;

use rowcheck_types::{Encapsulated, TypeIdentity};
use tracing::warn;

/// Base chains deeper than this are assumed to be self-referential.
const MAX_BASE_DEPTH: usize = 64;

/// Names a retained type may match to be allowed: its full path, its
/// module, or its crate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: BTreeSet<String>,
}

impl AllowList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Language-level types every container needs: all of `core`, plus
    /// strings, boxes, and reference-counted pointers from `alloc`.
    #[must_use]
    pub fn language_core() -> Self {
        Self::new()
            .allow("core")
            .allow("alloc::string")
            .allow("alloc::boxed")
            .allow("alloc::rc")
            .allow("alloc::sync")
    }

    /// Allow a type path, a module, or a crate name.
    #[must_use]
    pub fn allow(mut self, entry: impl Into<String>) -> Self {
        self.entries.insert(entry.into());
        self
    }

    #[must_use]
    pub fn permits(&self, ty: &TypeIdentity) -> bool {
        self.entries.contains(&ty.path)
            || (!ty.module.is_empty() && self.entries.contains(&ty.module))
            || (!ty.krate.is_empty() && self.entries.contains(&ty.krate))
    }
}

/// Every retained type of `subject` that `allow` does not cover.
#[must_use]
pub fn audit(subject: &dyn Encapsulated, allow: &AllowList) -> BTreeSet<TypeIdentity> {
    let mut violations = BTreeSet::new();
    let mut level = Some(subject);
    let mut depth = 0_usize;
    while let Some(current) = level {
        if depth == MAX_BASE_DEPTH {
            warn!(depth, "base chain too deep; audit stopped early");
            break;
        }
        for ty in current.retained().into_iter().flat_map(|r| r.types) {
            if ty.is_primitive() || allow.permits(&ty) {
                continue;
            }
            violations.insert(ty);
        }
        level = current.base();
        depth += 1;
    }
    violations
}
