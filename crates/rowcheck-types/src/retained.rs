//! Structural export hook for encapsulation audits.
//!
//! Rust has no runtime reflection over struct fields, so a subject opts in by
//! listing what it retains: one [`Retained`] entry per field, plus an optional
//! embedded base whose fields are audited the same way. Type identities come
//! from [`std::any::type_name`], which is stable enough for allow-listing by
//! path, module, or crate.

use std::fmt;

use serde::{Deserialize, Serialize};

const PRIMITIVES: &[&str] = &[
    "bool", "char", "str", "()", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32",
    "u64", "u128", "usize", "f32", "f64",
];

/// Runtime identity of a retained type, after stripping references,
/// arrays, slices, and trait-object bounds down to their element type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeIdentity {
    /// Fully qualified path without generic arguments, e.g. `alloc::vec::Vec`.
    pub path: String,
    /// Module containing the type, e.g. `alloc::vec`. Empty for primitives.
    pub module: String,
    /// Crate the type is defined in, e.g. `alloc`. Empty for primitives.
    pub krate: String,
}

impl TypeIdentity {
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self::parse(std::any::type_name::<T>())
    }

    /// Every nominal type inside `T`; a tuple yields one identity per
    /// element, recursively.
    #[must_use]
    pub fn all_of<T: ?Sized>() -> Vec<Self> {
        Self::parse_all(std::any::type_name::<T>())
    }

    /// Parse a `type_name`-style string naming one nominal type. A tuple is
    /// kept whole as a module-less path; use [`Self::parse_all`] to split it.
    #[must_use]
    pub fn parse(type_name: &str) -> Self {
        let element = element_type(type_name);
        if tuple_elements(element).is_some() {
            return Self {
                path: element.to_owned(),
                module: String::new(),
                krate: String::new(),
            };
        }
        let path = strip_generics(element);
        let (module, krate) = match path.rfind("::") {
            Some(pos) => {
                let module = &path[..pos];
                let krate = module.split("::").next().unwrap_or(module);
                (module.to_owned(), krate.to_owned())
            }
            None => (String::new(), String::new()),
        };
        Self {
            path: path.to_owned(),
            module,
            krate,
        }
    }

    /// Like [`Self::parse`], splitting tuples into their element types.
    #[must_use]
    pub fn parse_all(type_name: &str) -> Vec<Self> {
        let element = element_type(type_name);
        match tuple_elements(element) {
            Some(parts) => parts.into_iter().flat_map(Self::parse_all).collect(),
            None => vec![Self::parse(element)],
        }
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&self.path.as_str())
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Peel `&`, `&mut`, `[T; N]`, `[T]` and `dyn A + B` until a nominal type
/// or a tuple remains.
fn element_type(mut name: &str) -> &str {
    loop {
        let trimmed = name.trim();
        if let Some(rest) = trimmed.strip_prefix("&mut ") {
            name = rest;
        } else if let Some(rest) = trimmed.strip_prefix('&') {
            name = rest;
        } else if let Some(rest) = trimmed.strip_prefix("dyn ") {
            name = top_level_split(rest, '+').into_iter().next().unwrap_or(rest);
        } else if let Some(inner) = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
        {
            name = match top_level_semicolon(inner) {
                Some(pos) => &inner[..pos],
                None => inner,
            };
        } else {
            return trimmed;
        }
    }
}

fn top_level_semicolon(s: &str) -> Option<usize> {
    let parts = top_level_split(s, ';');
    (parts.len() > 1).then(|| parts[0].len())
}

/// Split `s` at every `sep` outside angle brackets, brackets and parens.
/// The `>` of a `->` arrow does not close anything. Parts keep their
/// surrounding whitespace.
fn top_level_split(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut start = 0;
    let mut prev = ' ';
    for (i, ch) in s.char_indices() {
        match ch {
            '<' | '[' | '(' => depth += 1,
            '>' if prev == '-' => {}
            '>' | ']' | ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
        prev = ch;
    }
    parts.push(&s[start..]);
    parts
}

/// Element types of a non-unit tuple such as `(A, B)` or `(A,)`.
fn tuple_elements(name: &str) -> Option<Vec<&str>> {
    let inner = name.strip_prefix('(')?.strip_suffix(')')?;
    if inner.trim().is_empty() {
        return None;
    }
    let parts: Vec<&str> = top_level_split(inner, ',')
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    Some(parts)
}

/// Drop generic arguments and `Fn(..) -> ..` sugar from a nominal path.
fn strip_generics(name: &str) -> &str {
    name.find(['<', '('])
        .filter(|&pos| pos > 0)
        .map_or(name, |pos| name[..pos].trim_end())
}

/// One retained field of a subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retained {
    pub field: &'static str,
    /// Types the field holds: one for a nominal type, one per element for a
    /// tuple, none when the field currently holds nothing (an empty `Option`).
    pub types: Vec<TypeIdentity>,
}

impl Retained {
    /// Report `field` as holding a value of type `T`.
    #[must_use]
    pub fn of<T: ?Sized>(field: &'static str, _value: &T) -> Self {
        Self {
            field,
            types: TypeIdentity::all_of::<T>(),
        }
    }

    /// Report an optional field; an empty option is skipped by the audit.
    #[must_use]
    pub fn optional<T>(field: &'static str, value: Option<&T>) -> Self {
        Self {
            field,
            types: value.map_or_else(Vec::new, |_| TypeIdentity::all_of::<T>()),
        }
    }
}

/// Implemented by subjects that expose their retained field graph.
pub trait Encapsulated {
    /// Fields declared directly on this type.
    fn retained(&self) -> Vec<Retained>;

    /// Embedded base whose fields count as this subject's too.
    fn base(&self) -> Option<&dyn Encapsulated> {
        None
    }
}
