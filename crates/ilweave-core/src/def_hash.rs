//! Deterministic hash-based declaration identity.
//!
//! [`DefHash`] is a 64-bit key computed from a declaration's identity
//! `(kind, declaring scope, member name)`. Because it only depends on names it
//! can be computed at the first reference to a declaration, long before the
//! declaration itself is visited, which is what makes forward stubs possible.
//!
//! # Hash Computation
//!
//! Uses XXHash64 with a domain constant per [`MemberKind`] so that, for
//! example, a field and a method sharing a name in the same type never share a
//! key. Method identities additionally mix in their parameter types
//! positionally, so overloads get distinct keys.
//!
//! A hash is only an index: the definition table still compares the full
//! identity on every hit and reports a collision instead of silently aliasing.
//!
//! # Examples
//!
//! ```
//! use ilweave_core::{DefHash, MemberKind};
//!
//! let a = DefHash::of(MemberKind::Field, "Demo.Point", "x");
//! let b = DefHash::of(MemberKind::Method, "Demo.Point", "x");
//! assert_ne!(a, b);
//!
//! let add_ii = DefHash::of_method("Demo.Math", "Add", &["int", "int"]);
//! let add_dd = DefHash::of_method("Demo.Math", "Add", &["double", "double"]);
//! assert_ne!(add_ii, add_dd);
//! ```

use std::fmt;

use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants.
pub mod hash_constants {
    /// Separator between the scope and the name.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    pub const TYPE: u64 = 0x2fac10b63a6cc57c;
    pub const FIELD: u64 = 0x6b1f0a3c9e27d845;
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;
    pub const PROPERTY: u64 = 0x3e9f5d2a8c7b1403;
    pub const EVENT: u64 = 0x9a7f3d5e2b8c4601;
    pub const PARAMETER: u64 = 0x1a095090689d4647;
    pub const LOCAL: u64 = 0x5ea77ffbcdf5f302;

    /// Parameter position markers so that `(int, long)` and `(long, int)`
    /// hash differently.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x0f1e2d3c4b5a6978,
    ];
}

/// The kind of declaration a definition stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Type,
    Field,
    Method,
    Property,
    Event,
    Parameter,
    LocalVariable,
}

impl MemberKind {
    /// Mixing constant for this kind.
    pub const fn domain(self) -> u64 {
        use hash_constants::*;
        match self {
            MemberKind::Type => TYPE,
            MemberKind::Field => FIELD,
            MemberKind::Method => METHOD,
            MemberKind::Property => PROPERTY,
            MemberKind::Event => EVENT,
            MemberKind::Parameter => PARAMETER,
            MemberKind::LocalVariable => LOCAL,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MemberKind::Type => "type",
            MemberKind::Field => "field",
            MemberKind::Method => "method",
            MemberKind::Property => "property",
            MemberKind::Event => "event",
            MemberKind::Parameter => "parameter",
            MemberKind::LocalVariable => "local",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deterministic 64-bit key for a declaration identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DefHash(pub u64);

impl DefHash {
    pub const EMPTY: DefHash = DefHash(0);

    /// Key for `(kind, scope, name)`.
    #[inline]
    pub fn of(kind: MemberKind, scope: &str, name: &str) -> Self {
        let scope_hash = xxh64(scope.as_bytes(), 0);
        let name_hash = xxh64(name.as_bytes(), 0);
        DefHash(
            (kind.domain() ^ scope_hash)
                .wrapping_mul(hash_constants::SEP)
                .wrapping_add(name_hash),
        )
    }

    /// Key for a method, mixing its parameter type names positionally.
    pub fn of_method(scope: &str, name: &str, param_types: &[&str]) -> Self {
        let mut hash = Self::of(MemberKind::Method, scope, name).0;
        for (i, param) in param_types.iter().enumerate() {
            let marker = hash_constants::PARAM_MARKERS
                .get(i)
                .copied()
                .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
            hash = hash
                .wrapping_mul(hash_constants::SEP)
                .wrapping_add(marker ^ xxh64(param.as_bytes(), 0));
        }
        DefHash(hash)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for DefHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefHash({:#018x})", self.0)
    }
}

impl fmt::Display for DefHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
