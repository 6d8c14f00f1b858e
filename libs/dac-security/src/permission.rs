use std::fmt;
use std::ops::{BitAnd, BitOr, Sub};
use std::str::FromStr;

use thiserror::Error;

/// A named capability such as `read` or `comment`.
///
/// Capabilities are bit positions in a [`PermissionSet`]. The first eight are
/// built in; positions `CUSTOM_START..=MAX_INDEX` are free for host-defined
/// capabilities and serialize as `"custom_<index>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionType(u8);

const BUILTIN_NAMES: [&str; 8] = [
    "read", "edit", "delete", "create", "comment", "vote", "share", "restore",
];

impl PermissionType {
    pub const READ: Self = Self(0);
    pub const EDIT: Self = Self(1);
    pub const DELETE: Self = Self(2);
    pub const CREATE: Self = Self(3);
    pub const COMMENT: Self = Self(4);
    pub const VOTE: Self = Self(5);
    pub const SHARE: Self = Self(6);
    pub const RESTORE: Self = Self(7);

    pub const BUILTIN: [Self; 8] = [
        Self::READ,
        Self::EDIT,
        Self::DELETE,
        Self::CREATE,
        Self::COMMENT,
        Self::VOTE,
        Self::SHARE,
        Self::RESTORE,
    ];

    /// First bit position available for host-defined capabilities.
    pub const CUSTOM_START: u8 = 16;
    pub const MAX_INDEX: u8 = 63;

    /// Host-defined capability at `index`, or `None` when the index is
    /// reserved or out of range.
    #[must_use]
    pub const fn custom(index: u8) -> Option<Self> {
        if index >= Self::CUSTOM_START && index <= Self::MAX_INDEX {
            Some(Self(index))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn bit(self) -> u64 {
        1u64 << self.0
    }

    #[must_use]
    pub fn is_builtin(self) -> bool {
        usize::from(self.0) < BUILTIN_NAMES.len()
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match BUILTIN_NAMES.get(usize::from(self.0)) {
            Some(name) => f.write_str(name),
            None => write!(f, "custom_{}", self.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission '{0}'")]
pub struct ParsePermissionError(pub String);

impl FromStr for PermissionType {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(pos) = BUILTIN_NAMES
            .iter()
            .position(|n| *n == lower)
            .and_then(|pos| u8::try_from(pos).ok())
        {
            return Ok(Self(pos));
        }
        lower
            .strip_prefix("custom_")
            .and_then(|idx| idx.parse::<u8>().ok())
            .and_then(Self::custom)
            .ok_or_else(|| ParsePermissionError(s.to_owned()))
    }
}

impl serde::Serialize for PermissionType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for PermissionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Set of capabilities stored as a 64-bit mask.
///
/// Serializes as a list of capability names, e.g. `["read","comment"]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PermissionSet(u64);

impl PermissionSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// All built-in capabilities.
    #[must_use]
    pub fn builtin() -> Self {
        PermissionType::BUILTIN.into_iter().collect()
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, permission: PermissionType) -> bool {
        self.0 & permission.bit() != 0
    }

    /// `true` when every capability of `other` is also in `self`.
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, permission: PermissionType) {
        self.0 |= permission.bit();
    }

    pub fn remove(&mut self, permission: PermissionType) {
        self.0 &= !permission.bit();
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Capabilities in ascending bit order.
    pub fn iter(self) -> impl Iterator<Item = PermissionType> {
        (0..=PermissionType::MAX_INDEX)
            .map(PermissionType)
            .filter(move |p| self.contains(*p))
    }
}

impl From<PermissionType> for PermissionSet {
    fn from(permission: PermissionType) -> Self {
        Self(permission.bit())
    }
}

impl FromIterator<PermissionType> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

impl BitOr for PermissionSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOr<PermissionType> for PermissionSet {
    type Output = Self;
    fn bitor(self, rhs: PermissionType) -> Self {
        self.union(rhs.into())
    }
}

impl BitOr for PermissionType {
    type Output = PermissionSet;
    fn bitor(self, rhs: Self) -> PermissionSet {
        PermissionSet::from(self) | rhs
    }
}

impl BitAnd for PermissionSet {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl Sub for PermissionSet {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for p in self.iter() {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{p}")?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

impl serde::Serialize for PermissionSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> serde::Deserialize<'de> for PermissionSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let names = Vec::<PermissionType>::deserialize(deserializer)?;
        Ok(names.into_iter().collect())
    }
}
