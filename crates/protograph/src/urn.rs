//! URN identity and version-range resolution.
//!
//! Every artifact is addressed by an immutable identifier:
//!
//! ```text
//! urn:proto:<kind>:<authority>/<id>[@<version-or-range>]
//! ```
//!
//! `kind` is one of `api`, `api.endpoint`, `data`, `event`, `semantic`. An exact
//! version matches `\d+\.\d+\.\d+`; the suffix may instead be a range
//! expression:
//!
//! | Form              | Matches                                   |
//! |-------------------|-------------------------------------------|
//! | `1.2.3`           | exactly `1.2.3`                           |
//! | `^1.2.3`          | same major, `>= 1.2.3`                    |
//! | `~1.2.3`          | same major.minor, patch `>= 3`            |
//! | `>=1.2.3`         | anything `>= 1.2.3`                       |
//! | `>=1.2.3 <2.0.0`  | bounded range (`<=` makes the top inclusive) |
//!
//! URNs compare by their canonical string form. A *bare* URN (no version)
//! groups every versioned sibling of the same `kind/authority/id`.
//!
//! # Example
//!
//! ```
//! use protograph::urn::{resolve_version_range, Urn, Version};
//!
//! let urn: Urn = "urn:proto:api:acme.com/billing@^1.0.0".parse().unwrap();
//! let candidates: Vec<Version> = ["1.0.0", "1.5.0", "2.0.0"]
//!     .iter()
//!     .map(|v| v.parse().unwrap())
//!     .collect();
//!
//! let matching = resolve_version_range(&urn, &candidates);
//! assert_eq!(matching.len(), 2);
//! ```

use crate::domain::ArtifactKind;
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

/// Scheme prefix shared by every protocol artifact URN.
pub const URN_PREFIX: &str = "urn:proto:";

static URN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^urn:proto:(api\.endpoint|api|data|event|semantic):([A-Za-z0-9][A-Za-z0-9._-]*)/([^@\s]+)(?:@(.+))?$",
    )
    .expect("URN pattern is a valid regex")
});

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
}

impl Version {
    /// Create a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::invalid_urn(s, "version must be major.minor.patch"));
        };

        let component = |part: &str| -> Result<u64> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::invalid_urn(
                    s,
                    format!("version component '{part}' is not numeric"),
                ));
            }
            part.parse()
                .map_err(|_| Error::invalid_urn(s, format!("version component '{part}' overflows")))
        };

        Ok(Self::new(component(major)?, component(minor)?, component(patch)?))
    }
}

/// A version constraint carried in a URN's `@` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionReq {
    /// `1.2.3`
    Exact(Version),
    /// `^1.2.3`: same major, at least the given version
    Caret(Version),
    /// `~1.2.3`: same major.minor, at least the given patch
    Tilde(Version),
    /// `>=1.2.3`
    AtLeast(Version),
    /// `>=1.2.3 <2.0.0` or `>=1.2.3 <=2.0.0`
    Bounded {
        /// Inclusive lower bound
        lower: Version,
        /// Upper bound
        upper: Version,
        /// Whether `upper` itself matches
        upper_inclusive: bool,
    },
}

impl VersionReq {
    /// Returns `true` if `version` satisfies this constraint.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::Caret(v) => version.major == v.major && version >= v,
            Self::Tilde(v) => {
                version.major == v.major && version.minor == v.minor && version.patch >= v.patch
            }
            Self::AtLeast(v) => version >= v,
            Self::Bounded {
                lower,
                upper,
                upper_inclusive,
            } => {
                version >= lower
                    && match version.cmp(upper) {
                        Ordering::Less => true,
                        Ordering::Equal => *upper_inclusive,
                        Ordering::Greater => false,
                    }
            }
        }
    }

    /// The pinned version, if this is an exact requirement.
    #[must_use]
    pub fn exact(&self) -> Option<Version> {
        match self {
            Self::Exact(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Caret(v) => write!(f, "^{v}"),
            Self::Tilde(v) => write!(f, "~{v}"),
            Self::AtLeast(v) => write!(f, ">={v}"),
            Self::Bounded {
                lower,
                upper,
                upper_inclusive: true,
            } => write!(f, ">={lower} <={upper}"),
            Self::Bounded {
                lower,
                upper,
                upper_inclusive: false,
            } => write!(f, ">={lower} <{upper}"),
        }
    }
}

impl FromStr for VersionReq {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix('^') {
            return Ok(Self::Caret(rest.parse()?));
        }
        if let Some(rest) = s.strip_prefix('~') {
            return Ok(Self::Tilde(rest.parse()?));
        }
        if let Some(rest) = s.strip_prefix(">=") {
            // Bounds are separated by exactly one space.
            let Some((lower, upper)) = rest.split_once(' ') else {
                return Ok(Self::AtLeast(rest.parse()?));
            };
            let lower: Version = lower.parse()?;
            let (upper, upper_inclusive) = if let Some(v) = upper.strip_prefix("<=") {
                (v, true)
            } else if let Some(v) = upper.strip_prefix('<') {
                (v, false)
            } else {
                return Err(Error::invalid_urn(s, "upper bound must start with '<' or '<='"));
            };
            let upper: Version = upper.parse()?;
            if upper < lower {
                return Err(Error::invalid_urn(s, "upper bound is below lower bound"));
            }
            return Ok(Self::Bounded {
                lower,
                upper,
                upper_inclusive,
            });
        }
        Ok(Self::Exact(s.parse()?))
    }
}

/// A validated protocol artifact URN.
///
/// Equality, hashing and ordering use the canonical string form. The grammar
/// admits no stray whitespace, so the canonical form is the input itself.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Urn {
    canonical: String,
    /// Byte length of the `urn:proto:<kind>:<authority>/<id>` prefix.
    bare_len: usize,
    kind: ArtifactKind,
    authority: String,
    id: String,
    version: Option<VersionReq>,
}

impl Urn {
    /// Parse and validate a URN.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrn` if the input does not match the grammar or
    /// the version suffix is neither an exact version nor a range expression.
    pub fn parse(input: &str) -> Result<Self> {
        let captures = URN_PATTERN.captures(input).ok_or_else(|| {
            let reason = if input.starts_with(URN_PREFIX) {
                "expected urn:proto:<kind>:<authority>/<id>[@<version>]"
            } else {
                "missing 'urn:proto:' prefix"
            };
            Error::invalid_urn(input, reason)
        })?;

        let kind: ArtifactKind = captures[1]
            .parse()
            .map_err(|_| Error::invalid_urn(input, "unknown kind"))?;
        let authority = captures[2].to_string();
        let id = captures[3].to_string();
        let version = captures
            .get(4)
            .map(|m| {
                m.as_str()
                    .parse::<VersionReq>()
                    .map_err(|e| Error::invalid_urn(input, e.to_string()))
            })
            .transpose()?;

        Ok(Self::from_parts(kind, authority, id, version))
    }

    fn from_parts(
        kind: ArtifactKind,
        authority: String,
        id: String,
        version: Option<VersionReq>,
    ) -> Self {
        let bare = format!("{URN_PREFIX}{kind}:{authority}/{id}");
        let bare_len = bare.len();
        let canonical = match &version {
            Some(req) => format!("{bare}@{req}"),
            None => bare,
        };
        Self {
            canonical,
            bare_len,
            kind,
            authority,
            id,
            version,
        }
    }

    /// The canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// The canonical form with the version suffix stripped.
    #[must_use]
    pub fn bare_str(&self) -> &str {
        &self.canonical[..self.bare_len]
    }

    /// Artifact kind segment.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Authority segment (e.g. `acme.com`).
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Identifier segment following the authority.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version constraint, if any.
    #[must_use]
    pub fn version(&self) -> Option<&VersionReq> {
        self.version.as_ref()
    }

    /// The exact version, if the suffix pins one.
    #[must_use]
    pub fn exact_version(&self) -> Option<Version> {
        self.version.as_ref().and_then(VersionReq::exact)
    }

    /// Returns `true` if the URN carries no version suffix.
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.version.is_none()
    }

    /// Returns `true` if the suffix is a range rather than an exact version.
    #[must_use]
    pub fn is_range(&self) -> bool {
        matches!(self.version, Some(req) if req.exact().is_none())
    }

    /// This URN without its version suffix.
    #[must_use]
    pub fn bare(&self) -> Self {
        Self::from_parts(self.kind, self.authority.clone(), self.id.clone(), None)
    }

    /// This URN pinned to an exact version.
    #[must_use]
    pub fn with_version(&self, version: Version) -> Self {
        Self::from_parts(
            self.kind,
            self.authority.clone(),
            self.id.clone(),
            Some(VersionReq::Exact(version)),
        )
    }

    /// Returns `true` if `other` shares this URN's bare identity.
    #[must_use]
    pub fn same_identity(&self, other: &Urn) -> bool {
        self.bare_str() == other.bare_str()
    }

    /// Returns `true` if `candidate` is a versioned sibling satisfying this
    /// URN's constraint. A bare URN matches every sibling.
    #[must_use]
    pub fn matches(&self, candidate: &Urn) -> bool {
        if !self.same_identity(candidate) {
            return false;
        }
        match (&self.version, candidate.exact_version()) {
            (None, _) => true,
            (Some(req), Some(version)) => req.matches(&version),
            (Some(_), None) => false,
        }
    }
}

impl PartialEq for Urn {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Urn {}

impl Hash for Urn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for Urn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Urn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Debug for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Urn({})", self.canonical)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for Urn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Urn {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.canonical
    }
}

impl AsRef<str> for Urn {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

/// Resolve `urn`'s version suffix against candidate versions of the same
/// bare identity.
///
/// Returns every matching version in ascending order, without duplicates. A
/// bare `urn` matches all candidates.
#[must_use]
pub fn resolve_version_range(urn: &Urn, candidates: &[Version]) -> Vec<Version> {
    let mut matching: Vec<Version> = candidates
        .iter()
        .filter(|v| urn.version().is_none_or(|req| req.matches(v)))
        .copied()
        .collect();
    matching.sort_unstable();
    matching.dedup();
    matching
}

/// The highest candidate version satisfying `urn`'s suffix.
#[must_use]
pub fn resolve_latest(urn: &Urn, candidates: &[Version]) -> Option<Version> {
    resolve_version_range(urn, candidates).pop()
}
