//! Hierarchical names.
//!
//! A [`Name`] is a sequence of [`Label`]s stored leftmost (most specific)
//! first. An absolute name ends in the empty *root label*. Names are ordered
//! the DNS canonical way: the rightmost label is compared first, labels are
//! compared octet-wise after ASCII lowercasing, and a label sorts before any
//! longer label it is a prefix of.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Maximum octets in one label.
pub const MAX_LABEL_LEN: usize = 63;
/// Maximum wire length of a name, counting one length octet per label.
pub const MAX_NAME_LEN: usize = 255;
/// Maximum number of labels in a name, root label included.
pub const MAX_LABELS: usize = 128;

/// Errors produced while building or combining names.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    #[error("empty label inside a name")]
    EmptyLabel,
    #[error("label longer than 63 octets")]
    LabelTooLong,
    #[error("name longer than 255 octets")]
    TooLong,
    #[error("name has more than 128 labels")]
    TooManyLabels,
    #[error("invalid escape sequence")]
    BadEscape,
}

// =============================================================================
// Label
// =============================================================================

/// One component of a name.
///
/// Equality, ordering and hashing ignore ASCII case.
#[derive(Clone)]
pub struct Label(Box<[u8]>);

impl Label {
    pub fn new(bytes: &[u8]) -> Result<Self, NameError> {
        if bytes.len() > MAX_LABEL_LEN {
            return Err(NameError::LabelTooLong);
        }
        Ok(Self(bytes.into()))
    }

    /// The empty label that terminates every absolute name.
    pub fn root() -> Self {
        Self(Box::default())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    fn canonical_cmp(&self, other: &Label) -> Ordering {
        let a = self.0.iter().map(u8::to_ascii_lowercase);
        let b = other.0.iter().map(u8::to_ascii_lowercase);
        a.cmp(b)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.len());
        for b in self.0.iter() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            match b {
                b'.' | b'\\' => write!(f, "\\{}", b as char)?,
                0x21..=0x7e => write!(f, "{}", b as char)?,
                _ => write!(f, "\\{b:03}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label(\"{self}\")")
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// How two names relate hierarchically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// No trailing label in common.
    None,
    /// At least one trailing label in common, neither contains the other.
    CommonAncestor,
    /// The first name is strictly above the second.
    Superdomain,
    /// The first name is strictly below the second.
    Subdomain,
    Equal,
}

/// Result of [`full_compare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NameComparison {
    pub relation: Relation,
    /// Canonical ordering of the first name relative to the second.
    pub order: Ordering,
    /// Number of trailing labels the two names share.
    pub common_labels: usize,
}

/// Compares two label sequences from the rightmost label leftwards.
pub fn full_compare(a: &[Label], b: &[Label]) -> NameComparison {
    let mut common = 0;
    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        let order = x.canonical_cmp(y);
        if order != Ordering::Equal {
            let relation = if common > 0 {
                Relation::CommonAncestor
            } else {
                Relation::None
            };
            return NameComparison {
                relation,
                order,
                common_labels: common,
            };
        }
        common += 1;
    }

    let (relation, order) = match a.len().cmp(&b.len()) {
        Ordering::Equal => (Relation::Equal, Ordering::Equal),
        Ordering::Greater => (Relation::Subdomain, Ordering::Greater),
        Ordering::Less => (Relation::Superdomain, Ordering::Less),
    };
    NameComparison {
        relation,
        order,
        common_labels: common,
    }
}

fn wire_len(labels: &[Label]) -> usize {
    labels.iter().map(|l| l.len() + 1).sum()
}

fn validate(labels: &[Label]) -> Result<(), NameError> {
    if labels.len() > MAX_LABELS {
        return Err(NameError::TooManyLabels);
    }
    if let Some((_, inner)) = labels.split_last() {
        if inner.iter().any(Label::is_root) {
            return Err(NameError::EmptyLabel);
        }
    }
    if wire_len(labels) > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }
    Ok(())
}

// =============================================================================
// Name
// =============================================================================

/// An owned sequence of labels, leftmost label first.
#[derive(Clone, Default)]
pub struct Name {
    labels: Vec<Label>,
}

impl Name {
    /// The root name `"."`.
    pub fn root() -> Self {
        Self {
            labels: vec![Label::root()],
        }
    }

    /// Builds a name from labels, checking label placement and size limits.
    pub fn from_labels(labels: Vec<Label>) -> Result<Self, NameError> {
        validate(&labels)?;
        Ok(Self { labels })
    }

    /// Builds a name from labels already known to satisfy the limits, such
    /// as a slice of another valid name.
    pub(crate) fn from_labels_unchecked(labels: Vec<Label>) -> Self {
        debug_assert!(validate(&labels).is_ok());
        Self { labels }
    }

    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    #[inline]
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.labels.last().is_some_and(Label::is_root)
    }

    pub fn is_root(&self) -> bool {
        self.labels.len() == 1 && self.labels[0].is_root()
    }

    /// Length in wire format, one length octet per label included.
    pub fn wire_len(&self) -> usize {
        wire_len(&self.labels)
    }

    /// The first `n` labels as a relative name, or `None` when the name has
    /// fewer than `n` labels.
    pub fn prefix(&self, n: usize) -> Option<Name> {
        let labels = self.labels.get(..n)?;
        Some(Self {
            labels: labels.to_vec(),
        })
    }

    /// The last `n` labels, or `None` when the name has fewer than `n`.
    pub fn suffix(&self, n: usize) -> Option<Name> {
        let at = self.labels.len().checked_sub(n)?;
        Some(Self {
            labels: self.labels[at..].to_vec(),
        })
    }

    /// Splits off the last `suffix_labels` labels, returning
    /// `(prefix, suffix)`. `None` when the name has fewer labels.
    pub fn split(&self, suffix_labels: usize) -> Option<(Name, Name)> {
        let at = self.labels.len().checked_sub(suffix_labels)?;
        Some((self.prefix(at)?, self.suffix(suffix_labels)?))
    }

    /// `prefix` followed by `suffix`, checked against the size limits.
    pub fn concat(prefix: &[Label], suffix: &[Label]) -> Result<Name, NameError> {
        let mut labels = Vec::with_capacity(prefix.len() + suffix.len());
        labels.extend_from_slice(prefix);
        labels.extend_from_slice(suffix);
        Self::from_labels(labels)
    }

    pub fn compare(&self, other: &Name) -> NameComparison {
        full_compare(&self.labels, &other.labels)
    }

    /// True when `self` equals `other` or lies below it.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        matches!(
            self.compare(other).relation,
            Relation::Equal | Relation::Subdomain
        )
    }

    /// Displays a borrowed label sequence, such as the run stored in a node.
    pub fn display(labels: &[Label]) -> DisplayLabels<'_> {
        DisplayLabels(labels)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other).order
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.labels.hash(state);
    }
}

impl FromStr for Name {
    type Err = NameError;

    /// Parses dotted text. A trailing dot makes the name absolute; `\.`,
    /// `\\` and `\DDD` escapes are understood.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "." {
            return Ok(Self::root());
        }

        let bytes = s.as_bytes();
        let mut labels = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        let mut absolute = false;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    if current.is_empty() {
                        return Err(NameError::EmptyLabel);
                    }
                    labels.push(Label::new(&current)?);
                    current.clear();
                    absolute = i + 1 == bytes.len();
                }
                b'\\' => match &bytes[i + 1..] {
                    [d0, d1, d2, ..]
                        if d0.is_ascii_digit() && d1.is_ascii_digit() && d2.is_ascii_digit() =>
                    {
                        let value = u16::from(d0 - b'0') * 100
                            + u16::from(d1 - b'0') * 10
                            + u16::from(d2 - b'0');
                        let byte = u8::try_from(value).map_err(|_| NameError::BadEscape)?;
                        current.push(byte);
                        i += 3;
                    }
                    [c, ..] if !c.is_ascii_digit() => {
                        current.push(*c);
                        i += 1;
                    }
                    _ => return Err(NameError::BadEscape),
                },
                b => current.push(b),
            }
            i += 1;
        }

        if !current.is_empty() {
            labels.push(Label::new(&current)?);
        } else if !absolute {
            return Err(NameError::EmptyLabel);
        }
        if absolute {
            labels.push(Label::root());
        }
        Self::from_labels(labels)
    }
}

/// Display adapter returned by [`Name::display`].
pub struct DisplayLabels<'a>(&'a [Label]);

impl fmt::Display for DisplayLabels<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.0 {
            if only.is_root() {
                return f.write_str(".");
            }
        }
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{label}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Name::display(&self.labels).fmt(f)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name(\"{self}\")")
    }
}
