//! Join options — key lists, suffixes, join kinds and the index-pair result.

use crate::error::{TesseraError, TesseraResult};
use serde::{Deserialize, Serialize};

/// Equi-join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Outer,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Outer => "outer",
        }
    }

    /// Unmatched left rows survive with null right columns.
    pub fn preserves_left(&self) -> bool {
        matches!(self, JoinKind::Left | JoinKind::Outer)
    }

    /// Unmatched right rows survive with null left columns.
    pub fn preserves_right(&self) -> bool {
        matches!(self, JoinKind::Right | JoinKind::Outer)
    }
}

/// Join key columns.
///
/// `Same` names columns present on both sides; `Pairs` matches `left[i]`
/// against `right[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOn {
    Same(Vec<String>),
    Pairs { left: Vec<String>, right: Vec<String> },
}

impl JoinOn {
    pub fn pairs<L, R>(left: L, right: R) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        JoinOn::Pairs {
            left: left.into_iter().map(Into::into).collect(),
            right: right.into_iter().map(Into::into).collect(),
        }
    }

    /// `(left, right)` name pairs; empty or unequal lists are rejected.
    pub fn resolve(&self) -> TesseraResult<Vec<(String, String)>> {
        let pairs: Vec<(String, String)> = match self {
            JoinOn::Same(names) => names.iter().map(|n| (n.clone(), n.clone())).collect(),
            JoinOn::Pairs { left, right } => {
                if left.len() != right.len() {
                    return Err(TesseraError::InvalidArguments(format!(
                        "join key lists differ in length: {} left vs {} right",
                        left.len(),
                        right.len()
                    )));
                }
                left.iter().cloned().zip(right.iter().cloned()).collect()
            }
        };
        if pairs.is_empty() {
            return Err(TesseraError::InvalidArguments(
                "at least one join key is required".to_string(),
            ));
        }
        Ok(pairs)
    }
}

impl From<&str> for JoinOn {
    fn from(name: &str) -> Self {
        JoinOn::Same(vec![name.to_string()])
    }
}

impl From<String> for JoinOn {
    fn from(name: String) -> Self {
        JoinOn::Same(vec![name])
    }
}

impl From<&[&str]> for JoinOn {
    fn from(names: &[&str]) -> Self {
        JoinOn::Same(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for JoinOn {
    fn from(names: [&str; N]) -> Self {
        JoinOn::Same(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<Vec<&str>> for JoinOn {
    fn from(names: Vec<&str>) -> Self {
        JoinOn::Same(names.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for JoinOn {
    fn from(names: Vec<String>) -> Self {
        JoinOn::Same(names)
    }
}

impl From<(&str, &str)> for JoinOn {
    fn from((left, right): (&str, &str)) -> Self {
        JoinOn::pairs([left], [right])
    }
}

/// Suffixes appended to colliding column names. `None` leaves that side's
/// name unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suffixes {
    pub left: Option<String>,
    pub right: Option<String>,
}

impl Suffixes {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: Some(left.into()),
            right: Some(right.into()),
        }
    }

    /// No renaming at all; any collision becomes a duplicate-column error.
    pub fn none() -> Self {
        Self {
            left: None,
            right: None,
        }
    }
}

impl Default for Suffixes {
    fn default() -> Self {
        Self::new("_x", "_y")
    }
}

/// Options for an equi-join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOptions {
    pub on: JoinOn,
    /// Falls back to the engine's configured suffixes when `None`
    pub suffixes: Option<Suffixes>,
    /// Treat null keys as equal to each other
    pub null_equals_null: bool,
}

impl JoinOptions {
    pub fn new(on: impl Into<JoinOn>) -> Self {
        Self {
            on: on.into(),
            suffixes: None,
            null_equals_null: false,
        }
    }

    pub fn with_suffixes(mut self, suffixes: Suffixes) -> Self {
        self.suffixes = Some(suffixes);
        self
    }

    pub fn with_null_equals_null(mut self, enabled: bool) -> Self {
        self.null_equals_null = enabled;
        self
    }
}

/// Which right row an asof join picks for each left row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsofDirection {
    /// Last right row with `right_key <= left_key`
    #[default]
    Backward,
    /// First right row with `right_key >= left_key`
    Forward,
    /// Closer of the two; the backward candidate wins ties
    Nearest,
}

impl AsofDirection {
    pub fn parse(s: &str) -> TesseraResult<Self> {
        match s.to_lowercase().as_str() {
            "backward" => Ok(AsofDirection::Backward),
            "forward" => Ok(AsofDirection::Forward),
            "nearest" => Ok(AsofDirection::Nearest),
            _ => Err(TesseraError::InvalidArguments(format!(
                "invalid asof direction: '{s}'. Valid options: backward, forward, nearest"
            ))),
        }
    }
}

/// Options for an asof join.
#[derive(Debug, Clone, PartialEq)]
pub struct AsofOptions {
    /// Exactly one orderable key pair
    pub on: JoinOn,
    /// Exact-match grouping keys
    pub by: Option<JoinOn>,
    pub direction: AsofDirection,
    /// Maximum absolute key distance for a match
    pub tolerance: Option<f64>,
    pub suffixes: Option<Suffixes>,
}

impl AsofOptions {
    pub fn new(on: impl Into<JoinOn>) -> Self {
        Self {
            on: on.into(),
            by: None,
            direction: AsofDirection::Backward,
            tolerance: None,
            suffixes: None,
        }
    }

    pub fn by(mut self, by: impl Into<JoinOn>) -> Self {
        self.by = Some(by.into());
        self
    }

    pub fn direction(mut self, direction: AsofDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_suffixes(mut self, suffixes: Suffixes) -> Self {
        self.suffixes = Some(suffixes);
        self
    }
}

/// Physical row pairs produced by a join; `None` marks the missing side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinIndices {
    pub left: Vec<Option<usize>>,
    pub right: Vec<Option<usize>>,
}

impl JoinIndices {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            left: Vec::with_capacity(capacity),
            right: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, left: Option<usize>, right: Option<usize>) {
        self.left.push(left);
        self.right.push(right);
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Map positions in the visible row lists back to physical rows.
    pub(crate) fn to_physical(&self, left_rows: &[usize], right_rows: &[usize]) -> Self {
        Self {
            left: self.left.iter().map(|p| p.map(|p| left_rows[p])).collect(),
            right: self.right.iter().map(|p| p.map(|p| right_rows[p])).collect(),
        }
    }
}
