use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

pub const STANDARD_DEPTH: usize = 3;
pub const STANDARD_WIDTH: usize = 10;
pub const STANDARD_LEVEL_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);
pub const MAX_TOTAL_INVOCATIONS: usize = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FanOutLevel {
    pub width: usize,
    pub timeout_secs: u64,
}

impl FanOutLevel {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Nested "run N copies in parallel, wait for all" levels. `levels[0]` is
/// level 1 (the top); the last level invokes the benchmark task itself.
/// Deserialization goes through [`FanOutTopology::new`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "UncheckedTopology")]
pub struct FanOutTopology {
    levels: Vec<FanOutLevel>,
}

#[derive(Deserialize)]
struct UncheckedTopology {
    levels: Vec<FanOutLevel>,
}

impl TryFrom<UncheckedTopology> for FanOutTopology {
    type Error = TopologyError;

    fn try_from(unchecked: UncheckedTopology) -> Result<Self, Self::Error> {
        Self::new(unchecked.levels)
    }
}

impl FanOutTopology {
    pub fn new(levels: Vec<FanOutLevel>) -> Result<Self, TopologyError> {
        if levels.is_empty() {
            return Err(TopologyError::NoLevels);
        }

        let mut total = 1usize;
        for (index, level) in levels.iter().enumerate() {
            if level.width == 0 {
                return Err(TopologyError::ZeroWidth { level: index + 1 });
            }
            if level.timeout_secs == 0 {
                return Err(TopologyError::ZeroTimeout { level: index + 1 });
            }
            total = total.saturating_mul(level.width);
            if total > MAX_TOTAL_INVOCATIONS {
                return Err(TopologyError::TooManyInvocations {
                    max: MAX_TOTAL_INVOCATIONS,
                });
            }
        }

        Ok(Self { levels })
    }

    pub fn uniform(depth: usize, width: usize, timeout: Duration) -> Result<Self, TopologyError> {
        Self::new(vec![
            FanOutLevel {
                width,
                timeout_secs: timeout.as_secs(),
            };
            depth
        ])
    }

    /// 10 x 10 x 10 with a three hour ceiling per level.
    pub fn standard() -> Self {
        Self {
            levels: vec![
                FanOutLevel {
                    width: STANDARD_WIDTH,
                    timeout_secs: STANDARD_LEVEL_TIMEOUT.as_secs(),
                };
                STANDARD_DEPTH
            ],
        }
    }

    pub fn levels(&self) -> &[FanOutLevel] {
        &self.levels
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Level by 1-based number.
    pub fn level(&self, number: usize) -> Option<&FanOutLevel> {
        number.checked_sub(1).and_then(|index| self.levels.get(index))
    }

    pub fn total_invocations(&self) -> usize {
        self.levels.iter().map(|level| level.width).product()
    }

    /// Every leaf path in lexicographic order.
    pub fn leaf_paths(&self) -> Vec<BranchPath> {
        let mut paths = vec![BranchPath::root()];
        for level in &self.levels {
            paths = paths
                .iter()
                .flat_map(|path| (0..level.width).map(move |branch| path.child(branch)))
                .collect();
        }
        paths
    }
}

impl Default for FanOutTopology {
    fn default() -> Self {
        Self::standard()
    }
}

/// Branch indices from the top level down, e.g. `3/7/0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchPath(Vec<usize>);

impl BranchPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, branch: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(branch);
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for BranchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for (position, index) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str("/")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}
