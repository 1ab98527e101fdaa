use crate::BiblioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one of the academic repositories this crate crawls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    Acm,
    Arxiv,
    Ieee,
    ScienceDirect,
    SpringerLink,
}

impl SourceId {
    /// Every known source, in the order crawls are reported
    pub const ALL: [SourceId; 5] = [
        Self::Acm,
        Self::Arxiv,
        Self::Ieee,
        Self::ScienceDirect,
        Self::SpringerLink,
    ];

    /// Stable identifier used in the database, config tables and CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acm => "acm",
            Self::Arxiv => "arxiv",
            Self::Ieee => "ieee",
            Self::ScienceDirect => "science-direct",
            Self::SpringerLink => "springer-link",
        }
    }

    /// Human-readable repository name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Acm => "ACM",
            Self::Arxiv => "arXiv",
            Self::Ieee => "IEEE Xplore",
            Self::ScienceDirect => "Science Direct",
            Self::SpringerLink => "Springer Link",
        }
    }

    /// Parses a source from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SourceId {
    type Err = BiblioError;

    /// Accepts the stable id or the display name, ignoring case, spaces,
    /// underscores and hyphens ("Springer Link", "springer_link", "SPRINGERLINK")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squash = |v: &str| {
            v.chars()
                .filter(|c| !matches!(c, ' ' | '-' | '_'))
                .flat_map(char::to_lowercase)
                .collect::<String>()
        };
        let wanted = squash(s);

        Self::ALL
            .into_iter()
            .find(|id| squash(id.as_str()) == wanted || squash(id.display_name()) == wanted)
            .or(match wanted.as_str() {
                "ieeexplore" => Some(Self::Ieee),
                "springer" => Some(Self::SpringerLink),
                "sciencedirect" | "elsevier" => Some(Self::ScienceDirect),
                _ => None,
            })
            .ok_or_else(|| BiblioError::UnknownSource(s.to_string()))
    }
}
