//! Frontmatter extraction.
//!
//! An MTM file opens with a YAML block between `---` fences:
//!
//! ```text
//! ---
//! target: reactjs
//! channels:
//!   - message-sent
//!   - event: user-joined
//! imports:
//!   - ./Avatar.mtm
//! route: /chat
//! ---
//! ```

use serde::{Deserialize, Serialize};

use crate::error::FrontmatterError;
use crate::reactive::Framework;

const FENCE: &str = "---";

/// The metadata the classifier compares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontmatter {
    pub target: Option<String>,
    pub channels: Vec<String>,
    pub imports: Vec<String>,
    pub route: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFrontmatter {
    target: Option<String>,
    channels: Vec<ChannelEntry>,
    imports: Vec<ImportEntry>,
    route: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChannelEntry {
    Name(String),
    Spec { event: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportEntry {
    Path(String),
    Spec { from: String },
}

impl Frontmatter {
    /// Find the fenced block at the top of `source`.
    ///
    /// Returns `Ok(None)` when the file has no frontmatter at all.
    pub fn extract(source: &str) -> Result<Option<&str>, FrontmatterError> {
        let source = source.trim_start_matches('\u{feff}').trim_start();
        let Some(rest) = source.strip_prefix(FENCE) else {
            return Ok(None);
        };
        // The opening fence must be alone on its line.
        let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
            return Ok(None);
        };

        let mut offset = 0;
        for line in rest.split_inclusive('\n') {
            if line.trim_end() == FENCE {
                return Ok(Some(&rest[..offset]));
            }
            offset += line.len();
        }
        Err(FrontmatterError::Unterminated)
    }

    /// Parse the YAML body of a block.
    pub fn from_yaml(block: &str) -> Result<Self, FrontmatterError> {
        if block.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawFrontmatter = serde_yaml::from_str(block)?;
        Ok(Self {
            target: raw.target.map(|t| t.trim().to_string()),
            channels: raw
                .channels
                .into_iter()
                .map(|c| match c {
                    ChannelEntry::Name(name) | ChannelEntry::Spec { event: name } => name,
                })
                .collect(),
            imports: raw
                .imports
                .into_iter()
                .map(|i| match i {
                    ImportEntry::Path(path) | ImportEntry::Spec { from: path } => path,
                })
                .collect(),
            route: raw.route,
        })
    }

    /// Extract and parse the frontmatter of an MTM source file.
    pub fn parse(source: &str) -> Result<Option<Self>, FrontmatterError> {
        match Self::extract(source)? {
            Some(block) => Self::from_yaml(block).map(Some),
            None => Ok(None),
        }
    }

    /// The target resolved to a known framework.
    pub fn target_framework(&self) -> Option<Framework> {
        self.target.as_deref().and_then(|t| t.parse().ok())
    }
}
