use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Input of a rendition: the uploaded original or a previous rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenditionSource {
    Original,
    Rendition(String),
}

/// One step of the encode ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionSpec {
    /// Logical output key returned to clients, e.g. `renditionA`.
    pub key: String,
    /// Used in the output asset name: `video{tag} - {file}`.
    pub tag: String,
    pub preset: String,
    pub source: RenditionSource,
}

impl RenditionSpec {
    pub fn output_asset_name(&self, file_name: &str) -> String {
        format!("video{} - {}", self.tag, file_name)
    }
}

/// 720p from the original, then SD 16x9 from the 720p output.
pub fn default_ladder() -> Vec<RenditionSpec> {
    vec![
        RenditionSpec {
            key: "renditionA".to_string(),
            tag: "Medium".to_string(),
            preset: "H264 Broadband 720p".to_string(),
            source: RenditionSource::Original,
        },
        RenditionSpec {
            key: "renditionB".to_string(),
            tag: "Small".to_string(),
            preset: "H264 Broadband SD 16x9".to_string(),
            source: RenditionSource::Rendition("renditionA".to_string()),
        },
    ]
}

/// `key:Tag:Preset:source` where source is `original` or an earlier key.
impl FromStr for RenditionSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let [key, tag, preset, source] = parts.as_slice() else {
            return Err(anyhow::anyhow!(
                "Invalid rendition '{}': expected key:tag:preset:source",
                s
            ));
        };
        if key.is_empty() || preset.is_empty() {
            return Err(anyhow::anyhow!(
                "Invalid rendition '{}': key and preset are required",
                s
            ));
        }
        let source = match *source {
            "original" => RenditionSource::Original,
            other => RenditionSource::Rendition(other.to_string()),
        };
        Ok(RenditionSpec {
            key: key.to_string(),
            tag: tag.to_string(),
            preset: preset.to_string(),
            source,
        })
    }
}

/// Parse a `;`-separated ladder and check that every chained source refers to
/// an earlier rendition.
pub fn parse_ladder(s: &str) -> Result<Vec<RenditionSpec>, anyhow::Error> {
    let mut ladder: Vec<RenditionSpec> = Vec::new();
    for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let spec: RenditionSpec = entry.parse()?;
        if spec.key == crate::constants::ORIGINAL_OUTPUT_KEY {
            return Err(anyhow::anyhow!(
                "Rendition key '{}' is reserved",
                spec.key
            ));
        }
        if ladder.iter().any(|r| r.key == spec.key) {
            return Err(anyhow::anyhow!("Duplicate rendition key '{}'", spec.key));
        }
        if let RenditionSource::Rendition(ref src) = spec.source {
            if !ladder.iter().any(|r| &r.key == src) {
                return Err(anyhow::anyhow!(
                    "Rendition '{}' reads from '{}' which is not defined before it",
                    spec.key,
                    src
                ));
            }
        }
        ladder.push(spec);
    }
    if ladder.is_empty() {
        return Err(anyhow::anyhow!("Rendition ladder must not be empty"));
    }
    Ok(ladder)
}
