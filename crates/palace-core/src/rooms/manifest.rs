//! Room manifest parsing (JSONC) and the `Room` type (component J).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
struct ArtifactManifest {
    name: String,
    #[serde(default)]
    path_hint: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StepManifest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    evidence: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomManifestFile {
    #[allow(dead_code)]
    schema_version: String,
    #[allow(dead_code)]
    kind: String,
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    entry_points: Vec<String>,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    artifacts: Vec<ArtifactManifest>,
    #[serde(default)]
    steps: Vec<StepManifest>,
}

/// An artifact a room claims to produce or own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    pub path_hint: Option<String>,
    pub description: Option<String>,
}

/// A documented step of a room's workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    pub description: Option<String>,
    pub evidence: Option<String>,
}

/// A named conceptual region of the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub name: String,
    pub summary: String,
    pub entry_points: Vec<String>,
    pub capabilities: Vec<String>,
    pub artifacts: Vec<Artifact>,
    pub steps: Vec<Step>,
}

impl From<RoomManifestFile> for Room {
    fn from(m: RoomManifestFile) -> Self {
        Self {
            name: m.name,
            summary: m.summary,
            entry_points: m.entry_points,
            capabilities: m.capabilities,
            artifacts: m
                .artifacts
                .into_iter()
                .map(|a| Artifact {
                    name: a.name,
                    path_hint: a.path_hint,
                    description: a.description,
                })
                .collect(),
            steps: m
                .steps
                .into_iter()
                .map(|s| Step {
                    name: s.name,
                    description: s.description,
                    evidence: s.evidence,
                })
                .collect(),
        }
    }
}

/// Parse a single manifest file's contents. Returns `None` on any
/// parse/shape error — unparseable entries are skipped silently by the
/// caller, not surfaced as an error.
pub fn parse_manifest(text: &str) -> Option<Room> {
    let value = jsonc_parser::parse_to_serde_value(text, &Default::default()).ok()??;
    let manifest: RoomManifestFile = serde_json::from_value(value).ok()?;
    Some(manifest.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_manifest_with_comments() {
        let text = r#"{
            // this is the auth room
            "schemaVersion": "1.0.0",
            "kind": "palace/room",
            "name": "auth",
            "summary": "authentication and session handling",
            "entryPoints": ["src/auth/"],
            "capabilities": ["login", "session"],
            "artifacts": [],
            "steps": []
        }"#;
        let room = parse_manifest(text).unwrap();
        assert_eq!(room.name, "auth");
        assert_eq!(room.entry_points, vec!["src/auth/".to_string()]);
    }

    #[test]
    fn unparseable_manifest_yields_none() {
        assert!(parse_manifest("{ not json ").is_none());
    }

    #[test]
    fn missing_required_field_yields_none() {
        let text = r#"{"schemaVersion":"1.0.0","kind":"palace/room","summary":"no name"}"#;
        assert!(parse_manifest(text).is_none());
    }
}
