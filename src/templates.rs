use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cluster::{PositionClusters, cluster_all, position_population};
use crate::config::AnalysisConfig;
use crate::error::{RoleError, RoleResult};
use crate::events::{EventTable, MatchResults};
use crate::naming::{Characteristics, name_clusters};
use crate::priors::prior_roles;
use crate::profile::{Profile, ProfileGrade, build_samples};

pub const DEFAULT_TEMPLATES_FILE: &str = "role_templates_named.json";
pub const DEFINE_ROLES_COMMAND: &str = "role_scout define-roles";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleEntry {
    #[serde(default)]
    pub description: String,
    pub template: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characteristics: Option<Characteristics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleTemplates {
    positions: BTreeMap<String, BTreeMap<String, RoleEntry>>,
}

impl RoleTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: &str, role: &str, entry: RoleEntry) {
        self.positions
            .entry(position.to_string())
            .or_default()
            .insert(role.to_string(), entry);
    }

    pub fn set_position(&mut self, position: &str, roles: BTreeMap<String, RoleEntry>) {
        self.positions.insert(position.to_string(), roles);
    }

    pub fn for_position(&self, position: &str) -> Option<&BTreeMap<String, RoleEntry>> {
        self.positions.get(position).filter(|roles| !roles.is_empty())
    }

    pub fn require_position(&self, position: &str) -> RoleResult<&BTreeMap<String, RoleEntry>> {
        self.for_position(position)
            .ok_or_else(|| RoleError::UnknownPosition(position.to_string()))
    }

    pub fn positions(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, RoleEntry>)> + '_ {
        self.positions.iter().map(|(p, r)| (p.as_str(), r))
    }

    /// (position, role, entry) in position then role-name order.
    pub fn roles(&self) -> impl Iterator<Item = (&str, &str, &RoleEntry)> + '_ {
        self.positions.iter().flat_map(|(pos, roles)| {
            roles
                .iter()
                .map(move |(role, entry)| (pos.as_str(), role.as_str(), entry))
        })
    }

    pub fn role_count(&self) -> usize {
        self.positions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.role_count() == 0
    }

    /// Adds hand-authored priors for positions that produced no clustered roles.
    pub fn with_priors(mut self) -> Self {
        for prior in prior_roles() {
            for position in prior.positions {
                let clustered = self
                    .positions
                    .get(*position)
                    .is_some_and(|roles| roles.values().any(|e| e.original_key.is_some()));
                if clustered {
                    continue;
                }
                self.insert(
                    position,
                    prior.name,
                    RoleEntry {
                        description: prior.description.to_string(),
                        template: prior.template.clone(),
                        original_key: None,
                        characteristics: Some(Characteristics::of(&prior.template)),
                        player_count: None,
                        match_ratio: None,
                    },
                );
            }
        }
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RoleError::MissingArtifact {
                what: "role templates",
                path: path.to_path_buf(),
                upstream: DEFINE_ROLES_COMMAND,
            }
            .into());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read role templates {}", path.display()))?;
        let templates = serde_json::from_str::<RoleTemplates>(&raw)
            .with_context(|| format!("parse role templates {}", path.display()))?;
        if templates.is_empty() {
            warn!(path = %path.display(), "role template file has no roles");
        }
        Ok(templates)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize role templates")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
        Ok(())
    }
}

/// Output of the define-roles pass.
#[derive(Debug, Clone)]
pub struct RoleDefinition {
    pub templates: RoleTemplates,
    pub clusters: Vec<PositionClusters>,
}

pub fn define_roles(
    table: &EventTable,
    results: &MatchResults,
    cfg: &AnalysisConfig,
) -> RoleDefinition {
    let samples = build_samples(table, results, &cfg.profile, ProfileGrade::Exploratory);
    let population = position_population(&table.player_directory());
    let clusters = cluster_all(&samples, &population, &cfg.cluster);

    let mut templates = RoleTemplates::new();
    for position in &clusters {
        templates.set_position(&position.position, name_clusters(position));
    }
    let templates = templates.with_priors();
    info!(
        positions = templates.positions.len(),
        roles = templates.role_count(),
        "defined role templates"
    );
    RoleDefinition {
        templates,
        clusters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Metric;

    fn entry(value: f64) -> RoleEntry {
        RoleEntry {
            description: "test".to_string(),
            template: Profile::from_pairs([(Metric::PassFrequency, value)]),
            original_key: Some("role_0".to_string()),
            characteristics: None,
            player_count: Some(12),
            match_ratio: Some(0.5),
        }
    }

    #[test]
    fn missing_file_names_upstream_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = RoleTemplates::load(&dir.path().join("absent.json")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(DEFINE_ROLES_COMMAND), "{msg}");
        assert!(matches!(
            err.downcast_ref::<RoleError>(),
            Some(RoleError::MissingArtifact { .. })
        ));
    }

    #[test]
    fn save_then_load_keeps_roles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("roles.json");
        let mut templates = RoleTemplates::new();
        templates.insert("CM", "Central Midfielder", entry(0.3));
        templates.save(&path).unwrap();
        let loaded = RoleTemplates::load(&path).unwrap();
        assert_eq!(loaded, templates);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn minimal_json_is_accepted() {
        let raw = r#"{"CB":{"Stopper":{"template":{"clearance_frequency":0.2,"mystery":1}}}}"#;
        let templates: RoleTemplates = serde_json::from_str(raw).unwrap();
        let roles = templates.for_position("CB").unwrap();
        assert_eq!(roles["Stopper"].template.len(), 1);
        assert_eq!(roles["Stopper"].description, "");
    }

    #[test]
    fn priors_fill_only_unclustered_positions() {
        let mut templates = RoleTemplates::new();
        templates.insert("CM", "Central Midfielder", entry(0.3));
        let templates = templates.with_priors();
        assert_eq!(templates.for_position("CM").unwrap().len(), 1);
        assert!(templates.for_position("LB").unwrap().contains_key("Inverted Wing-Back"));
        assert!(templates.for_position("RB").is_some());
    }

    #[test]
    fn unknown_position_is_an_error() {
        let mut templates = RoleTemplates::new();
        templates.insert("CM", "Central Midfielder", entry(0.3));
        assert!(templates.require_position("CM").is_ok());
        assert!(matches!(
            templates.require_position("SW"),
            Err(RoleError::UnknownPosition(p)) if p == "SW"
        ));
    }
}
