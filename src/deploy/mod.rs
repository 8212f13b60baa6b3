//! Everything a CoreDNS deployment consists of, and the order it has to be
//! applied in. Zone files and the Corefile are converged by this crate; the
//! remaining items are handed to whoever manages packages and services.
pub mod corefile;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::config::CorednsConfig;
use crate::error::ConvergeError;
use crate::zone::attributes::ZoneItem;

pub use corefile::render_corefile;

pub const SERVICE_NAME: &str = "coredns.service";
pub const BINARY_PATH: &str = "/opt/coredns/coredns";
pub const BINARY_LINK: &str = "/usr/bin/coredns";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSource {
    /// Upload a file from the machine running the deployment.
    Local { path: String },
    /// Have the target download it.
    Download { url: String },
}

impl ArtifactSource {
    /// `local:<path>` selects a local upload, anything else is a URL.
    pub fn from_url(url: &str) -> Self {
        match url.strip_prefix("local:") {
            Some(path) => ArtifactSource::Local { path: path.to_string() },
            None => ArtifactSource::Download { url: url.to_string() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Directory { path: String, owner: String, group: String },
    ZoneFile { path: String },
    Corefile { path: String, owner: String, group: String },
    Binary { path: String, source: ArtifactSource, mode: u32, owner: String, group: String },
    Symlink { path: String, target: String },
    Service { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployItem {
    pub id: String,
    #[serde(flatten)]
    pub kind: ItemKind,
    pub needs: Vec<String>,
    /// Items to restart when this one changes.
    pub triggers: Vec<String>,
}

impl fmt::Display for DeployItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)?;
        if !self.needs.is_empty() {
            write!(f, " (needs {})", self.needs.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentPlan {
    pub items: Vec<DeployItem>,
}

impl DeploymentPlan {
    pub fn new(config: &CorednsConfig, zones: &[ZoneItem]) -> Self {
        let mut items = Vec::new();
        let service_id = format!("svc_systemd:{}", SERVICE_NAME);
        let binary_id = format!("file:{}", BINARY_PATH);
        let corefile_path = config.corefile_path();
        let corefile_id = format!("file:{}", corefile_path);

        let directories: BTreeSet<&str> = zones
            .iter()
            .map(|z| z.attributes.zonefile_directory.as_str())
            .collect();
        for dir in directories {
            items.push(DeployItem {
                id: format!("directory:{}", dir),
                kind: ItemKind::Directory {
                    path: dir.to_string(),
                    owner: config.owner.clone(),
                    group: config.group.clone(),
                },
                needs: Vec::new(),
                triggers: Vec::new(),
            });
        }

        let mut zone_ids = Vec::new();
        for zone in zones {
            let id = format!("zonefile:{}", zone.id);
            items.push(DeployItem {
                id: id.clone(),
                kind: ItemKind::ZoneFile {
                    path: zone.attributes.remote_path(),
                },
                needs: vec![format!("directory:{}", zone.attributes.zonefile_directory)],
                triggers: vec![service_id.clone()],
            });
            zone_ids.push(id);
        }

        items.push(DeployItem {
            id: corefile_id.clone(),
            kind: ItemKind::Corefile {
                path: corefile_path,
                owner: config.owner.clone(),
                group: config.group.clone(),
            },
            needs: zone_ids.clone(),
            triggers: vec![service_id.clone()],
        });

        items.push(DeployItem {
            id: binary_id.clone(),
            kind: ItemKind::Binary {
                path: BINARY_PATH.into(),
                source: ArtifactSource::from_url(&config.url),
                mode: 0o555,
                owner: config.owner.clone(),
                group: config.group.clone(),
            },
            needs: Vec::new(),
            triggers: Vec::new(),
        });

        items.push(DeployItem {
            id: format!("symlink:{}", BINARY_LINK),
            kind: ItemKind::Symlink {
                path: BINARY_LINK.into(),
                target: BINARY_PATH.into(),
            },
            needs: vec![binary_id.clone()],
            triggers: Vec::new(),
        });

        let mut service_needs = zone_ids;
        service_needs.push(corefile_id);
        service_needs.push(binary_id);
        items.push(DeployItem {
            id: service_id,
            kind: ItemKind::Service {
                name: SERVICE_NAME.into(),
            },
            needs: service_needs,
            triggers: Vec::new(),
        });

        Self { items }
    }

    pub fn get(&self, id: &str) -> Option<&DeployItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Items in an order where every item comes after what it needs.
    ///
    /// Ties keep plan order, so the result is stable.
    pub fn ordered(&self) -> Result<Vec<&DeployItem>, ConvergeError> {
        let index: BTreeMap<&str, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.as_str(), i))
            .collect();

        let mut pending = vec![0usize; self.items.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.items.len()];
        for (i, item) in self.items.iter().enumerate() {
            for need in &item.needs {
                let &dep = index.get(need.as_str()).ok_or_else(|| {
                    ConvergeError::plan(format!("{} needs unknown item {}", item.id, need))
                })?;
                pending[i] += 1;
                dependents[dep].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..self.items.len()).filter(|&i| pending[i] == 0).collect();
        let mut ordered = Vec::with_capacity(self.items.len());
        while let Some(next) = ready.pop_first() {
            ordered.push(&self.items[next]);
            for &dependent in &dependents[next] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if ordered.len() != self.items.len() {
            let stuck: Vec<&str> = self
                .items
                .iter()
                .enumerate()
                .filter(|(i, _)| pending[*i] > 0)
                .map(|(_, item)| item.id.as_str())
                .collect();
            return Err(ConvergeError::plan(format!(
                "dependency cycle between {}",
                stuck.join(", ")
            )));
        }
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::attributes::plan_zones;

    fn config() -> CorednsConfig {
        CorednsConfig::from_json(
            r#"{
                "url": "local:files/coredns",
                "servers": {"main": {
                    "name_servers": ["ns1.example.org"],
                    "soa": {"hostmaster": "hostmaster@example.org"},
                    "zones": {"example.org": {}, "example.net": {"zonefile_dir": "/srv/zones"}}
                }}
            }"#,
        )
        .unwrap()
    }

    fn position(order: &[&DeployItem], id: &str) -> usize {
        order.iter().position(|i| i.id == id).unwrap()
    }

    #[test]
    fn artifact_source_from_url() {
        assert_eq!(
            ArtifactSource::from_url("local:bin/coredns"),
            ArtifactSource::Local { path: "bin/coredns".into() }
        );
        assert_eq!(
            ArtifactSource::from_url("https://example.org/coredns"),
            ArtifactSource::Download { url: "https://example.org/coredns".into() }
        );
    }

    #[test]
    fn ordering_respects_needs() {
        let cfg = config();
        let zones = plan_zones(&cfg).unwrap();
        let plan = DeploymentPlan::new(&cfg, &zones);
        let order = plan.ordered().unwrap();
        assert_eq!(order.len(), plan.items.len());

        let dir = position(&order, "directory:/etc/coredns/zones/main");
        let zone = position(&order, "zonefile:main_example.org");
        let corefile = position(&order, "file:/etc/coredns/Corefile");
        let binary = position(&order, "file:/opt/coredns/coredns");
        let service = position(&order, "svc_systemd:coredns.service");

        assert!(dir < zone);
        assert!(zone < corefile);
        assert!(corefile < service);
        assert!(binary < service);
        assert!(position(&order, "directory:/srv/zones") < position(&order, "zonefile:main_example.net"));

        let zone_item = plan.get("zonefile:main_example.org").unwrap();
        assert_eq!(zone_item.triggers, vec!["svc_systemd:coredns.service"]);
    }

    #[test]
    fn cycles_and_unknown_needs_are_errors() {
        let item = |id: &str, needs: &[&str]| DeployItem {
            id: id.into(),
            kind: ItemKind::Service { name: id.into() },
            needs: needs.iter().map(|n| n.to_string()).collect(),
            triggers: Vec::new(),
        };

        let cyclic = DeploymentPlan {
            items: vec![item("a", &["b"]), item("b", &["a"]), item("c", &[])],
        };
        assert!(matches!(cyclic.ordered(), Err(ConvergeError::Plan(_))));

        let dangling = DeploymentPlan {
            items: vec![item("a", &["missing"])],
        };
        assert!(matches!(dangling.ordered(), Err(ConvergeError::Plan(_))));
    }
}
