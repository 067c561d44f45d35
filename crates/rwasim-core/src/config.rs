//! TOML configuration parsing for RWASim.
//!
//! Defines the schema for a batch of runs: the topology and its
//! workstations, the physical-layer parameters, and the algorithm
//! combinations to compare.

use crate::error::FatalError;
use crate::request::ProbeStyle;
use crate::topology::Network;
use rwasim_algorithms::context::default_k_overrides;
use rwasim_algorithms::{QualityParams, RouterId, RoutingKind, WavelengthKind, XpmTable};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to parse XPM table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationSection,
    pub topology: TopologySection,
    #[serde(default)]
    pub quality: QualitySection,
    #[serde(default)]
    pub algorithms: Vec<AlgorithmEntry>,
    /// Minimum k per topology name for PABR and DP.
    #[serde(default = "default_k_overrides")]
    pub k_overrides: HashMap<String, usize>,
}

/// General simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_sim_name")]
    pub name: String,
    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Worker threads for the run scheduler.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Runs per algorithm entry, each with more active workstations.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Candidates computed per request for SERIAL and PARALLEL styles.
    #[serde(default = "default_max_probes")]
    pub max_probes: usize,
    #[serde(default)]
    pub detailed_log: bool,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            name: default_sim_name(),
            seed: default_seed(),
            threads: default_threads(),
            iterations: default_iterations(),
            max_probes: default_max_probes(),
            detailed_log: false,
        }
    }
}

fn default_sim_name() -> String {
    "simulation".to_string()
}
fn default_seed() -> u64 {
    42
}
fn default_threads() -> usize {
    1
}
fn default_iterations() -> usize {
    1
}
fn default_max_probes() -> usize {
    3
}

/// Routers, links and workstations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySection {
    #[serde(default = "default_topology_name")]
    pub name: String,
    pub routers: usize,
    /// Bidirectional links `[from, to, spans]`.
    pub links: Vec<(RouterId, RouterId, u32)>,
    /// Total workstations. Defaults to one per router.
    #[serde(default)]
    pub workstations: Option<usize>,
    /// Explicit parent routers for the first workstations.
    #[serde(default)]
    pub workstation_routers: Vec<RouterId>,
}

fn default_topology_name() -> String {
    "custom".to_string()
}

impl TopologySection {
    pub fn workstation_count(&self) -> usize {
        self.workstations.unwrap_or(self.routers)
    }
}

/// Physical-layer and algorithm tunables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualitySection {
    #[serde(flatten)]
    pub params: QualityParams,
    /// JSON file holding an N x N matrix of XPM coefficients.
    #[serde(default)]
    pub xpm_table: Option<PathBuf>,
}

/// One routing/wavelength combination to simulate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmEntry {
    pub routing: String,
    pub wavelength: String,
    #[serde(default = "default_probe_style")]
    pub probe_style: ProbeStyle,
    #[serde(default)]
    pub quality_aware: bool,
    /// Overrides `simulation.iterations` for this entry.
    #[serde(default)]
    pub iterations: Option<usize>,
}

fn default_probe_style() -> ProbeStyle {
    ProbeStyle::Single
}

impl AlgorithmEntry {
    pub fn routing_kind(&self) -> Result<RoutingKind, ConfigError> {
        RoutingKind::from_name(&self.routing).ok_or_else(|| {
            ConfigError::Validation(format!(
                "unknown routing algorithm '{}'. Available: {:?}",
                self.routing,
                rwasim_algorithms::available_routing()
            ))
        })
    }

    pub fn wavelength_kind(&self) -> Result<WavelengthKind, ConfigError> {
        WavelengthKind::from_name(&self.wavelength).ok_or_else(|| {
            ConfigError::Validation(format!(
                "unknown wavelength algorithm '{}'. Available: {:?}",
                self.wavelength,
                rwasim_algorithms::available_wavelength()
            ))
        })
    }
}

/// IA and DP fix the wavelength before signaling. Under SINGLE or SERIAL
/// probing only strategies that can pick a slot on their own apply.
pub fn check_forward_reservation(
    routing: RoutingKind,
    wavelength: WavelengthKind,
    style: ProbeStyle,
) -> Result<(), FatalError> {
    if routing.forward_reservation()
        && style != ProbeStyle::Parallel
        && !wavelength.supports_forward_reservation()
    {
        return Err(FatalError::ForwardReservationWavelength(format!(
            "{} with {} ({})",
            routing.name(),
            wavelength.name(),
            style.name()
        )));
    }
    Ok(())
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        // XPM tables are named relative to the config file.
        if let (Some(table), Some(dir)) = (&config.quality.xpm_table, path.parent()) {
            if table.is_relative() {
                config.quality.xpm_table = Some(dir.join(table));
            }
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Quality parameters with the simulation-level log switch folded in.
    pub fn quality_params(&self) -> QualityParams {
        let mut params = self.quality.params.clone();
        params.detailed_log |= self.simulation.detailed_log;
        params
    }

    /// The XPM table, or zeros when none is configured.
    pub fn load_xpm(&self) -> Result<XpmTable, ConfigError> {
        let n = self.quality.params.wavelength_count();
        let Some(path) = &self.quality.xpm_table else {
            return Ok(XpmTable::zeros(n));
        };
        let content = std::fs::read_to_string(path)?;
        let rows: Vec<Vec<f64>> = serde_json::from_str(&content)?;
        let table = XpmTable::from_rows(rows).map_err(ConfigError::Validation)?;
        if table.size() != n {
            return Err(ConfigError::Validation(format!(
                "XPM table is {}x{} but the grid has {} wavelengths",
                table.size(),
                table.size(),
                n
            )));
        }
        Ok(table)
    }

    /// Build the network with its workstations attached.
    pub fn build_network(&self) -> Result<Network, FatalError> {
        let t = &self.topology;
        let mut net = Network::new(
            &t.name,
            t.routers,
            &t.links,
            self.quality.params.wavelength_count(),
        )?;
        net.set_workstations(t.workstation_count(), &t.workstation_routers)?;
        Ok(net)
    }

    /// Validate configuration consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.topology;
        if t.routers == 0 {
            return Err(ConfigError::Validation("routers must be > 0".to_string()));
        }
        let mut seen = HashSet::new();
        for &(a, b, spans) in &t.links {
            if a >= t.routers || b >= t.routers {
                return Err(ConfigError::Validation(format!(
                    "link [{}, {}] references a router outside 0..{}",
                    a, b, t.routers
                )));
            }
            if a == b {
                return Err(ConfigError::Validation(format!(
                    "link [{}, {}] is a self-loop",
                    a, b
                )));
            }
            if spans == 0 {
                return Err(ConfigError::Validation(format!(
                    "link [{}, {}] must span at least 1",
                    a, b
                )));
            }
            if !seen.insert((a, b)) || !seen.insert((b, a)) {
                return Err(ConfigError::Validation(format!(
                    "duplicate link between {} and {}",
                    a, b
                )));
            }
        }
        if !is_connected(t.routers, &t.links) {
            return Err(ConfigError::Validation(
                "topology is not connected".to_string(),
            ));
        }

        let workstations = t.workstation_count();
        if workstations == 0 {
            return Err(ConfigError::Validation(
                "workstations must be > 0".to_string(),
            ));
        }
        if t.workstation_routers.len() > workstations {
            return Err(ConfigError::Validation(format!(
                "{} workstation routers given for {} workstations",
                t.workstation_routers.len(),
                workstations
            )));
        }
        if let Some(bad) = t.workstation_routers.iter().find(|&&r| r >= t.routers) {
            return Err(ConfigError::Validation(format!(
                "workstation router {} does not exist",
                bad
            )));
        }

        self.quality
            .params
            .validate()
            .map_err(ConfigError::Validation)?;

        if self.simulation.max_probes == 0 {
            return Err(ConfigError::Validation(
                "max_probes must be > 0".to_string(),
            ));
        }
        if self.simulation.iterations == 0 {
            return Err(ConfigError::Validation(
                "iterations must be > 0".to_string(),
            ));
        }
        for entry in &self.algorithms {
            let routing = entry.routing_kind()?;
            let wavelength = entry.wavelength_kind()?;
            if entry.iterations == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "iterations for {}/{} must be > 0",
                    entry.routing, entry.wavelength
                )));
            }
            check_forward_reservation(routing, wavelength, entry.probe_style)
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }
        Ok(())
    }
}

/// Whether every router can reach every other over the (bidirectional) links.
fn is_connected(routers: usize, links: &[(RouterId, RouterId, u32)]) -> bool {
    let mut adjacency = vec![Vec::new(); routers];
    for &(a, b, _) in links {
        adjacency[a].push(b);
        adjacency[b].push(a);
    }
    let mut visited = vec![false; routers];
    let mut queue = VecDeque::from([0]);
    visited[0] = true;
    while let Some(r) = queue.pop_front() {
        for &next in &adjacency[r] {
            if !visited[next] {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }
    visited.into_iter().all(|v| v)
}
