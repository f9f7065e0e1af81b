use std::{collections::BTreeSet, fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use glam::Vec3;
use horde_core::TemplateId;
use horde_system_placement::{PlacementConfig, SpawnPoint, SpawnShape, Viewpoint};
use horde_system_scheduler::SchedulerOptions;
use horde_system_wave_profile::{WaveProfile, WaveProfileConfig};
use horde_world::{PoolConfig, WalkableArea};
use serde::Deserialize;

/// Profile loaded when `--profile` is not supplied.
pub(crate) const DEFAULT_PROFILE_PATH: &str = "assets/profiles/default.toml";

/// Reference camera used by outside-view placement.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct ViewpointConfig {
    pub(crate) eye: Vec3,
    pub(crate) target: Vec3,
    pub(crate) fov_y_degrees: f32,
    pub(crate) aspect_ratio: f32,
    pub(crate) near: f32,
    pub(crate) far: f32,
}

impl Default for ViewpointConfig {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 20.0, 20.0),
            target: Vec3::ZERO,
            fov_y_degrees: 60.0,
            aspect_ratio: 16.0 / 9.0,
            near: 0.1,
            far: 500.0,
        }
    }
}

impl ViewpointConfig {
    pub(crate) fn viewpoint(&self) -> Viewpoint {
        Viewpoint::perspective(
            self.eye,
            self.target,
            self.fov_y_degrees.to_radians(),
            self.aspect_ratio,
            self.near,
            self.far,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScenarioFile {
    scheduler: SchedulerOptions,
    profile: WaveProfileConfig,
    placement: PlacementConfig,
    pool: Option<PoolConfig>,
    navigation: Option<WalkableArea>,
    viewpoint: Option<ViewpointConfig>,
    anchor: Option<Vec3>,
}

impl Default for ScenarioFile {
    fn default() -> Self {
        Self {
            scheduler: SchedulerOptions::default(),
            profile: WaveProfileConfig::default(),
            placement: PlacementConfig::new(SpawnShape::Points {
                points: vec![SpawnPoint::new(Vec3::ZERO)],
            }),
            pool: None,
            navigation: None,
            viewpoint: None,
            anchor: None,
        }
    }
}

/// Everything the CLI needs to preview or simulate waves.
#[derive(Debug)]
pub(crate) struct Scenario {
    pub(crate) options: SchedulerOptions,
    pub(crate) profile: Arc<WaveProfile>,
    pub(crate) placement: PlacementConfig,
    pub(crate) pool: Option<PoolConfig>,
    pub(crate) navigation: Option<WalkableArea>,
    pub(crate) viewpoint: Option<Viewpoint>,
    pub(crate) anchor: Option<Vec3>,
    pub(crate) templates: BTreeSet<TemplateId>,
}

impl Scenario {
    /// Reads and validates a scenario file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid scenario in {}", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let file: ScenarioFile =
            toml::from_str(contents).context("failed to parse scenario toml contents")?;

        let boss = file.profile.boss.as_ref().map(|boss| &boss.entry);
        let templates = file
            .profile
            .normal
            .iter()
            .chain(&file.profile.elite)
            .chain(&file.profile.fallback)
            .chain(boss)
            .filter_map(|entry| entry.template())
            .collect();

        let profile = WaveProfile::from_config(file.profile).context("invalid wave profile")?;
        file.placement
            .validate()
            .context("invalid placement configuration")?;

        Ok(Self {
            options: file.scheduler,
            profile: Arc::new(profile),
            placement: file.placement,
            pool: file.pool,
            navigation: file.navigation,
            viewpoint: file.viewpoint.as_ref().map(ViewpointConfig::viewpoint),
            anchor: file.anchor,
            templates,
        })
    }
}
