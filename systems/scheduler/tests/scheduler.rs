use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Duration,
};

use glam::{Vec2, Vec3};
use horde_core::{
    CatalogEntry, Command, ConfigurationError, Event, LivenessPolicy, TemplateId, WaveIndex,
};
use horde_system_placement::{
    PlacementConfig, PlacementContext, SpawnMode, SpawnPoint, SpawnShape,
};
use horde_system_scheduler::{Config, Phase, Scheduler, SchedulerOptions};
use horde_system_wave_profile::{CurveConfig, WaveProfile, WaveProfileConfig};
use horde_world::{apply, query, PoolConfig, World};

const GRUNT: TemplateId = TemplateId::new(1);
const QUARTER_SECOND: Duration = Duration::from_millis(250);

fn profile(budget: f32, concurrency: f32, duration: f32, end_early: bool) -> Arc<WaveProfile> {
    let config = WaveProfileConfig {
        curves: CurveConfig {
            duration: vec![[1.0, duration]],
            budget: vec![[1.0, budget]],
            spawn_rate: vec![[1.0, 4.0]],
            population_cap: vec![[1.0, 50.0]],
            concurrency_cap: vec![[1.0, concurrency]],
            ..CurveConfig::default()
        },
        normal: vec![CatalogEntry::new("grunt", GRUNT, 1, 1.0)],
        end_early_when_queue_empty: end_early,
        ..WaveProfileConfig::default()
    };
    Arc::new(WaveProfile::from_config(config).expect("valid profile"))
}

fn gate() -> PlacementConfig {
    PlacementConfig::new(SpawnShape::Points {
        points: vec![
            SpawnPoint::new(Vec3::new(-5.0, 0.0, 0.0)),
            SpawnPoint::new(Vec3::new(5.0, 0.0, 0.0)),
        ],
    })
}

fn world_with_grunt(world: World) -> World {
    let mut world = world;
    let mut events = Vec::new();
    apply(&mut world, Command::RegisterTemplate { template: GRUNT }, &mut events);
    world
}

fn defeat_all(world: &mut World) {
    let mut events = Vec::new();
    for instance in query::active_instances(world) {
        apply(world, Command::DefeatInstance { instance }, &mut events);
    }
}

fn spawned(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::EnemySpawned { .. }))
        .count()
}

fn started(profile: Arc<WaveProfile>) -> (Scheduler, Vec<Event>) {
    started_scheduler(profile, SchedulerOptions::default())
}

fn started_scheduler(
    profile: Arc<WaveProfile>,
    options: SchedulerOptions,
) -> (Scheduler, Vec<Event>) {
    let mut scheduler = Scheduler::new(Config::new(Some(profile), gate(), options));
    let mut events = Vec::new();
    scheduler.start(&mut events).expect("valid configuration");
    (scheduler, events)
}

#[test]
fn start_generates_first_wave() {
    let (scheduler, events) = started(profile(5.0, 0.0, 10.0, true));

    assert_eq!(events, vec![Event::WaveStarted { wave: WaveIndex::FIRST }]);
    assert_eq!(scheduler.phase(), Phase::Spawning);
    let state = scheduler.state().expect("wave generated");
    assert_eq!(state.spawn_queue().len(), 5);
    assert_eq!(state.wave_duration(), 10.0);
    assert_eq!(state.wave_timer(), 10.0);
    assert_eq!(state.live_count(), 0);
    assert!(!state.all_defeated_notified());
}

#[test]
fn concurrency_cap_limits_live_instances() {
    let (mut scheduler, _) = started(profile(5.0, 2.0, 100.0, true));
    let mut world = world_with_grunt(World::new());
    let context = PlacementContext::default();

    let mut events = Vec::new();
    scheduler.tick(Duration::from_secs(1), &mut world, &context, &mut events);
    assert_eq!(spawned(&events), 2, "a full second would allow four emissions");
    let state = scheduler.state().expect("running");
    assert_eq!(state.concurrency_cap(), 2);
    assert_eq!(state.live_count(), 2);
    assert_eq!(state.spawn_timer(), 0.0, "blocked timer is held at zero");

    events.clear();
    scheduler.tick(Duration::from_secs(1), &mut world, &context, &mut events);
    assert_eq!(spawned(&events), 0);

    let first = query::active_instances(&world)[0];
    let mut world_events = Vec::new();
    apply(&mut world, Command::DefeatInstance { instance: first }, &mut world_events);

    events.clear();
    scheduler.tick(QUARTER_SECOND, &mut world, &context, &mut events);
    assert_eq!(spawned(&events), 1, "pruning frees a slot within the same tick");
    assert_eq!(scheduler.state().map(|state| state.live_count()), Some(2));
}

#[test]
fn spawn_locations_follow_placement() {
    let (mut scheduler, _) = started(profile(4.0, 0.0, 100.0, true));
    let mut world = world_with_grunt(World::new());
    let mut events = Vec::new();
    let context = PlacementContext::default();
    scheduler.tick(Duration::from_secs(1), &mut world, &context, &mut events);

    let xs: Vec<f32> = events
        .iter()
        .filter_map(|event| match event {
            Event::EnemySpawned { position, .. } => Some(position.x),
            _ => None,
        })
        .collect();
    assert_eq!(xs, vec![-5.0, 5.0, -5.0, 5.0]);
}

#[test]
fn all_defeated_fires_once_before_wave_ends() {
    let (mut scheduler, mut events) = started(profile(2.0, 0.0, 3.0, false));
    let mut world = world_with_grunt(World::new());
    let context = PlacementContext::default();

    for _ in 0..16 {
        scheduler.tick(QUARTER_SECOND, &mut world, &context, &mut events);
        defeat_all(&mut world);
    }

    let first = WaveIndex::FIRST;
    let defeated = events
        .iter()
        .filter(|event| **event == Event::AllEnemiesDefeated { wave: first })
        .count();
    assert_eq!(defeated, 1);

    let position = |target: &Event| events.iter().position(|event| event == target);
    let cleared = position(&Event::AllEnemiesDefeated { wave: first }).expect("cleared");
    let ended = position(&Event::WaveEnded { wave: first }).expect("ended");
    let next = position(&Event::WaveStarted { wave: first.next() }).expect("next wave");
    assert!(cleared < ended && ended < next);
    assert_eq!(scheduler.current_wave(), Some(WaveIndex::new(2)));
}

#[test]
fn wave_waits_for_timer_without_early_end() {
    let (mut scheduler, _) = started(profile(1.0, 0.0, 2.0, false));
    let mut world = world_with_grunt(World::new());
    let context = PlacementContext::default();

    let mut events = Vec::new();
    scheduler.tick(QUARTER_SECOND, &mut world, &context, &mut events);
    defeat_all(&mut world);
    scheduler.tick(QUARTER_SECOND, &mut world, &context, &mut events);
    assert_eq!(scheduler.phase(), Phase::Draining);
    let state = scheduler.state().expect("running");
    assert!(state.all_defeated_notified());
    assert_eq!(state.wave_timer(), 1.5);
    assert!(events.contains(&Event::AllEnemiesDefeated { wave: WaveIndex::FIRST }));
    assert!(!events.contains(&Event::WaveEnded { wave: WaveIndex::FIRST }));

    scheduler.tick(Duration::from_secs(2), &mut world, &context, &mut events);
    assert!(events.contains(&Event::WaveEnded { wave: WaveIndex::FIRST }));
}

#[test]
fn empty_wave_advances_once_per_tick() {
    let (mut scheduler, _) = started(profile(0.0, 0.0, 5.0, true));
    let mut world = world_with_grunt(World::new());
    let context = PlacementContext::default();

    let mut events = Vec::new();
    scheduler.tick(QUARTER_SECOND, &mut world, &context, &mut events);
    assert_eq!(
        events,
        vec![
            Event::AllEnemiesDefeated { wave: WaveIndex::FIRST },
            Event::WaveEnded { wave: WaveIndex::FIRST },
            Event::WaveStarted { wave: WaveIndex::new(2) },
        ]
    );
}

#[test]
fn unloaded_templates_are_skipped_without_stalling() {
    let (mut scheduler, _) = started(profile(3.0, 0.0, 10.0, true));
    let mut world = World::new();
    let context = PlacementContext::default();

    let mut events = Vec::new();
    scheduler.tick(Duration::from_secs(1), &mut world, &context, &mut events);

    assert_eq!(spawned(&events), 0);
    assert_eq!(
        events,
        vec![
            Event::AllEnemiesDefeated { wave: WaveIndex::FIRST },
            Event::WaveEnded { wave: WaveIndex::FIRST },
            Event::WaveStarted { wave: WaveIndex::new(2) },
        ]
    );
}

#[test]
fn stop_silences_the_scheduler() {
    let (mut scheduler, _) = started(profile(10.0, 0.0, 10.0, true));
    let mut world = world_with_grunt(World::new());
    let context = PlacementContext::default();

    let mut events = Vec::new();
    scheduler.tick(QUARTER_SECOND, &mut world, &context, &mut events);
    assert_eq!(spawned(&events), 2, "emissions due at zero and at a quarter second");

    scheduler.stop();
    events.clear();
    defeat_all(&mut world);
    for _ in 0..8 {
        scheduler.tick(Duration::from_secs(1), &mut world, &context, &mut events);
    }
    assert!(events.is_empty());
    assert_eq!(scheduler.phase(), Phase::Stopped);
}

#[test]
fn missing_profile_refuses_to_start() {
    let mut scheduler = Scheduler::new(Config::new(None, gate(), SchedulerOptions::default()));
    let mut events = Vec::new();

    assert_eq!(scheduler.start(&mut events), Err(ConfigurationError::MissingProfile));
    assert_eq!(scheduler.start(&mut events), Err(ConfigurationError::MissingProfile));
    assert_eq!(scheduler.phase(), Phase::Stopped);

    let mut world = World::new();
    scheduler.tick(Duration::from_secs(1), &mut world, &PlacementContext::default(), &mut events);
    assert!(events.is_empty());
    assert!(scheduler.state().is_none());
}

#[test]
fn empty_spawn_points_refuse_to_start() {
    let placement = PlacementConfig::new(SpawnShape::Points { points: Vec::new() });
    let mut scheduler = Scheduler::new(Config::new(
        Some(profile(5.0, 0.0, 10.0, true)),
        placement,
        SchedulerOptions::default(),
    ));
    let mut events = Vec::new();
    assert_eq!(scheduler.start(&mut events), Err(ConfigurationError::EmptySpawnPoints));
    assert!(events.is_empty());
    assert_eq!(scheduler.failure(), Some(&ConfigurationError::EmptySpawnPoints));
}

#[test]
fn deactivated_instances_count_only_under_destroyed_only_policy() {
    let context = PlacementContext::default();
    for (policy, expected_live) in [
        (LivenessPolicy::DestroyedOnly, 1),
        (LivenessPolicy::DestroyedOrInactive, 0),
    ] {
        let options = SchedulerOptions {
            liveness: policy,
            recycle_instances: true,
            ..SchedulerOptions::default()
        };
        let (mut scheduler, _) = started_scheduler(profile(1.0, 0.0, 10.0, false), options);
        let mut world = world_with_grunt(World::with_pool(PoolConfig::default()));

        let mut events = Vec::new();
        scheduler.tick(QUARTER_SECOND, &mut world, &context, &mut events);
        defeat_all(&mut world);
        scheduler.tick(QUARTER_SECOND, &mut world, &context, &mut events);

        let live = scheduler.state().map(|state| state.live_count());
        assert_eq!(live, Some(expected_live), "{policy:?}");
        let pooled = query::pooled(&world, GRUNT);
        assert_eq!(pooled, 1 - expected_live, "{policy:?} recycles pruned handles");
    }
}

fn fingerprint(seed: u64) -> u64 {
    let config = WaveProfileConfig {
        normal: vec![
            CatalogEntry::new("grunt", GRUNT, 1, 3.0),
            CatalogEntry::new("runner", TemplateId::new(2), 2, 1.0),
        ],
        elite: vec![CatalogEntry::new("champion", TemplateId::new(3), 5, 1.0)],
        curves: CurveConfig {
            duration: vec![[1.0, 4.0]],
            spawn_rate: vec![[1.0, 6.0]],
            elite_chance: vec![[1.0, 0.25]],
            ..CurveConfig::default()
        },
        ..WaveProfileConfig::default()
    };
    let profile = Arc::new(WaveProfile::from_config(config).expect("valid profile"));
    let placement = PlacementConfig::new(SpawnShape::Area {
        center: Vec3::ZERO,
        half_extents: Vec2::new(20.0, 20.0),
    })
    .with_mode(SpawnMode::Random);
    let options = SchedulerOptions {
        seed,
        ..SchedulerOptions::default()
    };

    let mut world = World::new();
    let mut setup = Vec::new();
    for template in [GRUNT, TemplateId::new(2), TemplateId::new(3)] {
        apply(&mut world, Command::RegisterTemplate { template }, &mut setup);
    }

    let mut scheduler = Scheduler::new(Config::new(Some(profile), placement, options));
    let mut events = Vec::new();
    scheduler.start(&mut events).expect("valid configuration");
    let context = PlacementContext {
        anchor: Some(Vec3::ZERO),
        ..PlacementContext::default()
    };
    for step in 0..400 {
        scheduler.tick(Duration::from_millis(50), &mut world, &context, &mut events);
        if step % 10 == 9 {
            defeat_all(&mut world);
        }
    }

    let mut hasher = DefaultHasher::new();
    for event in &events {
        format!("{event:?}").hash(&mut hasher);
    }
    hasher.finish()
}

#[test]
fn identical_seeds_replay_identical_notifications() {
    assert_eq!(fingerprint(2024), fingerprint(2024));
    assert_ne!(fingerprint(2024), fingerprint(2025));
}
