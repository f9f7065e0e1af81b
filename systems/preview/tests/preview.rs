use std::sync::Arc;

use glam::Vec3;
use horde_core::{CatalogEntry, SpecialArchetype, TemplateId, WaveIndex};
use horde_system_allocation::ShortfallReason;
use horde_system_placement::{
    PlacementConfig, PlacementContext, SpawnMode, SpawnPoint, SpawnShape, Viewpoint,
};
use horde_system_preview::{preview_runtime_wave, preview_wave, PreviewWarning};
use horde_system_scheduler::{Config, Scheduler, SchedulerOptions};
use horde_system_wave_profile::{
    ArchetypeRule, ArchetypeRules, BossConfig, CurveConfig, WaveProfile, WaveProfileConfig,
};

fn mixed_profile() -> WaveProfile {
    WaveProfile::from_config(WaveProfileConfig {
        normal: vec![
            CatalogEntry::new("grunt", TemplateId::new(1), 1, 4.0),
            CatalogEntry::new("runner", TemplateId::new(2), 2, 2.0),
            CatalogEntry::new("brute", TemplateId::new(3), 4, 1.0).with_wave_window(3, 999),
        ],
        elite: vec![CatalogEntry::new("champion", TemplateId::new(9), 6, 1.0)],
        curves: CurveConfig {
            elite_chance: vec![[1.0, 0.1], [10.0, 0.4]],
            ..CurveConfig::default()
        },
        ..WaveProfileConfig::default()
    })
    .expect("valid profile")
}

fn single_point() -> PlacementConfig {
    PlacementConfig::new(SpawnShape::Points {
        points: vec![SpawnPoint::new(Vec3::ZERO)],
    })
}

#[test]
fn runtime_preview_matches_scheduler_generation() {
    let profile = Arc::new(mixed_profile());
    for starting_wave in [1, 4, 9] {
        let options = SchedulerOptions {
            seed: 4242,
            starting_wave: WaveIndex::new(starting_wave),
            ..SchedulerOptions::default()
        };
        let mut scheduler = Scheduler::new(Config::new(
            Some(Arc::clone(&profile)),
            single_point(),
            options,
        ));
        let mut events = Vec::new();
        scheduler.start(&mut events).expect("valid configuration");

        let preview = preview_runtime_wave(&profile, WaveIndex::new(starting_wave), 4242, None);
        let queued: Vec<TemplateId> = scheduler
            .state()
            .expect("wave generated")
            .spawn_queue()
            .iter()
            .copied()
            .collect();
        assert_eq!(preview.sequence, queued, "wave {starting_wave}");
    }
}

#[test]
fn preview_is_repeatable_and_reports_scalars() {
    let profile = mixed_profile();
    let wave = WaveIndex::new(5);
    let first = preview_wave(&profile, wave, 17, None);
    let second = preview_wave(&profile, wave, 17, None);

    assert_eq!(first, second);
    assert_eq!(first.budget, profile.budget(wave));
    assert_eq!(first.duration, profile.duration(wave));
    assert_eq!(first.available_normal, 3);
    assert_eq!(first.available_elite, 1);
    assert_eq!(first.concurrency_cap, None, "unbounded by default");
    assert_eq!(first.archetype, SpecialArchetype::None);
}

#[test]
fn estimated_count_uses_cheapest_cost_and_counts_boss() {
    let profile = WaveProfile::from_config(WaveProfileConfig {
        normal: vec![
            CatalogEntry::new("runner", TemplateId::new(2), 2, 1.0),
            CatalogEntry::new("brute", TemplateId::new(3), 4, 1.0),
        ],
        curves: CurveConfig {
            budget: vec![[1.0, 10.0]],
            population_cap: vec![[1.0, 3.0]],
            ..CurveConfig::default()
        },
        boss: Some(BossConfig {
            entry: CatalogEntry::new("warlord", TemplateId::new(90), 3, 1.0),
            consumes_budget: false,
            position: Default::default(),
            allow_boss_only_waves: false,
        }),
        archetypes: ArchetypeRules {
            boss: ArchetypeRule::every(2),
            ..ArchetypeRules::default()
        },
        ..WaveProfileConfig::default()
    })
    .expect("valid profile");

    let regular = preview_wave(&profile, WaveIndex::new(1), 3, None);
    assert_eq!(regular.estimated_count_by_min_cost, 3);
    assert!(!regular.is_boss_wave);

    let boss = preview_wave(&profile, WaveIndex::new(2), 3, None);
    assert!(boss.is_boss_wave && boss.boss_included);
    assert_eq!(boss.estimated_count_by_min_cost, 4);
    assert_eq!(boss.sequence[0], TemplateId::new(90));
}

#[test]
fn budget_warnings() {
    let profile = WaveProfile::from_config(WaveProfileConfig {
        normal: vec![CatalogEntry::new("brute", TemplateId::new(3), 5, 1.0)],
        curves: CurveConfig {
            budget: vec![[1.0, 0.0], [2.0, 3.0]],
            ..CurveConfig::default()
        },
        ..WaveProfileConfig::default()
    })
    .expect("valid profile");

    let empty = preview_wave(&profile, WaveIndex::new(1), 0, None);
    assert!(empty.warnings.contains(&PreviewWarning::ZeroBudget));
    assert!(empty.sequence.is_empty());

    let short = preview_wave(&profile, WaveIndex::new(2), 0, None);
    assert!(short.warnings.contains(&PreviewWarning::BudgetBelowCheapest {
        budget: 3,
        cheapest: 5
    }));
    assert!(short.warnings.iter().any(|warning| matches!(
        warning,
        PreviewWarning::Shortfall {
            reason: ShortfallReason::NothingAffordable,
            ..
        }
    )));
    assert_eq!(short.leftover_budget, 3);
}

#[test]
fn catalog_and_boss_warnings() {
    let profile = WaveProfile::from_config(WaveProfileConfig {
        elite: vec![CatalogEntry::new("champion", TemplateId::new(9), 2, 1.0)],
        archetypes: ArchetypeRules {
            boss: ArchetypeRule::every(3),
            ..ArchetypeRules::default()
        },
        ..WaveProfileConfig::default()
    })
    .expect("valid profile");

    let preview = preview_wave(&profile, WaveIndex::new(3), 1, None);
    assert!(preview.warnings.contains(&PreviewWarning::NoNormalEntries));
    assert!(preview.warnings.contains(&PreviewWarning::BossNotConfigured));
    assert!(!preview.boss_included);
}

#[test]
fn placement_warnings() {
    let profile = mixed_profile();
    let empty = PlacementConfig::new(SpawnShape::Points { points: Vec::new() });
    let ring = PlacementConfig::new(SpawnShape::Ring {
        inner_radius: 0.0,
        outer_radius: 0.0,
    });

    let anchored = PlacementContext {
        anchor: Some(Vec3::ZERO),
        ..PlacementContext::default()
    };

    let preview = preview_wave(&profile, WaveIndex::FIRST, 1, Some((&empty, &anchored)));
    assert!(preview.warnings.contains(&PreviewWarning::EmptySpawnPoints));

    let preview = preview_wave(&profile, WaveIndex::FIRST, 1, Some((&ring, &anchored)));
    assert!(preview.warnings.contains(&PreviewWarning::InvalidRingRadii));
    assert!(!preview.warnings.contains(&PreviewWarning::RingWithoutAnchor));
}

#[test]
fn placement_missing_anchor_or_viewpoint_is_reported() {
    let profile = mixed_profile();
    let ring = PlacementConfig::new(SpawnShape::Ring {
        inner_radius: 5.0,
        outer_radius: 10.0,
    })
    .with_mode(SpawnMode::OutsideView);

    let preview = preview_wave(
        &profile,
        WaveIndex::FIRST,
        1,
        Some((&ring, &PlacementContext::default())),
    );
    assert!(preview.warnings.contains(&PreviewWarning::RingWithoutAnchor));
    assert!(preview
        .warnings
        .contains(&PreviewWarning::OutsideViewWithoutViewpoint));

    let viewpoint = Viewpoint::perspective(
        Vec3::new(0.0, 5.0, 10.0),
        Vec3::ZERO,
        1.0,
        1.5,
        0.1,
        50.0,
    );
    let context = PlacementContext {
        anchor: Some(Vec3::ZERO),
        viewpoint: Some(&viewpoint),
        navigation: None,
    };
    let preview = preview_runtime_wave(&profile, WaveIndex::FIRST, 1, Some((&ring, &context)));
    assert!(!preview.warnings.contains(&PreviewWarning::RingWithoutAnchor));
    assert!(!preview
        .warnings
        .contains(&PreviewWarning::OutsideViewWithoutViewpoint));
    assert_eq!(
        PreviewWarning::RingWithoutAnchor.to_string(),
        "ring has no anchor and is centred on the origin"
    );
}

#[test]
fn preview_serialises_to_json() {
    let profile = WaveProfile::from_config(WaveProfileConfig {
        normal: vec![CatalogEntry::new("grunt", TemplateId::new(1), 1, 1.0)],
        curves: CurveConfig {
            budget: vec![[1.0, 0.0]],
            concurrency_cap: vec![[1.0, 6.0]],
            ..CurveConfig::default()
        },
        ..WaveProfileConfig::default()
    })
    .expect("valid profile");

    let preview = preview_wave(&profile, WaveIndex::FIRST, 5, None);
    let json = serde_json::to_value(&preview).expect("serialise preview");
    assert_eq!(json["wave"], 1);
    assert_eq!(json["concurrency_cap"], 6);
    assert_eq!(json["archetype"], "none");
    assert_eq!(json["warnings"][0]["kind"], "zero_budget");
}
