use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use horde_core::{Command, Event, InstanceHandle, NavigationSurface, WaveIndex};
use horde_system_placement::PlacementContext;
use horde_system_scheduler::{Config, Listeners, Scheduler};
use horde_world::{apply, World};
use tracing::{debug, info};

use crate::scenario::Scenario;

/// Fixed simulation step.
pub(crate) const STEP: Duration = Duration::from_millis(50);

/// Simulated time allowed per requested wave before giving up.
const MAX_SECONDS_PER_WAVE: u64 = 3_600;

/// Parameters of a headless run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SimulationSettings {
    pub(crate) waves: u32,
    pub(crate) defeat_after: Duration,
}

/// What happened during one wave of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct WaveSummary {
    pub(crate) wave: WaveIndex,
    pub(crate) spawned: u32,
    pub(crate) started_at: Duration,
    pub(crate) cleared_at: Option<Duration>,
    pub(crate) ended_at: Option<Duration>,
}

/// Outcome of a headless run.
#[derive(Clone, Debug)]
pub(crate) struct SimulationReport {
    pub(crate) waves: Vec<WaveSummary>,
    pub(crate) elapsed: Duration,
}

/// Drives the scheduler against the reference world until `settings.waves` waves end.
///
/// Every spawned enemy is defeated once it has been alive for
/// `settings.defeat_after`.
pub(crate) fn simulate(scenario: &Scenario, settings: SimulationSettings) -> Result<SimulationReport> {
    let mut world = scenario.pool.map_or_else(World::new, World::with_pool);
    let mut world_events = Vec::new();
    for template in &scenario.templates {
        apply(
            &mut world,
            Command::RegisterTemplate {
                template: *template,
            },
            &mut world_events,
        );
    }

    let clock = Rc::new(Cell::new(Duration::ZERO));
    let summaries = Rc::new(RefCell::new(Vec::<WaveSummary>::new()));
    let mut listeners = Listeners::new();
    let _ = listeners.register(log_event);
    let _ = listeners.register({
        let clock = Rc::clone(&clock);
        let summaries = Rc::clone(&summaries);
        move |event: &Event| record(&mut summaries.borrow_mut(), clock.get(), event)
    });

    let config = Config::new(
        Some(Arc::clone(&scenario.profile)),
        scenario.placement.clone(),
        scenario.options,
    );
    let mut scheduler = Scheduler::new(config);
    let mut events = Vec::new();
    scheduler
        .start(&mut events)
        .context("wave scheduler refused to start")?;

    let context = PlacementContext {
        anchor: scenario.anchor,
        viewpoint: scenario.viewpoint.as_ref(),
        navigation: scenario
            .navigation
            .as_ref()
            .map(|area| area as &dyn NavigationSurface),
    };
    let limit = Duration::from_secs(MAX_SECONDS_PER_WAVE.saturating_mul(u64::from(settings.waves)));
    let mut spawned_at: BTreeMap<InstanceHandle, Duration> = BTreeMap::new();
    let mut ended = 0u32;

    loop {
        listeners.dispatch(&events);
        for event in events.drain(..) {
            match event {
                Event::EnemySpawned { instance, .. } => {
                    let _ = spawned_at.insert(instance, clock.get());
                }
                Event::WaveEnded { .. } => ended += 1,
                _ => {}
            }
        }
        if ended >= settings.waves {
            break;
        }
        if clock.get() >= limit {
            bail!(
                "only {ended} of {} waves ended within {}s of simulated time",
                settings.waves,
                limit.as_secs()
            );
        }

        clock.set(clock.get() + STEP);
        let now = clock.get();
        spawned_at.retain(|instance, born| {
            if now.saturating_sub(*born) < settings.defeat_after {
                return true;
            }
            apply(
                &mut world,
                Command::DefeatInstance {
                    instance: *instance,
                },
                &mut world_events,
            );
            false
        });
        for event in world_events.drain(..) {
            debug!(?event, "world event");
        }

        scheduler.tick(STEP, &mut world, &context, &mut events);
    }
    scheduler.stop();

    let waves = summaries.borrow().clone();
    Ok(SimulationReport {
        waves,
        elapsed: clock.get(),
    })
}

fn log_event(event: &Event) {
    match event {
        Event::WaveStarted { wave } => info!(wave = wave.get(), "wave started"),
        Event::EnemySpawned {
            wave,
            instance,
            template,
            position,
        } => debug!(
            wave = wave.get(),
            instance = instance.get(),
            template = template.get(),
            x = position.x,
            z = position.z,
            "enemy spawned"
        ),
        Event::AllEnemiesDefeated { wave } => info!(wave = wave.get(), "all enemies defeated"),
        Event::WaveEnded { wave } => info!(wave = wave.get(), "wave ended"),
        Event::InstanceDefeated { .. } => {}
    }
}

fn record(summaries: &mut Vec<WaveSummary>, now: Duration, event: &Event) {
    match *event {
        Event::WaveStarted { wave } => summaries.push(WaveSummary {
            wave,
            spawned: 0,
            started_at: now,
            cleared_at: None,
            ended_at: None,
        }),
        Event::EnemySpawned { wave, .. } => {
            if let Some(summary) = current(summaries, wave) {
                summary.spawned += 1;
            }
        }
        Event::AllEnemiesDefeated { wave } => {
            if let Some(summary) = current(summaries, wave) {
                summary.cleared_at = Some(now);
            }
        }
        Event::WaveEnded { wave } => {
            if let Some(summary) = current(summaries, wave) {
                summary.ended_at = Some(now);
            }
        }
        Event::InstanceDefeated { .. } => {}
    }
}

fn current(summaries: &mut [WaveSummary], wave: WaveIndex) -> Option<&mut WaveSummary> {
    summaries.iter_mut().rev().find(|summary| summary.wave == wave)
}
