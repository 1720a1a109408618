//! End-to-end pipeline scenarios.
//!
//! A test-double instrument space with a rectangular forbidden block drives
//! the full chain: sampling, contour extraction, convex splitting, Voronoi
//! skeleton, roadmap search, verification and export.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use triax_core::builder::{PathStrategy, PathsBuilder};
use triax_core::config::PlannerConfig;
use triax_core::core::Vec2;
use triax_core::error::CoreError;
use triax_core::export::RawExporter;
use triax_core::instrument::{AngularLimits, Collision, InstrumentSpace};

/// Instrument double: everything free except one angular rectangle.
struct BlockedSquare;

impl InstrumentSpace for BlockedSquare {
    fn check_collision(&self, a2: f64, a4: f64) -> Collision {
        if (0.3..=0.7).contains(&a2) && (0.4..=0.6).contains(&a4) {
            Collision::with(1)
        } else {
            Collision::FREE
        }
    }

    fn angular_limits(&self) -> AngularLimits {
        AngularLimits {
            a2_lo: 0.0,
            a2_hi: 1.0,
            a4_lo: 0.0,
            a4_hi: 1.0,
        }
    }

    fn generation(&self) -> u64 {
        0
    }

    fn obstacle_ident(&self, id: u32) -> Option<&str> {
        (id == 1).then_some("block")
    }
}

fn planner_config() -> PlannerConfig {
    let mut config = PlannerConfig::default();
    // a coarser raster keeps the scenario fast
    config.sampler.da2_deg = 1.0;
    config.sampler.da4_deg = 1.0;
    config.sampler.max_threads = 2;
    config
}

#[test]
fn test_path_around_a_wall() {
    env_logger::try_init().ok();

    let instrument = BlockedSquare;
    let builder = PathsBuilder::new(&instrument, planner_config());
    builder.recalculate().expect("pipeline");

    let path = builder.find_path(0.1, 0.1, 0.9, 0.9, PathStrategy::Shortest);
    assert!(path.ok, "no path found around the block");
    assert!(
        path.vertices.len() >= 3,
        "expected a detour over several roadmap vertices, got {:?}",
        path.vertices
    );

    // the detour is strictly longer than the (blocked) straight line
    let vertices = builder.path_vertices(&path, true, false);
    assert!(vertices.len() >= 2);
    let length: f64 = vertices.windows(2).map(|w| w[0].distance(w[1])).sum();
    let straight = path.start.distance(path.target);
    assert!(
        length > straight + 1e-6,
        "path length {length} vs straight {straight}"
    );

    // endpoints are the exact requested settings (x = a4, y = a2)
    assert!(vertices[0].approx_eq(Vec2::new(0.1, 0.1), 1e-9));
    assert!(vertices.last().unwrap().approx_eq(Vec2::new(0.9, 0.9), 1e-9));
}

#[test]
fn test_blocked_endpoint_fails() {
    let instrument = BlockedSquare;
    let builder = PathsBuilder::new(&instrument, planner_config());
    builder.recalculate().expect("pipeline");

    // target inside the block
    let path = builder.find_path(0.1, 0.1, 0.5, 0.5, PathStrategy::Shortest);
    assert!(!path.ok);
    // target outside the angular limits
    let path = builder.find_path(0.1, 0.1, 1.5, 0.5, PathStrategy::Shortest);
    assert!(!path.ok);
}

#[test]
fn test_penalise_walls_strategy_finds_a_path() {
    let instrument = BlockedSquare;
    let builder = PathsBuilder::new(&instrument, planner_config());
    builder.recalculate().expect("pipeline");

    let path = builder.find_path(0.1, 0.1, 0.9, 0.9, PathStrategy::PenaliseWalls);
    assert!(path.ok);

    // the penalised path still verifies against the raster
    let vertices = builder.path_vertices(&path, true, false);
    assert!(!vertices.is_empty());
}

#[test]
fn test_smoothed_path_keeps_endpoints() {
    let instrument = BlockedSquare;
    let builder = PathsBuilder::new(&instrument, planner_config());
    builder.recalculate().expect("pipeline");

    let path = builder.find_path(0.1, 0.1, 0.9, 0.9, PathStrategy::Shortest);
    assert!(path.ok);

    let rough = builder.path_vertices(&path, true, false);
    let smooth = builder.path_vertices(&path, true, true);
    assert!(smooth.len() > rough.len());
    assert!(smooth[0].approx_eq(rough[0], 1e-9));
    assert!(smooth.last().unwrap().approx_eq(*rough.last().unwrap(), 1e-9));
}

#[test]
fn test_cancellation_and_recovery() {
    env_logger::try_init().ok();

    let instrument = BlockedSquare;
    let mut builder = PathsBuilder::new(&instrument, planner_config());

    // cancel the configuration-space sampling at roughly 30% progress
    let cancelled_at = Arc::new(AtomicUsize::new(0));
    let counter = cancelled_at.clone();
    let slot = builder.add_progress_slot(move |stage, fraction| {
        if stage == "configuration space" && fraction >= 0.3 {
            counter.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    });

    let result = builder.recalculate();
    assert!(matches!(result, Err(CoreError::Cancelled)));
    assert!(cancelled_at.load(Ordering::Relaxed) > 0);
    assert!(!builder.is_valid());

    // a query without recalculation fails
    let path = builder.find_path(0.1, 0.1, 0.9, 0.9, PathStrategy::Shortest);
    assert!(!path.ok);

    // after a full recalculation the same query succeeds
    builder.remove_progress_slot(slot);
    builder.recalculate().expect("pipeline after recovery");
    let path = builder.find_path(0.1, 0.1, 0.9, 0.9, PathStrategy::Shortest);
    assert!(path.ok);
}

#[test]
fn test_export_roundtrip() {
    let instrument = BlockedSquare;
    let builder = PathsBuilder::new(&instrument, planner_config());
    builder.recalculate().expect("pipeline");

    let path = builder.find_path(0.1, 0.1, 0.9, 0.9, PathStrategy::Shortest);
    assert!(path.ok);
    let vertices = builder.path_vertices(&path, true, false);

    let mut sink = Vec::new();
    builder
        .accept_exporter(&RawExporter, &vertices, &mut sink)
        .expect("export");
    let out = String::from_utf8(sink).unwrap();

    // one header plus one line per vertex, in degrees
    assert_eq!(out.lines().count(), vertices.len() + 1);
    let first = out.lines().nth(1).unwrap();
    let columns: Vec<f64> = first
        .split_whitespace()
        .map(|c| c.parse().unwrap())
        .collect();
    assert_eq!(columns.len(), 2);
    // a4 = 0.1 rad in degrees
    assert!((columns[0] - 0.1_f64.to_degrees()).abs() < 1e-6);
}

#[test]
fn test_scattering_sense_applied_once_on_export() {
    let instrument = BlockedSquare;
    let mut builder = PathsBuilder::new(&instrument, planner_config());
    builder.recalculate().expect("pipeline");

    // the query itself is sense-free: inputs are native instrument angles
    let path = builder.find_path(0.1, 0.1, 0.9, 0.9, PathStrategy::Shortest);
    assert!(path.ok);
    let plain = builder.path_vertices(&path, true, false);

    // flipping the monochromator sense negates a2 in the exported path
    builder.set_scattering_senses([-1.0, 1.0, 1.0]);
    let flipped_a2 = builder.path_vertices(&path, true, false);
    assert_eq!(plain.len(), flipped_a2.len());
    for (p, f) in plain.iter().zip(&flipped_a2) {
        assert!((p.x - f.x).abs() < 1e-12, "a4 must be untouched");
        assert!((p.y + f.y).abs() < 1e-12, "a2 must be negated once");
    }
    // endpoints carry the sign exactly once, like the interior vertices
    assert!(flipped_a2[0].approx_eq(Vec2::new(0.1, -0.1), 1e-9));
    assert!(flipped_a2
        .last()
        .unwrap()
        .approx_eq(Vec2::new(0.9, -0.9), 1e-9));

    // flipping the sample sense negates a4 instead
    builder.set_scattering_senses([1.0, -1.0, 1.0]);
    let flipped_a4 = builder.path_vertices(&path, true, false);
    for (p, f) in plain.iter().zip(&flipped_a4) {
        assert!((p.x + f.x).abs() < 1e-12);
        assert!((p.y - f.y).abs() < 1e-12);
    }
    assert!(flipped_a4[0].approx_eq(Vec2::new(-0.1, 0.1), 1e-9));
}

#[test]
fn test_stages_fail_fast_out_of_order() {
    let instrument = BlockedSquare;
    let builder = PathsBuilder::new(&instrument, planner_config());

    // querying any stage before the sampler ran is a precondition error
    assert!(matches!(
        builder.calculate_voronoi(
            true,
            triax_core::voronoi::VoronoiBackend::Exact,
            true
        ),
        Err(CoreError::StageInvalid(_))
    ));
    assert!(matches!(
        builder.calculate_wall_contours(true, true),
        Err(CoreError::StageInvalid(_))
    ));

    // contours before line segments
    builder.calculate_config_space().unwrap();
    assert!(matches!(
        builder.calculate_line_segments(false),
        Err(CoreError::StageInvalid(_))
    ));
}

#[test]
fn test_progress_reports_cover_stages() {
    let instrument = BlockedSquare;
    let mut builder = PathsBuilder::new(&instrument, planner_config());

    let stages = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
    let sink = stages.clone();
    builder.add_progress_slot(move |stage, _| {
        let mut seen = sink.lock();
        if !seen.iter().any(|s| s == stage) {
            seen.push(stage.to_string());
        }
        true
    });

    builder.recalculate().expect("pipeline");
    let seen = stages.lock();
    assert!(seen.iter().any(|s| s == "configuration space"));
    assert!(seen.iter().any(|s| s == "wall contours"));
    assert!(seen.iter().any(|s| s == "voronoi diagram"));
}
