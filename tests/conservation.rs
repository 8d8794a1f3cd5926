use chambersim::error::Result;
use chambersim::{Geometry, MemorySink, Particle, Simulation};

/// Elastic collisions only: total kinetic energy must be invariant across
/// every wall, corner, and pair resolution of a long seeded run.
#[test]
fn energy_conservation_over_run() -> Result<()> {
    let geometry = Geometry::new(1.0, 1.0, 1.0, 0.4)?;
    let mut sim = Simulation::with_random_particles(geometry, 40, 0.02, 1.0, 0.5, Some(12345))?;
    let e0 = sim.kinetic_energy();

    let mut sink = MemorySink::new();
    sim.run(50.0, 0.5, &mut sink)?;

    let e1 = sim.kinetic_energy();
    let rel = ((e1 - e0) / e0).abs();
    assert!(
        rel < 1e-9,
        "relative energy drift {} too large (E0={}, E1={})",
        rel,
        e0,
        e1
    );
    assert!(!sink.snapshots.is_empty());
    Ok(())
}

/// Pair impulses exchange momentum without creating any: the pair's total
/// momentum is unchanged by the collision, and so is the total energy.
#[test]
fn momentum_conserved_across_pair_collision() -> Result<()> {
    let geometry = Geometry::new(10.0, 10.0, 10.0, 5.0)?;
    let a = Particle::new(0, [3.0, 5.0], [1.0, 0.0], 0.2, 1.0)?;
    let b = Particle::new(1, [6.0, 5.0], [-0.5, 0.0], 0.2, 3.0)?;
    let mut sim = Simulation::new(vec![a, b], geometry)?;

    let px0: f64 = sim.particles().iter().map(|p| p.mass * p.v[0]).sum();
    let py0: f64 = sim.particles().iter().map(|p| p.mass * p.v[1]).sum();
    let e0 = sim.kinetic_energy();

    // Gap of 2.6 closes at relative speed 1.5; the pair collides well before
    // either disc can reach a wall.
    let mut sink = MemorySink::new();
    sim.run(2.0, 10.0, &mut sink)?;
    assert_eq!(sim.particles()[0].collision_count, 1);
    assert_eq!(sim.particles()[1].collision_count, 1);

    let px1: f64 = sim.particles().iter().map(|p| p.mass * p.v[0]).sum();
    let py1: f64 = sim.particles().iter().map(|p| p.mass * p.v[1]).sum();
    assert!((px1 - px0).abs() < 1e-12);
    assert!((py1 - py0).abs() < 1e-12);
    assert!((sim.kinetic_energy() - e0).abs() < 1e-12);
    Ok(())
}

/// Head-on collision of equal masses with opposite velocities along the line
/// of centers: the velocities swap exactly.
#[test]
fn equal_mass_head_on_swaps_velocities() -> Result<()> {
    let geometry = Geometry::new(10.0, 10.0, 10.0, 5.0)?;
    let a = Particle::new(0, [3.0, 5.0], [1.0, 0.0], 0.2, 1.0)?;
    let b = Particle::new(1, [7.0, 5.0], [-1.0, 0.0], 0.2, 1.0)?;
    let mut sim = Simulation::new(vec![a, b], geometry)?;

    let mut sink = MemorySink::new();
    sim.run(2.0, 10.0, &mut sink)?;

    assert!((sim.particles()[0].v[0] - (-1.0)).abs() < 1e-12);
    assert!((sim.particles()[1].v[0] - 1.0).abs() < 1e-12);
    assert!(sim.particles()[0].v[1].abs() < 1e-12);
    assert!(sim.particles()[1].v[1].abs() < 1e-12);
    Ok(())
}

/// No persistent penetration: at every snapshot, pairwise center distances
/// stay at or above the radius sum and every center stays inside the domain.
#[test]
fn no_penetration_at_snapshots() -> Result<()> {
    let geometry = Geometry::new(1.0, 1.0, 1.0, 0.4)?;
    let radius = 0.02;
    let mut sim = Simulation::with_random_particles(geometry, 30, radius, 1.0, 0.5, Some(777))?;
    let mut sink = MemorySink::new();
    sim.run(30.0, 0.25, &mut sink)?;

    let tol = 1e-9;
    let geom = sim.geometry();
    for snap in &sink.snapshots {
        for (i, a) in snap.states.iter().enumerate() {
            assert!(a.x >= radius - tol && a.x <= geom.total_width() - radius + tol);
            assert!(a.y >= radius - tol && a.y <= geom.height() - radius + tol);
            if a.x > geom.divider_x() + tol {
                assert!(
                    a.y >= geom.opening_y_min() + radius - tol
                        && a.y <= geom.opening_y_max() - radius + tol,
                    "disc {} outside the channel span at t={}",
                    i,
                    snap.time
                );
            }
            for b in snap.states.iter().skip(i + 1) {
                let dist = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
                assert!(
                    dist >= 2.0 * radius - tol,
                    "overlap at t={}: distance {} < {}",
                    snap.time,
                    dist,
                    2.0 * radius
                );
            }
        }
    }
    Ok(())
}

/// Once a participant collides elsewhere, an earlier prediction naming it is
/// discarded rather than acted upon. Particle A stops dead after hitting the
/// stationary B; the stale A-C candidate popping later must not disturb A.
#[test]
fn stale_prediction_never_acted_upon() -> Result<()> {
    let geometry = Geometry::new(12.0, 10.0, 10.0, 5.0)?;
    let a = Particle::new(0, [2.0, 5.0], [1.0, 0.0], 0.2, 1.0)?;
    let b = Particle::new(1, [4.0, 5.0], [0.0, 0.0], 0.2, 1.0)?;
    let c = Particle::new(2, [9.0, 5.0], [-1.0, 0.0], 0.2, 1.0)?;
    let mut sim = Simulation::new(vec![a, b, c], geometry)?;

    // A-B resolve at t=1.6 (A stops, B takes its velocity), invalidating the
    // A-C candidate scheduled for t=3.3; B-C then collide at t=3.1. Stop
    // before the returning B can reach A again at t=4.6.
    let mut sink = MemorySink::new();
    sim.run(4.0, 10.0, &mut sink)?;

    assert_eq!(sim.particles()[0].collision_count, 1);
    assert!(sim.particles()[0].v[0].abs() < 1e-12, "A was disturbed by a stale event");
    assert!(sim.particles()[0].v[1].abs() < 1e-12);
    assert_eq!(sim.particles()[1].collision_count, 2);
    assert_eq!(sim.particles()[2].collision_count, 1);
    assert!((sim.particles()[2].v[0] - 1.0).abs() < 1e-12);
    Ok(())
}
