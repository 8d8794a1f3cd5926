use crate::core::{Event, EventKind, EventSchedule, Geometry, Particle};
use crate::error::{Error, Result};
use crate::output::{RunParams, SnapshotSink};
use rand::{rng, rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::TAU;
use tracing::{debug, info, trace, warn};

/// Near-zero time tolerance: computed contact times at or below this are
/// treated as already occurring and are not rescheduled.
const EPS_TIME: f64 = 1e-12;

/// Minimum center-to-corner distance for a defined reflection normal.
const EPS_DIST: f64 = 1e-10;

/// Event-driven simulation of hard discs in two chambers joined by a
/// centered opening in the shared wall.
///
/// The engine never advances time in fixed increments. It predicts exact
/// contact times, keeps the candidates in a min-priority schedule, jumps to
/// the earliest one that is still valid, resolves it, and re-predicts for the
/// particles it touched. Stale candidates are recognized at pop time by
/// comparing each named particle's live collision count against the snapshot
/// the event captured when it was scheduled.
#[derive(Debug)]
pub struct Simulation {
    time_now: f64,
    geometry: Geometry,
    particles: Vec<Particle>,
    schedule: EventSchedule,
}

impl Simulation {
    /// Create a simulation from an explicit particle list.
    ///
    /// Particle ids must equal their list index. Every disc must lie inside
    /// the domain (within the opening span when right of the divider) and no
    /// two discs may overlap.
    pub fn new(particles: Vec<Particle>, geometry: Geometry) -> Result<Self> {
        if particles.is_empty() {
            return Err(Error::InvalidParam("particle list must not be empty".into()));
        }
        for (idx, p) in particles.iter().enumerate() {
            if p.id as usize != idx {
                return Err(Error::InvalidParam(format!(
                    "particle id {} does not match its index {}",
                    p.id, idx
                )));
            }
            if p.r[0] < p.radius || p.r[0] > geometry.total_width() - p.radius {
                return Err(Error::InvalidParam(format!(
                    "particle {} lies outside the horizontal bounds",
                    p.id
                )));
            }
            if p.r[1] < p.radius || p.r[1] > geometry.height() - p.radius {
                return Err(Error::InvalidParam(format!(
                    "particle {} lies outside the vertical bounds",
                    p.id
                )));
            }
            if p.r[0] > geometry.divider_x() && !geometry.fits_opening(p.r[1], p.radius) {
                return Err(Error::InvalidParam(format!(
                    "particle {} lies right of the divider but outside the opening span",
                    p.id
                )));
            }
        }
        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                let dx = particles[j].r[0] - particles[i].r[0];
                let dy = particles[j].r[1] - particles[i].r[1];
                let sigma = particles[i].radius + particles[j].radius;
                if dx * dx + dy * dy < sigma * sigma {
                    return Err(Error::InvalidParam(format!(
                        "particles {} and {} overlap",
                        particles[i].id, particles[j].id
                    )));
                }
            }
        }

        Ok(Self {
            time_now: 0.0,
            geometry,
            particles,
            schedule: EventSchedule::new(),
        })
    }

    /// Create a simulation with `num_particles` identical discs seeded into
    /// the left chamber.
    ///
    /// Positions are placed by rejection sampling to avoid initial overlap;
    /// each velocity has magnitude `speed` in a uniformly random direction.
    pub fn with_random_particles(
        geometry: Geometry,
        num_particles: usize,
        radius: f64,
        mass: f64,
        speed: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        if num_particles == 0 {
            return Err(Error::InvalidParam("num_particles must be > 0".into()));
        }
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::InvalidParam("speed must be finite and > 0".into()));
        }
        if geometry.left_width() < 2.0 * radius || geometry.height() < 2.0 * radius {
            return Err(Error::InvalidParam(
                "left chamber must be at least 2 * radius in both dimensions".into(),
            ));
        }

        let mut rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rng().random()),
        };

        // Rejection sample non-overlapping positions inside the left chamber.
        let mut particles: Vec<Particle> = Vec::with_capacity(num_particles);
        let max_attempts = 1_000_000usize;
        for id in 0..(num_particles as u32) {
            let mut attempts = 0usize;
            let r = loop {
                if attempts >= max_attempts {
                    return Err(Error::InvalidParam(format!(
                        "failed to place particle {} without overlap; try fewer particles or a smaller radius",
                        id
                    )));
                }
                attempts += 1;
                let x = rng.random_range(radius..=(geometry.left_width() - radius));
                let y = rng.random_range(radius..=(geometry.height() - radius));
                if !overlaps_existing(&particles, [x, y], radius) {
                    break [x, y];
                }
            };

            let angle = rng.random_range(0.0..TAU);
            let v = [speed * angle.cos(), speed * angle.sin()];
            particles.push(Particle::new(id, r, v, radius, mass)?);
        }

        Self::new(particles, geometry)
    }

    /// Returns current simulation time.
    pub fn time(&self) -> f64 {
        self.time_now
    }

    /// Number of particles.
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Read access to the particle states.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// The chamber layout.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Compute total kinetic energy (diagnostic).
    pub fn kinetic_energy(&self) -> f64 {
        self.particles.iter().map(|p| p.kinetic_energy()).sum()
    }

    /// Number of discs whose center lies right of the dividing wall.
    pub fn right_chamber_count(&self) -> usize {
        self.particles
            .iter()
            .filter(|p| p.r[0] > self.geometry.divider_x())
            .count()
    }

    /// Drive the event loop until the schedule drains or `max_time` is
    /// exceeded, emitting a snapshot to `sink` whenever the output boundary
    /// is crossed.
    ///
    /// The one-time parameter record is written before the loop starts; the
    /// bootstrap event forces a snapshot of the initial state. Sink failures
    /// abort the run.
    pub fn run<S: SnapshotSink>(
        &mut self,
        max_time: f64,
        output_interval: f64,
        sink: &mut S,
    ) -> Result<()> {
        if !max_time.is_finite() || max_time < self.time_now {
            return Err(Error::InvalidParam(
                "max_time must be finite and not precede the current time".into(),
            ));
        }
        if !output_interval.is_finite() || output_interval <= 0.0 {
            return Err(Error::InvalidParam(
                "output_interval must be finite and > 0".into(),
            ));
        }

        sink.record_params(&self.run_params())?;
        self.seed_schedule()?;
        let mut next_output = self.time_now;
        let mut resolved: u64 = 0;
        let mut stale: u64 = 0;
        info!(
            particles = self.particles.len(),
            max_time, output_interval, "starting event loop"
        );

        while let Some(ev) = self.schedule.pop_min() {
            if !self.event_valid(&ev) {
                stale += 1;
                trace!(?ev, "discarding stale event");
                continue;
            }
            let t_ev = ev.time_f64();
            if t_ev < self.time_now - EPS_TIME {
                warn!(
                    event_time = t_ev,
                    now = self.time_now,
                    "discarding event behind current time"
                );
                continue;
            }

            let dt = (t_ev - self.time_now).max(0.0);
            for p in &mut self.particles {
                p.advance(dt);
            }
            self.time_now = self.time_now.max(t_ev);

            if self.time_now + EPS_TIME >= next_output {
                sink.record_snapshot(self.time_now, &self.particles)?;
                while next_output <= self.time_now + EPS_TIME {
                    next_output += output_interval;
                }
            }

            if self.time_now > max_time {
                debug!(now = self.time_now, "time horizon reached");
                break;
            }

            self.resolve(ev)?;
            resolved += 1;
        }

        info!(
            now = self.time_now,
            resolved, stale, "event loop finished"
        );
        Ok(())
    }

    // ============ Internal helpers ============

    fn run_params(&self) -> RunParams {
        RunParams {
            opening_height: self.geometry.opening_height(),
            particle_count: self.particles.len(),
            radius: self.particles[0].radius,
            left_width: self.geometry.left_width(),
            right_width: self.geometry.right_width(),
            height: self.geometry.height(),
        }
    }

    /// Rebuild the schedule from the current particle states and push the
    /// zero-duration bootstrap event.
    fn seed_schedule(&mut self) -> Result<()> {
        self.schedule.clear();
        for i in 0..self.particles.len() {
            self.predict_for(i)?;
        }
        self.schedule.push(Event::bootstrap(self.time_now)?);
        Ok(())
    }

    fn event_valid(&self, ev: &Event) -> bool {
        let (a, b) = ev.kind.participants();
        let cc = |id: Option<u32>| id.map(|i| self.particles[i as usize].collision_count);
        ev.is_valid(cc(a), cc(b))
    }

    /// Enumerate every candidate event that could next involve particle `i`
    /// and push the ones with positive remaining time.
    fn predict_for(&mut self, i: usize) -> Result<()> {
        let now = self.time_now;
        let geom = &self.geometry;
        let particles = &self.particles;
        let schedule = &mut self.schedule;
        let p = &particles[i];
        let id = p.id;
        let cc = p.collision_count;

        // Pair candidates against every other particle, O(n) by design.
        for q in particles.iter() {
            if q.id == id {
                continue;
            }
            if let Some(dt) = time_to_pair(p, q) {
                schedule.push(Event::pair(now + dt, id, q.id, cc, q.collision_count)?);
            }
        }

        // Vertical walls. A rightward disc in the left chamber either passes
        // through the opening (schedule the far wall) or bounces off the
        // divider; the divider bounce time is clamped to a minimal positive
        // value so a disc resting on the wall still makes forward progress.
        let mut crossing = false;
        if p.v[0] > 0.0 {
            if p.r[0] < geom.divider_x() {
                let t_divider = (geom.divider_x() - p.radius - p.r[0]) / p.v[0];
                let y_at = p.r[1] + p.v[1] * t_divider;
                if geom.fits_opening(y_at, p.radius) {
                    crossing = true;
                    let t_far = (geom.total_width() - p.radius - p.r[0]) / p.v[0];
                    if t_far > EPS_TIME {
                        schedule.push(Event::vertical_wall(now + t_far, id, cc)?);
                    }
                } else {
                    let t = t_divider.max(EPS_TIME);
                    schedule.push(Event::vertical_wall(now + t, id, cc)?);
                }
            } else {
                let t = (geom.total_width() - p.radius - p.r[0]) / p.v[0];
                if t > EPS_TIME {
                    schedule.push(Event::vertical_wall(now + t, id, cc)?);
                }
            }
        } else if p.v[0] < 0.0 {
            let t = (p.radius - p.r[0]) / p.v[0];
            if t > EPS_TIME {
                schedule.push(Event::vertical_wall(now + t, id, cc)?);
            }
        }

        // Horizontal bounds: full height in the open left chamber, the
        // opening span once in the channel or right chamber.
        let (y_min, y_max) = if p.r[0] <= geom.divider_x() && !crossing {
            (0.0, geom.height())
        } else {
            (geom.opening_y_min(), geom.opening_y_max())
        };
        if p.v[1] > 0.0 {
            let t = (y_max - p.radius - p.r[1]) / p.v[1];
            if t > EPS_TIME {
                schedule.push(Event::horizontal_wall(now + t, id, cc)?);
            }
        } else if p.v[1] < 0.0 {
            let t = (y_min + p.radius - p.r[1]) / p.v[1];
            if t > EPS_TIME {
                schedule.push(Event::horizontal_wall(now + t, id, cc)?);
            }
        }

        // Corner clip: a disc heading toward the divider whose rim straddles
        // an opening edge may graze the corner before any flat contact.
        if p.v[0] > 0.0
            && (p.r[1] - p.radius < geom.opening_y_min()
                || p.r[1] + p.radius > geom.opening_y_max())
        {
            let corner = [geom.divider_x(), geom.nearer_corner_y(p.r[1])];
            if let Some(dt) = time_to_point(p, corner) {
                schedule.push(Event::corner(now + dt, id, cc)?);
            }
        }

        Ok(())
    }

    /// Apply the physical effect of a realized event and re-predict for the
    /// particles it touched.
    fn resolve(&mut self, ev: Event) -> Result<()> {
        match ev.kind {
            EventKind::Pair { i, j } => {
                let (i, j) = (i as usize, j as usize);
                self.resolve_pair(i, j);
                trace!(i, j, "pair collision");
                self.predict_for(i)?;
                self.predict_for(j)?;
            }
            EventKind::VerticalWall { i } => {
                let i = i as usize;
                let p = &mut self.particles[i];
                p.v[0] = -p.v[0];
                p.bump_collision_count();
                trace!(i, "vertical wall bounce");
                self.predict_for(i)?;
            }
            EventKind::HorizontalWall { i } => {
                let i = i as usize;
                let p = &mut self.particles[i];
                p.v[1] = -p.v[1];
                p.bump_collision_count();
                trace!(i, "horizontal wall bounce");
                self.predict_for(i)?;
            }
            EventKind::Corner { i } => {
                let i = i as usize;
                if self.resolve_corner(i) {
                    trace!(i, "corner clip");
                } else {
                    trace!(i, "corner reflection skipped, center at the corner point");
                }
                self.predict_for(i)?;
            }
            EventKind::Bootstrap => {}
        }
        Ok(())
    }

    /// Elastic impulse exchange along the line of centers.
    fn resolve_pair(&mut self, i: usize, j: usize) {
        let (pi, pj) = (&self.particles[i], &self.particles[j]);
        let dx = pj.r[0] - pi.r[0];
        let dy = pj.r[1] - pi.r[1];
        let dvx = pj.v[0] - pi.v[0];
        let dvy = pj.v[1] - pi.v[1];
        let dvdr = dvx * dx + dvy * dy;
        let sigma = pi.radius + pj.radius;
        let (mi, mj) = (pi.mass, pj.mass);

        let impulse = 2.0 * mi * mj * dvdr / ((mi + mj) * sigma);
        let jx = impulse * dx / sigma;
        let jy = impulse * dy / sigma;

        let p = &mut self.particles[i];
        p.v[0] += jx / mi;
        p.v[1] += jy / mi;
        p.bump_collision_count();

        let q = &mut self.particles[j];
        q.v[0] -= jx / mj;
        q.v[1] -= jy / mj;
        q.bump_collision_count();
    }

    /// Specular reflection about the normal from the nearer opening corner to
    /// the disc center. Returns false (leaving the particle untouched, with
    /// no counter bump) when the center is too close to the corner for the
    /// normal to be defined.
    fn resolve_corner(&mut self, i: usize) -> bool {
        let corner_x = self.geometry.divider_x();
        let corner_y = self.geometry.nearer_corner_y(self.particles[i].r[1]);
        let p = &mut self.particles[i];
        let dx = p.r[0] - corner_x;
        let dy = p.r[1] - corner_y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < EPS_DIST {
            return false;
        }
        let nx = dx / dist;
        let ny = dy / dist;
        let vn = p.v[0] * nx + p.v[1] * ny;
        p.v[0] -= 2.0 * vn * nx;
        p.v[1] -= 2.0 * vn * ny;
        p.bump_collision_count();
        true
    }
}

// ============ Utility helpers ============

/// Time until discs `p` and `q` first touch, if they are on a collision
/// course. Separating pairs, identical velocities, and misses all yield None.
fn time_to_pair(p: &Particle, q: &Particle) -> Option<f64> {
    let dx = q.r[0] - p.r[0];
    let dy = q.r[1] - p.r[1];
    let dvx = q.v[0] - p.v[0];
    let dvy = q.v[1] - p.v[1];

    let dvdr = dvx * dx + dvy * dy;
    if dvdr >= 0.0 {
        return None;
    }
    let dvdv = dvx * dvx + dvy * dvy;
    if dvdv == 0.0 {
        return None;
    }
    let drdr = dx * dx + dy * dy;
    let sigma = p.radius + q.radius;
    let d = dvdr * dvdr - dvdv * (drdr - sigma * sigma);
    if d < 0.0 {
        return None;
    }
    let t = -(dvdr + d.sqrt()) / dvdv;
    (t.is_finite() && t > EPS_TIME).then_some(t)
}

/// Time until the rim of disc `p` reaches the fixed point `target` — the
/// pair quadratic with zero velocity and zero radius on the target side.
fn time_to_point(p: &Particle, target: [f64; 2]) -> Option<f64> {
    let dx = target[0] - p.r[0];
    let dy = target[1] - p.r[1];
    let dvdr = dx * p.v[0] + dy * p.v[1];
    if dvdr <= 0.0 {
        return None;
    }
    let dvdv = p.v[0] * p.v[0] + p.v[1] * p.v[1];
    if dvdv == 0.0 {
        return None;
    }
    let drdr = dx * dx + dy * dy;
    let d = dvdr * dvdr - dvdv * (drdr - p.radius * p.radius);
    if d < 0.0 {
        return None;
    }
    let t = (dvdr - d.sqrt()) / dvdv;
    (t.is_finite() && t > EPS_TIME).then_some(t)
}

fn overlaps_existing(existing: &[Particle], r: [f64; 2], radius: f64) -> bool {
    existing.iter().any(|p| {
        let dx = r[0] - p.r[0];
        let dy = r[1] - p.r[1];
        let min = radius + p.radius;
        dx * dx + dy * dy < min * min
    })
}
