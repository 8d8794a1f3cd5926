//! Snapshot boundary: the one-time parameter record and the periodic
//! full-state snapshots emitted by the event loop.
//!
//! The core only depends on the [`SnapshotSink`] trait; what the bytes look
//! like and where they go is the sink's concern. [`TextSnapshotWriter`]
//! emits a plain-text encoding suitable for downstream analysis scripts and
//! is generic over `Write` so tests can use `Vec<u8>` and production code a
//! `BufWriter<File>`. [`MemorySink`] keeps everything in memory for tests.

use crate::core::Particle;
use crate::error::Result;
use std::io::Write;

/// One-time record of the run configuration, emitted before the event loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunParams {
    /// Vertical extent of the opening.
    pub opening_height: f64,
    /// Number of particles in the run.
    pub particle_count: usize,
    /// Disc radius (of the first particle, which seeded runs share).
    pub radius: f64,
    /// Width of the left chamber.
    pub left_width: f64,
    /// Width of the right chamber.
    pub right_width: f64,
    /// Common chamber height.
    pub height: f64,
}

/// Kinematic state of one disc at a snapshot instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl From<&Particle> for ParticleState {
    fn from(p: &Particle) -> Self {
        Self {
            x: p.r[0],
            y: p.r[1],
            vx: p.v[0],
            vy: p.v[1],
        }
    }
}

/// A time-stamped copy of every particle's kinematic state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub time: f64,
    pub states: Vec<ParticleState>,
}

/// Receiver for the parameter record and the periodic snapshots.
///
/// Implementations may fail (e.g. on I/O); the event loop aborts the run on
/// the first error rather than silently dropping output.
pub trait SnapshotSink {
    /// Called once, before the event loop starts.
    fn record_params(&mut self, params: &RunParams) -> Result<()>;

    /// Called whenever global time crosses an output boundary.
    fn record_snapshot(&mut self, time: f64, particles: &[Particle]) -> Result<()>;
}

/// Plain-text sink writing a parameter stream and a snapshot stream.
///
/// The parameter stream holds a commented header and one line of values; the
/// snapshot stream holds a time line followed by one `x y vx vy` line per
/// particle, all in fixed six-decimal format.
#[derive(Debug)]
pub struct TextSnapshotWriter<P: Write, O: Write> {
    params: P,
    output: O,
}

impl<P: Write, O: Write> TextSnapshotWriter<P, O> {
    /// Create a writer over the two byte streams.
    pub fn new(params: P, output: O) -> Self {
        Self { params, output }
    }

    /// Flush and return the underlying streams.
    pub fn into_inner(mut self) -> Result<(P, O)> {
        self.params.flush()?;
        self.output.flush()?;
        Ok((self.params, self.output))
    }
}

impl<P: Write, O: Write> SnapshotSink for TextSnapshotWriter<P, O> {
    fn record_params(&mut self, params: &RunParams) -> Result<()> {
        writeln!(
            self.params,
            "# opening_height N radius left_width right_width height"
        )?;
        writeln!(
            self.params,
            "{:.6} {} {:.6} {:.6} {:.6} {:.6}",
            params.opening_height,
            params.particle_count,
            params.radius,
            params.left_width,
            params.right_width,
            params.height
        )?;
        writeln!(self.output, "# t")?;
        writeln!(self.output, "# x y vx vy")?;
        Ok(())
    }

    fn record_snapshot(&mut self, time: f64, particles: &[Particle]) -> Result<()> {
        writeln!(self.output, "{time:.6}")?;
        for p in particles {
            writeln!(
                self.output,
                "{:.6} {:.6} {:.6} {:.6}",
                p.r[0], p.r[1], p.v[0], p.v[1]
            )?;
        }
        Ok(())
    }
}

/// In-memory sink collecting the parameter record and every snapshot.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// The parameter record, once received.
    pub params: Option<RunParams>,
    /// Snapshots in emission order.
    pub snapshots: Vec<Snapshot>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotSink for MemorySink {
    fn record_params(&mut self, params: &RunParams) -> Result<()> {
        self.params = Some(*params);
        Ok(())
    }

    fn record_snapshot(&mut self, time: f64, particles: &[Particle]) -> Result<()> {
        self.snapshots.push(Snapshot {
            time,
            states: particles.iter().map(ParticleState::from).collect(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> RunParams {
        RunParams {
            opening_height: 0.05,
            particle_count: 2,
            radius: 0.0015,
            left_width: 0.09,
            right_width: 0.09,
            height: 0.09,
        }
    }

    #[test]
    fn text_writer_emits_fixed_format() -> Result<()> {
        let mut writer = TextSnapshotWriter::new(Vec::new(), Vec::new());
        writer.record_params(&sample_params())?;
        let particles = vec![
            Particle::new(0, [0.01, 0.02], [0.5, -0.25], 0.0015, 1.0)?,
            Particle::new(1, [0.03, 0.04], [-0.5, 0.25], 0.0015, 1.0)?,
        ];
        writer.record_snapshot(0.1, &particles)?;
        let (params, output) = writer.into_inner()?;

        let params = String::from_utf8(params).expect("utf8");
        assert!(params.starts_with("# opening_height"));
        assert!(params.contains("0.050000 2 0.001500 0.090000 0.090000 0.090000"));

        let output = String::from_utf8(output).expect("utf8");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "# t");
        assert_eq!(lines[1], "# x y vx vy");
        assert_eq!(lines[2], "0.100000");
        assert_eq!(lines[3], "0.010000 0.020000 0.500000 -0.250000");
        assert_eq!(lines[4], "0.030000 0.040000 -0.500000 0.250000");
        Ok(())
    }

    #[test]
    fn memory_sink_collects_snapshots() -> Result<()> {
        let mut sink = MemorySink::new();
        sink.record_params(&sample_params())?;
        let particles = vec![Particle::new(0, [1.0, 2.0], [3.0, 4.0], 0.1, 1.0)?];
        sink.record_snapshot(0.0, &particles)?;
        sink.record_snapshot(0.5, &particles)?;

        assert_eq!(sink.params.expect("params").particle_count, 2);
        assert_eq!(sink.snapshots.len(), 2);
        assert_eq!(sink.snapshots[1].time, 0.5);
        assert_eq!(sink.snapshots[0].states[0].vx, 3.0);
        Ok(())
    }
}
