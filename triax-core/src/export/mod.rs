//! Path exporters for instrument control systems.
//!
//! One trait, one method; the builder dispatches through `&dyn PathExporter`
//! so new formats plug in without touching the pipeline. All formats emit
//! angles in degrees with six decimal places; input vertices are radians
//! with `x = a4`, `y = a2`.

use crate::core::{to_degrees, Vec2};
use crate::error::Result;
use std::io::Write;

/// A path export format.
pub trait PathExporter {
    /// Write the path vertices to the sink.
    fn export(&self, vertices: &[Vec2], sink: &mut dyn Write) -> Result<()>;
}

/// Raw two-column table: `a4 a2`, degrees, one vertex per line.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawExporter;

impl PathExporter for RawExporter {
    fn export(&self, vertices: &[Vec2], sink: &mut dyn Write) -> Result<()> {
        writeln!(sink, "# {:>16} {:>16}", "a4 (deg)", "a2 (deg)")?;
        for vertex in vertices {
            writeln!(
                sink,
                "{:>18.6} {:>16.6}",
                to_degrees(vertex.x),
                to_degrees(vertex.y)
            )?;
        }
        Ok(())
    }
}

/// NOMAD command script: one drive command per vertex.
#[derive(Clone, Copy, Debug)]
pub struct NomadExporter {
    /// fixed wavevector, 1/Angstrom
    pub k_fixed: f64,
    pub kf_fixed: bool,
}

impl Default for NomadExporter {
    fn default() -> Self {
        Self {
            k_fixed: 1.4,
            kf_fixed: true,
        }
    }
}

impl PathExporter for NomadExporter {
    fn export(&self, vertices: &[Vec2], sink: &mut dyn Write) -> Result<()> {
        if self.kf_fixed {
            writeln!(sink, "dr kf {}", self.k_fixed)?;
        } else {
            writeln!(sink, "dr ki {}", self.k_fixed)?;
        }
        writeln!(sink)?;

        for vertex in vertices {
            writeln!(
                sink,
                "dr a4 {:.6} a2 {:.6}",
                to_degrees(vertex.x),
                to_degrees(vertex.y)
            )?;
        }

        writeln!(sink)?;
        writeln!(sink, "co")?;
        Ok(())
    }
}

/// NICOS command script with air-cushion handling and backlash suppression
/// around the moves.
#[derive(Clone, Copy, Debug)]
pub struct NicosExporter {
    pub k_fixed: f64,
    pub kf_fixed: bool,
}

impl Default for NicosExporter {
    fn default() -> Self {
        Self {
            k_fixed: 1.4,
            kf_fixed: true,
        }
    }
}

impl PathExporter for NicosExporter {
    fn export(&self, vertices: &[Vec2], sink: &mut dyn Write) -> Result<()> {
        let mono_motor = if self.kf_fixed { "mtt" } else { "att" };
        let mono_air = if self.kf_fixed { "air_mono" } else { "air_ana" };

        if self.kf_fixed {
            writeln!(sink, "kf({})", self.k_fixed)?;
        } else {
            writeln!(sink, "ki({})", self.k_fixed)?;
        }

        writeln!(sink)?;
        writeln!(sink, "# turn on air for the entire path")?;
        writeln!(sink, "move(\"air_sample\", 1)")?;
        writeln!(sink, "move(\"{mono_air}\", 1)")?;

        writeln!(sink)?;
        writeln!(sink, "# disable motor backlash correction")?;
        writeln!(sink, "stt_maxtries = stt.maxtries")?;
        writeln!(sink, "stt.maxtries = 0")?;
        writeln!(sink, "{mono_motor}_maxtries = {mono_motor}.maxtries")?;
        writeln!(sink, "{mono_motor}.maxtries = 0")?;

        writeln!(sink)?;
        writeln!(sink, "# path vertices")?;
        for vertex in vertices {
            writeln!(
                sink,
                "maw(stt, {:.6}, {mono_motor}, {:.6})",
                to_degrees(vertex.x),
                to_degrees(vertex.y)
            )?;
        }

        writeln!(sink)?;
        writeln!(sink, "# turn off air")?;
        writeln!(sink, "move(\"air_sample\", 0)")?;
        writeln!(sink, "move(\"{mono_air}\", 0)")?;

        writeln!(sink)?;
        writeln!(sink, "# restore motor backlash correction")?;
        writeln!(sink, "stt.maxtries = stt_maxtries")?;
        writeln!(sink, "{mono_motor}.maxtries = {mono_motor}_maxtries")?;
        Ok(())
    }
}
