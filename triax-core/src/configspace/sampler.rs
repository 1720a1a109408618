//! Parallel configuration-space sampler.
//!
//! Rows are distributed to a bounded pool of named worker threads over a
//! crossbeam channel; every cell poses the instrument and records the
//! colliding obstacle. The caller's progress callback is throttled and may
//! cancel the run, as may the shared stop flag (checked once per row).

use super::{ConfigSpaceRaster, LIMIT_IDENT};
use crate::error::{CoreError, Result};
use crate::instrument::InstrumentSpace;
use crossbeam_channel::unbounded;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Raw cell value for positions outside the mechanical angular limits.
const LIMIT_RAW: u32 = u32::MAX;

/// Sampler inputs. Angles in radians.
#[derive(Clone, Debug)]
pub struct SamplerParams {
    /// a2 step per raster row
    pub da2: f64,
    /// a4 step per raster column
    pub da4: f64,
    /// sampled a2 interval
    pub a2_range: (f64, f64),
    /// sampled a4 interval
    pub a4_range: (f64, f64),
    /// worker cap; the pool size is `min(available_parallelism / 2, this)`,
    /// at least one
    pub max_threads: usize,
    /// upper bound on progress notifications for the stage
    pub progress_granularity: usize,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            da2: 0.5 / 180.0 * std::f64::consts::PI,
            da4: 0.5 / 180.0 * std::f64::consts::PI,
            a2_range: (0.0, std::f64::consts::PI),
            a4_range: (-std::f64::consts::PI, std::f64::consts::PI),
            max_threads: 8,
            progress_granularity: 100,
        }
    }
}

impl SamplerParams {
    fn validate(&self) -> Result<()> {
        let finite = self.da2.is_finite()
            && self.da4.is_finite()
            && self.a2_range.0.is_finite()
            && self.a2_range.1.is_finite()
            && self.a4_range.0.is_finite()
            && self.a4_range.1.is_finite();
        if !finite {
            return Err(CoreError::InvalidInput("non-finite sampler bounds".into()));
        }
        if self.da2 <= 0.0 || self.da4 <= 0.0 {
            return Err(CoreError::InvalidInput("sampler deltas must be positive".into()));
        }
        if self.a2_range.1 <= self.a2_range.0 || self.a4_range.1 <= self.a4_range.0 {
            return Err(CoreError::InvalidInput("empty sampler range".into()));
        }
        Ok(())
    }

    fn pool_size(&self) -> usize {
        let hw = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        (hw / 2).min(self.max_threads).max(1)
    }
}

/// Raster the configuration space.
///
/// # Arguments
/// * `instrument` - collaborator queried per cell; immutable for the run
/// * `params` - bounds, deltas and pool configuration
/// * `stop` - cooperative cancellation flag
/// * `progress` - throttled callback in `[0, 1]`; returning `false` cancels
///
/// # Errors
/// [`CoreError::Cancelled`] when the stop flag was raised or the progress
/// callback vetoed; the partial raster is discarded.
pub fn sample_config_space(
    instrument: &dyn InstrumentSpace,
    params: &SamplerParams,
    stop: &AtomicBool,
    progress: &(dyn Fn(f64) -> bool + Sync),
) -> Result<ConfigSpaceRaster> {
    params.validate()?;

    let width = ((params.a4_range.1 - params.a4_range.0) / params.da4).ceil() as usize;
    let height = ((params.a2_range.1 - params.a2_range.0) / params.da2).ceil() as usize;
    if width == 0 || height == 0 {
        return Err(CoreError::InvalidInput("empty sampler raster".into()));
    }

    let limits = instrument.angular_limits();
    let n_threads = params.pool_size();
    log::info!("sampling configuration space {width}x{height} in {n_threads} threads");

    let mut raw = vec![0u32; width * height];

    let (job_tx, job_rx) = unbounded();
    for job in raw.chunks_mut(width).enumerate() {
        job_tx.send(job).expect("job queue open");
    }
    drop(job_tx);

    let (done_tx, done_rx) = unbounded::<usize>();
    let (a4_lo, a4_hi) = params.a4_range;
    let (a2_lo, a2_hi) = params.a2_range;

    std::thread::scope(|scope| {
        for t in 0..n_threads {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            std::thread::Builder::new()
                .name(format!("cfgspace-{t}"))
                .spawn_scoped(scope, move || {
                    while let Ok((row_idx, row)) = job_rx.recv() {
                        if stop.load(Ordering::Relaxed) {
                            return;
                        }
                        let a2 = a2_lo + (a2_hi - a2_lo) * (row_idx as f64 / height as f64);
                        for (col, cell) in row.iter_mut().enumerate() {
                            let a4 = a4_lo + (a4_hi - a4_lo) * (col as f64 / width as f64);

                            let within = a2 >= limits.a2_lo
                                && a2 <= limits.a2_hi
                                && a4 >= limits.a4_lo
                                && a4 <= limits.a4_hi;
                            *cell = if !within {
                                LIMIT_RAW
                            } else {
                                let hit = instrument.check_collision(a2, a4);
                                if hit.colliding {
                                    hit.obstacle
                                } else {
                                    0
                                }
                            };
                        }
                        if done_tx.send(row_idx).is_err() {
                            return;
                        }
                    }
                })
                .expect("spawn sampler worker");
        }
        drop(done_tx);

        // collect results, forwarding throttled progress
        let notify_every = (height / params.progress_granularity.max(1)).max(1);
        let mut rows_done = 0usize;
        while let Ok(_row) = done_rx.recv() {
            rows_done += 1;
            if rows_done % notify_every == 0 {
                let fraction = rows_done as f64 / height as f64;
                if !progress(fraction) {
                    stop.store(true, Ordering::Relaxed);
                }
            }
            if rows_done == height {
                break;
            }
        }
    });

    // all workers have exited; release the row borrows before using `raw`
    drop(job_rx);

    if stop.load(Ordering::Relaxed) {
        log::info!("configuration space sampling cancelled");
        return Err(CoreError::Cancelled);
    }
    progress(1.0);

    Ok(compact_ids(
        raw,
        width,
        height,
        params.a4_range,
        params.a2_range,
        instrument,
    ))
}

/// Compress raw obstacle ids into contiguous group ids (1 upward) in
/// row-major first-encounter order, so repeated samples of an unchanged
/// instrument yield identical rasters.
fn compact_ids(
    raw: Vec<u32>,
    width: usize,
    height: usize,
    a4_range: (f64, f64),
    a2_range: (f64, f64),
    instrument: &dyn InstrumentSpace,
) -> ConfigSpaceRaster {
    let mut raster = ConfigSpaceRaster::new(width, height, a4_range, a2_range);
    let mut mapping: HashMap<u32, u8> = HashMap::new();
    let mut idents: Vec<String> = Vec::new();

    {
        let mut rows = raster.rows_mut();
        for (row_idx, row) in rows.by_ref().enumerate() {
            for (col, cell) in row.iter_mut().enumerate() {
                let raw_id = raw[row_idx * width + col];
                if raw_id == 0 {
                    continue;
                }
                let compact = match mapping.get(&raw_id) {
                    Some(&c) => c,
                    None => {
                        if idents.len() >= u8::MAX as usize {
                            log::warn!("more than {} obstacle groups, merging", u8::MAX);
                            u8::MAX
                        } else {
                            let ident = if raw_id == LIMIT_RAW {
                                LIMIT_IDENT.to_string()
                            } else {
                                instrument
                                    .obstacle_ident(raw_id)
                                    .map(str::to_string)
                                    .unwrap_or_else(|| format!("obstacle-{raw_id}"))
                            };
                            idents.push(ident);
                            let c = idents.len() as u8;
                            mapping.insert(raw_id, c);
                            c
                        }
                    }
                };
                *cell = compact;
            }
        }
    }

    raster.set_obstacle_idents(idents);
    raster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{AngularLimits, Collision};
    use std::f64::consts::PI;
    use std::sync::atomic::AtomicUsize;

    /// Test double: a single forbidden angular rectangle.
    struct BlockedRect {
        a2: (f64, f64),
        a4: (f64, f64),
    }

    impl InstrumentSpace for BlockedRect {
        fn check_collision(&self, a2: f64, a4: f64) -> Collision {
            if a2 >= self.a2.0 && a2 <= self.a2.1 && a4 >= self.a4.0 && a4 <= self.a4.1 {
                Collision::with(1)
            } else {
                Collision::FREE
            }
        }

        fn angular_limits(&self) -> AngularLimits {
            AngularLimits {
                a2_lo: -PI,
                a2_hi: PI,
                a4_lo: -PI,
                a4_hi: PI,
            }
        }

        fn generation(&self) -> u64 {
            0
        }

        fn obstacle_ident(&self, id: u32) -> Option<&str> {
            (id == 1).then_some("block")
        }
    }

    fn params() -> SamplerParams {
        SamplerParams {
            da2: 0.1,
            da4: 0.1,
            a2_range: (0.0, 2.0),
            a4_range: (0.0, 2.0),
            max_threads: 2,
            progress_granularity: 10,
        }
    }

    #[test]
    fn test_sampled_raster_marks_block() {
        let instr = BlockedRect {
            a2: (0.5, 1.0),
            a4: (0.5, 1.0),
        };
        let stop = AtomicBool::new(false);
        let raster = sample_config_space(&instr, &params(), &stop, &|_| true).unwrap();

        assert_eq!(raster.width(), 20);
        assert_eq!(raster.height(), 20);
        assert_eq!(raster.obstacle_idents(), &["block".to_string()]);

        // centre of the block is forbidden, far corner is free
        assert!(!raster.angle_is_free(crate::core::Vec2::new(0.75, 0.75)));
        assert!(raster.angle_is_free(crate::core::Vec2::new(1.8, 1.8)));
    }

    #[test]
    fn test_progress_reported() {
        let instr = BlockedRect {
            a2: (0.5, 1.0),
            a4: (0.5, 1.0),
        };
        let stop = AtomicBool::new(false);
        let notifications = AtomicUsize::new(0);
        let raster = sample_config_space(&instr, &params(), &stop, &|fraction| {
            notifications.fetch_add(1, Ordering::Relaxed);
            assert!((0.0..=1.0).contains(&fraction));
            true
        });
        assert!(raster.is_ok());
        let n = notifications.load(Ordering::Relaxed);
        assert!(n >= 2, "expected some progress notifications, got {n}");
        assert!(n <= 12, "progress not throttled: {n}");
    }

    #[test]
    fn test_cancellation_via_callback() {
        let instr = BlockedRect {
            a2: (0.5, 1.0),
            a4: (0.5, 1.0),
        };
        let stop = AtomicBool::new(false);
        let result = sample_config_space(&instr, &params(), &stop, &|fraction| fraction < 0.3);
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn test_cancellation_via_flag() {
        let instr = BlockedRect {
            a2: (0.5, 1.0),
            a4: (0.5, 1.0),
        };
        let stop = AtomicBool::new(true);
        let result = sample_config_space(&instr, &params(), &stop, &|_| true);
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let instr = BlockedRect {
            a2: (0.5, 1.0),
            a4: (0.5, 1.0),
        };
        let stop = AtomicBool::new(false);
        let mut bad = params();
        bad.da2 = 0.0;
        assert!(sample_config_space(&instr, &bad, &stop, &|_| true).is_err());

        let mut bad = params();
        bad.a2_range = (1.0, f64::NAN);
        assert!(sample_config_space(&instr, &bad, &stop, &|_| true).is_err());
    }

    #[test]
    fn test_limit_cells_marked() {
        struct Limited;
        impl InstrumentSpace for Limited {
            fn check_collision(&self, _: f64, _: f64) -> Collision {
                Collision::FREE
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
            fn obstacle_ident(&self, _: u32) -> Option<&str> {
                None
            }
        }

        let stop = AtomicBool::new(false);
        let raster = sample_config_space(&Limited, &params(), &stop, &|_| true).unwrap();
        // cells beyond the limits carry the reserved ident
        assert!(raster
            .obstacle_idents()
            .iter()
            .any(|ident| ident == LIMIT_IDENT));
        assert!(!raster.angle_is_free(crate::core::Vec2::new(1.5, 1.5)));
        assert!(raster.angle_is_free(crate::core::Vec2::new(0.5, 0.5)));
    }
}
