//! The broadcasting loop.
//!
//! A run goes through these phases, in order:
//!
//! 1. **Plan**: read operand headers, check writability, and resolve
//!    the iteration length and strides. Any error here leaves every
//!    array untouched.
//! 2. **Attach** every distinct array under an [`AttachGuard`].
//! 3. **Combine masks**: OR the masks of the mask-source operands.
//! 4. **Loop**: move the buffers out of the arena, snapshot read aliases
//!    of written arrays, and call the kernel at every unmasked index,
//!    split into chunks on a rayon pool when allowed. Buffers go back
//!    into the arena even if the kernel fails.
//! 5. **Finish**: overwrite the masks of mask-sink operands, sync the
//!    written arrays, and drop the guards (detach).

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use smallvec::SmallVec;
use tessera_arena::{ArrayArena, AttachGuard};
use tessera_core::{ArrayError, ArrayId, Buffer, Value};

use crate::config::EngineConfig;
use crate::kernel::{Kernel, Slot, ValueKernel};
use crate::metrics::{KernelMetrics, RangeStats};
use crate::operand::Operand;
use crate::plan::{Lane, OperandInfo, Plan, MAX_OPERANDS};

/// Element bytes of one operand for the duration of a loop.
enum LaneBytes<'a> {
    Read(&'a [u8]),
    Write(&'a mut [u8]),
}

/// Runs kernels over broadcast operands.
///
/// Parallel loops run on rayon's global pool unless the configuration
/// names an explicit worker count, in which case the engine owns a pool
/// of that size. Clones share the pool.
#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    pool: Option<Arc<ThreadPool>>,
}

impl Engine {
    /// An engine with a validated configuration.
    ///
    /// Fails with `InvalidConfig` if the configuration is invalid or its
    /// worker pool cannot be started.
    pub fn new(config: EngineConfig) -> Result<Self, ArrayError> {
        config.validate()?;
        let pool = match config.worker_count {
            Some(_) if config.resolved_worker_count() > 1 => Some(Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(config.resolved_worker_count())
                    .thread_name(|i| format!("tessera-worker-{i}"))
                    .build()
                    .map_err(|err| ArrayError::InvalidConfig {
                        reason: format!("cannot start worker pool: {err}"),
                    })?,
            )),
            _ => None,
        };
        Ok(Self { config, pool })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Call `kernel` once per unmasked iteration index over `operands`.
    ///
    /// The iteration length is the element count shared by every operand
    /// that is not a one-element scalar; scalars are broadcast. Fails with
    /// `ShapeMismatch` if two non-scalar operands disagree, `ReadOnly` if
    /// a written operand is read-only, and `AliasedOutput` if one array is
    /// written through two operands. All of these are detected before the
    /// kernel is first called.
    pub fn run_kernel<K: Kernel + ?Sized>(
        &self,
        arena: &ArrayArena,
        kernel: &K,
        operands: &[Operand],
    ) -> Result<KernelMetrics, ArrayError> {
        let started = Instant::now();
        let plan = plan(arena, operands)?;

        let guards = plan
            .distinct
            .iter()
            .map(|&id| arena.attach_scope(id))
            .collect::<Result<Vec<AttachGuard<'_>>, _>>()?;
        let mask = combined_mask(arena, operands, plan.len)?;

        let mut buffers = take_buffers(arena, &plan.distinct)?;
        let result = self.execute(kernel, &plan, &mut buffers, mask.as_deref());
        let restored = restore_buffers(arena, &plan.distinct, buffers);
        let (stats, workers) = match (result, restored) {
            (Ok(done), Ok(())) => done,
            (Err(err), Ok(())) | (Ok(_), Err(err)) => return Err(err),
            (Err(err), Err(undo)) => {
                eprintln!("tessera: failed to restore operand buffers after a kernel error: {undo}");
                return Err(err);
            }
        };

        for op in operands.iter().filter(|op| op.mask_sink) {
            write_sink_mask(arena, op.id, mask.as_deref())?;
        }
        for (guard, &written) in guards.iter().zip(&plan.written) {
            if written {
                guard.sync()?;
            }
        }
        drop(guards);

        let mut metrics = KernelMetrics {
            workers,
            ..KernelMetrics::default()
        };
        metrics.absorb(&stats);
        metrics.elapsed_us = started.elapsed().as_micros() as u64;
        Ok(metrics)
    }

    /// Apply `f` element-wise: `output[i] = f(&[inputs[0][i], ...])`.
    ///
    /// Inputs are read operands and mask sources; `output` is written and
    /// is the mask sink, so it ends up masked wherever any input is.
    pub fn run_map<F>(
        &self,
        arena: &ArrayArena,
        f: F,
        inputs: &[ArrayId],
        output: ArrayId,
    ) -> Result<KernelMetrics, ArrayError>
    where
        F: Fn(&[Value]) -> Value + Sync,
    {
        let operands: Vec<Operand> = inputs
            .iter()
            .map(|&id| Operand::read(id))
            .chain(std::iter::once(Operand::write(output)))
            .collect();
        self.run_kernel(arena, &ValueKernel::new(f), &operands)
    }

    /// Number of workers a loop over `plan` may use.
    fn workers_for(&self, plan: &Plan) -> usize {
        let workers = self.config.resolved_worker_count();
        let splittable = plan.lanes.iter().all(|lane| lane.elem.bytes() > 0);
        if workers > 1
            && splittable
            && plan.len > self.config.parallel_threshold
            && !plan.broadcast_output()
        {
            workers.min(plan.len)
        } else {
            1
        }
    }

    fn execute<K: Kernel + ?Sized>(
        &self,
        kernel: &K,
        plan: &Plan,
        buffers: &mut [Buffer],
        mask: Option<&[bool]>,
    ) -> Result<(RangeStats, usize), ArrayError> {
        let snapshots: Vec<Option<Buffer>> = buffers
            .iter()
            .enumerate()
            .map(|(slot, buf)| plan.needs_snapshot(slot).then(|| buf.clone()))
            .collect();

        let mut reads: Vec<Option<&[u8]>> = Vec::with_capacity(buffers.len());
        let mut writes: Vec<Option<&mut [u8]>> = Vec::with_capacity(buffers.len());
        for (buf, &written) in buffers.iter_mut().zip(&plan.written) {
            if written {
                reads.push(None);
                writes.push(buf.as_bytes_mut());
            } else {
                reads.push(buf.as_bytes());
                writes.push(None);
            }
        }

        let mut lanes: SmallVec<[LaneBytes<'_>; MAX_OPERANDS]> = SmallVec::new();
        for lane in &plan.lanes {
            let id = plan.distinct[lane.slot];
            let bytes = if lane.access.writes() {
                writes[lane.slot]
                    .take()
                    .map(LaneBytes::Write)
                    .ok_or(ArrayError::AliasedOutput { array: id })?
            } else if lane.snapshot {
                snapshots[lane.slot]
                    .as_ref()
                    .and_then(Buffer::as_bytes)
                    .map(LaneBytes::Read)
                    .ok_or_else(|| host_operand(lane))?
            } else {
                reads[lane.slot]
                    .map(LaneBytes::Read)
                    .ok_or_else(|| host_operand(lane))?
            };
            lanes.push(bytes);
        }

        let workers = self.workers_for(plan);
        if workers <= 1 {
            let stats = run_range(kernel, &plan.lanes, &mut lanes, 0, 0..plan.len, mask)?;
            return Ok((stats, 1));
        }
        let run = || run_parallel(kernel, plan, lanes, workers, mask);
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

/// Resolve operand headers into a [`Plan`], refusing read-only outputs.
fn plan(arena: &ArrayArena, operands: &[Operand]) -> Result<Plan, ArrayError> {
    let mut infos: SmallVec<[OperandInfo; MAX_OPERANDS]> = SmallVec::new();
    for op in operands {
        if op.access.writes() && arena.is_read_only(op.id)? {
            return Err(ArrayError::ReadOnly { array: op.id });
        }
        infos.push(OperandInfo {
            id: op.id,
            access: op.access,
            count: arena.element_count(op.id)?,
            elem: arena.element(op.id)?,
        });
    }
    Plan::build(&infos)
}

/// OR of the masks of every mask-source operand, broadcasting one-element
/// masks. `None` if no source has a masked element.
fn combined_mask(
    arena: &ArrayArena,
    operands: &[Operand],
    len: usize,
) -> Result<Option<Vec<bool>>, ArrayError> {
    let mut combined: Option<Vec<bool>> = None;
    for op in operands.iter().filter(|op| op.mask_source) {
        let Some(bits) = arena.read_mask(op.id)? else {
            continue;
        };
        if !bits.contains(&true) {
            continue;
        }
        let out = combined.get_or_insert_with(|| vec![false; len]);
        if bits.len() == 1 {
            out.fill(true);
        } else {
            for (o, &b) in out.iter_mut().zip(&bits) {
                *o |= b;
            }
        }
    }
    Ok(combined)
}

/// Overwrite the mask of `id` from the combined mask; a broadcast sink is
/// masked if any index was. Without a combined mask the sink is cleared.
fn write_sink_mask(arena: &ArrayArena, id: ArrayId, mask: Option<&[bool]>) -> Result<(), ArrayError> {
    let Some(bits) = mask else {
        return arena.clear_mask(id);
    };
    let count = arena.element_count(id)?;
    if count == bits.len() {
        arena.write_mask(id, bits)
    } else {
        arena.write_mask(id, &vec![bits.contains(&true); count])
    }
}

fn take_buffers(arena: &ArrayArena, ids: &[ArrayId]) -> Result<Vec<Buffer>, ArrayError> {
    let mut taken = Vec::with_capacity(ids.len());
    for &id in ids {
        match arena.take_buffer(id) {
            Ok(buffer) => taken.push(buffer),
            Err(err) => {
                if let Err(undo) = restore_buffers(arena, &ids[..taken.len()], taken) {
                    eprintln!("tessera: failed to restore operand buffers after {err}: {undo}");
                }
                return Err(err);
            }
        }
    }
    Ok(taken)
}

/// Return every buffer to its array, reporting the first failure.
fn restore_buffers(arena: &ArrayArena, ids: &[ArrayId], buffers: Vec<Buffer>) -> Result<(), ArrayError> {
    let mut first = Ok(());
    for (&id, buffer) in ids.iter().zip(buffers) {
        if let Err(err) = arena.restore_buffer(id, buffer) {
            if first.is_ok() {
                first = Err(err);
            }
        }
    }
    first
}

fn host_operand(lane: &Lane) -> ArrayError {
    ArrayError::UnsupportedElement {
        kind: lane.elem.kind(),
        operation: "broadcast iteration",
    }
}

/// Call `kernel` for every index of `range`. Write lanes hold the bytes
/// from index `base` on; read lanes hold the whole operand.
fn run_range<K: Kernel + ?Sized>(
    kernel: &K,
    meta: &[Lane],
    lanes: &mut [LaneBytes<'_>],
    base: usize,
    range: Range<usize>,
    mask: Option<&[bool]>,
) -> Result<RangeStats, ArrayError> {
    let mut stats = RangeStats::default();
    for index in range {
        if mask.is_some_and(|m| m[index]) {
            stats.masked_skips += 1;
            continue;
        }
        let mut slots: SmallVec<[Slot<'_>; MAX_OPERANDS]> = SmallVec::new();
        for (lane, bytes) in meta.iter().zip(lanes.iter_mut()) {
            let size = lane.elem.bytes();
            match bytes {
                LaneBytes::Read(b) => {
                    let at = index * lane.stride * size;
                    slots.push(Slot::read(lane.elem, &b[at..at + size]));
                }
                LaneBytes::Write(b) => {
                    let at = (index - base) * lane.stride * size;
                    slots.push(Slot::write(lane.elem, &mut b[at..at + size]));
                }
            }
        }
        kernel.call(index, &mut slots)?;
        stats.iterations += 1;
    }
    Ok(stats)
}

/// Split the index range into contiguous chunks, one rayon task each.
/// Every write lane has stride 1 here, so its bytes split the same way.
fn run_parallel<K: Kernel + ?Sized>(
    kernel: &K,
    plan: &Plan,
    lanes: SmallVec<[LaneBytes<'_>; MAX_OPERANDS]>,
    workers: usize,
    mask: Option<&[bool]>,
) -> Result<(RangeStats, usize), ArrayError> {
    let chunk = plan.len.div_ceil(workers);
    let chunks = plan.len.div_ceil(chunk);

    let mut columns: Vec<std::vec::IntoIter<LaneBytes<'_>>> = lanes
        .into_iter()
        .zip(&plan.lanes)
        .map(|(bytes, lane)| {
            let column: Vec<LaneBytes<'_>> = match bytes {
                LaneBytes::Read(b) => (0..chunks).map(|_| LaneBytes::Read(b)).collect(),
                LaneBytes::Write(b) => b
                    .chunks_mut(chunk * lane.elem.bytes())
                    .map(LaneBytes::Write)
                    .collect(),
            };
            column.into_iter()
        })
        .collect();
    let parts: Vec<(usize, SmallVec<[LaneBytes<'_>; MAX_OPERANDS]>)> = (0..chunks)
        .map(|k| (k * chunk, columns.iter_mut().filter_map(Iterator::next).collect()))
        .collect();

    let stats = parts
        .into_par_iter()
        .map(|(start, mut own)| {
            let end = (start + chunk).min(plan.len);
            run_range(kernel, &plan.lanes, &mut own, start, start..end, mask)
        })
        .try_reduce(RangeStats::default, |a, b| Ok(a.merged(b)))?;
    Ok((stats, chunks))
}
