use super::{
    tracker::{BarrierRef, ImageUseTracker, TrackedSlice},
    types::{task_buffer_access_to_access, task_image_access_to_layout_access, TaskImageId},
    Task, TaskBufferSlot, TaskImageSlot, TaskListInfo,
};
use crate::{
    device::Device,
    error::Result,
    slice::{ImageMipArraySlice, ImageSliceState},
    split_barrier::{SplitBarrierInfo, SplitBarrierState},
    types::Access,
};

use ash::vk;
use log::{debug, trace};

pub(crate) type TaskId = usize;

/// A synchronization point between batches. A `None` image id makes this a
/// memory barrier, otherwise it is an image memory barrier with a layout
/// transition over `slice`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TaskBarrier {
    pub image_id: Option<TaskImageId>,
    pub slice: ImageMipArraySlice,
    pub src_layout: vk::ImageLayout,
    pub dst_layout: vk::ImageLayout,
    pub src_access: Access,
    pub dst_access: Access,
}

/// A barrier split into a signal after its source batch and a wait before its
/// destination batch, letting unrelated batches in between overlap with it.
#[derive(Clone, Debug)]
pub(crate) struct TaskSplitBarrier {
    pub state: SplitBarrierState,
    pub image_id: Option<TaskImageId>,
    pub slice: ImageMipArraySlice,
    pub src_layout: vk::ImageLayout,
    pub dst_layout: vk::ImageLayout,
    pub src_access: Access,
    pub dst_access: Access,
}

#[derive(Default)]
pub(crate) struct TaskBatch {
    pub pipeline_barrier_indices: Vec<usize>,
    pub wait_split_barrier_indices: Vec<usize>,
    pub tasks: Vec<TaskId>,
    pub signal_split_barrier_indices: Vec<usize>,
}

/// First and last batch touching a transient resource. This is the window an
/// aliasing allocator may not share the resource's memory within.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResourceLifetime {
    pub first_batch: usize,
    pub last_batch: usize,
}

/// The compiled execution plan. Fixed once compilation succeeds; every
/// execution replays it.
pub(crate) struct Plan {
    pub batches: Vec<TaskBatch>,
    pub barriers: Vec<TaskBarrier>,
    pub split_barriers: Vec<TaskSplitBarrier>,
    /// Barriers issued after the last batch to reach final-access hints.
    pub terminal_barrier_indices: Vec<usize>,
    /// Access of each buffer's first use, `NONE` when the plan never touches
    /// it. Persistent buffers are reconciled to this at execute time.
    pub buffer_first: Vec<Access>,
    /// First-use states of persistent images, reconciled at execute time.
    pub image_first: Vec<Vec<ImageSliceState>>,
    pub buffer_final: Vec<Access>,
    pub image_final: Vec<Vec<ImageSliceState>>,
    pub buffer_lifetimes: Vec<Option<ResourceLifetime>>,
    pub image_lifetimes: Vec<Option<ResourceLifetime>>,
}

/// Non-fatal findings surfaced by compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileWarning {
    /// The first access to the resource reads contents nothing has written.
    UninitializedRead { resource: String },
    /// The resource's final content is a write nothing will ever read.
    DeadWrite { resource: String },
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileWarning::UninitializedRead { resource } => {
                write!(f, "\"{resource}\" is read before anything initializes it")
            }
            CompileWarning::DeadWrite { resource } => {
                write!(f, "the last write to \"{resource}\" is never read")
            }
        }
    }
}

struct BufferCompileState {
    latest_access: Access,
    latest_batch: Option<usize>,
    read_barrier: Option<BarrierRef>,
    /// While true, additional reads still widen the first access that the
    /// execute-time reconciliation synchronizes towards.
    first_window: bool,
}

struct Compiler<'a> {
    device: &'a dyn Device,
    info: &'a TaskListInfo,
    buffers: &'a [TaskBufferSlot],
    images: &'a [TaskImageSlot],
    plan: Plan,
    buffer_states: Vec<BufferCompileState>,
    trackers: Vec<ImageUseTracker>,
    warnings: Vec<CompileWarning>,
}

pub(crate) fn compile(
    device: &dyn Device,
    info: &TaskListInfo,
    tasks: &[Task],
    buffers: &[TaskBufferSlot],
    images: &[TaskImageSlot],
) -> Result<(Plan, Vec<CompileWarning>)> {
    let mut compiler = Compiler {
        device,
        info,
        buffers,
        images,
        plan: Plan {
            batches: vec![TaskBatch::default()],
            barriers: Vec::new(),
            split_barriers: Vec::new(),
            terminal_barrier_indices: Vec::new(),
            buffer_first: vec![Access::default(); buffers.len()],
            image_first: vec![Vec::new(); images.len()],
            buffer_final: vec![Access::default(); buffers.len()],
            image_final: vec![Vec::new(); images.len()],
            buffer_lifetimes: vec![None; buffers.len()],
            image_lifetimes: vec![None; images.len()],
        },
        buffer_states: buffers
            .iter()
            .map(|_| BufferCompileState {
                latest_access: Access::default(),
                latest_batch: None,
                read_barrier: None,
                first_window: false,
            })
            .collect(),
        trackers: images
            .iter()
            .map(|slot| ImageUseTracker::new(slot.full_slice))
            .collect(),
        warnings: Vec::new(),
    };

    for (task_id, task) in tasks.iter().enumerate() {
        compiler.add_task(task_id, task)?;
    }
    compiler.emit_terminal_barriers();
    compiler.record_final_states();
    compiler.collect_dead_write_warnings();
    compiler.sort_barrier_sets();

    debug!(
        "compiled task list \"{}\": {} tasks, {} batches, {} barriers, {} split barriers",
        compiler.info.debug_name,
        tasks.len(),
        compiler.plan.batches.len(),
        compiler.plan.barriers.len(),
        compiler.plan.split_barriers.len(),
    );

    Ok((compiler.plan, compiler.warnings))
}

impl<'a> Compiler<'a> {
    fn add_task(&mut self, task_id: TaskId, task: &Task) -> Result<()> {
        let batch_index = self.select_batch(task);
        for buffer_use in &task.buffer_uses {
            self.add_buffer_use(buffer_use.id.index as usize, buffer_use.access, batch_index)?;
        }
        for image_use in &task.image_uses {
            self.add_image_use(
                image_use.id,
                image_use.access,
                image_use.slice,
                batch_index,
            )?;
        }
        self.plan.batches[batch_index].tasks.push(task_id);
        Ok(())
    }

    /// Tasks are never reordered: a task lands in the open batch unless one
    /// of its uses conflicts with an access already in that batch, which
    /// closes it and opens the next one.
    fn select_batch(&mut self, task: &Task) -> usize {
        let current = self.plan.batches.len() - 1;
        let mut conflicts = false;

        for buffer_use in &task.buffer_uses {
            let new_access = task_buffer_access_to_access(buffer_use.access);
            if new_access.is_none() {
                continue;
            }
            let state = &self.buffer_states[buffer_use.id.index as usize];
            if state.latest_batch == Some(current)
                && !state.latest_access.is_none()
                && !state.latest_access.is_compatible(new_access)
            {
                conflicts = true;
            }
        }
        for image_use in &task.image_uses {
            let (new_layout, new_access) = task_image_access_to_layout_access(image_use.access);
            if new_access.is_none() {
                continue;
            }
            let tracker = &self.trackers[image_use.id.index as usize];
            for tracked in tracker.slices() {
                if tracked.batch != Some(current)
                    || tracked.state.latest_access.is_none()
                    || !tracked.state.slice.intersects(image_use.slice)
                {
                    continue;
                }
                let compatible = tracked.state.latest_access.is_compatible(new_access)
                    && tracked.state.latest_layout == new_layout;
                if !compatible {
                    conflicts = true;
                }
            }
        }

        if conflicts {
            self.plan.batches.push(TaskBatch::default());
        }
        self.plan.batches.len() - 1
    }

    fn add_buffer_use(
        &mut self,
        index: usize,
        access: super::types::TaskBufferAccess,
        batch_index: usize,
    ) -> Result<()> {
        let new_access = task_buffer_access_to_access(access);
        if new_access.is_none() {
            return Ok(());
        }
        let slot = &self.buffers[index];
        let state = &mut self.buffer_states[index];

        if state.latest_access.is_none() {
            // First touch. Synchronization against whatever happened before
            // this plan runs is generated at execute time, so nothing is
            // recorded here. Buffers have no layout to initialize.
            self.plan.buffer_first[index] = new_access;
            state.first_window = true;
            if new_access.is_read_only() && slot.starts_uninitialized() {
                self.warnings.push(CompileWarning::UninitializedRead {
                    resource: slot.name.clone(),
                });
            }
            state.latest_access = new_access;
        } else if state.latest_access.is_compatible(new_access) {
            // Read on read: widen the barrier that made the buffer visible to
            // the first reader instead of synchronizing again.
            match state.read_barrier {
                Some(BarrierRef::Pipeline(barrier_index)) => {
                    let barrier = &mut self.plan.barriers[barrier_index];
                    barrier.dst_access = barrier.dst_access | new_access;
                }
                Some(BarrierRef::Split(split_index)) => {
                    let barrier = &mut self.plan.split_barriers[split_index];
                    barrier.dst_access = barrier.dst_access | new_access;
                }
                None => {
                    if state.first_window {
                        self.plan.buffer_first[index] = self.plan.buffer_first[index] | new_access;
                    }
                }
            }
            state.latest_access = state.latest_access | new_access;
        } else {
            state.first_window = false;
            let src_access = state.latest_access;
            let src_batch = state
                .latest_batch
                .expect("a touched buffer always has a batch");
            let barrier_ref = self.push_barrier(
                TaskBarrier {
                    image_id: None,
                    slice: ImageMipArraySlice::default(),
                    src_layout: vk::ImageLayout::UNDEFINED,
                    dst_layout: vk::ImageLayout::UNDEFINED,
                    src_access,
                    dst_access: new_access,
                },
                src_batch,
                batch_index,
            )?;
            let state = &mut self.buffer_states[index];
            state.read_barrier = new_access.is_read_only().then_some(barrier_ref);
            state.latest_access = new_access;
        }

        let state = &mut self.buffer_states[index];
        state.latest_batch = Some(batch_index);
        if slot.is_transient() {
            update_lifetime(&mut self.plan.buffer_lifetimes[index], batch_index);
        }
        Ok(())
    }

    fn add_image_use(
        &mut self,
        id: TaskImageId,
        access: super::types::TaskImageAccess,
        slice: ImageMipArraySlice,
        batch_index: usize,
    ) -> Result<()> {
        let (new_layout, new_access) = task_image_access_to_layout_access(access);
        if new_access.is_none() {
            return Ok(());
        }
        let index = id.index as usize;
        let slot = &self.images[index];
        let transient = slot.is_transient();

        let pieces = self.trackers[index].cut(slice);
        let mut new_entries = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let previous = piece.state;
            let untouched = previous.latest_access.is_none()
                && previous.latest_layout == vk::ImageLayout::UNDEFINED;

            let entry = if untouched {
                if transient {
                    // Transient state resets every execution, so the layout
                    // initialization barrier can be baked into the plan.
                    let barrier_ref = self.push_barrier(
                        TaskBarrier {
                            image_id: Some(id),
                            slice: previous.slice,
                            src_layout: vk::ImageLayout::UNDEFINED,
                            dst_layout: new_layout,
                            src_access: Access::default(),
                            dst_access: new_access,
                        },
                        batch_index,
                        batch_index,
                    )?;
                    if new_access.is_read_only() {
                        self.warnings.push(CompileWarning::UninitializedRead {
                            resource: self.images[index].name.clone(),
                        });
                    }
                    TrackedSlice {
                        state: ImageSliceState {
                            latest_access: new_access,
                            latest_layout: new_layout,
                            slice: previous.slice,
                        },
                        batch: Some(batch_index),
                        read_barrier: new_access.is_read_only().then_some(barrier_ref),
                        first_ref: None,
                    }
                } else {
                    // Persistent state is only known at execute time; record
                    // the first use and reconcile just before execution.
                    let firsts = &mut self.plan.image_first[index];
                    firsts.push(ImageSliceState {
                        latest_access: new_access,
                        latest_layout: new_layout,
                        slice: previous.slice,
                    });
                    let first_ref = firsts.len() - 1;
                    if new_access.is_read_only() && slot.starts_uninitialized() {
                        self.warnings.push(CompileWarning::UninitializedRead {
                            resource: slot.name.clone(),
                        });
                    }
                    TrackedSlice {
                        state: ImageSliceState {
                            latest_access: new_access,
                            latest_layout: new_layout,
                            slice: previous.slice,
                        },
                        batch: Some(batch_index),
                        read_barrier: None,
                        first_ref: Some(first_ref),
                    }
                }
            } else if previous.latest_access.is_compatible(new_access)
                && previous.latest_layout == new_layout
            {
                // Read on read in the same layout: widen the barrier (or the
                // execute-time first use) that covers the earlier readers.
                match piece.read_barrier {
                    Some(BarrierRef::Pipeline(barrier_index)) => {
                        let barrier = &mut self.plan.barriers[barrier_index];
                        barrier.dst_access = barrier.dst_access | new_access;
                    }
                    Some(BarrierRef::Split(split_index)) => {
                        let barrier = &mut self.plan.split_barriers[split_index];
                        barrier.dst_access = barrier.dst_access | new_access;
                    }
                    None => {
                        if let Some(first_ref) = piece.first_ref {
                            let first = &mut self.plan.image_first[index][first_ref];
                            first.latest_access = first.latest_access | new_access;
                        }
                    }
                }
                TrackedSlice {
                    state: ImageSliceState {
                        latest_access: previous.latest_access | new_access,
                        latest_layout: new_layout,
                        slice: previous.slice,
                    },
                    batch: Some(batch_index),
                    read_barrier: piece.read_barrier,
                    first_ref: piece.first_ref,
                }
            } else {
                let src_batch = piece.batch.expect("a touched slice always has a batch");
                let barrier_ref = self.push_barrier(
                    TaskBarrier {
                        image_id: Some(id),
                        slice: previous.slice,
                        src_layout: previous.latest_layout,
                        dst_layout: new_layout,
                        src_access: previous.latest_access,
                        dst_access: new_access,
                    },
                    src_batch,
                    batch_index,
                )?;
                TrackedSlice {
                    state: ImageSliceState {
                        latest_access: new_access,
                        latest_layout: new_layout,
                        slice: previous.slice,
                    },
                    batch: Some(batch_index),
                    read_barrier: new_access.is_read_only().then_some(barrier_ref),
                    first_ref: None,
                }
            };
            new_entries.push(entry);
        }
        self.trackers[index].insert(new_entries);

        if transient {
            update_lifetime(&mut self.plan.image_lifetimes[index], batch_index);
        }
        Ok(())
    }

    /// Places a barrier before `dst_batch`. Adjacent batches and host-stage
    /// dependencies use a plain pipeline barrier; wider gaps become split
    /// barriers when those are enabled. Buffer memory barriers sharing their
    /// stage masks with a pending one merge into it.
    fn push_barrier(
        &mut self,
        barrier: TaskBarrier,
        src_batch: usize,
        dst_batch: usize,
    ) -> Result<BarrierRef> {
        let host = vk::PipelineStageFlags2::HOST;
        let is_host_barrier = barrier.src_access.0 == host || barrier.dst_access.0 == host;
        let use_pipeline_barrier =
            src_batch + 1 >= dst_batch || is_host_barrier || !self.info.use_split_barriers;

        if use_pipeline_barrier {
            if barrier.image_id.is_none() {
                // Memory barriers carry no resource, so records with the same
                // stage pair collapse into one with OR'ed access masks.
                for &barrier_index in &self.plan.batches[dst_batch].pipeline_barrier_indices {
                    let pending = &mut self.plan.barriers[barrier_index];
                    if pending.image_id.is_none()
                        && pending.src_access.0 == barrier.src_access.0
                        && pending.dst_access.0 == barrier.dst_access.0
                    {
                        pending.src_access = pending.src_access | barrier.src_access;
                        pending.dst_access = pending.dst_access | barrier.dst_access;
                        return Ok(BarrierRef::Pipeline(barrier_index));
                    }
                }
            }
            trace!(
                "batch {}: barrier {:?} -> {:?}",
                dst_batch,
                barrier.src_access,
                barrier.dst_access
            );
            let barrier_index = self.plan.barriers.len();
            self.plan.barriers.push(barrier);
            self.plan.batches[dst_batch]
                .pipeline_barrier_indices
                .push(barrier_index);
            Ok(BarrierRef::Pipeline(barrier_index))
        } else {
            let split_index = self.plan.split_barriers.len();
            let state = self.device.create_split_barrier(SplitBarrierInfo {
                debug_name: format!(
                    "task list \"{}\" split barrier {}",
                    self.info.debug_name, split_index
                )
                .into(),
            })?;
            trace!(
                "split barrier from batch {} to batch {}: {:?} -> {:?}",
                src_batch,
                dst_batch,
                barrier.src_access,
                barrier.dst_access
            );
            self.plan.split_barriers.push(TaskSplitBarrier {
                state,
                image_id: barrier.image_id,
                slice: barrier.slice,
                src_layout: barrier.src_layout,
                dst_layout: barrier.dst_layout,
                src_access: barrier.src_access,
                dst_access: barrier.dst_access,
            });
            self.plan.batches[src_batch]
                .signal_split_barrier_indices
                .push(split_index);
            self.plan.batches[dst_batch]
                .wait_split_barrier_indices
                .push(split_index);
            Ok(BarrierRef::Split(split_index))
        }
    }

    /// Brings hinted resources into their declared hand-off state after the
    /// last batch, e.g. a swapchain image into `PRESENT_SRC_KHR`.
    fn emit_terminal_barriers(&mut self) {
        for (index, slot) in self.buffers.iter().enumerate() {
            let Some(final_access) = slot.final_access else {
                continue;
            };
            let final_access = task_buffer_access_to_access(final_access);
            let state = &mut self.buffer_states[index];
            if state.latest_access.is_none() || final_access.is_none() {
                continue;
            }
            if state.latest_access.is_compatible(final_access) {
                state.latest_access = state.latest_access | final_access;
                continue;
            }
            let barrier_index = self.plan.barriers.len();
            self.plan.barriers.push(TaskBarrier {
                image_id: None,
                slice: ImageMipArraySlice::default(),
                src_layout: vk::ImageLayout::UNDEFINED,
                dst_layout: vk::ImageLayout::UNDEFINED,
                src_access: state.latest_access,
                dst_access: final_access,
            });
            self.plan.terminal_barrier_indices.push(barrier_index);
            state.latest_access = final_access;
        }

        for index in 0..self.images.len() {
            let Some(final_access) = self.images[index].final_access else {
                continue;
            };
            let (final_layout, final_access) = task_image_access_to_layout_access(final_access);
            if final_access.is_none() {
                continue;
            }
            let id = TaskImageId {
                task_list_index: self.images[index].task_list_index,
                index: index as u32,
            };
            let full = self.images[index].full_slice;
            let pieces = self.trackers[index].cut(full);
            let mut new_entries = Vec::with_capacity(pieces.len());
            for piece in pieces {
                let previous = piece.state;
                let untouched = previous.latest_access.is_none()
                    && previous.latest_layout == vk::ImageLayout::UNDEFINED;
                if untouched {
                    // Never written by this plan; nothing to hand off.
                    new_entries.push(TrackedSlice {
                        state: previous,
                        batch: piece.batch,
                        read_barrier: piece.read_barrier,
                        first_ref: piece.first_ref,
                    });
                    continue;
                }
                if previous.latest_access.is_compatible(final_access)
                    && previous.latest_layout == final_layout
                {
                    new_entries.push(TrackedSlice {
                        state: ImageSliceState {
                            latest_access: previous.latest_access | final_access,
                            ..previous
                        },
                        batch: piece.batch,
                        read_barrier: piece.read_barrier,
                        first_ref: piece.first_ref,
                    });
                    continue;
                }
                let barrier_index = self.plan.barriers.len();
                self.plan.barriers.push(TaskBarrier {
                    image_id: Some(id),
                    slice: previous.slice,
                    src_layout: previous.latest_layout,
                    dst_layout: final_layout,
                    src_access: previous.latest_access,
                    dst_access: final_access,
                });
                self.plan.terminal_barrier_indices.push(barrier_index);
                new_entries.push(TrackedSlice {
                    state: ImageSliceState {
                        latest_access: final_access,
                        latest_layout: final_layout,
                        slice: previous.slice,
                    },
                    batch: None,
                    read_barrier: None,
                    first_ref: None,
                });
            }
            self.trackers[index].insert(new_entries);
        }
    }

    fn record_final_states(&mut self) {
        for (index, state) in self.buffer_states.iter().enumerate() {
            self.plan.buffer_final[index] = state.latest_access;
        }
        for (index, tracker) in self.trackers.iter().enumerate() {
            self.plan.image_final[index] = tracker
                .slices()
                .iter()
                .map(|tracked| tracked.state)
                .collect();
        }
    }

    fn collect_dead_write_warnings(&mut self) {
        for (index, slot) in self.buffers.iter().enumerate() {
            if slot.is_transient()
                && slot.final_access.is_none()
                && self.plan.buffer_final[index].is_write()
            {
                self.warnings.push(CompileWarning::DeadWrite {
                    resource: slot.name.clone(),
                });
            }
        }
        for (index, slot) in self.images.iter().enumerate() {
            if slot.is_transient()
                && slot.final_access.is_none()
                && self.plan.image_final[index]
                    .iter()
                    .any(|state| state.latest_access.is_write())
            {
                self.warnings.push(CompileWarning::DeadWrite {
                    resource: slot.name.clone(),
                });
            }
        }
    }

    /// Orders every barrier set by (resource kind, resource, base mip, base
    /// layer, aspect) so the recorded command stream is reproducible.
    fn sort_barrier_sets(&mut self) {
        let barriers = &self.plan.barriers;
        let barrier_key = |barrier_index: &usize| {
            let barrier = &barriers[*barrier_index];
            (
                barrier.image_id.is_some() as u32,
                barrier.image_id.map(|id| id.index).unwrap_or(0),
                barrier.slice.base_mip_level,
                barrier.slice.base_array_layer,
                barrier.slice.aspect_mask.as_raw(),
            )
        };
        let splits = &self.plan.split_barriers;
        let split_key = |split_index: &usize| {
            let barrier = &splits[*split_index];
            (
                barrier.image_id.is_some() as u32,
                barrier.image_id.map(|id| id.index).unwrap_or(0),
                barrier.slice.base_mip_level,
                barrier.slice.base_array_layer,
                barrier.slice.aspect_mask.as_raw(),
            )
        };
        for batch in &mut self.plan.batches {
            batch.pipeline_barrier_indices.sort_by_key(barrier_key);
            batch.wait_split_barrier_indices.sort_by_key(split_key);
            batch.signal_split_barrier_indices.sort_by_key(split_key);
        }
        self.plan.terminal_barrier_indices.sort_by_key(barrier_key);
    }
}

fn update_lifetime(lifetime: &mut Option<ResourceLifetime>, batch_index: usize) {
    match lifetime {
        Some(lifetime) => {
            lifetime.first_batch = lifetime.first_batch.min(batch_index);
            lifetime.last_batch = lifetime.last_batch.max(batch_index);
        }
        None => {
            *lifetime = Some(ResourceLifetime {
                first_batch: batch_index,
                last_batch: batch_index,
            });
        }
    }
}
