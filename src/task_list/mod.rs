mod compile;
mod tracker;
mod types;

pub use compile::CompileWarning;
pub use types::*;

use compile::{Plan, TaskBarrier};

use crate::{
    command_list::{CommandLabelInfo, CommandList, CommandListInfo},
    device::Device,
    error::{Error, Result},
    gpu_resources::{BufferId, ImageId, ImageViewId},
    slice::{ImageMipArraySlice, ImageSliceState},
    split_barrier::{ImageBarrierInfo, MemoryBarrierInfo, SplitBarrierSignalInfo, SplitBarrierWaitInfo},
    types::Access,
};

use ash::vk;
use log::warn;

use std::sync::atomic::{AtomicU32, Ordering};
use std::{collections::HashSet, sync::Arc};

pub type TaskCallback = Box<dyn Fn(&mut TaskInterface)>;
pub type BufferFetchFn = Box<dyn FnMut() -> BufferId>;
pub type ImageFetchFn = Box<dyn FnMut() -> ImageId>;

/// Where a task buffer's concrete handle comes from.
pub enum BufferSource {
    /// A fixed handle registered up front. Its access state survives across
    /// executions of the list.
    Persistent {
        buffer: BufferId,
        initial_access: Access,
    },
    /// A handle fetched anew on every execution, e.g. a frame-ring buffer.
    /// State resets each execution.
    Transient { fetch: BufferFetchFn },
}

pub struct TaskBufferInfo {
    pub source: BufferSource,
    /// Hand-off access reached through a terminal barrier after the last
    /// batch.
    pub final_access: Option<TaskBufferAccess>,
    pub name: String,
}

/// Shape hints for an image that only materializes at execution time.
#[derive(Clone)]
pub struct TransientImageInfo {
    pub dimensions: u32,
    pub format: vk::Format,
    pub aspect: vk::ImageAspectFlags,
    pub size: vk::Extent3D,
    pub mip_level_count: u32,
    pub array_layer_count: u32,
    pub sample_count: u32,
}

impl Default for TransientImageInfo {
    fn default() -> Self {
        Self {
            dimensions: 2,
            format: vk::Format::R8G8B8A8_UNORM,
            aspect: vk::ImageAspectFlags::COLOR,
            size: vk::Extent3D { width: 0, height: 0, depth: 0 },
            mip_level_count: 1,
            array_layer_count: 1,
            sample_count: 1,
        }
    }
}

/// Where a task image's concrete handle comes from. See [`BufferSource`].
pub enum ImageSource {
    Persistent {
        image: ImageId,
        initial_states: Vec<ImageSliceState>,
    },
    /// The fetch callback runs once per execution; the swapchain image of the
    /// current frame is the typical case.
    Transient {
        fetch: ImageFetchFn,
        info: TransientImageInfo,
    },
}

pub struct TaskImageInfo {
    pub source: ImageSource,
    /// Applied when a use declares no slice of its own.
    pub default_slice: Option<ImageMipArraySlice>,
    /// Hand-off access reached through a terminal barrier after the last
    /// batch, e.g. [`TaskImageAccess::Present`] for swapchain images.
    pub final_access: Option<TaskImageAccess>,
    pub name: String,
}

pub struct TaskInfo {
    pub buffer_uses: Vec<TaskBufferUse>,
    pub image_uses: Vec<TaskImageUse>,
    pub task: TaskCallback,
    pub name: String,
}

impl Default for TaskInfo {
    fn default() -> Self {
        Self {
            buffer_uses: Vec::new(),
            image_uses: Vec::new(),
            task: Box::new(|_| {}),
            name: "".into(),
        }
    }
}

pub struct TaskListInfo {
    /// Some drivers have bad implementations for split barriers. In such a
    /// case, all use of split barriers can be turned off; pipeline barriers
    /// are recorded instead.
    pub use_split_barriers: bool,
    /// Surrounds each batch and each task with labels for use by profilers.
    pub enable_command_labels: bool,
    pub task_batch_label_color: [f32; 4],
    pub task_label_color: [f32; 4],
    pub debug_name: String,
}

impl Default for TaskListInfo {
    fn default() -> Self {
        Self {
            use_split_barriers: true,
            enable_command_labels: true,
            task_batch_label_color: [0.563, 0.433, 0.771, 1.0],
            task_label_color: [0.663, 0.533, 0.871, 1.0],
            debug_name: "".into(),
        }
    }
}

pub(crate) struct TaskBufferSlot {
    pub name: String,
    pub source: BufferSource,
    pub final_access: Option<TaskBufferAccess>,
    /// State carried across executions; meaningful for persistent buffers.
    pub latest_access: Access,
    /// Handle resolved for the current execution.
    pub runtime: Option<BufferId>,
}

impl TaskBufferSlot {
    pub fn is_transient(&self) -> bool {
        matches!(self.source, BufferSource::Transient { .. })
    }

    pub fn starts_uninitialized(&self) -> bool {
        match &self.source {
            BufferSource::Persistent { initial_access, .. } => initial_access.is_none(),
            BufferSource::Transient { .. } => true,
        }
    }
}

pub(crate) struct TaskImageSlot {
    pub name: String,
    pub source: ImageSource,
    pub default_slice: Option<ImageMipArraySlice>,
    pub final_access: Option<TaskImageAccess>,
    pub full_slice: ImageMipArraySlice,
    pub dimensions: u32,
    pub task_list_index: u32,
    /// States carried across executions; meaningful for persistent images.
    pub latest_states: Vec<ImageSliceState>,
    pub runtime: Option<ImageId>,
}

impl TaskImageSlot {
    pub fn is_transient(&self) -> bool {
        matches!(self.source, ImageSource::Transient { .. })
    }

    pub fn starts_uninitialized(&self) -> bool {
        match &self.source {
            ImageSource::Persistent { initial_states, .. } => initial_states.is_empty(),
            ImageSource::Transient { .. } => true,
        }
    }
}

pub(crate) struct ResolvedImageUse {
    pub id: TaskImageId,
    pub access: TaskImageAccess,
    pub slice: ImageMipArraySlice,
    pub view_type: vk::ImageViewType,
}

#[derive(Clone, Copy)]
pub(crate) struct CachedView {
    pub image: ImageId,
    pub view: ImageViewId,
    /// Views created by the task list are destroyed by it; default views are
    /// borrowed from the image.
    pub owned: bool,
}

pub(crate) struct Task {
    pub name: String,
    pub buffer_uses: Vec<TaskBufferUse>,
    pub image_uses: Vec<ResolvedImageUse>,
    pub callback: TaskCallback,
    pub view_cache: Vec<Option<CachedView>>,
}

/// Handed to every task callback. Exposes the command list being recorded and
/// the concrete handles behind the task's declared uses. Each task sees the
/// image view matching its own declared view type.
pub struct TaskInterface<'a> {
    device: &'a dyn Device,
    command_list: &'a mut CommandList,
    task_name: &'a str,
    buffers: Vec<(TaskBufferId, BufferId)>,
    images: Vec<(TaskImageId, ImageId, ImageViewId)>,
}

impl<'a> TaskInterface<'a> {
    pub fn device(&self) -> &dyn Device {
        self.device
    }

    pub fn command_list(&mut self) -> &mut CommandList {
        self.command_list
    }

    /// The concrete buffer behind a declared buffer use.
    pub fn buffer(&self, id: TaskBufferId) -> Result<BufferId> {
        self.buffers
            .iter()
            .find(|(use_id, _)| *use_id == id)
            .map(|(_, buffer)| *buffer)
            .ok_or_else(|| Error::UnknownResource {
                task: self.task_name.to_string(),
            })
    }

    /// The concrete image behind a declared image use.
    pub fn image(&self, id: TaskImageId) -> Result<ImageId> {
        self.images
            .iter()
            .find(|(use_id, ..)| *use_id == id)
            .map(|(_, image, _)| *image)
            .ok_or_else(|| Error::UnknownResource {
                task: self.task_name.to_string(),
            })
    }

    /// The view over a declared image use, matching the use's slice and view
    /// type.
    pub fn image_view(&self, id: TaskImageId) -> Result<ImageViewId> {
        self.images
            .iter()
            .find(|(use_id, ..)| *use_id == id)
            .map(|(.., view)| *view)
            .ok_or_else(|| Error::UnknownResource {
                task: self.task_name.to_string(),
            })
    }
}

static NEXT_TASK_LIST_INDEX: AtomicU32 = AtomicU32::new(0);

/// A declared, compiled and executable list of GPU tasks.
///
/// Lifecycle: register resources and add tasks while building, then
/// [`compile`](TaskList::compile) once, then [`execute`](TaskList::execute)
/// any number of times. A compiled list cannot go back to building.
pub struct TaskList {
    unique_index: u32,
    device: Arc<dyn Device>,
    info: TaskListInfo,
    buffer_slots: Vec<TaskBufferSlot>,
    image_slots: Vec<TaskImageSlot>,
    registered_buffers: HashSet<BufferId>,
    registered_images: HashSet<ImageId>,
    tasks: Vec<Task>,
    plan: Option<Plan>,
    warnings: Vec<CompileWarning>,
}

impl TaskList {
    pub fn new(device: Arc<dyn Device>, info: TaskListInfo) -> Self {
        Self {
            unique_index: NEXT_TASK_LIST_INDEX.fetch_add(1, Ordering::Relaxed),
            device,
            info,
            buffer_slots: Vec::new(),
            image_slots: Vec::new(),
            registered_buffers: HashSet::new(),
            registered_images: HashSet::new(),
            tasks: Vec::new(),
            plan: None,
            warnings: Vec::new(),
        }
    }

    pub fn info(&self) -> &TaskListInfo {
        &self.info
    }

    pub fn create_task_buffer(&mut self, info: TaskBufferInfo) -> Result<TaskBufferId> {
        if self.plan.is_some() {
            return Err(Error::AlreadyCompiled);
        }
        if let BufferSource::Persistent { buffer, .. } = &info.source {
            if !self.registered_buffers.insert(*buffer) {
                return Err(Error::DuplicatePersistentRegistration {
                    resource: info.name,
                });
            }
        }
        let latest_access = match &info.source {
            BufferSource::Persistent { initial_access, .. } => *initial_access,
            BufferSource::Transient { .. } => Access::default(),
        };
        let index = self.buffer_slots.len() as u32;
        self.buffer_slots.push(TaskBufferSlot {
            name: info.name,
            source: info.source,
            final_access: info.final_access,
            latest_access,
            runtime: None,
        });
        Ok(TaskBufferId {
            task_list_index: self.unique_index,
            index,
        })
    }

    pub fn create_task_image(&mut self, info: TaskImageInfo) -> Result<TaskImageId> {
        if self.plan.is_some() {
            return Err(Error::AlreadyCompiled);
        }
        let (full_slice, dimensions, latest_states) = match &info.source {
            ImageSource::Persistent { image, initial_states } => {
                if !self.registered_images.insert(*image) {
                    return Err(Error::DuplicatePersistentRegistration {
                        resource: info.name,
                    });
                }
                let image_info = self.device.info_image(*image)?;
                (image_info.full_slice(), image_info.dimensions, initial_states.clone())
            }
            ImageSource::Transient { info: transient, .. } => (
                ImageMipArraySlice {
                    aspect_mask: transient.aspect,
                    base_mip_level: 0,
                    level_count: transient.mip_level_count,
                    base_array_layer: 0,
                    layer_count: transient.array_layer_count,
                },
                transient.dimensions,
                Vec::new(),
            ),
        };
        #[cfg(debug_assertions)]
        for state in &latest_states {
            debug_assert!(
                full_slice.contains(state.slice),
                "Initial state slice {:?} of task image \"{}\" exceeds the image extent {:?}!",
                state.slice,
                info.name,
                full_slice
            );
        }
        let index = self.image_slots.len() as u32;
        self.image_slots.push(TaskImageSlot {
            name: info.name,
            source: info.source,
            default_slice: info.default_slice,
            final_access: info.final_access,
            full_slice,
            dimensions,
            task_list_index: self.unique_index,
            latest_states,
            runtime: None,
        });
        Ok(TaskImageId {
            task_list_index: self.unique_index,
            index,
        })
    }

    /// Appends a task. Uses are validated here: ids must belong to this list,
    /// slices must fit the image extent, and no two uses of one resource may
    /// conflict within the task. Overlapping image uses with identical access
    /// are folded into one use covering their union.
    pub fn add_task(&mut self, info: TaskInfo) -> Result<()> {
        if self.plan.is_some() {
            return Err(Error::AlreadyCompiled);
        }

        let mut buffer_uses: Vec<TaskBufferUse> = Vec::with_capacity(info.buffer_uses.len());
        for buffer_use in info.buffer_uses {
            let index = self.check_buffer_id(buffer_use.id, &info.name)?;
            let new_access = task_buffer_access_to_access(buffer_use.access);
            let mut duplicate = false;
            for existing in &buffer_uses {
                if existing.id != buffer_use.id {
                    continue;
                }
                if existing.access == buffer_use.access {
                    duplicate = true;
                    break;
                }
                let existing_access = task_buffer_access_to_access(existing.access);
                if !existing_access.is_compatible(new_access) {
                    return Err(Error::SelfConflict {
                        task: info.name,
                        resource: self.buffer_slots[index].name.clone(),
                    });
                }
            }
            if !duplicate {
                buffer_uses.push(buffer_use);
            }
        }

        let mut image_uses: Vec<ResolvedImageUse> = Vec::with_capacity(info.image_uses.len());
        for image_use in info.image_uses {
            let index = self.check_image_id(image_use.id, &info.name)?;
            let slot = &self.image_slots[index];
            let slice = image_use
                .slice
                .or(slot.default_slice)
                .unwrap_or(slot.full_slice);
            if !slot.full_slice.contains(slice) {
                return Err(Error::SliceOutOfRange {
                    task: info.name,
                    resource: slot.name.clone(),
                    slice,
                    extent: slot.full_slice,
                });
            }
            let view_type = image_use
                .view_type
                .unwrap_or_else(|| default_view_type(slot.dimensions, slice.layer_count));
            let (new_layout, new_access) = task_image_access_to_layout_access(image_use.access);
            let mut merged = false;
            for existing in &mut image_uses {
                if existing.id != image_use.id || !existing.slice.intersects(slice) {
                    continue;
                }
                if existing.access == image_use.access {
                    existing.slice = existing.slice.bounding_union(slice);
                    merged = true;
                    break;
                }
                let (existing_layout, existing_access) =
                    task_image_access_to_layout_access(existing.access);
                if !existing_access.is_compatible(new_access) || existing_layout != new_layout {
                    return Err(Error::SelfConflict {
                        task: info.name,
                        resource: slot.name.clone(),
                    });
                }
            }
            if !merged {
                image_uses.push(ResolvedImageUse {
                    id: image_use.id,
                    access: image_use.access,
                    slice,
                    view_type,
                });
            }
        }

        let view_cache = vec![None; image_uses.len()];
        self.tasks.push(Task {
            name: info.name,
            buffer_uses,
            image_uses,
            callback: info.task,
            view_cache,
        });
        Ok(())
    }

    /// Compiles the recorded tasks into the execution plan, transitioning the
    /// list from building to compiled. On error the list stays in the
    /// building state.
    pub fn compile(&mut self) -> Result<()> {
        if self.plan.is_some() {
            return Err(Error::AlreadyCompiled);
        }
        let (plan, warnings) = compile::compile(
            self.device.as_ref(),
            &self.info,
            &self.tasks,
            &self.buffer_slots,
            &self.image_slots,
        )?;
        for warning in &warnings {
            warn!("task list \"{}\": {}", self.info.debug_name, warning);
        }
        self.warnings = warnings;
        self.plan = Some(plan);
        Ok(())
    }

    /// Non-fatal findings of the last successful compilation.
    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    /// Records one execution of the compiled plan and returns the completed
    /// command lists, ready for submission. Transient resources are fetched
    /// once per call; task callbacks run in declaration order.
    pub fn execute(&mut self) -> Result<Vec<CommandList>> {
        let plan = self.plan.take().ok_or(Error::NotCompiled)?;
        let result = self.execute_plan(&plan);
        self.plan = Some(plan);
        result
    }

    fn execute_plan(&mut self, plan: &Plan) -> Result<Vec<CommandList>> {
        if self.tasks.is_empty() {
            return Ok(Vec::new());
        }

        // Resolve every resource to its concrete handle for this execution.
        // Fetch callbacks run exactly once each.
        for slot in &mut self.buffer_slots {
            slot.runtime = Some(match &mut slot.source {
                BufferSource::Persistent { buffer, .. } => *buffer,
                BufferSource::Transient { fetch } => fetch(),
            });
        }
        for slot in &mut self.image_slots {
            slot.runtime = Some(match &mut slot.source {
                ImageSource::Persistent { image, .. } => *image,
                ImageSource::Transient { fetch, .. } => fetch(),
            });
        }

        let device = self.device.clone();
        let mut command_list = device.create_command_list(CommandListInfo {
            debug_name: format!("{} command list", self.info.debug_name).into(),
        })?;

        self.reconcile_persistent_states(plan, &mut command_list);

        for (batch_index, batch) in plan.batches.iter().enumerate() {
            if self.info.enable_command_labels {
                command_list.begin_label(CommandLabelInfo {
                    label_name: format!("{}, batch {}", self.info.debug_name, batch_index).into(),
                    label_color: self.info.task_batch_label_color,
                });
            }
            for &barrier_index in &batch.pipeline_barrier_indices {
                self.issue_barrier(&plan.barriers[barrier_index], &mut command_list);
            }
            if !batch.wait_split_barrier_indices.is_empty() {
                let waits: Vec<SplitBarrierWaitInfo> = batch
                    .wait_split_barrier_indices
                    .iter()
                    .map(|&split_index| self.split_barrier_info(plan, split_index))
                    .collect();
                command_list.wait_split_barriers(waits);
            }

            for &task_id in &batch.tasks {
                self.refresh_view_cache(task_id)?;
                let task = &self.tasks[task_id];
                let buffers: Vec<(TaskBufferId, BufferId)> = task
                    .buffer_uses
                    .iter()
                    .map(|buffer_use| {
                        let slot = &self.buffer_slots[buffer_use.id.index as usize];
                        (buffer_use.id, slot.runtime.expect("resolved above"))
                    })
                    .collect();
                let images: Vec<(TaskImageId, ImageId, ImageViewId)> = task
                    .image_uses
                    .iter()
                    .enumerate()
                    .map(|(use_index, image_use)| {
                        let slot = &self.image_slots[image_use.id.index as usize];
                        let cached = task.view_cache[use_index].expect("refreshed above");
                        (image_use.id, slot.runtime.expect("resolved above"), cached.view)
                    })
                    .collect();

                if self.info.enable_command_labels {
                    command_list.begin_label(CommandLabelInfo {
                        label_name: format!("task \"{}\"", task.name).into(),
                        label_color: self.info.task_label_color,
                    });
                }
                let mut interface = TaskInterface {
                    device: device.as_ref(),
                    command_list: &mut command_list,
                    task_name: &task.name,
                    buffers,
                    images,
                };
                (task.callback)(&mut interface);
                if self.info.enable_command_labels {
                    command_list.end_label();
                }
            }

            // Reset waited barriers on the stages that waited, then signal
            // whatever later batches depend on.
            for &split_index in &batch.wait_split_barrier_indices {
                let split = &plan.split_barriers[split_index];
                command_list.reset_split_barrier(crate::command_list::ResetSplitBarrierInfo {
                    barrier: split.state.clone(),
                    stage: split.dst_access.0,
                });
            }
            for &split_index in &batch.signal_split_barrier_indices {
                let info = self.split_barrier_info(plan, split_index);
                command_list.signal_split_barrier(info);
            }
            if self.info.enable_command_labels {
                command_list.end_label();
            }
        }

        for &barrier_index in &plan.terminal_barrier_indices {
            self.issue_barrier(&plan.barriers[barrier_index], &mut command_list);
        }

        let command_list = command_list.complete();

        // Persist final states so the next execution (and hand-off queries)
        // see where this one left each resource.
        for (index, slot) in self.buffer_slots.iter_mut().enumerate() {
            if slot.is_transient() || plan.buffer_first[index].is_none() {
                continue;
            }
            slot.latest_access = plan.buffer_final[index];
        }
        for (index, slot) in self.image_slots.iter_mut().enumerate() {
            if slot.is_transient() {
                continue;
            }
            let touched: Vec<ImageSliceState> = plan.image_final[index]
                .iter()
                .filter(|state| {
                    !(state.latest_access.is_none()
                        && state.latest_layout == vk::ImageLayout::UNDEFINED)
                })
                .cloned()
                .collect();
            if touched.is_empty() {
                continue;
            }
            let mut next_states = Vec::new();
            for previous in &slot.latest_states {
                let mut pieces = vec![*previous];
                for touched_state in &touched {
                    let mut rest_pieces = Vec::new();
                    for piece in pieces {
                        if piece.slice.intersects(touched_state.slice) {
                            let (rests, rest_count) = piece.slice.subtract(touched_state.slice);
                            for rest_index in 0..rest_count {
                                rest_pieces.push(ImageSliceState {
                                    slice: rests[rest_index],
                                    ..piece
                                });
                            }
                        } else {
                            rest_pieces.push(piece);
                        }
                    }
                    pieces = rest_pieces;
                }
                next_states.extend(pieces);
            }
            next_states.extend(touched);
            slot.latest_states = next_states;
        }

        Ok(vec![command_list])
    }

    /// Persistent resources keep their state between executions, so the sync
    /// bringing them from wherever the previous execution (or registration)
    /// left them into this plan's first uses can only be generated here.
    fn reconcile_persistent_states(&self, plan: &Plan, command_list: &mut CommandList) {
        for (index, slot) in self.buffer_slots.iter().enumerate() {
            if slot.is_transient() {
                continue;
            }
            let first = plan.buffer_first[index];
            if first.is_none() {
                continue;
            }
            let previous = slot.latest_access;
            if previous.is_none() {
                // Nothing to synchronize against.
                continue;
            }
            if previous == first && previous.is_read_only() {
                // Same read on read; still visible.
                continue;
            }
            command_list.pipeline_barrier(MemoryBarrierInfo {
                src_access: previous,
                dst_access: first,
            });
        }

        for (index, slot) in self.image_slots.iter().enumerate() {
            if slot.is_transient() || plan.image_first[index].is_empty() {
                continue;
            }
            let image = slot.runtime.expect("resolved before reconciliation");
            let mut remaining = plan.image_first[index].clone();
            let mut previous_states = slot.latest_states.clone();

            // Sync every overlap of a previous state with a first use, then
            // whatever first-use regions remain start from undefined.
            let mut previous_index = 0;
            while previous_index < previous_states.len() {
                let previous = previous_states[previous_index];
                let mut intersected = false;
                for first_index in 0..remaining.len() {
                    let first = remaining[first_index];
                    if !previous.slice.intersects(first.slice) {
                        continue;
                    }
                    let intersection = previous.slice.intersect(first.slice);
                    let both_read = previous.latest_access.is_read_only()
                        && first.latest_access.is_read_only();
                    let same_layout = previous.latest_layout == first.latest_layout;
                    if !(both_read && same_layout) {
                        command_list.pipeline_barrier_image_transition(ImageBarrierInfo {
                            src_access: previous.latest_access,
                            dst_access: first.latest_access,
                            src_layout: previous.latest_layout,
                            dst_layout: first.latest_layout,
                            slice: intersection,
                            image,
                        });
                    }
                    let (previous_rests, previous_rest_count) =
                        previous.slice.subtract(intersection);
                    for rest_index in 0..previous_rest_count {
                        previous_states.push(ImageSliceState {
                            slice: previous_rests[rest_index],
                            ..previous
                        });
                    }
                    let (first_rests, first_rest_count) = first.slice.subtract(intersection);
                    for rest_index in 0..first_rest_count {
                        remaining.push(ImageSliceState {
                            slice: first_rests[rest_index],
                            ..first
                        });
                    }
                    previous_states.remove(previous_index);
                    remaining.remove(first_index);
                    intersected = true;
                    break;
                }
                if !intersected {
                    previous_index += 1;
                }
            }

            for first in &remaining {
                command_list.pipeline_barrier_image_transition(ImageBarrierInfo {
                    src_access: Access::default(),
                    dst_access: first.latest_access,
                    src_layout: vk::ImageLayout::UNDEFINED,
                    dst_layout: first.latest_layout,
                    slice: first.slice,
                    image,
                });
            }
        }
    }

    fn issue_barrier(&self, barrier: &TaskBarrier, command_list: &mut CommandList) {
        match barrier.image_id {
            Some(id) => {
                let image = self.image_slots[id.index as usize]
                    .runtime
                    .expect("resolved before barriers are issued");
                command_list.pipeline_barrier_image_transition(ImageBarrierInfo {
                    src_access: barrier.src_access,
                    dst_access: barrier.dst_access,
                    src_layout: barrier.src_layout,
                    dst_layout: barrier.dst_layout,
                    slice: barrier.slice,
                    image,
                });
            }
            None => {
                command_list.pipeline_barrier(MemoryBarrierInfo {
                    src_access: barrier.src_access,
                    dst_access: barrier.dst_access,
                });
            }
        }
    }

    fn split_barrier_info(&self, plan: &Plan, split_index: usize) -> SplitBarrierSignalInfo {
        let split = &plan.split_barriers[split_index];
        match split.image_id {
            Some(id) => {
                let image = self.image_slots[id.index as usize]
                    .runtime
                    .expect("resolved before barriers are issued");
                SplitBarrierSignalInfo {
                    memory_barriers: Vec::new(),
                    image_barriers: vec![ImageBarrierInfo {
                        src_access: split.src_access,
                        dst_access: split.dst_access,
                        src_layout: split.src_layout,
                        dst_layout: split.dst_layout,
                        slice: split.slice,
                        image,
                    }],
                    split_barrier: split.state.clone(),
                }
            }
            None => SplitBarrierSignalInfo {
                memory_barriers: vec![MemoryBarrierInfo {
                    src_access: split.src_access,
                    dst_access: split.dst_access,
                }],
                image_barriers: Vec::new(),
                split_barrier: split.state.clone(),
            },
        }
    }

    /// Image views are created lazily and cached per use; the cache refreshes
    /// when the concrete image changed since the last execution.
    fn refresh_view_cache(&mut self, task_id: usize) -> Result<()> {
        let device = self.device.clone();
        for use_index in 0..self.tasks[task_id].image_uses.len() {
            let (id, slice, view_type) = {
                let image_use = &self.tasks[task_id].image_uses[use_index];
                (image_use.id, image_use.slice, image_use.view_type)
            };
            let actual = self.image_slots[id.index as usize]
                .runtime
                .expect("resolved before tasks run");
            let cached = self.tasks[task_id].view_cache[use_index];
            if let Some(cached) = cached {
                if cached.image == actual {
                    continue;
                }
                if cached.owned {
                    device.destroy_image_view(cached.view);
                }
            }
            let default_view = device.image_default_view(actual)?;
            let default_info = device.info_image_view(default_view)?;
            let entry = if default_info.slice == slice && default_info.image_view_type == view_type
            {
                CachedView {
                    image: actual,
                    view: default_view,
                    owned: false,
                }
            } else {
                let view = device.create_image_view(crate::gpu_resources::ImageViewInfo {
                    image_view_type: view_type,
                    format: default_info.format,
                    image: actual,
                    slice,
                    debug_name: format!(
                        "task \"{}\" view of \"{}\"",
                        self.tasks[task_id].name,
                        self.image_slots[id.index as usize].name
                    ),
                })?;
                CachedView {
                    image: actual,
                    view,
                    owned: true,
                }
            };
            self.tasks[task_id].view_cache[use_index] = Some(entry);
        }
        Ok(())
    }

    /// The access the caller must treat the buffer as being in after the most
    /// recent execution. Valid once the list is compiled.
    pub fn last_buffer_access(&self, id: TaskBufferId) -> Result<Access> {
        let plan = self.plan.as_ref().ok_or(Error::NotCompiled)?;
        let index = self.check_buffer_id(id, "last access query")?;
        let slot = &self.buffer_slots[index];
        Ok(if slot.is_transient() {
            plan.buffer_final[index]
        } else {
            slot.latest_access
        })
    }

    /// The union of accesses over `slice` after the most recent execution.
    pub fn last_image_access(&self, id: TaskImageId, slice: ImageMipArraySlice) -> Result<Access> {
        let states = self.current_image_states(id)?;
        let mut access = Access::default();
        for state in states {
            if state.slice.intersects(slice) {
                access = access | state.latest_access;
            }
        }
        Ok(access)
    }

    /// The layout of `slice` after the most recent execution. Fails when the
    /// slice spans sub-slices in different layouts.
    pub fn last_image_layout(
        &self,
        id: TaskImageId,
        slice: ImageMipArraySlice,
    ) -> Result<vk::ImageLayout> {
        let index = id.index as usize;
        let states = self.current_image_states(id)?;
        let area = |s: &ImageMipArraySlice| {
            s.aspect_mask.as_raw().count_ones() as u64 * s.level_count as u64 * s.layer_count as u64
        };
        let mut layout: Option<vk::ImageLayout> = None;
        let mut covered = 0;
        for state in &states {
            if !state.slice.intersects(slice) {
                continue;
            }
            covered += area(&state.slice.intersect(slice));
            match layout {
                Some(layout) if layout != state.latest_layout => {
                    return Err(Error::NonUniformLayout {
                        resource: self.image_slots[index].name.clone(),
                        slice,
                    });
                }
                _ => layout = Some(state.latest_layout),
            }
        }
        if covered < area(&slice) && layout.is_some_and(|l| l != vk::ImageLayout::UNDEFINED) {
            return Err(Error::NonUniformLayout {
                resource: self.image_slots[index].name.clone(),
                slice,
            });
        }
        Ok(layout.unwrap_or(vk::ImageLayout::UNDEFINED))
    }

    fn current_image_states(&self, id: TaskImageId) -> Result<Vec<ImageSliceState>> {
        let plan = self.plan.as_ref().ok_or(Error::NotCompiled)?;
        let index = self.check_image_id(id, "last state query")?;
        let slot = &self.image_slots[index];
        Ok(if slot.is_transient() {
            plan.image_final[index].clone()
        } else {
            slot.latest_states.clone()
        })
    }

    /// A human-readable dump of the compiled plan.
    pub fn debug_print(&self) -> Result<String> {
        let plan = self.plan.as_ref().ok_or(Error::NotCompiled)?;
        let mut out = String::new();
        out += &format!("task list \"{}\":\n", self.info.debug_name);
        for (batch_index, batch) in plan.batches.iter().enumerate() {
            out += &format!("  batch {}:\n", batch_index);
            for &barrier_index in &batch.pipeline_barrier_indices {
                out += &format!(
                    "    {}\n",
                    self.describe_barrier(&plan.barriers[barrier_index])
                );
            }
            for &split_index in &batch.wait_split_barrier_indices {
                let split = &plan.split_barriers[split_index];
                out += &format!(
                    "    wait \"{}\": {}\n",
                    split.state.debug_name(),
                    self.describe_barrier(&TaskBarrier {
                        image_id: split.image_id,
                        slice: split.slice,
                        src_layout: split.src_layout,
                        dst_layout: split.dst_layout,
                        src_access: split.src_access,
                        dst_access: split.dst_access,
                    })
                );
            }
            for &task_id in &batch.tasks {
                let task = &self.tasks[task_id];
                out += &format!("    task {} \"{}\":\n", task_id, task.name);
                for buffer_use in &task.buffer_uses {
                    out += &format!(
                        "      buffer \"{}\": {:?}\n",
                        self.buffer_slots[buffer_use.id.index as usize].name, buffer_use.access
                    );
                }
                for image_use in &task.image_uses {
                    out += &format!(
                        "      image \"{}\": {:?}, slice {:?}\n",
                        self.image_slots[image_use.id.index as usize].name,
                        image_use.access,
                        image_use.slice
                    );
                }
            }
            for &split_index in &batch.signal_split_barrier_indices {
                let split = &plan.split_barriers[split_index];
                out += &format!("    signal \"{}\"\n", split.state.debug_name());
            }
        }
        if !plan.terminal_barrier_indices.is_empty() {
            out += "  terminal barriers:\n";
            for &barrier_index in &plan.terminal_barrier_indices {
                out += &format!(
                    "    {}\n",
                    self.describe_barrier(&plan.barriers[barrier_index])
                );
            }
        }
        let mut lifetime_lines = String::new();
        for (index, lifetime) in plan.buffer_lifetimes.iter().enumerate() {
            if let Some(lifetime) = lifetime {
                lifetime_lines += &format!(
                    "    buffer \"{}\": batches {}..={}\n",
                    self.buffer_slots[index].name, lifetime.first_batch, lifetime.last_batch
                );
            }
        }
        for (index, lifetime) in plan.image_lifetimes.iter().enumerate() {
            if let Some(lifetime) = lifetime {
                lifetime_lines += &format!(
                    "    image \"{}\": batches {}..={}\n",
                    self.image_slots[index].name, lifetime.first_batch, lifetime.last_batch
                );
            }
        }
        if !lifetime_lines.is_empty() {
            out += "  transient lifetimes:\n";
            out += &lifetime_lines;
        }
        for warning in &self.warnings {
            out += &format!("  warning: {}\n", warning);
        }
        Ok(out)
    }

    fn describe_barrier(&self, barrier: &TaskBarrier) -> String {
        match barrier.image_id {
            Some(id) => format!(
                "image barrier \"{}\" slice {:?}: {:?} -> {:?}, layout {:?} -> {:?}",
                self.image_slots[id.index as usize].name,
                barrier.slice,
                barrier.src_access,
                barrier.dst_access,
                barrier.src_layout,
                barrier.dst_layout
            ),
            None => format!(
                "memory barrier: {:?} -> {:?}",
                barrier.src_access, barrier.dst_access
            ),
        }
    }

    fn check_buffer_id(&self, id: TaskBufferId, context: &str) -> Result<usize> {
        if id.task_list_index != self.unique_index
            || id.index as usize >= self.buffer_slots.len()
        {
            return Err(Error::UnknownResource {
                task: context.to_string(),
            });
        }
        Ok(id.index as usize)
    }

    fn check_image_id(&self, id: TaskImageId, context: &str) -> Result<usize> {
        if id.task_list_index != self.unique_index || id.index as usize >= self.image_slots.len() {
            return Err(Error::UnknownResource {
                task: context.to_string(),
            });
        }
        Ok(id.index as usize)
    }
}

impl Drop for TaskList {
    fn drop(&mut self) {
        for task in &self.tasks {
            for cached in task.view_cache.iter().flatten() {
                if cached.owned {
                    self.device.destroy_image_view(cached.view);
                }
            }
        }
    }
}

fn default_view_type(dimensions: u32, layer_count: u32) -> vk::ImageViewType {
    match (dimensions, layer_count > 1) {
        (1, false) => vk::ImageViewType::TYPE_1D,
        (1, true) => vk::ImageViewType::TYPE_1D_ARRAY,
        (2, false) => vk::ImageViewType::TYPE_2D,
        (2, true) => vk::ImageViewType::TYPE_2D_ARRAY,
        _ => vk::ImageViewType::TYPE_3D,
    }
}
