#![allow(dead_code)]

use lattice::{
    command_list::{Command, CommandList, CommandListInfo},
    device::Device,
    error::{Error, Result},
    gpu_resources::{BufferId, BufferInfo, ImageId, ImageInfo, ImageViewId, ImageViewInfo},
    split_barrier::{ImageBarrierInfo, MemoryBarrierInfo, SplitBarrierInfo, SplitBarrierState},
};

use ash::vk;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    next_id: u32,
    buffers: HashMap<u32, BufferInfo>,
    images: HashMap<u32, ImageInfo>,
    views: HashMap<u32, ImageViewInfo>,
    default_views: HashMap<u32, u32>,
    created_view_count: u32,
    destroyed_views: Vec<ImageViewId>,
    split_barrier_count: u32,
}

/// In-memory device: hands out ids, remembers resource metadata, and lets
/// tests inspect what the task list asked for.
pub struct MockDevice {
    inner: Mutex<Inner>,
}

impl MockDevice {
    pub fn new() -> Arc<MockDevice> {
        Arc::new(MockDevice {
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn create_buffer(&self, size: u64, name: &str) -> BufferId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.buffers.insert(
            id,
            BufferInfo {
                size,
                debug_name: name.into(),
            },
        );
        BufferId(id)
    }

    pub fn create_image(&self, info: ImageInfo) -> ImageId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let image = inner.next_id;
        inner.next_id += 1;
        let view = inner.next_id;
        let layer_count = info.array_layer_count;
        let view_type = match (info.dimensions, layer_count > 1) {
            (1, false) => vk::ImageViewType::TYPE_1D,
            (1, true) => vk::ImageViewType::TYPE_1D_ARRAY,
            (2, false) => vk::ImageViewType::TYPE_2D,
            (2, true) => vk::ImageViewType::TYPE_2D_ARRAY,
            _ => vk::ImageViewType::TYPE_3D,
        };
        inner.views.insert(
            view,
            ImageViewInfo {
                image_view_type: view_type,
                format: info.format,
                image: ImageId(image),
                slice: info.full_slice(),
                debug_name: format!("{} default view", info.debug_name),
            },
        );
        inner.default_views.insert(image, view);
        inner.images.insert(image, info);
        ImageId(image)
    }

    /// Image views created through the device interface, default views not
    /// included.
    pub fn created_view_count(&self) -> u32 {
        self.inner.lock().unwrap().created_view_count
    }

    pub fn destroyed_views(&self) -> Vec<ImageViewId> {
        self.inner.lock().unwrap().destroyed_views.clone()
    }
}

impl Device for MockDevice {
    fn create_command_list(&self, info: CommandListInfo) -> Result<CommandList> {
        Ok(CommandList::new(info))
    }

    fn create_split_barrier(&self, info: SplitBarrierInfo) -> Result<SplitBarrierState> {
        let mut inner = self.inner.lock().unwrap();
        inner.split_barrier_count += 1;
        Ok(SplitBarrierState::new(
            inner.split_barrier_count as u64,
            info.debug_name.into_owned(),
        ))
    }

    fn info_buffer(&self, id: BufferId) -> Result<BufferInfo> {
        self.inner
            .lock()
            .unwrap()
            .buffers
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::Device(format!("unknown buffer {id}")))
    }

    fn info_image(&self, id: ImageId) -> Result<ImageInfo> {
        self.inner
            .lock()
            .unwrap()
            .images
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::Device(format!("unknown image {id}")))
    }

    fn info_image_view(&self, id: ImageViewId) -> Result<ImageViewInfo> {
        self.inner
            .lock()
            .unwrap()
            .views
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::Device(format!("unknown image view {id}")))
    }

    fn image_default_view(&self, id: ImageId) -> Result<ImageViewId> {
        self.inner
            .lock()
            .unwrap()
            .default_views
            .get(&id.0)
            .map(|view| ImageViewId(*view))
            .ok_or_else(|| Error::Device(format!("unknown image {id}")))
    }

    fn create_image_view(&self, info: ImageViewInfo) -> Result<ImageViewId> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.created_view_count += 1;
        inner.views.insert(id, info);
        Ok(ImageViewId(id))
    }

    fn destroy_image_view(&self, id: ImageViewId) {
        let mut inner = self.inner.lock().unwrap();
        inner.views.remove(&id.0);
        inner.destroyed_views.push(id);
    }
}

pub fn color_image_info(name: &str, mip_level_count: u32, array_layer_count: u32) -> ImageInfo {
    ImageInfo {
        size: vk::Extent3D {
            width: 16,
            height: 16,
            depth: 1,
        },
        mip_level_count,
        array_layer_count,
        debug_name: name.into(),
        ..Default::default()
    }
}

pub fn memory_barriers(list: &CommandList) -> Vec<MemoryBarrierInfo> {
    list.commands()
        .iter()
        .filter_map(|command| match command {
            Command::PipelineBarrier(info) => Some(*info),
            _ => None,
        })
        .collect()
}

pub fn image_barriers(list: &CommandList) -> Vec<ImageBarrierInfo> {
    list.commands()
        .iter()
        .filter_map(|command| match command {
            Command::ImageTransitionBarrier(info) => Some(*info),
            _ => None,
        })
        .collect()
}

/// Batches are delimited by the command labels the executor records.
pub fn batch_count(list: &CommandList) -> usize {
    list.commands()
        .iter()
        .filter(|command| match command {
            Command::BeginLabel(info) => info.label_name.contains(", batch "),
            _ => false,
        })
        .count()
}

pub fn split_signal_count(list: &CommandList) -> usize {
    list.commands()
        .iter()
        .filter(|command| matches!(command, Command::SignalSplitBarrier(_)))
        .count()
}

pub fn split_wait_count(list: &CommandList) -> usize {
    list.commands()
        .iter()
        .filter(|command| matches!(command, Command::WaitSplitBarriers(_)))
        .count()
}
