use crate::{gpu_resources::ImageId, slice::ImageMipArraySlice, types::Access};

use ash::vk;

use std::borrow::Cow;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct MemoryBarrierInfo {
    pub src_access: Access,
    pub dst_access: Access,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageBarrierInfo {
    pub src_access: Access,
    pub dst_access: Access,
    pub src_layout: vk::ImageLayout,
    pub dst_layout: vk::ImageLayout,
    pub slice: ImageMipArraySlice,
    pub image: ImageId,
}

impl Default for ImageBarrierInfo {
    fn default() -> Self {
        Self {
            src_access: Default::default(),
            dst_access: Default::default(),
            src_layout: Default::default(),
            dst_layout: Default::default(),
            slice: Default::default(),
            image: Default::default(),
        }
    }
}

#[derive(Clone)]
pub struct SplitBarrierInfo {
    pub debug_name: Cow<'static, str>,
}

/// A barrier whose signal and wait halves live in different batches.
///
/// The wrapped value is an opaque device handle (a `VkEvent` on a real
/// backend); the device interface creates it and the command stream refers
/// to it by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitBarrierState {
    data: u64,
    debug_name: String,
}

impl SplitBarrierState {
    pub fn new(data: u64, debug_name: String) -> Self {
        Self { data, debug_name }
    }

    pub fn data(&self) -> u64 {
        self.data
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitBarrierSignalInfo {
    pub memory_barriers: Vec<MemoryBarrierInfo>,
    pub image_barriers: Vec<ImageBarrierInfo>,
    pub split_barrier: SplitBarrierState,
}

pub type SplitBarrierWaitInfo = SplitBarrierSignalInfo;
