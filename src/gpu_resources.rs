use crate::slice::ImageMipArraySlice;

use ash::vk;

use std::fmt::Display;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct BufferId(pub u32);

impl Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct ImageId(pub u32);

impl Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct ImageViewId(pub u32);

impl Display for ImageViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata of a buffer living behind the device interface.
#[derive(Clone, Default, Debug)]
pub struct BufferInfo {
    pub size: u64,
    pub debug_name: String,
}

/// Metadata of an image living behind the device interface.
#[derive(Clone, Debug)]
pub struct ImageInfo {
    pub dimensions: u32,
    pub format: vk::Format,
    pub aspect: vk::ImageAspectFlags,
    pub size: vk::Extent3D,
    pub mip_level_count: u32,
    pub array_layer_count: u32,
    pub sample_count: u32,
    pub usage: vk::ImageUsageFlags,
    pub debug_name: String,
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self {
            dimensions: 2,
            format: vk::Format::R8G8B8A8_UNORM,
            aspect: vk::ImageAspectFlags::COLOR,
            size: vk::Extent3D { width: 0, height: 0, depth: 0 },
            mip_level_count: 1,
            array_layer_count: 1,
            sample_count: 1,
            usage: vk::ImageUsageFlags::empty(),
            debug_name: "".into(),
        }
    }
}

impl ImageInfo {
    /// The slice covering every aspect, mip level and array layer.
    pub fn full_slice(&self) -> ImageMipArraySlice {
        ImageMipArraySlice {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: self.mip_level_count,
            base_array_layer: 0,
            layer_count: self.array_layer_count,
        }
    }
}

/// Metadata of an image view living behind the device interface.
#[derive(Clone, Debug)]
pub struct ImageViewInfo {
    pub image_view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub image: ImageId,
    pub slice: ImageMipArraySlice,
    pub debug_name: String,
}
