use crate::types::Access;

use ash::vk;

/// A rectangular region of an image's aspect/mip/layer space.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ImageMipArraySlice {
    pub aspect_mask: vk::ImageAspectFlags,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl Default for ImageMipArraySlice {
    fn default() -> Self {
        Self {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

impl From<vk::ImageSubresourceRange> for ImageMipArraySlice {
    fn from(range: vk::ImageSubresourceRange) -> Self {
        Self {
            aspect_mask: range.aspect_mask,
            base_mip_level: range.base_mip_level,
            level_count: range.level_count,
            base_array_layer: range.base_array_layer,
            layer_count: range.layer_count,
        }
    }
}

impl From<ImageMipArraySlice> for vk::ImageSubresourceRange {
    fn from(slice: ImageMipArraySlice) -> Self {
        vk::ImageSubresourceRange {
            aspect_mask: slice.aspect_mask,
            base_mip_level: slice.base_mip_level,
            level_count: slice.level_count,
            base_array_layer: slice.base_array_layer,
            layer_count: slice.layer_count,
        }
    }
}

impl ImageMipArraySlice {
    pub fn is_empty(&self) -> bool {
        self.aspect_mask.is_empty() || self.level_count == 0 || self.layer_count == 0
    }

    /// One past the last mip level.
    pub fn mip_end(&self) -> u32 {
        self.base_mip_level + self.level_count
    }

    /// One past the last array layer.
    pub fn layer_end(&self) -> u32 {
        self.base_array_layer + self.layer_count
    }

    pub fn contains(&self, other: ImageMipArraySlice) -> bool {
        self.aspect_mask.contains(other.aspect_mask)
            && self.base_mip_level <= other.base_mip_level
            && self.mip_end() >= other.mip_end()
            && self.base_array_layer <= other.base_array_layer
            && self.layer_end() >= other.layer_end()
    }

    pub fn intersects(&self, other: ImageMipArraySlice) -> bool {
        !(self.aspect_mask & other.aspect_mask).is_empty()
            && self.base_mip_level < other.mip_end()
            && other.base_mip_level < self.mip_end()
            && self.base_array_layer < other.layer_end()
            && other.base_array_layer < self.layer_end()
    }

    /// The overlapping region of two slices. Empty when they are disjoint.
    pub fn intersect(&self, other: ImageMipArraySlice) -> ImageMipArraySlice {
        let base_mip_level = self.base_mip_level.max(other.base_mip_level);
        let mip_end = self.mip_end().min(other.mip_end());
        let base_array_layer = self.base_array_layer.max(other.base_array_layer);
        let layer_end = self.layer_end().min(other.layer_end());
        ImageMipArraySlice {
            aspect_mask: self.aspect_mask & other.aspect_mask,
            base_mip_level,
            level_count: mip_end.saturating_sub(base_mip_level),
            base_array_layer,
            layer_count: layer_end.saturating_sub(base_array_layer),
        }
    }

    /// The smallest slice containing both operands.
    pub fn bounding_union(&self, other: ImageMipArraySlice) -> ImageMipArraySlice {
        let base_mip_level = self.base_mip_level.min(other.base_mip_level);
        let mip_end = self.mip_end().max(other.mip_end());
        let base_array_layer = self.base_array_layer.min(other.base_array_layer);
        let layer_end = self.layer_end().max(other.layer_end());
        ImageMipArraySlice {
            aspect_mask: self.aspect_mask | other.aspect_mask,
            base_mip_level,
            level_count: mip_end - base_mip_level,
            base_array_layer,
            layer_count: layer_end - base_array_layer,
        }
    }

    /// Removes `other` from this slice, returning the disjoint rest regions.
    ///
    /// The rests partition `self \ other`: first any aspects not present in
    /// `other`, then mips below and above the overlap, then layers below and
    /// above the overlap within the shared mips. At most five rests exist.
    pub fn subtract(&self, other: ImageMipArraySlice) -> ([ImageMipArraySlice; 5], usize) {
        let mut rests = [ImageMipArraySlice::default(); 5];
        let mut count = 0;

        if !self.intersects(other) {
            rests[0] = *self;
            return (rests, 1);
        }

        let aspect_rest = self.aspect_mask & !other.aspect_mask;
        if !aspect_rest.is_empty() {
            rests[count] = ImageMipArraySlice {
                aspect_mask: aspect_rest,
                ..*self
            };
            count += 1;
        }
        let aspect = self.aspect_mask & other.aspect_mask;

        if self.base_mip_level < other.base_mip_level {
            rests[count] = ImageMipArraySlice {
                aspect_mask: aspect,
                base_mip_level: self.base_mip_level,
                level_count: other.base_mip_level - self.base_mip_level,
                base_array_layer: self.base_array_layer,
                layer_count: self.layer_count,
            };
            count += 1;
        }
        if self.mip_end() > other.mip_end() {
            rests[count] = ImageMipArraySlice {
                aspect_mask: aspect,
                base_mip_level: other.mip_end(),
                level_count: self.mip_end() - other.mip_end(),
                base_array_layer: self.base_array_layer,
                layer_count: self.layer_count,
            };
            count += 1;
        }

        let mip_base = self.base_mip_level.max(other.base_mip_level);
        let mip_count = self.mip_end().min(other.mip_end()) - mip_base;
        if self.base_array_layer < other.base_array_layer {
            rests[count] = ImageMipArraySlice {
                aspect_mask: aspect,
                base_mip_level: mip_base,
                level_count: mip_count,
                base_array_layer: self.base_array_layer,
                layer_count: other.base_array_layer - self.base_array_layer,
            };
            count += 1;
        }
        if self.layer_end() > other.layer_end() {
            rests[count] = ImageMipArraySlice {
                aspect_mask: aspect,
                base_mip_level: mip_base,
                level_count: mip_count,
                base_array_layer: other.layer_end(),
                layer_count: self.layer_end() - other.layer_end(),
            };
            count += 1;
        }

        (rests, count)
    }
}

/// The most recent access and layout of one slice of an image.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ImageSliceState {
    pub latest_access: Access,
    pub latest_layout: vk::ImageLayout,
    pub slice: ImageMipArraySlice,
}
