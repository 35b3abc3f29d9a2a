use ash::vk;

use std::ops::BitOr;

// reexport
pub use {
    vk::Extent2D,
    vk::Extent3D,
    vk::Offset2D,
};

/// A combined pipeline stage and memory access mask.
///
/// Read-write accesses carry both the read and the write bit, so
/// [`Access::is_read`] and [`Access::is_write`] are both true for them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Access(pub vk::PipelineStageFlags2, pub vk::AccessFlags2);

impl Default for Access {
    fn default() -> Self {
        access_consts::NONE
    }
}

impl BitOr for Access {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0, self.1 | rhs.1)
    }
}

impl Access {
    pub fn is_none(self) -> bool {
        self.1 == vk::AccessFlags2::NONE
    }

    pub fn is_read(self) -> bool {
        self.1.contains(vk::AccessFlags2::MEMORY_READ)
    }

    pub fn is_write(self) -> bool {
        self.1.contains(vk::AccessFlags2::MEMORY_WRITE)
    }

    /// True when the access reads and never writes.
    pub fn is_read_only(self) -> bool {
        self.is_read() && !self.is_write()
    }

    /// Two accesses may overlap without synchronization iff both only read.
    pub fn is_compatible(self, other: Access) -> bool {
        self.is_read_only() && other.is_read_only()
    }
}

pub mod access_consts {
    use super::Access;
    use ash::vk;

    pub const NONE: Access = Access(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE);

    pub const TRANSFER_READ: Access = Access(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::MEMORY_READ);
    pub const HOST_READ: Access = Access(vk::PipelineStageFlags2::HOST, vk::AccessFlags2::MEMORY_READ);

    pub const COLOR_ATTACHMENT_OUTPUT_WRITE: Access = Access(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags2::MEMORY_WRITE);
    pub const TRANSFER_WRITE: Access = Access(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::MEMORY_WRITE);
    pub const HOST_WRITE: Access = Access(vk::PipelineStageFlags2::HOST, vk::AccessFlags2::MEMORY_WRITE);

    // MEMORY_READ | MEMORY_WRITE; flag ops are not const in ash, so raw bits.
    pub(crate) const ACCESS_READ_WRITE: vk::AccessFlags2 =
        vk::AccessFlags2::from_raw(0b1000_0000_0000_0000 | 0b1_0000_0000_0000_0000);

    pub const TRANSFER_READ_WRITE: Access = Access(vk::PipelineStageFlags2::TRANSFER, ACCESS_READ_WRITE);
    pub const COLOR_ATTACHMENT_READ_WRITE: Access = Access(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, ACCESS_READ_WRITE);
}
