use crate::{
    command_list::{CommandList, CommandListInfo},
    error::Result,
    gpu_resources::{BufferId, BufferInfo, ImageId, ImageInfo, ImageViewId, ImageViewInfo},
    split_barrier::{SplitBarrierInfo, SplitBarrierState},
};

/// The interface to the GPU device backing a task list.
///
/// The task list compiles and executes against this trait only; a real
/// backend implements it on top of its queue/resource machinery, tests
/// implement it with an in-memory mock.
pub trait Device {
    fn create_command_list(&self, info: CommandListInfo) -> Result<CommandList>;

    fn create_split_barrier(&self, info: SplitBarrierInfo) -> Result<SplitBarrierState>;

    fn info_buffer(&self, id: BufferId) -> Result<BufferInfo>;

    fn info_image(&self, id: ImageId) -> Result<ImageInfo>;

    fn info_image_view(&self, id: ImageViewId) -> Result<ImageViewInfo>;

    /// The view covering the full image with its natural view type.
    fn image_default_view(&self, id: ImageId) -> Result<ImageViewId>;

    fn create_image_view(&self, info: ImageViewInfo) -> Result<ImageViewId>;

    fn destroy_image_view(&self, id: ImageViewId);
}
