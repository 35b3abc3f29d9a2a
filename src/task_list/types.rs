use crate::{
    slice::ImageMipArraySlice,
    types::{access_consts, Access},
};

use ash::vk;

pub type TaskResourceIndex = u32;

/// Identifies a buffer within one task list.
///
/// The id carries the owning list's index, so ids cannot silently cross from
/// one task list into another. Ids stay valid across every execution of the
/// list they belong to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TaskBufferId {
    pub(crate) task_list_index: TaskResourceIndex,
    pub(crate) index: TaskResourceIndex,
}

impl std::fmt::Display for TaskBufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task_list_index: {}, index: {}", self.task_list_index, self.index)
    }
}

/// Identifies an image within one task list. See [`TaskBufferId`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TaskImageId {
    pub(crate) task_list_index: TaskResourceIndex,
    pub(crate) index: TaskResourceIndex,
}

impl std::fmt::Display for TaskImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task_list_index: {}, index: {}", self.task_list_index, self.index)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TaskBufferAccess {
    #[default]
    None,
    ShaderRead,
    VertexShaderRead,
    TessellationControlShaderRead,
    TessellationEvaluationShaderRead,
    GeometryShaderRead,
    FragmentShaderRead,
    ComputeShaderRead,
    ShaderWrite,
    VertexShaderWrite,
    TessellationControlShaderWrite,
    TessellationEvaluationShaderWrite,
    GeometryShaderWrite,
    FragmentShaderWrite,
    ComputeShaderWrite,
    ShaderReadWrite,
    VertexShaderReadWrite,
    TessellationControlShaderReadWrite,
    TessellationEvaluationShaderReadWrite,
    GeometryShaderReadWrite,
    FragmentShaderReadWrite,
    ComputeShaderReadWrite,
    IndexRead,
    DrawIndirectInfoRead,
    TransferRead,
    TransferWrite,
    HostTransferRead,
    HostTransferWrite,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TaskImageAccess {
    #[default]
    None,
    ShaderRead,
    VertexShaderRead,
    TessellationControlShaderRead,
    TessellationEvaluationShaderRead,
    GeometryShaderRead,
    FragmentShaderRead,
    ComputeShaderRead,
    ShaderWrite,
    VertexShaderWrite,
    TessellationControlShaderWrite,
    TessellationEvaluationShaderWrite,
    GeometryShaderWrite,
    FragmentShaderWrite,
    ComputeShaderWrite,
    ShaderReadWrite,
    VertexShaderReadWrite,
    TessellationControlShaderReadWrite,
    TessellationEvaluationShaderReadWrite,
    GeometryShaderReadWrite,
    FragmentShaderReadWrite,
    ComputeShaderReadWrite,
    TransferRead,
    TransferWrite,
    ColorAttachment,
    DepthAttachment,
    StencilAttachment,
    DepthStencilAttachment,
    DepthAttachmentRead,
    StencilAttachmentRead,
    DepthStencilAttachmentRead,
    ResolveWrite,
    Present,
}

/// One task's declaration that it touches a buffer.
#[derive(Clone, Copy, Debug)]
pub struct TaskBufferUse {
    pub id: TaskBufferId,
    pub access: TaskBufferAccess,
}

impl TaskBufferUse {
    pub fn new(id: TaskBufferId, access: TaskBufferAccess) -> Self {
        Self { id, access }
    }
}

/// One task's declaration that it touches an image.
///
/// When `slice` is `None` the image's default slice applies; when `view_type`
/// is `None` the image's default view type applies.
#[derive(Clone, Copy, Debug)]
pub struct TaskImageUse {
    pub id: TaskImageId,
    pub access: TaskImageAccess,
    pub slice: Option<ImageMipArraySlice>,
    pub view_type: Option<vk::ImageViewType>,
}

impl TaskImageUse {
    pub fn new(id: TaskImageId, access: TaskImageAccess) -> Self {
        Self {
            id,
            access,
            slice: None,
            view_type: None,
        }
    }

    pub fn with_slice(mut self, slice: ImageMipArraySlice) -> Self {
        self.slice = Some(slice);
        self
    }

    pub fn with_view_type(mut self, view_type: vk::ImageViewType) -> Self {
        self.view_type = Some(view_type);
        self
    }
}

pub fn task_buffer_access_to_access(access: TaskBufferAccess) -> Access {
    use crate::types::access_consts::ACCESS_READ_WRITE;
    use ash::vk::AccessFlags2 as access_flags;
    use ash::vk::PipelineStageFlags2 as stage;

    const ALL_SHADERS: stage = stage::from_raw(stage::ALL_GRAPHICS.as_raw() | stage::COMPUTE_SHADER.as_raw());

    match access {
        TaskBufferAccess::None => access_consts::NONE,
        TaskBufferAccess::ShaderRead => Access(ALL_SHADERS, access_flags::MEMORY_READ),
        TaskBufferAccess::VertexShaderRead => Access(stage::VERTEX_SHADER, access_flags::MEMORY_READ),
        TaskBufferAccess::TessellationControlShaderRead => Access(stage::TESSELLATION_CONTROL_SHADER, access_flags::MEMORY_READ),
        TaskBufferAccess::TessellationEvaluationShaderRead => Access(stage::TESSELLATION_EVALUATION_SHADER, access_flags::MEMORY_READ),
        TaskBufferAccess::GeometryShaderRead => Access(stage::GEOMETRY_SHADER, access_flags::MEMORY_READ),
        TaskBufferAccess::FragmentShaderRead => Access(stage::FRAGMENT_SHADER, access_flags::MEMORY_READ),
        TaskBufferAccess::ComputeShaderRead => Access(stage::COMPUTE_SHADER, access_flags::MEMORY_READ),
        TaskBufferAccess::ShaderWrite => Access(ALL_SHADERS, access_flags::MEMORY_WRITE),
        TaskBufferAccess::VertexShaderWrite => Access(stage::VERTEX_SHADER, access_flags::MEMORY_WRITE),
        TaskBufferAccess::TessellationControlShaderWrite => Access(stage::TESSELLATION_CONTROL_SHADER, access_flags::MEMORY_WRITE),
        TaskBufferAccess::TessellationEvaluationShaderWrite => Access(stage::TESSELLATION_EVALUATION_SHADER, access_flags::MEMORY_WRITE),
        TaskBufferAccess::GeometryShaderWrite => Access(stage::GEOMETRY_SHADER, access_flags::MEMORY_WRITE),
        TaskBufferAccess::FragmentShaderWrite => Access(stage::FRAGMENT_SHADER, access_flags::MEMORY_WRITE),
        TaskBufferAccess::ComputeShaderWrite => Access(stage::COMPUTE_SHADER, access_flags::MEMORY_WRITE),
        TaskBufferAccess::ShaderReadWrite => Access(ALL_SHADERS, ACCESS_READ_WRITE),
        TaskBufferAccess::VertexShaderReadWrite => Access(stage::VERTEX_SHADER, ACCESS_READ_WRITE),
        TaskBufferAccess::TessellationControlShaderReadWrite => Access(stage::TESSELLATION_CONTROL_SHADER, ACCESS_READ_WRITE),
        TaskBufferAccess::TessellationEvaluationShaderReadWrite => Access(stage::TESSELLATION_EVALUATION_SHADER, ACCESS_READ_WRITE),
        TaskBufferAccess::GeometryShaderReadWrite => Access(stage::GEOMETRY_SHADER, ACCESS_READ_WRITE),
        TaskBufferAccess::FragmentShaderReadWrite => Access(stage::FRAGMENT_SHADER, ACCESS_READ_WRITE),
        TaskBufferAccess::ComputeShaderReadWrite => Access(stage::COMPUTE_SHADER, ACCESS_READ_WRITE),
        TaskBufferAccess::IndexRead => Access(stage::INDEX_INPUT, access_flags::MEMORY_READ),
        TaskBufferAccess::DrawIndirectInfoRead => Access(stage::DRAW_INDIRECT, access_flags::MEMORY_READ),
        TaskBufferAccess::TransferRead => Access(stage::TRANSFER, access_flags::MEMORY_READ),
        TaskBufferAccess::TransferWrite => Access(stage::TRANSFER, access_flags::MEMORY_WRITE),
        TaskBufferAccess::HostTransferRead => Access(stage::HOST, access_flags::MEMORY_READ),
        TaskBufferAccess::HostTransferWrite => Access(stage::HOST, access_flags::MEMORY_WRITE),
    }
}

/// Decodes an image access into the layout the image must be in and the
/// stage/access masks synchronization has to cover.
///
/// Compute and mixed-stage shader reads address storage images and therefore
/// require `GENERAL`; reads limited to graphics stages are sampled reads and
/// use `SHADER_READ_ONLY_OPTIMAL`.
pub fn task_image_access_to_layout_access(access: TaskImageAccess) -> (vk::ImageLayout, Access) {
    use crate::types::access_consts::ACCESS_READ_WRITE;
    use ash::vk::AccessFlags2 as access_flags;
    use ash::vk::ImageLayout as layout;
    use ash::vk::PipelineStageFlags2 as stage;

    const ALL_SHADERS: stage = stage::from_raw(stage::ALL_GRAPHICS.as_raw() | stage::COMPUTE_SHADER.as_raw());
    const FRAGMENT_TESTS: stage = stage::from_raw(stage::EARLY_FRAGMENT_TESTS.as_raw() | stage::LATE_FRAGMENT_TESTS.as_raw());

    match access {
        TaskImageAccess::None => (layout::UNDEFINED, access_consts::NONE),
        TaskImageAccess::ShaderRead => (layout::GENERAL, Access(ALL_SHADERS, access_flags::MEMORY_READ)),
        TaskImageAccess::VertexShaderRead => (layout::SHADER_READ_ONLY_OPTIMAL, Access(stage::VERTEX_SHADER, access_flags::MEMORY_READ)),
        TaskImageAccess::TessellationControlShaderRead => (layout::SHADER_READ_ONLY_OPTIMAL, Access(stage::TESSELLATION_CONTROL_SHADER, access_flags::MEMORY_READ)),
        TaskImageAccess::TessellationEvaluationShaderRead => (layout::SHADER_READ_ONLY_OPTIMAL, Access(stage::TESSELLATION_EVALUATION_SHADER, access_flags::MEMORY_READ)),
        TaskImageAccess::GeometryShaderRead => (layout::SHADER_READ_ONLY_OPTIMAL, Access(stage::GEOMETRY_SHADER, access_flags::MEMORY_READ)),
        TaskImageAccess::FragmentShaderRead => (layout::SHADER_READ_ONLY_OPTIMAL, Access(stage::FRAGMENT_SHADER, access_flags::MEMORY_READ)),
        TaskImageAccess::ComputeShaderRead => (layout::GENERAL, Access(stage::COMPUTE_SHADER, access_flags::MEMORY_READ)),
        TaskImageAccess::ShaderWrite => (layout::GENERAL, Access(ALL_SHADERS, access_flags::MEMORY_WRITE)),
        TaskImageAccess::VertexShaderWrite => (layout::GENERAL, Access(stage::VERTEX_SHADER, access_flags::MEMORY_WRITE)),
        TaskImageAccess::TessellationControlShaderWrite => (layout::GENERAL, Access(stage::TESSELLATION_CONTROL_SHADER, access_flags::MEMORY_WRITE)),
        TaskImageAccess::TessellationEvaluationShaderWrite => (layout::GENERAL, Access(stage::TESSELLATION_EVALUATION_SHADER, access_flags::MEMORY_WRITE)),
        TaskImageAccess::GeometryShaderWrite => (layout::GENERAL, Access(stage::GEOMETRY_SHADER, access_flags::MEMORY_WRITE)),
        TaskImageAccess::FragmentShaderWrite => (layout::GENERAL, Access(stage::FRAGMENT_SHADER, access_flags::MEMORY_WRITE)),
        TaskImageAccess::ComputeShaderWrite => (layout::GENERAL, Access(stage::COMPUTE_SHADER, access_flags::MEMORY_WRITE)),
        TaskImageAccess::ShaderReadWrite => (layout::GENERAL, Access(ALL_SHADERS, ACCESS_READ_WRITE)),
        TaskImageAccess::VertexShaderReadWrite => (layout::GENERAL, Access(stage::VERTEX_SHADER, ACCESS_READ_WRITE)),
        TaskImageAccess::TessellationControlShaderReadWrite => (layout::GENERAL, Access(stage::TESSELLATION_CONTROL_SHADER, ACCESS_READ_WRITE)),
        TaskImageAccess::TessellationEvaluationShaderReadWrite => (layout::GENERAL, Access(stage::TESSELLATION_EVALUATION_SHADER, ACCESS_READ_WRITE)),
        TaskImageAccess::GeometryShaderReadWrite => (layout::GENERAL, Access(stage::GEOMETRY_SHADER, ACCESS_READ_WRITE)),
        TaskImageAccess::FragmentShaderReadWrite => (layout::GENERAL, Access(stage::FRAGMENT_SHADER, ACCESS_READ_WRITE)),
        TaskImageAccess::ComputeShaderReadWrite => (layout::GENERAL, Access(stage::COMPUTE_SHADER, ACCESS_READ_WRITE)),
        TaskImageAccess::TransferRead => (layout::TRANSFER_SRC_OPTIMAL, Access(stage::TRANSFER, access_flags::MEMORY_READ)),
        TaskImageAccess::TransferWrite => (layout::TRANSFER_DST_OPTIMAL, Access(stage::TRANSFER, access_flags::MEMORY_WRITE)),
        TaskImageAccess::ColorAttachment => (layout::COLOR_ATTACHMENT_OPTIMAL, Access(stage::COLOR_ATTACHMENT_OUTPUT, ACCESS_READ_WRITE)),
        TaskImageAccess::DepthAttachment
        | TaskImageAccess::StencilAttachment
        | TaskImageAccess::DepthStencilAttachment => (layout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, Access(FRAGMENT_TESTS, ACCESS_READ_WRITE)),
        TaskImageAccess::DepthAttachmentRead
        | TaskImageAccess::StencilAttachmentRead
        | TaskImageAccess::DepthStencilAttachmentRead => (layout::DEPTH_STENCIL_READ_ONLY_OPTIMAL, Access(FRAGMENT_TESTS, access_flags::MEMORY_READ)),
        TaskImageAccess::ResolveWrite => (layout::COLOR_ATTACHMENT_OPTIMAL, Access(stage::RESOLVE, access_flags::MEMORY_WRITE)),
        TaskImageAccess::Present => (layout::PRESENT_SRC_KHR, Access(stage::BOTTOM_OF_PIPE, access_flags::MEMORY_READ)),
    }
}
