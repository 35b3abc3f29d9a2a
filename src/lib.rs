//! A task list for Vulkan-style GPU work.
//!
//! A [`TaskList`](task_list::TaskList) is a statically compiled graph of GPU
//! tasks. Each task declares which buffers and images it touches and how; the
//! list compiles those declarations into batches of tasks separated by
//! automatically synthesized pipeline barriers and image layout transitions,
//! and executes the compiled plan into recorded [`CommandList`]s ready for
//! submission.
//!
//! The GPU itself is reached through the [`Device`](device::Device) trait.
//! This crate ships the compiler, the resource state tracking and the
//! recorded command stream, not a Vulkan backend.

pub mod command_list;
pub mod device;
pub mod error;
pub mod gpu_resources;
pub mod slice;
pub mod split_barrier;
pub mod task_list;
pub mod types;

pub use command_list::CommandList;
pub use error::{Error, Result};
