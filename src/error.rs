//! Exposes the crate error type.

use crate::slice::ImageMipArraySlice;

use thiserror::Error;

/// Error type surfaced by the task list.
#[derive(Error, Debug)]
pub enum Error {
    /// A task use references a resource id the task list does not know,
    /// typically an id created by another task list.
    #[error("task \"{task}\" references a resource unknown to this task list")]
    UnknownResource { task: String },
    /// A single task uses the same resource twice with accesses that cannot
    /// overlap (anything other than two reads of the same layout).
    #[error("task \"{task}\" uses \"{resource}\" twice with conflicting accesses")]
    SelfConflict { task: String, resource: String },
    /// An image use names a slice outside the resource's declared extent.
    #[error("task \"{task}\" uses slice {slice:?} of \"{resource}\", which exceeds the image extent {extent:?}")]
    SliceOutOfRange {
        task: String,
        resource: String,
        slice: ImageMipArraySlice,
        extent: ImageMipArraySlice,
    },
    /// The same concrete resource handle was registered as persistent twice.
    #[error("\"{resource}\" is already registered with this task list")]
    DuplicatePersistentRegistration { resource: String },
    /// The call is only valid while the task list is still being built.
    #[error("the task list is already compiled")]
    AlreadyCompiled,
    /// The call is only valid once the task list is compiled.
    #[error("the task list is not compiled yet")]
    NotCompiled,
    /// A layout query covered sub-slices that are in different layouts.
    #[error("slice {slice:?} of \"{resource}\" spans more than one image layout")]
    NonUniformLayout {
        resource: String,
        slice: ImageMipArraySlice,
    },
    /// An error propagated from the device interface.
    #[error("device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, Error>;
