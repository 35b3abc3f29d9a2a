mod common;

use common::*;

use anyhow::Result;
use ash::vk;
use lattice::{
    device::Device,
    error::Error,
    gpu_resources::ImageViewId,
    slice::ImageMipArraySlice,
    task_list::*,
    types::Access,
};

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

fn transient_image(
    device: &Arc<MockDevice>,
    name: &str,
    mip_level_count: u32,
    array_layer_count: u32,
) -> ImageSource {
    let image = device.create_image(color_image_info(name, mip_level_count, array_layer_count));
    ImageSource::Transient {
        fetch: Box::new(move || image),
        info: TransientImageInfo {
            mip_level_count,
            array_layer_count,
            ..Default::default()
        },
    }
}

#[test]
fn callbacks_run_in_declaration_order() -> Result<()> {
    let device = MockDevice::new();
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let image = list.create_task_image(TaskImageInfo {
        source: transient_image(&device, "target", 1, 1),
        default_slice: None,
        final_access: None,
        name: "target".into(),
    })?;

    let order = Rc::new(RefCell::new(Vec::new()));
    // Alternating writes and reads force several batches; unused tasks land
    // in whatever batch is open. Declaration order must hold either way.
    let accesses = [
        TaskImageAccess::ComputeShaderWrite,
        TaskImageAccess::ComputeShaderRead,
        TaskImageAccess::ComputeShaderRead,
        TaskImageAccess::ComputeShaderWrite,
    ];
    for (index, access) in accesses.into_iter().enumerate() {
        let order = order.clone();
        list.add_task(TaskInfo {
            image_uses: vec![TaskImageUse::new(image, access)],
            task: Box::new(move |_| order.borrow_mut().push(index)),
            name: format!("task {index}"),
            ..Default::default()
        })?;
    }
    list.compile()?;
    list.execute()?;

    assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    Ok(())
}

#[test]
fn interface_resolves_declared_uses() -> Result<()> {
    let device = MockDevice::new();
    let staging = device.create_buffer(256, "staging");
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let buffer = list.create_task_buffer(TaskBufferInfo {
        source: BufferSource::Persistent {
            buffer: staging,
            initial_access: Access::default(),
        },
        final_access: None,
        name: "staging".into(),
    })?;
    let image = list.create_task_image(TaskImageInfo {
        source: transient_image(&device, "target", 1, 1),
        default_slice: None,
        final_access: None,
        name: "target".into(),
    })?;

    let undeclared = list.create_task_buffer(TaskBufferInfo {
        source: BufferSource::Persistent {
            buffer: device.create_buffer(64, "undeclared"),
            initial_access: Access::default(),
        },
        final_access: None,
        name: "undeclared".into(),
    })?;

    let seen = Rc::new(Cell::new(false));
    {
        let seen = seen.clone();
        list.add_task(TaskInfo {
            buffer_uses: vec![TaskBufferUse::new(buffer, TaskBufferAccess::TransferRead)],
            image_uses: vec![TaskImageUse::new(image, TaskImageAccess::TransferWrite)],
            task: Box::new(move |interface| {
                assert_eq!(interface.buffer(buffer).unwrap(), staging);
                assert!(interface.image(image).is_ok());
                assert!(interface.image_view(image).is_ok());
                // Resources the task never declared stay invisible.
                assert!(interface.buffer(undeclared).is_err());
                seen.set(true);
            }),
            name: "probe".into(),
        })?;
    }
    list.compile()?;
    list.execute()?;
    assert!(seen.get());
    Ok(())
}

#[test]
fn each_task_receives_its_own_view_type() -> Result<()> {
    let device = MockDevice::new();
    let texture = device.create_image(color_image_info("texture", 1, 1));
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let image = list.create_task_image(TaskImageInfo {
        source: ImageSource::Persistent {
            image: texture,
            initial_states: Vec::new(),
        },
        default_slice: None,
        final_access: None,
        name: "texture".into(),
    })?;

    let default_view: Rc<Cell<Option<ImageViewId>>> = Rc::new(Cell::new(None));
    let array_view: Rc<Cell<Option<ImageViewId>>> = Rc::new(Cell::new(None));
    {
        let default_view = default_view.clone();
        list.add_task(TaskInfo {
            image_uses: vec![TaskImageUse::new(image, TaskImageAccess::FragmentShaderRead)],
            task: Box::new(move |interface| {
                default_view.set(Some(interface.image_view(image).unwrap()));
            }),
            name: "samples default".into(),
            ..Default::default()
        })?;
    }
    {
        let array_view = array_view.clone();
        list.add_task(TaskInfo {
            image_uses: vec![
                TaskImageUse::new(image, TaskImageAccess::FragmentShaderRead)
                    .with_view_type(vk::ImageViewType::TYPE_2D_ARRAY),
            ],
            task: Box::new(move |interface| {
                array_view.set(Some(interface.image_view(image).unwrap()));
            }),
            name: "samples array".into(),
            ..Default::default()
        })?;
    }
    list.compile()?;
    list.execute()?;

    let default_view = default_view.get().unwrap();
    let array_view = array_view.get().unwrap();
    assert_ne!(default_view, array_view);
    // The first task's parameters match the image's own view, so only the
    // array view was created through the device.
    assert_eq!(default_view, device.image_default_view(texture)?);
    assert_eq!(device.created_view_count(), 1);

    // Re-executing reuses both cached views.
    list.execute()?;
    assert_eq!(device.created_view_count(), 1);
    Ok(())
}

#[test]
fn fetch_callbacks_run_once_per_execute() -> Result<()> {
    let device = MockDevice::new();
    let image = device.create_image(color_image_info("ring", 1, 1));
    let fetch_count = Rc::new(Cell::new(0));
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let task_image = {
        let fetch_count = fetch_count.clone();
        list.create_task_image(TaskImageInfo {
            source: ImageSource::Transient {
                fetch: Box::new(move || {
                    fetch_count.set(fetch_count.get() + 1);
                    image
                }),
                info: TransientImageInfo::default(),
            },
            default_slice: None,
            final_access: None,
            name: "ring".into(),
        })?
    };

    // Two tasks share the image; the handle is still fetched only once.
    for access in [
        TaskImageAccess::ComputeShaderWrite,
        TaskImageAccess::ComputeShaderRead,
    ] {
        list.add_task(TaskInfo {
            image_uses: vec![TaskImageUse::new(task_image, access)],
            ..Default::default()
        })?;
    }
    list.compile()?;
    list.execute()?;
    assert_eq!(fetch_count.get(), 1);
    list.execute()?;
    assert_eq!(fetch_count.get(), 2);
    Ok(())
}

#[test]
fn transient_plans_replay_identically() -> Result<()> {
    let device = MockDevice::new();
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let image = list.create_task_image(TaskImageInfo {
        source: transient_image(&device, "target", 2, 1),
        default_slice: None,
        final_access: None,
        name: "target".into(),
    })?;
    for access in [
        TaskImageAccess::TransferWrite,
        TaskImageAccess::ComputeShaderRead,
        TaskImageAccess::ComputeShaderWrite,
    ] {
        list.add_task(TaskInfo {
            image_uses: vec![TaskImageUse::new(image, access)],
            ..Default::default()
        })?;
    }
    list.compile()?;

    let first = list.execute()?;
    let second = list.execute()?;
    assert_eq!(
        format!("{:?}", first[0].commands()),
        format!("{:?}", second[0].commands())
    );
    Ok(())
}

#[test]
fn persistent_state_carries_across_executes() -> Result<()> {
    let device = MockDevice::new();
    let texture = device.create_image(color_image_info("texture", 1, 1));
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let image = list.create_task_image(TaskImageInfo {
        source: ImageSource::Persistent {
            image: texture,
            initial_states: Vec::new(),
        },
        default_slice: None,
        final_access: None,
        name: "texture".into(),
    })?;
    list.add_task(TaskInfo {
        image_uses: vec![TaskImageUse::new(image, TaskImageAccess::ComputeShaderWrite)],
        ..Default::default()
    })?;
    list.compile()?;

    // First execution initializes the layout from undefined.
    let first = list.execute()?;
    let first_barriers = image_barriers(&first[0]);
    assert_eq!(first_barriers.len(), 1);
    assert_eq!(first_barriers[0].src_layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(first_barriers[0].dst_layout, vk::ImageLayout::GENERAL);

    let full = ImageMipArraySlice::default();
    assert_eq!(list.last_image_layout(image, full)?, vk::ImageLayout::GENERAL);

    // Later executions pick up where the previous one left the image.
    let second = list.execute()?;
    let second_barriers = image_barriers(&second[0]);
    assert_eq!(second_barriers.len(), 1);
    assert_eq!(second_barriers[0].src_layout, vk::ImageLayout::GENERAL);
    assert_eq!(second_barriers[0].dst_layout, vk::ImageLayout::GENERAL);

    // From here on every execution records the same stream.
    let third = list.execute()?;
    assert_eq!(
        format!("{:?}", second[0].commands()),
        format!("{:?}", third[0].commands())
    );
    Ok(())
}

#[test]
fn buffer_hand_off_state_is_queryable() -> Result<()> {
    let device = MockDevice::new();
    let storage = device.create_buffer(1024, "storage");
    let mut list = TaskList::new(device, TaskListInfo::default());
    let buffer = list.create_task_buffer(TaskBufferInfo {
        source: BufferSource::Persistent {
            buffer: storage,
            initial_access: Access::default(),
        },
        final_access: None,
        name: "storage".into(),
    })?;
    list.add_task(TaskInfo {
        buffer_uses: vec![TaskBufferUse::new(buffer, TaskBufferAccess::TransferWrite)],
        ..Default::default()
    })?;
    list.compile()?;
    list.execute()?;

    let access = list.last_buffer_access(buffer)?;
    assert_eq!(access.0, vk::PipelineStageFlags2::TRANSFER);
    assert!(access.is_write());
    Ok(())
}

#[test]
fn read_only_sequences_stay_in_one_batch() -> Result<()> {
    let device = MockDevice::new();
    let texture = device.create_image(color_image_info("texture", 1, 1));
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let image = list.create_task_image(TaskImageInfo {
        source: ImageSource::Persistent {
            image: texture,
            initial_states: Vec::new(),
        },
        default_slice: None,
        final_access: None,
        name: "texture".into(),
    })?;
    for _ in 0..4 {
        list.add_task(TaskInfo {
            image_uses: vec![TaskImageUse::new(image, TaskImageAccess::FragmentShaderRead)],
            ..Default::default()
        })?;
    }
    list.compile()?;
    let lists = list.execute()?;

    assert_eq!(batch_count(&lists[0]), 1);
    // The only transition brings the image into the read layout; its
    // destination covers all four readers at once.
    let barriers = image_barriers(&lists[0]);
    assert_eq!(barriers.len(), 1);
    assert_eq!(barriers[0].src_layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(
        barriers[0].dst_layout,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );
    Ok(())
}

#[test]
fn uninitialized_reads_are_reported() -> Result<()> {
    let device = MockDevice::new();
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let image = list.create_task_image(TaskImageInfo {
        source: transient_image(&device, "garbage", 1, 1),
        default_slice: None,
        final_access: None,
        name: "garbage".into(),
    })?;
    list.add_task(TaskInfo {
        image_uses: vec![TaskImageUse::new(image, TaskImageAccess::ComputeShaderRead)],
        ..Default::default()
    })?;
    list.compile()?;

    assert!(list.warnings().iter().any(|warning| matches!(
        warning,
        CompileWarning::UninitializedRead { resource } if resource == "garbage"
    )));
    Ok(())
}

#[test]
fn dead_writes_are_reported() -> Result<()> {
    let device = MockDevice::new();
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let image = list.create_task_image(TaskImageInfo {
        source: transient_image(&device, "wasted", 1, 1),
        default_slice: None,
        final_access: None,
        name: "wasted".into(),
    })?;
    list.add_task(TaskInfo {
        image_uses: vec![TaskImageUse::new(image, TaskImageAccess::ComputeShaderWrite)],
        ..Default::default()
    })?;
    list.compile()?;

    assert!(list.warnings().iter().any(|warning| matches!(
        warning,
        CompileWarning::DeadWrite { resource } if resource == "wasted"
    )));
    Ok(())
}

#[test]
fn layout_queries_reject_mixed_layouts() -> Result<()> {
    let device = MockDevice::new();
    let mut list = TaskList::new(device.clone(), TaskListInfo::default());
    let image = list.create_task_image(TaskImageInfo {
        source: transient_image(&device, "mixed", 2, 1),
        default_slice: None,
        final_access: None,
        name: "mixed".into(),
    })?;
    let mip = |base: u32| ImageMipArraySlice {
        base_mip_level: base,
        level_count: 1,
        ..Default::default()
    };
    list.add_task(TaskInfo {
        image_uses: vec![
            TaskImageUse::new(image, TaskImageAccess::TransferWrite).with_slice(mip(0)),
            TaskImageUse::new(image, TaskImageAccess::ColorAttachment).with_slice(mip(1)),
        ],
        ..Default::default()
    })?;
    list.compile()?;
    list.execute()?;

    assert_eq!(
        list.last_image_layout(image, mip(0))?,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL
    );
    assert_eq!(
        list.last_image_layout(image, mip(1))?,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    );
    let full = ImageMipArraySlice {
        level_count: 2,
        ..Default::default()
    };
    assert!(matches!(
        list.last_image_layout(image, full),
        Err(Error::NonUniformLayout { .. })
    ));
    Ok(())
}
