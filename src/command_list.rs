use crate::split_barrier::{
    ImageBarrierInfo,
    MemoryBarrierInfo,
    SplitBarrierSignalInfo,
    SplitBarrierState,
    SplitBarrierWaitInfo,
};

use ash::vk;

use std::borrow::Cow;

#[derive(Clone, Default)]
pub struct CommandListInfo {
    pub debug_name: Cow<'static, str>,
}

#[derive(Clone, Debug)]
pub struct CommandLabelInfo {
    pub label_name: Cow<'static, str>,
    pub label_color: [f32; 4],
}

#[derive(Clone, Debug)]
pub struct ResetSplitBarrierInfo {
    pub barrier: SplitBarrierState,
    pub stage: vk::PipelineStageFlags2,
}

/// One recorded command. A backend replays these against its queue when the
/// completed command list is submitted.
#[derive(Clone, Debug)]
pub enum Command {
    PipelineBarrier(MemoryBarrierInfo),
    ImageTransitionBarrier(ImageBarrierInfo),
    SignalSplitBarrier(SplitBarrierSignalInfo),
    WaitSplitBarriers(Vec<SplitBarrierWaitInfo>),
    ResetSplitBarrier(ResetSplitBarrierInfo),
    BeginLabel(CommandLabelInfo),
    EndLabel,
}

/// A command stream under construction.
///
/// Commands are recorded in order and frozen with [`CommandList::complete`].
/// Recording into a completed command list is a programming error.
pub struct CommandList {
    info: CommandListInfo,
    commands: Vec<Command>,
    complete: bool,
}

impl CommandList {
    pub fn new(info: CommandListInfo) -> Self {
        Self {
            info,
            commands: Vec::new(),
            complete: false,
        }
    }

    pub fn info(&self) -> &CommandListInfo {
        &self.info
    }

    pub fn pipeline_barrier(&mut self, info: MemoryBarrierInfo) {
        self.record(Command::PipelineBarrier(info));
    }

    pub fn pipeline_barrier_image_transition(&mut self, info: ImageBarrierInfo) {
        self.record(Command::ImageTransitionBarrier(info));
    }

    pub fn signal_split_barrier(&mut self, info: SplitBarrierSignalInfo) {
        self.record(Command::SignalSplitBarrier(info));
    }

    pub fn wait_split_barriers(&mut self, infos: Vec<SplitBarrierWaitInfo>) {
        self.record(Command::WaitSplitBarriers(infos));
    }

    pub fn reset_split_barrier(&mut self, info: ResetSplitBarrierInfo) {
        self.record(Command::ResetSplitBarrier(info));
    }

    pub fn begin_label(&mut self, info: CommandLabelInfo) {
        self.record(Command::BeginLabel(info));
    }

    pub fn end_label(&mut self) {
        self.record(Command::EndLabel);
    }

    /// Freezes the command list for submission.
    pub fn complete(mut self) -> CommandList {
        debug_assert!(!self.complete, "CommandList can only be completed once!");
        self.complete = true;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The recorded command stream.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    fn record(&mut self, command: Command) {
        debug_assert!(
            !self.complete,
            "Detected command recording into completed command list \"{}\"!",
            self.info.debug_name
        );
        self.commands.push(command);
    }
}
