use ash::vk;

use super::conversions::stages_to_vk;
use crate::gpu::driver::{BindingKind, PipelineLayoutDesc};
use crate::gpu::Result;

/// Native binding of one layout slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VkBind {
    /// Binding index in descriptor set 0.
    pub binding: u32,
    pub kind: BindingKind,
    pub ty: vk::DescriptorType,
    pub stages: vk::ShaderStageFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VkPushRange {
    pub size: u32,
    pub stages: vk::ShaderStageFlags,
}

/// A pipeline layout and its slot table.
///
/// Slots map one to one onto binding indices of descriptor set 0. Push bytes
/// go through a single push-constant range at offset zero.
#[derive(Debug, Clone)]
pub struct VkPipelineLayout {
    raw: vk::PipelineLayout,
    table: Vec<Option<VkBind>>,
    push: Option<VkPushRange>,
}

impl VkPipelineLayout {
    /// Wrap a native layout that was created from `desc`.
    ///
    /// `max_push_bytes` is the device limit, if known.
    pub fn new(
        raw: vk::PipelineLayout,
        desc: &PipelineLayoutDesc,
        max_push_bytes: Option<u32>,
    ) -> Result<Self> {
        let bindings = desc.validated(max_push_bytes)?;
        let mut table = vec![None; desc.slot_count()];
        for b in bindings {
            table[b.slot as usize] = Some(VkBind {
                binding: b.slot,
                kind: b.kind,
                ty: b.kind.into(),
                stages: stages_to_vk(b.stages()),
            });
        }
        let push = desc.push.map(|p| VkPushRange {
            size: p.size,
            stages: stages_to_vk(p.stages()),
        });
        Ok(Self { raw, table, push })
    }

    pub fn raw(&self) -> vk::PipelineLayout {
        self.raw
    }

    pub fn resolve(&self, slot: u32) -> Option<&VkBind> {
        self.table.get(slot as usize).and_then(|b| b.as_ref())
    }

    pub fn push_range(&self) -> Option<VkPushRange> {
        self.push
    }

    pub fn slots(&self) -> impl Iterator<Item = (u32, &VkBind)> {
        self.table
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (i as u32, b)))
    }

    /// Set layout bindings matching this table, for creating the native
    /// descriptor set layout.
    pub fn descriptor_bindings(&self) -> Vec<vk::DescriptorSetLayoutBinding> {
        self.slots()
            .map(|(_, b)| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(b.ty)
                    .descriptor_count(1)
                    .stage_flags(b.stages)
                    .build()
            })
            .collect()
    }

    /// Push-constant ranges matching this layout.
    pub fn push_constant_ranges(&self) -> Vec<vk::PushConstantRange> {
        self.push
            .iter()
            .map(|p| vk::PushConstantRange {
                stage_flags: p.stages,
                offset: 0,
                size: p.size,
            })
            .collect()
    }
}
