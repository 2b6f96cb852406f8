//! Backend-neutral description of a pipeline layout.
//!
//! The description is what shader reflection produces. Each backend turns it
//! into a slot-indexed resolution table once, at layout creation, so the
//! per-draw path is a plain lookup.

#[cfg(feature = "fresco-serde")]
use serde::{Deserialize, Serialize};

use super::types::ShaderStages;
use crate::gpu::error::{GPUError, Result};

/// Highest slot number a layout may declare. Backends keep dense slot tables.
pub const MAX_SLOT: u32 = 1023;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fresco-serde", derive(Serialize, Deserialize))]
pub enum BindingKind {
    Ubo,
    Ssbo,
    /// Sampled texture. The texture and its sampler are one logical entry.
    Texture,
    /// Storage image.
    Image,
}

impl BindingKind {
    pub fn is_buffer(&self) -> bool {
        matches!(self, BindingKind::Ubo | BindingKind::Ssbo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fresco-serde", derive(Serialize, Deserialize))]
pub struct LayoutBinding {
    pub slot: u32,
    pub kind: BindingKind,
    pub stages: ShaderStages,
    pub byte_size: u32,
}

impl LayoutBinding {
    pub fn new(slot: u32, kind: BindingKind, stages: ShaderStages) -> Self {
        Self {
            slot,
            kind,
            stages,
            byte_size: 0,
        }
    }

    pub fn with_size(mut self, byte_size: u32) -> Self {
        self.byte_size = byte_size;
        self
    }

    pub fn stages(&self) -> ShaderStages {
        self.stages
    }
}

/// Inline constant block ("push bytes").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fresco-serde", derive(Serialize, Deserialize))]
pub struct PushBlock {
    pub size: u32,
    pub stages: ShaderStages,
}

impl PushBlock {
    pub fn new(size: u32, stages: ShaderStages) -> Self {
        Self { size, stages }
    }

    pub fn stages(&self) -> ShaderStages {
        self.stages
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fresco-serde", derive(Serialize, Deserialize))]
pub struct PipelineLayoutDesc {
    pub bindings: Vec<LayoutBinding>,
    pub push: Option<PushBlock>,
}

impl PipelineLayoutDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(mut self, binding: LayoutBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn push(mut self, push: PushBlock) -> Self {
        self.push = Some(push);
        self
    }

    /// Bindings sorted by slot, after checking the description is usable.
    ///
    /// `max_push_bytes` is the device limit, when one is known.
    pub fn validated(&self, max_push_bytes: Option<u32>) -> Result<Vec<LayoutBinding>> {
        let mut sorted = self.bindings.clone();
        sorted.sort_by_key(|b| b.slot);
        for pair in sorted.windows(2) {
            if pair[0].slot == pair[1].slot {
                return Err(GPUError::InvalidLayout(format!(
                    "slot {} is declared twice",
                    pair[0].slot
                )));
            }
        }
        if let Some(last) = sorted.last() {
            if last.slot > MAX_SLOT {
                return Err(GPUError::InvalidLayout(format!(
                    "slot {} is above the limit of {}",
                    last.slot, MAX_SLOT
                )));
            }
        }
        for b in &sorted {
            if b.stages().is_empty() {
                return Err(GPUError::InvalidLayout(format!(
                    "slot {} is not visible to any stage",
                    b.slot
                )));
            }
        }
        if let Some(push) = &self.push {
            if push.size == 0 {
                return Err(GPUError::InvalidLayout("empty push block".into()));
            }
            if let Some(limit) = max_push_bytes {
                if push.size > limit {
                    return Err(GPUError::InvalidLayout(format!(
                        "push block of {} bytes exceeds device limit {}",
                        push.size, limit
                    )));
                }
            }
        }
        Ok(sorted)
    }

    /// Number of table entries needed to index every declared slot.
    pub fn slot_count(&self) -> usize {
        self.bindings
            .iter()
            .map(|b| b.slot as usize + 1)
            .max()
            .unwrap_or(0)
    }

    #[cfg(feature = "fresco-serde")]
    pub fn from_yaml(src: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_slots() {
        let desc = PipelineLayoutDesc::new()
            .binding(LayoutBinding::new(0, BindingKind::Ubo, ShaderStages::VERTEX))
            .binding(LayoutBinding::new(0, BindingKind::Texture, ShaderStages::FRAGMENT));
        assert!(matches!(desc.validated(None), Err(GPUError::InvalidLayout(_))));
    }

    #[test]
    fn rejects_oversized_push_block() {
        let desc = PipelineLayoutDesc::new().push(PushBlock::new(256, ShaderStages::VERTEX));
        assert!(desc.validated(None).is_ok());
        assert!(desc.validated(Some(128)).is_err());
    }

    #[test]
    fn sorts_bindings_by_slot() {
        let desc = PipelineLayoutDesc::new()
            .binding(LayoutBinding::new(3, BindingKind::Ssbo, ShaderStages::COMPUTE))
            .binding(LayoutBinding::new(1, BindingKind::Ubo, ShaderStages::COMPUTE));
        let sorted = desc.validated(None).unwrap();
        assert_eq!(sorted[0].slot, 1);
        assert_eq!(sorted[1].slot, 3);
        assert_eq!(desc.slot_count(), 4);
    }

    #[test]
    fn rejects_slots_past_the_limit() {
        let desc = PipelineLayoutDesc::new()
            .binding(LayoutBinding::new(u32::MAX, BindingKind::Ubo, ShaderStages::VERTEX));
        assert!(matches!(desc.validated(None), Err(GPUError::InvalidLayout(_))));

        let desc = PipelineLayoutDesc::new()
            .binding(LayoutBinding::new(MAX_SLOT, BindingKind::Ubo, ShaderStages::VERTEX));
        assert!(desc.validated(None).is_ok());
    }
}
