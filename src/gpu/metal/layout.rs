use super::driver::RenderStage;
use crate::gpu::driver::{BindingKind, PipelineLayoutDesc, ShaderStages};
use crate::gpu::{GPUError, Result};

/// Buffer argument table size of a Metal stage.
pub const MAX_BUFFER_INDICES: u32 = 31;
/// Texture argument table size of a Metal stage.
pub const MAX_TEXTURE_INDICES: u32 = 128;
/// Sampler argument table size of a Metal stage.
pub const MAX_SAMPLER_INDICES: u32 = 16;

/// Per-stage native indices of one layout slot.
///
/// For buffers the stage index is a buffer index; for textures and storage
/// images it is a texture index. Sampled textures also get a sampler index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MtBind {
    pub vs: Option<u32>,
    pub fs: Option<u32>,
    pub cs: Option<u32>,
    pub vs_sampler: Option<u32>,
    pub fs_sampler: Option<u32>,
    pub cs_sampler: Option<u32>,
}

impl MtBind {
    pub fn render_index(&self, stage: RenderStage) -> Option<u32> {
        match stage {
            RenderStage::Vertex => self.vs,
            RenderStage::Fragment => self.fs,
        }
    }

    pub fn render_sampler(&self, stage: RenderStage) -> Option<u32> {
        match stage {
            RenderStage::Vertex => self.vs_sampler,
            RenderStage::Fragment => self.fs_sampler,
        }
    }
}

/// Buffer index of the push block in each stage that sees it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MtPushIndex {
    pub size: u32,
    pub vs: Option<u32>,
    pub fs: Option<u32>,
    pub cs: Option<u32>,
}

impl MtPushIndex {
    pub fn render_index(&self, stage: RenderStage) -> Option<u32> {
        match stage {
            RenderStage::Vertex => self.vs,
            RenderStage::Fragment => self.fs,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    buffers: u32,
    textures: u32,
    samplers: u32,
}

impl Counters {
    fn buffer(&mut self) -> u32 {
        self.buffers += 1;
        self.buffers - 1
    }

    fn texture(&mut self) -> u32 {
        self.textures += 1;
        self.textures - 1
    }

    fn sampler(&mut self) -> u32 {
        self.samplers += 1;
        self.samplers - 1
    }
}

/// Slot table for the Metal backend.
///
/// Every stage has its own buffer, texture and sampler index space, assigned
/// in slot order. The push block follows the layout's buffers in each stage
/// that sees it, and the vertex buffer takes the next free vertex buffer index.
#[derive(Debug, Clone)]
pub struct MtPipelineLayout {
    kinds: Vec<Option<BindingKind>>,
    table: Vec<Option<MtBind>>,
    push: Option<MtPushIndex>,
    vbo_index: u32,
}

impl MtPipelineLayout {
    pub fn new(desc: &PipelineLayoutDesc, max_push_bytes: Option<u32>) -> Result<Self> {
        let bindings = desc.validated(max_push_bytes)?;
        let mut vs = Counters::default();
        let mut fs = Counters::default();
        let mut cs = Counters::default();

        let mut table = vec![None; desc.slot_count()];
        let mut kinds = vec![None; desc.slot_count()];
        for b in &bindings {
            let stages = b.stages();
            let mut bind = MtBind::default();
            let assign = |c: &mut Counters, index: &mut Option<u32>, smp: &mut Option<u32>| {
                match b.kind {
                    BindingKind::Ubo | BindingKind::Ssbo => *index = Some(c.buffer()),
                    BindingKind::Texture => {
                        *index = Some(c.texture());
                        *smp = Some(c.sampler());
                    }
                    BindingKind::Image => *index = Some(c.texture()),
                }
            };
            if stages.contains(ShaderStages::VERTEX) {
                assign(&mut vs, &mut bind.vs, &mut bind.vs_sampler);
            }
            if stages.contains(ShaderStages::FRAGMENT) {
                assign(&mut fs, &mut bind.fs, &mut bind.fs_sampler);
            }
            if stages.contains(ShaderStages::COMPUTE) {
                assign(&mut cs, &mut bind.cs, &mut bind.cs_sampler);
            }
            table[b.slot as usize] = Some(bind);
            kinds[b.slot as usize] = Some(b.kind);
        }

        let push = desc.push.map(|p| {
            let stages = p.stages();
            MtPushIndex {
                size: p.size,
                vs: stages.contains(ShaderStages::VERTEX).then(|| vs.buffer()),
                fs: stages.contains(ShaderStages::FRAGMENT).then(|| fs.buffer()),
                cs: stages.contains(ShaderStages::COMPUTE).then(|| cs.buffer()),
            }
        });
        let vbo_index = vs.buffer();

        for (name, c) in [("vertex", &vs), ("fragment", &fs), ("compute", &cs)] {
            for (what, used, limit) in [
                ("buffer", c.buffers, MAX_BUFFER_INDICES),
                ("texture", c.textures, MAX_TEXTURE_INDICES),
                ("sampler", c.samplers, MAX_SAMPLER_INDICES),
            ] {
                if used > limit {
                    return Err(GPUError::InvalidLayout(format!(
                        "{} stage needs {} {} indices, Metal has {}",
                        name, used, what, limit
                    )));
                }
            }
        }

        Ok(Self {
            kinds,
            table,
            push,
            vbo_index,
        })
    }

    pub fn resolve(&self, slot: u32) -> Option<&MtBind> {
        self.table.get(slot as usize).and_then(|b| b.as_ref())
    }

    pub fn kind(&self, slot: u32) -> Option<BindingKind> {
        self.kinds.get(slot as usize).copied().flatten()
    }

    pub fn push(&self) -> Option<&MtPushIndex> {
        self.push.as_ref()
    }

    /// Vertex-stage buffer index used for the vertex buffer.
    pub fn vbo_index(&self) -> u32 {
        self.vbo_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::driver::{LayoutBinding, PushBlock};

    #[test]
    fn stages_have_separate_index_spaces() {
        let desc = PipelineLayoutDesc::new()
            .binding(LayoutBinding::new(0, BindingKind::Ubo, ShaderStages::GRAPHICS))
            .binding(LayoutBinding::new(1, BindingKind::Texture, ShaderStages::FRAGMENT))
            .binding(LayoutBinding::new(2, BindingKind::Ssbo, ShaderStages::FRAGMENT))
            .binding(LayoutBinding::new(3, BindingKind::Texture, ShaderStages::GRAPHICS));
        let lay = MtPipelineLayout::new(&desc, None).unwrap();

        let ubo = lay.resolve(0).unwrap();
        assert_eq!((ubo.vs, ubo.fs), (Some(0), Some(0)));

        let tex = lay.resolve(1).unwrap();
        assert_eq!((tex.vs, tex.fs, tex.fs_sampler), (None, Some(0), Some(0)));

        let ssbo = lay.resolve(2).unwrap();
        assert_eq!(ssbo.fs, Some(1));

        let tex2 = lay.resolve(3).unwrap();
        assert_eq!((tex2.vs, tex2.vs_sampler), (Some(0), Some(0)));
        assert_eq!((tex2.fs, tex2.fs_sampler), (Some(1), Some(1)));

        assert_eq!(lay.kind(1), Some(BindingKind::Texture));
        assert_eq!(lay.vbo_index(), 1);
    }

    #[test]
    fn push_block_follows_layout_buffers() {
        let desc = PipelineLayoutDesc::new()
            .binding(LayoutBinding::new(0, BindingKind::Ubo, ShaderStages::VERTEX))
            .binding(LayoutBinding::new(1, BindingKind::Ubo, ShaderStages::VERTEX))
            .push(PushBlock::new(16, ShaderStages::GRAPHICS));
        let lay = MtPipelineLayout::new(&desc, None).unwrap();
        let push = lay.push().unwrap();
        assert_eq!(push.vs, Some(2));
        assert_eq!(push.fs, Some(0));
        assert_eq!(push.cs, None);
        assert_eq!(lay.vbo_index(), 3);
    }

    #[test]
    fn storage_images_get_no_sampler() {
        let desc = PipelineLayoutDesc::new()
            .binding(LayoutBinding::new(0, BindingKind::Image, ShaderStages::COMPUTE))
            .binding(LayoutBinding::new(1, BindingKind::Texture, ShaderStages::COMPUTE));
        let lay = MtPipelineLayout::new(&desc, None).unwrap();
        let img = lay.resolve(0).unwrap();
        assert_eq!((img.cs, img.cs_sampler), (Some(0), None));
        let tex = lay.resolve(1).unwrap();
        assert_eq!((tex.cs, tex.cs_sampler), (Some(1), Some(0)));
    }

    #[test]
    fn too_many_buffers_is_rejected() {
        let mut desc = PipelineLayoutDesc::new();
        for slot in 0..32 {
            desc = desc.binding(LayoutBinding::new(slot, BindingKind::Ubo, ShaderStages::COMPUTE));
        }
        assert!(MtPipelineLayout::new(&desc, None).is_err());
    }

    #[test]
    fn sampler_table_overflow_is_rejected() {
        let mut desc = PipelineLayoutDesc::new();
        for slot in 0..MAX_SAMPLER_INDICES {
            desc = desc.binding(LayoutBinding::new(slot, BindingKind::Texture, ShaderStages::FRAGMENT));
        }
        assert!(MtPipelineLayout::new(&desc, None).is_ok());
        let desc = desc.binding(LayoutBinding::new(
            MAX_SAMPLER_INDICES,
            BindingKind::Texture,
            ShaderStages::FRAGMENT,
        ));
        assert!(matches!(MtPipelineLayout::new(&desc, None), Err(GPUError::InvalidLayout(_))));
    }

    #[test]
    fn texture_table_overflow_is_rejected() {
        let mut desc = PipelineLayoutDesc::new();
        for slot in 0..=MAX_TEXTURE_INDICES {
            desc = desc.binding(LayoutBinding::new(slot, BindingKind::Image, ShaderStages::COMPUTE));
        }
        assert!(matches!(MtPipelineLayout::new(&desc, None), Err(GPUError::InvalidLayout(_))));
    }
}
