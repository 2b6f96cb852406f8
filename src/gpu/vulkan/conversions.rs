use ash::vk;

use crate::gpu::driver::{
    BindingKind, BufferLayout, IndexClass, Rect, ShaderStages, TextureFormat, TextureLayout,
};

impl From<IndexClass> for vk::IndexType {
    fn from(cls: IndexClass) -> Self {
        match cls {
            IndexClass::I16 => vk::IndexType::UINT16,
            IndexClass::I32 => vk::IndexType::UINT32,
        }
    }
}

impl From<TextureFormat> for vk::Format {
    fn from(format: TextureFormat) -> Self {
        match format {
            TextureFormat::R8 => vk::Format::R8_UNORM,
            TextureFormat::RG8 => vk::Format::R8G8_UNORM,
            TextureFormat::RGBA8 => vk::Format::R8G8B8A8_UNORM,
            TextureFormat::R16 => vk::Format::R16_UNORM,
            TextureFormat::RG16 => vk::Format::R16G16_UNORM,
            TextureFormat::RGBA16 => vk::Format::R16G16B16A16_UNORM,
            TextureFormat::R32F => vk::Format::R32_SFLOAT,
            TextureFormat::RG32F => vk::Format::R32G32_SFLOAT,
            TextureFormat::RGBA32F => vk::Format::R32G32B32A32_SFLOAT,
            TextureFormat::Depth16 => vk::Format::D16_UNORM,
            TextureFormat::Depth24S8 => vk::Format::D24_UNORM_S8_UINT,
            TextureFormat::Depth32F => vk::Format::D32_SFLOAT,
        }
    }
}

impl From<BindingKind> for vk::DescriptorType {
    fn from(kind: BindingKind) -> Self {
        match kind {
            BindingKind::Ubo => vk::DescriptorType::UNIFORM_BUFFER,
            BindingKind::Ssbo => vk::DescriptorType::STORAGE_BUFFER,
            BindingKind::Texture => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            BindingKind::Image => vk::DescriptorType::STORAGE_IMAGE,
        }
    }
}

pub const STAGE_TO_VK: &[(ShaderStages, vk::ShaderStageFlags)] = &[
    (ShaderStages::VERTEX, vk::ShaderStageFlags::VERTEX),
    (ShaderStages::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
    (ShaderStages::COMPUTE, vk::ShaderStageFlags::COMPUTE),
];

#[inline]
pub fn stages_to_vk(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    for (s, f) in STAGE_TO_VK {
        if stages.contains(*s) {
            flags |= *f;
        }
    }
    flags
}

#[inline]
pub fn layout_to_vk(layout: TextureLayout, format: TextureFormat) -> vk::ImageLayout {
    match layout {
        TextureLayout::Undefined => vk::ImageLayout::UNDEFINED,
        TextureLayout::Sampler if format.is_depth() => {
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        }
        TextureLayout::Sampler => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        TextureLayout::ColorAttach => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        TextureLayout::DepthAttach => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        TextureLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        TextureLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        TextureLayout::TransferDest => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        TextureLayout::Unordered => vk::ImageLayout::GENERAL,
    }
}

/// Pipeline stages and access that touch a texture in `layout`.
#[inline]
pub fn texture_sync(layout: TextureLayout) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match layout {
        TextureLayout::Undefined => (vk::PipelineStageFlags::TOP_OF_PIPE, vk::AccessFlags::empty()),
        TextureLayout::Sampler => (
            vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        TextureLayout::ColorAttach => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        TextureLayout::DepthAttach => (
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        TextureLayout::Present => (vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::AccessFlags::empty()),
        TextureLayout::TransferSrc => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_READ)
        }
        TextureLayout::TransferDest => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE)
        }
        TextureLayout::Unordered => (
            vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        ),
    }
}

#[inline]
pub fn buffer_sync(layout: BufferLayout) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match layout {
        BufferLayout::Undefined => (vk::PipelineStageFlags::TOP_OF_PIPE, vk::AccessFlags::empty()),
        BufferLayout::ComputeRead => {
            (vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::SHADER_READ)
        }
        BufferLayout::ComputeWrite => (
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        ),
        BufferLayout::VertexRead => (
            vk::PipelineStageFlags::VERTEX_INPUT,
            vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
        ),
        BufferLayout::IndexRead => (vk::PipelineStageFlags::VERTEX_INPUT, vk::AccessFlags::INDEX_READ),
        BufferLayout::UniformRead => (
            vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::UNIFORM_READ,
        ),
        BufferLayout::TransferSrc => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_READ)
        }
        BufferLayout::TransferDest => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE)
        }
    }
}

#[inline]
pub fn aspect_of(format: TextureFormat) -> vk::ImageAspectFlags {
    match format {
        TextureFormat::Depth24S8 => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        f if f.is_depth() => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

#[inline]
pub fn rect_to_viewport(rect: Rect) -> vk::Viewport {
    vk::Viewport {
        x: rect.x as f32,
        y: rect.y as f32,
        width: rect.w as f32,
        height: rect.h as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor covering `rect`, clipped to non-negative coordinates.
#[inline]
pub fn rect_to_scissor(rect: Rect) -> vk::Rect2D {
    let x = rect.x.max(0);
    let y = rect.y.max(0);
    vk::Rect2D {
        offset: vk::Offset2D { x, y },
        extent: vk::Extent2D {
            width: (rect.w - (x - rect.x)).max(0) as u32,
            height: (rect.h - (y - rect.y)).max(0) as u32,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_flags_combine() {
        let flags = stages_to_vk(ShaderStages::GRAPHICS);
        assert_eq!(
            flags,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert!(stages_to_vk(ShaderStages::empty()).is_empty());
    }

    #[test]
    fn depth_sampler_layout() {
        assert_eq!(
            layout_to_vk(TextureLayout::Sampler, TextureFormat::Depth32F),
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        );
        assert_eq!(
            layout_to_vk(TextureLayout::Sampler, TextureFormat::RGBA8),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
    }

    #[test]
    fn scissor_clips_negative_origin() {
        let s = rect_to_scissor(Rect::new(-10, 5, 100, 50));
        assert_eq!(s.offset.x, 0);
        assert_eq!(s.extent.width, 90);
        assert_eq!(s.extent.height, 50);
    }
}
