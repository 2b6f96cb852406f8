//! Encoder state machine of the Metal backend.
//!
//! Exactly one native encoder is open at a time. Switching to compute or
//! blit work inside a render pass interrupts the pass: the render encoder is
//! closed and reopened with loaded attachments by the next draw-side call.

use super::driver::{MtlDriver, RenderStage};
use super::{
    MetalApi, MtBuffer, MtCompPipeline, MtDescEntry, MtDescriptorSet, MtFramebuffer,
    MtPipeline, MtPipelineLayout, MtRenderPass, MtTexture,
};
use crate::gpu::driver::binds::{BindCache, PendingBinds};
use crate::gpu::driver::types::to_u32;
use crate::gpu::driver::{
    mip_extent, BindingKind, BufferLayout, CommandBuffer, DeviceProperties, EncoderKind,
    Identity, IndexClass, Rect, RecordState, TextureLayout,
};
use crate::gpu::{GPUError, Result};

const RENDER_STAGES: [RenderStage; 2] = [RenderStage::Vertex, RenderStage::Fragment];

enum Encoder<D: MtlDriver> {
    None,
    Draw(D::RenderEncoder),
    Compute(D::ComputeEncoder),
    Blit(D::BlitEncoder),
}

impl<D: MtlDriver> Encoder<D> {
    fn kind(&self) -> EncoderKind {
        match self {
            Encoder::None => EncoderKind::None,
            Encoder::Draw(_) => EncoderKind::Draw,
            Encoder::Compute(_) => EncoderKind::Compute,
            Encoder::Blit(_) => EncoderKind::Blit,
        }
    }
}

struct ActivePass<D: MtlDriver> {
    fbo: D::Framebuffer,
    pass: D::RenderPass,
    width: u32,
    height: u32,
    viewport: Rect,
    /// The render encoder was closed for other work and must load on reopen.
    interrupted: bool,
}

fn entry_matches<D: MtlDriver>(kind: BindingKind, entry: &MtDescEntry<D>) -> bool {
    match entry {
        MtDescEntry::Buffer { .. } => kind.is_buffer(),
        MtDescEntry::Texture { sampler: Some(_), .. } => kind == BindingKind::Texture,
        MtDescEntry::Texture { sampler: None, .. } => kind == BindingKind::Image,
    }
}

fn check_entry<D: MtlDriver>(layout: &MtPipelineLayout, slot: u32, entry: &MtDescEntry<D>) {
    if let Some(kind) = layout.kind(slot) {
        assert!(
            entry_matches(kind, entry),
            "descriptor slot {} does not hold a {:?} resource",
            slot,
            kind
        );
    }
}

pub struct MtCommandBuffer<D: MtlDriver> {
    driver: D,
    props: DeviceProperties,
    state: RecordState,
    native: Option<D::CommandBuffer>,
    encoder: Encoder<D>,
    pass: Option<ActivePass<D>>,

    pipeline: Option<MtPipeline<D::RenderPipeline>>,
    pipeline_bound: BindCache,
    binds: PendingBinds<MtDescriptorSet<D>>,
    vbo: BindCache,

    compute: Option<MtCompPipeline<D::ComputePipeline>>,
    compute_bound: BindCache,
    comp_binds: PendingBinds<MtDescriptorSet<D>>,
}

impl<D: MtlDriver> MtCommandBuffer<D> {
    pub fn new(driver: D, props: DeviceProperties) -> Self {
        Self {
            driver,
            props,
            state: RecordState::Idle,
            native: None,
            encoder: Encoder::None,
            pass: None,
            pipeline: None,
            pipeline_bound: BindCache::default(),
            binds: PendingBinds::default(),
            vbo: BindCache::default(),
            compute: None,
            compute_bound: BindCache::default(),
            comp_binds: PendingBinds::default(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.props
    }

    /// Size of the active render pass, interrupted or not.
    pub fn render_area(&self) -> Option<(u32, u32)> {
        self.pass.as_ref().map(|p| (p.width, p.height))
    }

    /// Hand the finished native command buffer to the queue.
    pub fn take_native(&mut self) -> Result<D::CommandBuffer> {
        if self.state != RecordState::Ended {
            return Err(GPUError::InvalidState);
        }
        self.native.take().ok_or(GPUError::InvalidState)
    }

    fn assert_recording(&self, what: &str) {
        assert!(
            self.state == RecordState::Recording,
            "{}: command buffer is not recording",
            what
        );
    }

    fn native<'a>(native: &'a Option<D::CommandBuffer>, what: &str) -> &'a D::CommandBuffer {
        native
            .as_ref()
            .unwrap_or_else(|| panic!("{}: no native command buffer", what))
    }

    fn clear_state(&mut self) {
        self.pass = None;
        self.pipeline = None;
        self.pipeline_bound.invalidate();
        self.binds.clear();
        self.vbo.invalidate();
        self.compute = None;
        self.compute_bound.invalidate();
        self.comp_binds.clear();
    }

    fn close_encoder(&mut self) {
        match std::mem::replace(&mut self.encoder, Encoder::None) {
            Encoder::None => {}
            Encoder::Draw(enc) => {
                self.driver.end_render(enc);
                if let Some(pass) = self.pass.as_mut() {
                    pass.interrupted = true;
                }
                self.pipeline_bound.invalidate();
                self.vbo.invalidate();
                self.binds.encoder_reopened();
            }
            Encoder::Compute(enc) => {
                self.driver.end_compute(enc);
                self.compute_bound.invalidate();
                self.comp_binds.encoder_reopened();
            }
            Encoder::Blit(enc) => self.driver.end_blit(enc),
        }
    }

    fn open_draw(&mut self, what: &str) {
        assert!(self.pass.is_some(), "{}: no render pass is active", what);
        if matches!(self.encoder, Encoder::Draw(_)) {
            return;
        }
        self.close_encoder();

        let Self {
            driver,
            native,
            pass,
            binds,
            ..
        } = self;
        let cmd = Self::native(native, what);
        let Some(pass) = pass.as_mut() else {
            return;
        };
        if pass.interrupted {
            log::trace!("{}: resuming interrupted render pass", what);
        }
        let enc = driver.render_encoder(cmd, &pass.fbo, &pass.pass, pass.interrupted);
        if let Some(viewport) = binds.viewport.take() {
            pass.viewport = viewport;
        }
        driver.set_viewport(&enc, pass.viewport);
        self.encoder = Encoder::Draw(enc);
        self.bind_pipeline();
    }

    fn open_compute(&mut self, what: &str) {
        if !matches!(self.encoder, Encoder::Compute(_)) {
            self.close_encoder();
            let enc = self
                .driver
                .compute_encoder(Self::native(&self.native, what));
            self.encoder = Encoder::Compute(enc);
        }
        let Self {
            driver,
            encoder,
            compute,
            compute_bound,
            ..
        } = self;
        if let (Encoder::Compute(enc), Some(p)) = (&*encoder, compute.as_ref()) {
            if compute_bound.update(p.id()) {
                driver.set_compute_pipeline(enc, &p.raw);
            }
        }
    }

    fn open_blit(&mut self, what: &str) {
        if matches!(self.encoder, Encoder::Blit(_)) {
            return;
        }
        self.close_encoder();
        let enc = self.driver.blit_encoder(Self::native(&self.native, what));
        self.encoder = Encoder::Blit(enc);
    }

    fn bind_pipeline(&mut self) {
        let Self {
            driver,
            encoder,
            pipeline,
            pipeline_bound,
            ..
        } = self;
        if let (Encoder::Draw(enc), Some(p)) = (&*encoder, pipeline.as_ref()) {
            if pipeline_bound.update(p.id()) {
                driver.set_render_pipeline(enc, &p.raw);
            }
        }
    }

    fn bind_vertex_buffer(&mut self, vbo: &MtBuffer<D::Buffer>) {
        let Self {
            driver,
            encoder,
            pipeline,
            vbo: cache,
            ..
        } = self;
        if let (Encoder::Draw(enc), Some(p)) = (&*encoder, pipeline.as_ref()) {
            if cache.update(vbo.id()) {
                driver.set_render_buffer(enc, RenderStage::Vertex, p.layout.vbo_index(), &vbo.raw, 0);
            }
        }
    }

    fn flush_graphics(&mut self) {
        let Self {
            driver,
            encoder,
            pipeline,
            binds,
            ..
        } = self;
        let (Encoder::Draw(enc), Some(p)) = (&*encoder, pipeline.as_ref()) else {
            return;
        };
        let layout = &p.layout;

        if let (Some(bytes), Some(push)) = (binds.push.take_dirty(), layout.push()) {
            for stage in RENDER_STAGES {
                if let Some(index) = push.render_index(stage) {
                    driver.set_render_bytes(enc, stage, index, bytes);
                }
            }
        }

        if let Some(set) = binds.uniforms.take_changed() {
            for (slot, entry) in set.entries() {
                let Some(bind) = layout.resolve(slot) else {
                    continue;
                };
                check_entry(layout, slot, entry);
                for stage in RENDER_STAGES {
                    let Some(index) = bind.render_index(stage) else {
                        continue;
                    };
                    match entry {
                        MtDescEntry::Buffer { buf, offset } => {
                            driver.set_render_buffer(enc, stage, index, buf, *offset)
                        }
                        MtDescEntry::Texture { tex, sampler } => {
                            let sampler = bind.render_sampler(stage).zip(sampler.as_ref());
                            driver.set_render_texture(enc, stage, index, tex, sampler);
                        }
                    }
                }
            }
        }
    }

    fn flush_compute(&mut self) {
        let Self {
            driver,
            encoder,
            compute,
            comp_binds,
            ..
        } = self;
        let (Encoder::Compute(enc), Some(p)) = (&*encoder, compute.as_ref()) else {
            return;
        };
        let layout = &p.layout;

        if let (Some(bytes), Some(index)) = (
            comp_binds.push.take_dirty(),
            layout.push().and_then(|push| push.cs),
        ) {
            driver.set_compute_bytes(enc, index, bytes);
        }

        if let Some(set) = comp_binds.uniforms.take_changed() {
            for (slot, entry) in set.entries() {
                let Some(bind) = layout.resolve(slot) else {
                    continue;
                };
                check_entry(layout, slot, entry);
                let Some(index) = bind.cs else {
                    continue;
                };
                match entry {
                    MtDescEntry::Buffer { buf, offset } => {
                        driver.set_compute_buffer(enc, index, buf, *offset)
                    }
                    MtDescEntry::Texture { tex, sampler } => {
                        driver.set_compute_texture(enc, index, tex, bind.cs_sampler.zip(sampler.as_ref()))
                    }
                }
            }
        }
    }

    fn stage_bytes(
        binds: &mut PendingBinds<MtDescriptorSet<D>>,
        layout: &MtPipelineLayout,
        data: &[u8],
        what: &str,
    ) {
        let push = layout
            .push()
            .unwrap_or_else(|| panic!("{}: pipeline layout has no push block", what));
        assert!(
            data.len() <= push.size as usize,
            "{}: {} bytes do not fit the {} byte push block",
            what,
            data.len(),
            push.size
        );
        binds.push.stage(data);
    }

    fn assert_selected(&self, pipeline: &MtPipeline<D::RenderPipeline>, what: &str) {
        assert!(
            self.pipeline.as_ref().map(Identity::id) == Some(pipeline.id()),
            "{}: pipeline is not bound",
            what
        );
    }

    fn assert_compute_selected(&self, pipeline: &MtCompPipeline<D::ComputePipeline>, what: &str) {
        assert!(
            self.compute.as_ref().map(Identity::id) == Some(pipeline.id()),
            "{}: pipeline is not bound",
            what
        );
    }
}

impl<D: MtlDriver> CommandBuffer<MetalApi<D>> for MtCommandBuffer<D> {
    fn begin(&mut self) -> Result<()> {
        if self.state == RecordState::Recording {
            return Err(GPUError::InvalidState);
        }
        self.clear_state();
        self.native = Some(self.driver.command_buffer()?);
        self.state = RecordState::Recording;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.state != RecordState::Recording {
            return Err(GPUError::InvalidState);
        }
        if self.pass.is_some() {
            log::warn!("end: closing a render pass that was left open");
        }
        self.close_encoder();
        self.pass = None;
        self.state = RecordState::Ended;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.close_encoder();
        self.native = None;
        self.clear_state();
        self.state = RecordState::Idle;
        Ok(())
    }

    fn state(&self) -> RecordState {
        self.state
    }

    fn encoder(&self) -> EncoderKind {
        self.encoder.kind()
    }

    fn begin_render_pass(
        &mut self,
        fbo: &MtFramebuffer<D::Framebuffer>,
        pass: &MtRenderPass<D::RenderPass>,
        width: u32,
        height: u32,
    ) {
        self.assert_recording("begin_render_pass");
        assert!(
            self.pass.is_none(),
            "begin_render_pass: a render pass is already active"
        );
        self.close_encoder();
        let viewport = self
            .binds
            .viewport
            .take()
            .unwrap_or_else(|| Rect::from_size(width, height));
        self.pass = Some(ActivePass {
            fbo: fbo.raw.clone(),
            pass: pass.raw.clone(),
            width,
            height,
            viewport,
            interrupted: false,
        });
        self.open_draw("begin_render_pass");
    }

    fn end_render_pass(&mut self) {
        self.assert_recording("end_render_pass");
        assert!(
            self.pass.is_some(),
            "end_render_pass: no render pass is active"
        );
        if matches!(self.encoder, Encoder::Draw(_)) {
            self.close_encoder();
        }
        self.pass = None;
        self.pipeline = None;
        self.pipeline_bound.invalidate();
        self.binds.pipeline_changed();
        self.vbo.invalidate();
    }

    fn set_pipeline(&mut self, pipeline: &MtPipeline<D::RenderPipeline>) {
        self.assert_recording("set_pipeline");
        assert!(
            self.pass.is_some(),
            "set_pipeline: no render pass is active"
        );
        if self.pipeline.as_ref().map(Identity::id) != Some(pipeline.id()) {
            self.pipeline = Some(pipeline.clone());
            self.binds.pipeline_changed();
            self.vbo.invalidate();
        }
        self.open_draw("set_pipeline");
        self.bind_pipeline();
    }

    fn set_compute_pipeline(&mut self, pipeline: &MtCompPipeline<D::ComputePipeline>) {
        self.assert_recording("set_compute_pipeline");
        if self.compute.as_ref().map(Identity::id) != Some(pipeline.id()) {
            self.compute = Some(pipeline.clone());
            self.comp_binds.pipeline_changed();
        }
        self.open_compute("set_compute_pipeline");
    }

    fn set_bytes(&mut self, pipeline: &MtPipeline<D::RenderPipeline>, data: &[u8]) {
        self.assert_recording("set_bytes");
        self.assert_selected(pipeline, "set_bytes");
        Self::stage_bytes(&mut self.binds, &pipeline.layout, data, "set_bytes");
    }

    fn set_compute_bytes(&mut self, pipeline: &MtCompPipeline<D::ComputePipeline>, data: &[u8]) {
        self.assert_recording("set_compute_bytes");
        self.assert_compute_selected(pipeline, "set_compute_bytes");
        Self::stage_bytes(&mut self.comp_binds, &pipeline.layout, data, "set_compute_bytes");
    }

    fn set_uniforms(&mut self, pipeline: &MtPipeline<D::RenderPipeline>, desc: &MtDescriptorSet<D>) {
        self.assert_recording("set_uniforms");
        self.assert_selected(pipeline, "set_uniforms");
        self.binds.uniforms.stage(desc);
    }

    fn set_compute_uniforms(
        &mut self,
        pipeline: &MtCompPipeline<D::ComputePipeline>,
        desc: &MtDescriptorSet<D>,
    ) {
        self.assert_recording("set_compute_uniforms");
        self.assert_compute_selected(pipeline, "set_compute_uniforms");
        self.comp_binds.uniforms.stage(desc);
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.assert_recording("set_viewport");
        let Self {
            driver,
            encoder,
            pass,
            binds,
            ..
        } = self;
        match (&*encoder, pass.as_mut()) {
            (Encoder::Draw(enc), Some(pass)) => {
                driver.set_viewport(enc, rect);
                pass.viewport = rect;
            }
            (_, Some(pass)) => pass.viewport = rect,
            _ => binds.viewport = Some(rect),
        }
    }

    fn draw(
        &mut self,
        vbo: &MtBuffer<D::Buffer>,
        offset: usize,
        vertex_count: usize,
        first_instance: usize,
        instance_count: usize,
    ) {
        self.assert_recording("draw");
        self.open_draw("draw");
        let topology = self
            .pipeline
            .as_ref()
            .map(|p| p.topology)
            .unwrap_or_else(|| panic!("draw: no pipeline is bound"));

        self.flush_graphics();
        self.bind_vertex_buffer(vbo);
        if let Encoder::Draw(enc) = &self.encoder {
            self.driver.draw(
                enc,
                topology,
                to_u32(offset, "vertex offset"),
                to_u32(vertex_count, "vertex count"),
                to_u32(first_instance, "first instance"),
                to_u32(instance_count, "instance count"),
            );
        }
    }

    fn draw_indexed(
        &mut self,
        vbo: &MtBuffer<D::Buffer>,
        ibo: &MtBuffer<D::Buffer>,
        cls: IndexClass,
        ioffset: usize,
        isize: usize,
        voffset: usize,
        first_instance: usize,
        instance_count: usize,
    ) {
        self.assert_recording("draw_indexed");
        self.open_draw("draw_indexed");
        let topology = self
            .pipeline
            .as_ref()
            .map(|p| p.topology)
            .unwrap_or_else(|| panic!("draw_indexed: no pipeline is bound"));
        let base_vertex = i32::try_from(voffset)
            .unwrap_or_else(|_| panic!("draw_indexed: vertex offset {} is too large", voffset));

        self.flush_graphics();
        self.bind_vertex_buffer(vbo);
        if let Encoder::Draw(enc) = &self.encoder {
            self.driver.draw_indexed(
                enc,
                topology,
                &ibo.raw,
                cls.into(),
                to_u32(isize, "index count"),
                ioffset * cls.element_size(),
                base_vertex,
                to_u32(first_instance, "first instance"),
                to_u32(instance_count, "instance count"),
            );
        }
    }

    fn dispatch(&mut self, x: usize, y: usize, z: usize) {
        self.assert_recording("dispatch");
        let workgroup = self
            .compute
            .as_ref()
            .map(|p| p.workgroup)
            .unwrap_or_else(|| panic!("dispatch: no compute pipeline is bound"));
        let groups = [
            to_u32(x, "group count"),
            to_u32(y, "group count"),
            to_u32(z, "group count"),
        ];
        if !self.props.validate_dispatch(groups, workgroup) {
            return;
        }

        self.open_compute("dispatch");
        self.flush_compute();
        if let Encoder::Compute(enc) = &self.encoder {
            self.driver.dispatch(enc, groups, workgroup);
        }
    }

    fn generate_mipmap(
        &mut self,
        image: &MtTexture<D::Texture>,
        layout: TextureLayout,
        width: u32,
        height: u32,
        mip_levels: u32,
    ) {
        self.assert_recording("generate_mipmap");
        assert!(
            layout != TextureLayout::Undefined,
            "generate_mipmap: target layout must be defined"
        );
        self.open_blit("generate_mipmap");
        if let Encoder::Blit(enc) = &self.encoder {
            for level in 1..mip_levels {
                self.driver.blit_mip_level(
                    enc,
                    &image.raw,
                    level - 1,
                    mip_extent(width, height, level - 1),
                    level,
                    mip_extent(width, height, level),
                );
            }
        }
        self.close_encoder();
    }

    fn copy(
        &mut self,
        dest: &MtBuffer<D::Buffer>,
        _layout: TextureLayout,
        width: u32,
        height: u32,
        mip: u32,
        src: &MtTexture<D::Texture>,
        offset: usize,
    ) {
        self.assert_recording("copy");
        let bpp = src.format.bytes_per_pixel() as u64;
        let needed = (width as u64 * bpp)
            .checked_mul(height as u64)
            .and_then(|image| image.checked_add(offset as u64))
            .unwrap_or(u64::MAX);
        assert!(
            needed <= dest.size,
            "copy: {} bytes do not fit a {} byte buffer",
            needed,
            dest.size
        );
        let row = width as usize * bpp as usize;
        let image = row * height as usize;
        self.open_blit("copy");
        if let Encoder::Blit(enc) = &self.encoder {
            self.driver.copy_texture_to_buffer(
                enc,
                &src.raw,
                mip,
                (width, height),
                &dest.raw,
                offset,
                row,
                image,
            );
        }
        self.close_encoder();
    }

    fn change_buffer_layout(&mut self, _buf: &MtBuffer<D::Buffer>, _prev: BufferLayout, _next: BufferLayout) {
        // Metal tracks hazards on its own.
        self.assert_recording("change_buffer_layout");
    }

    fn change_texture_layout(
        &mut self,
        _tex: &MtTexture<D::Texture>,
        _prev: TextureLayout,
        next: TextureLayout,
        _by_region: bool,
    ) {
        self.assert_recording("change_texture_layout");
        assert!(
            next != TextureLayout::Undefined,
            "change_texture_layout: cannot transition to Undefined"
        );
    }
}
