use super::driver::{CommandBuffer, Device};
use super::{Backend, ContextInfo, Result};

/// One command buffer and fence per frame in flight.
///
/// Recording into a frame first waits for the work last submitted from it,
/// so a buffer is never reset while the GPU still reads it. Call
/// [`wait_all`](Self::wait_all) before dropping.
pub struct FramedCommandBuffers<B: Backend> {
    cmds: Vec<B::CommandBuffer>,
    fences: Vec<B::Fence>,
    in_flight: Vec<bool>,
    curr: usize,
}

impl<B: Backend> FramedCommandBuffers<B> {
    pub fn new<D>(dev: &D, frame_count: usize) -> Result<Self>
    where
        D: Device<B> + ?Sized,
    {
        let frame_count = frame_count.max(1);
        let mut cmds = Vec::with_capacity(frame_count);
        let mut fences = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            cmds.push(dev.command_buffer()?);
            fences.push(dev.fence()?);
        }
        log::debug!("created {} frames of command buffers", frame_count);
        Ok(Self {
            cmds,
            fences,
            in_flight: vec![false; frame_count],
            curr: 0,
        })
    }

    /// A ring sized by [`ContextInfo::frames_in_flight`].
    pub fn from_info<D>(dev: &D, info: &ContextInfo) -> Result<Self>
    where
        D: Device<B> + ?Sized,
    {
        Self::new(dev, info.frames_in_flight)
    }

    /// Index of the frame the next `record` writes to.
    pub fn frame_id(&self) -> usize {
        self.curr
    }

    pub fn frame_count(&self) -> usize {
        self.cmds.len()
    }

    pub fn current(&self) -> &B::CommandBuffer {
        &self.cmds[self.curr]
    }

    fn wait_slot<D>(&mut self, dev: &D, idx: usize) -> Result<()>
    where
        D: Device<B> + ?Sized,
    {
        if std::mem::take(&mut self.in_flight[idx]) {
            dev.wait(&self.fences[idx])?;
        }
        Ok(())
    }

    fn record_slot<D, T, F>(&mut self, dev: &D, idx: usize, record_func: F) -> Result<T>
    where
        D: Device<B> + ?Sized,
        F: FnOnce(&mut B::CommandBuffer) -> T,
    {
        self.wait_slot(dev, idx)?;
        let cmd = &mut self.cmds[idx];
        cmd.reset()?;
        cmd.begin()?;
        let out = record_func(cmd);
        cmd.end()?;
        Ok(out)
    }

    /// Record the current frame. The buffer is begun before and ended after
    /// `record_func` runs.
    pub fn record<D, T, F>(&mut self, dev: &D, record_func: F) -> Result<T>
    where
        D: Device<B> + ?Sized,
        F: FnOnce(&mut B::CommandBuffer) -> T,
    {
        self.record_slot(dev, self.curr, record_func)
    }

    /// Like [`record`](Self::record), also passing the frame index.
    pub fn record_enumerated<D, T, F>(&mut self, dev: &D, record_func: F) -> Result<T>
    where
        D: Device<B> + ?Sized,
        F: FnOnce(&mut B::CommandBuffer, usize) -> T,
    {
        let idx = self.curr;
        self.record_slot(dev, idx, |cmd| record_func(cmd, idx))
    }

    /// Record every frame without advancing.
    pub fn record_all<D, F>(&mut self, dev: &D, mut record_func: F) -> Result<()>
    where
        D: Device<B> + ?Sized,
        F: FnMut(&mut B::CommandBuffer, usize),
    {
        for idx in 0..self.cmds.len() {
            self.record_slot(dev, idx, |cmd| record_func(cmd, idx))?;
        }
        Ok(())
    }

    /// Submit the current frame and move on to the next one.
    pub fn submit<D>(&mut self, dev: &D) -> Result<()>
    where
        D: Device<B> + ?Sized,
    {
        let idx = self.curr;
        dev.submit(&mut self.cmds[idx], Some(&self.fences[idx]))?;
        self.in_flight[idx] = true;
        self.curr = (self.curr + 1) % self.cmds.len();
        Ok(())
    }

    /// Wait for every frame that is still in flight.
    pub fn wait_all<D>(&mut self, dev: &D) -> Result<()>
    where
        D: Device<B> + ?Sized,
    {
        for idx in 0..self.cmds.len() {
            self.wait_slot(dev, idx)?;
        }
        Ok(())
    }
}
