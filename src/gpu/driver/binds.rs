//! Deferred binding state.
//!
//! Push bytes, descriptor sets and the viewport are staged by the recording
//! API and diffed against what the native encoder already has just before a
//! draw or dispatch. Vertex and index buffers use the same identity cache.

use super::types::{Identity, Rect, ResourceId};

/// Identity of whatever is currently bound natively at one binding point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BindCache {
    bound: Option<ResourceId>,
}

impl BindCache {
    /// Records `id` as bound. Returns `true` when a native bind is needed.
    pub fn update(&mut self, id: ResourceId) -> bool {
        if self.bound == Some(id) {
            return false;
        }
        self.bound = Some(id);
        true
    }

    pub fn bound(&self) -> Option<ResourceId> {
        self.bound
    }

    /// Forget the native binding, e.g. after the encoder that held it closed.
    pub fn invalidate(&mut self) {
        self.bound = None;
    }
}

/// A value waiting to be applied at the next flush.
#[derive(Debug, Clone)]
pub struct Staged<T> {
    value: Option<T>,
    cache: BindCache,
}

impl<T> Default for Staged<T> {
    fn default() -> Self {
        Self {
            value: None,
            cache: BindCache::default(),
        }
    }
}

impl<T: Identity + Clone> Staged<T> {
    pub fn stage(&mut self, value: &T) {
        self.value = Some(value.clone());
    }

    pub fn staged(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The staged value if it differs from the one applied last.
    pub fn take_changed(&mut self) -> Option<&T> {
        let value = self.value.as_ref()?;
        if self.cache.update(value.id()) {
            Some(value)
        } else {
            None
        }
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn clear(&mut self) {
        self.value = None;
        self.cache.invalidate();
    }
}

#[derive(Debug, Clone, Default)]
pub struct PushBytes {
    data: Vec<u8>,
    dirty: bool,
}

impl PushBytes {
    pub fn stage(&mut self, data: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(data);
        self.dirty = true;
    }

    /// Staged bytes, if they have not been applied yet.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if !self.dirty || self.data.is_empty() {
            return None;
        }
        self.dirty = false;
        Some(&self.data)
    }

    /// Re-apply the current bytes at the next flush.
    pub fn touch(&mut self) {
        self.dirty = !self.data.is_empty();
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.dirty = false;
    }
}

/// Everything a command buffer applies lazily. `U` is the backend's
/// descriptor set type.
#[derive(Debug, Clone)]
pub struct PendingBinds<U> {
    pub uniforms: Staged<U>,
    pub push: PushBytes,
    pub viewport: Option<Rect>,
}

impl<U> Default for PendingBinds<U> {
    fn default() -> Self {
        Self {
            uniforms: Staged::default(),
            push: PushBytes::default(),
            viewport: None,
        }
    }
}

impl<U: Identity + Clone> PendingBinds<U> {
    /// Staged resources belong to the pipeline they were set for.
    pub fn pipeline_changed(&mut self) {
        self.uniforms.clear();
        self.push.clear();
    }

    /// The same pipeline continues on a fresh native encoder, which starts
    /// with nothing bound.
    pub fn encoder_reopened(&mut self) {
        self.uniforms.invalidate();
        self.push.touch();
    }

    pub fn clear(&mut self) {
        self.uniforms.clear();
        self.push.clear();
        self.viewport = None;
    }
}
