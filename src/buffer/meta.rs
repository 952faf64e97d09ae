//! Metadata attached to buffers.

use bitflags::bitflags;

bitflags! {
    /// State of a metadata item.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MetaFlags: u32 {
        /// The metadata may not be changed.
        const READONLY = 1 << 0;
        /// The metadata belongs to a pool and survives recycling.
        const POOLED = 1 << 1;
        /// The metadata may not be removed.
        const LOCKED = 1 << 2;
    }
}

/// A metadata item identified by its API name, such as `"video-meta"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    api: &'static str,
    flags: MetaFlags,
    fields: Vec<(&'static str, u64)>,
}

impl Meta {
    /// Create metadata for `api` with no flags.
    pub fn new(api: &'static str) -> Self {
        Self {
            api,
            flags: MetaFlags::empty(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: &'static str, value: u64) -> Self {
        self.set_field(name, value);
        self
    }

    /// API name.
    pub fn api(&self) -> &'static str {
        self.api
    }

    /// Current flags.
    pub fn flags(&self) -> MetaFlags {
        self.flags
    }

    /// Add `flags`.
    pub fn set_flags(&mut self, flags: MetaFlags) {
        self.flags.insert(flags);
    }

    /// Remove `flags`.
    pub fn unset_flags(&mut self, flags: MetaFlags) {
        self.flags.remove(flags);
    }

    /// Whether the metadata survives recycling.
    pub fn is_pooled(&self) -> bool {
        self.flags.contains(MetaFlags::POOLED)
    }

    /// Whether the metadata is protected from removal.
    pub fn is_locked(&self) -> bool {
        self.flags.contains(MetaFlags::LOCKED)
    }

    /// Value of field `name`.
    pub fn field(&self, name: &str) -> Option<u64> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }

    /// Set field `name`. Ignored on read-only metadata.
    pub fn set_field(&mut self, name: &'static str, value: u64) -> bool {
        if self.flags.contains(MetaFlags::READONLY) {
            return false;
        }
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((name, value)),
        }
        true
    }
}
