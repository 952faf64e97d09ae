//! Buffer pool configuration.

use std::fmt;
use std::sync::Arc;

use crate::buffer::{AllocationParams, Allocator};
use crate::caps::Caps;
use crate::config::{PoolConfig, PoolConfiguration, OPTION_VIDEO_ALIGNMENT, OPTION_VIDEO_META};
use crate::error::{PoolError, Result};

/// Configuration of a [`BufferPool`](super::BufferPool).
///
/// Besides the mandatory pool parameters it names the buffer payload size,
/// the media type the buffers are for, and how their memory is allocated.
/// Allocators compare by identity.
#[derive(Clone, Default)]
pub struct BufferPoolConfig {
    /// Object bounds and option tags
    pub pool: PoolConfig,
    /// Media type of the buffers; must be fixed when present
    pub caps: Option<Caps>,
    /// Payload bytes per buffer
    pub size: u32,
    /// Allocator to use instead of the system allocator
    pub allocator: Option<Arc<dyn Allocator>>,
    /// Layout of each allocated block
    pub params: AllocationParams,
}

impl BufferPoolConfig {
    /// Configuration for buffers of `size` bytes with the given bounds.
    pub fn new(caps: Option<Caps>, size: u32, min_buffers: u32, max_buffers: u32) -> Self {
        let mut config = Self::default();
        config.set_params(caps, size, min_buffers, max_buffers);
        config
    }

    /// Start building a configuration.
    pub fn builder() -> BufferPoolConfigBuilder {
        BufferPoolConfigBuilder::new()
    }

    /// Configuration for raw video frames of `frame_size` bytes.
    ///
    /// Keeps a small working set, caps the pool so a stalled sink cannot
    /// grow it without bound, aligns frame data to 16 bytes and requests
    /// video metadata.
    pub fn video_frames(caps: Caps, frame_size: u32) -> Self {
        let mut config = Self::new(Some(caps), frame_size, 2, 16);
        config.params = AllocationParams::aligned(15);
        config.add_option(OPTION_VIDEO_META);
        config.add_option(OPTION_VIDEO_ALIGNMENT);
        config
    }

    /// Configuration for audio chunks of `chunk_size` bytes. Unbounded.
    pub fn audio_chunks(caps: Caps, chunk_size: u32) -> Self {
        let mut config = Self::new(Some(caps), chunk_size, 4, 0);
        config.params = AllocationParams::aligned(7);
        config
    }

    /// Configuration for MTU-sized network packets with room for headers in
    /// front.
    pub fn network_packets() -> Self {
        let mut config = Self::new(None, 1500, 16, 256);
        config.params = AllocationParams {
            prefix: 64,
            ..AllocationParams::aligned(7)
        };
        config
    }

    /// Read `(caps, size, min_buffers, max_buffers)`.
    pub fn params(&self) -> (Option<&Caps>, u32, u32, u32) {
        (
            self.caps.as_ref(),
            self.size,
            self.pool.min_objects,
            self.pool.max_objects,
        )
    }

    /// Set caps, size and bounds.
    pub fn set_params(&mut self, caps: Option<Caps>, size: u32, min_buffers: u32, max_buffers: u32) {
        self.caps = caps;
        self.size = size;
        self.pool.set_params(min_buffers, max_buffers);
    }

    /// Read the allocator and allocation parameters.
    pub fn allocator(&self) -> (Option<&Arc<dyn Allocator>>, &AllocationParams) {
        (self.allocator.as_ref(), &self.params)
    }

    /// Set the allocator and allocation parameters.
    pub fn set_allocator(&mut self, allocator: Option<Arc<dyn Allocator>>, params: AllocationParams) {
        self.allocator = allocator;
        self.params = params;
    }

    /// Enable `option`. Adding the same option twice has no effect.
    pub fn add_option(&mut self, option: &str) {
        self.pool.add_option(option);
    }

    /// Whether `option` is enabled.
    pub fn has_option(&self, option: &str) -> bool {
        self.pool.has_option(option)
    }

    /// Number of enabled options.
    pub fn n_options(&self) -> usize {
        self.pool.n_options()
    }

    /// Enabled option at `index`.
    pub fn get_option(&self, index: usize) -> Option<&str> {
        self.pool.get_option(index)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;

        if let Some(caps) = &self.caps {
            if !caps.is_fixed() {
                return Err(PoolError::bad_config(format!("caps {caps} are not fixed")));
            }
        }

        let align_ok = self
            .params
            .align
            .checked_add(1)
            .is_some_and(usize::is_power_of_two);
        if !align_ok {
            return Err(PoolError::bad_config(format!(
                "alignment mask {:#x} is not one less than a power of two",
                self.params.align
            )));
        }

        if self.params.block_size(self.size as usize).is_none() {
            return Err(PoolError::bad_config("prefix + size + padding overflows"));
        }

        Ok(())
    }

    /// Whether this configuration still satisfies what the caller asked
    /// for: the same caps, at least `size` bytes and at least `min_buffers`.
    ///
    /// Use it after a refused `set_config` to decide whether the adjusted
    /// configuration read back from the pool is acceptable.
    pub fn validate_params(
        &self,
        caps: Option<&Caps>,
        size: u32,
        min_buffers: u32,
        max_buffers: u32,
    ) -> bool {
        self.caps.as_ref() == caps
            && self.size >= size
            && self.pool.validate_params(min_buffers, max_buffers)
    }
}

impl PartialEq for BufferPoolConfig {
    fn eq(&self, other: &Self) -> bool {
        let same_allocator = match (&self.allocator, &other.allocator) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_allocator
            && self.pool == other.pool
            && self.caps == other.caps
            && self.size == other.size
            && self.params == other.params
    }
}

impl fmt::Debug for BufferPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPoolConfig")
            .field("pool", &self.pool)
            .field("caps", &self.caps.as_ref().map(ToString::to_string))
            .field("size", &self.size)
            .field("allocator", &self.allocator.as_ref().map(|a| a.name().to_string()))
            .field("params", &self.params)
            .finish()
    }
}

impl PoolConfiguration for BufferPoolConfig {
    fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    fn pool_mut(&mut self) -> &mut PoolConfig {
        &mut self.pool
    }
}

/// Fluent construction of a [`BufferPoolConfig`].
#[derive(Debug, Default)]
pub struct BufferPoolConfigBuilder {
    config: BufferPoolConfig,
}

impl BufferPoolConfigBuilder {
    /// Create a builder with an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the caps.
    pub fn caps(mut self, caps: Caps) -> Self {
        self.config.caps = Some(caps);
        self
    }

    /// Set the payload size.
    pub fn size(mut self, size: u32) -> Self {
        self.config.size = size;
        self
    }

    /// Set the buffer bounds.
    pub fn buffers(mut self, min_buffers: u32, max_buffers: u32) -> Self {
        self.config.pool.set_params(min_buffers, max_buffers);
        self
    }

    /// Set the allocator.
    pub fn allocator(mut self, allocator: Arc<dyn Allocator>) -> Self {
        self.config.allocator = Some(allocator);
        self
    }

    /// Set the allocation parameters.
    pub fn params(mut self, params: AllocationParams) -> Self {
        self.config.params = params;
        self
    }

    /// Enable an option.
    pub fn option(mut self, option: &str) -> Self {
        self.config.add_option(option);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Result<BufferPoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SystemAllocator;
    use crate::caps::CapsValue;

    fn video_caps() -> Caps {
        Caps::builder("video/x-raw")
            .field("format", "I420")
            .field("width", 320)
            .field("height", 240)
            .build()
    }

    #[test]
    fn test_default_config() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.params(), (None, 0, 0, 0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        let video = BufferPoolConfig::video_frames(video_caps(), 115_200);
        assert!(video.validate().is_ok());
        assert!(video.has_option(OPTION_VIDEO_META));
        assert_eq!(video.params().3, 16);

        let audio = BufferPoolConfig::audio_chunks(Caps::new("audio/x-raw"), 4096);
        assert!(audio.validate().is_ok());
        assert_eq!(audio.params().3, 0);

        let packets = BufferPoolConfig::network_packets();
        assert!(packets.validate().is_ok());
        assert_eq!(packets.allocator().1.prefix, 64);
    }

    #[test]
    fn test_unfixed_caps_rejected() {
        let mut caps = video_caps();
        caps.set("width", CapsValue::IntRange { min: 16, max: 4096 });
        let config = BufferPoolConfig::new(Some(caps), 1024, 0, 0);
        assert!(matches!(
            config.validate(),
            Err(PoolError::BadConfiguration { .. })
        ));
    }

    #[test]
    fn test_bad_alignment_rejected() {
        let mut config = BufferPoolConfig::new(None, 1024, 0, 0);
        config.params = AllocationParams::aligned(6);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = BufferPoolConfig::builder()
            .caps(video_caps())
            .size(4096)
            .buffers(2, 8)
            .option(OPTION_VIDEO_META)
            .build()
            .unwrap();
        assert_eq!(config.params(), (Some(&video_caps()), 4096, 2, 8));
        assert_eq!(config.n_options(), 1);

        assert!(BufferPoolConfig::builder().buffers(4, 2).build().is_err());
    }

    #[test]
    fn test_allocator_equality_is_identity() {
        let allocator = SystemAllocator::shared();
        let mut a = BufferPoolConfig::new(None, 64, 0, 0);
        a.set_allocator(Some(Arc::clone(&allocator)), AllocationParams::default());
        let mut b = a.clone();
        assert_eq!(a, b);

        b.set_allocator(Some(SystemAllocator::shared()), AllocationParams::default());
        assert_eq!(a, b);

        let own: Arc<dyn Allocator> = Arc::new(SystemAllocator);
        b.set_allocator(Some(own), AllocationParams::default());
        assert_ne!(a, b);

        b.set_allocator(None, AllocationParams::default());
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_params() {
        let config = BufferPoolConfig::new(Some(video_caps()), 2048, 4, 8);
        assert!(config.validate_params(Some(&video_caps()), 1024, 2, 8));
        assert!(config.validate_params(Some(&video_caps()), 2048, 4, 8));
        assert!(!config.validate_params(Some(&video_caps()), 4096, 4, 8));
        assert!(!config.validate_params(Some(&video_caps()), 1024, 5, 8));
        assert!(!config.validate_params(None, 1024, 2, 8));
    }
}
