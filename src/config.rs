//! Pool configuration.
//!
//! A configuration is a plain value: build it, hand it to
//! [`set_config`](crate::MiniObjectPool::set_config), and read back what the
//! pool actually accepted with [`get_config`](crate::MiniObjectPool::get_config).
//! Every pool kind has its own configuration type; all of them embed a
//! [`PoolConfig`] with the mandatory keys and expose it through
//! [`PoolConfiguration`].

use crate::error::{PoolError, Result};

/// Option tag asking a video pool to attach video metadata to its buffers.
pub const OPTION_VIDEO_META: &str = "video-meta";
/// Option tag asking a video pool to honor alignment parameters.
pub const OPTION_VIDEO_ALIGNMENT: &str = "video-alignment";

/// Ordered set of option tags.
///
/// Insertion order is preserved and adding a tag that is already present is
/// a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Options {
    tags: Vec<String>,
}

impl Options {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `option`, keeping the set free of duplicates.
    pub fn add(&mut self, option: &str) {
        if !self.has(option) {
            self.tags.push(option.to_string());
        }
    }

    /// Whether `option` is present.
    pub fn has(&self, option: &str) -> bool {
        self.tags.iter().any(|tag| tag == option)
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Option at `index` in insertion order.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.tags.get(index).map(String::as_str)
    }

    /// Iterate over the options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for Options {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut options = Options::new();
        for option in iter {
            options.add(option);
        }
        options
    }
}

/// Mandatory pool parameters shared by every pool kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PoolConfig {
    /// Objects preallocated when the pool is activated
    pub min_objects: u32,
    /// Upper bound on allocated objects (0 = unlimited)
    pub max_objects: u32,
    /// Enabled option tags
    pub options: Options,
}

impl PoolConfig {
    /// Create a configuration with the given object bounds.
    pub fn new(min_objects: u32, max_objects: u32) -> Self {
        Self {
            min_objects,
            max_objects,
            options: Options::new(),
        }
    }

    /// Read the object bounds as `(min_objects, max_objects)`.
    pub fn params(&self) -> (u32, u32) {
        (self.min_objects, self.max_objects)
    }

    /// Set the object bounds.
    pub fn set_params(&mut self, min_objects: u32, max_objects: u32) {
        self.min_objects = min_objects;
        self.max_objects = max_objects;
    }

    /// Enable `option`. Adding the same option twice has no effect.
    pub fn add_option(&mut self, option: &str) {
        self.options.add(option);
    }

    /// Builder-style [`add_option`](Self::add_option).
    pub fn with_option(mut self, option: &str) -> Self {
        self.add_option(option);
        self
    }

    /// Whether `option` is enabled.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.has(option)
    }

    /// Number of enabled options.
    pub fn n_options(&self) -> usize {
        self.options.len()
    }

    /// Enabled option at `index`.
    pub fn get_option(&self, index: usize) -> Option<&str> {
        self.options.get(index)
    }

    /// Check the object bounds.
    ///
    /// `max_objects` of 0 means unlimited; otherwise it must not be below
    /// `min_objects`.
    pub fn validate(&self) -> Result<()> {
        if self.max_objects != 0 && self.min_objects > self.max_objects {
            return Err(PoolError::bad_config(format!(
                "min_objects {} > max_objects {}",
                self.min_objects, self.max_objects
            )));
        }
        Ok(())
    }

    /// Whether this configuration still satisfies what the caller asked for.
    ///
    /// The pool may raise `min_objects` but not lower it. `max_objects` is
    /// not compared.
    pub fn validate_params(&self, min_objects: u32, _max_objects: u32) -> bool {
        self.min_objects >= min_objects
    }
}

/// Access to the mandatory keys of a pool-kind specific configuration.
///
/// Equality is used to short-circuit `set_config` when nothing changed, so
/// implementations must compare every field.
pub trait PoolConfiguration: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// The mandatory parameters.
    fn pool(&self) -> &PoolConfig;

    /// Mutable access to the mandatory parameters.
    fn pool_mut(&mut self) -> &mut PoolConfig;
}

impl PoolConfiguration for PoolConfig {
    fn pool(&self) -> &PoolConfig {
        self
    }

    fn pool_mut(&mut self) -> &mut PoolConfig {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.params(), (0, 0));
        assert_eq!(config.n_options(), 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_add_option_is_idempotent() {
        let mut once = PoolConfig::new(1, 4);
        once.add_option(OPTION_VIDEO_META);

        let mut twice = PoolConfig::new(1, 4);
        twice.add_option(OPTION_VIDEO_META);
        twice.add_option(OPTION_VIDEO_META);

        assert_eq!(once, twice);
        assert_eq!(twice.n_options(), 1);
    }

    #[test]
    fn test_option_order_and_lookup() {
        let config = PoolConfig::new(0, 0)
            .with_option(OPTION_VIDEO_META)
            .with_option(OPTION_VIDEO_ALIGNMENT);

        assert_eq!(config.get_option(0), Some(OPTION_VIDEO_META));
        assert_eq!(config.get_option(1), Some(OPTION_VIDEO_ALIGNMENT));
        assert_eq!(config.get_option(2), None);
        assert!(config.has_option(OPTION_VIDEO_ALIGNMENT));
        assert!(!config.has_option("unknown"));
    }

    #[test]
    fn test_config_validation() {
        assert!(PoolConfig::new(2, 2).validate().is_ok());
        assert!(PoolConfig::new(8, 0).validate().is_ok());

        let err = PoolConfig::new(3, 2).validate().unwrap_err();
        assert!(matches!(err, PoolError::BadConfiguration { .. }));
    }

    #[test]
    fn test_validate_params() {
        let config = PoolConfig::new(4, 8);
        assert!(config.validate_params(4, 8));
        assert!(config.validate_params(2, 100));
        assert!(!config.validate_params(5, 8));
    }

    #[test]
    fn test_equality_covers_options() {
        let plain = PoolConfig::new(1, 2);
        let tagged = PoolConfig::new(1, 2).with_option(OPTION_VIDEO_META);
        assert_ne!(plain, tagged);
        assert_eq!(plain.clone(), plain);
    }

    #[test]
    fn test_options_from_iter_dedups() {
        let options: Options = ["a", "b", "a"].into_iter().collect();
        assert_eq!(options.len(), 2);
        assert_eq!(options.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
