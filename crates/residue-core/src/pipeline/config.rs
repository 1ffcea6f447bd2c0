use serde::{Deserialize, Serialize};

/// Runtime library contract for lazily hydrated objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyObjectsConfig {
    /// Global name of the runtime providing `createLazyObject` and
    /// `setLazyObjectInitializer`.
    pub runtime: String,
    /// Select every eligible object, not only those marked `lazy`.
    pub select_all: bool,
}

impl Default for LazyObjectsConfig {
    fn default() -> Self {
        Self {
            runtime: "__lazyObjectsRuntime".into(),
            select_all: false,
        }
    }
}

/// Knobs for one materialization run.
///
/// Everything is on by default except the opt-in behaviors (`simple_closures`,
/// `strict`, lazy objects). Disable individual features by name with
/// `from_disable_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Code blocks at most this many source characters long are cloned per
    /// instance instead of sharing a factory.
    pub inline_threshold: u32,
    /// Share one factory between instances of the same code block.
    pub factories: bool,
    /// Honor `delay_into` and construct such objects on first call.
    pub delay_initializations: bool,
    /// Hoist modified captured bindings into plain shared variables instead of
    /// scope slots. Only sound when every captured scope exists once.
    pub simple_closures: bool,
    /// Wrap the program in `(function () { ... }).call(this);`.
    pub wrap_iife: bool,
    /// Emit a `"use strict"` directive for the program.
    pub strict: bool,
    /// Enables the lazy materialization strategy.
    pub lazy_objects: Option<LazyObjectsConfig>,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            inline_threshold: 30,
            factories: true,
            delay_initializations: true,
            simple_closures: false,
            wrap_iife: true,
            strict: false,
            lazy_objects: None,
        }
    }
}

impl SerializerConfig {
    /// Default config with the named features turned off.
    ///
    /// Names:
    /// - `"factories"`
    /// - `"delay-initializations"`
    /// - `"iife"`
    /// - `"lazy-objects"`
    pub fn from_disable_list(disable: &[&str]) -> Self {
        let mut config = Self::default();
        config.disable(disable);
        config
    }

    /// Turn off the named features; unknown names are ignored.
    pub fn disable(&mut self, names: &[&str]) {
        for name in names {
            match *name {
                "factories" => self.factories = false,
                "delay-initializations" => self.delay_initializations = false,
                "iife" => self.wrap_iife = false,
                "lazy-objects" => self.lazy_objects = None,
                _ => {}
            }
        }
    }
}
