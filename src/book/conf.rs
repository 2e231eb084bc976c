//! Per-location configuration for the book module
//!
//! One boolean directive, `mybook`, valid only inside a location block.
//! The flag is parsed and merged but currently reserved: the content
//! handler does not gate on it.

/// Tri-state directive value. `Unset` is resolved by [`BookConf::merge`]
/// before the first request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Unset,
    On,
    Off,
}

/// Directive name as it appears in a location block.
pub const DIRECTIVE_NAME: &str = "mybook";

/// Location-scoped configuration of the book module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookConf {
    pub enabled: Flag,
}

impl BookConf {
    /// Fresh configuration for a new scope, everything unset.
    pub const fn create() -> Self {
        Self {
            enabled: Flag::Unset,
        }
    }

    /// Store a parsed `mybook` flag value.
    pub fn set_enabled(&mut self, value: bool) {
        self.enabled = if value { Flag::On } else { Flag::Off };
    }

    /// Resolve unset values from the parent scope, then to the default
    /// (disabled). Called once per scope during configuration finalization;
    /// the configuration is read-only afterwards.
    pub fn merge(&mut self, parent: &Self) {
        if self.enabled == Flag::Unset {
            self.enabled = parent.enabled;
        }
        if self.enabled == Flag::Unset {
            self.enabled = Flag::Off;
        }
    }

    /// Reserved: no handler consults this yet.
    #[allow(dead_code)]
    pub const fn is_enabled(&self) -> bool {
        matches!(self.enabled, Flag::On)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_starts_unset() {
        assert_eq!(BookConf::create().enabled, Flag::Unset);
    }

    #[test]
    fn test_set_enabled() {
        let mut conf = BookConf::create();
        conf.set_enabled(true);
        assert_eq!(conf.enabled, Flag::On);
        conf.set_enabled(false);
        assert_eq!(conf.enabled, Flag::Off);
    }

    #[test]
    fn test_merge_unset_defaults_to_off() {
        let mut conf = BookConf::create();
        conf.merge(&BookConf::create());
        assert_eq!(conf.enabled, Flag::Off);
        assert!(!conf.is_enabled());
    }

    #[test]
    fn test_merge_inherits_parent_value() {
        let mut parent = BookConf::create();
        parent.set_enabled(true);

        let mut conf = BookConf::create();
        conf.merge(&parent);
        assert!(conf.is_enabled());
    }

    #[test]
    fn test_merge_keeps_explicit_value() {
        let mut parent = BookConf::create();
        parent.set_enabled(true);

        let mut conf = BookConf::create();
        conf.set_enabled(false);
        conf.merge(&parent);
        assert_eq!(conf.enabled, Flag::Off);
    }
}
