//! Checkpointing policy
//!
//! [`CheckpointConfig`] controls when the runner saves checkpoints, how long
//! they live, and whether they are cleaned up once a run reaches a terminal
//! state. Four presets cover the usual deployments:
//!
//! | Preset | Saves | TTL | Auto-cleanup |
//! |--------|-------|-----|--------------|
//! | [`CheckpointConfig::default`] | on HITL | 24 h | yes |
//! | [`CheckpointConfig::aggressive`] | every node + on error + on HITL | 72 h | yes |
//! | [`CheckpointConfig::minimal`] | on HITL | 1 h | yes |
//! | [`CheckpointConfig::disabled`] | never | - | no |

use chrono::Duration;

/// When and how the runner persists checkpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointConfig {
    /// Save a checkpoint when the message enters WAITING
    pub save_on_hitl: bool,

    /// Save after every N executed nodes, when set
    pub save_every_n_nodes: Option<u32>,

    /// Save a FAILED checkpoint when execution returns an error
    pub save_on_error: bool,

    /// Applied as `expires_at = now + ttl` on every save
    pub ttl: Duration,

    /// Delete the run's checkpoints once execution reaches terminal success
    pub auto_cleanup: bool,
}

impl Default for CheckpointConfig {
    /// HITL saves only, 24 hour TTL, cleanup on success
    fn default() -> Self {
        Self {
            save_on_hitl: true,
            save_every_n_nodes: None,
            save_on_error: false,
            ttl: Duration::hours(24),
            auto_cleanup: true,
        }
    }
}

impl CheckpointConfig {
    /// Save at every node and on errors; 72 hour TTL
    pub fn aggressive() -> Self {
        Self {
            save_on_hitl: true,
            save_every_n_nodes: Some(1),
            save_on_error: true,
            ttl: Duration::hours(72),
            auto_cleanup: true,
        }
    }

    /// HITL saves only with a short 1 hour TTL
    pub fn minimal() -> Self {
        Self {
            save_on_hitl: true,
            save_every_n_nodes: None,
            save_on_error: false,
            ttl: Duration::hours(1),
            auto_cleanup: true,
        }
    }

    /// No saves, no cleanup
    pub fn disabled() -> Self {
        Self {
            save_on_hitl: false,
            save_every_n_nodes: None,
            save_on_error: false,
            ttl: Duration::hours(24),
            auto_cleanup: false,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable or disable periodic saves every `n` nodes
    pub fn with_save_every_n_nodes(mut self, n: Option<u32>) -> Self {
        self.save_every_n_nodes = n;
        self
    }

    /// Enable or disable saving on errors
    pub fn with_save_on_error(mut self, save_on_error: bool) -> Self {
        self.save_on_error = save_on_error;
        self
    }

    /// Enable or disable auto-cleanup
    pub fn with_auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.auto_cleanup = auto_cleanup;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preset() {
        let config = CheckpointConfig::default();
        assert!(config.save_on_hitl);
        assert_eq!(config.save_every_n_nodes, None);
        assert!(!config.save_on_error);
        assert_eq!(config.ttl, Duration::hours(24));
        assert!(config.auto_cleanup);
    }

    #[test]
    fn test_aggressive_preset() {
        let config = CheckpointConfig::aggressive();
        assert!(config.save_on_hitl);
        assert_eq!(config.save_every_n_nodes, Some(1));
        assert!(config.save_on_error);
        assert_eq!(config.ttl, Duration::hours(72));
        assert!(config.auto_cleanup);
    }

    #[test]
    fn test_minimal_preset() {
        let config = CheckpointConfig::minimal();
        assert!(config.save_on_hitl);
        assert_eq!(config.ttl, Duration::hours(1));
        assert!(config.auto_cleanup);
    }

    #[test]
    fn test_disabled_preset() {
        let config = CheckpointConfig::disabled();
        assert!(!config.save_on_hitl);
        assert!(!config.save_on_error);
        assert_eq!(config.save_every_n_nodes, None);
        assert!(!config.auto_cleanup);
    }

    #[test]
    fn test_builder_overrides() {
        let config = CheckpointConfig::default()
            .with_ttl(Duration::minutes(5))
            .with_save_every_n_nodes(Some(3))
            .with_save_on_error(true)
            .with_auto_cleanup(false);

        assert_eq!(config.ttl, Duration::minutes(5));
        assert_eq!(config.save_every_n_nodes, Some(3));
        assert!(config.save_on_error);
        assert!(!config.auto_cleanup);
    }
}
