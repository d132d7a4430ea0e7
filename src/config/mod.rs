//! Configuration: process settings and mirroring rules.
//!
//! Process settings merge field by field across tiers:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `./mirror-sync/config.yaml`
//! 3. **User** - `~/.mirror-sync/config.yaml`
//! 4. **Environment** - `MIRROR_SYNC_*` variables
//!
//! `MIRROR_SYNC_CONFIG_PATH` names one file that replaces tiers 2 and 3.
//!
//! Mirroring rules live in their own YAML file, see [`rules`].

mod loader;
mod merge;
pub mod rules;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, ENV_API_TOKEN};
pub use merge::deep_merge;
pub use rules::{MirrorRule, SyncPreferences, SyncRules};
pub use types::*;
