//! Reconciliation and mirroring engine.

pub mod authorizer;
pub mod diff;
pub mod matcher;
pub mod mirror;
pub mod poller;
pub mod registry;

pub use authorizer::{Authorization, PendingSnapshot, TaskAuthorizer};
pub use matcher::{MatchedRules, match_rules};
pub use mirror::{MirrorTaskSyncer, SyncCounts, SyncOutcome};
pub use poller::{ChangeManager, CursorTracker, ForceSyncSummary, PassOutcome, PassSummary};
pub use registry::{MirrorRegistry, TaskRelations};
