//! Mirror registry: relation lookup, topology check and lifecycle.

use crate::db::{Database, now_ms};
use crate::error::RelationKeyError;
use crate::logging::Logger;
use crate::types::MirrorTask;
use anyhow::Result;
use serde_json::json;

/// Live relations of one task, by the side it takes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRelations {
    /// The task is the mirror.
    pub as_mirror: Vec<MirrorTask>,
    /// The task is the source.
    pub as_source: Vec<MirrorTask>,
    /// Destroyed relations on either side.
    pub destroyed: Vec<MirrorTask>,
}

impl TaskRelations {
    /// The task is a mirror and a source at the same time.
    pub fn is_crossed(&self) -> bool {
        !self.as_mirror.is_empty() && !self.as_source.is_empty()
    }

    /// No live relation on either side.
    pub fn is_empty(&self) -> bool {
        self.as_mirror.is_empty() && self.as_source.is_empty()
    }
}

#[derive(Clone)]
pub struct MirrorRegistry {
    db: Database,
    log: Logger,
}

impl MirrorRegistry {
    pub fn new(db: Database, log: &Logger) -> Self {
        Self {
            db,
            log: log.named("mirror_registry"),
        }
    }

    /// A record missing either task id is logged and left out.
    fn is_well_formed(&self, relation: &MirrorTask) -> bool {
        match MirrorTask::parse_key(&relation.key()) {
            Ok(_) => true,
            Err(err) => {
                let RelationKeyError(key) = err;
                self.log
                    .warning_with("Skipped a malformed mirror relation", json!({"key": key}));
                false
            }
        }
    }

    /// Union of the relations where `task_id` is either side.
    pub fn relations_for(&self, task_id: &str) -> Result<TaskRelations> {
        let mut relations = TaskRelations::default();
        let by_mirror = self.db.mirror_tasks_by_mirror(task_id)?;
        let by_source = self.db.mirror_tasks_by_source(task_id)?;

        for relation in by_mirror {
            if !self.is_well_formed(&relation) {
                continue;
            }
            if relation.destroyed {
                relations.destroyed.push(relation);
            } else {
                relations.as_mirror.push(relation);
            }
        }
        for relation in by_source {
            if !self.is_well_formed(&relation) {
                continue;
            }
            if relation.destroyed {
                relations.destroyed.push(relation);
            } else {
                relations.as_source.push(relation);
            }
        }
        Ok(relations)
    }

    /// Record a new source -> mirror relation.
    pub fn link(
        &self,
        source_task_id: &str,
        mirror_task_id: &str,
        mirror_list_id: Option<&str>,
    ) -> Result<MirrorTask> {
        let relation = MirrorTask {
            mirror_list_id: mirror_list_id.map(str::to_string),
            created_at: now_ms(),
            ..MirrorTask::new(source_task_id, mirror_task_id)
        };
        self.db.upsert_mirror_task(&relation)?;
        self.log.info_with(
            "Linked mirror task",
            json!({"key": relation.key(), "mirror_list_id": relation.mirror_list_id}),
        );
        Ok(relation)
    }

    /// Soft-delete: stores a destroyed copy of `relation` with the reason.
    pub fn destroy(&self, relation: &MirrorTask, reason: &str) -> Result<MirrorTask> {
        let destroyed = MirrorTask {
            destroyed: true,
            destroyed_at: Some(now_ms()),
            destroyed_reason: Some(reason.to_string()),
            ..relation.clone()
        };
        self.db.upsert_mirror_task(&destroyed)?;
        self.log.info_with(
            "Unlinked mirror task",
            json!({"key": destroyed.key(), "reason": reason}),
        );
        Ok(destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MirrorRegistry {
        MirrorRegistry::new(Database::open_in_memory().unwrap(), &Logger::new())
    }

    #[test]
    fn test_relations_split_by_side() {
        let reg = registry();
        reg.link("a", "b", Some("L")).unwrap();
        reg.link("b", "c", None).unwrap();

        let rel = reg.relations_for("b").unwrap();
        assert_eq!(rel.as_mirror.len(), 1);
        assert_eq!(rel.as_source.len(), 1);
        assert!(rel.is_crossed());

        let rel = reg.relations_for("a").unwrap();
        assert_eq!(rel.as_source[0].mirror_list_id.as_deref(), Some("L"));
        assert!(!rel.is_crossed());
    }

    #[test]
    fn test_destroy_is_soft() {
        let reg = registry();
        let relation = reg.link("a", "b", None).unwrap();
        let destroyed = reg.destroy(&relation, "mirror archived/hidden").unwrap();
        assert!(!relation.destroyed);
        assert!(destroyed.destroyed);

        let stored = reg.db.get_mirror_task("src:a:dst:b").unwrap().unwrap();
        assert_eq!(stored.destroyed_reason.as_deref(), Some("mirror archived/hidden"));
        assert!(stored.destroyed_at.is_some());

        let rel = reg.relations_for("a").unwrap();
        assert!(rel.is_empty());
        assert_eq!(rel.destroyed.len(), 1);
    }

    #[test]
    fn test_relation_without_mirror_id_is_skipped() {
        let reg = registry();
        reg.db
            .upsert_document(
                crate::db::collections::MIRROR_TASKS,
                "src:a:dst:",
                &MirrorTask::new("a", ""),
            )
            .unwrap();
        reg.link("a", "b", None).unwrap();

        let rel = reg.relations_for("a").unwrap();
        assert_eq!(rel.as_source.len(), 1);
        assert_eq!(rel.as_source[0].mirror_task_id, "b");
    }
}
