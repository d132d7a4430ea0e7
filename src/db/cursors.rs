//! Per-team fetch cursors.

use super::{Database, collections::CURSORS};
use crate::types::TeamCursor;
use anyhow::Result;

impl Database {
    pub fn get_team_cursor(&self, team_id: &str) -> Result<Option<TeamCursor>> {
        self.get_document(CURSORS, &TeamCursor::key_for(team_id))
    }

    pub fn upsert_team_cursor(&self, cursor: &TeamCursor) -> Result<()> {
        self.upsert_document(CURSORS, &cursor.key(), cursor)
    }
}
