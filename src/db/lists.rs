//! Lists, folders and teams.

use super::{
    Database,
    collections::{FOLDERS, LISTS, TEAMS},
};
use crate::types::{Folder, List, Team};
use anyhow::Result;

impl Database {
    pub fn get_list(&self, list_id: &str) -> Result<Option<List>> {
        self.get_document(LISTS, list_id)
    }

    pub fn upsert_list(&self, list: &List) -> Result<()> {
        self.upsert_document(LISTS, &list.id, list)
    }

    /// Returns whether the list was inserted.
    pub fn insert_list_if_not_exists(&self, list: &List) -> Result<bool> {
        self.upsert_document_if_not_exists(LISTS, &list.id, list)
    }

    pub fn get_folder(&self, folder_id: &str) -> Result<Option<Folder>> {
        self.get_document(FOLDERS, folder_id)
    }

    pub fn upsert_folder(&self, folder: &Folder) -> Result<()> {
        self.upsert_document(FOLDERS, &folder.id, folder)
    }

    pub fn insert_folder_if_not_exists(&self, folder: &Folder) -> Result<bool> {
        self.upsert_document_if_not_exists(FOLDERS, &folder.id, folder)
    }

    pub fn get_team(&self, team_id: &str) -> Result<Option<Team>> {
        self.get_document(TEAMS, team_id)
    }

    pub fn upsert_team(&self, team: &Team) -> Result<()> {
        self.upsert_document(TEAMS, &team.id, team)
    }
}
