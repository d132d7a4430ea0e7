//! Workspace members.

use super::{Database, collections::MEMBERS};
use crate::types::Member;
use anyhow::Result;

impl Database {
    pub fn get_member(&self, member_id: &str) -> Result<Option<Member>> {
        self.get_document(MEMBERS, member_id)
    }

    /// Stores the member with its email lower-cased.
    pub fn upsert_member(&self, member: &Member) -> Result<()> {
        let mut member = member.clone();
        member.email = member.email.to_lowercase();
        self.upsert_document(MEMBERS, &member.id, &member)
    }

    /// Members matching `email` case-insensitively, ordered by id.
    pub fn members_by_email(&self, email: &str) -> Result<Vec<Member>> {
        self.query_documents_where_equals(MEMBERS, "email", &email.trim().to_lowercase())
    }

    /// Stored members for the given ids; absent ids are skipped.
    pub fn members_by_ids(&self, ids: &[String]) -> Result<Vec<Member>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(member) = self.get_member(id)? {
                found.push(member);
            }
        }
        Ok(found)
    }
}
