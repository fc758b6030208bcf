use crate::storage::schema::{children, parents, sessions, tasks, xp_awards};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use taskxp_shared::api::TaskDto;
use taskxp_shared::auth::Role;
use taskxp_shared::domain::TaskStatus;

use super::StorageError;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = parents)]
pub struct Parent {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = parents)]
pub struct NewParent<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub phone_number: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = children)]
#[diesel(belongs_to(Parent, foreign_key = parent_id))]
pub struct Child {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub password_hash: String,
    pub xp_point: i32,
    pub parent_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = children)]
pub struct NewChild<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub phone_number: &'a str,
    pub password_hash: &'a str,
    pub parent_id: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(belongs_to(Parent, foreign_key = parent_id))]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub xp: i32,
    pub status: String,
    pub parent_id: String,
    pub created_at: NaiveDateTime,
}

impl Task {
    pub fn status(&self) -> Result<TaskStatus, StorageError> {
        self.status
            .parse()
            .map_err(|e| StorageError::Corrupt(format!("task {}: {}", self.id, e)))
    }

    pub fn into_dto(self) -> Result<TaskDto, StorageError> {
        let status = self.status()?;
        Ok(TaskDto {
            id: self.id,
            name: self.name,
            description: self.description,
            due_date: self.due_date,
            xp: self.xp,
            status,
            parent_id: self.parent_id,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub due_date: Option<NaiveDate>,
    pub xp: i32,
    pub status: &'a str,
    pub parent_id: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = xp_awards)]
#[diesel(belongs_to(Child, foreign_key = child_id))]
pub struct XpAward {
    pub id: i32,
    pub child_id: String,
    pub task_id: String,
    pub task_name: String,
    pub xp: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = xp_awards)]
pub struct NewXpAward<'a> {
    pub child_id: &'a str,
    pub task_id: &'a str,
    pub task_name: &'a str,
    pub xp: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = sessions)]
#[diesel(primary_key(jti))]
pub struct Session {
    pub jti: String,
    pub account_id: String,
    pub role: String,
    pub issued_at: NaiveDateTime,
    pub last_used_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub jti: &'a str,
    pub account_id: &'a str,
    pub role: &'a str,
}

/// Either kind of account, as the auth layer sees it.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub phone_number: String,
    pub password_hash: String,
    /// Only children accumulate XP.
    pub xp_point: Option<i32>,
}

impl From<Parent> for Account {
    fn from(p: Parent) -> Self {
        Account {
            id: p.id,
            role: Role::Parent,
            name: p.name,
            phone_number: p.phone_number,
            password_hash: p.password_hash,
            xp_point: None,
        }
    }
}

impl From<Child> for Account {
    fn from(c: Child) -> Self {
        Account {
            id: c.id,
            role: Role::Child,
            name: c.name,
            phone_number: c.phone_number,
            password_hash: c.password_hash,
            xp_point: Some(c.xp_point),
        }
    }
}
