use chrono::NaiveDate;
use diesel::prelude::*;
use taskxp_shared::domain::{TaskAction, TaskStatus, TransitionError};
use tracing::trace;

use super::accounts::{child_by_id, owning_parent};
use super::models::{NewTask, Task};
use super::{StorageError, Store, required, rewards, schema};

/// Fields a parent supplies when creating a task. Everything is optional here
/// so that validation happens in one place.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub xp: Option<i32>,
}

/// Result of a successful `complete`.
#[derive(Debug, Clone)]
pub struct Completion {
    pub task: Task,
    /// Child's balance after the credit.
    pub xp_point: i32,
}

impl Store {
    pub async fn create_task(
        &self,
        owner_parent_id: &str,
        draft: TaskDraft,
    ) -> Result<Task, StorageError> {
        let name = required("task name", draft.name.as_deref())?;
        let xp = match draft.xp {
            Some(v) if v > 0 => v,
            Some(_) => return Err(StorageError::Validation("xp must be positive".into())),
            None => return Err(StorageError::Validation("xp is required".into())),
        };
        let description = draft.description.unwrap_or_default();
        let due_date = draft.due_date;
        let owner = owner_parent_id.to_string();
        let new_id = uuid::Uuid::new_v4().to_string();
        self.interact(move |conn| {
            use schema::parents::dsl as p;
            let owner_exists: i64 = p::parents
                .filter(p::id.eq(&owner))
                .count()
                .get_result(conn)?;
            if owner_exists == 0 {
                return Err(StorageError::NotFound(format!(
                    "parent not found: {owner}"
                )));
            }
            let row = NewTask {
                id: &new_id,
                name: &name,
                description: &description,
                due_date,
                xp,
                status: TaskStatus::Pending.as_str(),
                parent_id: &owner,
            };
            let task = diesel::insert_into(schema::tasks::table)
                .values(&row)
                .get_result::<Task>(conn)?;
            trace!(task_id = %task.id, parent_id = %owner, xp, "task created");
            Ok(task)
        })
        .await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>, StorageError> {
        let tid = task_id.to_string();
        self.interact(move |conn| task_by_id(conn, &tid)).await
    }

    /// Removes a task in any status. Returns whether a row existed; a missing
    /// id is not an error. Credited XP stays credited.
    pub async fn delete_task(&self, task_id: &str) -> Result<bool, StorageError> {
        use schema::tasks::dsl as t;
        let tid = task_id.to_string();
        self.interact(move |conn| {
            let deleted = diesel::delete(t::tasks.filter(t::id.eq(&tid))).execute(conn)?;
            trace!(task_id = %tid, deleted, "delete_task");
            Ok(deleted > 0)
        })
        .await
    }

    pub async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, StorageError> {
        use schema::tasks::dsl as t;
        self.interact(move |conn| {
            Ok(t::tasks
                .filter(t::status.eq(status.as_str()))
                .order((t::created_at.asc(), t::id.asc()))
                .load::<Task>(conn)?)
        })
        .await
    }

    /// Tasks owned by the child's parent (see [`owning_parent`]).
    pub async fn list_tasks_for_child(&self, child_id: &str) -> Result<Vec<Task>, StorageError> {
        use schema::tasks::dsl as t;
        let cid = child_id.to_string();
        self.interact(move |conn| {
            let child = child_by_id(conn, &cid)?
                .ok_or_else(|| StorageError::NotFound(format!("child not found: {cid}")))?;
            let parent_id = owning_parent(conn, &child)?;
            Ok(t::tasks
                .filter(t::parent_id.eq(&parent_id))
                .order((t::created_at.asc(), t::id.asc()))
                .load::<Task>(conn)?)
        })
        .await
    }

    /// `pending -> completed`, crediting the task's XP to `child_id`.
    ///
    /// Status change and credit commit together or not at all.
    pub async fn complete_task(
        &self,
        task_id: &str,
        child_id: &str,
    ) -> Result<Completion, StorageError> {
        let cid = required("child id", Some(child_id))?;
        let tid = task_id.to_string();
        self.interact(move |conn| {
            conn.immediate_transaction(|conn| -> Result<Completion, StorageError> {
                let task = advance(conn, &tid, TaskAction::Complete)?;
                let xp_point = rewards::credit_xp(conn, &cid, task.xp, &task.id, &task.name)?;
                trace!(task_id = %task.id, child_id = %cid, xp = task.xp, xp_point, "task completed");
                Ok(Completion { task, xp_point })
            })
        })
        .await
    }

    /// `completed -> reviewed`. No balance change.
    pub async fn review_task(&self, task_id: &str) -> Result<Task, StorageError> {
        let tid = task_id.to_string();
        self.interact(move |conn| {
            conn.immediate_transaction(|conn| -> Result<Task, StorageError> {
                advance(conn, &tid, TaskAction::Review)
            })
        })
        .await
    }
}

fn task_by_id(conn: &mut SqliteConnection, task_id: &str) -> Result<Option<Task>, StorageError> {
    use schema::tasks::dsl as t;
    Ok(t::tasks
        .filter(t::id.eq(task_id))
        .first::<Task>(conn)
        .optional()?)
}

/// Moves a task one step along the transition table, guarded by a
/// compare-and-set on the status it was read with.
fn advance(
    conn: &mut SqliteConnection,
    task_id: &str,
    action: TaskAction,
) -> Result<Task, StorageError> {
    use schema::tasks::dsl as t;
    let current = task_by_id(conn, task_id)?
        .ok_or_else(|| StorageError::NotFound(format!("task not found: {task_id}")))?;
    let from = current.status()?;
    let to = from.apply(action)?;
    let updated = diesel::update(
        t::tasks
            .filter(t::id.eq(task_id))
            .filter(t::status.eq(from.as_str())),
    )
    .set(t::status.eq(to.as_str()))
    .get_result::<Task>(conn)
    .optional()?;
    match updated {
        Some(task) => Ok(task),
        None => {
            // Lost the race: report against whatever status won.
            let now = match task_by_id(conn, task_id)? {
                Some(row) => row.status()?,
                None => {
                    return Err(StorageError::NotFound(format!(
                        "task not found: {task_id}"
                    )));
                }
            };
            Err(TransitionError { from: now, action }.into())
        }
    }
}
