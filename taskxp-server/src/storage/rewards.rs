use diesel::prelude::*;
use tracing::trace;

use super::accounts::child_by_id;
use super::models::{NewXpAward, XpAward};
use super::{StorageError, Store, conflict_on_unique, schema};

/// Adds `amount` to the child's balance and records it in the ledger.
///
/// Must run inside the transaction that moved the task to `completed`; the
/// ledger's unique `task_id` refuses a second credit for the same task.
pub(super) fn credit_xp(
    conn: &mut SqliteConnection,
    child_id: &str,
    amount: i32,
    task_id: &str,
    task_name: &str,
) -> Result<i32, StorageError> {
    use schema::children::dsl as c;
    if amount < 0 {
        return Err(StorageError::Validation(format!(
            "xp credit must be non-negative, got {amount}"
        )));
    }
    let current = child_by_id(conn, child_id)?
        .ok_or_else(|| StorageError::NotFound(format!("child not found: {child_id}")))?
        .xp_point;
    // SQLite would happily store past i32::MAX and diesel would read it back wrapped.
    let next = current.checked_add(amount).ok_or_else(|| {
        StorageError::Validation(format!(
            "xp balance {current} cannot take a credit of {amount}"
        ))
    })?;
    let balance = diesel::update(c::children.filter(c::id.eq(child_id)))
        .set(c::xp_point.eq(next))
        .returning(c::xp_point)
        .get_result::<i32>(conn)?;
    let award = NewXpAward {
        child_id,
        task_id,
        task_name,
        xp: amount,
    };
    diesel::insert_into(schema::xp_awards::table)
        .values(&award)
        .execute(conn)
        .map_err(|e| conflict_on_unique(e, || format!("xp already credited for task {task_id}")))?;
    trace!(child_id, task_id, amount, balance, "xp credited");
    Ok(balance)
}

impl Store {
    /// Current balance and a page of the award ledger, newest first.
    pub async fn xp_summary(
        &self,
        child: &str,
        page: usize,
        per_page: usize,
    ) -> Result<(i32, Vec<XpAward>), StorageError> {
        let child = child.to_string();
        let per_page = per_page.clamp(1, 1000) as i64;
        let offset = i64::try_from(page.max(1) - 1)
            .ok()
            .and_then(|p| p.checked_mul(per_page))
            .ok_or_else(|| StorageError::Validation(format!("page out of range: {page}")))?;
        self.interact(move |conn| {
            use schema::xp_awards::dsl as xa;
            let balance = child_by_id(conn, &child)?
                .ok_or_else(|| StorageError::NotFound(format!("child not found: {child}")))?
                .xp_point;
            let history = xa::xp_awards
                .filter(xa::child_id.eq(&child))
                .order((xa::created_at.desc(), xa::id.desc()))
                .offset(offset)
                .limit(per_page)
                .load::<XpAward>(conn)?;
            Ok((balance, history))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{account, store};
    use super::super::TaskDraft;
    use super::*;
    use taskxp_shared::auth::Role;

    #[tokio::test]
    async fn ledger_follows_completions_and_survives_deletion() {
        let t = store().await;
        let parent = account(&t.store, Role::Parent, "Pat", "555-7").await;
        let child = account(&t.store, Role::Child, "Kim", "555-7").await;

        let mut ids = Vec::new();
        for (name, xp) in [("Dishes", 3), ("Homework", 8)] {
            let task = t
                .store
                .create_task(
                    &parent,
                    TaskDraft {
                        name: Some(name.into()),
                        xp: Some(xp),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            t.store.complete_task(&task.id, &child).await.unwrap();
            ids.push(task.id);
        }
        t.store.delete_task(&ids[0]).await.unwrap();

        let (balance, history) = t.store.xp_summary(&child, 1, 10).await.unwrap();
        assert_eq!(balance, 11);
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().map(|a| a.xp).sum::<i32>(), 11);
        assert!(history.iter().any(|a| a.task_name == "Dishes"));

        let (_, first_page) = t.store.xp_summary(&child, 1, 1).await.unwrap();
        let (_, second_page) = t.store.xp_summary(&child, 2, 1).await.unwrap();
        assert_eq!(first_page.len(), 1);
        assert_eq!(second_page.len(), 1);
        assert_ne!(first_page[0].task_id, second_page[0].task_id);
    }

    #[tokio::test]
    async fn balance_never_wraps() {
        let t = store().await;
        let parent = account(&t.store, Role::Parent, "Pat", "555-8").await;
        let child = account(&t.store, Role::Child, "Kim", "555-8").await;
        let mut ids = Vec::new();
        for name in ["Big", "Bigger"] {
            let task = t
                .store
                .create_task(
                    &parent,
                    TaskDraft {
                        name: Some(name.into()),
                        xp: Some(i32::MAX),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            ids.push(task.id);
        }

        let done = t.store.complete_task(&ids[0], &child).await.unwrap();
        assert_eq!(done.xp_point, i32::MAX);
        let err = t.store.complete_task(&ids[1], &child).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)), "{err:?}");

        let (balance, history) = t.store.xp_summary(&child, 1, 10).await.unwrap();
        assert_eq!(balance, i32::MAX);
        assert_eq!(history.len(), 1);
        let task = t.store.get_task(&ids[1]).await.unwrap().unwrap();
        assert_eq!(task.status().unwrap(), taskxp_shared::domain::TaskStatus::Pending);
    }

    #[tokio::test]
    async fn huge_page_is_rejected_not_wrapped() {
        let t = store().await;
        let child = account(&t.store, Role::Child, "Kim", "555-9").await;
        let err = t
            .store
            .xp_summary(&child, usize::MAX / 2, 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)), "{err:?}");

        let (balance, history) = t.store.xp_summary(&child, 0, 0).await.unwrap();
        assert_eq!(balance, 0);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn unknown_child_has_no_summary() {
        let t = store().await;
        let err = t.store.xp_summary("ghost", 1, 10).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
