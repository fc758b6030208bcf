use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use taskxp_shared::auth::Role;

use super::models::{NewSession, Session};
use super::{StorageError, Store, schema};

// Session rows back the JWT inactivity window and logout.
impl Store {
    pub async fn create_session(
        &self,
        jti: &str,
        account_id: &str,
        role: Role,
    ) -> Result<(), StorageError> {
        let jti = jti.to_string();
        let account_id = account_id.to_string();
        self.interact(move |conn| {
            let row = NewSession {
                jti: &jti,
                account_id: &account_id,
                role: role.as_str(),
            };
            diesel::insert_into(schema::sessions::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, jti: &str) -> Result<Option<Session>, StorageError> {
        use schema::sessions::dsl as s;
        let jti = jti.to_string();
        self.interact(move |conn| {
            Ok(s::sessions
                .filter(s::jti.eq(&jti))
                .first::<Session>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn delete_session(&self, jti: &str) -> Result<bool, StorageError> {
        use schema::sessions::dsl as s;
        let jti = jti.to_string();
        self.interact(move |conn| {
            let deleted = diesel::delete(s::sessions.filter(s::jti.eq(&jti))).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Bumps `last_used_at` unless the session went idle before `cutoff`.
    /// `false` means the session is gone or expired.
    pub async fn touch_session_with_cutoff(
        &self,
        jti: &str,
        cutoff: NaiveDateTime,
    ) -> Result<bool, StorageError> {
        use schema::sessions::dsl as s;
        let jti = jti.to_string();
        self.interact(move |conn| {
            let now = Utc::now().naive_utc();
            let updated = diesel::update(
                s::sessions
                    .filter(s::jti.eq(&jti))
                    .filter(s::last_used_at.ge(cutoff)),
            )
            .set(s::last_used_at.eq(now))
            .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::store;
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn touch_respects_cutoff_and_delete() {
        let t = store().await;
        t.store
            .create_session("jti-1", "acc-1", Role::Child)
            .await
            .unwrap();
        let row = t.store.get_session("jti-1").await.unwrap().unwrap();
        assert_eq!(row.account_id, "acc-1");
        assert_eq!(row.role, "child");

        let past = (Utc::now() - Duration::days(1)).naive_utc();
        let future = (Utc::now() + Duration::days(1)).naive_utc();
        assert!(t.store.touch_session_with_cutoff("jti-1", past).await.unwrap());
        assert!(!t.store.touch_session_with_cutoff("jti-1", future).await.unwrap());

        assert!(t.store.delete_session("jti-1").await.unwrap());
        assert!(!t.store.touch_session_with_cutoff("jti-1", past).await.unwrap());
        assert!(t.store.get_session("jti-1").await.unwrap().is_none());
    }
}
