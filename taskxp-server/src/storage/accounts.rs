use diesel::prelude::*;
use taskxp_shared::auth::Role;
use tracing::trace;

use super::models::{Account, Child, NewChild, NewParent, Parent};
use super::{StorageError, Store, conflict_on_unique, required, schema};

impl Store {
    /// Inserts a parent or child and returns its new id.
    ///
    /// Children are linked to the parent registered under the same phone
    /// number; a new parent adopts any still-unlinked children with its phone.
    pub async fn create_account(
        &self,
        role: Role,
        name: &str,
        phone: &str,
        password_hash: &str,
    ) -> Result<String, StorageError> {
        let name = required("name", Some(name))?;
        let phone = required("phone", Some(phone))?;
        let hash = required("password", Some(password_hash))?;
        let new_id = uuid::Uuid::new_v4().to_string();
        trace!(%role, phone = %phone, "create_account starting");
        self.interact(move |conn| {
            conn.immediate_transaction(|conn| -> Result<(), StorageError> {
                let taken = || format!("phone number already registered: {phone}");
                match role {
                    Role::Parent => {
                        use schema::children::dsl as c;
                        let row = NewParent {
                            id: &new_id,
                            name: &name,
                            phone_number: &phone,
                            password_hash: &hash,
                        };
                        diesel::insert_into(schema::parents::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(|e| conflict_on_unique(e, taken))?;
                        let adopted = diesel::update(
                            c::children
                                .filter(c::phone_number.eq(&phone))
                                .filter(c::parent_id.is_null()),
                        )
                        .set(c::parent_id.eq(Some(&new_id)))
                        .execute(conn)?;
                        trace!(parent_id = %new_id, adopted, "linked children by phone");
                    }
                    Role::Child => {
                        let parent = parent_by_phone(conn, &phone)?;
                        let row = NewChild {
                            id: &new_id,
                            name: &name,
                            phone_number: &phone,
                            password_hash: &hash,
                            parent_id: parent.as_ref().map(|p| p.id.as_str()),
                        };
                        diesel::insert_into(schema::children::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(|e| conflict_on_unique(e, taken))?;
                    }
                }
                Ok(())
            })?;
            Ok(new_id)
        })
        .await
    }

    pub async fn find_account_by_phone(
        &self,
        role: Role,
        phone: &str,
    ) -> Result<Option<Account>, StorageError> {
        let phone = phone.trim().to_string();
        self.interact(move |conn| match role {
            Role::Parent => Ok(parent_by_phone(conn, &phone)?.map(Account::from)),
            Role::Child => {
                use schema::children::dsl as c;
                Ok(c::children
                    .filter(c::phone_number.eq(&phone))
                    .first::<Child>(conn)
                    .optional()?
                    .map(Account::from))
            }
        })
        .await
    }

    pub async fn account_exists(&self, role: Role, account_id: &str) -> Result<bool, StorageError> {
        let aid = account_id.to_string();
        self.interact(move |conn| {
            let count: i64 = match role {
                Role::Parent => schema::parents::table
                    .filter(schema::parents::id.eq(&aid))
                    .count()
                    .get_result(conn)?,
                Role::Child => schema::children::table
                    .filter(schema::children::id.eq(&aid))
                    .count()
                    .get_result(conn)?,
            };
            Ok(count > 0)
        })
        .await
    }

    pub async fn get_child(&self, child_id: &str) -> Result<Option<Child>, StorageError> {
        let cid = child_id.to_string();
        self.interact(move |conn| child_by_id(conn, &cid)).await
    }
}

pub(super) fn child_by_id(
    conn: &mut SqliteConnection,
    child_id: &str,
) -> Result<Option<Child>, StorageError> {
    use schema::children::dsl as c;
    Ok(c::children
        .filter(c::id.eq(child_id))
        .first::<Child>(conn)
        .optional()?)
}

fn parent_by_phone(conn: &mut SqliteConnection, phone: &str) -> Result<Option<Parent>, StorageError> {
    use schema::parents::dsl as p;
    Ok(p::parents
        .filter(p::phone_number.eq(phone))
        .first::<Parent>(conn)
        .optional()?)
}

/// The parent whose tasks this child sees: the cached edge when present,
/// otherwise the parent sharing the child's phone number (cached on success).
pub(super) fn owning_parent(
    conn: &mut SqliteConnection,
    child: &Child,
) -> Result<String, StorageError> {
    if let Some(pid) = &child.parent_id {
        return Ok(pid.clone());
    }
    let parent = parent_by_phone(conn, &child.phone_number)?.ok_or_else(|| {
        StorageError::NotFound(format!("parent not found for child: {}", child.id))
    })?;
    use schema::children::dsl as c;
    diesel::update(c::children.filter(c::id.eq(&child.id)))
        .set(c::parent_id.eq(Some(&parent.id)))
        .execute(conn)?;
    trace!(child_id = %child.id, parent_id = %parent.id, "cached owning parent");
    Ok(parent.id)
}
