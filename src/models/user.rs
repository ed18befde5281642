use super::schema::users;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Queryable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(primary_key(id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub age: i32,
    pub wallet: f64,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub events_count: i32,
    pub bets_count: i32,
    pub is_active: bool,
    pub date_joined: chrono::NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub age: i32,
    pub wallet: f64,
    pub hashed_password: String,
    pub is_active: bool,
}

/// Profile fields a user may change; `None` leaves the column as is.
#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub wallet: Option<f64>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.surname.is_none()
            && self.email.is_none()
            && self.hashed_password.is_none()
            && self.wallet.is_none()
    }

    /// Applies the changes to an in-memory copy of the row.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(surname) = &self.surname {
            user.surname = surname.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(hashed_password) = &self.hashed_password {
            user.hashed_password = hashed_password.clone();
        }
        if let Some(wallet) = self.wallet {
            user.wallet = wallet;
        }
    }
}

/// What a user gets to see about their own account.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserPublic {
    pub name: String,
    pub surname: String,
    pub age: i32,
    pub email: String,
    pub wallet: f64,
    pub events_count: i32,
    pub bets_count: i32,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            surname: user.surname,
            age: user.age,
            email: user.email,
            wallet: user.wallet,
            events_count: user.events_count,
            bets_count: user.bets_count,
        }
    }
}

impl User {
    pub fn create(conn: &mut PgConnection, new_user: NewUser) -> QueryResult<Self> {
        diesel::insert_into(users::table)
            .values(new_user)
            .get_result::<Self>(conn)
    }

    pub fn get_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<Option<Self>> {
        users::table
            .filter(users::email.eq(email))
            .first::<Self>(conn)
            .optional()
    }

    /// Reads the row and holds its lock until the surrounding transaction ends.
    pub fn get_by_email_for_update(
        conn: &mut PgConnection,
        email: &str,
    ) -> QueryResult<Option<Self>> {
        users::table
            .filter(users::email.eq(email))
            .for_update()
            .first::<Self>(conn)
            .optional()
    }

    pub fn set_active(conn: &mut PgConnection, email: &str) -> QueryResult<Self> {
        diesel::update(users::table.filter(users::email.eq(email)))
            .set(users::is_active.eq(true))
            .get_result::<Self>(conn)
    }

    pub fn update(conn: &mut PgConnection, email: &str, changes: &UserChanges) -> QueryResult<Self> {
        diesel::update(users::table.filter(users::email.eq(email)))
            .set(changes)
            .get_result::<Self>(conn)
    }

    pub fn debit_for_bet(conn: &mut PgConnection, email: &str, stake: f64) -> QueryResult<Self> {
        diesel::update(users::table.filter(users::email.eq(email)))
            .set((
                users::wallet.eq(users::wallet - stake),
                users::bets_count.eq(users::bets_count + 1),
            ))
            .get_result::<Self>(conn)
    }

    pub fn credit(conn: &mut PgConnection, email: &str, amount: f64) -> QueryResult<Self> {
        diesel::update(users::table.filter(users::email.eq(email)))
            .set(users::wallet.eq(users::wallet + amount))
            .get_result::<Self>(conn)
    }

    pub fn increment_events_count(conn: &mut PgConnection, email: &str) -> QueryResult<()> {
        diesel::update(users::table.filter(users::email.eq(email)))
            .set(users::events_count.eq(users::events_count + 1))
            .execute(conn)?;
        Ok(())
    }
}
