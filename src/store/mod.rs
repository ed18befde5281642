use crate::error::AppError;
use crate::ledger::BetRequest;
use crate::models;
use crate::models::bet::Bet;
use crate::models::sport_event::{EventBets, EventChanges, NewSportEvent, SportEvent};
use crate::models::user::{NewUser, User, UserChanges};
use chrono::NaiveDateTime;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;

mod memory;

pub use memory::MemoryStore;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Persistence boundary of the service.
///
/// Every method is one unit of work: multi-row changes either apply in full
/// or not at all.
pub trait Store: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    fn register_user(&self, new_user: NewUser) -> Result<User, AppError>;

    fn get_user(&self, email: &str) -> Result<Option<User>, AppError>;

    fn activate_user(&self, email: &str) -> Result<User, AppError>;

    /// A new email cascades to the user's events and bets.
    fn update_user(&self, email: &str, changes: UserChanges) -> Result<User, AppError>;

    /// Inserts the event and bumps its owner's `events_count`.
    fn create_event(&self, new_event: NewSportEvent) -> Result<SportEvent, AppError>;

    /// Unknown ids are `NotFound`, other owners are `Forbidden`.
    fn update_event(
        &self,
        event_id: i32,
        owner: &str,
        changes: EventChanges,
    ) -> Result<SportEvent, AppError>;

    /// Events ending strictly after `now`, in insertion order.
    fn list_upcoming_events(&self, now: NaiveDateTime) -> Result<Vec<SportEvent>, AppError>;

    fn get_event_with_bets(&self, event_id: i32, requester: &str) -> Result<EventBets, AppError>;

    /// Debits the stake and records the bet together with both counter
    /// increments, or changes nothing.
    fn place_bet(
        &self,
        bettor_email: &str,
        request: &BetRequest,
        now: NaiveDateTime,
    ) -> Result<Bet, AppError>;

    fn list_user_bets(&self, email: &str) -> Result<Vec<Bet>, AppError>;

    /// Records the final score and pays out winning bets. Only the owner may
    /// settle, once, and not before the event's end time.
    fn settle_event(
        &self,
        event_id: i32,
        owner: &str,
        home_score: i32,
        away_score: i32,
        now: NaiveDateTime,
    ) -> Result<Vec<Bet>, AppError>;
}

/// PostgreSQL store; every call checks a connection out of the pool and
/// returns it when done.
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

impl Store for PgStore {
    fn register_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut conn = self.db_pool.get()?;
        models::register_user(&mut conn, new_user)
    }

    fn get_user(&self, email: &str) -> Result<Option<User>, AppError> {
        let mut conn = self.db_pool.get()?;
        Ok(User::get_by_email(&mut conn, email)?)
    }

    fn activate_user(&self, email: &str) -> Result<User, AppError> {
        let mut conn = self.db_pool.get()?;
        Ok(User::set_active(&mut conn, email)?)
    }

    fn update_user(&self, email: &str, changes: UserChanges) -> Result<User, AppError> {
        let mut conn = self.db_pool.get()?;
        models::update_user(&mut conn, email, changes)
    }

    fn create_event(&self, new_event: NewSportEvent) -> Result<SportEvent, AppError> {
        let mut conn = self.db_pool.get()?;
        models::create_event(&mut conn, new_event)
    }

    fn update_event(
        &self,
        event_id: i32,
        owner: &str,
        changes: EventChanges,
    ) -> Result<SportEvent, AppError> {
        let mut conn = self.db_pool.get()?;
        models::update_event(&mut conn, event_id, owner, changes)
    }

    fn list_upcoming_events(&self, now: NaiveDateTime) -> Result<Vec<SportEvent>, AppError> {
        let mut conn = self.db_pool.get()?;
        Ok(SportEvent::get_upcoming(&mut conn, now)?)
    }

    fn get_event_with_bets(&self, event_id: i32, requester: &str) -> Result<EventBets, AppError> {
        let mut conn = self.db_pool.get()?;
        models::get_event_with_bets(&mut conn, event_id, requester)
    }

    fn place_bet(
        &self,
        bettor_email: &str,
        request: &BetRequest,
        now: NaiveDateTime,
    ) -> Result<Bet, AppError> {
        let mut conn = self.db_pool.get()?;
        models::place_bet(&mut conn, bettor_email, request, now)
    }

    fn list_user_bets(&self, email: &str) -> Result<Vec<Bet>, AppError> {
        let mut conn = self.db_pool.get()?;
        Ok(Bet::get_by_user(&mut conn, email)?)
    }

    fn settle_event(
        &self,
        event_id: i32,
        owner: &str,
        home_score: i32,
        away_score: i32,
        now: NaiveDateTime,
    ) -> Result<Vec<Bet>, AppError> {
        let mut conn = self.db_pool.get()?;
        models::settle_event(&mut conn, event_id, owner, home_score, away_score, now)
    }
}
