use crate::error::AppError;
use crate::ledger::{self, BetRequest};
use crate::models::bet::Bet;
use crate::models::sport_event::{EventBets, EventChanges, NewSportEvent, SportEvent};
use crate::models::user::{NewUser, User, UserChanges};
use chrono::NaiveDateTime;
use diesel::{Connection, PgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations};

pub mod bet;
mod schema;
pub mod sport_event;
pub mod user;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn register_user(conn: &mut PgConnection, new_user: NewUser) -> Result<User, AppError> {
    conn.transaction(|conn| {
        if User::get_by_email(conn, &new_user.email)?.is_some() {
            return Err(AppError::Conflict(
                "This email has been used before".to_string(),
            ));
        }
        Ok(User::create(conn, new_user)?)
    })
}

pub fn update_user(
    conn: &mut PgConnection,
    email: &str,
    changes: UserChanges,
) -> Result<User, AppError> {
    conn.transaction(|conn| {
        let user = User::get_by_email_for_update(conn, email)?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;
        if changes.is_empty() {
            return Ok(user);
        }
        if let Some(new_email) = changes.email.as_deref() {
            if new_email != email && User::get_by_email(conn, new_email)?.is_some() {
                return Err(AppError::Conflict(
                    "This email has been used before".to_string(),
                ));
            }
        }
        Ok(User::update(conn, email, &changes)?)
    })
}

pub fn create_event(
    conn: &mut PgConnection,
    new_event: NewSportEvent,
) -> Result<SportEvent, AppError> {
    conn.transaction(|conn| {
        let owner = User::get_by_email_for_update(conn, &new_event.user_email)?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;
        if !owner.is_active {
            return Err(AppError::Forbidden("Inactive user".to_string()));
        }
        let event = SportEvent::create(conn, new_event)?;
        User::increment_events_count(conn, &owner.email)?;
        Ok(event)
    })
}

pub fn update_event(
    conn: &mut PgConnection,
    event_id: i32,
    owner: &str,
    changes: EventChanges,
) -> Result<SportEvent, AppError> {
    conn.transaction(|conn| {
        let event = SportEvent::get_by_id_for_update(conn, event_id)?
            .ok_or_else(|| AppError::NotFound("SportEvent".to_string()))?;
        ledger::ensure_owner(&event, owner)?;
        if changes.is_empty() {
            return Ok(event);
        }
        Ok(SportEvent::update(conn, event_id, &changes)?)
    })
}

pub fn get_event_with_bets(
    conn: &mut PgConnection,
    event_id: i32,
    requester: &str,
) -> Result<EventBets, AppError> {
    let event = SportEvent::get_by_id(conn, event_id)?
        .ok_or_else(|| AppError::NotFound("SportEvent".to_string()))?;
    ledger::ensure_owner(&event, requester)?;
    let bets = Bet::get_by_event(conn, &event)?;
    Ok(EventBets { event, bets })
}

/// Places a bet in one transaction: the event and bettor rows stay locked from
/// the balance check until the debit, insert and counter updates commit.
pub fn place_bet(
    conn: &mut PgConnection,
    bettor_email: &str,
    request: &BetRequest,
    now: NaiveDateTime,
) -> Result<Bet, AppError> {
    ledger::validate_bet_request(request)?;
    conn.transaction(|conn| {
        let event = SportEvent::get_by_id_for_update(conn, request.event_id)?
            .ok_or_else(|| AppError::NotFound("SportEvent".to_string()))?;
        let bettor = User::get_by_email_for_update(conn, bettor_email)?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let new_bet = ledger::quote_bet(&bettor, &event, request, now)?;
        User::debit_for_bet(conn, &bettor.email, new_bet.cash)?;
        SportEvent::increment_bets_count(conn, event.id)?;
        let bet = Bet::create(conn, new_bet)?;
        Ok(bet)
    })
}

pub fn settle_event(
    conn: &mut PgConnection,
    event_id: i32,
    owner: &str,
    home_score: i32,
    away_score: i32,
    now: NaiveDateTime,
) -> Result<Vec<Bet>, AppError> {
    ledger::validate_final_score(home_score, away_score)?;
    conn.transaction(|conn| {
        let event = SportEvent::get_by_id_for_update(conn, event_id)?
            .ok_or_else(|| AppError::NotFound("SportEvent".to_string()))?;
        ledger::ensure_owner(&event, owner)?;
        if event.event_status {
            return Err(AppError::Conflict(format!(
                "event {event_id} is already settled"
            )));
        }
        ledger::ensure_event_finished(&event, now)?;
        let event = SportEvent::set_final_score(conn, event_id, home_score, away_score)?;

        let mut bets = Bet::get_by_event(conn, &event)?;
        // credit in email order so concurrent settlements lock wallets alike
        bets.sort_by(|a, b| a.user_email.cmp(&b.user_email).then(a.id.cmp(&b.id)));
        let mut settled = Vec::with_capacity(bets.len());
        for bet in bets {
            let (win, earnings) = ledger::settle_bet(&bet, home_score, away_score);
            if win {
                User::credit(conn, &bet.user_email, earnings)?;
            }
            settled.push(Bet::set_result(conn, bet.id, win, earnings)?);
        }
        settled.sort_by_key(|b| b.id);
        Ok(settled)
    })
}
