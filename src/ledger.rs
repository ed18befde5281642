//! Business rules for placing and settling bets.
//!
//! These functions only decide; the stores apply the resulting mutations
//! inside their own transaction.

use crate::error::AppError;
use crate::models::bet::{Bet, NewBet};
use crate::models::sport_event::SportEvent;
use crate::models::user::User;
use crate::odds::calculate_odd;
use chrono::NaiveDateTime;
use serde::Deserialize;
use validator::Validate;

#[derive(Deserialize, Validate, Debug, Clone, PartialEq)]
pub struct BetRequest {
    pub event_id: i32,
    #[validate(range(min = 0, message = "predicted scores must not be negative"))]
    pub team_home_score_pred: i32,
    #[validate(range(min = 0, message = "predicted scores must not be negative"))]
    pub team_away_score_pred: i32,
    #[validate(range(exclusive_min = 0.0, message = "bet amount must be a positive number"))]
    pub cash: f64,
}

/// Checks that need no stored state. Stores run this before looking anything
/// up, so a malformed request never reports a missing event.
pub fn validate_bet_request(request: &BetRequest) -> Result<(), AppError> {
    request.validate()?;
    Ok(())
}

pub fn ensure_event_open(event: &SportEvent, now: NaiveDateTime) -> Result<(), AppError> {
    if event.event_status || !event.is_upcoming(now) {
        return Err(AppError::Conflict(format!("event {} is closed", event.id)));
    }
    Ok(())
}

/// The stake has to stay strictly below the wallet.
pub fn ensure_funds(wallet: f64, stake: f64) -> Result<(), AppError> {
    if stake < wallet {
        Ok(())
    } else {
        Err(AppError::InsufficientFunds { stake, wallet })
    }
}

/// Prices an accepted bet, or says why it can't be accepted. The request has
/// already passed `validate_bet_request`.
pub fn quote_bet(
    bettor: &User,
    event: &SportEvent,
    request: &BetRequest,
    now: NaiveDateTime,
) -> Result<NewBet, AppError> {
    if bettor.email == event.user_email {
        return Err(AppError::Forbidden(format!(
            "the owner of event {} cannot bet on it",
            event.id
        )));
    }
    ensure_event_open(event, now)?;
    let odd = calculate_odd(request.team_home_score_pred, request.team_away_score_pred);
    ensure_funds(bettor.wallet, request.cash)?;

    Ok(NewBet {
        odd,
        team_home_score_pred: request.team_home_score_pred,
        team_away_score_pred: request.team_away_score_pred,
        cash: request.cash,
        user_email: bettor.email.clone(),
        sport_event_id: event.id,
    })
}

pub fn ensure_owner(event: &SportEvent, requester: &str) -> Result<(), AppError> {
    if event.user_email != requester {
        return Err(AppError::Forbidden(format!(
            "event {} belongs to another user",
            event.id
        )));
    }
    Ok(())
}

/// Results can only be recorded once the event has finished.
pub fn ensure_event_finished(event: &SportEvent, now: NaiveDateTime) -> Result<(), AppError> {
    if event.is_upcoming(now) {
        return Err(AppError::Conflict(format!(
            "event {} has not finished yet",
            event.id
        )));
    }
    Ok(())
}

pub fn validate_final_score(home_score: i32, away_score: i32) -> Result<(), AppError> {
    if home_score < 0 || away_score < 0 {
        return Err(AppError::InvalidInput(
            "final scores must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Outcome of a bet once the final score is known: `(win, earnings)`.
/// Only an exact score prediction wins, and it pays `cash * odd`.
pub fn settle_bet(bet: &Bet, home_score: i32, away_score: i32) -> (bool, f64) {
    let win = bet.team_home_score_pred == home_score && bet.team_away_score_pred == away_score;
    let earnings = if win { bet.cash * bet.odd } else { 0.0 };
    (win, earnings)
}
