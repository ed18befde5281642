use crate::auth::{CurrentUser, PasswordService, Token};
use crate::error::AppError;
use crate::ledger::BetRequest;
use crate::models::bet::Bet;
use crate::models::sport_event::{EventBets, EventChanges, NewSportEvent, SportEvent};
use crate::models::user::{NewUser, UserChanges, UserPublic};
use crate::State;
use axum::extract::Path;
use axum::{Extension, Form, Json};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use log::{debug, error, info};
use serde::Deserialize;
use validator::Validate;

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn respond<T>(context: &str, result: Result<T, AppError>) -> Result<Json<T>, AppError> {
    match result {
        Ok(res) => Ok(Json(res)),
        Err(e) => {
            if e.is_internal() {
                error!("Error {context}: {e}");
            } else {
                debug!("Rejected {context}: {e}");
            }
            Err(e)
        }
    }
}

pub async fn health_check() -> Result<Json<bool>, AppError> {
    Ok(Json(true))
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    name: String,
    surname: String,
    #[validate(email(message = "Invalid email format"))]
    email: String,
    #[validate(range(min = 19, max = 100, message = "You must be +18 years old"))]
    age: i32,
    #[validate(range(min = 0.0, message = "wallet must be a non-negative amount"))]
    wallet: f64,
    #[validate(length(min = 1, message = "password must not be empty"))]
    password: String,
}

fn register_impl(state: &State, request: RegisterRequest) -> Result<UserPublic, AppError> {
    request.validate()?;

    let new_user = NewUser {
        name: request.name,
        surname: request.surname,
        email: request.email,
        age: request.age,
        wallet: request.wallet,
        hashed_password: PasswordService::hash_password(&request.password)?,
        is_active: true,
    };
    let user = state.store.register_user(new_user)?;
    info!("Registered user {}", user.email);

    Ok(user.into())
}

pub async fn register(
    Extension(state): Extension<State>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserPublic>, AppError> {
    respond("registering user", register_impl(&state, request))
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

fn login_impl(state: &State, form: LoginForm) -> Result<Token, AppError> {
    let bad_credentials = || AppError::Unauthenticated("Incorrect email or password".to_string());

    let user = state
        .store
        .get_user(&form.username)?
        .ok_or_else(bad_credentials)?;
    if !PasswordService::verify_password(&form.password, &user.hashed_password)? {
        return Err(bad_credentials());
    }

    let user = state.store.activate_user(&user.email)?;
    state.jwt.create_token(&user.email)
}

pub async fn login(
    Extension(state): Extension<State>,
    Form(form): Form<LoginForm>,
) -> Result<Json<Token>, AppError> {
    respond("logging in", login_impl(&state, form))
}

pub async fn user_options(CurrentUser(user): CurrentUser) -> Result<Json<UserPublic>, AppError> {
    Ok(Json(user.into()))
}

#[derive(Deserialize, Validate)]
pub struct ChangeUserRequest {
    name: Option<String>,
    surname: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    email: Option<String>,
    #[validate(length(min = 1, message = "password must not be empty"))]
    password: Option<String>,
    #[validate(range(min = 0.0, message = "wallet must be a non-negative amount"))]
    wallet: Option<f64>,
}

fn change_user_values_impl(
    state: &State,
    email: &str,
    request: ChangeUserRequest,
) -> Result<UserPublic, AppError> {
    request.validate()?;
    let hashed_password = request
        .password
        .as_deref()
        .map(PasswordService::hash_password)
        .transpose()?;

    let changes = UserChanges {
        name: request.name,
        surname: request.surname,
        email: request.email,
        hashed_password,
        wallet: request.wallet,
    };
    let user = state.store.update_user(email, changes)?;

    Ok(user.into())
}

pub async fn change_user_values(
    Extension(state): Extension<State>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ChangeUserRequest>,
) -> Result<Json<UserPublic>, AppError> {
    respond(
        "updating user",
        change_user_values_impl(&state, &user.email, request),
    )
}

pub async fn list_sport_events(
    Extension(state): Extension<State>,
) -> Result<Json<Vec<SportEvent>>, AppError> {
    respond("listing events", state.store.list_upcoming_events(now()))
}

#[derive(Deserialize)]
pub struct CreateEventRequest {
    event_name: String,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    event_type: String,
    team_home: String,
    team_away: String,
}

impl CreateEventRequest {
    fn final_date(&self) -> Result<NaiveDateTime, AppError> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(self.hour, self.minute, 0))
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "{}/{}/{} {}:{} is not a valid date",
                    self.year, self.month, self.day, self.hour, self.minute
                ))
            })
    }
}

fn create_event_impl(
    state: &State,
    owner: &str,
    request: CreateEventRequest,
) -> Result<SportEvent, AppError> {
    let event_final_date = request.final_date()?;
    let new_event = NewSportEvent {
        event_name: request.event_name,
        event_final_date,
        event_type: request.event_type,
        team_home: request.team_home,
        team_away: request.team_away,
        user_email: owner.to_string(),
    };
    let event = state.store.create_event(new_event)?;
    info!("User {owner} created event {}", event.id);

    Ok(event)
}

pub async fn create_event(
    Extension(state): Extension<State>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateEventRequest>,
) -> Result<Json<SportEvent>, AppError> {
    respond(
        "creating event",
        create_event_impl(&state, &user.email, request),
    )
}

pub async fn update_sport_event(
    Extension(state): Extension<State>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i32>,
    Json(changes): Json<EventChanges>,
) -> Result<Json<SportEvent>, AppError> {
    respond(
        "updating event",
        state.store.update_event(event_id, &user.email, changes),
    )
}

pub async fn event_bets(
    Extension(state): Extension<State>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i32>,
) -> Result<Json<EventBets>, AppError> {
    respond(
        "listing event bets",
        state.store.get_event_with_bets(event_id, &user.email),
    )
}

#[derive(Deserialize)]
pub struct SettleRequest {
    home_score: i32,
    away_score: i32,
}

pub async fn settle_sport_event(
    Extension(state): Extension<State>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i32>,
    Json(request): Json<SettleRequest>,
) -> Result<Json<Vec<Bet>>, AppError> {
    let result = state.store.settle_event(
        event_id,
        &user.email,
        request.home_score,
        request.away_score,
        now(),
    );
    if let Ok(bets) = &result {
        info!("Settled event {event_id} with {} bets", bets.len());
    }
    respond("settling event", result)
}

fn new_bet_impl(state: &State, bettor: &str, request: BetRequest) -> Result<Bet, AppError> {
    let bet = state.store.place_bet(bettor, &request, now())?;
    debug!(
        "User {bettor} bet {} on event {} at odd {}",
        bet.cash, bet.sport_event_id, bet.odd
    );
    Ok(bet)
}

pub async fn new_bet(
    Extension(state): Extension<State>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<BetRequest>,
) -> Result<Json<Bet>, AppError> {
    respond("placing bet", new_bet_impl(&state, &user.email, request))
}

pub async fn my_bets(
    Extension(state): Extension<State>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Bet>>, AppError> {
    respond("listing bets", state.store.list_user_bets(&user.email))
}
