use super::Store;
use crate::error::AppError;
use crate::ledger::{self, BetRequest};
use crate::models::bet::Bet;
use crate::models::sport_event::{EventBets, EventChanges, NewSportEvent, SportEvent};
use crate::models::user::{NewUser, User, UserChanges};
use chrono::{NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    events: BTreeMap<i32, SportEvent>,
    bets: BTreeMap<i32, Bet>,
    next_user_id: i32,
    next_event_id: i32,
    next_bet_id: i32,
}

impl Tables {
    fn user_id(&self, email: &str) -> Option<i32> {
        self.users
            .values()
            .find(|u| u.email == email)
            .map(|u| u.id)
    }

    fn user_mut(&mut self, email: &str) -> Result<&mut User, AppError> {
        self.users
            .values_mut()
            .find(|u| u.email == email)
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    fn event(&self, id: i32) -> Result<&SportEvent, AppError> {
        self.events
            .get(&id)
            .ok_or_else(|| AppError::NotFound("SportEvent".to_string()))
    }

    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }
}

/// Keeps every table behind one mutex, so each call is serialized against
/// all others.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("memory store lock poisoned")))
    }
}

impl Store for MemoryStore {
    fn register_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        if tables.user_id(&new_user.email).is_some() {
            return Err(AppError::Conflict(
                "This email has been used before".to_string(),
            ));
        }
        let id = Tables::next_id(&mut tables.next_user_id);
        let user = User {
            id,
            name: new_user.name,
            surname: new_user.surname,
            email: new_user.email,
            age: new_user.age,
            wallet: new_user.wallet,
            hashed_password: new_user.hashed_password,
            events_count: 0,
            bets_count: 0,
            is_active: new_user.is_active,
            date_joined: Utc::now().naive_utc(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    fn get_user(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.lock()?;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    fn activate_user(&self, email: &str) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        let user = tables.user_mut(email)?;
        user.is_active = true;
        Ok(user.clone())
    }

    fn update_user(&self, email: &str, changes: UserChanges) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        let id = tables
            .user_id(email)
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if let Some(new_email) = changes.email.as_deref() {
            if new_email != email {
                if tables.user_id(new_email).is_some() {
                    return Err(AppError::Conflict(
                        "This email has been used before".to_string(),
                    ));
                }
                for event in tables.events.values_mut().filter(|e| e.user_email == email) {
                    event.user_email = new_email.to_string();
                }
                for bet in tables.bets.values_mut().filter(|b| b.user_email == email) {
                    bet.user_email = new_email.to_string();
                }
            }
        }

        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;
        changes.apply_to(user);
        Ok(user.clone())
    }

    fn create_event(&self, new_event: NewSportEvent) -> Result<SportEvent, AppError> {
        let mut tables = self.lock()?;
        let owner = tables.user_mut(&new_event.user_email)?;
        if !owner.is_active {
            return Err(AppError::Forbidden("Inactive user".to_string()));
        }
        owner.events_count += 1;

        let id = Tables::next_id(&mut tables.next_event_id);
        let event = SportEvent {
            id,
            event_name: new_event.event_name,
            event_final_date: new_event.event_final_date,
            event_type: new_event.event_type,
            team_home: new_event.team_home,
            team_away: new_event.team_away,
            event_status: false,
            user_email: new_event.user_email,
            bets_count: 0,
            final_home_score: None,
            final_away_score: None,
            created_at: Utc::now().naive_utc(),
        };
        tables.events.insert(id, event.clone());
        Ok(event)
    }

    fn update_event(
        &self,
        event_id: i32,
        owner: &str,
        changes: EventChanges,
    ) -> Result<SportEvent, AppError> {
        let mut tables = self.lock()?;
        ledger::ensure_owner(tables.event(event_id)?, owner)?;
        let event = tables
            .events
            .get_mut(&event_id)
            .ok_or_else(|| AppError::NotFound("SportEvent".to_string()))?;
        changes.apply_to(event);
        Ok(event.clone())
    }

    fn list_upcoming_events(&self, now: NaiveDateTime) -> Result<Vec<SportEvent>, AppError> {
        let tables = self.lock()?;
        Ok(tables
            .events
            .values()
            .filter(|e| e.is_upcoming(now))
            .cloned()
            .collect())
    }

    fn get_event_with_bets(&self, event_id: i32, requester: &str) -> Result<EventBets, AppError> {
        let tables = self.lock()?;
        let event = tables.event(event_id)?;
        ledger::ensure_owner(event, requester)?;
        let bets = tables
            .bets
            .values()
            .filter(|b| b.sport_event_id == event_id)
            .cloned()
            .collect();
        Ok(EventBets {
            event: event.clone(),
            bets,
        })
    }

    fn place_bet(
        &self,
        bettor_email: &str,
        request: &BetRequest,
        now: NaiveDateTime,
    ) -> Result<Bet, AppError> {
        ledger::validate_bet_request(request)?;
        let mut tables = self.lock()?;
        let event = tables.event(request.event_id)?.clone();
        let bettor = tables.user_mut(bettor_email)?.clone();

        let new_bet = ledger::quote_bet(&bettor, &event, request, now)?;

        // the bettor and event were found above, so these writes land together
        let user = tables.user_mut(bettor_email)?;
        user.wallet -= new_bet.cash;
        user.bets_count += 1;
        if let Some(event) = tables.events.get_mut(&event.id) {
            event.bets_count += 1;
        }
        let id = Tables::next_id(&mut tables.next_bet_id);
        let bet = Bet {
            id,
            odd: new_bet.odd,
            team_home_score_pred: new_bet.team_home_score_pred,
            team_away_score_pred: new_bet.team_away_score_pred,
            cash: new_bet.cash,
            earnings: 0.0,
            win: false,
            user_email: new_bet.user_email,
            sport_event_id: new_bet.sport_event_id,
            created_at: now,
        };
        tables.bets.insert(id, bet.clone());
        Ok(bet)
    }

    fn list_user_bets(&self, email: &str) -> Result<Vec<Bet>, AppError> {
        let tables = self.lock()?;
        Ok(tables
            .bets
            .values()
            .filter(|b| b.user_email == email)
            .cloned()
            .collect())
    }

    fn settle_event(
        &self,
        event_id: i32,
        owner: &str,
        home_score: i32,
        away_score: i32,
        now: NaiveDateTime,
    ) -> Result<Vec<Bet>, AppError> {
        ledger::validate_final_score(home_score, away_score)?;
        let mut tables = self.lock()?;
        let event = tables.event(event_id)?;
        ledger::ensure_owner(event, owner)?;
        if event.event_status {
            return Err(AppError::Conflict(format!(
                "event {event_id} is already settled"
            )));
        }
        ledger::ensure_event_finished(event, now)?;

        let mut payouts = Vec::new();
        let mut settled = Vec::new();
        for bet in tables
            .bets
            .values_mut()
            .filter(|b| b.sport_event_id == event_id)
        {
            let (win, earnings) = ledger::settle_bet(bet, home_score, away_score);
            bet.win = win;
            bet.earnings = earnings;
            if win {
                payouts.push((bet.user_email.clone(), earnings));
            }
            settled.push(bet.clone());
        }
        for (email, earnings) in payouts {
            tables.user_mut(&email)?.wallet += earnings;
        }
        if let Some(event) = tables.events.get_mut(&event_id) {
            event.event_status = true;
            event.final_home_score = Some(home_score);
            event.final_away_score = Some(away_score);
        }
        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn new_user(email: &str, wallet: f64) -> NewUser {
        NewUser {
            name: "Test".to_string(),
            surname: "User".to_string(),
            email: email.to_string(),
            age: 30,
            wallet,
            hashed_password: "hash".to_string(),
            is_active: true,
        }
    }

    fn new_event(owner: &str, ends_at: NaiveDateTime) -> NewSportEvent {
        NewSportEvent {
            event_name: "Derby".to_string(),
            event_final_date: ends_at,
            event_type: "football".to_string(),
            team_home: "Reds".to_string(),
            team_away: "Blues".to_string(),
            user_email: owner.to_string(),
        }
    }

    fn bet(event_id: i32, home: i32, away: i32, cash: f64) -> BetRequest {
        BetRequest {
            event_id,
            team_home_score_pred: home,
            team_away_score_pred: away,
            cash,
        }
    }

    /// Owner `a@x.com`, bettor `b@x.com` with `wallet`, one event ending in an hour.
    fn setup(wallet: f64) -> (MemoryStore, SportEvent, NaiveDateTime) {
        let store = MemoryStore::new();
        let now = Utc::now().naive_utc();
        store.register_user(new_user("a@x.com", 0.0)).unwrap();
        store.register_user(new_user("b@x.com", wallet)).unwrap();
        let event = store
            .create_event(new_event("a@x.com", now + Duration::hours(1)))
            .unwrap();
        (store, event, now)
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.register_user(new_user("a@x.com", 1.0)).unwrap();
        let err = store.register_user(new_user("a@x.com", 2.0)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_place_bet_example() {
        let (store, event, now) = setup(50.0);

        let placed = store.place_bet("b@x.com", &bet(event.id, 2, 0, 30.0), now).unwrap();
        assert!((placed.odd - 1.2).abs() < 1e-9);
        assert_eq!(placed.cash, 30.0);
        assert_eq!(placed.earnings, 0.0);
        assert!(!placed.win);

        let bettor = store.get_user("b@x.com").unwrap().unwrap();
        assert!((bettor.wallet - 20.0).abs() < 1e-9);
        assert_eq!(bettor.bets_count, 1);

        let view = store.get_event_with_bets(event.id, "a@x.com").unwrap();
        assert_eq!(view.event.bets_count, 1);
        assert_eq!(view.bets, vec![placed]);
    }

    #[test]
    fn test_stake_equal_to_wallet_changes_nothing() {
        let (store, event, now) = setup(100.0);

        let err = store.place_bet("b@x.com", &bet(event.id, 1, 0, 100.0), now).unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));

        let bettor = store.get_user("b@x.com").unwrap().unwrap();
        assert_eq!(bettor.wallet, 100.0);
        assert_eq!(bettor.bets_count, 0);
        let view = store.get_event_with_bets(event.id, "a@x.com").unwrap();
        assert_eq!(view.event.bets_count, 0);
        assert!(view.bets.is_empty());
    }

    #[test]
    fn test_bet_rejections() {
        let (store, event, now) = setup(100.0);

        let err = store.place_bet("b@x.com", &bet(event.id, -1, 0, 10.0), now).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = store.place_bet("b@x.com", &bet(999, 1, 0, 10.0), now).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let later = now + Duration::hours(2);
        let err = store.place_bet("b@x.com", &bet(event.id, 1, 0, 10.0), later).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_concurrent_bets_cannot_overdraw() {
        let (store, event, now) = setup(100.0);
        let store = Arc::new(store);
        let barrier = Arc::new(Barrier::new(2));
        let event_id = event.id;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.place_bet("b@x.com", &bet(event_id, 1, 0, 51.0), now)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::InsufficientFunds { .. }))));

        let bettor = store.get_user("b@x.com").unwrap().unwrap();
        assert!((bettor.wallet - 49.0).abs() < 1e-9);
        assert_eq!(bettor.bets_count, 1);
        let view = store.get_event_with_bets(event.id, "a@x.com").unwrap();
        assert_eq!(view.event.bets_count, 1);
    }

    #[test]
    fn test_counters_match_rows() {
        let (store, event, now) = setup(1_000.0);
        for cash in [10.0, 20.0, 30.0] {
            store.place_bet("b@x.com", &bet(event.id, 0, 0, cash), now).unwrap();
        }

        let bettor = store.get_user("b@x.com").unwrap().unwrap();
        assert_eq!(bettor.bets_count as usize, store.list_user_bets("b@x.com").unwrap().len());
        let view = store.get_event_with_bets(event.id, "a@x.com").unwrap();
        assert_eq!(view.event.bets_count as usize, view.bets.len());

        let owner = store.get_user("a@x.com").unwrap().unwrap();
        assert_eq!(owner.events_count, 1);
    }

    #[test]
    fn test_upcoming_listing() {
        let (store, event, now) = setup(0.0);
        let second = store
            .create_event(new_event("a@x.com", now + Duration::hours(3)))
            .unwrap();

        let ids: Vec<_> = store
            .list_upcoming_events(now)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![event.id, second.id]);

        let ids: Vec<_> = store
            .list_upcoming_events(event.event_final_date)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![second.id]);
    }

    #[test]
    fn test_non_owner_update_leaves_event_unchanged() {
        let (store, event, _) = setup(0.0);
        let changes = EventChanges {
            event_name: Some("Hijacked".to_string()),
            ..Default::default()
        };

        let err = store.update_event(event.id, "b@x.com", changes.clone()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = store.update_event(999, "a@x.com", changes).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let view = store.get_event_with_bets(event.id, "a@x.com").unwrap();
        assert_eq!(view.event, event);
    }

    #[test]
    fn test_event_bets_only_for_owner() {
        let (store, event, _) = setup(0.0);
        let err = store.get_event_with_bets(event.id, "b@x.com").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = store.get_event_with_bets(42, "a@x.com").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_inactive_user_cannot_create_events() {
        let store = MemoryStore::new();
        let mut idle = new_user("idle@x.com", 0.0);
        idle.is_active = false;
        store.register_user(idle).unwrap();

        let ends_at = Utc::now().naive_utc() + Duration::hours(1);
        let err = store.create_event(new_event("idle@x.com", ends_at)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let user = store.activate_user("idle@x.com").unwrap();
        assert!(user.is_active);
        assert!(store.create_event(new_event("idle@x.com", ends_at)).is_ok());
    }

    #[test]
    fn test_settlement_pays_winners_once() {
        let (store, event, now) = setup(100.0);
        store.register_user(new_user("c@x.com", 100.0)).unwrap();
        store.place_bet("b@x.com", &bet(event.id, 3, 1, 40.0), now).unwrap();
        store.place_bet("c@x.com", &bet(event.id, 1, 1, 40.0), now).unwrap();

        let after_end = now + Duration::hours(2);
        let err = store.settle_event(event.id, "b@x.com", 3, 1, after_end).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let settled = store.settle_event(event.id, "a@x.com", 3, 1, after_end).unwrap();
        assert_eq!(settled.len(), 2);
        assert!(settled[0].win);
        assert!((settled[0].earnings - 48.0).abs() < 1e-9);
        assert!(!settled[1].win);
        assert_eq!(settled[1].earnings, 0.0);

        let winner = store.get_user("b@x.com").unwrap().unwrap();
        assert!((winner.wallet - 108.0).abs() < 1e-9);
        let loser = store.get_user("c@x.com").unwrap().unwrap();
        assert!((loser.wallet - 60.0).abs() < 1e-9);

        let err = store.settle_event(event.id, "a@x.com", 3, 1, after_end).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = store.place_bet("c@x.com", &bet(event.id, 0, 0, 1.0), now).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let view = store.get_event_with_bets(event.id, "a@x.com").unwrap();
        assert!(view.event.event_status);
        assert_eq!(view.event.final_home_score, Some(3));
        assert_eq!(view.event.final_away_score, Some(1));
    }

    #[test]
    fn test_settlement_waits_for_the_end() {
        let (store, event, now) = setup(100.0);
        store.place_bet("b@x.com", &bet(event.id, 2, 0, 40.0), now).unwrap();

        let err = store.settle_event(event.id, "a@x.com", 2, 0, now).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let bettor = store.get_user("b@x.com").unwrap().unwrap();
        assert!((bettor.wallet - 60.0).abs() < 1e-9);
        let view = store.get_event_with_bets(event.id, "a@x.com").unwrap();
        assert!(!view.event.event_status);
        assert_eq!(view.event.final_home_score, None);
        assert!(!view.bets[0].win);

        // still open, so more bets go in
        store.place_bet("b@x.com", &bet(event.id, 1, 0, 10.0), now).unwrap();
    }

    #[test]
    fn test_owner_cannot_bet_on_own_event() {
        let (store, event, now) = setup(0.0);
        let funds = UserChanges {
            wallet: Some(500.0),
            ..Default::default()
        };
        store.update_user("a@x.com", funds).unwrap();

        let err = store.place_bet("a@x.com", &bet(event.id, 9, 0, 90.0), now).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let owner = store.get_user("a@x.com").unwrap().unwrap();
        assert_eq!(owner.wallet, 500.0);
        assert_eq!(owner.bets_count, 0);
        let view = store.get_event_with_bets(event.id, "a@x.com").unwrap();
        assert_eq!(view.event.bets_count, 0);
    }

    #[test]
    fn test_email_change_cascades() {
        let (store, event, now) = setup(100.0);
        store.place_bet("b@x.com", &bet(event.id, 1, 0, 10.0), now).unwrap();

        let taken = UserChanges {
            email: Some("a@x.com".to_string()),
            ..Default::default()
        };
        let err = store.update_user("b@x.com", taken).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let changes = UserChanges {
            email: Some("bee@x.com".to_string()),
            ..Default::default()
        };
        let user = store.update_user("b@x.com", changes).unwrap();
        assert_eq!(user.email, "bee@x.com");
        assert!(store.get_user("b@x.com").unwrap().is_none());
        assert_eq!(store.list_user_bets("bee@x.com").unwrap().len(), 1);

        let owner_change = UserChanges {
            email: Some("ay@x.com".to_string()),
            ..Default::default()
        };
        store.update_user("a@x.com", owner_change).unwrap();
        assert!(store.get_event_with_bets(event.id, "ay@x.com").is_ok());
    }
}
