use super::schema::bets;
use super::sport_event::SportEvent;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Associations, Queryable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq,
)]
#[diesel(primary_key(id))]
#[diesel(belongs_to(SportEvent, foreign_key = sport_event_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Bet {
    pub id: i32,
    pub odd: f64,
    pub team_home_score_pred: i32,
    pub team_away_score_pred: i32,
    pub cash: f64,
    pub earnings: f64,
    pub win: bool,
    pub user_email: String,
    pub sport_event_id: i32,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = bets)]
pub struct NewBet {
    pub odd: f64,
    pub team_home_score_pred: i32,
    pub team_away_score_pred: i32,
    pub cash: f64,
    pub user_email: String,
    pub sport_event_id: i32,
}

impl Bet {
    pub fn create(conn: &mut PgConnection, new_bet: NewBet) -> QueryResult<Self> {
        diesel::insert_into(bets::table)
            .values(new_bet)
            .get_result::<Self>(conn)
    }

    pub fn get_by_event(conn: &mut PgConnection, event: &SportEvent) -> QueryResult<Vec<Self>> {
        Bet::belonging_to(event)
            .order(bets::id.asc())
            .load::<Self>(conn)
    }

    pub fn get_by_user(conn: &mut PgConnection, email: &str) -> QueryResult<Vec<Self>> {
        bets::table
            .filter(bets::user_email.eq(email))
            .order(bets::id.asc())
            .load::<Self>(conn)
    }

    pub fn set_result(
        conn: &mut PgConnection,
        id: i32,
        win: bool,
        earnings: f64,
    ) -> QueryResult<Self> {
        diesel::update(bets::table.find(id))
            .set((bets::win.eq(win), bets::earnings.eq(earnings)))
            .get_result::<Self>(conn)
    }
}
