use super::bet::Bet;
use super::schema::sport_events;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Queryable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(primary_key(id))]
#[diesel(table_name = sport_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SportEvent {
    pub id: i32,
    pub event_name: String,
    #[serde(with = "event_date")]
    pub event_final_date: NaiveDateTime,
    pub event_type: String,
    pub team_home: String,
    pub team_away: String,
    /// Set once the final score has been recorded.
    pub event_status: bool,
    pub user_email: String,
    pub bets_count: i32,
    pub final_home_score: Option<i32>,
    pub final_away_score: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = sport_events)]
pub struct NewSportEvent {
    pub event_name: String,
    pub event_final_date: NaiveDateTime,
    pub event_type: String,
    pub team_home: String,
    pub team_away: String,
    pub user_email: String,
}

/// Fields the owner may change after creation.
#[derive(AsChangeset, Deserialize, Debug, Clone, Default)]
#[diesel(table_name = sport_events)]
pub struct EventChanges {
    pub event_name: Option<String>,
    pub event_type: Option<String>,
    pub team_home: Option<String>,
    pub team_away: Option<String>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        self.event_name.is_none()
            && self.event_type.is_none()
            && self.team_home.is_none()
            && self.team_away.is_none()
    }

    pub fn apply_to(&self, event: &mut SportEvent) {
        if let Some(event_name) = &self.event_name {
            event.event_name = event_name.clone();
        }
        if let Some(event_type) = &self.event_type {
            event.event_type = event_type.clone();
        }
        if let Some(team_home) = &self.team_home {
            event.team_home = team_home.clone();
        }
        if let Some(team_away) = &self.team_away {
            event.team_away = team_away.clone();
        }
    }
}

/// An event together with every bet placed on it, as shown to its owner.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EventBets {
    #[serde(flatten)]
    pub event: SportEvent,
    pub bets: Vec<Bet>,
}

impl SportEvent {
    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.event_final_date > now
    }

    pub fn create(conn: &mut PgConnection, new_event: NewSportEvent) -> QueryResult<Self> {
        diesel::insert_into(sport_events::table)
            .values(new_event)
            .get_result::<Self>(conn)
    }

    pub fn get_by_id(conn: &mut PgConnection, id: i32) -> QueryResult<Option<Self>> {
        sport_events::table.find(id).first::<Self>(conn).optional()
    }

    pub fn get_by_id_for_update(conn: &mut PgConnection, id: i32) -> QueryResult<Option<Self>> {
        sport_events::table
            .find(id)
            .for_update()
            .first::<Self>(conn)
            .optional()
    }

    pub fn get_upcoming(conn: &mut PgConnection, now: NaiveDateTime) -> QueryResult<Vec<Self>> {
        sport_events::table
            .filter(sport_events::event_final_date.gt(now))
            .order(sport_events::id.asc())
            .load::<Self>(conn)
    }

    pub fn update(conn: &mut PgConnection, id: i32, changes: &EventChanges) -> QueryResult<Self> {
        diesel::update(sport_events::table.find(id))
            .set(changes)
            .get_result::<Self>(conn)
    }

    pub fn increment_bets_count(conn: &mut PgConnection, id: i32) -> QueryResult<()> {
        diesel::update(sport_events::table.find(id))
            .set(sport_events::bets_count.eq(sport_events::bets_count + 1))
            .execute(conn)?;
        Ok(())
    }

    pub fn set_final_score(
        conn: &mut PgConnection,
        id: i32,
        home_score: i32,
        away_score: i32,
    ) -> QueryResult<Self> {
        diesel::update(sport_events::table.find(id))
            .set((
                sport_events::event_status.eq(true),
                sport_events::final_home_score.eq(Some(home_score)),
                sport_events::final_away_score.eq(Some(away_score)),
            ))
            .get_result::<Self>(conn)
    }
}

/// Event dates travel as `YYYY/MM/DD/HH/MM`.
pub mod event_date {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y/%m/%d/%H/%M";

    pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
