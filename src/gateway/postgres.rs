// src/gateway/postgres.rs - PostgreSQL store
//
// Kinds, priorities and states are stored as their string codes; conversion
// into the closed enums happens here and nowhere else.

use super::PersistenceGateway;
use crate::alarms::{
    ActiveAlarm, AlarmDefinition, AlarmId, AlarmPriority, ComparisonKind, DefinitionId,
    NewActiveAlarm,
    NewAlarmDefinition,
};
use crate::error::{AlarmError, Result};
use crate::fsm::AlarmState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

/// Column list for `alarm_definitions` queries.
const DEFINITION_COLUMNS: &str = "\
    id, tag, threshold, alarm_type, priority, enabled, created_at, updated_at";

/// Column list for `active_alarms` queries.
const ALARM_COLUMNS: &str = "\
    id, definition_id, state, activation_time, ack_time, shelved_until, value, \
    created_at, updated_at";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS alarm_definitions (
        id BIGSERIAL PRIMARY KEY,
        tag TEXT NOT NULL,
        threshold DOUBLE PRECISION NOT NULL,
        alarm_type TEXT NOT NULL,
        priority TEXT NOT NULL,
        enabled BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS alarm_definitions_tag_idx ON alarm_definitions (tag)",
    "CREATE TABLE IF NOT EXISTS active_alarms (
        id BIGSERIAL PRIMARY KEY,
        definition_id BIGINT NOT NULL REFERENCES alarm_definitions (id),
        state TEXT NOT NULL,
        activation_time TIMESTAMPTZ NOT NULL,
        ack_time TIMESTAMPTZ,
        shelved_until TIMESTAMPTZ,
        value DOUBLE PRECISION NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS active_alarms_state_idx ON active_alarms (state)",
];

pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!("Connected to PostgreSQL ({} connections max)", max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Alarm schema verified");
        Ok(())
    }

    async fn execute_update(&self, id: AlarmId, query: &str, bind: UpdateBind) -> Result<()> {
        let query = sqlx::query(query);
        let query = match bind {
            UpdateBind::State(state) => query.bind(state.as_str()),
            UpdateBind::Time(at) => query.bind(at),
        };
        let result = query.bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AlarmError::Persistence(format!("active alarm {} does not exist", id)));
        }
        Ok(())
    }
}

enum UpdateBind {
    State(AlarmState),
    Time(DateTime<Utc>),
}

fn definition_from_row(row: &PgRow) -> Result<AlarmDefinition> {
    let kind: String = row.try_get("alarm_type")?;
    let priority: String = row.try_get("priority")?;
    Ok(AlarmDefinition {
        id: row.try_get("id")?,
        tag: row.try_get("tag")?,
        threshold: row.try_get("threshold")?,
        kind: ComparisonKind::from_code(&kind),
        priority: priority.parse::<AlarmPriority>()?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn alarm_from_row(row: &PgRow) -> Result<ActiveAlarm> {
    let state: String = row.try_get("state")?;
    Ok(ActiveAlarm {
        id: row.try_get("id")?,
        definition_id: row.try_get("definition_id")?,
        state: state.parse::<AlarmState>()?,
        activation_time: row.try_get("activation_time")?,
        ack_time: row.try_get("ack_time")?,
        shelved_until: row.try_get("shelved_until")?,
        value: row.try_get("value")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PersistenceGateway for PostgresGateway {
    async fn create_definition(&self, draft: &NewAlarmDefinition) -> Result<AlarmDefinition> {
        let query = format!(
            "INSERT INTO alarm_definitions (tag, threshold, alarm_type, priority, enabled) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {DEFINITION_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&draft.tag)
            .bind(draft.threshold)
            .bind(draft.kind.as_str())
            .bind(draft.priority.as_str())
            .bind(draft.enabled)
            .fetch_one(&self.pool)
            .await?;
        definition_from_row(&row)
    }

    async fn get_definition(&self, id: DefinitionId) -> Result<Option<AlarmDefinition>> {
        let query = format!("SELECT {DEFINITION_COLUMNS} FROM alarm_definitions WHERE id = $1");
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(definition_from_row).transpose()
    }

    async fn list_definitions(&self) -> Result<Vec<AlarmDefinition>> {
        let query = format!("SELECT {DEFINITION_COLUMNS} FROM alarm_definitions ORDER BY id");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(definition_from_row).collect()
    }

    async fn get_definitions_by_tag(&self, tag: &str) -> Result<Vec<AlarmDefinition>> {
        let query = format!(
            "SELECT {DEFINITION_COLUMNS} FROM alarm_definitions WHERE tag = $1 ORDER BY id"
        );
        let rows = sqlx::query(&query).bind(tag).fetch_all(&self.pool).await?;
        rows.iter().map(definition_from_row).collect()
    }

    async fn create_active_alarm(&self, alarm: &NewActiveAlarm) -> Result<ActiveAlarm> {
        let query = format!(
            "INSERT INTO active_alarms (definition_id, state, activation_time, value) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {ALARM_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(alarm.definition_id)
            .bind(alarm.state.as_str())
            .bind(alarm.activation_time)
            .bind(alarm.value)
            .fetch_one(&self.pool)
            .await?;
        alarm_from_row(&row)
    }

    async fn update_active_alarm_state(&self, id: AlarmId, state: AlarmState) -> Result<()> {
        self.execute_update(
            id,
            "UPDATE active_alarms \
             SET state = $1, \
                 shelved_until = CASE WHEN $1 = 'Shelved' THEN shelved_until ELSE NULL END, \
                 updated_at = NOW() \
             WHERE id = $2",
            UpdateBind::State(state),
        )
        .await
    }

    async fn ack_active_alarm(&self, id: AlarmId, at: DateTime<Utc>) -> Result<()> {
        self.execute_update(
            id,
            "UPDATE active_alarms \
             SET state = 'AckActive', ack_time = $1, shelved_until = NULL, updated_at = NOW() \
             WHERE id = $2",
            UpdateBind::Time(at),
        )
        .await
    }

    async fn shelve_active_alarm(&self, id: AlarmId, until: DateTime<Utc>) -> Result<()> {
        self.execute_update(
            id,
            "UPDATE active_alarms \
             SET state = 'Shelved', shelved_until = $1, updated_at = NOW() \
             WHERE id = $2",
            UpdateBind::Time(until),
        )
        .await
    }

    async fn get_active_alarms(&self) -> Result<Vec<ActiveAlarm>> {
        let query = format!(
            "SELECT {ALARM_COLUMNS} FROM active_alarms WHERE state <> 'Normal' ORDER BY id"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(alarm_from_row).collect()
    }
}
