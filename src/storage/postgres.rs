//! PostgreSQL store backed by a sqlx connection pool
//!
//! Reads the ingestion tables written by the upstream collaborator and
//! writes prediction rows into the master table. Identifiers of the source
//! schema are quoted because they are mixed-case.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::persistence::{PredictionStore, StoreError};
use super::tables;
use crate::config::StoreConfig;
use crate::types::{
    LactationSummary, MilkingSession, ModelConfig, PredictionRecord, SessionOid,
    VoluntarySessionMetrics,
};

/// Bind parameters per prediction row.
const PREDICTION_COLUMNS: usize = 26;

/// Rows per INSERT statement, kept under the 65 535 bind-parameter limit.
const MAX_ROWS_PER_STATEMENT: usize = 65_535 / PREDICTION_COLUMNS;

#[derive(Debug, FromRow)]
struct SessionRow {
    oid: Option<i64>,
    begin_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    animal: Option<i64>,
    total_yield: Option<f64>,
    avg_conductivity: Option<f64>,
    max_blood: Option<f64>,
    expected_yield: Option<f64>,
}

impl SessionRow {
    /// Rows without an identifier or start time cannot be joined or ordered.
    fn into_session(self) -> Option<MilkingSession> {
        Some(MilkingSession {
            oid: self.oid?,
            begin_time: self.begin_time?,
            end_time: self.end_time,
            animal: self.animal,
            total_yield: self.total_yield,
            expected_yield: self.expected_yield,
            avg_conductivity: self.avg_conductivity,
            max_blood: self.max_blood,
        })
    }
}

#[derive(Debug, FromRow)]
struct VoluntaryRow {
    oid: i64,
    mdi: Option<f64>,
    milk_flow_duration: Option<f64>,
    smart_pulsation_ratio: Option<f64>,
    current_combined_amd: Option<f64>,
    incomplete: Option<i64>,
    kickoff: Option<i64>,
}

#[derive(Debug, FromRow)]
struct LactationRow {
    animal: Option<i64>,
    lactation_number: Option<i64>,
    start_date: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct ModelConfigRow {
    intercept: Option<f64>,
    coef_current_mdi: Option<f64>,
    coef_predicted_mdi: Option<f64>,
    updated_at: Option<DateTime<Utc>>,
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool using the store section of the config.
    pub async fn connect(database_url: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(database_url)
            .await?;

        info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }
}

fn parse_farm_id(farm_id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(farm_id).map_err(|_| StoreError::InvalidFarmId(farm_id.to_string()))
}

#[async_trait]
impl PredictionStore for PgStore {
    async fn recent_sessions(
        &self,
        farm_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MilkingSession>, StoreError> {
        let farm = parse_farm_id(farm_id)?;
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT "OID"::int8               AS oid,
                   "BeginTime"               AS begin_time,
                   "EndTime"                 AS end_time,
                   "BasicAnimal"::int8       AS animal,
                   "TotalYield"::float8      AS total_yield,
                   "AvgConductivity"::float8 AS avg_conductivity,
                   "MaxBlood"::float8        AS max_blood,
                   "ExpectedYield"::float8   AS expected_yield
            FROM   "DELPRO_sessions_milk_yield"
            WHERE  farm_id = $1
              AND  "BeginTime" >= $2
            "#,
        )
        .bind(farm)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        debug!(table = tables::SESSIONS, rows = rows.len(), "Fetched sessions");
        Ok(rows.into_iter().filter_map(SessionRow::into_session).collect())
    }

    async fn voluntary_metrics_by_ids(
        &self,
        farm_id: &str,
        oids: &[SessionOid],
    ) -> Result<Vec<VoluntarySessionMetrics>, StoreError> {
        let farm = parse_farm_id(farm_id)?;
        let rows: Vec<VoluntaryRow> = sqlx::query_as(
            r#"
            SELECT "OID"::int8                 AS oid,
                   "Mdi"::float8               AS mdi,
                   "MilkFlowDuration"::float8  AS milk_flow_duration,
                   "SmartPulsationRatio"::float8 AS smart_pulsation_ratio,
                   "CurrentCombinedAmd"::float8  AS current_combined_amd,
                   "Incomplete"::int8          AS incomplete,
                   "Kickoff"::int8             AS kickoff
            FROM   "DELPRO_voluntary_sessions_milk_yield"
            WHERE  farm_id = $1
              AND  "OID" = ANY($2)
            "#,
        )
        .bind(farm)
        .bind(oids)
        .fetch_all(&self.pool)
        .await?;

        debug!(table = tables::VOLUNTARY_SESSIONS, rows = rows.len(), "Fetched voluntary metrics");
        Ok(rows
            .into_iter()
            .map(|r| VoluntarySessionMetrics {
                oid: r.oid,
                mdi: r.mdi,
                milk_flow_duration: r.milk_flow_duration,
                smart_pulsation_ratio: r.smart_pulsation_ratio,
                current_combined_amd: r.current_combined_amd,
                incomplete: r.incomplete,
                kickoff: r.kickoff,
            })
            .collect())
    }

    async fn lactation_summaries(
        &self,
        farm_id: &str,
    ) -> Result<Vec<LactationSummary>, StoreError> {
        let farm = parse_farm_id(farm_id)?;
        let rows: Vec<LactationRow> = sqlx::query_as(
            r#"
            SELECT "Animal"::int8          AS animal,
                   "LactationNumber"::int8 AS lactation_number,
                   "StartDate"             AS start_date
            FROM   "DELPRO_animals_lactations_summary"
            WHERE  farm_id = $1
            "#,
        )
        .bind(farm)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| LactationSummary {
                animal: r.animal,
                lactation_number: r.lactation_number,
                start_date: r.start_date,
            })
            .collect())
    }

    async fn latest_model_config(&self) -> Result<Option<ModelConfig>, StoreError> {
        let row: Option<ModelConfigRow> = sqlx::query_as(
            r#"
            SELECT intercept::float8          AS intercept,
                   coef_current_mdi::float8   AS coef_current_mdi,
                   coef_predicted_mdi::float8 AS coef_predicted_mdi,
                   updated_at
            FROM   system_model_config
            ORDER  BY updated_at DESC NULLS LAST
            LIMIT  1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ModelConfig {
            intercept: r.intercept.unwrap_or(0.0),
            coef_current_mdi: r.coef_current_mdi.unwrap_or(0.0),
            coef_predicted_mdi: r.coef_predicted_mdi.unwrap_or(0.0),
            updated_at: r.updated_at,
        }))
    }

    async fn insert_predictions(&self, records: &[PredictionRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let farms = records
            .iter()
            .map(|r| parse_farm_id(&r.farm_id))
            .collect::<Result<Vec<_>, _>>()?;

        // One transaction so the run's batch lands atomically even when it
        // spans several statements.
        let mut tx = self.pool.begin().await?;
        for (chunk, farm_chunk) in records
            .chunks(MAX_ROWS_PER_STATEMENT)
            .zip(farms.chunks(MAX_ROWS_PER_STATEMENT))
        {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"INSERT INTO "mdi_predictor_mastertable"
                   (farm_id, session_oid, animal_oid,
                    "Mdi", "TotalYield", "AvgConductivity", "MaxBlood",
                    "MilkFlowDuration", "SmartPulsationRatio", "CurrentCombinedAmd",
                    "Incomplete", "Kickoff",
                    "AvgConductivity_ma15", "MaxBlood_ma15", "Mdi_ma15",
                    "MilkFlowDuration_ma15", "SmartPulsationRatio_ma15",
                    "CurrentCombinedAmd_ma15", "TotalYield_ma21", "ExpectedYield_ma21",
                    "LactationNumber", "DIM", "BeginTime", "EndTime",
                    mdi_2d, prob_mastitis) "#,
            );
            qb.push_values(chunk.iter().zip(farm_chunk), |mut b, (r, farm)| {
                b.push_bind(*farm)
                    .push_bind(r.session_oid)
                    .push_bind(r.animal_oid)
                    .push_bind(r.mdi)
                    .push_bind(r.total_yield)
                    .push_bind(r.avg_conductivity)
                    .push_bind(r.max_blood)
                    .push_bind(r.milk_flow_duration)
                    .push_bind(r.smart_pulsation_ratio)
                    .push_bind(r.current_combined_amd)
                    .push_bind(r.incomplete)
                    .push_bind(r.kickoff)
                    .push_bind(r.avg_conductivity_ma15)
                    .push_bind(r.max_blood_ma15)
                    .push_bind(r.mdi_ma15)
                    .push_bind(r.milk_flow_duration_ma15)
                    .push_bind(r.smart_pulsation_ratio_ma15)
                    .push_bind(r.current_combined_amd_ma15)
                    .push_bind(r.total_yield_ma21)
                    .push_bind(r.expected_yield_ma21)
                    .push_bind(r.lactation_number)
                    .push_bind(r.days_in_milk)
                    .push_bind(r.begin_time)
                    .push_bind(r.end_time)
                    .push_bind(r.predicted_mdi)
                    .push_bind(r.mastitis_probability);
            });
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(table = tables::PREDICTIONS, rows = records.len(), "Inserted predictions");
        Ok(())
    }

    async fn first_farm_id(&self) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id::text FROM farms LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    fn backend_name(&self) -> &'static str {
        "PostgreSQL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_farm_id_must_be_uuid() {
        assert!(parse_farm_id("6f1c2d9e-0000-4000-8000-000000000001").is_ok());
        assert!(matches!(
            parse_farm_id("farm-north"),
            Err(StoreError::InvalidFarmId(id)) if id == "farm-north"
        ));
    }

    #[test]
    fn test_insert_chunk_stays_under_bind_limit() {
        assert!(MAX_ROWS_PER_STATEMENT * PREDICTION_COLUMNS <= 65_535);
        assert!(MAX_ROWS_PER_STATEMENT > 0);
    }
}
