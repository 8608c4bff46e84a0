//! Live tabular data source: reads the six input relations from a PostgREST-style
//! HTTP API and writes the reconstructed schedule back to a results relation.
//!
//! Cycle times and durations are stored in seconds by the live schema; every value
//! is converted to the planner's canonical minutes at the point it crosses this
//! boundary (see `Seconds::to_minutes`).
use crate::changeover::ChangeoverConfig;
use crate::domain::{EntryType, EquipmentWip, InputBundle, Schedule};
use crate::error::PlannerError;
use crate::id::{ModelId, OperationId, ProductId, UnitId};
use crate::units::Seconds;
use indexmap::{IndexMap, indexmap};
use log::{debug, error};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Connection details for the live tabular backend.
#[derive(Debug, Clone)]
pub struct RestSourceConfig {
    pub base_url: String,
    pub api_key: String,
}

pub struct RestSource {
    client: Client,
    base_url: String,
}

impl RestSource {
    pub fn new(config: &RestSourceConfig) -> Result<Self, PlannerError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&config.api_key)
                .map_err(|e| PlannerError::SourceUnavailable(e.into()))?,
        );
        headers.insert(
            "Authorization",
            header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| PlannerError::SourceUnavailable(e.into()))?,
        );
        headers.insert(
            "Content-Type",
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PlannerError::SourceUnavailable(e.into()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    async fn fetch_relation<T: for<'de> Deserialize<'de>>(
        &self,
        relation: &str,
    ) -> Result<Vec<T>, PlannerError> {
        let url = format!("{}/{relation}?select=*", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PlannerError::SourceUnavailable(e.into()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("fetching {relation} returned {status}: {body}");
            return Err(PlannerError::SourceUnavailable(anyhow::anyhow!(
                "{relation} query failed with status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PlannerError::SourceUnavailable(e.into()))
    }

    /// Fetch the full input bundle, querying the six live relations.
    pub async fn fetch_inputs(&self) -> Result<InputBundle, PlannerError> {
        let demand_rows: Vec<DemandRow> = self.fetch_relation("demand").await?;
        let demands: IndexMap<ProductId, f64> = demand_rows
            .into_iter()
            .map(|r| (r.product_id.into(), r.quantity))
            .collect();

        let mut operation_rows: Vec<OperationRow> = self.fetch_relation("operations").await?;
        operation_rows.sort_by_key(|r| r.sequence);
        let operations: Vec<OperationId> = operation_rows
            .into_iter()
            .map(|r| r.operation_id.into())
            .collect();

        let equipment_rows: Vec<EquipmentMasterRow> =
            self.fetch_relation("equipment_master").await?;
        let mut equipment_models: IndexMap<ModelId, Vec<UnitId>> = indexmap! {};
        for row in equipment_rows {
            equipment_models
                .entry(row.model_id.into())
                .or_default()
                .push(row.unit_id.into());
        }

        let process_rows: Vec<ProcessStandardRow> =
            self.fetch_relation("process_standard").await?;
        let process_config: HashMap<(ProductId, OperationId, ModelId), crate::units::Minutes> =
            process_rows
                .into_iter()
                .map(|r| {
                    (
                        (r.product_id.into(), r.operation_id.into(), r.model_id.into()),
                        Seconds(r.cycle_time_sec).to_minutes(),
                    )
                })
                .collect();

        let wip_rows: Vec<WipRow> = self.fetch_relation("wip").await?;
        let wip: HashMap<(ProductId, OperationId), f64> = wip_rows
            .into_iter()
            .map(|r| ((r.product_id.into(), r.operation_id.into()), r.quantity))
            .collect();

        let eqp_wip_rows: Vec<EquipmentWipRow> = self.fetch_relation("equipment_wip").await?;
        let eqp_wip: HashMap<UnitId, EquipmentWip> = eqp_wip_rows
            .into_iter()
            .map(|r| {
                (
                    r.unit_id.into(),
                    EquipmentWip {
                        product: r.product_id.into(),
                        operation: r.operation_id.into(),
                        end_offset: Seconds(r.end_offset_sec).to_minutes(),
                    },
                )
            })
            .collect();

        let tool_rows: Vec<ToolMasterRow> = self.fetch_relation("tool_master").await?;
        let tools: HashMap<(ProductId, OperationId), u32> = tool_rows
            .into_iter()
            .map(|r| ((r.product_id.into(), r.operation_id.into()), r.tool_count))
            .collect();

        let changeover_rows: Vec<ChangeoverRow> = self.fetch_relation("changeover_config").await?;
        let changeover = build_changeover(changeover_rows)?;

        let shift_rows: Vec<ShiftRow> = self.fetch_relation("shift_config").await?;
        let available_time_sec = shift_rows
            .first()
            .map(|r| r.available_time_sec)
            .ok_or_else(|| {
                PlannerError::SourceUnavailable(anyhow::anyhow!("shift_config is empty"))
            })?;

        Ok(InputBundle {
            demands,
            operations,
            equipment_models,
            process_config,
            available_time: Seconds(available_time_sec).to_minutes(),
            wip,
            eqp_wip,
            tools,
            changeover,
        })
    }

    /// Persist the reconstructed schedule to the results relation, tagged with the
    /// rule's run key so repeated runs don't collide.
    pub async fn upload_results(
        &self,
        schedule: &Schedule,
        rule_timekey: &str,
    ) -> Result<(), PlannerError> {
        let url = format!("{}/production_results", self.base_url);
        let rows: Vec<ResultRow> = schedule
            .rows
            .iter()
            .filter(|row| row.entry_type == EntryType::Production)
            .map(|row| ResultRow {
                rule_timekey: rule_timekey.to_string(),
                unit_id: row.unit.to_string(),
                product_id: row.product.to_string(),
                operation_id: row.operation.to_string(),
                quantity: row.quantity,
                duration_sec: row.duration.value() * 60.0,
                start_sec: row.start_time.value() * 60.0,
                end_sec: row.end_time.value() * 60.0,
                entry_type: format!("{:?}", row.entry_type).to_uppercase(),
            })
            .collect();

        let response = self
            .client
            .post(&url)
            .json(&rows)
            .send()
            .await
            .map_err(|e| PlannerError::SinkFailure(e.into()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("uploading results returned {status}: {body}");
            return Err(PlannerError::SinkFailure(anyhow::anyhow!(
                "production_results insert failed with status {status}"
            )));
        }

        debug!("uploaded {} schedule rows for {rule_timekey}", rows.len());
        Ok(())
    }

    /// A lightweight liveness check against the backend.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/demand?select=count&limit=1", self.base_url);
        self.client
            .get(&url)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }
}

fn build_changeover(rows: Vec<ChangeoverRow>) -> Result<ChangeoverConfig, PlannerError> {
    let defaults = rows
        .iter()
        .find(|r| r.prev_product.is_none())
        .ok_or_else(|| {
            PlannerError::SourceUnavailable(anyhow::anyhow!(
                "changeover_config has no default row"
            ))
        })?;

    let mut exceptions = HashMap::new();
    for row in &rows {
        let (Some(prev), Some(next_product), Some(next_operation)) =
            (&row.prev_product, &row.next_product, &row.next_operation)
        else {
            continue;
        };
        exceptions.insert(
            (prev.clone().into(), next_product.clone().into(), next_operation.clone().into()),
            Seconds(row.duration_sec).to_minutes(),
        );
    }

    Ok(ChangeoverConfig {
        product_switch: Seconds(defaults.duration_sec).to_minutes(),
        op_switch: Seconds(defaults.op_switch_sec.unwrap_or(defaults.duration_sec)).to_minutes(),
        exceptions,
    })
}

#[derive(Debug, Deserialize)]
struct DemandRow {
    product_id: String,
    quantity: f64,
}

#[derive(Debug, Deserialize)]
struct OperationRow {
    operation_id: String,
    sequence: u32,
}

#[derive(Debug, Deserialize)]
struct EquipmentMasterRow {
    model_id: String,
    unit_id: String,
}

#[derive(Debug, Deserialize)]
struct ProcessStandardRow {
    product_id: String,
    operation_id: String,
    model_id: String,
    cycle_time_sec: f64,
}

#[derive(Debug, Deserialize)]
struct WipRow {
    product_id: String,
    operation_id: String,
    quantity: f64,
}

#[derive(Debug, Deserialize)]
struct EquipmentWipRow {
    unit_id: String,
    product_id: String,
    operation_id: String,
    end_offset_sec: f64,
}

#[derive(Debug, Deserialize)]
struct ToolMasterRow {
    product_id: String,
    operation_id: String,
    tool_count: u32,
}

#[derive(Debug, Deserialize)]
struct ChangeoverRow {
    prev_product: Option<String>,
    next_product: Option<String>,
    next_operation: Option<String>,
    duration_sec: f64,
    op_switch_sec: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ShiftRow {
    available_time_sec: f64,
}

#[derive(Debug, Serialize)]
struct ResultRow {
    rule_timekey: String,
    unit_id: String,
    product_id: String,
    operation_id: String,
    quantity: f64,
    duration_sec: f64,
    start_sec: f64,
    end_sec: f64,
    entry_type: String,
}
