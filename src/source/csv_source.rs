//! Local-test data source: reads the six input relations and the changeover rule
//! from a directory of flat files, and writes results back to the same directory.
//!
//! This stands in for the live tabular backend (see `rest_source`) when running
//! against a fixed, reproducible bundle on a developer's machine or in CI.
use crate::changeover::ChangeoverConfig;
use crate::domain::{EntryType, EquipmentWip, InputBundle, Schedule};
use crate::error::PlannerError;
use crate::id::{ModelId, OperationId, ProductId, UnitId};
use crate::input::{read_csv, read_toml};
use crate::units::Seconds;
use indexmap::{IndexMap, indexmap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Location of the flat-file bundle this source reads and writes.
#[derive(Debug, Clone)]
pub struct CsvSourceConfig {
    pub dir: PathBuf,
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
struct ChangeoverException {
    prev_product: String,
    next_product: String,
    next_operation: String,
    duration_sec: f64,
}

#[derive(Debug, Deserialize)]
struct ChangeoverFile {
    product_switch_sec: f64,
    op_switch_sec: f64,
    #[serde(default)]
    exceptions: Vec<ChangeoverException>,
}

/// Read the full input bundle from the six flat files under `config.dir`.
pub fn read_bundle(config: &CsvSourceConfig) -> Result<InputBundle, PlannerError> {
    let dir = &config.dir;

    let demands: IndexMap<ProductId, f64> = read_relation::<DemandRow>(dir, "demand.csv")?
        .into_iter()
        .map(|r| (r.product_id.into(), r.quantity))
        .collect();

    let mut operation_rows = read_relation::<OperationRow>(dir, "operations.csv")?;
    operation_rows.sort_by_key(|r| r.sequence);
    let operations: Vec<OperationId> = operation_rows
        .into_iter()
        .map(|r| r.operation_id.into())
        .collect();

    let mut equipment_models: IndexMap<ModelId, Vec<UnitId>> = indexmap! {};
    for row in read_relation::<EquipmentMasterRow>(dir, "equipment_master.csv")? {
        equipment_models
            .entry(row.model_id.into())
            .or_default()
            .push(row.unit_id.into());
    }

    let process_config: HashMap<(ProductId, OperationId, ModelId), crate::units::Minutes> =
        read_relation::<ProcessStandardRow>(dir, "process_standard.csv")?
            .into_iter()
            .map(|r| {
                (
                    (r.product_id.into(), r.operation_id.into(), r.model_id.into()),
                    Seconds(r.cycle_time_sec).to_minutes(),
                )
            })
            .collect();

    let wip: HashMap<(ProductId, OperationId), f64> = read_relation::<WipRow>(dir, "wip.csv")?
        .into_iter()
        .map(|r| ((r.product_id.into(), r.operation_id.into()), r.quantity))
        .collect();

    let eqp_wip: HashMap<UnitId, EquipmentWip> =
        read_relation::<EquipmentWipRow>(dir, "equipment_wip.csv")?
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

    let tools: HashMap<(ProductId, OperationId), u32> =
        read_relation::<ToolMasterRow>(dir, "tool_master.csv")?
            .into_iter()
            .map(|r| ((r.product_id.into(), r.operation_id.into()), r.tool_count))
            .collect();

    let changeover_file: ChangeoverFile = read_toml(&dir.join("changeover.toml"))
        .map_err(PlannerError::SourceUnavailable)?;
    let changeover = ChangeoverConfig {
        product_switch: Seconds(changeover_file.product_switch_sec).to_minutes(),
        op_switch: Seconds(changeover_file.op_switch_sec).to_minutes(),
        exceptions: changeover_file
            .exceptions
            .into_iter()
            .map(|e| {
                (
                    (e.prev_product.into(), e.next_product.into(), e.next_operation.into()),
                    Seconds(e.duration_sec).to_minutes(),
                )
            })
            .collect(),
    };

    let available_time_sec = read_available_time(dir)?;

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

#[derive(Debug, Deserialize)]
struct AvailableTimeFile {
    available_time_sec: f64,
}

fn read_available_time(dir: &Path) -> Result<f64, PlannerError> {
    let file: AvailableTimeFile = read_toml(&dir.join("shift.toml"))
        .map_err(PlannerError::SourceUnavailable)?;
    Ok(file.available_time_sec)
}

fn read_relation<T: for<'de> Deserialize<'de>>(
    dir: &Path,
    file_name: &str,
) -> Result<Vec<T>, PlannerError> {
    read_csv(&dir.join(file_name))
        .map(Iterator::collect)
        .map_err(PlannerError::SourceUnavailable)
}

#[derive(Debug, Serialize)]
struct ScheduleOutputRow {
    unit: String,
    product: String,
    operation: String,
    quantity: f64,
    duration_min: f64,
    start_min: f64,
    end_min: f64,
    entry_type: String,
}

/// Write the reconstructed schedule back into `config.dir` as flat files.
pub fn write_schedule(config: &CsvSourceConfig, schedule: &Schedule) -> Result<(), PlannerError> {
    let mut writer = csv::Writer::from_path(config.dir.join("schedule_output.csv"))
        .map_err(|e| PlannerError::SinkFailure(e.into()))?;
    for row in schedule
        .rows
        .iter()
        .filter(|r| r.entry_type == EntryType::Production)
    {
        writer
            .serialize(ScheduleOutputRow {
                unit: row.unit.to_string(),
                product: row.product.to_string(),
                operation: row.operation.to_string(),
                quantity: row.quantity,
                duration_min: row.duration.value(),
                start_min: row.start_time.value(),
                end_min: row.end_time.value(),
                entry_type: format!("{:?}", row.entry_type).to_uppercase(),
            })
            .map_err(|e| PlannerError::SinkFailure(e.into()))?;
    }
    writer.flush().map_err(|e| PlannerError::SinkFailure(e.into()))?;

    let mut unmet_writer = csv::Writer::from_path(config.dir.join("unmet_output.csv"))
        .map_err(|e| PlannerError::SinkFailure(e.into()))?;
    for row in &schedule.unmet {
        unmet_writer
            .serialize((row.product.to_string(), row.operation.to_string(), row.unmet_qty))
            .map_err(|e| PlannerError::SinkFailure(e.into()))?;
    }
    unmet_writer.flush().map_err(|e| PlannerError::SinkFailure(e.into()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn seed_minimal_bundle(dir: &Path) {
        write_file(dir, "demand.csv", "product_id,quantity\nProduct_A,100\n");
        write_file(dir, "operations.csv", "operation_id,sequence\nOP10,0\nOP20,1\n");
        write_file(
            dir,
            "equipment_master.csv",
            "model_id,unit_id\nModel_X,Unit_1\n",
        );
        write_file(
            dir,
            "process_standard.csv",
            "product_id,operation_id,model_id,cycle_time_sec\nProduct_A,OP10,Model_X,60\n",
        );
        write_file(dir, "wip.csv", "product_id,operation_id,quantity\nProduct_A,OP10,100\n");
        write_file(dir, "equipment_wip.csv", "unit_id,product_id,operation_id,end_offset_sec\n");
        write_file(dir, "tool_master.csv", "product_id,operation_id,tool_count\n");
        write_file(
            dir,
            "changeover.toml",
            "product_switch_sec = 1800\nop_switch_sec = 1800\n",
        );
        write_file(dir, "shift.toml", "available_time_sec = 86400\n");
    }

    #[test]
    fn reads_a_minimal_bundle_converting_seconds_to_minutes() {
        let dir = tempfile::tempdir().unwrap();
        seed_minimal_bundle(dir.path());

        let bundle = read_bundle(&CsvSourceConfig { dir: dir.path().to_path_buf() }).unwrap();
        assert_eq!(bundle.demands[&ProductId::from("Product_A")], 100.0);
        assert_eq!(bundle.operations, vec![OperationId::from("OP10"), OperationId::from("OP20")]);
        assert_eq!(bundle.available_time.value(), 1440.0);
        assert_eq!(bundle.changeover.product_switch.value(), 30.0);
    }

    #[test]
    fn missing_relation_surfaces_as_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_bundle(&CsvSourceConfig { dir: dir.path().to_path_buf() });
        assert!(matches!(result, Err(PlannerError::SourceUnavailable(_))));
    }

    #[test]
    fn write_schedule_omits_setup_rows() {
        use crate::domain::ScheduleRow;
        use crate::units::Minutes;

        let dir = tempfile::tempdir().unwrap();
        let schedule = Schedule {
            rows: vec![
                ScheduleRow {
                    unit: "Unit_1".into(),
                    product: "CHANGEOVER".into(),
                    operation: "SETUP".into(),
                    quantity: 0.0,
                    duration: Minutes(30.0),
                    start_time: Minutes(0.0),
                    end_time: Minutes(30.0),
                    entry_type: EntryType::Setup,
                },
                ScheduleRow {
                    unit: "Unit_1".into(),
                    product: "Product_A".into(),
                    operation: "OP10".into(),
                    quantity: 10.0,
                    duration: Minutes(60.0),
                    start_time: Minutes(30.0),
                    end_time: Minutes(90.0),
                    entry_type: EntryType::Production,
                },
            ],
            bottleneck_time: Minutes(60.0),
            unmet: vec![],
        };

        write_schedule(
            &CsvSourceConfig { dir: dir.path().to_path_buf() },
            &schedule,
        )
        .unwrap();

        let contents = fs::read_to_string(dir.path().join("schedule_output.csv")).unwrap();
        assert_eq!(contents.lines().count(), 2, "header + one Production row");
        assert!(!contents.contains("CHANGEOVER"));
        assert!(contents.contains("Product_A"));
    }
}
