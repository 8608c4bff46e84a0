//! The strongly-typed data model shared by the MILP builder and the schedule
//! reconstructor: the Input Bundle, the raw Solution produced by the solver, and the
//! Schedule Row the reconstructor emits.
use crate::changeover::ChangeoverConfig;
use crate::error::PlannerError;
use crate::id::{ModelId, OperationId, ProductId, UnitId};
use crate::units::Minutes;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A unit already partway through a job when the shift starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentWip {
    pub product: ProductId,
    pub operation: OperationId,
    /// Remaining occupation from the in-progress job.
    pub end_offset: Minutes,
}

/// The full set of data needed to build and solve one scheduling problem.
#[derive(Debug, Clone)]
pub struct InputBundle {
    /// Final-operation demand target per product.
    pub demands: IndexMap<ProductId, f64>,
    /// The process route, shared by all products; index 0 is the first operation.
    pub operations: Vec<OperationId>,
    /// Equipment model -> the units belonging to it.
    pub equipment_models: IndexMap<ModelId, Vec<UnitId>>,
    /// `(product, operation, model) -> cycle time`.
    pub process_config: HashMap<(ProductId, OperationId, ModelId), Minutes>,
    /// Shift length per unit.
    pub available_time: Minutes,
    /// `(product, operation) -> quantity already waiting before that operation`.
    pub wip: HashMap<(ProductId, OperationId), f64>,
    /// Units that are already partway through a job at t=0.
    pub eqp_wip: HashMap<UnitId, EquipmentWip>,
    /// `(product, operation) -> tool count`. Missing pairs are treated as unconstrained.
    pub tools: HashMap<(ProductId, OperationId), u32>,
    pub changeover: ChangeoverConfig,
}

/// The default tool count used for a `(product, operation)` pair with no explicit entry.
pub const UNCONSTRAINED_TOOL_COUNT: u32 = 99;

/// Numerical noise below this magnitude is treated as zero throughout the pipeline.
pub const EPSILON: f64 = 1e-5;

/// `strftime` format for the `rule_timekey` stamped once per results-upload batch.
pub const RULE_TIMEKEY_FORMAT: &str = "%Y%m%d%H%M%S";

impl InputBundle {
    /// All units across every equipment model.
    #[must_use]
    pub fn units(&self) -> Vec<UnitId> {
        self.equipment_models.values().flatten().cloned().collect()
    }

    /// The model a given unit belongs to, if any.
    #[must_use]
    pub fn model_of(&self, unit: &UnitId) -> Option<&ModelId> {
        self.equipment_models
            .iter()
            .find(|(_, units)| units.contains(unit))
            .map(|(model, _)| model)
    }

    /// The `(product, operation, unit)` triples a unit of some model can actually run.
    #[must_use]
    pub fn valid_combinations(&self) -> Vec<(ProductId, OperationId, UnitId)> {
        let mut out = Vec::new();
        for (product, operation, model) in self.process_config.keys() {
            if let Some(units) = self.equipment_models.get(model) {
                for unit in units {
                    out.push((product.clone(), operation.clone(), unit.clone()));
                }
            }
        }
        out
    }

    /// The tool count available for a `(product, operation)` pair.
    #[must_use]
    pub fn tool_count(&self, product: &ProductId, operation: &OperationId) -> u32 {
        self.tools
            .get(&(product.clone(), operation.clone()))
            .copied()
            .unwrap_or(UNCONSTRAINED_TOOL_COUNT)
    }

    /// The last operation in the process route.
    #[must_use]
    pub fn last_operation(&self) -> &OperationId {
        self.operations
            .last()
            .expect("operations is validated non-empty")
    }

    /// Check every structural precondition from the component design. Called once,
    /// at construction time; never re-checked mid-run.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.operations.is_empty() {
            return Err(PlannerError::InputInvalid(
                "operations must not be empty".into(),
            ));
        }

        let known_models: HashSet<&ModelId> = self.equipment_models.keys().collect();
        for (product, operation, model) in self.process_config.keys() {
            if !known_models.contains(model) {
                return Err(PlannerError::InputInvalid(format!(
                    "process_config references unknown model {model} for ({product}, {operation})"
                )));
            }
        }

        let mut seen_units: HashSet<&UnitId> = HashSet::new();
        for (model, units) in &self.equipment_models {
            if units.is_empty() {
                return Err(PlannerError::InputInvalid(format!(
                    "model {model} has no units"
                )));
            }
            for unit in units {
                if !seen_units.insert(unit) {
                    return Err(PlannerError::InputInvalid(format!(
                        "unit {unit} belongs to more than one model"
                    )));
                }
            }
        }

        for ((product, operation, model), cycle_time) in &self.process_config {
            if cycle_time.value() <= 0.0 {
                return Err(PlannerError::InputInvalid(format!(
                    "cycle time for ({product}, {operation}, {model}) must be positive"
                )));
            }
        }

        if self.available_time.value() <= 0.0 {
            return Err(PlannerError::InputInvalid(
                "available_time must be positive".into(),
            ));
        }

        for (product, demand) in &self.demands {
            if *demand < 0.0 {
                return Err(PlannerError::InputInvalid(format!(
                    "demand for {product} must be non-negative"
                )));
            }
        }

        for ((product, operation), qty) in &self.wip {
            if *qty < 0.0 {
                return Err(PlannerError::InputInvalid(format!(
                    "wip for ({product}, {operation}) must be non-negative"
                )));
            }
        }

        for ((product, operation), count) in &self.tools {
            if *count == 0 {
                return Err(PlannerError::InputInvalid(format!(
                    "tool count for ({product}, {operation}) must be positive when present"
                )));
            }
        }

        Ok(())
    }
}

/// Solver outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionStatus {
    Optimal,
    Feasible,
    Infeasible,
    SolverError,
}

/// The raw result of solving the MILP, before schedule reconstruction.
#[derive(Debug, Clone)]
pub struct Solution {
    pub qty: HashMap<(ProductId, OperationId, UnitId), f64>,
    pub assign: HashSet<(ProductId, OperationId, UnitId)>,
    pub unmet: HashMap<(ProductId, OperationId), f64>,
    pub status: SolutionStatus,
}

impl Solution {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, SolutionStatus::Optimal | SolutionStatus::Feasible)
    }
}

/// Whether a schedule row represents productive work or a setup interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    Production,
    Setup,
}

/// One row of a reconstructed per-unit timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub unit: UnitId,
    pub product: ProductId,
    pub operation: OperationId,
    pub quantity: f64,
    pub duration: Minutes,
    pub start_time: Minutes,
    pub end_time: Minutes,
    pub entry_type: EntryType,
}

/// A shortage report for one `(product, operation)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmetRow {
    pub product: ProductId,
    pub operation: OperationId,
    pub unmet_qty: f64,
}

/// The fully reconstructed schedule for one solved job.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub rows: Vec<ScheduleRow>,
    pub bottleneck_time: Minutes,
    pub unmet: Vec<UnmetRow>,
}

/// A set of IDs known to be valid, for cross-referencing CSV input rows.
pub type IdSet<T> = IndexSet<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario_a;

    #[test]
    fn valid_bundle_passes_validation() {
        assert!(scenario_a().validate().is_ok());
    }

    #[test]
    fn unit_in_two_models_is_rejected() {
        let mut bundle = scenario_a();
        let dup_unit: UnitId = "Unit_1".into();
        bundle
            .equipment_models
            .get_mut(&ModelId::from("Model_Y"))
            .unwrap()
            .push(dup_unit);
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn negative_cycle_time_is_rejected() {
        let mut bundle = scenario_a();
        let key = (
            "Product_A".into(),
            "OP10".into(),
            ModelId::from("Model_X"),
        );
        bundle.process_config.insert(key, Minutes(-1.0));
        assert!(bundle.validate().is_err());
    }
}
