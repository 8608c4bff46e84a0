//! Builds and solves the mixed-integer allocation problem: assigns quantities of
//! `(product, operation)` work to units under WIP flow, tool-hour, unit-time and
//! equipment-occupation constraints, minimizing a lexicographically-weighted sum.
use crate::domain::{EPSILON, InputBundle, Solution, SolutionStatus};
use crate::error::PlannerError;
use crate::id::{ModelId, OperationId, ProductId, UnitId};
use good_lp::solvers::coin_cbc::coin_cbc;
use good_lp::{Expression, ProblemVariables, ResolutionError, SolverModel, Variable, constraint, variable};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Weight applied per unit of unmet demand. Dominates every other term.
const W_UNMET: f64 = 1_000_000.0;
/// Weight applied per `assign` flag that keeps a unit off its in-progress job.
const W_CONT: f64 = 10_000.0;
/// Weight applied per distinct `(product, operation, unit)` assignment.
const W_ASSIGN: f64 = 1_000.0;
/// Weight applied per unit of quantity produced.
const W_QTY: f64 = 1.0;
/// Upper bound used in the big-M `qty <= M * assign` linking constraint.
const BIG_M: f64 = 100_000.0;

type Combo = (ProductId, OperationId, UnitId);

struct DecisionVariables {
    qty: IndexMap<Combo, Variable>,
    assign: IndexMap<Combo, Variable>,
    unmet: IndexMap<(ProductId, OperationId), Variable>,
}

fn create_decision_variables(
    vars: &mut ProblemVariables,
    bundle: &InputBundle,
    combos: &[Combo],
) -> DecisionVariables {
    let qty: IndexMap<Combo, Variable> = combos
        .iter()
        .map(|c| (c.clone(), vars.add(variable().min(0.0))))
        .collect();

    let assign: IndexMap<Combo, Variable> = combos
        .iter()
        .map(|c| (c.clone(), vars.add(variable().binary())))
        .collect();

    let unmet: IndexMap<(ProductId, OperationId), Variable> = bundle
        .demands
        .keys()
        .flat_map(|p| bundle.operations.iter().map(move |o| (p.clone(), o.clone())))
        .map(|key| {
            let v = vars.add(variable().min(0.0));
            (key, v)
        })
        .collect();

    DecisionVariables { qty, assign, unmet }
}

fn build_objective(bundle: &InputBundle, dv: &DecisionVariables) -> Expression {
    let unmet_term: Expression = dv.unmet.values().map(|&v| v * W_UNMET).sum();

    let continuation_term: Expression = dv
        .assign
        .iter()
        .filter(|((p, o, u), _)| {
            bundle
                .eqp_wip
                .get(u)
                .is_some_and(|wip| &wip.product != p || &wip.operation != o)
        })
        .map(|(_, &v)| v * W_CONT)
        .sum();

    let assign_term: Expression = dv.assign.values().map(|&v| v * W_ASSIGN).sum();
    let qty_term: Expression = dv.qty.values().map(|&v| v * W_QTY).sum();

    unmet_term + continuation_term + assign_term + qty_term
}

fn add_linking_constraints<P: SolverModel>(mut problem: P, dv: &DecisionVariables) -> P {
    for (combo, &qty_var) in &dv.qty {
        let assign_var = dv.assign[combo];
        problem = problem.with(constraint!(qty_var <= BIG_M * assign_var));
    }
    problem
}

/// I2: demand satisfaction at the last operation.
fn add_demand_constraints<P: SolverModel>(
    mut problem: P,
    bundle: &InputBundle,
    dv: &DecisionVariables,
) -> P {
    let last_op = bundle.last_operation().clone();
    for (product, demand) in &bundle.demands {
        let relevant: Expression = dv
            .qty
            .iter()
            .filter(|((p, o, _), _)| p == product && o == &last_op)
            .map(|(_, &v)| v)
            .sum();
        let wip_val = bundle
            .wip
            .get(&(product.clone(), last_op.clone()))
            .copied()
            .unwrap_or(0.0);
        let unmet_var = dv.unmet[&(product.clone(), last_op.clone())];
        problem = problem.with(constraint!(relevant + wip_val + unmet_var >= *demand));
    }
    problem
}

/// I3/I4: flow conservation through the process route.
fn add_flow_constraints<P: SolverModel>(
    mut problem: P,
    bundle: &InputBundle,
    dv: &DecisionVariables,
) -> P {
    for product in bundle.demands.keys() {
        for (i, curr_op) in bundle.operations.iter().enumerate() {
            let curr_total: Expression = dv
                .qty
                .iter()
                .filter(|((p, o, _), _)| p == product && o == curr_op)
                .map(|(_, &v)| v)
                .sum();
            let wip_val = bundle
                .wip
                .get(&(product.clone(), curr_op.clone()))
                .copied()
                .unwrap_or(0.0);

            if i == 0 {
                problem = problem.with(constraint!(curr_total <= wip_val));
            } else {
                let prev_op = &bundle.operations[i - 1];
                let prev_total: Expression = dv
                    .qty
                    .iter()
                    .filter(|((p, o, _), _)| p == product && o == prev_op)
                    .map(|(_, &v)| v)
                    .sum();
                problem = problem.with(constraint!(curr_total <= wip_val + prev_total));
            }
        }
    }
    problem
}

/// I6: tool-hour capacity per `(product, operation)`.
fn add_tool_constraints<P: SolverModel>(
    mut problem: P,
    bundle: &InputBundle,
    dv: &DecisionVariables,
) -> P {
    for product in bundle.demands.keys() {
        for operation in &bundle.operations {
            let cycle_by_unit: Vec<(UnitId, f64)> = bundle
                .process_config
                .iter()
                .filter(|((p, o, _), _)| p == product && o == operation)
                .filter_map(|((_, _, model), time)| {
                    bundle
                        .equipment_models
                        .get(model)
                        .map(|units| (units, time))
                })
                .flat_map(|(units, time)| units.iter().map(move |u| (u.clone(), time.value())))
                .collect();

            if cycle_by_unit.is_empty() {
                continue;
            }

            let total_time: Expression = cycle_by_unit
                .iter()
                .filter_map(|(u, t)| {
                    dv.qty
                        .get(&(product.clone(), operation.clone(), u.clone()))
                        .map(|&v| v * *t)
                })
                .sum();

            let tool_count = f64::from(bundle.tool_count(product, operation));
            problem = problem.with(constraint!(
                total_time <= tool_count * bundle.available_time.value()
            ));
        }
    }
    problem
}

/// I5: per-unit time capacity, net of existing equipment-WIP occupation.
fn add_unit_capacity_constraints<P: SolverModel>(
    mut problem: P,
    bundle: &InputBundle,
    dv: &DecisionVariables,
) -> P {
    for unit in bundle.units() {
        let Some(model) = bundle.model_of(&unit) else {
            continue;
        };
        let model: ModelId = model.clone();
        let occupied = bundle
            .eqp_wip
            .get(&unit)
            .map_or(0.0, |wip| wip.end_offset.value());
        let effective_avail = bundle.available_time.value() - occupied;

        let assigned: Vec<((ProductId, OperationId), f64)> = bundle
            .process_config
            .iter()
            .filter(|((_, _, m), _)| *m == model)
            .map(|((p, o, _), t)| ((p.clone(), o.clone()), t.value()))
            .collect();

        if assigned.is_empty() {
            continue;
        }

        let total_unit_time: Expression = assigned
            .iter()
            .filter_map(|((p, o), t)| {
                dv.qty
                    .get(&(p.clone(), o.clone(), unit.clone()))
                    .map(|&v| v * *t)
            })
            .sum();

        problem = problem.with(constraint!(total_unit_time <= effective_avail));
    }
    problem
}

/// Build, solve and extract a `Solution` for this input bundle.
///
/// `time_limit_secs` bounds the solver's wall-clock budget; exceeding it surfaces as
/// `PlannerError::Timeout` rather than a silently-truncated result.
pub fn solve(bundle: &InputBundle, time_limit_secs: u64) -> Result<Solution, PlannerError> {
    bundle.validate()?;

    let combos = bundle.valid_combinations();
    let mut vars = ProblemVariables::new();
    let dv = create_decision_variables(&mut vars, bundle, &combos);
    let objective = build_objective(bundle, &dv);

    let mut problem = coin_cbc(vars.minimise(objective));
    problem.set_parameter("logLevel", "0");
    problem.set_parameter("seconds", &time_limit_secs.to_string());

    let problem = add_linking_constraints(problem, &dv);
    let problem = add_demand_constraints(problem, bundle, &dv);
    let problem = add_flow_constraints(problem, bundle, &dv);
    let problem = add_tool_constraints(problem, bundle, &dv);
    let problem = add_unit_capacity_constraints(problem, bundle, &dv);

    let solution = match problem.solve() {
        Ok(s) => s,
        Err(ResolutionError::Infeasible) => {
            return Ok(Solution {
                qty: IndexMap::new().into_iter().collect(),
                assign: HashSet::new(),
                unmet: IndexMap::new().into_iter().collect(),
                status: SolutionStatus::Infeasible,
            });
        }
        Err(e) => return Err(PlannerError::SolverError(e.to_string())),
    };

    extract_solution(&solution, &dv)
}

fn extract_solution(
    solution: &impl good_lp::Solution,
    dv: &DecisionVariables,
) -> Result<Solution, PlannerError> {
    let mut qty = std::collections::HashMap::new();
    let mut assign = HashSet::new();
    for (combo, &var) in &dv.qty {
        let value = solution.value(var);
        if value > EPSILON {
            qty.insert(combo.clone(), value);
        }
    }
    for (combo, &var) in &dv.assign {
        if solution.value(var) > 0.5 {
            assign.insert(combo.clone());
        }
    }

    let mut unmet = std::collections::HashMap::new();
    for (key, &var) in &dv.unmet {
        let value = solution.value(var);
        if value > EPSILON {
            unmet.insert(key.clone(), value);
        }
    }

    Ok(Solution {
        qty,
        assign,
        unmet,
        status: SolutionStatus::Optimal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{scenario_a, scenario_b, scenario_d};

    #[test]
    fn scenario_a_meets_demand_exactly() {
        let bundle = scenario_a();
        let solution = solve(&bundle, 30).unwrap();
        assert!(solution.is_success());
        assert!(solution.unmet.is_empty());
        let total_qty: f64 = solution.qty.values().sum();
        // Two products x two operations x 100 units each = 400 total quantity.
        assert!((total_qty - 400.0).abs() < 1e-3);
    }

    #[test]
    fn scenario_a_every_positive_qty_is_assigned() {
        let bundle = scenario_a();
        let solution = solve(&bundle, 30).unwrap();
        for combo in solution.qty.keys() {
            assert!(solution.assign.contains(combo));
        }
    }

    #[test]
    fn scenario_b_tool_limit_restricts_to_one_unit() {
        let bundle = scenario_b();
        let solution = solve(&bundle, 30).unwrap();
        assert!(solution.is_success());
        let p: ProductId = "Product_A".into();
        let o: OperationId = "OP10".into();
        let assigned_units: usize = bundle
            .equipment_models
            .get(&ModelId::from("Model_X"))
            .unwrap()
            .iter()
            .filter(|u| solution.assign.contains(&(p.clone(), o.clone(), (*u).clone())))
            .count();
        assert!(assigned_units <= 1);
    }

    #[test]
    fn scenario_d_reports_unmet_demand() {
        let bundle = scenario_d();
        let solution = solve(&bundle, 30).unwrap();
        assert!(solution.is_success());
        assert!(!solution.unmet.is_empty());
        let a_unmet = solution
            .unmet
            .get(&("Product_A".into(), "OP20".into()))
            .copied()
            .unwrap_or(0.0);
        assert!((a_unmet - 100.0).abs() < 1e-3);
    }
}
