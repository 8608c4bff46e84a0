//! Deterministically reconstructs one per-unit timeline from a solved MILP: for every
//! unit, its assigned jobs are laid out back-to-back in `(unit, product)` order, with
//! a changeover interval inserted wherever the changeover rule requires one.
use crate::changeover::ChangeoverConfig;
use crate::domain::{EntryType, InputBundle, Schedule, ScheduleRow, Solution, UnmetRow};
use crate::id::{OperationId, ProductId, UnitId};
use crate::units::Minutes;

/// Product label written onto a Setup row, per the schedule row contract.
const CHANGEOVER_PRODUCT: &str = "CHANGEOVER";
/// Operation label written onto a Setup row, per the schedule row contract.
const CHANGEOVER_OPERATION: &str = "SETUP";

/// Reconstruct the full schedule for a solved input bundle.
///
/// Units are visited in ascending `UnitId` order, and within a unit, assigned jobs are
/// visited in ascending `ProductId` order; this mirrors the contractual ordering that
/// callers (and the results sink) depend on for reproducible output.
#[must_use]
pub fn reconstruct(bundle: &InputBundle, solution: &Solution) -> Schedule {
    let mut rows = Vec::new();
    let mut bottleneck_time = Minutes::ZERO;

    let mut units = bundle.units();
    units.sort();

    for unit in &units {
        let mut jobs: Vec<(ProductId, OperationId, f64)> = solution
            .qty
            .iter()
            .filter(|((_, _, u), _)| u == unit)
            .map(|((p, o, _), &qty)| (p.clone(), o.clone(), qty))
            .collect();
        jobs.sort_by(|(p1, o1, _), (p2, o2, _)| p1.cmp(p2).then_with(|| o1.cmp(o2)));

        let production_time = reconstruct_unit(bundle, unit, &jobs, &mut rows);
        if production_time > bottleneck_time {
            bottleneck_time = production_time;
        }
    }

    let mut unmet: Vec<UnmetRow> = solution
        .unmet
        .iter()
        .map(|((product, operation), &unmet_qty)| UnmetRow {
            product: product.clone(),
            operation: operation.clone(),
            unmet_qty,
        })
        .collect();
    unmet.sort_by(|a, b| a.product.cmp(&b.product).then_with(|| a.operation.cmp(&b.operation)));

    Schedule {
        rows,
        bottleneck_time,
        unmet,
    }
}

/// Lay out one unit's assigned jobs back-to-back and return the sum of its Production
/// row durations (Setup excluded), for the bottleneck metric.
fn reconstruct_unit(
    bundle: &InputBundle,
    unit: &UnitId,
    jobs: &[(ProductId, OperationId, f64)],
    rows: &mut Vec<ScheduleRow>,
) -> Minutes {
    let mut current_time = Minutes::ZERO;
    let mut production_time = Minutes::ZERO;
    let mut prev_job: Option<(ProductId, OperationId)> = None;

    if let Some(wip) = bundle.eqp_wip.get(unit) {
        current_time = wip.end_offset;
        prev_job = Some((wip.product.clone(), wip.operation.clone()));
    }

    let model = bundle.model_of(unit).cloned();

    for (product, operation, qty) in jobs {
        if *qty <= 0.0 {
            continue;
        }

        let changeover_duration = changeover_for(&bundle.changeover, prev_job.as_ref(), product, operation);
        if changeover_duration > Minutes::ZERO {
            let start = current_time;
            current_time = current_time + changeover_duration;
            rows.push(ScheduleRow {
                unit: unit.clone(),
                product: CHANGEOVER_PRODUCT.into(),
                operation: CHANGEOVER_OPERATION.into(),
                quantity: 0.0,
                duration: changeover_duration,
                start_time: start,
                end_time: current_time,
                entry_type: EntryType::Setup,
            });
        }

        let cycle_time = model
            .as_ref()
            .and_then(|m| {
                bundle
                    .process_config
                    .get(&(product.clone(), operation.clone(), m.clone()))
            })
            .copied()
            .unwrap_or(Minutes::ZERO);
        let duration = cycle_time * *qty;

        let start = current_time;
        current_time = current_time + duration;
        production_time = production_time + duration;
        rows.push(ScheduleRow {
            unit: unit.clone(),
            product: product.clone(),
            operation: operation.clone(),
            quantity: *qty,
            duration,
            start_time: start,
            end_time: current_time,
            entry_type: EntryType::Production,
        });

        prev_job = Some((product.clone(), operation.clone()));
    }

    production_time
}

fn changeover_for(
    config: &ChangeoverConfig,
    prev: Option<&(ProductId, OperationId)>,
    next_product: &ProductId,
    next_op: &OperationId,
) -> Minutes {
    let prev_ref = prev.map(|(p, o)| (p, o));
    config.changeover(prev_ref, next_product, next_op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{scenario_a, scenario_c, scenario_e, scenario_f};
    use crate::milp::solve;

    #[test]
    fn scenario_a_produces_rows_in_unit_then_product_order() {
        let bundle = scenario_a();
        let solution = solve(&bundle, 30).unwrap();
        let schedule = reconstruct(&bundle, &solution);
        assert!(!schedule.rows.is_empty());

        let mut last_unit: Option<UnitId> = None;
        for row in &schedule.rows {
            if let Some(ref u) = last_unit {
                assert!(u <= &row.unit);
            }
            last_unit = Some(row.unit.clone());
        }
    }

    #[test]
    fn scenario_c_continuation_does_not_reset_clock_to_zero() {
        let bundle = scenario_c();
        let solution = solve(&bundle, 30).unwrap();
        let schedule = reconstruct(&bundle, &solution);
        let unit_1_rows: Vec<&ScheduleRow> = schedule
            .rows
            .iter()
            .filter(|r| r.unit == UnitId::from("Unit_1"))
            .collect();
        if let Some(first) = unit_1_rows.first() {
            assert!(first.start_time >= Minutes(500.0));
        }
    }

    #[test]
    fn scenario_e_inserts_a_setup_row_between_products() {
        let bundle = scenario_e();
        let solution = solve(&bundle, 30).unwrap();
        let schedule = reconstruct(&bundle, &solution);
        let setup_rows: Vec<&ScheduleRow> = schedule
            .rows
            .iter()
            .filter(|r| r.entry_type == EntryType::Setup)
            .collect();
        assert!(!setup_rows.is_empty());
        for row in &setup_rows {
            assert_eq!(row.product, ProductId::from("CHANGEOVER"));
            assert_eq!(row.operation, OperationId::from("SETUP"));
            assert_eq!(row.quantity, 0.0);
            assert_eq!(row.duration, Minutes(2000.0));
        }

        let production_time: f64 = schedule
            .rows
            .iter()
            .filter(|r| r.entry_type == EntryType::Production)
            .map(|r| r.duration.value())
            .sum();
        assert_eq!(schedule.bottleneck_time.value(), production_time);
    }

    #[test]
    fn scenario_f_exception_removes_the_setup_row() {
        let bundle = scenario_f();
        let solution = solve(&bundle, 30).unwrap();
        let schedule = reconstruct(&bundle, &solution);
        let has_setup = schedule
            .rows
            .iter()
            .any(|r| r.entry_type == EntryType::Setup);
        assert!(!has_setup);
    }
}
