//! Literal fixture bundles for the properties and scenarios this crate is tested
//! against, plus small `rstest` fixtures for unit tests elsewhere in the crate.
//!
//! `scenario_a` also backs `system_mode = "local_test"`: a fixed, reproducible bundle
//! that needs no flat files or live backend, for local development and CI runs of the
//! CLI `run` command.
use crate::changeover::ChangeoverConfig;
use crate::domain::{EquipmentWip, InputBundle};
use crate::units::Minutes;
use indexmap::{IndexMap, indexmap};
use std::collections::HashMap;

#[cfg(test)]
use rstest::fixture;

/// Assert that a `PlannerError` with the given message occurs.
#[cfg(test)]
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!($result.unwrap_err().to_string(), $msg);
    };
}
#[cfg(test)]
#[allow(unused_imports)]
pub(crate) use assert_error;

/// The bundle used by `system_mode = "local_test"`: identical to Scenario A.
#[must_use]
pub fn local_test_bundle() -> InputBundle {
    scenario_a()
}

fn base_demands() -> IndexMap<crate::id::ProductId, f64> {
    indexmap! {
        "Product_A".into() => 100.0,
        "Product_B".into() => 100.0,
    }
}

fn base_equipment_models() -> IndexMap<crate::id::ModelId, Vec<crate::id::UnitId>> {
    indexmap! {
        "Model_X".into() => vec!["Unit_1".into(), "Unit_2".into()],
        "Model_Y".into() => vec!["Unit_3".into(), "Unit_4".into()],
    }
}

fn base_process_config() -> HashMap<(crate::id::ProductId, crate::id::OperationId, crate::id::ModelId), Minutes> {
    HashMap::from([
        (
            ("Product_A".into(), "OP10".into(), "Model_X".into()),
            Minutes(100.0),
        ),
        (
            ("Product_B".into(), "OP10".into(), "Model_X".into()),
            Minutes(100.0),
        ),
        (
            ("Product_A".into(), "OP20".into(), "Model_Y".into()),
            Minutes(100.0),
        ),
        (
            ("Product_B".into(), "OP20".into(), "Model_Y".into()),
            Minutes(100.0),
        ),
    ])
}

fn base_changeover() -> ChangeoverConfig {
    ChangeoverConfig {
        product_switch: Minutes(2000.0),
        op_switch: Minutes(2000.0),
        exceptions: HashMap::new(),
    }
}

/// Scenario A — trivial feasible problem, no equipment WIP or tool limits.
#[must_use]
pub fn scenario_a() -> InputBundle {
    InputBundle {
        demands: base_demands(),
        operations: vec!["OP10".into(), "OP20".into()],
        equipment_models: base_equipment_models(),
        process_config: base_process_config(),
        available_time: Minutes(11000.0),
        wip: HashMap::from([
            (("Product_A".into(), "OP10".into()), 100.0),
            (("Product_B".into(), "OP10".into()), 100.0),
            (("Product_A".into(), "OP20".into()), 0.0),
            (("Product_B".into(), "OP20".into()), 0.0),
        ]),
        eqp_wip: HashMap::new(),
        tools: HashMap::new(),
        changeover: base_changeover(),
    }
}

/// Scenario B — tool-limited concurrency: only one unit may run `(Product_A, OP10)`.
#[must_use]
pub fn scenario_b() -> InputBundle {
    let mut bundle = scenario_a();
    bundle
        .tools
        .insert(("Product_A".into(), "OP10".into()), 1);
    bundle
}

/// Scenario C — equipment-WIP continuity: `Unit_1` is already running
/// `(Product_A, OP10)` with 500 minutes remaining at t=0.
#[must_use]
pub fn scenario_c() -> InputBundle {
    let mut bundle = scenario_a();
    bundle.eqp_wip.insert(
        "Unit_1".into(),
        EquipmentWip {
            product: "Product_A".into(),
            operation: "OP10".into(),
            end_offset: Minutes(500.0),
        },
    );
    bundle
}

/// Scenario D — infeasible at the final operation: no material available at OP10,
/// so OP20 demand cannot be met.
#[must_use]
pub fn scenario_d() -> InputBundle {
    let mut bundle = scenario_a();
    bundle
        .wip
        .insert(("Product_A".into(), "OP10".into()), 0.0);
    bundle
        .wip
        .insert(("Product_B".into(), "OP10".into()), 0.0);
    bundle
}

/// Scenario E — a single unit must run both products at the same operation, so a
/// changeover is forced between them.
#[must_use]
pub fn scenario_e() -> InputBundle {
    InputBundle {
        demands: indexmap! {
            "Product_A".into() => 50.0,
            "Product_B".into() => 50.0,
        },
        operations: vec!["OP10".into()],
        equipment_models: indexmap! {
            "Model_Z".into() => vec!["Unit_1".into()],
        },
        process_config: HashMap::from([
            (
                ("Product_A".into(), "OP10".into(), "Model_Z".into()),
                Minutes(10.0),
            ),
            (
                ("Product_B".into(), "OP10".into(), "Model_Z".into()),
                Minutes(10.0),
            ),
        ]),
        available_time: Minutes(2000.0),
        wip: HashMap::from([
            (("Product_A".into(), "OP10".into()), 50.0),
            (("Product_B".into(), "OP10".into()), 50.0),
        ]),
        eqp_wip: HashMap::new(),
        tools: HashMap::new(),
        changeover: base_changeover(),
    }
}

/// Scenario F — same forced-changeover shape as Scenario E, but with an explicit
/// exception bringing the `(Product_A -> Product_B, OP10)` changeover to zero.
#[must_use]
pub fn scenario_f() -> InputBundle {
    let mut bundle = scenario_e();
    bundle.changeover.exceptions.insert(
        ("Product_A".into(), "Product_B".into(), "OP10".into()),
        Minutes::ZERO,
    );
    bundle
}

#[cfg(test)]
#[fixture]
pub fn bundle_a() -> InputBundle {
    scenario_a()
}

#[cfg(test)]
#[fixture]
pub fn bundle_b() -> InputBundle {
    scenario_b()
}

#[cfg(test)]
#[fixture]
pub fn bundle_c() -> InputBundle {
    scenario_c()
}

#[cfg(test)]
#[fixture]
pub fn bundle_d() -> InputBundle {
    scenario_d()
}

#[cfg(test)]
#[fixture]
pub fn bundle_e() -> InputBundle {
    scenario_e()
}

#[cfg(test)]
#[fixture]
pub fn bundle_f() -> InputBundle {
    scenario_f()
}
