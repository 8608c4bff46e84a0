//! The changeover rule: a pure function from a unit's previous job to its next one,
//! returning the non-productive setup time that must be inserted between them.
use crate::id::{OperationId, ProductId};
use crate::units::Minutes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the two-tier changeover rule, plus explicit per-pair exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeoverConfig {
    /// Duration inserted when the product changes.
    pub product_switch: Minutes,
    /// Duration inserted when the product is the same but the operation changes.
    pub op_switch: Minutes,
    /// Explicit overrides keyed by `(prev_product, next_product, next_operation)`.
    #[serde(default)]
    pub exceptions: HashMap<(ProductId, ProductId, OperationId), Minutes>,
}

impl ChangeoverConfig {
    /// Compute the changeover duration between a unit's previous job and its next one.
    ///
    /// `prev` is `None` when the unit has no prior work this shift (including, by
    /// construction, at the very start of a reconstruction for a unit with no
    /// equipment WIP).
    #[must_use]
    pub fn changeover(
        &self,
        prev: Option<(&ProductId, &OperationId)>,
        next_product: &ProductId,
        next_op: &OperationId,
    ) -> Minutes {
        let Some((prev_product, prev_op)) = prev else {
            return Minutes::ZERO;
        };

        let key = (prev_product.clone(), next_product.clone(), next_op.clone());
        if let Some(&duration) = self.exceptions.get(&key) {
            return duration;
        }

        if prev_product != next_product {
            return self.product_switch;
        }

        if prev_op != next_op {
            return self.op_switch;
        }

        Minutes::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChangeoverConfig {
        ChangeoverConfig {
            product_switch: Minutes(30.0),
            op_switch: Minutes(30.0),
            exceptions: HashMap::new(),
        }
    }

    #[test]
    fn no_prior_job_means_no_changeover() {
        let cfg = config();
        let got = cfg.changeover(None, &"Product_A".into(), &"OP10".into());
        assert_eq!(got, Minutes::ZERO);
    }

    #[test]
    fn same_product_same_operation_is_free() {
        let cfg = config();
        let prev_p: ProductId = "Product_A".into();
        let prev_o: OperationId = "OP10".into();
        let got = cfg.changeover(
            Some((&prev_p, &prev_o)),
            &"Product_A".into(),
            &"OP10".into(),
        );
        assert_eq!(got, Minutes::ZERO);
    }

    #[test]
    fn product_change_uses_product_switch() {
        let cfg = config();
        let prev_p: ProductId = "Product_A".into();
        let prev_o: OperationId = "OP10".into();
        let got = cfg.changeover(
            Some((&prev_p, &prev_o)),
            &"Product_B".into(),
            &"OP10".into(),
        );
        assert_eq!(got, Minutes(30.0));
    }

    #[test]
    fn operation_change_alone_uses_op_switch() {
        let cfg = config();
        let prev_p: ProductId = "Product_A".into();
        let prev_o: OperationId = "OP10".into();
        let got = cfg.changeover(
            Some((&prev_p, &prev_o)),
            &"Product_A".into(),
            &"OP20".into(),
        );
        assert_eq!(got, Minutes(30.0));
    }

    #[test]
    fn exception_overrides_default_even_to_zero() {
        let mut cfg = config();
        cfg.exceptions.insert(
            ("Product_A".into(), "Product_B".into(), "OP10".into()),
            Minutes::ZERO,
        );
        let prev_p: ProductId = "Product_A".into();
        let prev_o: OperationId = "OP10".into();
        let got = cfg.changeover(
            Some((&prev_p, &prev_o)),
            &"Product_B".into(),
            &"OP10".into(),
        );
        assert_eq!(got, Minutes::ZERO);
    }
}
