//! Identifier newtypes shared across the data model.
//!
//! Identifiers are backed by `Rc<str>` so that the same product, operation, model or
//! unit name can appear in thousands of `(product, operation, unit)` combinations
//! without each occurrence owning its own string allocation.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// Declare a string-backed identifier newtype wrapping `Rc<str>`.
macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Rc<str>);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(Rc::from(s.as_str()))
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(ProductId);
id_type!(OperationId);
id_type!(ModelId);
id_type!(UnitId);

/// Indicates that the struct has an ID field.
pub trait HasID {
    /// Get a string representation of the struct's ID.
    fn get_id(&self) -> &str;
}

/// A data structure containing a set of IDs.
pub trait IDCollection<ID>
where
    ID: Eq + Hash + Borrow<str>,
{
    /// Get the ID after checking that it exists in this collection.
    fn get_id(&self, id: &str) -> Result<ID>;
}

impl<ID> IDCollection<ID> for HashSet<ID>
where
    ID: Eq + Hash + Borrow<str> + Clone,
{
    fn get_id(&self, id: &str) -> Result<ID> {
        let found = self
            .get(id)
            .with_context(|| format!("Unknown ID {id} found"))?;
        Ok(found.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_shares_repr_across_clones() {
        let a: ProductId = "Product_A".into();
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Product_A");
    }

    #[test]
    fn id_collection_rejects_unknown_id() {
        let ids: HashSet<ProductId> = HashSet::from(["Product_A".into()]);
        assert!(ids.get_id("Product_A").is_ok());
        assert!(ids.get_id("Product_Z").is_err());
    }
}
