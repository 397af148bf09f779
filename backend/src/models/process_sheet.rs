//! Process sheet: the recipe of a product

use crate::core::types::{Capacity, CapacityType, Product};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capacity each capacity type must supply to build one unit of `product`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSheet {
    pub product: Product,
    pub requirements: BTreeMap<CapacityType, Capacity>,
}

impl ProcessSheet {
    pub fn new(product: Product, requirements: impl IntoIterator<Item = (CapacityType, Capacity)>) -> Self {
        Self {
            product,
            requirements: requirements.into_iter().collect(),
        }
    }
}
