//! Route → display category lookup.

use std::collections::HashMap;

use crate::model::{RouteId, VehicleCategory};

/// Fixed route-to-category table. Routes not in the table are
/// [`VehicleCategory::Unknown`].
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    table: HashMap<RouteId, VehicleCategory>,
}

impl Classifier {
    pub fn new(routes: impl IntoIterator<Item = (RouteId, VehicleCategory)>) -> Self {
        Self {
            table: routes.into_iter().collect(),
        }
    }

    pub fn classify(&self, route: RouteId) -> VehicleCategory {
        self.table
            .get(&route)
            .copied()
            .unwrap_or(VehicleCategory::Unknown)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
