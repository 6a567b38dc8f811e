use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One concrete way to satisfy part of an analysis request: a capability,
/// a dataset and a full parameter binding, scored for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub capability_id: String,
    pub dataset_name: String,
    pub parameters: Map<String, Value>,
    /// Compatibility score for the (capability, dataset) pair, in [0, 1].
    pub compatibility_score: f64,
    /// Integer rank; planner output is sorted descending by this.
    pub priority: i64,
    /// Rough relative cost estimate for hosts; not part of prioritization.
    pub estimated_cost: f64,
}
