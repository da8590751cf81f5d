//! Plan persistence.

mod json;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::plan::Plan;

pub use json::JsonPlanStore;

pub trait PlanStore: Send + Sync {
    fn save(&self, plan: &Plan) -> Result<(), StoreError>;

    fn load(&self, plan_id: &str) -> Result<Plan, StoreError>;

    fn exists(&self, plan_id: &str) -> bool;
}

/// Keeps serialized plans in process memory. Goes through the same JSON form
/// as [`JsonPlanStore`], so loads are validated too.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: Mutex<HashMap<String, String>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlanStore for InMemoryPlanStore {
    fn save(&self, plan: &Plan) -> Result<(), StoreError> {
        let json = serde_json::to_string(plan)?;
        let mut plans = self.plans.lock().unwrap_or_else(|e| e.into_inner());
        plans.insert(plan.plan_id().to_string(), json);
        Ok(())
    }

    fn load(&self, plan_id: &str) -> Result<Plan, StoreError> {
        let plans = self.plans.lock().unwrap_or_else(|e| e.into_inner());
        let json = plans
            .get(plan_id)
            .ok_or_else(|| StoreError::NotFound(plan_id.to_string()))?;
        Ok(serde_json::from_str(json)?)
    }

    fn exists(&self, plan_id: &str) -> bool {
        self.plans
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(plan_id)
    }
}
