use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::cache::DetailCache;
use crate::error::AppResult;
use crate::models::{
    Activity, ActivityId, CreateActivityRequest, CreatePlanRequest, GroupId, Plan, PlanId,
    UpdateActivityRequest, UpdatePlanRequest,
};
use crate::transport::HttpMethod;

pub struct PlanRepository {
    api: Arc<ApiClient>,
    details: Arc<DetailCache<PlanId, Plan>>,
}

impl PlanRepository {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let capacity = api.config().detail_cache_capacity;
        Self {
            api,
            details: Arc::new(DetailCache::new("plans", capacity)),
        }
    }

    pub fn cache(&self) -> &Arc<DetailCache<PlanId, Plan>> {
        &self.details
    }

    pub async fn list_plans(&self, group_id: &GroupId) -> AppResult<Vec<Plan>> {
        self.api
            .get_list(&["groups", group_id.as_str(), "plans"], &[], "plans")
            .await
    }

    #[instrument(skip(self), fields(plan_id = %id))]
    pub async fn get_plan_detail(&self, id: &PlanId, force_refresh: bool) -> AppResult<Plan> {
        self.details
            .get_or_fetch(id.clone(), force_refresh, move || async move {
                self.api.get_item(&["plans", id.as_str()], Some("plan")).await
            })
            .await
    }

    #[instrument(skip(self, request), fields(group_id = %group_id))]
    pub async fn create_plan(
        &self,
        group_id: &GroupId,
        request: &CreatePlanRequest,
    ) -> AppResult<Plan> {
        let plan: Plan = self
            .api
            .send_json(
                HttpMethod::Post,
                &["groups", group_id.as_str(), "plans"],
                request,
                Some("plan"),
            )
            .await?;
        info!(plan_id = %plan.id, "plan created");
        Ok(plan)
    }

    #[instrument(skip(self, request), fields(plan_id = %id))]
    pub async fn update_plan(&self, id: &PlanId, request: &UpdatePlanRequest) -> AppResult<Plan> {
        let result = self
            .api
            .send_json(HttpMethod::Patch, &["plans", id.as_str()], request, Some("plan"))
            .await;
        self.details.invalidate(id);
        result
    }

    #[instrument(skip(self), fields(plan_id = %id))]
    pub async fn delete_plan(&self, id: &PlanId) -> AppResult<()> {
        let result = self
            .api
            .send_unit(HttpMethod::Delete, &["plans", id.as_str()], None)
            .await;
        self.details.invalidate(id);
        result
    }

    pub async fn list_activities(&self, plan_id: &PlanId) -> AppResult<Vec<Activity>> {
        self.api
            .get_list(&["plans", plan_id.as_str(), "activities"], &[], "activities")
            .await
    }

    // Activity writes change the parent plan's embedded list, so they evict it.

    #[instrument(skip(self, request), fields(plan_id = %plan_id))]
    pub async fn add_activity(
        &self,
        plan_id: &PlanId,
        request: &CreateActivityRequest,
    ) -> AppResult<Activity> {
        let result = self
            .api
            .send_json(
                HttpMethod::Post,
                &["plans", plan_id.as_str(), "activities"],
                request,
                Some("activity"),
            )
            .await;
        self.details.invalidate(plan_id);
        result
    }

    #[instrument(skip(self, request), fields(plan_id = %plan_id, activity_id = %activity_id))]
    pub async fn update_activity(
        &self,
        plan_id: &PlanId,
        activity_id: &ActivityId,
        request: &UpdateActivityRequest,
    ) -> AppResult<Activity> {
        let result = self
            .api
            .send_json(
                HttpMethod::Patch,
                &["plans", plan_id.as_str(), "activities", activity_id.as_str()],
                request,
                Some("activity"),
            )
            .await;
        self.details.invalidate(plan_id);
        result
    }

    #[instrument(skip(self), fields(plan_id = %plan_id, activity_id = %activity_id))]
    pub async fn delete_activity(&self, plan_id: &PlanId, activity_id: &ActivityId) -> AppResult<()> {
        let result = self
            .api
            .send_unit(
                HttpMethod::Delete,
                &["plans", plan_id.as_str(), "activities", activity_id.as_str()],
                None,
            )
            .await;
        self.details.invalidate(plan_id);
        result
    }
}
