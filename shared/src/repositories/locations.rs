use std::sync::Arc;

use tracing::instrument;

use crate::api::ApiClient;
use crate::error::{AppError, AppResult};
use crate::models::{LatLon, Location, LocationId};

pub const MIN_RADIUS_M: u32 = 500;
pub const MAX_RADIUS_M: u32 = 50_000;

pub struct LocationRepository {
    api: Arc<ApiClient>,
}

impl LocationRepository {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<Location>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.api
            .get_list(
                &["locations", "search"],
                &[("q", query.to_string())],
                "locations",
            )
            .await
    }

    pub async fn get_location(&self, id: &LocationId) -> AppResult<Location> {
        self.api
            .get_item(&["locations", id.as_str()], Some("location"))
            .await
    }

    #[instrument(skip(self), fields(lat = center.lat(), lon = center.lon()))]
    pub async fn nearby(&self, center: LatLon, radius_m: u32) -> AppResult<Vec<Location>> {
        if !(MIN_RADIUS_M..=MAX_RADIUS_M).contains(&radius_m) {
            return Err(AppError::invalid_request(format!(
                "Radius must be between {MIN_RADIUS_M} and {MAX_RADIUS_M} metres, got {radius_m}"
            )));
        }
        self.api
            .get_list(
                &["locations", "nearby"],
                &[
                    ("lat", format!("{:.6}", center.lat())),
                    ("lng", format!("{:.6}", center.lon())),
                    ("radius", radius_m.to_string()),
                ],
                "locations",
            )
            .await
    }
}
