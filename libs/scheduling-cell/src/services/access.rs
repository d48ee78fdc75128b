// libs/scheduling-cell/src/services/access.rs
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::SchedulingError;

/// Capability consumed by the booking path: may this professional manage
/// this baby? Implementations must fail closed. A lookup error is a
/// denial, never a grant.
#[async_trait]
pub trait BabyAccess: Send + Sync {
    async fn can_manage_baby(
        &self,
        professional_id: Uuid,
        baby_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, SchedulingError>;
}

/// PostgREST-backed implementation over the `professional_baby_links`
/// table maintained by the care-team subsystem.
pub struct SupabaseBabyAccess {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseBabyAccess {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl BabyAccess for SupabaseBabyAccess {
    async fn can_manage_baby(
        &self,
        professional_id: Uuid,
        baby_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let path = format!(
            "/rest/v1/professional_baby_links?professional_id=eq.{}&baby_id=eq.{}&status=eq.active&limit=1",
            professional_id, baby_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| {
                warn!("Care link lookup failed for professional {}: {}", professional_id, e);
                SchedulingError::Database(e.to_string())
            })?;

        let linked = !result.is_empty();
        debug!(
            "Care link check professional {} / baby {}: {}",
            professional_id, baby_id, linked
        );

        Ok(linked)
    }
}
