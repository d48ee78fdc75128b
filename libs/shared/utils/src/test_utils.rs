use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "parent".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn professional(email: &str) -> Self {
        Self::new(email, "professional")
    }

    pub fn parent(email: &str) -> Self {
        Self::new(email, "parent")
    }

    pub fn caregiver(email: &str) -> Self {
        Self::new(email, "caregiver")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }
}

/// Canned PostgREST rows for the scheduling tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn template_row(
        professional_id: &str,
        clinic_id: Option<&str>,
        day_of_week: i32,
        start_time: &str,
        end_time: &str,
        slot_duration_minutes: i32,
    ) -> Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "professional_id": professional_id,
            "clinic_id": clinic_id,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "slot_duration_minutes": slot_duration_minutes,
            "is_active": true,
            "created_at": "2026-01-05T08:00:00",
            "updated_at": "2026-01-05T08:00:00"
        })
    }

    pub fn exception_row(
        professional_id: &str,
        exception_date: &str,
        kind: &str,
        reason: Option<&str>,
    ) -> Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "professional_id": professional_id,
            "clinic_id": null,
            "exception_date": exception_date,
            "kind": kind,
            "start_time": null,
            "end_time": null,
            "reason": reason,
            "created_at": "2026-01-05T08:00:00"
        })
    }

    pub fn appointment_row(
        professional_id: &str,
        baby_id: &str,
        start_at: &str,
        end_at: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "baby_id": baby_id,
            "professional_id": professional_id,
            "clinic_id": null,
            "start_at": start_at,
            "end_at": end_at,
            "duration_minutes": 30,
            "kind": "consultation",
            "status": status,
            "title": "Alice - Consulta",
            "notes": null,
            "booked_by_user_id": null,
            "source": "APP",
            "cancellation_reason": null,
            "cancelled_at": null,
            "visit_id": null,
            "created_at": "2026-01-05T08:00:00",
            "updated_at": "2026-01-05T08:00:00"
        })
    }

    pub fn baby_row(baby_id: &str, name: &str) -> Value {
        json!({
            "id": baby_id,
            "name": name,
            "birth_date": "2025-06-01"
        })
    }

    pub fn care_link_row(professional_id: &str, baby_id: &str, status: &str) -> Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "professional_id": professional_id,
            "baby_id": baby_id,
            "status": status,
            "created_at": "2026-01-05T08:00:00"
        })
    }
}
