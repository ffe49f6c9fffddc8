use serde::{Deserialize, Deserializer, Serialize};

use crate::models::Role;

// -- JWT Claims --

/// Identity carried inside a signed access token. Shared by the API
/// (issuing + verifying) and anything that needs to inspect a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: Role,
    pub name: String,
    pub exp: usize,
}

// -- Auth --

/// Fields default to empty so missing ones surface as a validation message
/// rather than a deserialization failure.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}

// -- Users --

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Plain acknowledgement body, e.g. `{"message": "User deleted"}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- Reports --

/// Report submission. Numeric fields accept either JSON numbers or numeric
/// strings, since browser form values arrive as text.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateReportRequest {
    #[serde(default, deserialize_with = "lenient_int")]
    pub class_id: Option<i64>,
    #[serde(default)]
    pub faculty_name: String,
    #[serde(default, deserialize_with = "lenient_int")]
    pub week_of_reporting: Option<i64>,
    #[serde(default)]
    pub date_of_lecture: String,
    #[serde(default, deserialize_with = "lenient_int")]
    pub actual_students_present: Option<i64>,
    #[serde(default)]
    pub scheduled_lecture_time: String,
    #[serde(default)]
    pub topic_taught: String,
    #[serde(default)]
    pub learning_outcomes: String,
    #[serde(default)]
    pub lecturer_recommendations: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReportQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(i64),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("'{}' is not a whole number", text))),
    }
}
