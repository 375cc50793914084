// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_TEACHER: &str = "teacher";
pub const ROLE_ADMIN: &str = "admin";

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    pub first_name: String,
    pub last_name: String,

    /// Unique email address.
    pub email: String,

    /// Unique username. Courses list their students by this name.
    pub username: String,

    /// Argon2 password hash (PHC string, salt included).
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'student', 'teacher' or 'admin'.
    pub role: String,

    pub enrolled_courses: Vec<Uuid>,
    pub created_courses: Vec<Uuid>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[validate(email(message = "Email address is not valid."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub last_name: String,
    /// 'student' (default) or 'teacher'. Admins are only seeded.
    #[validate(custom(function = validate_self_service_role))]
    pub role: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

fn validate_self_service_role(role: &str) -> Result<(), validator::ValidationError> {
    if role != ROLE_STUDENT && role != ROLE_TEACHER {
        return Err(validator::ValidationError::new("invalid_role"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            username: "grace".to_string(),
            password: "password123".to_string(),
            email: "grace@example.com".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn registration_accepts_student_and_teacher() {
        assert!(request(None).validate().is_ok());
        assert!(request(Some("teacher")).validate().is_ok());
    }

    #[test]
    fn registration_rejects_admin_role() {
        assert!(request(Some("admin")).validate().is_err());
    }

    #[test]
    fn registration_rejects_bad_email() {
        let mut req = request(None);
        req.email = "not-an-email".to_string();
        assert!(req.validate().is_err());
    }
}
