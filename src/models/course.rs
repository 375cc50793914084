// src/models/course.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;
use validator::Validate;

use crate::services::ordering::Ordered;

/// Publication state of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CourseState {
    InEdition,
    Active,
    Inactive,
    Published,
}

impl CourseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseState::InEdition => "in-edition",
            CourseState::Active => "active",
            CourseState::Inactive => "inactive",
            CourseState::Published => "published",
        }
    }
}

impl fmt::Display for CourseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-edition" => Ok(CourseState::InEdition),
            "active" => Ok(CourseState::Active),
            "inactive" => Ok(CourseState::Inactive),
            "published" => Ok(CourseState::Published),
            other => Err(format!("unknown course state '{}'", other)),
        }
    }
}

/// Cover image stored inline with the course document.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseImage {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// A course document. Tabs (and their contents) are embedded and persisted
/// together with the course.
#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: String,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,

    /// Only presence is exposed; the bytes are served by the image endpoint.
    #[serde(rename = "has_image", serialize_with = "serialize_has_image")]
    pub image: Option<CourseImage>,

    /// Enrolled students by username, in enrollment order.
    pub student_list: Vec<String>,

    /// Display name of the teacher, not a reference.
    pub teacher: String,

    pub state: CourseState,
    pub tabs: Vec<Tab>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn serialize_has_image<S: Serializer>(
    image: &Option<CourseImage>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(image.is_some())
}

impl Course {
    pub fn tab(&self, tab_id: Uuid) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == tab_id)
    }

    pub fn tab_mut(&mut self, tab_id: Uuid) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == tab_id)
    }
}

/// A tab (topic) inside a course. Tabs with a `parent_tab` are sub-tabs
/// (subtopics) and are ordered among the other children of that parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub id: Uuid,
    pub course: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: i32,
    #[serde(default)]
    pub parent_tab: Option<Uuid>,
    #[serde(default)]
    pub contents: Vec<Content>,
}

impl Ordered for Tab {
    fn id(&self) -> Uuid {
        self.id
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Document,
    Video,
    Link,
    File,
}

/// One item of a tab's content list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    #[serde(default)]
    pub description: String,

    /// Body text, or a URL / file id depending on `content_type`.
    pub content: String,

    #[serde(default)]
    pub file_type: Option<String>,
    pub order: i32,
}

impl Ordered for Content {
    fn id(&self) -> Uuid {
        self.id
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

/// DTO for creating a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 20, message = "Code length must be between 1 and 20 characters."))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name length must be between 1 and 200 characters."))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub state: Option<CourseState>,
}

/// DTO for updating a course. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub state: Option<CourseState>,
}

/// DTO for creating a tab or sub-tab.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTabRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 characters."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(range(min = 0, message = "Order must not be negative."))]
    pub order: Option<i32>,
    pub parent_tab: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTabRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Order must not be negative."))]
    pub order: Option<i32>,
}

/// DTO for adding an item to a tab.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateContentRequest {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(length(min = 1, max = 20000))]
    pub content: String,
    #[validate(length(max = 100))]
    pub file_type: Option<String>,
    #[validate(range(min = 0, message = "Order must not be negative."))]
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub content: Option<String>,
    #[validate(length(max = 100))]
    pub file_type: Option<String>,
    #[validate(range(min = 0, message = "Order must not be negative."))]
    pub order: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_state_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&CourseState::InEdition).unwrap();
        assert_eq!(json, "\"in-edition\"");
        assert_eq!("published".parse::<CourseState>(), Ok(CourseState::Published));
        assert!("draft".parse::<CourseState>().is_err());
    }

    #[test]
    fn course_json_hides_image_bytes() {
        let course = Course {
            id: Uuid::new_v4(),
            code: "CS101".to_string(),
            name: "Intro".to_string(),
            description: String::new(),
            start_date: None,
            end_date: None,
            image: Some(CourseImage {
                data: vec![1, 2, 3],
                content_type: "image/png".to_string(),
            }),
            student_list: vec![],
            teacher: "ada".to_string(),
            state: CourseState::Active,
            tabs: vec![],
            created_at: None,
        };

        let value = serde_json::to_value(&course).unwrap();
        assert_eq!(value["has_image"], true);
        assert!(value.get("image").is_none());
        assert_eq!(value["state"], "active");
    }
}
