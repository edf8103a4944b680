use serde::{Deserialize, Serialize};

use crate::modules::course::schema::CourseEntity;

/// The slice of a course that conversation flows need. This is what gets
/// cached in Redis, so it must stay cheap to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseInfo {
    pub id: uuid::Uuid,
    pub title: String,
    pub instructor_id: uuid::Uuid,
}

impl From<CourseEntity> for CourseInfo {
    fn from(entity: CourseEntity) -> Self {
        CourseInfo { id: entity.id, title: entity.title, instructor_id: entity.instructor_id }
    }
}
