use uuid::Uuid;

use crate::{api::error, modules::course::schema::CourseEntity};

/// Courses are owned by the catalog service; this side only reads them.
#[async_trait::async_trait]
pub trait CourseRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<CourseEntity>, error::SystemError>;
}
