use uuid::Uuid;

use crate::{
    api::error,
    modules::course::{repository::CourseRepository, schema::CourseEntity},
};

#[derive(Clone)]
pub struct CourseRepositoryPg {
    pool: sqlx::PgPool,
}

impl CourseRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CourseRepository for CourseRepositoryPg {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<CourseEntity>, error::SystemError> {
        let course = sqlx::query_as::<_, CourseEntity>(
            "SELECT * FROM courses WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(course)
    }
}
