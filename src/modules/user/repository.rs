use uuid::Uuid;

use crate::{api::error, modules::user::schema::UserEntity};

/// Users are provisioned by the account service; this side only reads them.
#[async_trait::async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<UserEntity>, error::SystemError>;
}
