use sea_orm::{ActiveModelTrait, ActiveValue, TransactionTrait, prelude::*};

use crate::{
    EngineError, ResultEngine, User,
    access::{Role, SYSTEM_USER_ID},
    users,
    util::normalize_required_id,
};

use super::{Engine, with_tx};

impl Engine {
    /// Registers a user known to the identity layer.
    pub async fn register_user(&self, user_id: &str, role: Role, active: bool) -> ResultEngine<User> {
        let user_id = normalize_required_id(user_id, "user id")?;
        if user_id == SYSTEM_USER_ID {
            return Err(EngineError::Validation(format!(
                "user id {SYSTEM_USER_ID:?} is reserved"
            )));
        }
        let user = User {
            id: user_id,
            role,
            active,
        };
        with_tx!(self, |db_tx| {
            if users::Entity::find_by_id(user.id.clone())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(format!(
                    "user {} already exists",
                    user.id
                )));
            }
            users::ActiveModel::from(&user).insert(&db_tx).await?;
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "user registered");
        Ok(user)
    }

    /// Enables or disables a user. Inactive users cannot act and cannot
    /// receive new cards.
    pub async fn set_user_active(&self, user_id: &str, active: bool) -> ResultEngine<User> {
        let user = with_tx!(self, |db_tx| {
            let model = self.require_user(&db_tx, user_id).await?;
            let mut model: users::ActiveModel = model.into();
            model.active = ActiveValue::Set(active);
            let model = model.update(&db_tx).await?;
            User::try_from(model)
        })?;
        tracing::info!(user_id = %user.id, active, "user status changed");
        Ok(user)
    }

    pub async fn user(&self, user_id: &str) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let model = self.require_user(&db_tx, user_id).await?;
            User::try_from(model)
        })
    }
}
