use std::sync::Arc;

use domain::{DisplayName, DomainError, User, UserId, Username};
use uuid::Uuid;

use crate::{
    clock::Clock, error::ApplicationError, password::PasswordHasher, repository::UserRepository,
};

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateUserRequest {
    pub username: String,
    pub password: String,
}

/// 为 None 的字段保持原值。
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApplicationError> {
        let username = Username::parse(request.username)?;
        let display_name = DisplayName::parse(request.display_name)?;

        if self
            .deps
            .user_repository
            .find_by_username(username.clone())
            .await?
            .is_some()
        {
            return Err(ApplicationError::Domain(DomainError::UserAlreadyExists));
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;

        let user = User::register(
            UserId::from(Uuid::new_v4()),
            username,
            display_name,
            password_hash,
            self.deps.clock.now(),
        );

        let stored = self.deps.user_repository.create(user).await?;
        Ok(stored)
    }

    pub async fn authenticate(
        &self,
        request: AuthenticateUserRequest,
    ) -> Result<User, ApplicationError> {
        let username = Username::parse(request.username)?;
        // 未知用户与密码错误返回同一个错误，避免泄露用户是否存在
        let user = self
            .deps
            .user_repository
            .find_by_username(username)
            .await?
            .ok_or(ApplicationError::Authentication)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            return Err(ApplicationError::Authentication);
        }

        Ok(user)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<User, ApplicationError> {
        let user = self
            .deps
            .user_repository
            .find_by_id(UserId::from(user_id))
            .await?
            .ok_or(ApplicationError::Domain(DomainError::UserNotFound))?;
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<User, ApplicationError> {
        let mut user = self.get_profile(user_id).await?;

        let display_name = request
            .display_name
            .map(DisplayName::parse)
            .transpose()?;

        user.update_profile(
            display_name,
            request.bio,
            request.avatar_url,
            self.deps.clock.now(),
        );

        let stored = self.deps.user_repository.update(user).await?;
        Ok(stored)
    }

    /// 联系人列表：除自己以外的所有用户。
    pub async fn list_others(&self, user_id: Uuid) -> Result<Vec<User>, ApplicationError> {
        let users = self
            .deps
            .user_repository
            .list_others(UserId::from(user_id))
            .await?;
        Ok(users)
    }
}
