use crate::value_objects::{DisplayName, PasswordHash, Timestamp, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub display_name: DisplayName,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn register(
        id: UserId,
        username: Username,
        display_name: DisplayName,
        password: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            display_name,
            bio: None,
            avatar_url: None,
            password,
            created_at: now,
            updated_at: now,
        }
    }

    /// 更新个人资料；为 None 的字段保持原值。
    pub fn update_profile(
        &mut self,
        display_name: Option<DisplayName>,
        bio: Option<String>,
        avatar_url: Option<String>,
        now: Timestamp,
    ) {
        if let Some(new_display_name) = display_name {
            self.display_name = new_display_name;
        }
        if let Some(new_bio) = bio {
            self.bio = Some(new_bio);
        }
        if let Some(new_avatar_url) = avatar_url {
            self.avatar_url = Some(new_avatar_url);
        }
        self.updated_at = now;
    }
}
