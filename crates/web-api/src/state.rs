use std::sync::Arc;

use application::{ChatService, UserService};
use infrastructure::ChatHub;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub chat_service: Arc<ChatService>,
    pub hub: Arc<ChatHub>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        chat_service: Arc<ChatService>,
        hub: Arc<ChatHub>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            user_service,
            chat_service,
            hub,
            jwt_service,
        }
    }
}
