mod chat_service;
mod user_service;

#[cfg(test)]
mod chat_service_tests;
#[cfg(test)]
mod test_support;

pub use chat_service::{ChatService, ChatServiceDependencies, SendMessageRequest};
pub use user_service::{
    AuthenticateUserRequest, RegisterUserRequest, UpdateProfileRequest, UserService,
    UserServiceDependencies,
};
