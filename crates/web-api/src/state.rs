use std::sync::Arc;

use application::{
    Clock, MessageLedger, MessageLedgerDependencies, RealtimeCoordinator,
    RealtimeCoordinatorDependencies, RoomDirectory, RoomDirectoryDependencies,
    SessionAuthenticator, UserService, UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::Infrastructure;

use crate::auth::{JwtService, JwtSessionAuthenticator};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub room_directory: Arc<RoomDirectory>,
    pub coordinator: Arc<RealtimeCoordinator>,
    pub jwt_service: Arc<JwtService>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub cookie_name: Arc<str>,
}

impl AppState {
    /// 把基础设施适配器装配成用例服务与实时协调器
    pub fn build(infra: &Infrastructure, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let user_service = Arc::new(UserService::new(UserServiceDependencies {
            user_repository: infra.user_repository.clone(),
            password_hasher: infra.password_hasher.clone(),
            clock: clock.clone(),
        }));
        let room_directory = Arc::new(RoomDirectory::new(RoomDirectoryDependencies {
            room_repository: infra.room_repository.clone(),
            message_repository: infra.message_repository.clone(),
            clock: clock.clone(),
        }));
        let message_ledger = Arc::new(MessageLedger::new(MessageLedgerDependencies {
            message_repository: infra.message_repository.clone(),
            clock: clock.clone(),
        }));

        let jwt_service = Arc::new(JwtService::new(&config.jwt));
        let authenticator: Arc<dyn SessionAuthenticator> = Arc::new(
            JwtSessionAuthenticator::new(jwt_service.clone(), user_service.clone()),
        );
        let coordinator = Arc::new(RealtimeCoordinator::new(RealtimeCoordinatorDependencies {
            room_directory: room_directory.clone(),
            message_ledger,
            authenticator: authenticator.clone(),
            clock,
        }));

        Self {
            user_service,
            room_directory,
            coordinator,
            jwt_service,
            authenticator,
            cookie_name: Arc::from(config.auth.cookie_name.as_str()),
        }
    }
}
