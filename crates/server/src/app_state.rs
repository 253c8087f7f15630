use server_api::ApiContext;

use crate::identity::IdentityConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) identity: IdentityConfig,
}
