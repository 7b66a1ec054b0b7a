//! Shared handler state: the directive parser and the pipeline, constructed
//! once at startup and cloned into every request.

use crate::services::directive_service::DirectiveService;
use crate::services::proxy_service::ProxyService;

#[derive(Clone)]
pub struct AppState {
    pub directives: DirectiveService,
    pub proxy: ProxyService,
}
