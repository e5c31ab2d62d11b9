use std::{path::PathBuf, sync::Arc};

use bridge::{ConfigStore, EventDispatcher, SessionStore};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) static_dir: PathBuf,
}
