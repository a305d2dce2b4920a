use std::sync::OnceLock;

use super::container::ContainerSlot;
use super::script::ScriptDependency;

/// Process-wide resources shared by every adapter: the script-load state
/// and the host container slot.
#[derive(Debug, Clone, Default)]
pub struct PlayerHost {
    pub script: ScriptDependency,
    pub container: ContainerSlot,
}

static GLOBAL_HOST: OnceLock<PlayerHost> = OnceLock::new();

impl PlayerHost {
    pub fn global() -> PlayerHost {
        GLOBAL_HOST.get_or_init(PlayerHost::default).clone()
    }
}
