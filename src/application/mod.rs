pub mod coordinator;
pub mod settings;
pub mod supervisor;

pub use coordinator::{Coordinator, InitialSnapshot};
pub use settings::{Settings, SettingsStore};
pub use supervisor::ServiceHandle;
