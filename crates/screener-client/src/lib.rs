pub mod api;
pub mod controller;
pub mod error;
pub mod format;
pub mod presets;
pub mod view;

pub use api::{HttpScreenerApi, ScreenerApi};
pub use controller::{HistoryPanel, ScreenerController};
pub use error::{ClientError, ClientResult};
pub use presets::{Preset, PresetData, PresetStore};
pub use view::{LoadStatus, ScreenerView, LOAD_ERROR_MESSAGE};
