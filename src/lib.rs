pub mod bridge;
pub mod bridge_client;
pub mod clock;
pub mod config;
pub mod gate;
pub mod http_client;
pub mod panes;
pub mod record;
pub mod synchronizer;

pub use bridge_client::{DeviceClient, HueBridgeClient};
pub use synchronizer::{ActionOutcome, Phase, Prompt, SettingsSynchronizer};
