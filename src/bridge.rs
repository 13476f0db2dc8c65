//! Bridge wire model
//!
//! Types mirrored from the bridge's `/config` and `/capabilities` resources and
//! the partial bodies written back to it.

use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::fmt;

/// Full settings snapshot as reported by `GET /config`
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct BridgeSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub apiversion: String,
    #[serde(default)]
    pub swversion: String,
    #[serde(default)]
    pub linkbutton: bool,
    #[serde(default)]
    pub localtime: String,
    #[serde(rename = "UTC", default)]
    pub utc: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub zigbeechannel: u8,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub ipaddress: String,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub dhcp: bool,
    #[serde(default)]
    pub proxyaddress: String,
    #[serde(default)]
    pub proxyport: u16,
    #[serde(default)]
    pub portalservices: bool,
    #[serde(default)]
    pub portalconnection: String,
    #[serde(default)]
    pub portalstate: PortalState,
    pub swupdate: Option<SwUpdate>,
    pub swupdate2: Option<SwUpdate2>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PortalState {
    #[serde(default)]
    pub signedon: bool,
    #[serde(default)]
    pub incoming: bool,
    #[serde(default)]
    pub outgoing: bool,
    #[serde(default)]
    pub communication: String,
}

/// Legacy firmware metadata block (`swupdate`)
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SwUpdate {
    #[serde(default)]
    pub updatestate: u8,
    #[serde(default)]
    pub checkforupdate: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub notify: bool,
}

/// Current firmware metadata block (`swupdate2`)
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SwUpdate2 {
    #[serde(default)]
    pub checkforupdate: bool,
    #[serde(default)]
    pub lastchange: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub autoinstall: AutoInstallState,
    #[serde(default)]
    pub bridge: BridgeUpdateState,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AutoInstallState {
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub updatetime: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct BridgeUpdateState {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub lastinstall: String,
}

/// Firmware metadata the bridge reported, current schema preferred
#[derive(Clone, Debug, PartialEq)]
pub enum FirmwareMetadata {
    Current(SwUpdate2),
    LegacyOnly(SwUpdate),
}

impl FirmwareMetadata {
    /// Pick the firmware block of a snapshot, `None` if the bridge sent neither
    pub fn from_settings(settings: &BridgeSettings) -> Option<Self> {
        match (&settings.swupdate2, &settings.swupdate) {
            (Some(current), _) => Some(Self::Current(current.clone())),
            (None, Some(legacy)) => Some(Self::LegacyOnly(legacy.clone())),
            (None, None) => None,
        }
    }

    pub fn update_state(&self) -> UpdateState {
        match self {
            Self::Current(current) => UpdateState::from_current(&current.state),
            Self::LegacyOnly(legacy) => UpdateState::from_legacy(legacy.updatestate),
        }
    }
}

/// Firmware update state of the bridge
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    NoUpdates,
    NotUpdatable,
    #[default]
    Unknown,
    Transferring,
    Installing,
    /// at least one device has an update ready
    AnyReadyToInstall,
    /// all devices have an update ready
    AllReadyToInstall,
    /// the bridge downloaded its own update and awaits the install command
    ReadyToInstall,
    /// legacy `updatestate` 2
    LegacyReadyToInstall,
    /// legacy `updatestate` 3
    LegacyInstalling,
}

impl UpdateState {
    pub const ALL: [UpdateState; 10] = [
        UpdateState::NoUpdates,
        UpdateState::NotUpdatable,
        UpdateState::Unknown,
        UpdateState::Transferring,
        UpdateState::Installing,
        UpdateState::AnyReadyToInstall,
        UpdateState::AllReadyToInstall,
        UpdateState::ReadyToInstall,
        UpdateState::LegacyReadyToInstall,
        UpdateState::LegacyInstalling,
    ];

    /// Map a `swupdate2.state` value
    pub fn from_current(state: &str) -> Self {
        match state {
            "noupdates" => Self::NoUpdates,
            "notupdatable" => Self::NotUpdatable,
            "transferring" => Self::Transferring,
            "installing" => Self::Installing,
            "anyreadytoinstall" => Self::AnyReadyToInstall,
            "allreadytoinstall" => Self::AllReadyToInstall,
            "readytoinstall" => Self::ReadyToInstall,
            _ => Self::Unknown,
        }
    }

    /// Map a legacy `swupdate.updatestate` code
    pub fn from_legacy(code: u8) -> Self {
        match code {
            0 => Self::NoUpdates,
            1 => Self::Transferring,
            2 => Self::LegacyReadyToInstall,
            3 => Self::LegacyInstalling,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoUpdates => "no updates",
            Self::NotUpdatable => "not updatable",
            Self::Unknown => "unknown",
            Self::Transferring => "transferring",
            Self::Installing => "installing",
            Self::AnyReadyToInstall => "update ready for some devices",
            Self::AllReadyToInstall => "update ready for all devices",
            Self::ReadyToInstall => "update downloaded, awaiting install",
            Self::LegacyReadyToInstall => "update ready (legacy)",
            Self::LegacyInstalling => "installing (legacy)",
        };
        f.write_str(text)
    }
}

/// Resource limits reported by `GET /capabilities`
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Capabilities {
    pub lights: Option<ResourceCapacity>,
    pub sensors: Option<ResourceCapacity>,
    pub groups: Option<ResourceCapacity>,
    pub scenes: Option<ResourceCapacity>,
    pub schedules: Option<ResourceCapacity>,
    pub rules: Option<ResourceCapacity>,
    pub resourcelinks: Option<ResourceCapacity>,
    pub streaming: Option<ResourceCapacity>,
    pub timezones: Option<TimeZoneCapability>,
}

impl Capabilities {
    /// Time zones advertised by the bridge, if any
    pub fn time_zones(&self) -> Option<&[String]> {
        self.timezones
            .as_ref()
            .map(|tz| tz.values.as_slice())
            .filter(|values| !values.is_empty())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ResourceCapacity {
    #[serde(default)]
    pub available: u32,
    #[serde(default)]
    pub total: u32,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TimeZoneCapability {
    #[serde(default)]
    pub values: Vec<String>,
}

/// Partial `/config` body; only fields set to `Some` are sent
#[derive(Clone, Debug, Default, PartialEq, Serialize, Validate)]
pub struct PartialSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(min_length = 4)]
    #[validate(max_length = 16)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(max_length = 40)]
    pub proxyaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxyport: Option<u16>,
}

impl PartialSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Error entry of a bridge response
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ErrorDescriptor {
    #[serde(rename = "type", default)]
    pub kind: u16,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, error {})", self.description, self.address, self.kind)
    }
}
