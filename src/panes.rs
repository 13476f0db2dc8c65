//! Settings panes and how a bridge snapshot maps onto them

use crate::bridge::{BridgeSettings, FirmwareMetadata, PartialSettings, UpdateState};
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, NaiveTime};
use log::warn;
use semver::{Version, VersionReq};
use serde::Serialize;
use std::{net::Ipv4Addr, sync::OnceLock};

pub const LINK_PRESSED: &str = "Link button pressed";
pub const LINK_NOT_PRESSED: &str = "Link button not pressed";

/// Oldest API version whose `/config` layout this crate understands
pub const REQUIRED_API_VERSION: &str = ">=1.16.0";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeneralPane {
    pub api_version: String,
    pub link_state: String,
    pub local_time: Option<NaiveDateTime>,
    pub name: String,
    pub sw_version: String,
    pub zigbee_channel: String,
    pub utc: Option<NaiveDateTime>,
    pub timezone: String,
    pub time_zones: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NetworkPane {
    pub mac: String,
    pub ip: String,
    pub netmask: String,
    pub gateway: String,
    pub dhcp: bool,
    pub proxy: String,
    pub proxy_port: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PortalPane {
    pub communication: String,
    pub portal_services: bool,
    pub connection: String,
    pub signed_on: String,
    pub incoming: String,
    pub outgoing: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SoftwarePane {
    pub auto_update: bool,
    pub update_state: UpdateState,
    pub update_time: NaiveTime,
    pub last_change: String,
    pub last_update: String,
}

/// API version reported by the bridge against the one we need
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub required: String,
    pub current: String,
    pub mismatch: bool,
}

impl GeneralPane {
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self {
            api_version: settings.apiversion.clone(),
            link_state: if settings.linkbutton {
                LINK_PRESSED
            } else {
                LINK_NOT_PRESSED
            }
            .to_string(),
            local_time: parse_timestamp(&settings.localtime),
            name: settings.name.clone(),
            sw_version: settings.swversion.clone(),
            zigbee_channel: settings.zigbeechannel.to_string(),
            utc: parse_timestamp(&settings.utc),
            timezone: settings.timezone.clone(),
            time_zones: Vec::new(),
        }
    }

    /// Writes needed to bring the bridge in line with `self`, relative to `baseline`
    pub fn rename_request(&self, baseline: &Self) -> Option<String> {
        (self.name != baseline.name).then(|| self.name.clone())
    }

    /// Whether a field the bridge accepts writes for differs from `baseline`
    pub fn has_pending_writes(&self, baseline: &Self) -> bool {
        self.name != baseline.name || self.timezone != baseline.timezone
    }

    pub fn timezone_request(&self, baseline: &Self) -> Option<PartialSettings> {
        (self.timezone != baseline.timezone).then(|| PartialSettings {
            timezone: Some(self.timezone.clone()),
            ..Default::default()
        })
    }

    pub fn version_info(&self) -> VersionInfo {
        let required = required_api_version();
        let mismatch = match Version::parse(&self.api_version) {
            Ok(current) => !required.matches(&current),
            Err(e) => {
                warn!("failed to parse api version {:?}: {e}", self.api_version);
                true
            }
        };

        VersionInfo {
            required: REQUIRED_API_VERSION.to_string(),
            current: self.api_version.clone(),
            mismatch,
        }
    }
}

impl NetworkPane {
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self {
            mac: settings.mac.clone(),
            ip: settings.ipaddress.clone(),
            netmask: settings.netmask.clone(),
            gateway: settings.gateway.clone(),
            dhcp: settings.dhcp,
            proxy: settings.proxyaddress.clone(),
            proxy_port: settings.proxyport,
        }
    }

    /// Static addressing needs well-formed IPv4 values
    pub fn check_addresses(&self) -> Result<()> {
        if self.dhcp {
            return Ok(());
        }

        for (field, value) in [
            ("ip address", &self.ip),
            ("netmask", &self.netmask),
            ("gateway", &self.gateway),
        ] {
            value
                .parse::<Ipv4Addr>()
                .with_context(|| format!("invalid {field}: {value:?}"))?;
        }

        Ok(())
    }

    /// The MAC address is reported only, edits to it are never written
    pub fn has_pending_writes(&self, baseline: &Self) -> bool {
        self.write_request() != baseline.write_request()
    }

    /// Take over the fields a successful [`Self::write_request`] carried
    pub fn accept_writable(&mut self, written: &Self) {
        self.ip.clone_from(&written.ip);
        self.netmask.clone_from(&written.netmask);
        self.gateway.clone_from(&written.gateway);
        self.dhcp = written.dhcp;
        self.proxy.clone_from(&written.proxy);
        self.proxy_port = written.proxy_port;
    }

    /// The full network block; the bridge applies it as one unit
    pub fn write_request(&self) -> PartialSettings {
        PartialSettings {
            dhcp: Some(self.dhcp),
            ipaddress: Some(self.ip.clone()),
            netmask: Some(self.netmask.clone()),
            gateway: Some(self.gateway.clone()),
            proxyaddress: Some(self.proxy.clone()),
            proxyport: Some(self.proxy_port),
            ..Default::default()
        }
    }
}

impl PortalPane {
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        let state = &settings.portalstate;

        Self {
            communication: state.communication.clone(),
            portal_services: settings.portalservices,
            connection: settings.portalconnection.clone(),
            signed_on: state.signedon.to_string(),
            incoming: state.incoming.to_string(),
            outgoing: state.outgoing.to_string(),
        }
    }
}

impl SoftwarePane {
    /// Take over the auto-install preferences, the only fields written back
    pub fn accept_writable(&mut self, written: &Self) {
        self.auto_update = written.auto_update;
        self.update_time = written.update_time;
    }

    pub fn from_firmware(firmware: Option<&FirmwareMetadata>) -> Self {
        match firmware {
            Some(FirmwareMetadata::Current(current)) => Self {
                auto_update: current.autoinstall.on,
                update_state: UpdateState::from_current(&current.state),
                update_time: parse_update_time(&current.autoinstall.updatetime),
                last_change: current.lastchange.clone(),
                last_update: current.bridge.lastinstall.clone(),
            },
            Some(FirmwareMetadata::LegacyOnly(legacy)) => Self {
                update_state: UpdateState::from_legacy(legacy.updatestate),
                ..Self::default()
            },
            None => Self::default(),
        }
    }
}

/// Parse the time of day out of an auto-install time such as `T08:30:00`
///
/// Falls back to midnight when the bridge sent something unparsable.
pub fn parse_update_time(value: &str) -> NaiveTime {
    let trimmed = value.replace('T', "");

    NaiveTime::parse_from_str(&trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&trimmed, "%H:%M"))
        .unwrap_or_else(|e| {
            if !value.is_empty() {
                warn!("failed to parse update time {value:?}: {e}");
            }
            NaiveTime::default()
        })
}

/// Wire format of the auto-install time
pub fn format_update_time(time: NaiveTime) -> String {
    time.format("T%H:%M:%S").to_string()
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    // the bridge reports "none" until a time zone is set
    value.parse::<NaiveDateTime>().ok()
}

fn required_api_version() -> &'static VersionReq {
    static REQUIRED_VERSION: OnceLock<VersionReq> = OnceLock::new();
    REQUIRED_VERSION.get_or_init(|| {
        VersionReq::parse(REQUIRED_API_VERSION).expect("invalid REQUIRED_API_VERSION constant")
    })
}
