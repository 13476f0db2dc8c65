//! Bridge settings session
//!
//! Loads the bridge state into the settings panes, writes edits back, and
//! tracks the firmware update session. Every action resolves its own failures:
//! the error is logged and kept in [`SettingsSynchronizer::error_message`], the
//! affected pane keeps its values and its dirty flag.

use crate::{
    bridge::{BridgeSettings, Capabilities, FirmwareMetadata, PartialSettings, UpdateState},
    bridge_client::DeviceClient,
    clock::{ClockEvent, UpdateProgressClock},
    gate::{self, Action, CommandStates, GateInputs},
    panes::{GeneralPane, NetworkPane, PortalPane, SoftwarePane},
    record::ChangeTracked,
};
use anyhow::{Context, Error, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_valid::Validate;
use std::time::Duration;

pub const UPDATE_CONFIRMATION: &str = "The bridge will be unavailable for a few minutes while it installs the firmware update. Continue?";
pub const CHECKING_FOR_UPDATE: &str = "The bridge is checking for updates";

/// Asks the user before an irreversible action
pub trait Prompt {
    fn confirm(&self, question: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Prompt for F {
    fn confirm(&self, question: &str) -> bool {
        self(question)
    }
}

/// Where the session currently is
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Phase {
    Uninitialized,
    Ready,
    /// the last settings read failed; panes show the last-known values
    Stale,
    Applying(Action),
    /// the bridge is presumed busy installing firmware
    Updating,
}

/// Result of a user action, already reported through the session's messages
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionOutcome {
    Completed,
    /// the user said no at the confirmation step
    Declined,
    /// the gate does not allow the action right now
    Disabled,
    Failed(String),
}

pub struct SettingsSynchronizer<C> {
    client: C,
    initialized: bool,
    stale: bool,
    in_flight: Option<Action>,
    update_state: UpdateState,
    can_auto_install: bool,
    capabilities: Option<Capabilities>,
    general: ChangeTracked<GeneralPane>,
    network: ChangeTracked<NetworkPane>,
    portal: ChangeTracked<PortalPane>,
    software: ChangeTracked<SoftwarePane>,
    clock: UpdateProgressClock,
    error_message: Option<String>,
    success_message: Option<String>,
}

impl<C: DeviceClient> SettingsSynchronizer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            initialized: false,
            stale: false,
            in_flight: None,
            update_state: UpdateState::default(),
            can_auto_install: false,
            capabilities: None,
            general: ChangeTracked::default(),
            network: ChangeTracked::default(),
            portal: ChangeTracked::default(),
            software: ChangeTracked::default(),
            clock: UpdateProgressClock::default(),
            error_message: None,
            success_message: None,
        }
    }

    /// Pull the bridge state into every pane and mark them clean
    ///
    /// A failed settings read keeps the previous pane values and leaves the
    /// session stale; capabilities and time zones fail independently.
    pub async fn initialize(&mut self) -> ActionOutcome {
        info!("initializing bridge settings session");
        self.error_message = None;

        let settings = self.client.read_settings().await;
        let outcome = match &settings {
            Ok(_) => ActionOutcome::Completed,
            Err(e) => {
                self.stale = true;
                self.fail("read bridge settings", e)
            }
        };

        self.capabilities = match self.client.read_capabilities().await {
            Ok(capabilities) => Some(capabilities),
            Err(e) => {
                warn!("failed to read bridge capabilities: {e:#}");
                None
            }
        };

        if let Ok(settings) = settings {
            let time_zones = self.load_time_zones().await;
            self.synchronize(&settings, time_zones);
            self.stale = false;
        }

        self.initialized = true;
        outcome
    }

    /// Re-read everything from the bridge
    pub async fn refresh(&mut self) -> ActionOutcome {
        self.initialize().await
    }

    pub async fn apply_general_settings(&mut self) -> ActionOutcome {
        const OPERATION: &str = "apply general settings";
        if !self.is_enabled(Action::ApplyGeneralSettings) {
            return ActionOutcome::Disabled;
        }
        self.error_message = None;

        let pane = self.general.current();
        let rename = pane.rename_request(self.general.baseline());
        let timezone = pane.timezone_request(self.general.baseline());

        let check = PartialSettings {
            name: rename.clone(),
            ..timezone.clone().unwrap_or_default()
        };
        if let Err(e) = check.validate().context("invalid general settings") {
            return self.reject(OPERATION, e);
        }

        let mut failures = Vec::new();
        {
            let _in_flight = InFlight::start(&mut self.in_flight, Action::ApplyGeneralSettings);

            // each confirmed write leaves the dirty set on its own
            if let Some(name) = rename {
                match self.client.rename_device(name).await {
                    Ok(()) => self
                        .general
                        .accept_part(|baseline, current| baseline.name.clone_from(&current.name)),
                    Err(e) => failures.push(failure_text(&self.client, "rename bridge", &e)),
                }
            }
            if let Some(timezone) = timezone {
                match self.client.write_settings(timezone).await {
                    Ok(()) => self.general.accept_part(|baseline, current| {
                        baseline.timezone.clone_from(&current.timezone)
                    }),
                    Err(e) => failures.push(failure_text(&self.client, "set time zone", &e)),
                }
            }
        }

        if !failures.is_empty() {
            return self.report(failures.join("\n"));
        }

        self.succeed("General settings applied")
    }

    pub async fn apply_network_settings(&mut self) -> ActionOutcome {
        const OPERATION: &str = "apply network settings";
        if !self.is_enabled(Action::ApplyNetworkSettings) {
            return ActionOutcome::Disabled;
        }
        self.error_message = None;

        let request = match self.network_request() {
            Ok(request) => request,
            Err(e) => return self.reject(OPERATION, e),
        };

        let result = {
            let _in_flight = InFlight::start(&mut self.in_flight, Action::ApplyNetworkSettings);
            self.client.write_settings(request).await
        };

        match result {
            Ok(()) => {
                self.network
                    .accept_part(|baseline, current| baseline.accept_writable(current));
                self.succeed("Network settings applied")
            }
            Err(e) => self.fail(OPERATION, &e),
        }
    }

    pub async fn check_for_update(&mut self) -> ActionOutcome {
        if !self.is_enabled(Action::CheckForUpdate) {
            debug!("check for update not available while {}", self.update_state);
            return ActionOutcome::Disabled;
        }
        self.error_message = None;

        let result = {
            let _in_flight = InFlight::start(&mut self.in_flight, Action::CheckForUpdate);
            self.client.check_for_update().await
        };

        match result {
            Ok(()) => self.succeed(CHECKING_FOR_UPDATE),
            Err(e) => self.fail("check for update", &e),
        }
    }

    /// Ask for confirmation, then have the bridge install its pending firmware
    ///
    /// On success the update session starts; it ends after a fixed deadline
    /// because the bridge does not report completion.
    pub async fn install_firmware(&mut self, prompt: &impl Prompt) -> ActionOutcome {
        if !self.is_enabled(Action::InstallFirmware) {
            debug!("firmware install not available while {}", self.update_state);
            return ActionOutcome::Disabled;
        }

        if !prompt.confirm(UPDATE_CONFIRMATION) {
            info!("firmware update declined");
            return ActionOutcome::Declined;
        }
        self.error_message = None;

        let result = {
            let _in_flight = InFlight::start(&mut self.in_flight, Action::InstallFirmware);
            self.client.request_firmware_install().await
        };

        match result {
            Ok(()) => {
                self.clock.start();
                self.succeed("Firmware update started")
            }
            Err(e) => self.fail("install firmware", &e),
        }
    }

    /// Write the auto-install preferences; allowed while an update runs
    pub async fn apply_update_settings(&mut self) -> ActionOutcome {
        self.error_message = None;
        let pane = self.software.current();
        let (on, update_time) = (pane.auto_update, pane.update_time);

        let result = {
            let _in_flight = InFlight::start(&mut self.in_flight, Action::ApplyUpdateSettings);
            self.client.set_auto_install(on, update_time).await
        };

        match result {
            Ok(()) => {
                self.software
                    .accept_part(|baseline, current| baseline.accept_writable(current));
                self.succeed("Update settings applied")
            }
            Err(e) => self.fail("apply update settings", &e),
        }
    }

    /// Feed a timer event of the running update session
    pub fn handle_clock_event(&mut self, event: ClockEvent) {
        self.clock.handle(event);
        if event == ClockEvent::Deadline {
            info!("firmware update window elapsed, settings view may be closed");
        }
    }

    /// Advance the update session by simulated time
    pub fn advance_clock(&mut self, elapsed: Duration) -> Vec<ClockEvent> {
        self.clock.advance(elapsed)
    }

    /// Stop the update session early, e.g. when the view is forced closed
    pub fn cancel_update(&mut self) {
        self.clock.cancel();
    }

    pub fn phase(&self) -> Phase {
        if !self.initialized {
            Phase::Uninitialized
        } else if let Some(action) = self.in_flight {
            Phase::Applying(action)
        } else if self.clock.is_active() {
            Phase::Updating
        } else if self.stale {
            Phase::Stale
        } else {
            Phase::Ready
        }
    }

    pub fn commands(&self) -> CommandStates {
        gate::command_states(&self.gate_inputs())
    }

    pub fn is_enabled(&self, action: Action) -> bool {
        gate::is_enabled(action, &self.gate_inputs())
    }

    pub fn general(&self) -> &ChangeTracked<GeneralPane> {
        &self.general
    }

    pub fn general_mut(&mut self) -> &mut ChangeTracked<GeneralPane> {
        &mut self.general
    }

    pub fn network(&self) -> &ChangeTracked<NetworkPane> {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut ChangeTracked<NetworkPane> {
        &mut self.network
    }

    pub fn portal(&self) -> &ChangeTracked<PortalPane> {
        &self.portal
    }

    pub fn software(&self) -> &ChangeTracked<SoftwarePane> {
        &self.software
    }

    pub fn software_mut(&mut self) -> &mut ChangeTracked<SoftwarePane> {
        &mut self.software
    }

    pub fn update_state(&self) -> UpdateState {
        self.update_state
    }

    pub fn can_auto_install(&self) -> bool {
        self.can_auto_install
    }

    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    pub fn progress_seconds(&self) -> u32 {
        self.clock.progress_seconds()
    }

    pub fn can_close(&self) -> bool {
        self.clock.can_close()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn success_message(&self) -> Option<&str> {
        self.success_message.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    pub fn clear_success(&mut self) {
        self.success_message = None;
    }

    fn gate_inputs(&self) -> GateInputs {
        GateInputs {
            update_state: self.update_state,
            general_changed: self
                .general
                .current()
                .has_pending_writes(self.general.baseline()),
            network_changed: self
                .network
                .current()
                .has_pending_writes(self.network.baseline()),
        }
    }

    fn synchronize(&mut self, settings: &BridgeSettings, time_zones: Option<Vec<String>>) {
        let firmware = FirmwareMetadata::from_settings(settings);
        if firmware.is_none() {
            warn!("bridge reported no firmware metadata");
        }

        let mut general = GeneralPane::from_settings(settings);
        general.time_zones = time_zones.unwrap_or_default();

        let version = general.version_info();
        if version.mismatch {
            warn!(
                "bridge api version {:?} does not match {}",
                version.current, version.required
            );
        }

        self.general.synchronize(general);
        self.network.synchronize(NetworkPane::from_settings(settings));
        self.portal.synchronize(PortalPane::from_settings(settings));
        self.software
            .synchronize(SoftwarePane::from_firmware(firmware.as_ref()));

        self.update_state = firmware
            .as_ref()
            .map(FirmwareMetadata::update_state)
            .unwrap_or_default();
        self.can_auto_install = matches!(firmware, Some(FirmwareMetadata::Current(_)));

        debug!(
            "synchronized settings of {:?}: update state {}, auto install {}",
            settings.name, self.update_state, self.can_auto_install
        );
    }

    /// Time zones from the capabilities if advertised there, else from the bridge
    async fn load_time_zones(&self) -> Option<Vec<String>> {
        if let Some(values) = self.capabilities.as_ref().and_then(Capabilities::time_zones) {
            return Some(values.to_vec());
        }

        match self.client.read_time_zones().await {
            Ok(time_zones) => Some(time_zones),
            Err(e) => {
                warn!("failed to read time zones: {e:#}");
                None
            }
        }
    }

    fn network_request(&self) -> Result<PartialSettings> {
        let pane = self.network.current();
        pane.check_addresses()?;

        let request = pane.write_request();
        request
            .validate()
            .context("invalid network settings")?;
        Ok(request)
    }

    fn fail(&mut self, operation: &str, err: &Error) -> ActionOutcome {
        let message = failure_text(&self.client, operation, err);
        self.report(message)
    }

    /// Local validation failure; nothing was sent to the bridge
    fn reject(&mut self, operation: &str, err: Error) -> ActionOutcome {
        self.report(format!("failed to {operation}: {err:#}"))
    }

    fn report(&mut self, message: String) -> ActionOutcome {
        error!("{message}");
        self.success_message = None;
        self.error_message = Some(message.clone());
        ActionOutcome::Failed(message)
    }

    fn succeed(&mut self, message: &str) -> ActionOutcome {
        info!("{message}");
        self.success_message = Some(message.to_string());
        ActionOutcome::Completed
    }
}

/// Marks an action as running until dropped, including when the action's
/// future is dropped before the device answered
struct InFlight<'a>(&'a mut Option<Action>);

impl<'a> InFlight<'a> {
    fn start(slot: &'a mut Option<Action>, action: Action) -> Self {
        *slot = Some(action);
        Self(slot)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(action) = self.0.take() {
            debug!("{action:?} finished");
        }
    }
}

/// User-facing text for a failed device call, preferring the bridge's own errors
fn failure_text(client: &impl DeviceClient, operation: &str, err: &Error) -> String {
    let errors = client.last_errors();
    if errors.is_empty() {
        return format!("failed to {operation}: {err:#}");
    }

    let details = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!("failed to {operation}: {details}")
}
