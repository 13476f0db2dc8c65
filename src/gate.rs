//! Enablement of user actions
//!
//! Pure functions of the mirrored update state and the pane dirty flags. They
//! hold no state and are recomputed on every query.

use crate::bridge::UpdateState;
use serde::Serialize;

/// User-triggered actions of the settings view
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum Action {
    CheckForUpdate,
    InstallFirmware,
    ApplyGeneralSettings,
    ApplyNetworkSettings,
    ApplyUpdateSettings,
}

/// Inputs the gate looks at
#[derive(Clone, Copy, Debug, Default)]
pub struct GateInputs {
    pub update_state: UpdateState,
    pub general_changed: bool,
    pub network_changed: bool,
}

/// Enabled flag per action, as handed to the presentation layer
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CommandStates {
    pub check_for_update: bool,
    pub install_firmware: bool,
    pub apply_general_settings: bool,
    pub apply_network_settings: bool,
    pub apply_update_settings: bool,
}

pub fn is_enabled(action: Action, inputs: &GateInputs) -> bool {
    match action {
        Action::CheckForUpdate => can_check_for_update(inputs.update_state),
        Action::InstallFirmware => can_install_firmware(inputs.update_state),
        Action::ApplyGeneralSettings => inputs.general_changed,
        Action::ApplyNetworkSettings => inputs.network_changed,
        // auto-install preferences are independent of a running update
        Action::ApplyUpdateSettings => true,
    }
}

pub fn command_states(inputs: &GateInputs) -> CommandStates {
    CommandStates {
        check_for_update: is_enabled(Action::CheckForUpdate, inputs),
        install_firmware: is_enabled(Action::InstallFirmware, inputs),
        apply_general_settings: is_enabled(Action::ApplyGeneralSettings, inputs),
        apply_network_settings: is_enabled(Action::ApplyNetworkSettings, inputs),
        apply_update_settings: is_enabled(Action::ApplyUpdateSettings, inputs),
    }
}

fn can_check_for_update(state: UpdateState) -> bool {
    !matches!(
        state,
        UpdateState::LegacyReadyToInstall
            | UpdateState::LegacyInstalling
            | UpdateState::Installing
            | UpdateState::AnyReadyToInstall
            | UpdateState::AllReadyToInstall
    )
}

fn can_install_firmware(state: UpdateState) -> bool {
    if state == UpdateState::LegacyReadyToInstall {
        return true;
    }
    !matches!(
        state,
        UpdateState::NoUpdates
            | UpdateState::NotUpdatable
            | UpdateState::Unknown
            | UpdateState::Transferring
            | UpdateState::Installing
    )
}
