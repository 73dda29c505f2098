use order_desk_storage::ExportDataset;

use super::Desk;
use crate::dispatch::{Slot, TaskKey};
use crate::state::{Screen, UiState};

const FILES: TaskKey = TaskKey::new(Screen::Export, Slot::Files);
const EXPORT: TaskKey = TaskKey::new(Screen::Export, Slot::Mutation);

pub(super) fn handle(desk: &Desk, state: &mut UiState, target: &str) {
    desk.navigate(state, Screen::Export);
    if target.trim().eq_ignore_ascii_case("list") {
        return load(desk);
    }

    let dataset = match target.parse::<ExportDataset>() {
        Ok(dataset) => dataset,
        Err(err) => return state.reject(err.to_string()),
    };
    let exporter = desk.exporter.clone();
    desk.submit_committed(
        EXPORT,
        async move { exporter.export(dataset).await },
        |state: &mut UiState, outcome| {
            if outcome.success {
                state.affirm(outcome.message);
                state.needs_refresh = true;
            } else {
                state.reject(outcome.message);
            }
        },
    );
}

/// Lists previously written export files.
pub(super) fn load(desk: &Desk) {
    let exporter = desk.exporter.clone();
    desk.submit(
        FILES,
        async move { exporter.list_exports().await },
        |state: &mut UiState, result| match result {
            Ok(files) => state.exports = files,
            Err(err) => state.reject(format!("Could not list exports: {err}")),
        },
    );
}
