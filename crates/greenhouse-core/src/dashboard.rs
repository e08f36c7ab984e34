use crate::intent::{DispatchError, DispatchOutcome, IgnoreReason, IntentDispatcher, IntentSink, Interaction};
use crate::panel::{GlobalPanel, LoadingIndicator};
use crate::staleness::{StalenessScheduler, TickReport};
use crate::store::{ModeDiff, SnapshotDiff, StateStore};
use crate::view::{Marker, NodeRegistry};
use crate::wire::WireMsg;
use crate::{GroupId, Mode, PartialGroupData};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const PENDING_SUGGESTION_TEXT: &str = "Requesting weather suggestion...";

/// What a single inbound event did to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEffect {
    Snapshot(SnapshotDiff),
    Modes(ModeDiff),
    GlobalWeather,
    GroupWeather { id: GroupId, routed: bool },
    Ignored,
}

/// Owns every component and runs each event to completion: a snapshot is
/// fully merged before the scheduler, view, dispatcher and panel react to
/// its diff. The store is written only from `apply_inbound`.
#[derive(Debug, Default)]
pub struct Dashboard {
    store: StateStore,
    scheduler: StalenessScheduler,
    view: NodeRegistry,
    dispatcher: IntentDispatcher,
    panel: GlobalPanel,
    loading: LoadingIndicator,
    status_note: Option<String>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_inbound(&mut self, msg: WireMsg) -> InboundEffect {
        match msg {
            WireMsg::UpdateData(groups) => InboundEffect::Snapshot(self.apply_update_data(groups)),
            WireMsg::ModeUpdated(modes) => InboundEffect::Modes(self.apply_mode_updated(modes)),
            WireMsg::GlobalWeatherResult(payload) => {
                self.panel.apply_weather_result(&payload.message);
                InboundEffect::GlobalWeather
            }
            WireMsg::WeatherActionResult(payload) => {
                let routed = self.view.set_result(&payload.id, &payload.message, None);
                if !routed {
                    debug!(
                        event = "weather_result_unrouted",
                        group_id = %payload.id
                    );
                }
                InboundEffect::GroupWeather {
                    id: payload.id,
                    routed,
                }
            }
            other => {
                debug!(event = "inbound_ignored", kind = other.event_name());
                InboundEffect::Ignored
            }
        }
    }

    fn apply_update_data(&mut self, groups: BTreeMap<GroupId, PartialGroupData>) -> SnapshotDiff {
        self.loading.hide();
        let diff = self.store.apply_snapshot(groups);
        self.scheduler.observe_snapshot(&diff, &self.store);
        self.view.reconcile(&diff, &self.store, &self.scheduler);

        for id in self.dispatcher.release(diff.touched()) {
            self.view.set_locked(&id, false);
        }
        self.dispatcher.release(diff.removed.iter());

        if diff.membership_changed() {
            let flipped = self.panel.recompute(self.store.len());
            info!(
                event = "groups_reconciled",
                added = diff.added.len(),
                removed = diff.removed.len(),
                tracked = self.store.len(),
                bulk_panel = self.panel.is_visible(),
                bulk_panel_flipped = flipped
            );
        }
        diff
    }

    fn apply_mode_updated(&mut self, raw: BTreeMap<GroupId, Value>) -> ModeDiff {
        let mut modes = BTreeMap::new();
        for (id, value) in raw {
            let parsed = match value.as_str() {
                Some(text) => text.parse::<Mode>(),
                None => Err(format!("expected a mode string, got {value}")),
            };
            match parsed {
                Ok(mode) => {
                    modes.insert(id, mode);
                }
                Err(err) => {
                    warn!(event = "mode_update_rejected", group_id = %id, error = %err);
                }
            }
        }

        let diff = self.store.apply_mode_update(modes);
        self.view.sync_modes(&diff, &self.store);
        for id in self.dispatcher.release(diff.updated.iter()) {
            self.view.set_locked(&id, false);
        }
        if !diff.ignored.is_empty() {
            debug!(event = "mode_update_unknown_groups", count = diff.ignored.len());
        }
        diff
    }

    /// One scheduler period. Missing cards are skipped; countdowns still move.
    pub fn tick(&mut self) -> TickReport {
        let report = self.scheduler.tick();
        for id in &report.advanced {
            let countdown = self.scheduler.countdown(id);
            if !self.view.render_countdown(id, countdown) {
                debug!(event = "timer_target_missing", group_id = %id);
            }
        }
        for id in &report.became_delayed {
            info!(event = "group_delayed", group_id = %id);
        }
        self.loading.tick();
        report
    }

    pub fn interact(
        &mut self,
        interaction: Interaction,
        sink: &mut dyn IntentSink,
    ) -> Result<DispatchOutcome, DispatchError> {
        let suggestion_target = match &interaction {
            Interaction::WeatherSuggestionRequested { group_id } => group_id.clone(),
            _ => None,
        };
        let global_weather = matches!(interaction, Interaction::GlobalWeatherRefresh);

        let outcome = match self.dispatcher.dispatch(interaction, &self.store, sink) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(event = "intent_dispatch_failed", error = %err);
                self.status_note = Some(format!("command not sent: {err}"));
                return Err(err);
            }
        };

        match &outcome {
            DispatchOutcome::Emitted { event, locked } => {
                for id in locked {
                    self.view.set_locked(id, true);
                }
                if let Some(id) = suggestion_target.as_deref() {
                    self.view
                        .set_result(id, PENDING_SUGGESTION_TEXT, Some(Marker::Pending));
                }
                if global_weather {
                    self.panel.begin_weather_request();
                }
                info!(event = "intent_emitted", kind = *event, locked = locked.len());
                self.status_note = Some(match locked.as_slice() {
                    [] => format!("{event} sent"),
                    [id] => format!("{event} sent for {id}; awaiting confirmation"),
                    many => format!("{event} sent; {} groups awaiting confirmation", many.len()),
                });
            }
            DispatchOutcome::Ignored(reason) => {
                debug!(event = "intent_ignored", reason = ?reason);
                if let IgnoreReason::Locked(id) = reason {
                    self.status_note = Some(format!("{id} is waiting for the server"));
                }
            }
        }
        Ok(outcome)
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn scheduler(&self) -> &StalenessScheduler {
        &self.scheduler
    }

    pub fn view(&self) -> &NodeRegistry {
        &self.view
    }

    pub fn dispatcher(&self) -> &IntentDispatcher {
        &self.dispatcher
    }

    pub fn panel(&self) -> &GlobalPanel {
        &self.panel
    }

    pub fn loading(&self) -> &LoadingIndicator {
        &self.loading
    }

    pub fn status_note(&self) -> Option<&str> {
        self.status_note.as_deref()
    }

    pub fn set_status_note(&mut self, note: impl Into<String>) {
        self.status_note = Some(note.into());
    }
}
