use crate::store::StateStore;
use crate::wire::{
    ControlPayload, GlobalControlPayload, GlobalModeChangePayload, ModeChangePayload,
    RequestGlobalWeatherPayload, WeatherActionPayload, WireMsg,
};
use crate::{DeviceState, GroupId, Mode};
use std::collections::BTreeSet;
use thiserror::Error;

/// A user gesture, already resolved to its resulting control state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    ModeToggled {
        group_id: Option<GroupId>,
        checked: bool,
    },
    DeviceToggled {
        group_id: Option<GroupId>,
        device: String,
        checked: bool,
    },
    WeatherSuggestionRequested {
        group_id: Option<GroupId>,
    },
    GlobalModeSelected {
        mode: Mode,
    },
    GlobalDeviceCommand {
        device: String,
        command: DeviceState,
    },
    GlobalWeatherRefresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("outbound queue is full")]
    QueueFull,
    #[error("outbound channel is closed")]
    ChannelClosed,
}

/// Outbound half of the channel.
pub trait IntentSink {
    fn emit(&mut self, msg: WireMsg) -> Result<(), DispatchError>;
}

impl IntentSink for Vec<WireMsg> {
    fn emit(&mut self, msg: WireMsg) -> Result<(), DispatchError> {
        self.push(msg);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnresolvedGroup,
    Locked(GroupId),
    MissingDevice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Emitted {
        event: &'static str,
        locked: Vec<GroupId>,
    },
    Ignored(IgnoreReason),
}

/// Turns interactions into outbound events and holds the per-group lock that
/// keeps a second command from racing the first. A lock is only cleared by
/// [`IntentDispatcher::release`] when a push naming the group arrives.
#[derive(Debug, Clone, Default)]
pub struct IntentDispatcher {
    locks: BTreeSet<GroupId>,
}

impl IntentDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(
        &mut self,
        interaction: Interaction,
        store: &StateStore,
        sink: &mut dyn IntentSink,
    ) -> Result<DispatchOutcome, DispatchError> {
        match interaction {
            Interaction::ModeToggled { group_id, checked } => {
                let id = match self.resolve_unlocked(group_id, store) {
                    Ok(id) => id,
                    Err(reason) => return Ok(DispatchOutcome::Ignored(reason)),
                };
                let msg = WireMsg::ModeChangeEvent(ModeChangePayload {
                    id: id.clone(),
                    mode: Mode::from_checked(checked),
                });
                self.emit(msg, vec![id], sink)
            }
            Interaction::DeviceToggled {
                group_id,
                device,
                checked,
            } => {
                if device.trim().is_empty() {
                    return Ok(DispatchOutcome::Ignored(IgnoreReason::MissingDevice));
                }
                let id = match self.resolve_unlocked(group_id, store) {
                    Ok(id) => id,
                    Err(reason) => return Ok(DispatchOutcome::Ignored(reason)),
                };
                let msg = WireMsg::ControlEvent(ControlPayload {
                    id: id.clone(),
                    device,
                    command: DeviceState::from_checked(checked),
                });
                self.emit(msg, vec![id], sink)
            }
            Interaction::WeatherSuggestionRequested { group_id } => {
                let Some(id) = resolve(group_id, store) else {
                    return Ok(DispatchOutcome::Ignored(IgnoreReason::UnresolvedGroup));
                };
                self.emit(
                    WireMsg::WeatherActionEvent(WeatherActionPayload { id }),
                    Vec::new(),
                    sink,
                )
            }
            Interaction::GlobalModeSelected { mode } => {
                let targets = store.ids().cloned().collect();
                self.emit(
                    WireMsg::GlobalModeChangeEvent(GlobalModeChangePayload { mode }),
                    targets,
                    sink,
                )
            }
            Interaction::GlobalDeviceCommand { device, command } => {
                if device.trim().is_empty() {
                    return Ok(DispatchOutcome::Ignored(IgnoreReason::MissingDevice));
                }
                let targets = store.ids().cloned().collect();
                self.emit(
                    WireMsg::GlobalControlEvent(GlobalControlPayload { device, command }),
                    targets,
                    sink,
                )
            }
            Interaction::GlobalWeatherRefresh => self.emit(
                WireMsg::RequestGlobalWeather(RequestGlobalWeatherPayload::default()),
                Vec::new(),
                sink,
            ),
        }
    }

    /// Clears locks for groups a push just mentioned; returns the ids that
    /// were actually locked.
    pub fn release<'a>(&mut self, ids: impl IntoIterator<Item = &'a GroupId>) -> Vec<GroupId> {
        ids.into_iter()
            .filter(|id| self.locks.remove(*id))
            .cloned()
            .collect()
    }

    pub fn is_locked(&self, id: &str) -> bool {
        self.locks.contains(id)
    }

    pub fn locked(&self) -> impl Iterator<Item = &GroupId> {
        self.locks.iter()
    }

    fn resolve_unlocked(
        &self,
        group_id: Option<GroupId>,
        store: &StateStore,
    ) -> Result<GroupId, IgnoreReason> {
        let id = resolve(group_id, store).ok_or(IgnoreReason::UnresolvedGroup)?;
        if self.locks.contains(&id) {
            return Err(IgnoreReason::Locked(id));
        }
        Ok(id)
    }

    fn emit(
        &mut self,
        msg: WireMsg,
        lock_targets: Vec<GroupId>,
        sink: &mut dyn IntentSink,
    ) -> Result<DispatchOutcome, DispatchError> {
        let event = msg.event_name();
        sink.emit(msg)?;
        self.locks.extend(lock_targets.iter().cloned());
        Ok(DispatchOutcome::Emitted {
            event,
            locked: lock_targets,
        })
    }
}

fn resolve(group_id: Option<GroupId>, store: &StateStore) -> Option<GroupId> {
    group_id.filter(|id| !id.trim().is_empty() && store.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartialGroupData;
    use std::collections::BTreeMap;

    struct ClosedSink;

    impl IntentSink for ClosedSink {
        fn emit(&mut self, _msg: WireMsg) -> Result<(), DispatchError> {
            Err(DispatchError::ChannelClosed)
        }
    }

    fn store_with(ids: &[&str]) -> StateStore {
        let mut store = StateStore::new();
        let snapshot: BTreeMap<_, _> = ids
            .iter()
            .map(|id| (id.to_string(), PartialGroupData::new()))
            .collect();
        store.apply_snapshot(snapshot);
        store
    }

    #[test]
    fn mode_toggle_emits_once_and_locks_group() {
        let store = store_with(&["g1"]);
        let mut dispatcher = IntentDispatcher::new();
        let mut sink = Vec::new();

        let outcome = dispatcher
            .dispatch(
                Interaction::ModeToggled {
                    group_id: Some("g1".to_string()),
                    checked: true,
                },
                &store,
                &mut sink,
            )
            .expect("dispatch");

        assert_eq!(
            outcome,
            DispatchOutcome::Emitted {
                event: "mode_change_event",
                locked: vec!["g1".to_string()],
            }
        );
        assert_eq!(
            sink,
            vec![WireMsg::ModeChangeEvent(ModeChangePayload {
                id: "g1".to_string(),
                mode: Mode::Auto,
            })]
        );
        assert!(dispatcher.is_locked("g1"));
    }

    #[test]
    fn locked_group_ignores_second_command_until_released() {
        let store = store_with(&["g1"]);
        let mut dispatcher = IntentDispatcher::new();
        let mut sink = Vec::new();
        let toggle = Interaction::DeviceToggled {
            group_id: Some("g1".to_string()),
            device: "fan".to_string(),
            checked: true,
        };

        dispatcher
            .dispatch(toggle.clone(), &store, &mut sink)
            .expect("first dispatch");
        let second = dispatcher
            .dispatch(toggle.clone(), &store, &mut sink)
            .expect("second dispatch");
        assert_eq!(
            second,
            DispatchOutcome::Ignored(IgnoreReason::Locked("g1".to_string()))
        );
        assert_eq!(sink.len(), 1);

        let released = dispatcher.release(["g1".to_string()].iter());
        assert_eq!(released, vec!["g1".to_string()]);
        dispatcher
            .dispatch(toggle, &store, &mut sink)
            .expect("third dispatch");
        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink[0],
            WireMsg::ControlEvent(ControlPayload {
                id: "g1".to_string(),
                device: "fan".to_string(),
                command: DeviceState::On,
            })
        );
    }

    #[test]
    fn unresolvable_group_is_ignored_without_emission() {
        let store = store_with(&["g1"]);
        let mut dispatcher = IntentDispatcher::new();
        let mut sink = Vec::new();

        for group_id in [None, Some(String::new()), Some("ghost".to_string())] {
            let outcome = dispatcher
                .dispatch(
                    Interaction::ModeToggled {
                        group_id,
                        checked: false,
                    },
                    &store,
                    &mut sink,
                )
                .expect("dispatch");
            assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::UnresolvedGroup));
        }
        assert!(sink.is_empty());
        assert_eq!(dispatcher.locked().count(), 0);
    }

    #[test]
    fn weather_suggestion_does_not_lock() {
        let store = store_with(&["g1"]);
        let mut dispatcher = IntentDispatcher::new();
        let mut sink = Vec::new();

        dispatcher
            .dispatch(
                Interaction::WeatherSuggestionRequested {
                    group_id: Some("g1".to_string()),
                },
                &store,
                &mut sink,
            )
            .expect("dispatch");

        assert_eq!(
            sink,
            vec![WireMsg::WeatherActionEvent(WeatherActionPayload {
                id: "g1".to_string()
            })]
        );
        assert!(!dispatcher.is_locked("g1"));
    }

    #[test]
    fn global_actions_lock_every_tracked_group() {
        let store = store_with(&["g1", "g2"]);
        let mut dispatcher = IntentDispatcher::new();
        let mut sink = Vec::new();

        dispatcher
            .dispatch(
                Interaction::GlobalDeviceCommand {
                    device: "light".to_string(),
                    command: DeviceState::Off,
                },
                &store,
                &mut sink,
            )
            .expect("dispatch");

        assert!(dispatcher.is_locked("g1"));
        assert!(dispatcher.is_locked("g2"));
        assert_eq!(sink[0].event_name(), "global_control_event");

        dispatcher
            .dispatch(Interaction::GlobalWeatherRefresh, &store, &mut sink)
            .expect("refresh");
        assert_eq!(sink[1].event_name(), "request_global_weather");
    }

    #[test]
    fn failed_emission_leaves_group_unlocked() {
        let store = store_with(&["g1"]);
        let mut dispatcher = IntentDispatcher::new();

        let result = dispatcher.dispatch(
            Interaction::ModeToggled {
                group_id: Some("g1".to_string()),
                checked: true,
            },
            &store,
            &mut ClosedSink,
        );

        assert_eq!(result, Err(DispatchError::ChannelClosed));
        assert!(!dispatcher.is_locked("g1"));
    }
}
