//! Retained card nodes for every tracked group.
//!
//! Cards are created once per id and then patched in place; the registry is
//! the only way to reach a card, so nothing outside this module can flip a
//! switch without going through a store-derived update.

use crate::staleness::{Countdown, StalenessScheduler};
use crate::store::{ModeDiff, SnapshotDiff, StateStore};
use crate::{FieldValue, GroupEntry, GroupId};
use std::collections::HashMap;

pub const OPEN_DOOR_SENTINEL: &str = "OPEN";
pub const MISSING_READING: &str = "N/A";
pub const TIMER_UNKNOWN: &str = "--";
pub const TIMER_DELAYED: &str = "data delayed...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Door reported open.
    Alert,
    /// Countdown exhausted.
    Delayed,
    /// Waiting on a server reply.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardDevice {
    pub name: &'static str,
    pub label: &'static str,
    pub manual_only: bool,
}

/// Device switches every card carries, in display order.
pub const CARD_DEVICES: [CardDevice; 3] = [
    CardDevice {
        name: "light",
        label: "Light",
        manual_only: false,
    },
    CardDevice {
        name: "fan",
        label: "Fan",
        manual_only: true,
    },
    CardDevice {
        name: "sprinkler",
        label: "Sprinkler",
        manual_only: true,
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextNode {
    text: String,
    marker: Option<Marker>,
}

impl TextNode {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            marker: None,
        }
    }

    fn set(&mut self, text: String, marker: Option<Marker>) {
        self.text = text;
        self.marker = marker;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn marker(&self) -> Option<Marker> {
        self.marker
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchNode {
    name: String,
    label: String,
    manual_only: bool,
    checked: bool,
    disabled: bool,
}

impl SwitchNode {
    fn new(name: &str, label: &str, manual_only: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            manual_only,
            checked: false,
            disabled: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_manual_only(&self) -> bool {
        self.manual_only
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardNode {
    id: GroupId,
    mode_text: TextNode,
    mode_switch: SwitchNode,
    devices: Vec<SwitchNode>,
    manual_section_disabled: bool,
    temperature: TextNode,
    humidity: TextNode,
    door: TextNode,
    timer: TextNode,
    result: TextNode,
}

impl CardNode {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            mode_text: TextNode::new("Manual"),
            mode_switch: SwitchNode::new("mode", "Mode", false),
            devices: CARD_DEVICES
                .iter()
                .map(|device| SwitchNode::new(device.name, device.label, device.manual_only))
                .collect(),
            manual_section_disabled: false,
            temperature: TextNode::new(MISSING_READING),
            humidity: TextNode::new(MISSING_READING),
            door: TextNode::new(MISSING_READING),
            timer: TextNode::new(TIMER_UNKNOWN),
            result: TextNode::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode_text(&self) -> &TextNode {
        &self.mode_text
    }

    pub fn mode_switch(&self) -> &SwitchNode {
        &self.mode_switch
    }

    pub fn devices(&self) -> &[SwitchNode] {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&SwitchNode> {
        self.devices.iter().find(|switch| switch.name == name)
    }

    pub fn manual_section_disabled(&self) -> bool {
        self.manual_section_disabled
    }

    pub fn temperature(&self) -> &TextNode {
        &self.temperature
    }

    pub fn humidity(&self) -> &TextNode {
        &self.humidity
    }

    pub fn door(&self) -> &TextNode {
        &self.door
    }

    pub fn timer(&self) -> &TextNode {
        &self.timer
    }

    pub fn result(&self) -> &TextNode {
        &self.result
    }

    pub fn is_locked(&self) -> bool {
        self.mode_switch.disabled
    }

    pub fn accepts_mode_toggle(&self) -> bool {
        !self.mode_switch.disabled
    }

    /// A device switch is interactive unless the card is locked or the
    /// switch sits in a disabled manual section.
    pub fn accepts_device_toggle(&self, name: &str) -> bool {
        self.device(name)
            .map(|switch| {
                !switch.disabled && !(switch.manual_only && self.manual_section_disabled)
            })
            .unwrap_or(false)
    }

    fn apply_entry(&mut self, entry: &GroupEntry) {
        self.temperature
            .set(format_reading(entry.field("temperature")), None);
        self.humidity.set(format_reading(entry.field("humidity")), None);

        let door = entry
            .field("door")
            .map(|value| value.to_string())
            .filter(|value| !value.is_empty());
        let marker = door
            .as_deref()
            .filter(|value| *value == OPEN_DOOR_SENTINEL)
            .map(|_| Marker::Alert);
        self.door
            .set(door.unwrap_or_else(|| MISSING_READING.to_string()), marker);

        let auto = entry.mode.is_auto();
        self.mode_switch.checked = auto;
        self.mode_text.set(entry.mode.label().to_string(), None);
        self.manual_section_disabled = auto;

        for switch in &mut self.devices {
            switch.checked = entry
                .device_state(&switch.name)
                .map(|state| state.is_on())
                .unwrap_or(false);
        }
    }

    fn apply_countdown(&mut self, countdown: Option<Countdown>) {
        match countdown.and_then(|countdown| countdown.remaining()) {
            None => self.timer.set(TIMER_UNKNOWN.to_string(), None),
            Some(0) => self
                .timer
                .set(TIMER_DELAYED.to_string(), Some(Marker::Delayed)),
            Some(remaining) => self.timer.set(remaining.to_string(), None),
        }
    }

    fn set_locked(&mut self, locked: bool) {
        self.mode_switch.disabled = locked;
        for switch in &mut self.devices {
            switch.disabled = locked;
        }
    }
}

fn format_reading(value: Option<&FieldValue>) -> String {
    match value {
        Some(FieldValue::Number(number)) => format!("{number:.2}"),
        Some(other) => other.to_string(),
        None => MISSING_READING.to_string(),
    }
}

/// Card registry keyed by group id, kept in container (insertion) order.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    cards: HashMap<GroupId, CardNode>,
    order: Vec<GroupId>,
    created_total: u64,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detaches evicted cards, creates cards for unseen ids, and patches the
    /// rest in place. Safe to repeat with the same diff.
    pub fn reconcile(
        &mut self,
        diff: &SnapshotDiff,
        store: &StateStore,
        scheduler: &StalenessScheduler,
    ) {
        for id in &diff.removed {
            self.detach(id);
        }
        for id in diff.touched() {
            let Some(entry) = store.get(id) else {
                continue;
            };
            let card = self.attach(id);
            card.apply_entry(entry);
            card.apply_countdown(scheduler.countdown(id));
        }
    }

    pub fn sync_modes(&mut self, diff: &ModeDiff, store: &StateStore) {
        for id in &diff.updated {
            let (Some(card), Some(entry)) = (self.cards.get_mut(id), store.get(id)) else {
                continue;
            };
            card.apply_entry(entry);
        }
    }

    /// Returns false when the id has no card.
    pub fn render_countdown(&mut self, id: &str, countdown: Option<Countdown>) -> bool {
        match self.cards.get_mut(id) {
            Some(card) => {
                card.apply_countdown(countdown);
                true
            }
            None => false,
        }
    }

    pub fn set_locked(&mut self, id: &str, locked: bool) -> bool {
        match self.cards.get_mut(id) {
            Some(card) => {
                card.set_locked(locked);
                true
            }
            None => false,
        }
    }

    pub fn set_result(&mut self, id: &str, text: &str, marker: Option<Marker>) -> bool {
        match self.cards.get_mut(id) {
            Some(card) => {
                card.result.set(text.to_string(), marker);
                true
            }
            None => false,
        }
    }

    pub fn card(&self, id: &str) -> Option<&CardNode> {
        self.cards.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cards.contains_key(id)
    }

    /// Cards in container order.
    pub fn cards(&self) -> impl Iterator<Item = &CardNode> {
        self.order.iter().filter_map(|id| self.cards.get(id))
    }

    pub fn card_at(&self, index: usize) -> Option<&CardNode> {
        self.order.get(index).and_then(|id| self.cards.get(id))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Number of cards ever built; stays flat while ids are only updated.
    pub fn created_total(&self) -> u64 {
        self.created_total
    }

    fn attach(&mut self, id: &str) -> &mut CardNode {
        let order = &mut self.order;
        let created_total = &mut self.created_total;
        self.cards.entry(id.to_string()).or_insert_with(|| {
            order.push(id.to_string());
            *created_total = created_total.saturating_add(1);
            CardNode::new(id)
        })
    }

    fn detach(&mut self, id: &str) {
        if self.cards.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
        }
    }
}
