//! Capability topology resolver.
//!
//! Maps the hardware DIP switch, the input-active flags and the dimmer
//! metadata to the set of output services (dimmers and window coverings)
//! that exist on one device. Pure logic, no I/O.

use crate::device::models::DimmerConfigResponse;
use crate::services::ServiceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::FromRepr;

/// Physical wiring layout selected by the 2-bit DIP switch on the device.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum DipConfiguration {
    /// Two motorized blinds
    TwoBlinds = 0,
    /// Two dimmers (outputs 1-2) and one blind (outputs 3-4)
    DimmersThenBlind = 1,
    /// One blind (outputs 1-2) and two dimmers (outputs 3-4)
    BlindThenDimmers = 2,
    /// Four dimmers
    FourDimmers = 3,
}

impl DipConfiguration {
    pub fn from_raw(value: u8) -> Option<Self> {
        Self::from_repr(value)
    }

    pub fn raw(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DipConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self {
            Self::TwoBlinds => "two blinds",
            Self::DimmersThenBlind => "two dimmers + blind",
            Self::BlindThenDimmers => "blind + two dimmers",
            Self::FourDimmers => "four dimmers",
        };
        write!(f, "DIP {} ({})", self.raw(), layout)
    }
}

/// Per-input "active" flags from `/api/v1/input_config`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputActivity {
    active: Vec<bool>,
}

impl InputActivity {
    pub fn new(active: Vec<bool>) -> Self {
        Self { active }
    }

    /// Input 0 is wired as an input, which makes dimmer channel 0 unavailable.
    pub fn first_active(&self) -> bool {
        self.active.first().copied().unwrap_or(false)
    }
}

/// Output kind tag reported by `/api/v1/dimmer_config`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputKind {
    NonDimmable,
    Dimmable,
}

impl OutputKind {
    /// `"non_dimmable"` is the only tag that disables brightness control.
    pub fn from_tag(tag: &str) -> Self {
        if tag == "non_dimmable" {
            Self::NonDimmable
        } else {
            Self::Dimmable
        }
    }
}

/// Name and output kind of one physical dimmer channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DimmerMetadata {
    pub name: Option<String>,
    pub output: Option<OutputKind>,
}

impl DimmerMetadata {
    pub fn is_dimmable(&self) -> bool {
        self.output != Some(OutputKind::NonDimmable)
    }
}

/// Metadata for all four physical dimmer outputs, indexed by output number - 1.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DimmerMetadataSet {
    entries: Vec<DimmerMetadata>,
}

impl DimmerMetadataSet {
    pub fn new(entries: Vec<DimmerMetadata>) -> Self {
        Self { entries }
    }

    /// Metadata for dimmer `number` (1..=4). Missing entries are untagged and unnamed.
    pub fn for_dimmer(&self, number: u8) -> DimmerMetadata {
        usize::from(number)
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .cloned()
            .unwrap_or_default()
    }
}

impl From<&DimmerConfigResponse> for DimmerMetadataSet {
    fn from(response: &DimmerConfigResponse) -> Self {
        Self::new(
            response
                .dimmers
                .iter()
                .map(|d| DimmerMetadata {
                    name: d.name.clone().filter(|n| !n.trim().is_empty()),
                    output: d.output.as_deref().map(OutputKind::from_tag),
                })
                .collect(),
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SlotKind {
    Dimmer,
    Cover,
}

/// One resolved output service and the hardware channel it is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputSlot {
    pub kind: SlotKind,
    pub id: ServiceId,
    /// Hardware channel index, never renumbered when a slot is suppressed.
    pub channel: u8,
    /// Display name from the device (dimmers only)
    pub name: Option<String>,
    pub dimmable: bool,
}

impl OutputSlot {
    fn dimmer(number: u8, channel: u8, metadata: &DimmerMetadataSet) -> Self {
        let meta = metadata.for_dimmer(number);
        Self {
            kind: SlotKind::Dimmer,
            id: ServiceId::Dimmer(number),
            channel,
            dimmable: meta.is_dimmable(),
            name: meta.name,
        }
    }

    fn cover(index: u8) -> Self {
        Self {
            kind: SlotKind::Cover,
            id: ServiceId::Cover(index),
            channel: index,
            name: None,
            dimmable: false,
        }
    }
}

/// The resolved set of output services for one device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    pub dip: DipConfiguration,
    pub slots: Vec<OutputSlot>,
}

impl Topology {
    pub fn slot(&self, id: ServiceId) -> Option<&OutputSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: ServiceId) -> bool {
        self.slot(id).is_some()
    }

    pub fn dimmers(&self) -> impl Iterator<Item = &OutputSlot> {
        self.slots.iter().filter(|s| s.kind == SlotKind::Dimmer)
    }
}

/// Resolve the output services for a DIP setting and input configuration.
///
/// Input 0 being active only ever removes D1. Covers and the other dimmers
/// are never affected, and the remaining dimmers keep their channel indices.
pub fn resolve(
    dip: DipConfiguration,
    inputs: &InputActivity,
    metadata: &DimmerMetadataSet,
) -> Topology {
    let mut slots = match dip {
        DipConfiguration::FourDimmers => vec![
            OutputSlot::dimmer(1, 0, metadata),
            OutputSlot::dimmer(2, 1, metadata),
            OutputSlot::dimmer(3, 2, metadata),
            OutputSlot::dimmer(4, 3, metadata),
        ],
        // D3/D4 sit on outputs 3-4 but are channels 0-1 of the remaining dimmers
        DipConfiguration::BlindThenDimmers => vec![
            OutputSlot::cover(0),
            OutputSlot::dimmer(3, 0, metadata),
            OutputSlot::dimmer(4, 1, metadata),
        ],
        DipConfiguration::DimmersThenBlind => vec![
            OutputSlot::dimmer(1, 0, metadata),
            OutputSlot::dimmer(2, 1, metadata),
            OutputSlot::cover(0),
        ],
        DipConfiguration::TwoBlinds => vec![OutputSlot::cover(0), OutputSlot::cover(1)],
    };

    if inputs.first_active() {
        slots.retain(|s| s.id != ServiceId::Dimmer(1));
    }

    Topology { dip, slots }
}
