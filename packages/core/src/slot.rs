//! Slot references: the durable identifier grammar and the table
//! associating in-memory representatives with their slots.

use std::collections::HashMap;

use crate::{Representative, VomError};

/// The flavor of entity a slot refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Object,
    Promise,
    Device,
}

impl std::fmt::Display for SlotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotType::Object => write!(f, "object"),
            SlotType::Promise => write!(f, "promise"),
            SlotType::Device => write!(f, "device"),
        }
    }
}

/// The parsed fields of a slot reference.
///
/// The grammar is `<type><sign><id>[/<subid>]`, where `type` is `o`, `p`,
/// or `d` and `sign` is `+` (allocated by this vat) or `-` (allocated by
/// its peer). Virtual object instances carry a subid: `o+<kind>/<seq>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot_type: SlotType,
    pub allocated_by_vat: bool,
    pub id: u64,
    pub subid: Option<u64>,
}

impl SlotInfo {
    /// Whether the slot names a virtual object instance: an object slot,
    /// allocated by this vat, with an instance subid.
    pub fn is_virtual(&self) -> bool {
        self.slot_type == SlotType::Object && self.allocated_by_vat && self.subid.is_some()
    }
}

/// Parse slot references into their structured form.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn SlotParser>`.
pub trait SlotParser {
    fn parse(&self, slot: &str) -> Result<SlotInfo, VomError>;
}

/// The standard vat slot grammar parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct VatSlotParser;

impl SlotParser for VatSlotParser {
    fn parse(&self, slot: &str) -> Result<SlotInfo, VomError> {
        let invalid = |message: &str| VomError::InvalidSlot {
            slot: slot.to_string(),
            message: message.to_string(),
        };

        let mut chars = slot.chars();
        let slot_type = match chars.next() {
            Some('o') => SlotType::Object,
            Some('p') => SlotType::Promise,
            Some('d') => SlotType::Device,
            Some(_) => return Err(invalid("unknown slot type")),
            None => return Err(invalid("empty slot")),
        };
        let allocated_by_vat = match chars.next() {
            Some('+') => true,
            Some('-') => false,
            _ => return Err(invalid("expected '+' or '-' after the type")),
        };

        // Both prefix characters are ASCII, so the id body starts at byte 2.
        let body = &slot[2..];
        let (id_part, subid_part) = match body.split_once('/') {
            Some((id, subid)) => (id, Some(subid)),
            None => (body, None),
        };
        let id: u64 = id_part
            .parse()
            .map_err(|_| invalid("id is not an unsigned number"))?;
        let subid = match subid_part {
            Some(s) => Some(
                s.parse::<u64>()
                    .map_err(|_| invalid("subid is not an unsigned number"))?,
            ),
            None => None,
        };

        Ok(SlotInfo {
            slot_type,
            allocated_by_vat,
            id,
            subid,
        })
    }
}

/// Bidirectional association of representatives with slot strings.
///
/// The slot-to-representative direction holds strong references: a
/// representative, once bound, lives as long as the manager. There is no
/// mechanism to observe that user code has dropped its last handle, so
/// virtual keys are never collected. Known limitation.
pub struct SlotTable {
    by_rep: HashMap<usize, String>,
    by_slot: HashMap<String, Representative>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self {
            by_rep: HashMap::new(),
            by_slot: HashMap::new(),
        }
    }

    /// Associate a representative with a slot. Idempotent: binding the
    /// same representative again leaves the table unchanged.
    pub fn bind(&mut self, rep: &Representative, slot: &str) {
        if self.by_rep.contains_key(&rep.addr()) {
            return;
        }
        self.by_rep.insert(rep.addr(), slot.to_string());
        self.by_slot.insert(slot.to_string(), rep.clone());
    }

    /// The slot a representative is bound to, if any.
    pub fn slot_for(&self, rep: &Representative) -> Option<String> {
        self.by_rep.get(&rep.addr()).cloned()
    }

    /// The representative bound to a slot, if any.
    pub fn representative_for(&self, slot: &str) -> Option<Representative> {
        self.by_slot.get(slot).cloned()
    }

    /// Number of bound representatives.
    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}
