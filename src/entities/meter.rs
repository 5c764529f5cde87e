// 🚰 Meter Entity - water meter installed at an address
//
// Natural key: (serial number, parent address).

use super::{Entity, EntityKind, ParentRef};
use crate::parser::{parse_decimal, parse_int, parse_text, CsvRow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    pub id: Option<i64>,
    pub address: ParentRef,
    pub route_number: Option<i32>,
    pub read_sequence: Option<i32>,
    pub read_order: Option<i32>,
    pub serial_number: i32,
    pub manufacturer: String,
    pub size_description: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeterKey {
    pub serial_number: i32,
    pub address: ParentRef,
}

impl Meter {
    /// Build a new, unsaved meter under `address`.
    pub fn from_row(row: &CsvRow, serial_number: i32, address: ParentRef) -> Self {
        let mut meter = Meter {
            id: None,
            address,
            route_number: None,
            read_sequence: None,
            read_order: None,
            serial_number,
            manufacturer: String::new(),
            size_description: String::new(),
            latitude: None,
            longitude: None,
        };
        meter.apply_row(row);
        meter
    }

    /// Overwrite the non-key fields from the row.
    pub fn apply_row(&mut self, row: &CsvRow) {
        self.route_number = parse_int(row.rte_no.as_deref());
        self.read_sequence = parse_int(row.read_sequence.as_deref());
        self.read_order = parse_int(row.read_order.as_deref());
        self.manufacturer = parse_text(row.meter_manufacturer.as_deref()).unwrap_or_default();
        self.size_description = parse_text(row.meter_size_desc.as_deref()).unwrap_or_default();
        self.latitude = parse_decimal(row.lat_dd.as_deref());
        self.longitude = parse_decimal(row.lon_dd.as_deref());
    }

    /// Copy the values of `other`, keeping this id and parent.
    pub fn merge_from(&mut self, other: &Meter) {
        let (id, address) = (self.id, self.address);
        *self = other.clone();
        self.id = id;
        self.address = address;
    }
}

impl Entity for Meter {
    type Key = MeterKey;

    const KIND: EntityKind = EntityKind::Meter;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn natural_keys(&self) -> Vec<MeterKey> {
        vec![MeterKey {
            serial_number: self.serial_number,
            address: self.address,
        }]
    }

    fn label(&self) -> String {
        format!("meter {}", self.serial_number)
    }
}
