// 🏠 Address Entity - service location, root of every row
//
// Natural key: LocationICN when the export carries one, otherwise the
// (street line, city, zip) tuple compared ASCII case-insensitively.
//
// The tuple fallback can merge two physical locations whose text happens to
// match. That behaviour is kept; the reconciler reports it as a data-quality
// warning whenever the ICNs disagree.

use super::{Entity, EntityKind};
use crate::parser::{parse_datetime, parse_decimal, parse_int, parse_text, CsvRow};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: Option<i64>,
    pub location_icn: Option<i32>,
    pub street_line1: String,
    pub serv_pt_id: Option<i32>,
    pub mtr_desc: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub height: Option<Decimal>,
    pub building_year: Option<i32>,
    pub building_status: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub serv_est_date: Option<NaiveDateTime>,
    pub serv_year_final: Option<i32>,
    pub sl_install_ticket_date: Option<NaiveDateTime>,
    pub sl_material_us: Option<String>,
    pub sl_material_cust_side: Option<String>,
}

/// Dedup key for an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressKey {
    Icn(i32),
    Location {
        street: String,
        city: String,
        zip: String,
    },
}

impl AddressKey {
    /// Tuple key; absent city/zip compare as empty.
    pub fn location(street: &str, city: Option<&str>, zip: Option<&str>) -> Self {
        AddressKey::Location {
            street: street.trim().to_ascii_lowercase(),
            city: city.unwrap_or("").trim().to_ascii_lowercase(),
            zip: zip.unwrap_or("").trim().to_ascii_lowercase(),
        }
    }

    /// Keys to probe for a raw row, most specific first.
    pub fn for_row(row: &CsvRow) -> Vec<AddressKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(icn) = parse_int(row.location_icn.as_deref()) {
            keys.push(AddressKey::Icn(icn));
        }
        if let Some(street) = parse_text(row.location_address_line1.as_deref()) {
            keys.push(AddressKey::location(
                &street,
                row.city.as_deref(),
                row.zip.as_deref(),
            ));
        }
        keys
    }
}

impl Address {
    /// Build a new, unsaved address. The street line is validated upstream.
    pub fn from_row(row: &CsvRow) -> Self {
        let mut address = Address {
            id: None,
            location_icn: None,
            street_line1: String::new(),
            serv_pt_id: None,
            mtr_desc: None,
            latitude: None,
            longitude: None,
            height: None,
            building_year: None,
            building_status: None,
            city: None,
            zip: None,
            serv_est_date: None,
            serv_year_final: None,
            sl_install_ticket_date: None,
            sl_material_us: None,
            sl_material_cust_side: None,
        };
        address.apply_row(row);
        address
    }

    /// Overwrite every mapped field from the row. The id is left alone.
    pub fn apply_row(&mut self, row: &CsvRow) {
        self.location_icn = parse_int(row.location_icn.as_deref());
        self.street_line1 = parse_text(row.location_address_line1.as_deref()).unwrap_or_default();
        self.serv_pt_id = parse_int(row.serv_pt_id.as_deref());
        self.mtr_desc = parse_text(row.mtr_desc.as_deref());
        self.latitude = parse_decimal(row.location_latitude.as_deref());
        self.longitude = parse_decimal(row.location_longitude.as_deref());
        self.height = parse_decimal(row.location_height.as_deref());
        self.building_year = parse_int(row.building_year.as_deref());
        self.building_status = parse_text(row.building_status.as_deref());
        self.city = parse_text(row.city.as_deref());
        self.zip = parse_text(row.zip.as_deref());
        self.serv_est_date = parse_datetime(row.serv_est_date.as_deref());
        self.serv_year_final = parse_int(row.serv_year_final.as_deref());
        self.sl_install_ticket_date = parse_datetime(row.sl_install_ticket_date.as_deref());
        self.sl_material_us = parse_text(row.sl_material_us.as_deref());
        self.sl_material_cust_side = parse_text(row.sl_material_cust_side.as_deref());
    }

    /// Copy the values of `other` onto this address, keeping this id.
    pub fn merge_from(&mut self, other: &Address) {
        let id = self.id;
        *self = other.clone();
        self.id = id;
    }

    pub fn location_key(&self) -> AddressKey {
        AddressKey::location(&self.street_line1, self.city.as_deref(), self.zip.as_deref())
    }
}

impl Entity for Address {
    type Key = AddressKey;

    const KIND: EntityKind = EntityKind::Address;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn natural_keys(&self) -> Vec<AddressKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(icn) = self.location_icn {
            keys.push(AddressKey::Icn(icn));
        }
        keys.push(self.location_key());
        keys
    }

    fn label(&self) -> String {
        format!("address {:?}", self.street_line1)
    }
}
