// 🗺️ GIS Record Entity - field-collected survey point for an endpoint
//
// Natural key: OBJECTID when present, otherwise the parent endpoint.
// Each endpoint carries at most one GIS record.

use super::{Entity, EntityKind, ParentRef};
use crate::parser::{parse_datetime, parse_decimal, parse_int, parse_text, CsvRow};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GisRecord {
    pub id: Option<i64>,
    pub endpoint: ParentRef,
    pub object_id: Option<i32>,

    // ========================================================================
    // COLLECTION METADATA
    // ========================================================================
    pub collected_by: Option<String>,
    pub device_type: Option<String>,
    pub device_id: Option<String>,
    pub corr_status: Option<String>,
    pub corr_source: Option<String>,
    pub creation_date_time: Option<NaiveDateTime>,
    pub update_date_time: Option<NaiveDateTime>,

    // ========================================================================
    // ACCURACY / POSITION
    // ========================================================================
    pub horiz_est_acc: Option<Decimal>,
    pub vert_est_acc: Option<Decimal>,
    pub geom_capture_type: Option<String>,
    pub x_current_map_cs: Option<Decimal>,
    pub y_current_map_cs: Option<Decimal>,
    pub pdop: Option<Decimal>,
    pub hdop: Option<Decimal>,
    pub feature_height: Option<Decimal>,
    pub accuracy_reporting: Option<String>,

    // ========================================================================
    // PROJECT / SERVICE LINE
    // ========================================================================
    pub task_name: Option<String>,
    pub project_name: Option<String>,
    pub auto_increment_alpha: Option<String>,
    pub auto_increment_numeric: Option<i32>,
    pub sl_size: Option<String>,
    pub class_source_util: Option<String>,
    pub class_source_cust: Option<String>,
    pub sl_material_all: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GisKey {
    ObjectId(i32),
    Endpoint(ParentRef),
}

impl GisRecord {
    pub fn from_row(row: &CsvRow, endpoint: ParentRef) -> Self {
        let mut record = GisRecord {
            id: None,
            endpoint,
            object_id: None,
            collected_by: None,
            device_type: None,
            device_id: None,
            corr_status: None,
            corr_source: None,
            creation_date_time: None,
            update_date_time: None,
            horiz_est_acc: None,
            vert_est_acc: None,
            geom_capture_type: None,
            x_current_map_cs: None,
            y_current_map_cs: None,
            pdop: None,
            hdop: None,
            feature_height: None,
            accuracy_reporting: None,
            task_name: None,
            project_name: None,
            auto_increment_alpha: None,
            auto_increment_numeric: None,
            sl_size: None,
            class_source_util: None,
            class_source_cust: None,
            sl_material_all: None,
        };
        record.apply_row(row);
        record
    }

    /// Overwrite every mapped field, OBJECTID included.
    pub fn apply_row(&mut self, row: &CsvRow) {
        self.object_id = parse_int(row.object_id.as_deref());
        self.collected_by = parse_text(row.collected_by.as_deref());
        self.device_type = parse_text(row.device_type.as_deref());
        self.device_id = parse_text(row.device_id.as_deref());
        self.corr_status = parse_text(row.corr_status.as_deref());
        self.corr_source = parse_text(row.corr_source.as_deref());
        self.creation_date_time = parse_datetime(row.creation_date_time.as_deref());
        self.update_date_time = parse_datetime(row.update_date_time.as_deref());
        self.horiz_est_acc = parse_decimal(row.horiz_est_acc.as_deref());
        self.vert_est_acc = parse_decimal(row.vert_est_acc.as_deref());
        self.geom_capture_type = parse_text(row.geom_capture_type.as_deref());
        self.x_current_map_cs = parse_decimal(row.x_current_map_cs.as_deref());
        self.y_current_map_cs = parse_decimal(row.y_current_map_cs.as_deref());
        self.pdop = parse_decimal(row.pdop.as_deref());
        self.hdop = parse_decimal(row.hdop.as_deref());
        self.feature_height = parse_decimal(row.feature_height.as_deref());
        self.accuracy_reporting = parse_text(row.accuracy_reporting.as_deref());
        self.task_name = parse_text(row.task_name.as_deref());
        self.project_name = parse_text(row.project_name.as_deref());
        self.auto_increment_alpha = parse_text(row.auto_increment_alpha.as_deref());
        self.auto_increment_numeric = parse_int(row.auto_increment_numeric.as_deref());
        self.sl_size = parse_text(row.sl_size.as_deref());
        self.class_source_util = parse_text(row.class_source_util.as_deref());
        self.class_source_cust = parse_text(row.class_source_cust.as_deref());
        self.sl_material_all = parse_text(row.sl_material_all.as_deref());
    }

    /// Copy the values of `other`, keeping this id and parent.
    pub fn merge_from(&mut self, other: &GisRecord) {
        let (id, endpoint) = (self.id, self.endpoint);
        *self = other.clone();
        self.id = id;
        self.endpoint = endpoint;
    }
}

impl Entity for GisRecord {
    type Key = GisKey;

    const KIND: EntityKind = EntityKind::GisRecord;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn natural_keys(&self) -> Vec<GisKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(object_id) = self.object_id {
            keys.push(GisKey::ObjectId(object_id));
        }
        keys.push(GisKey::Endpoint(self.endpoint));
        keys
    }

    fn label(&self) -> String {
        match self.object_id {
            Some(object_id) => format!("GIS record OBJECTID={object_id}"),
            None => format!("GIS record for endpoint {:?}", self.endpoint),
        }
    }
}
