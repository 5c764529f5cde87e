// 📐 Record Validator - required-field checks per entity kind
// Decides whether a row carries enough data to build an entity

use crate::entities::EntityKind;
use crate::parser::{parse_int, parse_text, CsvRow};
use std::fmt;

// ============================================================================
// REQUIRED FIELDS
// ============================================================================

/// A CSV column some entity cannot be built without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    StreetLine1,
    MeterSerial,
    MeterManufacturer,
    MeterSizeDesc,
    EndpointSerial,
}

impl RequiredField {
    /// Header name as it appears in the export.
    pub fn header(&self) -> &'static str {
        match self {
            RequiredField::StreetLine1 => "Location_Address_Line1",
            RequiredField::MeterSerial => "Meter_SN",
            RequiredField::MeterManufacturer => "Meter_Manufacturer",
            RequiredField::MeterSizeDesc => "Meter_Size_Desc",
            RequiredField::EndpointSerial => "Endpoint_SN",
        }
    }

    fn value<'a>(&self, row: &'a CsvRow) -> Option<&'a str> {
        match self {
            RequiredField::StreetLine1 => row.location_address_line1.as_deref(),
            RequiredField::MeterSerial => row.meter_sn.as_deref(),
            RequiredField::MeterManufacturer => row.meter_manufacturer.as_deref(),
            RequiredField::MeterSizeDesc => row.meter_size_desc.as_deref(),
            RequiredField::EndpointSerial => row.endpoint_sn.as_deref(),
        }
    }

    /// Serial numbers are stored as integers.
    fn must_be_integer(&self) -> bool {
        matches!(self, RequiredField::MeterSerial | RequiredField::EndpointSerial)
    }

    /// Fields that must be present before `kind` can be built.
    /// GIS records need nothing beyond their parent endpoint.
    pub fn for_kind(kind: EntityKind) -> &'static [RequiredField] {
        match kind {
            EntityKind::Address => &[RequiredField::StreetLine1],
            EntityKind::Meter => &[
                RequiredField::MeterSerial,
                RequiredField::MeterManufacturer,
                RequiredField::MeterSizeDesc,
            ],
            EntityKind::Endpoint => &[RequiredField::EndpointSerial],
            EntityKind::GisRecord => &[],
        }
    }
}

/// Return the subset of `required` that is null or blank in `row`.
pub fn missing_fields(row: &CsvRow, required: &[RequiredField]) -> Vec<RequiredField> {
    required
        .iter()
        .copied()
        .filter(|field| parse_text(field.value(row)).is_none())
        .collect()
}

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Missing,
    NotAnInteger(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: EntityKind,
    pub field: RequiredField,
    pub problem: Problem,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            Problem::Missing => write!(f, "[{}] {} is missing", self.kind, self.field.header()),
            Problem::NotAnInteger(raw) => write!(
                f,
                "[{}] {} is not an integer ({raw:?})",
                self.kind,
                self.field.header()
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Render a list of problems as one log-friendly line.
pub fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// RECORD VALIDATOR
// ============================================================================

/// Validate the columns `kind` depends on.
pub fn validate(row: &CsvRow, kind: EntityKind) -> ValidationResult {
    let required = RequiredField::for_kind(kind);
    let mut errors: Vec<ValidationError> = missing_fields(row, required)
        .into_iter()
        .map(|field| ValidationError {
            kind,
            field,
            problem: Problem::Missing,
        })
        .collect();

    for field in required.iter().filter(|f| f.must_be_integer()) {
        if let Some(raw) = parse_text(field.value(row)) {
            if parse_int(Some(&raw)).is_none() {
                errors.push(ValidationError {
                    kind,
                    field: *field,
                    problem: Problem::NotAnInteger(raw),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
