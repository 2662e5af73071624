//! Moves the fields of a parsed frame into the property store.

use crate::parser::Frame;
use crate::properties::{PUMP_COUNT, SpaProperties};
use crate::property::convert::int;
use crate::property::{ConversionError, Field};
use crate::schema::{Firmware, Register, for_each_property};
use jiff::civil::DateTime;
use tracing::{trace, warn};

/// One row of the property table.
pub struct FieldEntry {
    pub register: Register,
    pub offset: usize,
    pub name: &'static str,
    pub description: &'static str,
    /// The field only exists on frames from this firmware generation.
    pub only: Option<Firmware>,
    pub cell: fn(&mut SpaProperties) -> &mut dyn Field,
    pub view: fn(&SpaProperties) -> &dyn Field,
}

impl FieldEntry {
    pub fn applies_to(&self, firmware: Firmware) -> bool {
        self.only.is_none_or(|only| only == firmware)
    }
}

macro_rules! only_on {
    () => {
        None
    };
    ($only:ident) => {
        Some(Firmware::$only)
    };
}

macro_rules! field_table {
    ($($reg:ident + $off:literal $(if $only:ident)? => $field:ident: $ty:ty = $init:expr, $name:literal, $doc:literal;)*) => {
        pub static FIELDS: &[FieldEntry] = &[$(
            FieldEntry {
                register: Register::$reg,
                offset: $off,
                name: $name,
                description: $doc,
                only: only_on!($($only)?),
                cell: {
                    fn cell(properties: &mut SpaProperties) -> &mut dyn Field {
                        &mut properties.$field
                    }
                    cell
                },
                view: {
                    fn view(properties: &SpaProperties) -> &dyn Field {
                        &properties.$field
                    }
                    view
                },
            },
        )*];
    };
}

for_each_property!(field_table);

pub const SPA_TIME: &str = "SpaTime";
/// Offsets into R2 of hour, minute, second, day, month and year.
pub const SPA_TIME_FIELDS: [usize; 6] = [6, 7, 8, 9, 10, 11];
/// Run state of pump N is at R5 + 17 + N.
pub const PUMP_STATE: (Register, usize) = (Register::R5, 18);
/// Run permission of pump N is at RG + N.
pub const PUMP_OK: (Register, usize) = (Register::RG, 1);
/// Install state of pump N is at RG + 6 + N.
pub const PUMP_INSTALL: (Register, usize) = (Register::RG, 7);

/// What changed while mapping a frame.
#[derive(Debug, Default)]
pub struct MapReport {
    /// Names and new values of the properties that changed.
    pub changed: Vec<(&'static str, String)>,
    /// Numbers of the pumps whose state, permission or install state changed.
    pub pumps_changed: Vec<usize>,
    /// Fields that failed conversion and kept their old value.
    pub rejected: usize,
}

impl MapReport {
    fn record(
        &mut self,
        name: &'static str,
        field: &dyn Field,
        result: Result<bool, ConversionError>,
    ) -> bool {
        match result {
            Ok(changed) => {
                if changed {
                    self.changed.push((name, field.display().unwrap_or_default()));
                }
                changed
            }
            Err(e) => {
                self.rejected += 1;
                warn!(message = "field rejected", name, error = (&e as &dyn std::error::Error));
                false
            }
        }
    }
}

/// Apply every field of `frame` to `properties`.
///
/// A field that does not convert keeps its old value and does not stop the rest of the frame
/// from being applied. Fields of registers the frame does not carry are skipped.
pub fn apply(frame: &Frame, properties: &mut SpaProperties) -> MapReport {
    let firmware = frame.layout.firmware();
    let mut report = MapReport::default();
    for entry in FIELDS {
        if !entry.applies_to(firmware) {
            continue;
        }
        let Some(raw) = frame.field(entry.register, entry.offset) else {
            trace!(message = "field not in frame", name = entry.name, register = %entry.register);
            continue;
        };
        let field = (entry.cell)(properties);
        let result = field.apply(raw);
        report.record(entry.name, field, result);
    }
    apply_spa_time(frame, properties, &mut report);
    apply_pumps(frame, properties, &mut report);
    report
}

fn apply_spa_time(frame: &Frame, properties: &mut SpaProperties, report: &mut MapReport) {
    let mut parts = [0; 6];
    for (part, offset) in parts.iter_mut().zip(SPA_TIME_FIELDS) {
        let Some(raw) = frame.field(Register::R2, offset) else {
            return;
        };
        match int(raw) {
            Ok(value) => *part = value,
            Err(e) => {
                report.record(SPA_TIME, &properties.spa_time, Err(e));
                return;
            }
        }
    }
    let result = civil_time(parts).map(|time| properties.spa_time.replace(time));
    report.record(SPA_TIME, &properties.spa_time, result);
}

fn civil_time(
    [hour, minute, second, day, month, year]: [i32; 6],
) -> Result<DateTime, ConversionError> {
    let error =
        || ConversionError::DateTime(format!("{year}-{month}-{day} {hour}:{minute}:{second}"));
    let narrow = |v: i32| i8::try_from(v).map_err(|_| error());
    let year = i16::try_from(year).map_err(|_| error())?;
    let (month, day) = (narrow(month)?, narrow(day)?);
    DateTime::new(year, month, day, narrow(hour)?, narrow(minute)?, narrow(second)?, 0)
        .map_err(|_| error())
}

/// Pumps draw from two registers. Both are applied before any pump is reported as changed.
fn apply_pumps(frame: &Frame, properties: &mut SpaProperties, report: &mut MapReport) {
    let mut changed = [false; PUMP_COUNT];
    for (index, changed) in changed.iter_mut().enumerate() {
        let Some(pump) = properties.pump_mut(index + 1) else { continue };
        if let Some(raw) = frame.field(PUMP_STATE.0, PUMP_STATE.1 + index) {
            *changed |= pump_field(report, &mut pump.state, raw);
        }
    }
    for (index, changed) in changed.iter_mut().enumerate() {
        let Some(pump) = properties.pump_mut(index + 1) else { continue };
        if let Some(raw) = frame.field(PUMP_OK.0, PUMP_OK.1 + index) {
            *changed |= pump_field(report, &mut pump.ok_to_run, raw);
        }
        if let Some(raw) = frame.field(PUMP_INSTALL.0, PUMP_INSTALL.1 + index) {
            *changed |= pump_field(report, &mut pump.install_state, raw);
        }
    }
    report.pumps_changed.extend((1..=PUMP_COUNT).filter(|number| changed[number - 1]));
}

fn pump_field(report: &mut MapReport, field: &mut dyn Field, raw: &str) -> bool {
    match field.apply(raw) {
        Ok(changed) => changed,
        Err(e) => {
            report.rejected += 1;
            warn!(message = "pump field rejected", error = (&e as &dyn std::error::Error));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FrameBuilder;
    use crate::parser::ResponseParser;
    use crate::properties::SpaMode;
    use crate::schema::SPANET;
    use std::collections::HashSet;

    fn parse(builder: FrameBuilder) -> Frame {
        ResponseParser::new(&SPANET).parse(&builder.build()).unwrap()
    }

    #[test]
    fn table_is_consistent() {
        let mut names = HashSet::new();
        let mut places = HashSet::new();
        for entry in FIELDS {
            assert!(names.insert(entry.name), "{} listed twice", entry.name);
            assert!(places.insert((entry.register, entry.offset)), "{} overlaps", entry.name);
            assert!(entry.offset > 0);
        }
        let properties = SpaProperties::new();
        assert!(FIELDS.iter().all(|entry| (entry.view)(&properties).display().is_none()));
    }

    #[test]
    fn values_land_at_their_offsets() {
        let frame = parse(
            FrameBuilder::current()
                .set(Register::R2, 2, "241")
                .set(Register::R3, 7, "SV-2")
                .set(Register::R5, 14, "1")
                .set(Register::R6, 13, "127")
                .set(Register::R7, 26, "2")
                .set(Register::RG, 12, "1"),
        );
        let mut properties = SpaProperties::new();
        let report = apply(&frame, &mut properties);
        assert_eq!(report.rejected, 0);
        assert_eq!(properties.mains_voltage.get(), Some(&241));
        assert_eq!(properties.model.get().map(String::as_str), Some("SV-2"));
        assert_eq!(properties.sver.get().map(String::as_str), Some("SW V5 17 05 31"));
        assert_eq!(properties.mode.get(), Some(&SpaMode::Norm));
        assert_eq!(properties.light.get(), Some(&true));
        assert_eq!(properties.water_temperature.get(), Some(&375));
        assert_eq!(properties.set_temperature.get(), Some(&380));
        assert_eq!(properties.sleep1_days.label(), Some("Everyday"));
        assert_eq!(properties.heat_pump_mode.label(), Some("Cool"));
        assert_eq!(properties.lock_mode.label(), Some("Partial"));
        assert_eq!(properties.prme.get(), Some(&0));
        assert_eq!(
            properties.spa_time.get(),
            Some(&jiff::civil::date(2024, 3, 2).at(14, 30, 15, 0))
        );
        assert!(report.changed.contains(&("STMP", "380".to_string())));
        assert!(report.changed.contains(&(SPA_TIME, "2024-03-02 14:30:15".to_string())));
    }

    #[test]
    fn pumps_combine_two_registers() {
        let frame = parse(FrameBuilder::current().set(Register::R5, 19, "3"));
        let mut properties = SpaProperties::new();
        let report = apply(&frame, &mut properties);
        assert_eq!(report.pumps_changed, [1, 2, 3, 4, 5]);
        let pump = properties.pump(2).unwrap();
        assert_eq!(pump.current_state(), Some(3));
        assert_eq!(pump.ok_to_run.get(), Some(&true));
        assert_eq!(pump.install().unwrap().states, [0, 2, 3, 4]);
        assert!(properties.pump(1).unwrap().is_installed());
        assert!(!properties.pump(5).unwrap().is_installed());

        let frame = parse(FrameBuilder::current().set(Register::R5, 19, "2"));
        let report = apply(&frame, &mut properties);
        assert_eq!(report.pumps_changed, [2]);
        assert!(report.changed.is_empty());
    }

    #[test]
    fn current_only_fields_are_skipped_on_legacy_frames() {
        let frame = parse(FrameBuilder::legacy().set(Register::R6, 24, "7"));
        let mut properties = SpaProperties::new();
        let report = apply(&frame, &mut properties);
        assert_eq!(report.rejected, 0);
        assert!(!properties.prme.has_value());
        assert!(!properties.lock_mode.has_value());
        let pump = properties.pump(1).unwrap();
        assert_eq!(pump.current_state(), Some(0));
        assert!(!pump.install_state.has_value());
        assert!(!pump.ok_to_run.has_value());
    }

    #[test]
    fn bad_fields_keep_their_value_and_the_rest_still_applies() {
        let mut properties = SpaProperties::new();
        apply(&parse(FrameBuilder::current()), &mut properties);
        let frame = parse(
            FrameBuilder::current()
                .set(Register::R5, 14, "2")
                .set(Register::R6, 8, "38x")
                .set(Register::R2, 11, "0x7e8")
                .set(Register::R5, 15, "380"),
        );
        let report = apply(&frame, &mut properties);
        assert_eq!(report.rejected, 3);
        assert_eq!(properties.light.get(), Some(&false));
        assert_eq!(properties.set_temperature.get(), Some(&380));
        assert_eq!(properties.water_temperature.get(), Some(&380));
        assert_eq!(properties.spa_time.get().map(|t| t.year()), Some(2024));
        assert_eq!(report.changed, [("WTMP", "380".to_string())]);
    }

    #[test]
    fn short_register_does_not_borrow_from_the_next() {
        let frame = parse(
            FrameBuilder::current().resize(Register::R6, 24).set(Register::R7, 1, "777"),
        );
        let mut properties = SpaProperties::new();
        let report = apply(&frame, &mut properties);
        assert_eq!(report.rejected, 0);
        assert_eq!(properties.set_temperature.get(), Some(&380));
        assert_eq!(properties.clean_time.get(), Some(&777));
        assert!(!properties.prme.has_value());
        assert!(!properties.elmt.has_value());
        assert!(!properties.spa_type.has_value());
        assert!(!properties.gas.has_value());
    }

    #[test]
    fn impossible_dates_are_rejected() {
        let frame =
            parse(FrameBuilder::current().set(Register::R2, 9, "31").set(Register::R2, 10, "2"));
        let mut properties = SpaProperties::new();
        let report = apply(&frame, &mut properties);
        assert_eq!(report.rejected, 1);
        assert!(!properties.spa_time.has_value());
    }
}
