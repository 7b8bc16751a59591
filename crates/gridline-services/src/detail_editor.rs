//! Detail Record Editor
//!
//! Record-level editing of one device: its own fields, its spec-sheet
//! fields and the full list of characteristic rows. Any change marks the
//! whole record dirty; a save replaces all three parts at once.

use gridline_core::value::{coerce_input, is_blank, parse_number, same_display};
use gridline_core::{GridError, Result, RowSnapshot, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::TableApi;
use crate::edit_session::{CancelOutcome, ConfirmDiscard};
use crate::models::{DeviceDetails, DeviceUpdate};

pub const DEVICE_FIELDS: &[&str] = &[
    "sheet_no",
    "status",
    "barrier",
    "passivation",
    "top_metal",
    "wafer_thickness",
    "back_metal",
];

pub const SPEC_SHEET_FIELDS: &[&str] = &[
    "sheet_name",
    "sheet_revision",
    "vdss_V",
    "vgss_V",
    "idss_A",
    "esd_display",
];

pub const CHARACTERISTIC_FIELDS: &[&str] = &[
    "item", "min", "typ", "max", "unit", "bias_vgs", "bias_igs", "bias_vds", "bias_ids",
    "bias_vss", "bias_iss", "cond",
];

const NUMERIC_CHARACTERISTIC_FIELDS: &[&str] = &["min", "typ", "max"];

/// Which form a record field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSection {
    Device,
    SpecSheet,
}

impl RecordSection {
    pub fn editable_fields(self) -> &'static [&'static str] {
        match self {
            RecordSection::Device => DEVICE_FIELDS,
            RecordSection::SpecSheet => SPEC_SHEET_FIELDS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordSection::Device => "device",
            RecordSection::SpecSheet => "spec_sheet",
        }
    }
}

impl fmt::Display for RecordSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordSection {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "device" => Ok(RecordSection::Device),
            "spec_sheet" | "spec" => Ok(RecordSection::SpecSheet),
            other => Err(GridError::UnknownColumn(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DetailPhase {
    /// Nothing loaded
    #[default]
    Empty,
    Viewing,
    Editing,
    Saving,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailSaveOutcome {
    Saved,
    /// Forms are kept; the message is shown inline
    Failed(String),
    Suppressed,
    NotEditing,
}

/// A record save the caller must submit
#[derive(Debug, Clone, PartialEq)]
pub struct DetailSaveTicket {
    pub device_id: String,
    pub payload: DeviceUpdate,
}

pub struct DetailRecordEditor {
    loaded: Option<DeviceDetails>,
    phase: DetailPhase,
    device_form: RowSnapshot,
    spec_sheet_form: RowSnapshot,
    characteristics_form: Vec<RowSnapshot>,
    dirty: bool,
    error: Option<String>,
    confirm: Arc<dyn ConfirmDiscard>,
}

impl DetailRecordEditor {
    pub fn new(confirm: Arc<dyn ConfirmDiscard>) -> Self {
        Self {
            loaded: None,
            phase: DetailPhase::Empty,
            device_form: RowSnapshot::new(),
            spec_sheet_form: RowSnapshot::new(),
            characteristics_form: Vec::new(),
            dirty: false,
            error: None,
            confirm,
        }
    }

    /// Fetch a device record and show it read-only.
    ///
    /// Fails with `SaveInProgress` while a save is pending and with
    /// `DiscardDeclined` when dirty forms are not given up; nothing is
    /// fetched in either case.
    pub async fn load(&mut self, api: &dyn TableApi, device_id: &str) -> Result<()> {
        self.ensure_replaceable()?;
        match api.device_details(device_id).await {
            Ok(details) => {
                tracing::debug!(
                    device_id,
                    characteristics = details.characteristics.len(),
                    "Loaded device details"
                );
                self.install(details);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(device_id, error = %err, "Failed to load device details");
                self.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Replace the displayed record and leave edit mode.
    ///
    /// Guarded the same way as [`load`](Self::load).
    pub fn show(&mut self, details: DeviceDetails) -> Result<()> {
        self.ensure_replaceable()?;
        self.install(details);
        Ok(())
    }

    fn install(&mut self, details: DeviceDetails) {
        self.loaded = Some(details);
        self.phase = DetailPhase::Viewing;
        self.error = None;
        self.reset_forms();
    }

    pub fn details(&self) -> Option<&DeviceDetails> {
        self.loaded.as_ref()
    }

    pub fn phase(&self) -> &DetailPhase {
        &self.phase
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn form(&self, section: RecordSection) -> &RowSnapshot {
        match section {
            RecordSection::Device => &self.device_form,
            RecordSection::SpecSheet => &self.spec_sheet_form,
        }
    }

    pub fn characteristics_form(&self) -> &[RowSnapshot] {
        &self.characteristics_form
    }

    /// Enter edit mode with forms taken from the loaded record.
    ///
    /// Returns false when there is no record to edit.
    pub fn begin_edit(&mut self) -> bool {
        if self.loaded.is_none() || self.phase == DetailPhase::Saving {
            return false;
        }
        self.reset_forms();
        self.error = None;
        self.phase = DetailPhase::Editing;
        true
    }

    pub fn set_field(&mut self, section: RecordSection, field: &str, raw: &str) -> Result<()> {
        self.ensure_editing()?;
        if !section.editable_fields().contains(&field) {
            return Err(GridError::ReadOnlyColumn(field.to_string()));
        }
        let baseline = self.loaded.as_ref().and_then(|d| d.device.get(field));
        let value = coerce_input(baseline, raw);
        match section {
            RecordSection::Device => self.device_form.insert(field.to_string(), value),
            RecordSection::SpecSheet => self.spec_sheet_form.insert(field.to_string(), value),
        };
        self.dirty = true;
        Ok(())
    }

    pub fn set_characteristic(&mut self, index: usize, field: &str, raw: &str) -> Result<()> {
        self.ensure_editing()?;
        let row = self
            .characteristics_form
            .get_mut(index)
            .ok_or(GridError::RowOutOfRange(index))?;
        if !CHARACTERISTIC_FIELDS.contains(&field) && !row.contains_key(field) {
            return Err(GridError::UnknownColumn(field.to_string()));
        }

        let value = if NUMERIC_CHARACTERISTIC_FIELDS.contains(&field) {
            parse_number(raw)
        } else {
            coerce_input(row.get(field), raw)
        };
        row.insert(field.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    /// Append a blank characteristic row; returns its index
    pub fn add_characteristic(&mut self) -> Result<usize> {
        self.ensure_editing()?;
        let blank: RowSnapshot = CHARACTERISTIC_FIELDS
            .iter()
            .map(|field| (field.to_string(), Value::String(String::new())))
            .collect();
        self.characteristics_form.push(blank);
        self.dirty = true;
        Ok(self.characteristics_form.len() - 1)
    }

    pub fn remove_characteristic(&mut self, index: usize) -> Result<()> {
        self.ensure_editing()?;
        if index >= self.characteristics_form.len() {
            return Err(GridError::RowOutOfRange(index));
        }
        self.characteristics_form.remove(index);
        self.dirty = true;
        Ok(())
    }

    pub fn cancel_edit(&mut self) -> CancelOutcome {
        match self.phase {
            DetailPhase::Saving => return CancelOutcome::Busy,
            DetailPhase::Editing => {}
            _ => return CancelOutcome::NoSession,
        }
        if self.dirty && !self.confirm.confirm_discard(&self.dirty_sections()) {
            return CancelOutcome::Declined;
        }
        self.reset_forms();
        self.error = None;
        self.phase = DetailPhase::Viewing;
        CancelOutcome::Cancelled
    }

    /// Build the update for the current forms and enter the saving phase
    pub fn begin_save(&mut self) -> std::result::Result<DetailSaveTicket, DetailSaveOutcome> {
        match self.phase {
            DetailPhase::Saving => return Err(DetailSaveOutcome::Suppressed),
            DetailPhase::Editing => {}
            _ => return Err(DetailSaveOutcome::NotEditing),
        }
        let Some(device_id) = self.loaded.as_ref().and_then(DeviceDetails::device_id) else {
            return Err(DetailSaveOutcome::NotEditing);
        };

        self.phase = DetailPhase::Saving;
        self.error = None;
        tracing::info!(device_id = %device_id, "Saving device record");
        Ok(DetailSaveTicket {
            device_id,
            payload: DeviceUpdate {
                device: self.device_form.clone(),
                spec_sheet: self.spec_sheet_form.clone(),
                characteristics: self.characteristics_form.clone(),
            },
        })
    }

    /// Apply the result of the save started by [`begin_save`](Self::begin_save)
    pub fn complete_save(&mut self, result: Result<DeviceDetails>) -> DetailSaveOutcome {
        if self.phase != DetailPhase::Saving {
            tracing::debug!("Dropping save result with no save in flight");
            return DetailSaveOutcome::NotEditing;
        }
        match result {
            Ok(details) => {
                self.install(details);
                DetailSaveOutcome::Saved
            }
            Err(err) => {
                tracing::warn!(error = %err, "Device save failed");
                let message = err.user_message();
                self.error = Some(message.clone());
                self.phase = DetailPhase::Editing;
                DetailSaveOutcome::Failed(message)
            }
        }
    }

    pub async fn save(&mut self, api: &dyn TableApi) -> DetailSaveOutcome {
        match self.begin_save() {
            Ok(ticket) => {
                let result = api.update_device(&ticket.device_id, &ticket.payload).await;
                self.complete_save(result)
            }
            Err(outcome) => outcome,
        }
    }

    fn ensure_replaceable(&self) -> Result<()> {
        match self.phase {
            DetailPhase::Saving => Err(GridError::SaveInProgress),
            DetailPhase::Editing if self.dirty => {
                if self.confirm.confirm_discard(&self.dirty_sections()) {
                    Ok(())
                } else {
                    Err(GridError::DiscardDeclined)
                }
            }
            _ => Ok(()),
        }
    }

    fn ensure_editing(&self) -> Result<()> {
        match self.phase {
            DetailPhase::Editing => Ok(()),
            DetailPhase::Saving => Err(GridError::SaveInProgress),
            _ => Err(GridError::NoActiveEdit),
        }
    }

    fn reset_forms(&mut self) {
        let Some(details) = &self.loaded else {
            self.device_form.clear();
            self.spec_sheet_form.clear();
            self.characteristics_form.clear();
            self.dirty = false;
            return;
        };
        self.device_form = pick_fields(&details.device, DEVICE_FIELDS);
        self.spec_sheet_form = pick_fields(&details.device, SPEC_SHEET_FIELDS);
        self.characteristics_form = details.characteristics.clone();
        self.dirty = false;
    }

    /// Names of the parts whose forms differ from the loaded record
    fn dirty_sections(&self) -> BTreeSet<String> {
        let mut sections = BTreeSet::new();
        let Some(details) = &self.loaded else {
            return sections;
        };
        for section in [RecordSection::Device, RecordSection::SpecSheet] {
            let baseline = pick_fields(&details.device, section.editable_fields());
            if !same_form(self.form(section), &baseline) {
                sections.insert(section.to_string());
            }
        }
        let characteristics_changed = self.characteristics_form.len()
            != details.characteristics.len()
            || self
                .characteristics_form
                .iter()
                .zip(&details.characteristics)
                .any(|(form, baseline)| !same_form(form, baseline));
        if characteristics_changed {
            sections.insert("characteristics".to_string());
        }
        sections
    }
}

impl fmt::Debug for DetailRecordEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailRecordEditor")
            .field("phase", &self.phase)
            .field("dirty", &self.dirty)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Copy `fields` out of `source`; missing and null become `""`
fn pick_fields(source: &RowSnapshot, fields: &[&str]) -> RowSnapshot {
    fields
        .iter()
        .map(|field| {
            let value = match source.get(*field) {
                Some(Value::Null) | None => Value::String(String::new()),
                Some(value) => value.clone(),
            };
            (field.to_string(), value)
        })
        .collect()
}

/// Field-wise comparison where null, missing and `""` are all blank
fn same_form(a: &RowSnapshot, b: &RowSnapshot) -> bool {
    let blank = Value::Null;
    a.keys().chain(b.keys()).all(|field| {
        let left = a.get(field).unwrap_or(&blank);
        let right = b.get(field).unwrap_or(&blank);
        (is_blank(left) && is_blank(right)) || same_display(left, right)
    })
}
