//! Subcommand handlers

use anyhow::{anyhow, bail, Context, Result};
use gridline_core::{DataSource, GridError};
use gridline_services::{
    ApiBase, AutoConfirm, CommitOutcome, DetailRecordEditor, DetailSaveOutcome, GridOptions,
    GridView, QueryCoordinator, RecordSection, RowLookup, StartEditOutcome, TableApi, TableGrid,
};
use gridline_settings::GridlineSettings;
use std::sync::Arc;
use tokio::time::Instant;

use crate::output;

/// Shared state for every subcommand
pub struct CliContext {
    pub api: Arc<dyn TableApi>,
    pub base: ApiBase,
    pub options: GridOptions,
}

impl CliContext {
    fn grid(&self) -> TableGrid {
        TableGrid::new(
            Arc::clone(&self.api),
            self.base.clone(),
            Arc::new(AutoConfirm),
            self.options.clone(),
        )
    }
}

/// Search, sort and filter flags shared by `browse` and `export-url`
#[derive(Debug, Clone, Default)]
pub struct ViewSpec {
    pub table: String,
    pub endpoint: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub descending: bool,
    pub filters: Vec<(String, String)>,
}

impl ViewSpec {
    fn source(&self) -> DataSource {
        match &self.endpoint {
            Some(path) => DataSource::custom(path.clone()),
            None => DataSource::table(self.table.clone()),
        }
    }

    fn apply(&self, grid: &mut TableGrid) {
        if let Some(search) = &self.search {
            grid.set_search_term(search.clone());
        }
        for (column, text) in &self.filters {
            grid.set_filter(column.clone(), text.clone());
        }
        grid.flush_inputs();
        if let Some(column) = &self.sort {
            grid.set_sort(column.clone());
            if self.descending {
                grid.set_sort(column.clone());
            }
        }
    }
}

fn ensure_loaded(grid: &TableGrid) -> Result<()> {
    if let GridView::Error(message) = grid.view() {
        bail!("{}", message);
    }
    Ok(())
}

pub async fn tables(ctx: &CliContext) -> Result<()> {
    let tables = ctx
        .api
        .list_tables()
        .await
        .map_err(|e| anyhow!(e.user_message()))
        .context("Failed to list tables")?;
    println!("{}", output::names_table("Table", &tables));
    Ok(())
}

pub async fn browse(ctx: &CliContext, view: &ViewSpec, page: u64, json: bool) -> Result<()> {
    let mut grid = ctx.grid();
    grid.open(view.source()).await;
    view.apply(&mut grid);
    grid.pump().await;
    ensure_loaded(&grid)?;

    if page > 1 {
        let delta = i64::try_from(page - 1).context("Page number is too large")?;
        grid.change_page(delta);
        grid.pump().await;
        ensure_loaded(&grid)?;
    }

    if json {
        let body = serde_json::json!({
            "rows": grid.rows(),
            "total": grid.query().total(),
            "total_pages": grid.query().total_pages(),
            "page": grid.query().query().page,
            "primary_keys": grid.query().primary_keys(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match grid.view() {
        GridView::Rows(rows) => {
            println!(
                "{}",
                output::rows_table(rows, grid.query().primary_keys(), grid.highlights())
            );
        }
        GridView::NoMatches => {}
        GridView::Error(message) => bail!("{}", message),
        GridView::Loading | GridView::NoDataset => bail!("No data was loaded"),
    }
    println!("{}", output::summary_line(&grid.page_summary()));
    if !grid.query().is_paginated() {
        println!("(endpoint does not paginate; showing all rows)");
    }
    Ok(())
}

pub fn export_url(ctx: &CliContext, view: &ViewSpec) -> Result<()> {
    let mut query = QueryCoordinator::new(ctx.options.page_size, ctx.options.debounce);
    query.set_dataset(view.source());
    if let Some(search) = &view.search {
        query.set_search_term(search.clone(), Instant::now());
    }
    for (column, text) in &view.filters {
        query.set_filter(column.clone(), text.clone(), Instant::now());
    }
    query.flush_inputs();
    if let Some(column) = &view.sort {
        query.set_sort(column.clone());
        if view.descending {
            query.set_sort(column.clone());
        }
    }

    let url = query
        .export_url(&ctx.base)?
        .ok_or_else(|| anyhow!("This data source cannot be exported"))?;
    println!("{}", url);
    Ok(())
}

pub async fn update(
    ctx: &CliContext,
    table: &str,
    endpoint: Option<&str>,
    keys: &[(String, String)],
    changes: &[(String, String)],
) -> Result<()> {
    if keys.is_empty() {
        bail!("At least one --key COL=VALUE is required");
    }
    let view = ViewSpec {
        table: table.to_string(),
        endpoint: endpoint.map(str::to_string),
        filters: keys.to_vec(),
        ..Default::default()
    };

    let mut grid = ctx.grid();
    grid.open(view.source()).await;
    view.apply(&mut grid);
    grid.pump().await;
    ensure_loaded(&grid)?;

    // Filters are substring matches, so the exact row may be on any page.
    let index = match grid.locate_row(keys).await {
        RowLookup::Found(index) => index,
        RowLookup::Missing => bail!("No row of '{}' matches the given key", table),
        RowLookup::Ambiguous => {
            bail!("More than one row matches the given key; add more --key columns")
        }
        RowLookup::LoadFailed(message) => bail!("{}", message),
    };

    match grid.start_edit(index)? {
        StartEditOutcome::Started(row_key) => tracing::debug!(row_key = %row_key, "Editing row"),
        StartEditOutcome::NotEditable => {
            bail!("{}", GridError::NotAddressable.user_message())
        }
        StartEditOutcome::Declined | StartEditOutcome::Busy => bail!("Could not start editing"),
    }
    for (column, raw) in changes {
        grid.set_field(column, raw)
            .with_context(|| format!("Cannot set '{}'", column))?;
    }

    match grid.commit().await {
        CommitOutcome::Saved { columns, .. } => {
            println!("Saved {}", columns.join(", "));
            if let GridView::Rows(rows) = grid.view() {
                println!(
                    "{}",
                    output::rows_table(rows, grid.query().primary_keys(), grid.highlights())
                );
            }
            Ok(())
        }
        CommitOutcome::Closed => {
            println!("Nothing changed");
            Ok(())
        }
        CommitOutcome::Failed(message) => bail!("Save failed: {}", message),
        CommitOutcome::NotAddressable => bail!("{}", GridError::NotAddressable.user_message()),
        CommitOutcome::Suppressed | CommitOutcome::NoSession => bail!("Nothing to save"),
    }
}

pub async fn device(ctx: &CliContext, id: &str, json: bool) -> Result<()> {
    let mut editor = DetailRecordEditor::new(Arc::new(AutoConfirm));
    editor
        .load(ctx.api.as_ref(), id)
        .await
        .map_err(|e| anyhow!(e.user_message()))
        .with_context(|| format!("Failed to load device '{}'", id))?;
    let details = editor
        .details()
        .ok_or_else(|| anyhow!("Device '{}' has no details", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(details)?);
        return Ok(());
    }
    print_details(details);
    Ok(())
}

/// One `--set` target of `device-update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    Section(RecordSection, String),
    Characteristic(usize, String),
}

impl std::str::FromStr for FieldTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("characteristics"), Some(index), Some(field)) => {
                let index = index
                    .parse()
                    .map_err(|_| format!("invalid characteristic index '{}'", index))?;
                Ok(FieldTarget::Characteristic(index, field.to_string()))
            }
            (Some(section), Some(field), None) => {
                let section = section.parse().map_err(|e: GridError| e.to_string())?;
                Ok(FieldTarget::Section(section, field.to_string()))
            }
            _ => Err(format!(
                "expected SECTION.FIELD or characteristics.INDEX.FIELD, got '{}'",
                s
            )),
        }
    }
}

pub async fn device_update(
    ctx: &CliContext,
    id: &str,
    changes: &[(FieldTarget, String)],
    add_characteristics: usize,
    remove: &[usize],
) -> Result<()> {
    let mut editor = DetailRecordEditor::new(Arc::new(AutoConfirm));
    editor
        .load(ctx.api.as_ref(), id)
        .await
        .map_err(|e| anyhow!(e.user_message()))
        .with_context(|| format!("Failed to load device '{}'", id))?;
    if !editor.begin_edit() {
        bail!("Device '{}' cannot be edited", id);
    }

    for _ in 0..add_characteristics {
        editor.add_characteristic()?;
    }
    for (target, raw) in changes {
        match target {
            FieldTarget::Section(section, field) => editor.set_field(*section, field, raw)?,
            FieldTarget::Characteristic(index, field) => {
                editor.set_characteristic(*index, field, raw)?
            }
        }
    }
    let mut remove = remove.to_vec();
    remove.sort_unstable_by(|a, b| b.cmp(a));
    remove.dedup();
    for index in remove {
        editor.remove_characteristic(index)?;
    }

    if !editor.is_dirty() {
        println!("Nothing changed");
        return Ok(());
    }
    match editor.save(ctx.api.as_ref()).await {
        DetailSaveOutcome::Saved => {
            println!("Saved device '{}'", id);
            if let Some(details) = editor.details() {
                print_details(details);
            }
            Ok(())
        }
        DetailSaveOutcome::Failed(message) => bail!("Save failed: {}", message),
        DetailSaveOutcome::Suppressed | DetailSaveOutcome::NotEditing => {
            bail!("Device '{}' is not being edited", id)
        }
    }
}

/// Print the settings in effect after flags and environment overrides
pub fn config(settings: &GridlineSettings, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if save {
        let path = settings.save().context("Failed to save settings")?;
        println!("Saved settings to {}", path.display());
    }
    Ok(())
}

fn print_details(details: &gridline_services::DeviceDetails) {
    println!("{}", output::record_table(&details.device));
    if !details.characteristics.is_empty() {
        println!("Characteristics");
        println!(
            "{}",
            output::rows_table(
                &details.characteristics,
                &gridline_core::PrimaryKeySpec::empty(),
                &gridline_services::HighlightRegistry::new(),
            )
        );
    }
    if !details.related_devices.is_empty() {
        println!("Related devices");
        println!(
            "{}",
            output::rows_table(
                &details.related_devices,
                &gridline_core::PrimaryKeySpec::empty(),
                &gridline_services::HighlightRegistry::new(),
            )
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_targets() {
        assert_eq!(
            "device.status".parse::<FieldTarget>().unwrap(),
            FieldTarget::Section(RecordSection::Device, "status".into())
        );
        assert_eq!(
            "spec_sheet.vdss_V".parse::<FieldTarget>().unwrap(),
            FieldTarget::Section(RecordSection::SpecSheet, "vdss_V".into())
        );
        assert_eq!(
            "characteristics.2.max".parse::<FieldTarget>().unwrap(),
            FieldTarget::Characteristic(2, "max".into())
        );
        assert!("status".parse::<FieldTarget>().is_err());
        assert!("characteristics.x.max".parse::<FieldTarget>().is_err());
    }
}
