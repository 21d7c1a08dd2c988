//! Non-interactive commands: list, import and export.

use std::path::Path;
use std::time::Instant;

use clap::Args;
use tracing::{info, warn};

use crate::domain::AdminError;
use crate::filter::{FilterState, apply_filters};
use crate::record::Record;
use crate::repository::Repository;
use crate::resource::Resource;
use crate::tabular;

/// Filter flags shared by `list` and `export`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive text searched in the resource's searchable fields
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    /// Type or category
    #[arg(long)]
    pub category: Option<String>,

    /// YYYY-MM-DD, YYYY-MM, <YYYY-MM-DD or >YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub location: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<FilterState, AdminError> {
        Ok(FilterState {
            search: self.search.clone().unwrap_or_default(),
            status: self.status.clone(),
            category: self.category.clone(),
            date: self.date.as_deref().map(str::parse).transpose()?,
            location: self.location.clone(),
        })
    }
}

/// Records of `resource` passing `filter`, in stored order.
pub fn filtered(
    repo: &dyn Repository,
    resource: Resource,
    filter: &FilterState,
) -> Result<Vec<Record>, AdminError> {
    let records = repo.list(resource)?;
    let rows = apply_filters(&records, resource.schema(), filter);
    Ok(rows.into_iter().map(|idx| records[idx].clone()).collect())
}

/// Plain text table of `records` with the resource's columns.
pub fn plain_table(resource: Resource, records: &[Record], max_column_width: usize) -> String {
    let columns = resource.schema().columns();
    let cells: Vec<Vec<String>> = records
        .iter()
        .map(|r| columns.iter().map(|c| c.render(r).plain()).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            cells
                .iter()
                .map(|row| row[idx].chars().count())
                .chain(std::iter::once(c.header.chars().count()))
                .max()
                .unwrap_or(0)
                .min(max_column_width)
        })
        .collect();

    let format_row = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(widths.iter())
            .map(|(v, w)| {
                let v: String = v.chars().take(*w).collect();
                format!("{v:<w$}")
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = format_row(columns.iter().map(|c| c.header.as_str()).collect());
    out.push('\n');
    for row in cells.iter() {
        out.push_str(&format_row(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub created: usize,
    pub failed: Vec<(String, String)>,
}

/// Create every record of a CSV, Parquet or Arrow file.
///
/// Records that the store refuses are reported and skipped.
pub fn import(repo: &dyn Repository, resource: Resource, path: &Path) -> Result<ImportReport, AdminError> {
    let start_time = Instant::now();
    let records = tabular::import(path)?;
    let mut report = ImportReport::default();
    for record in records {
        let id = record.id.clone();
        match repo.create(resource, record) {
            Ok(_) => report.created += 1,
            Err(e) => {
                warn!("Import of {id} failed: {e}");
                report.failed.push((id, e.to_string()));
            }
        }
    }
    info!(
        "Imported {} {} from {} in {}ms",
        report.created,
        resource.key(),
        path.display(),
        start_time.elapsed().as_millis()
    );
    Ok(report)
}

/// Write the filtered records as CSV, returning how many were written.
pub fn export(
    repo: &dyn Repository,
    resource: Resource,
    path: &Path,
    filter: &FilterState,
) -> Result<usize, AdminError> {
    let records = filtered(repo, resource, filter)?;
    tabular::export_csv(&records, path)?;
    info!("Exported {} {} to {}", records.len(), resource.key(), path.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn repo() -> MemoryRepository {
        MemoryRepository::with_records(
            Resource::Donations,
            vec![
                Record::new("d1")
                    .with("donor", "Barnabas")
                    .with("amount", 250)
                    .with("date", "2024-03-10")
                    .with("status", "received"),
                Record::new("d2")
                    .with("donor", "Tabitha")
                    .with("amount", 40.5)
                    .with("date", "2024-04-02")
                    .with("status", "pending"),
            ],
        )
    }

    #[test]
    fn filter_flags_build_a_filter() {
        let args = FilterArgs {
            date: Some("2024-03".into()),
            ..FilterArgs::default()
        };
        let repo = repo();
        let records = filtered(&repo, Resource::Donations, &args.to_filter().unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "d1");
    }

    #[test]
    fn bad_date_flag_is_rejected() {
        let args = FilterArgs {
            date: Some("soon".into()),
            ..FilterArgs::default()
        };
        assert!(matches!(args.to_filter(), Err(AdminError::Validation(_))));
    }

    #[test]
    fn table_has_header_and_rows() {
        let repo = repo();
        let records = filtered(&repo, Resource::Donations, &FilterState::default()).unwrap();
        let table = plain_table(Resource::Donations, &records, 30);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Barnabas"));
        assert!(lines[2].contains("Tabitha"));
    }

    #[test]
    fn export_writes_only_filtered_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donations.csv");
        let repo = repo();
        let filter = FilterState {
            status: Some("pending".into()),
            ..FilterState::default()
        };
        assert_eq!(export(&repo, Resource::Donations, &path, &filter).unwrap(), 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Tabitha"));
        assert!(!content.contains("Barnabas"));
    }

    #[test]
    fn import_reports_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donations.csv");
        std::fs::write(&path, "id,donor,amount\nd1,Barnabas,250\nd3,Lois,15\n").unwrap();
        let repo = repo();
        let report = import(&repo, Resource::Donations, &path).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "d1");
        assert_eq!(repo.list(Resource::Donations).unwrap().len(), 3);
    }
}
