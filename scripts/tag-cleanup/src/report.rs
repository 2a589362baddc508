use crate::cluster::TagCluster;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One `item_id,tag,kind` line of an import file. `kind` defaults to manual.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    pub item_id: String,
    pub tag: String,
    #[serde(default)]
    pub kind: Option<String>,
}

pub fn read_import_rows(path: &Path) -> Result<Vec<ImportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening import file {:?}", path))?;
    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<ImportRow>().enumerate() {
        // +2: header line and 1-based numbering.
        let row = record.with_context(|| format!("{:?}: bad row at line {}", path, line + 2))?;
        if row.item_id.is_empty() || row.tag.is_empty() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_cluster_csv(path: &Path, clusters: &[TagCluster]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(path)?;
    writer.write_record(["cluster", "tag_id", "name", "kind", "items", "proposed_target"])?;
    for (index, cluster) in clusters.iter().enumerate() {
        let number = (index + 1).to_string();
        let target = cluster.target().tag.id.as_str();
        for member in &cluster.members {
            let items = member.items.to_string();
            writer.write_record([
                number.as_str(),
                member.tag.id.as_str(),
                member.tag.name.as_str(),
                member.tag.kind.as_str(),
                items.as_str(),
                target,
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}
