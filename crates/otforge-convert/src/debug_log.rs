//! Instance-attribute diagnostics log
//!
//! Writes one line per observed instance attribute, grouped by attribute
//! kind, so unusual server data can be audited after a run.

use crate::Result;
use otforge_world::AttributeOccurrence;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write `debug_attributes.log` under the given logs directory.
pub fn write_attribute_log<P: AsRef<Path>>(
    logs_dir: P,
    occurrences: &[AttributeOccurrence],
) -> Result<()> {
    let logs_dir = logs_dir.as_ref();
    fs::create_dir_all(logs_dir)?;
    let path = logs_dir.join("debug_attributes.log");

    let mut sorted: Vec<&AttributeOccurrence> = occurrences.iter().collect();
    sorted.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.source_file.cmp(&b.source_file))
            .then_with(|| (a.local_x, a.local_y).cmp(&(b.local_x, b.local_y)))
    });

    let mut out = fs::File::create(&path)?;
    writeln!(out, "# instance attribute occurrences: {}", sorted.len())?;
    for occ in &sorted {
        writeln!(
            out,
            "{} at {} [{} {}-{}]: {}",
            occ.kind, occ.position, occ.source_file, occ.local_x, occ.local_y, occ.line
        )?;
    }
    info!(
        "Wrote {} attribute records to {}",
        sorted.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use otforge_world::SectorParser;

    #[test]
    fn log_is_sorted_by_kind() {
        let mut parser = SectorParser::new();
        parser.parse_text(
            "a.sec",
            0,
            0,
            7,
            "0-0: Content={3031 Amount=2, 1219 Level=30, 2091 KeyNumber=5}",
        );

        let dir = tempfile::tempdir().unwrap();
        write_attribute_log(dir.path(), &parser.occurrences).unwrap();
        let text = fs::read_to_string(dir.path().join("debug_attributes.log")).unwrap();

        let level = text.find("Level at").unwrap();
        let key = text.find("KeyNumber at").unwrap();
        let amount = text.find("Amount at").unwrap();
        // Declaration order of the kind enum: Level < KeyNumber < Amount.
        assert!(level < key && key < amount);
        assert!(text.contains("[a.sec 0-0]"));
    }
}
