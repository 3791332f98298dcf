use crate::error::Result;
use crate::types::RawRow;
use std::path::Path;
use tracing::{debug, info, instrument};

// The licensing authority's export has no header row and the column layout is
// positional. These indexes are the adapter's whole knowledge of the format.
const COL_CALLSIGN: usize = 0;
const COL_NAME: usize = 1;
const COL_ZIP: usize = 9;
const COL_CLASS: usize = 12;
const COL_EMAIL: usize = 14;

fn cell(record: &csv::StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read the batch CSV into canonical rows. The file is not always formatted
/// correctly: header rows can reappear partway through, and row widths vary.
/// Short rows still yield a row here; the normalizer decides what to drop.
#[instrument(skip_all, fields(file = %csv_path.as_ref().display()))]
pub fn read_batch<P: AsRef<Path>>(csv_path: P) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(csv_path.as_ref())?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping unreadable CSV record: {}", e);
                continue;
            }
        };
        rows.push(RawRow {
            callsign: cell(&record, COL_CALLSIGN),
            name: cell(&record, COL_NAME),
            class_code: cell(&record, COL_CLASS),
            email: cell(&record, COL_EMAIL),
            region: cell(&record, COL_ZIP),
        });
    }

    info!("Read {} raw rows from batch file", rows.len());
    Ok(rows)
}

/// Synthetic batch for `--test` runs: fixed, local, and fully contactable.
pub fn fake_batch() -> Vec<RawRow> {
    let rows = [
        ("K7DRQ", "Quentin", "T", "k7drq@psrg.org", "98101"),
        ("KI7RMU", "Jack", "G", "ki7rmu@psrg.org", "98102"),
        ("KD7DK", "Doug", "E", "kd7dk@psrg.org", "98103"),
    ];
    rows.iter()
        .map(|(call, name, class, email, zip)| RawRow {
            callsign: Some(call.to_string()),
            name: Some(name.to_string()),
            class_code: Some(class.to_string()),
            email: Some(email.to_string()),
            region: Some(zip.to_string()),
        })
        .collect()
}
