use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, DatasetResult};
use crate::formations::FormationRow;
use crate::records::GameweekRecord;

pub const FORMATIONS_FILE: &str = "max_formation_scores.csv";

pub fn season_path(output_dir: &Path, season: &str) -> PathBuf {
    output_dir
        .join("seasons")
        .join(format!("{season}_season_stats.csv"))
}

pub fn formations_path(output_dir: &Path) -> PathBuf {
    output_dir.join("formations").join(FORMATIONS_FILE)
}

/// Writes `records` as CSV restricted to `columns`, in that order.
pub fn write_season_csv<W: Write>(
    out: W,
    records: &[GameweekRecord],
    columns: &[String],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(columns)?;
    for rec in records {
        writer.write_record(
            columns
                .iter()
                .map(|column| rec.cell(column).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_formation_csv<W: Write>(out: W, rows: &[FormationRow]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    if rows.is_empty() {
        writer.write_record([
            "name",
            "forwards",
            "midfielders",
            "defenders",
            "round",
            "total_points",
            "year",
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_season_table(
    path: &Path,
    records: &[GameweekRecord],
    columns: &[String],
) -> DatasetResult<usize> {
    write_atomic(path, |file| write_season_csv(file, records, columns))?;
    Ok(records.len())
}

pub fn write_formation_table(path: &Path, rows: &[FormationRow]) -> DatasetResult<usize> {
    write_atomic(path, |file| write_formation_csv(file, rows))?;
    Ok(rows.len())
}

fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut fs::File) -> Result<(), csv::Error>,
) -> DatasetResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|err| DatasetError::output(path, err))?;
    }
    let tmp = path.with_extension("csv.tmp");
    let mut file = fs::File::create(&tmp).map_err(|err| DatasetError::output(&tmp, err))?;
    let written = write(&mut file).map_err(|err| DatasetError::output(&tmp, err));
    drop(file);
    let result = written.and_then(|()| {
        fs::rename(&tmp, path).map_err(|err| DatasetError::output(path, err))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
