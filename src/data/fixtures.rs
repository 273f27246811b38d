//! CSV fixtures shared by the unit tests.

use std::io::Write;
use tempfile::NamedTempFile;

pub const HEADER: &str = "CRASH_DATE,CRASH_TIME,BOROUGH,LATITUDE,LONGITUDE,ON_STREET_NAME,\
INJURED_PERSONS,INJURED_PEDESTRIANS,INJURED_CYCLISTS,INJURED_MOTORISTS";

/// Write `HEADER` followed by `rows` to a temporary `.csv` file.
pub fn write_csv(rows: &[&str]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("tempfile");
    writeln!(file, "{HEADER}").expect("write header");
    for row in rows {
        writeln!(file, "{row}").expect("write row");
    }
    file.flush().expect("flush");
    file
}
