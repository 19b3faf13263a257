use super::space_separated_reader;
use crate::core::eos::EosError;
use crate::core::eos::gpp::CoreParameters;
use std::io::Read;
use std::path::Path;

/// Reads a core parameter table with header `EOS log_rho0 log_K1 gamma1 gamma2 gamma3`.
pub fn read_core_table(path: &Path) -> Result<Vec<CoreParameters>, EosError> {
    let file = std::fs::File::open(path).map_err(|e| EosError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    parse_core_table(file, &path.to_string_lossy())
}

pub fn parse_core_table<R: Read>(reader: R, origin: &str) -> Result<Vec<CoreParameters>, EosError> {
    let mut reader = space_separated_reader().from_reader(reader);
    reader
        .deserialize::<CoreParameters>()
        .map(|row| {
            row.map_err(|e| EosError::Csv {
                path: origin.to_string(),
                source: e,
            })
        })
        .collect()
}

pub fn find_label<'a>(
    rows: &'a [CoreParameters],
    label: &str,
) -> Result<&'a CoreParameters, EosError> {
    rows.iter()
        .find(|row| row.label == label)
        .ok_or_else(|| EosError::UnknownLabel(label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::eos::{EquationOfState, GeneralizedPiecewisePolytrope};
    use std::fs;
    use tempfile::tempdir;

    const TABLE: &str = "EOS log_rho0 log_K1 gamma1 gamma2 gamma3\n\
                         SLy4 14.165 -30.45 3.005 2.988 2.851\n\
                         HEBsoft 14.1 -30.45 3.005 2.988 2.851\n";

    #[test]
    fn parses_rows_and_finds_label() {
        let rows = parse_core_table(TABLE.as_bytes(), "inline").unwrap();
        assert_eq!(rows.len(), 2);
        let row = find_label(&rows, "HEBsoft").unwrap();
        assert_eq!(row.log_rho0, 14.1);
        assert_eq!(row.gamma3, 2.851);
    }

    #[test]
    fn unknown_label_is_reported() {
        let rows = parse_core_table(TABLE.as_bytes(), "inline").unwrap();
        assert!(matches!(
            find_label(&rows, "APR"),
            Err(EosError::UnknownLabel(label)) if label == "APR"
        ));
    }

    #[test]
    fn malformed_row_is_a_csv_error() {
        let text = "EOS log_rho0 log_K1 gamma1 gamma2 gamma3\nSLy4 14.1 x 3 3 3\n";
        assert!(matches!(
            parse_core_table(text.as_bytes(), "inline"),
            Err(EosError::Csv { .. })
        ));
    }

    #[test]
    fn builds_model_from_table_on_disk() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("TableIII.dat");
        fs::write(&file_path, TABLE).unwrap();
        let eos = GeneralizedPiecewisePolytrope::from_table(&file_path, "SLy4").unwrap();
        assert_eq!(eos.label(), "SLy4");
        assert!(eos.energy_density_from(10.0) > 10.0);
        assert!(matches!(
            GeneralizedPiecewisePolytrope::from_table(&file_path, "MPA1"),
            Err(EosError::UnknownLabel(_))
        ));
    }
}
