use super::space_separated_reader;
use crate::core::eos::EosError;
use std::io::Read;
use std::path::Path;

/// Columns of a tabulated equation of state.
///
/// Pressure and energy density are in MeV fm⁻³, baryon density in fm⁻³; the sound
/// speed squared and adiabatic index are dimensionless.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EosTable {
    pub pressure: Vec<f64>,
    pub energy_density: Vec<f64>,
    pub baryon_density: Option<Vec<f64>>,
    pub sound_speed_squared: Option<Vec<f64>>,
    pub adiabatic_index: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Pressure,
    EnergyDensity,
    BaryonDensity,
    SoundSpeedSquared,
    AdiabaticIndex,
}

impl Column {
    fn from_header(name: &str) -> Option<Self> {
        match name {
            "p" => Some(Self::Pressure),
            "e" => Some(Self::EnergyDensity),
            "n" => Some(Self::BaryonDensity),
            "cs2" => Some(Self::SoundSpeedSquared),
            "gamma" => Some(Self::AdiabaticIndex),
            _ => None,
        }
    }
}

impl EosTable {
    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }

    fn column_mut(&mut self, column: Column) -> &mut Vec<f64> {
        match column {
            Column::Pressure => &mut self.pressure,
            Column::EnergyDensity => &mut self.energy_density,
            Column::BaryonDensity => self.baryon_density.get_or_insert_with(Vec::new),
            Column::SoundSpeedSquared => self.sound_speed_squared.get_or_insert_with(Vec::new),
            Column::AdiabaticIndex => self.adiabatic_index.get_or_insert_with(Vec::new),
        }
    }
}

pub fn read_eos_table(path: &Path) -> Result<EosTable, EosError> {
    let file = std::fs::File::open(path).map_err(|e| EosError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    parse_eos_table(file, &path.to_string_lossy())
}

/// Parses a table whose header names its columns among `p e n cs2 gamma`, in any
/// order. `p` and `e` are required; `origin` only labels errors.
pub fn parse_eos_table<R: Read>(reader: R, origin: &str) -> Result<EosTable, EosError> {
    let malformed = |reason: String| EosError::MalformedTable {
        path: origin.to_string(),
        reason,
    };
    let csv_error = |e: csv::Error| EosError::Csv {
        path: origin.to_string(),
        source: e,
    };

    let mut reader = space_separated_reader().from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();

    let mut columns = Vec::with_capacity(headers.len());
    for name in headers.iter() {
        let column = Column::from_header(name)
            .ok_or_else(|| malformed(format!("unknown column '{name}'")))?;
        if columns.contains(&column) {
            return Err(malformed(format!("duplicate column '{name}'")));
        }
        columns.push(column);
    }
    if !columns.contains(&Column::Pressure) {
        return Err(EosError::MissingColumn("p"));
    }
    if !columns.contains(&Column::EnergyDensity) {
        return Err(EosError::MissingColumn("e"));
    }

    let mut table = EosTable::default();
    for &column in &columns {
        table.column_mut(column);
    }

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        for (field, &column) in record.iter().zip(&columns) {
            let value: f64 = field.parse().map_err(|_| {
                malformed(format!("row {}: '{field}' is not a number", row + 1))
            })?;
            table.column_mut(column).push(value);
        }
    }

    Ok(table)
}
