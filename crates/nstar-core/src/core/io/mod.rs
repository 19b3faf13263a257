//! Readers for the plain-text tables that parameterise equations of state.
//!
//! Both formats are single-space separated with a header row, read through the
//! `csv` crate.

pub mod eos_table;
pub mod gpp_table;

pub(crate) fn space_separated_reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(b' ')
        .trim(csv::Trim::All)
        .comment(Some(b'#'));
    builder
}
