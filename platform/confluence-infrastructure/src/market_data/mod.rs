pub mod csv_files;
pub mod yahoo;
