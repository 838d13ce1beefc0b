pub mod csv_writer;
pub mod files;
