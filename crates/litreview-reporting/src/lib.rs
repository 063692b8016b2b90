pub mod export;

pub use export::{export_csv, export_csv_file};
