pub mod catalog_reader;
pub mod order_writer;
pub mod script_reader;
