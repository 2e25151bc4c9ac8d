pub mod rdf_parser;

pub use rdf_parser::{format_for_path, parse_file, parse_str};
