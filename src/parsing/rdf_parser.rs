//! RDF document ingestion.
//!
//! Thin layer over `oxigraph`'s parsers. Quads read from the document are
//! flattened to triples: the cache assigns its own graph on `add`.

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Triple;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};

/// Guesses the serialization from the file extension, defaulting to Turtle.
pub fn format_for_path(path: &Path) -> RdfFormat {
    path.extension()
        .and_then(|extension| extension.to_str())
        .and_then(RdfFormat::from_extension)
        .unwrap_or(RdfFormat::Turtle)
}

pub fn parse_reader(reader: impl Read, format: RdfFormat, base_iri: Option<&str>) -> Result<Vec<Triple>> {
    let mut parser = RdfParser::from_format(format);
    if let Some(base_iri) = base_iri {
        parser = parser
            .with_base_iri(base_iri)
            .map_err(|e| Error::InvalidIri(format!("{}: {}", base_iri, e)))?;
    }
    let mut triples = Vec::new();
    for quad in parser.for_reader(reader) {
        triples.push(Triple::from(quad?));
    }
    Ok(triples)
}

pub fn parse_str(data: &str, format: RdfFormat, base_iri: Option<&str>) -> Result<Vec<Triple>> {
    parse_reader(data.as_bytes(), format, base_iri)
}

pub fn parse_file(path: &Path) -> Result<Vec<Triple>> {
    let format = format_for_path(path);
    let file = File::open(path)?;
    let triples = parse_reader(BufReader::new(file), format, None)?;
    info!("Parsed {} triples from {} as {}", triples.len(), path.display(), format);
    Ok(triples)
}
