//! Ontodia - command-line front end for the RDF label/type cache.
//!
//! Usage:
//!   ontodia data/people.ttl labels http://example.org/Bob
//!   ontodia data/people.ttl data/orgs.nt types
//!   ontodia --config editor.json data/people.ttl match --predicate http://xmlns.com/foaf/0.1/knows
//!   ontodia data/people.ttl check http://example.org/Alice http://example.org/Nobody

use clap::{Parser, Subcommand};
use ontodia::config::EditorConfig;
use ontodia::core::vocabulary::rdf;
use ontodia::parsing::parse_file;
use ontodia::storage::cacheable_store::subjects_of;
use ontodia::storage::triple_store::term_value;
use ontodia::storage::{MatchStatement, RdfCacheableStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ontodia")]
#[command(about = "Load RDF documents into a cached triple store and query it")]
struct Args {
    /// Editor configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    /// RDF documents to load; the format follows the file extension
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cached labels of a subject, preferred first
    Labels { subject: String },
    /// Print instance counts per type
    Types,
    /// Print quads matching a pattern
    Match {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        predicate: Option<String>,
        #[arg(long)]
        object: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Print only the distinct subjects
        #[arg(long)]
        subjects: bool,
    },
    /// Report whether each entity is present in the store
    Check { ids: Vec<String> },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "ontodia=debug" } else { "ontodia=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => EditorConfig::from_file(path)?,
        None => EditorConfig::default(),
    };

    let mut cache = RdfCacheableStore::new(config.cache)?;
    for path in &args.files {
        let triples = parse_file(path)?;
        let graph = cache.add(triples, None)?;
        info!("Loaded {} into {}", path.display(), graph);
    }
    info!("Store holds {} quads, {} labelled subjects", cache.len()?, cache.labelled_subjects());

    match args.command {
        Command::Labels { subject } => {
            for quad in cache.labels(&subject) {
                println!("{}\t{}", quad.predicate.as_str(), quad.object);
            }
        }
        Command::Types => {
            for (type_iri, count) in cache.type_counts() {
                println!("{}\t{}", count, type_iri);
            }
        }
        Command::Match { subject, predicate, object, limit, subjects } => {
            let statement = MatchStatement { subject, predicate, object, graph: None, limit };
            let quads = cache.match_pattern(&statement).await?;
            if subjects {
                for subject in subjects_of(&quads) {
                    println!("{}", subject);
                }
            } else {
                for quad in &quads {
                    let object = term_value(quad.object.as_ref());
                    let marker = if quad.predicate.as_str() == rdf::TYPE { " (type)" } else { "" };
                    println!("{}\t{}\t{}{}", quad.subject, quad.predicate, object, marker);
                }
            }
        }
        Command::Check { ids } => {
            for id in ids {
                let found = cache.check_element(&id).await;
                println!("{}\t{}", if found { "present" } else { "absent" }, id);
            }
        }
    }
    Ok(())
}
