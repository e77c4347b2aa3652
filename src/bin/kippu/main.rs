mod print;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser as _;
use kippu::felica::cybernet::{HistoryRecord, StationCode};
use kippu::stations::{Language, LocationKey, Resolution, SqliteStations, StationResolver};
use nom::multi::many1;
use tracing::{debug, trace, trace_span, warn};

#[derive(clap::Parser, Debug)]
struct Args {
    /// Increase log level.
    #[arg(short, long, action=clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log level.
    #[arg(short, long, action=clap::ArgAction::Count)]
    quiet: u8,

    /// Station database (felica_stations.db). Without one, stations are shown as codes.
    #[arg(short, long, global = true)]
    db: Option<PathBuf>,

    /// Language for station names ("ja" or "en"). Defaults to $LANG.
    #[arg(short, long, global = true)]
    lang: Option<String>,

    /// Command.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Decode history records, given as hex. Several blocks may be concatenated.
    Decode {
        #[arg(required = true)]
        blocks: Vec<String>,
    },

    /// Look up a single station code.
    Station {
        /// Look up a bus stop instead of a rail station.
        #[arg(long)]
        bus: bool,

        /// Region byte, from the end of a history record.
        #[arg(value_parser = parse_region)]
        region: u8,

        #[arg(value_parser = parse_code)]
        line: u16,

        #[arg(value_parser = parse_code)]
        station: u16,
    },
}

impl Command {
    pub fn run(&self, args: &Args) -> Result<()> {
        match self {
            Self::Decode { blocks } => self.decode(args, blocks),
            &Self::Station {
                bus,
                region,
                line,
                station,
            } => self.station(args, bus, region, StationCode { line, station }),
        }
    }

    fn decode(&self, args: &Args, blocks: &[String]) -> Result<()> {
        let span = trace_span!("decode");
        let _enter = span.enter();

        let resolver = open_resolver(args)?;
        let lang = language(args);
        for input in blocks {
            let raw = hex::decode(input.replace([' ', ':'], ""))
                .with_context(|| format!("not a hex string: {}", input))?;
            debug!(len = raw.len(), "Decoding history blocks");
            let (rest, records) = many1(HistoryRecord::parse)(&raw[..])
                .map_err(kippu::Error::from)
                .with_context(|| format!("couldn't parse history record: {}", input))?;
            if !rest.is_empty() {
                warn!(rest = hex::encode_upper(rest), "Ignoring trailing bytes");
            }
            for record in &records {
                print::history_record(record, resolver.as_ref(), lang);
            }
        }
        Ok(())
    }

    fn station(&self, args: &Args, bus: bool, region: u8, code: StationCode) -> Result<()> {
        let span = trace_span!("station");
        let _enter = span.enter();

        let resolver = open_resolver(args)?
            .ok_or_else(|| anyhow!("--db is required to look up stations"))?;
        let key = if bus {
            LocationKey::bus(region, code)
        } else {
            LocationKey::rail(region, code)
        };
        match resolver.resolve(&key, language(args)) {
            Resolution::Found(station) => {
                print::station(&key, &station);
                Ok(())
            }
            Resolution::NotFound => bail!("no such station in {}", resolver.table().path().display()),
            Resolution::Fault(err) => Err(err).context("couldn't query station database"),
        }
    }
}

fn open_resolver(args: &Args) -> Result<Option<StationResolver<SqliteStations>>> {
    args.db
        .as_ref()
        .map(|path| {
            if path.is_file() {
                debug!(?path, "Using station database");
                Ok(StationResolver::new(SqliteStations::new(path)))
            } else {
                Err(anyhow!("no such station database: {}", path.display()))
            }
        })
        .transpose()
}

fn language(args: &Args) -> Language {
    args.lang
        .clone()
        .or_else(|| std::env::var("LANG").ok())
        .map(|tag| Language::from_locale(&tag))
        .unwrap_or_default()
}

/// Parses a code as decimal, or hex with a 0x prefix.
fn parse_code(s: &str) -> Result<u16, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn parse_region(s: &str) -> Result<u8> {
    Ok(u8::try_from(parse_code(s)?)?)
}

fn init_logging(args: &Args) {
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_max_level(match (2 + args.verbose).saturating_sub(args.quiet) {
            0 => tracing::Level::ERROR,
            1 => tracing::Level::WARN,
            2 => tracing::Level::INFO,
            3 => tracing::Level::DEBUG,
            4.. => tracing::Level::TRACE,
        })
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);
    trace!(?args, "Starting up");
    args.command.run(&args)
}
