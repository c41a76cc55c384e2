use anyhow::Context as _;
use clap::Parser;
use sdgen::{emit, grammar, lalr, listing, scanner, syntax};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// An LR(1) scanner and parser generator with automatic locally least-cost
/// error repair.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// List the standardized grammar.
    #[arg(short = 'g')]
    grammar: bool,

    /// List the input file as it is parsed.
    #[arg(short = 'l')]
    listing: bool,

    /// Perform an input syntax check only.
    #[arg(short = 'q')]
    check_only: bool,

    /// List the token regular expressions.
    #[arg(short = 'r')]
    regexes: bool,

    /// List the LR parsing tables.
    #[arg(short = 't')]
    tables: bool,

    /// List conflict resolutions.
    #[arg(short = 'v')]
    verbose: bool,

    /// List a cross-reference of tokens.
    #[arg(short = 'x')]
    crossref: bool,

    /// Debug dumps: any of "adefgimnps".
    #[arg(short = 'd', value_name = "FLAGS", default_value = "")]
    debug: String,

    /// Output tables file; "-" writes to stdout.
    #[arg(short = 'w', value_name = "PATH", default_value = "tables.dat")]
    output: String,

    /// The language description; stdin when omitted.
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "parsed CLI args");

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("sdgen: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<bool> {
    for flag in args.debug.chars() {
        if !"adefgimnps".contains(flag) {
            anyhow::bail!("unknown debug flag '{}'", flag);
        }
    }

    let input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("can't open {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };

    let mut lang = syntax::parse_language(BufReader::new(input))
        .context("errored while reading the language description")?;

    if args.listing {
        // The generator front end echoes the description as diagnostics
        // arrive; here the description is already consumed, so the listing
        // reduces to the diagnostics below.
        tracing::debug!("input listing requested");
    }

    if args.check_only {
        report(&lang, args.verbose);
        return Ok(lang.process);
    }

    if args.regexes || args.debug.contains('s') {
        print!("{}", listing::display_regexes(&lang));
    }

    // The scanner automaton is needed for any table output.
    let scanner_tables = scanner::generate_scanner(&mut lang);
    if args.debug.contains('m') {
        for state in 1..=scanner_tables.count {
            println!(
                "state {:4}: final {} install {}",
                state, scanner_tables.finals[state], scanner_tables.install[state]
            );
        }
    }
    if args.debug.contains('d') || args.debug.contains('n') {
        eprintln!("sdgen: the intermediate automata are not retained");
    }

    if lang.grammar.is_empty() {
        report(&lang, args.verbose);
        return Ok(lang.process);
    }

    let productions = grammar::build_productions(&mut lang);
    if args.grammar || args.debug.contains('g') || args.debug.contains('p') {
        print!("{}", listing::display_productions(&lang, &productions));
    }
    if args.crossref {
        print!("{}", listing::display_crossref(&lang, &productions));
    }

    let parser_tables = lalr::generate_parser(&mut lang, &productions);
    if args.debug.contains('f') {
        print!("{}", listing::display_first(&lang, &parser_tables.first));
    }
    if args.debug.contains('i') {
        print!(
            "{}",
            listing::display_collection(&lang, &productions, &parser_tables.collection)
        );
    }
    if args.debug.contains('a') {
        print!(
            "{}",
            listing::display_ancestors(&lang, &parser_tables.collection)
        );
    }
    if args.debug.contains('e') {
        print!(
            "{}",
            listing::display_repair(&lang, &parser_tables.errortoken)
        );
    }
    if args.tables {
        print!("{}", listing::display_table(&lang, &parser_tables.lrstates));
    }

    report(&lang, args.verbose);

    if lang.process {
        let raw = emit::assemble(&lang, &scanner_tables, &parser_tables, &productions);
        if args.output == "-" {
            let stdout = io::stdout();
            emit::write_uncompressed(&raw, &mut stdout.lock())
                .context("can't write tables to stdout")?;
        } else {
            let mut out = File::create(&args.output)
                .with_context(|| format!("can't create {}", args.output))?;
            emit::write_uncompressed(&raw, &mut out)
                .with_context(|| format!("can't write {}", args.output))?;
            out.flush().ok();
        }
    }

    Ok(lang.process)
}

fn report(lang: &sdgen::Language, verbose: bool) {
    for message in &lang.diagnostics {
        // Conflict resolutions are chatty; show them only with -v. Real
        // errors always print.
        let resolution = message.contains("resolved") || message.contains("precedence");
        if verbose || !resolution || !lang.process {
            eprintln!("{}", message);
        }
    }
}
