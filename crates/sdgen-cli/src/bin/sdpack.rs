//! Pack an uncompressed (type 0) tables file into the compressed (type 1)
//! form the runtime interprets, reporting the size reduction on stderr.

use anyhow::Context as _;
use sdgen::{compress, emit};
use sdgen_runtime::tables::MAP_COUNT;
use std::env;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("sdpack: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 3 {
        anyhow::bail!("usage: sdpack [ input [ output ] ]");
    }

    let input: Box<dyn Read> = match args.get(1).map(String::as_str) {
        None | Some("-") => Box::new(io::stdin()),
        Some(path) => Box::new(File::open(path).with_context(|| format!("can't open {}", path))?),
    };

    let raw = emit::read_uncompressed(BufReader::new(input))
        .context("input tables were not produced by sdgen")?;

    eprintln!(
        "Packing language with {} terminals (plus {} ignored tokens) and {} nonterminals",
        raw.tnumber,
        raw.ntokens - raw.tnumber,
        raw.ntnumber
    );
    eprintln!(
        "The scanner tables have {} states occupying {} x {} = {} entries",
        raw.snumber,
        raw.snumber,
        MAP_COUNT,
        raw.snumber as usize * MAP_COUNT
    );

    let tables = compress::pack(&raw);

    let before = (raw.snumber as usize * MAP_COUNT) as f64;
    let after = (2 * raw.snumber as usize + tables.scheck.len() + tables.snext.len()) as f64;
    eprintln!(
        "The packed scanner tables occupy {} + {} + {} + {} = {} entries",
        raw.snumber,
        raw.snumber,
        tables.scheck.len(),
        tables.snext.len(),
        after as usize
    );
    eprintln!(
        "This is a reduction of {:.1}% in scanner table size",
        100.0 * (before - after) / before
    );

    let tokens = (raw.tnumber + raw.ntnumber) as usize;
    let before = (raw.pnumber as usize * tokens) as f64;
    let after = (raw.pnumber as usize + 2 * (tables.pcheck.len() - 1)) as f64;
    eprintln!(
        "The parser tables have {} states occupying {} x {} = {} entries",
        raw.pnumber,
        raw.pnumber,
        tokens,
        raw.pnumber as usize * tokens
    );
    eprintln!(
        "This is a reduction of {:.1}% in parser table size",
        100.0 * (before - after) / before
    );

    match args.get(2).map(String::as_str) {
        None | Some("-") => {
            let stdout = io::stdout();
            tables
                .write_to(&mut stdout.lock())
                .context("can't write tables to stdout")?;
        }
        Some(path) => {
            let mut out =
                File::create(path).with_context(|| format!("can't create {}", path))?;
            tables
                .write_to(&mut out)
                .with_context(|| format!("can't write {}", path))?;
            out.flush().ok();
        }
    }
    Ok(())
}
