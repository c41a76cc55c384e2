//! End-to-end scenarios: generate tables, pack them, and drive the runtime
//! against real input, including the error repair paths.

use sdgen::compress::pack;
use sdgen::emit::assemble;
use sdgen::grammar::build_productions;
use sdgen::lalr::generate_parser;
use sdgen::scanner::generate_scanner;
use sdgen::syntax::parse_language;
use sdgen_runtime::buffer::Location;
use sdgen_runtime::{Callbacks, Driver, ParseEntry, Tables, TokenEntry};

fn build(source: &str) -> Tables {
    let mut lang = parse_language(source.as_bytes()).unwrap();
    let scanner = generate_scanner(&mut lang);
    let productions = build_productions(&mut lang);
    let parser = generate_parser(&mut lang, &productions);
    assert!(lang.process, "{:?}", lang.diagnostics);
    pack(&assemble(&lang, &scanner, &parser, &productions))
}

const NESTED: &str = r#"
    IDENT nested;
    OPTIONS ERRORREPAIR;
    SCANNER
        "a" = 'a';
        "b" = 'b';
        = [\ \t\n]+;
    DEFAULT
        START = <s>;
        COST = 10;
        CONTEXT = 3;
    PARSER
        <s> = "a" <s> "b"
            | ;
"#;

fn drive(tables: &Tables, input: &str) -> (Result<(), sdgen_runtime::DriverError>, String) {
    let mut out = Vec::new();
    let result = {
        let mut driver = Driver::new(tables, input.as_bytes(), (), &mut out);
        driver.parse()
    };
    (result, String::from_utf8_lossy(&out).into_owned())
}

#[test]
fn balanced_input_accepts_silently() {
    let tables = build(NESTED);
    let (result, output) = drive(&tables, "aabb\n");
    result.unwrap();
    assert!(output.is_empty(), "unexpected output: {}", output);
}

#[test]
fn missing_closer_is_repaired_by_insertion() {
    let tables = build(NESTED);
    let (result, output) = drive(&tables, "aab\n");
    result.unwrap();
    // The insertion happens in front of end of file, so the repair is
    // reported on the EOF line.
    assert!(output.contains("Inserted: b"), "output: {}", output);
    assert!(output.contains("<EOF>"), "output: {}", output);
    assert!(output.contains('^'), "output: {}", output);
}

#[test]
fn undefined_characters_are_deleted_by_the_scanner() {
    let tables = build(NESTED);
    let (result, output) = drive(&tables, "abc\n");
    result.unwrap();
    assert!(output.contains("Deleted: c"), "output: {}", output);
}

#[test]
fn adjacent_undefined_characters_coalesce() {
    let tables = build(NESTED);
    let (result, output) = drive(&tables, "abcc\n");
    result.unwrap();
    assert!(output.contains("Deleted: cc"), "output: {}", output);
    assert_eq!(output.matches("Deleted:").count(), 1, "output: {}", output);
}

#[test]
fn surplus_token_is_repaired_by_deletion() {
    let tables = build(NESTED);
    let (result, output) = drive(&tables, "aabbb\n");
    result.unwrap();
    assert!(output.contains("Deleted: b"), "output: {}", output);
}

struct Installs {
    seen: Vec<String>,
}

impl Callbacks for Installs {
    fn install_token(&mut self, token: &mut TokenEntry) {
        self.seen.push(token.symbol.clone().unwrap());
    }
}

#[test]
fn installed_symbols_survive_block_boundaries() {
    let tables = build(
        r#"
            IDENT numbers;
            SCANNER
                "int" = [0-9]+, INSTALL;
                = [\ \t\n]+;
            PARSER
                <s> = "int";
        "#,
    );

    // A one-byte block size forces a boundary after every character.
    let mut out = Vec::new();
    let mut driver = Driver::with_block_size(
        &tables,
        "007\n".as_bytes(),
        Installs { seen: Vec::new() },
        &mut out,
        1,
    );
    driver.parse().unwrap();
    assert_eq!(driver.callbacks_mut().seen, vec!["007".to_owned()]);
}

struct Actions {
    fired: Vec<(i32, usize)>,
    errors: usize,
}

impl Callbacks for Actions {
    fn semantic_action(
        &mut self,
        number: i32,
        rhs: &[ParseEntry],
        errors: &mut Vec<(Location, String)>,
    ) {
        self.fired.push((number, rhs.len()));
        if number == 2 && self.errors > 0 {
            errors.push((rhs[0].start, "too deep".to_owned()));
            self.errors -= 1;
        }
    }
}

#[test]
fn semantic_actions_fire_in_reduce_order() {
    let tables = build(
        r#"
            IDENT actions;
            SCANNER
                "a" = 'a';
                "b" = 'b';
                = [\ \t\n]+;
            DEFAULT
                START = <s>;
            PARSER
                <s> = "a" <s> "b" #2
                    | #1;
        "#,
    );

    let mut out = Vec::new();
    let mut driver = Driver::new(
        &tables,
        "aabb\n".as_bytes(),
        Actions {
            fired: Vec::new(),
            errors: 0,
        },
        &mut out,
    );
    driver.parse().unwrap();
    // The epsilon production reduces first, then the nested pair inside
    // out.
    assert_eq!(
        driver.callbacks_mut().fired,
        vec![(1, 0), (2, 3), (2, 3)]
    );
}

#[test]
fn semantic_errors_are_reported_on_their_line() {
    let tables = build(
        r#"
            IDENT actions;
            SCANNER
                "a" = 'a';
                "b" = 'b';
                = [\ \t\n]+;
            DEFAULT
                START = <s>;
            PARSER
                <s> = "a" <s> "b" #2
                    | #1;
        "#,
    );

    let mut out = Vec::new();
    let result = {
        let mut driver = Driver::new(
            &tables,
            "ab\n".as_bytes(),
            Actions {
                fired: Vec::new(),
                errors: 1,
            },
            &mut out,
        );
        driver.parse()
    };
    result.unwrap();
    let output = String::from_utf8_lossy(&out);
    assert!(output.contains("too deep"), "output: {}", output);
}

#[test]
fn listing_echoes_every_line() {
    let tables = build(NESTED);
    let mut out = Vec::new();
    {
        let mut driver = Driver::new(&tables, "ab\naabb\n".as_bytes(), (), &mut out);
        driver.listing = true;
        driver.parse().unwrap();
    }
    let output = String::from_utf8_lossy(&out);
    assert!(output.contains("1: ab"), "output: {}", output);
    assert!(output.contains("2: aabb"), "output: {}", output);
}
