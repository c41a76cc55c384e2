//! Generation-side checks: conflict handling, table invariants, and the
//! round trips between the table representations.

use sdgen::compress::pack;
use sdgen::emit::{assemble, read_uncompressed, write_uncompressed, RawTables};
use sdgen::grammar::{build_productions, Productions};
use sdgen::lalr::{generate_parser, ParserTables};
use sdgen::language::Language;
use sdgen::scanner::{generate_scanner, ScannerTables};
use sdgen::syntax::parse_language;
use sdgen_runtime::tables::{Tables, SHIFT_OFFSET};

struct Generated {
    lang: Language,
    productions: Productions,
    scanner: ScannerTables,
    parser: ParserTables,
}

fn generate(source: &str) -> Generated {
    let mut lang = parse_language(source.as_bytes()).unwrap();
    let scanner = generate_scanner(&mut lang);
    let productions = build_productions(&mut lang);
    let parser = generate_parser(&mut lang, &productions);
    Generated {
        lang,
        productions,
        scanner,
        parser,
    }
}

fn raw_of(generated: &Generated) -> RawTables {
    assemble(
        &generated.lang,
        &generated.scanner,
        &generated.parser,
        &generated.productions,
    )
}

fn token_named(generated: &Generated, name: &str) -> i32 {
    (1..=generated.lang.termcount())
        .find(|&token| {
            generated
                .lang
                .symbols
                .get(generated.lang.token_symbol(token))
                .name
                == name
        })
        .unwrap()
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

#[test]
fn nested_grammar_generates_cleanly() {
    let generated = generate(NESTED);
    assert!(generated.lang.process, "{:?}", generated.lang.diagnostics);

    // <Goal> -> <s> #eof, <s> -> epsilon (cheapest first), <s> -> a <s> b.
    assert_eq!(generated.productions.count(), 3);
    assert_eq!(generated.productions.get(2).rhs.len(), 0);
    assert_eq!(generated.productions.get(3).rhs.len(), 3);

    // Every state has a continuation value under error repair.
    for state in 1..=generated.parser.count() {
        assert_ne!(
            generated.parser.errortoken[state], 0,
            "state {} has no repair value",
            state
        );
    }
}

#[test]
fn lookaheads_are_a_fixpoint_over_spontaneous_follows() {
    let generated = generate(NESTED);
    let collection = &generated.parser.collection;

    for state in collection.states.iter().skip(1) {
        for item in &state.items {
            // Lookaheads include the spontaneous follows...
            for symbol in item.follow.iter() {
                assert!(item.lookahead.contains(symbol));
            }
            // ...and are stable under one more propagation round.
            for target in &item.update {
                let destination = &collection.states[target.state].items[target.item];
                for symbol in item.lookahead.iter() {
                    assert!(destination.lookahead.contains(symbol));
                }
            }
        }
    }
}

#[test]
fn kernels_rederive_from_their_ancestors() {
    let generated = generate(NESTED);
    let collection = &generated.parser.collection;

    for (number, state) in collection.states.iter().enumerate().skip(1) {
        for (index, item) in state.items[..state.kernel].iter().enumerate() {
            if item.ancestors.is_empty() {
                continue;
            }
            // Every ancestor holds the same item one symbol earlier, and
            // shifting it lands exactly here.
            for ancestor in &item.ancestors {
                let from = &collection.states[ancestor.state].items[ancestor.item];
                assert_eq!(from.prod, item.prod);
                assert!(from.dot < item.dot);
                assert_eq!(
                    from.descendant,
                    Some(sdgen::lalr::Target {
                        state: number,
                        item: index
                    })
                );
            }
        }
    }
}

#[test]
fn dangling_else_resolves_to_shift() {
    let source = r#"
        IDENT dangling;
        OPTIONS AMBIGUOUS;
        SCANNER
            "if" = 'i';
            "then" = 't';
            "else" = 'e', ASSOCIATIVITY=RIGHT;
            "x" = 'x';
        DEFAULT
            START = <stmt>;
        PARSER
            <stmt> = "if" <stmt> "then" <stmt>
                   | "if" <stmt> "then" <stmt> "else" <stmt>
                   | "x";
    "#;
    let generated = generate(source);
    assert!(generated.lang.process, "{:?}", generated.lang.diagnostics);
    assert!(generated
        .lang
        .diagnostics
        .iter()
        .any(|message| message.contains("Shift-Reduce conflict")));
    assert!(generated
        .lang
        .diagnostics
        .iter()
        .any(|message| message.contains("resolved")));

    // The ambiguous states keep their shift on "else": wherever an
    // if-then statement could reduce with "else" pending, the action is a
    // shift.
    let else_token = token_named(&generated, "else") as usize;
    let collection = &generated.parser.collection;
    let mut ambiguous = 0;
    for state in 1..=generated.parser.count() {
        let reduces_on_else = collection.states[state].items.iter().any(|item| {
            item.dot >= generated.productions.get(item.prod).length
                && item.lookahead.iter().any(|symbol| {
                    generated.lang.token_of(symbol) as usize == else_token
                })
        });
        let shifts_else = collection.states[state].items.iter().any(|item| {
            let production = generated.productions.get(item.prod);
            item.dot < production.length
                && generated.lang.token_of(production.rhs[item.dot]) as usize == else_token
        });
        if reduces_on_else && shifts_else {
            let action = generated.parser.lrstates[state][else_token];
            assert!(action > SHIFT_OFFSET, "state {} did not keep the shift", state);
            ambiguous += 1;
        }
    }
    assert!(ambiguous > 0);
}

const SPLITTABLE: &str = r#"
    IDENT split;
    SCANNER
        "a" = 'a';
        "b" = 'b';
        "c" = 'c';
        "x" = 'x';
        "y" = 'y';
    DEFAULT
        START = <s>;
    PARSER
        <s> = "a" <aa> "x"
            | "a" <bb> "y"
            | "b" <aa> "y"
            | "b" <bb> "x";
        <aa> = "c";
        <bb> = "c";
"#;

#[test]
fn merged_lookaheads_fail_without_splitstates() {
    let generated = generate(SPLITTABLE);
    assert!(!generated.lang.process);
    assert!(generated
        .lang
        .diagnostics
        .iter()
        .any(|message| message.contains("Reduce-Reduce conflict")));
}

#[test]
fn splitstates_repairs_merged_lookaheads_with_one_copy() {
    let merged = generate(SPLITTABLE);
    let split = generate(&SPLITTABLE.replace(
        "IDENT split;",
        "IDENT split; OPTIONS SPLITSTATES;",
    ));

    assert!(split.lang.process, "{:?}", split.lang.diagnostics);
    assert_eq!(split.parser.count(), merged.parser.count() + 1);

    // The rebuilt table is conflict-free: every reduce lookahead set is
    // disjoint from its siblings per state.
    for state in split.parser.collection.states.iter().skip(1) {
        for i in 0..state.items.len() {
            for j in i + 1..state.items.len() {
                let left = &state.items[i];
                let right = &state.items[j];
                let reduce_left =
                    left.dot >= split.productions.get(left.prod).length;
                let reduce_right =
                    right.dot >= split.productions.get(right.prod).length;
                if reduce_left && reduce_right {
                    assert!(left.lookahead.intersect(&right.lookahead).is_empty());
                }
            }
        }
    }
}

#[test]
fn genuinely_ambiguous_reduces_are_reported_unrepairable() {
    // Both alternatives end in the same terminal, so the conflicting
    // lookaheads are spontaneous and no splitting can separate them.
    let source = r#"
        IDENT ambiguous;
        OPTIONS SPLITSTATES;
        SCANNER
            "a" = 'a';
            "x" = 'x';
        DEFAULT
            START = <l>;
        PARSER
            <l> = <aa> "x" | <bb> "x";
            <aa> = "a";
            <bb> = "a";
    "#;
    let generated = generate(source);
    assert!(!generated.lang.process);
    assert!(generated
        .lang
        .diagnostics
        .iter()
        .any(|message| message.contains("cannot be resolved")));
}

#[test]
fn compressed_parser_reproduces_the_action_matrix() {
    let generated = generate(NESTED);
    let raw = raw_of(&generated);
    let tables = pack(&raw);

    let tokens = raw.tnumber + raw.ntnumber;
    for state in 1..=raw.pnumber {
        for token in 1..=tokens {
            let action = raw.actions[state as usize][token as usize];
            let entry = (tables.pbase[state as usize] + token) as usize;
            if action != 0 {
                assert_eq!(tables.pcheck[entry], state);
                assert_eq!(tables.pnext[entry], action);
            } else {
                assert_ne!(
                    tables.pcheck.get(entry).copied(),
                    Some(state),
                    "zero cell decodes as an action"
                );
            }
        }
    }
}

#[test]
fn compressed_scanner_decodes_through_default_chains() {
    let generated = generate(NESTED);
    let raw = raw_of(&generated);
    let tables = pack(&raw);

    for state in 1..=raw.snumber {
        for column in 0..sdgen_runtime::tables::MAP_COUNT {
            let expected = raw.strans[state as usize][column];
            assert_eq!(
                tables.scan_next(state, column as i32),
                expected,
                "state {} column {}",
                state,
                column
            );
        }
    }
}

#[test]
fn uncompressed_tables_round_trip_through_text() {
    let generated = generate(NESTED);
    let raw = raw_of(&generated);

    let mut text = Vec::new();
    write_uncompressed(&raw, &mut text).unwrap();
    for line in text.split(|&ch| ch == b'\n') {
        assert!(line.len() <= sdgen_runtime::tables::MAX_LINE);
    }

    let back = read_uncompressed(&text[..]).unwrap();
    assert_eq!(back.name, raw.name);
    assert_eq!(back.tnumber, raw.tnumber);
    assert_eq!(back.ntokens, raw.ntokens);
    assert_eq!(back.snumber, raw.snumber);
    assert_eq!(back.ntnumber, raw.ntnumber);
    assert_eq!(back.gnumber, raw.gnumber);
    assert_eq!(back.pnumber, raw.pnumber);
    assert_eq!(back.tokenindex, raw.tokenindex);
    assert_eq!(back.tokentable, raw.tokentable);
    assert_eq!(back.finals, raw.finals);
    assert_eq!(back.install, raw.install);
    assert_eq!(back.strans, raw.strans);
    assert_eq!(back.inscost, raw.inscost);
    assert_eq!(back.delcost, raw.delcost);
    assert_eq!(back.lhsymbol, raw.lhsymbol);
    assert_eq!(back.rhslength, raw.rhslength);
    assert_eq!(back.semantics, raw.semantics);
    assert_eq!(back.repair, raw.repair);
    assert_eq!(back.stringindex, raw.stringindex);
    assert_eq!(back.stringtable, raw.stringtable);
    assert_eq!(back.actions, raw.actions);
}

#[test]
fn compressed_tables_round_trip_through_text() {
    let generated = generate(NESTED);
    let tables = pack(&raw_of(&generated));

    let mut text = Vec::new();
    tables.write_to(&mut text).unwrap();
    let back = Tables::from_reader(&text[..]).unwrap();

    assert_eq!(back.name, tables.name);
    assert_eq!(back.sdefault, tables.sdefault);
    assert_eq!(back.sbase, tables.sbase);
    assert_eq!(back.scheck, tables.scheck);
    assert_eq!(back.snext, tables.snext);
    assert_eq!(back.pbase, tables.pbase);
    assert_eq!(back.pcheck, tables.pcheck);
    assert_eq!(back.pnext, tables.pnext);
    assert_eq!(back.repair, tables.repair);
    assert_eq!(back.stringtable, tables.stringtable);
}

#[test]
fn reparsing_the_same_description_is_stable() {
    let first = generate(NESTED);
    let second = generate(NESTED);
    assert_eq!(first.lang.termcount(), second.lang.termcount());
    assert_eq!(first.lang.nontermcount(), second.lang.nontermcount());
    assert_eq!(first.productions.count(), second.productions.count());
    for token in 1..=first.lang.termcount() + first.lang.nontermcount() {
        let left = first.parser.first.get(token);
        let right = second.parser.first.get(token);
        assert_eq!(left.nullable, right.nullable);
        assert_eq!(left.symbols.len(), right.symbols.len());
    }
}

#[test]
fn scanner_only_description_skips_the_parser() {
    let source = r#"
        IDENT scanonly;
        SCANNER
            "word" = [a-z]+;
            = [\ \t\n]+;
    "#;
    let mut lang = parse_language(source.as_bytes()).unwrap();
    let scanner = generate_scanner(&mut lang);
    assert!(lang.process);
    assert!(lang.grammar.is_empty());
    assert!(scanner.count > 0);
}
