//! The recursive-descent parser for language descriptions.

use super::lexer::{decode_string, Token, TokenKind};
use super::SyntaxError;
use crate::language::{AltAst, Language, ProductionAst, ScannerRule};
use crate::regex::{char_type, CharType, TreeNode};
use crate::symbol::{LookupAction, SymbolId, SymbolKind, SymbolValue, TokenFlags};

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    lang: Language,
    /// Counter behind the generated names of ignored-regex placeholders.
    unique: u32,
}

pub fn parse(tokens: Vec<Token>) -> Result<Language, SyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        lang: Language::new(),
        unique: 0,
    };
    predefine(&mut parser.lang);
    parser.file()?;
    Ok(parser.lang)
}

/// Install the built-in definitions for the ASCII control characters.
fn predefine(lang: &mut Language) {
    let mut define = |name: &str, tree: TreeNode| {
        let id = lang
            .symbols
            .lookup(name, SymbolKind::Definition, LookupAction::Insert)
            .unwrap();
        lang.symbols.get_mut(id).value = SymbolValue::Tree(Some(tree));
    };

    define("NUL", TreeNode::ZeroByte);
    let controls: &[(&str, u8)] = &[
        ("SOH", 0x01),
        ("STX", 0x02),
        ("ETX", 0x03),
        ("EOT", 0x04),
        ("ENQ", 0x05),
        ("ACK", 0x06),
        ("BEL", 0x07),
        ("BS", 0x08),
        ("HT", 0x09),
        ("LF", 0x0A),
        ("NL", 0x0A),
        ("EOL", 0x0A),
        ("VT", 0x0B),
        ("FF", 0x0C),
        ("CR", 0x0D),
        ("SO", 0x0E),
        ("SI", 0x0F),
        ("DLE", 0x10),
        ("DC1", 0x11),
        ("DC2", 0x12),
        ("DC3", 0x13),
        ("DC4", 0x14),
        ("NAK", 0x15),
        ("SYN", 0x16),
        ("ETB", 0x17),
        ("CAN", 0x18),
        ("EM", 0x19),
        ("SUB", 0x1A),
        ("ESC", 0x1B),
        ("FS", 0x1C),
        ("GS", 0x1D),
        ("RS", 0x1E),
        ("US", 0x1F),
        ("DEL", 0x7F),
    ];
    for &(name, byte) in controls {
        define(name, TreeNode::Character(vec![byte]));
    }
    define("EOF", TreeNode::EndOfFile);
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn bump(&mut self) -> TokenKind {
        let token = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn fail(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn eat_punct(&mut self, ch: char) -> bool {
        if *self.peek() == TokenKind::Punct(ch) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, ch: char) -> Result<(), SyntaxError> {
        if self.eat_punct(ch) {
            Ok(())
        } else {
            Err(self.fail(format!("Expected '{}'", ch)))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(name) if name == keyword)
    }

    fn at_section(&self) -> bool {
        ["TITLE", "OPTIONS", "DEFINE", "SCANNER", "DEFAULT", "PARSER"]
            .iter()
            .any(|section| self.at_keyword(section))
    }

    // ---- sections ----

    fn file(&mut self) -> Result<(), SyntaxError> {
        if !self.at_keyword("IDENT") {
            return Err(self.fail("Expected IDENT section"));
        }
        self.bump();
        let TokenKind::Ident(name) = self.bump() else {
            return Err(self.fail("Expected an identifier after IDENT"));
        };
        self.lang.name = name;
        self.expect_punct(';')?;

        if self.at_keyword("TITLE") {
            self.bump();
            let TokenKind::Str(title) = self.bump() else {
                return Err(self.fail("Expected a string after TITLE"));
            };
            self.lang.title = title;
            self.eat_punct(';');
        }

        if self.at_keyword("OPTIONS") {
            self.bump();
            loop {
                let TokenKind::Ident(option) = self.bump() else {
                    return Err(self.fail("Expected an option name"));
                };
                match option.as_str() {
                    "AMBIGUOUS" => self.lang.options.ambiguous = true,
                    "ERRORREPAIR" => self.lang.options.error_repair = true,
                    "SHIFTREDUCE" => self.lang.options.default_reduce = true,
                    "SPLITSTATES" => self.lang.options.split_states = true,
                    other => self.lang.error(format!("Unknown option {}", other)),
                }
                if !self.eat_punct(',') {
                    break;
                }
            }
            self.eat_punct(';');
        }

        if self.at_keyword("DEFINE") {
            self.bump();
            while let TokenKind::Ident(_) = self.peek() {
                if self.at_section() {
                    break;
                }
                let TokenKind::Ident(name) = self.bump() else {
                    unreachable!()
                };
                self.expect_punct('=')?;
                let tree = self.regex()?;
                self.expect_punct(';')?;
                let id = self
                    .lang
                    .symbols
                    .lookup(&name, SymbolKind::Definition, LookupAction::Insert)
                    .unwrap();
                self.lang.symbols.get_mut(id).value = SymbolValue::Tree(Some(tree));
            }
        }

        if self.at_keyword("SCANNER") {
            self.bump();
            self.scanner_section()?;
        }

        // The end-of-file sentinel terminal closes the terminal numbering.
        let sentinel = self.declare_terminal("#eof");
        self.lang.sentinel = Some(sentinel);
        self.lang.scanner.push(ScannerRule {
            tree: TreeNode::EndOfFile,
            symbol: sentinel,
        });

        if self.at_keyword("DEFAULT") {
            self.bump();
            self.default_section()?;
        }

        if self.at_keyword("PARSER") {
            self.bump();
            self.parser_section()?;
        }

        if *self.peek() != TokenKind::Eof {
            return Err(self.fail("Unexpected text after the last section"));
        }

        self.finish();
        Ok(())
    }

    fn scanner_section(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek().clone() {
                TokenKind::Str(name) => {
                    self.bump();
                    if self.at_keyword("ALIAS") {
                        self.bump();
                        self.alias_rule(&name)?;
                    } else {
                        self.expect_punct('=')?;
                        let tree = self.regex()?;
                        let symbol = self.declare_terminal(&name);
                        if char_type(&tree) == CharType::Empty {
                            self.lang
                                .symbols
                                .token_mut(symbol)
                                .flags
                                .insert(TokenFlags::EMPTY);
                        }
                        self.attributes(symbol)?;
                        self.expect_punct(';')?;
                        self.lang.scanner.push(ScannerRule { tree, symbol });
                    }
                }
                TokenKind::Punct('=') => {
                    // An ignored regex: no token name, sentinel number
                    // assigned when the automaton is built.
                    self.bump();
                    let tree = self.regex()?;
                    self.expect_punct(';')?;
                    if char_type(&tree) == CharType::Empty {
                        self.lang
                            .error("An ignored regular expression matches nothing".to_owned());
                        continue;
                    }
                    self.unique += 1;
                    let name = format!("<{:06}>", self.unique);
                    let symbol = self
                        .lang
                        .symbols
                        .lookup(&name, SymbolKind::Terminal, LookupAction::Insert)
                        .unwrap();
                    self.lang.scanner.push(ScannerRule { tree, symbol });
                }
                _ => return Ok(()),
            }
        }
    }

    fn alias_rule(&mut self, name: &str) -> Result<(), SyntaxError> {
        let TokenKind::Str(base) = self.bump() else {
            return Err(self.fail("Expected the base terminal of the alias"));
        };
        let base_id = self
            .lang
            .symbols
            .lookup(&base, SymbolKind::Terminal, LookupAction::Lookup);
        let Some(base_id) = base_id else {
            self.lang.error(format!("Unknown alias base \"{}\"", base));
            self.skip_past(';')?;
            return Ok(());
        };
        if self
            .lang
            .symbols
            .token(base_id)
            .flags
            .contains(TokenFlags::ALIAS)
        {
            self.lang.error(format!("\"{}\" is an alias of an alias", name));
            self.skip_past(';')?;
            return Ok(());
        }

        let id = self
            .lang
            .symbols
            .lookup(name, SymbolKind::Terminal, LookupAction::Insert)
            .unwrap();
        if self.lang.symbols.get(id).alias.is_some() || self.lang.symbols.token(id).token != 0 {
            self.lang.error(format!("Duplicate token \"{}\"", name));
        }
        self.lang.symbols.get_mut(id).alias = Some(base_id);
        let base_token = self.lang.symbols.token(base_id).token;
        let value = self.lang.symbols.token_mut(id);
        value.token = base_token;
        value.flags.insert(TokenFlags::ALIAS);
        self.attributes(id)?;
        self.expect_punct(';')?;
        Ok(())
    }

    fn declare_terminal(&mut self, name: &str) -> SymbolId {
        let id = self
            .lang
            .symbols
            .lookup(name, SymbolKind::Terminal, LookupAction::Insert)
            .unwrap();
        if self.lang.symbols.token(id).token != 0
            || self.lang.symbols.token(id).flags.contains(TokenFlags::ALIAS)
        {
            self.lang.error(format!("Duplicate token \"{}\"", name));
            return id;
        }
        self.lang.terms.push(id);
        self.lang.symbols.token_mut(id).token = self.lang.terms.len() as i32;
        id
    }

    fn attributes(&mut self, symbol: SymbolId) -> Result<(), SyntaxError> {
        while self.eat_punct(',') {
            let TokenKind::Ident(attribute) = self.bump() else {
                return Err(self.fail("Expected a token attribute"));
            };
            match attribute.as_str() {
                "PRECEDENCE" => {
                    self.expect_punct('=')?;
                    let TokenKind::Number(value) = self.bump() else {
                        return Err(self.fail("Expected a precedence value"));
                    };
                    self.lang.symbols.token_mut(symbol).precedence = value;
                }
                "ASSOCIATIVITY" => {
                    self.expect_punct('=')?;
                    let TokenKind::Ident(which) = self.bump() else {
                        return Err(self.fail("Expected LEFT, RIGHT, or NONE"));
                    };
                    let flag = match which.as_str() {
                        "LEFT" => TokenFlags::LEFT,
                        "RIGHT" => TokenFlags::RIGHT,
                        "NONE" => TokenFlags::NONE,
                        _ => return Err(self.fail("Expected LEFT, RIGHT, or NONE")),
                    };
                    self.lang.symbols.token_mut(symbol).flags.insert(flag);
                }
                "INSERT" => {
                    self.expect_punct('=')?;
                    let TokenKind::Number(value) = self.bump() else {
                        return Err(self.fail("Expected an insertion cost"));
                    };
                    self.lang.symbols.token_mut(symbol).insert = value;
                }
                "DELETE" => {
                    self.expect_punct('=')?;
                    let TokenKind::Number(value) = self.bump() else {
                        return Err(self.fail("Expected a deletion cost"));
                    };
                    self.lang.symbols.token_mut(symbol).delete = value;
                }
                "INSTALL" => {
                    self.lang
                        .symbols
                        .token_mut(symbol)
                        .flags
                        .insert(TokenFlags::INSTALL);
                }
                "IGNORE" => {
                    let TokenKind::Ident(case) = self.bump() else {
                        return Err(self.fail("Expected CASE after IGNORE"));
                    };
                    if case != "CASE" {
                        return Err(self.fail("Expected CASE after IGNORE"));
                    }
                    self.lang
                        .symbols
                        .token_mut(symbol)
                        .flags
                        .insert(TokenFlags::CASE);
                }
                other => {
                    let message = format!("Unknown token attribute {}", other);
                    self.lang.error(message);
                }
            }
        }
        Ok(())
    }

    fn default_section(&mut self) -> Result<(), SyntaxError> {
        loop {
            if self.at_keyword("START") {
                self.bump();
                self.expect_punct('=')?;
                let TokenKind::Nonterm(name) = self.bump() else {
                    return Err(self.fail("Expected a nonterminal after START"));
                };
                let id = self
                    .lang
                    .symbols
                    .lookup(&name, SymbolKind::Nonterminal, LookupAction::Insert)
                    .unwrap();
                self.lang.start = Some(id);
            } else if self.at_keyword("COST") {
                self.bump();
                self.expect_punct('=')?;
                let TokenKind::Number(value) = self.bump() else {
                    return Err(self.fail("Expected a cost value"));
                };
                self.lang.options.default_cost = value;
            } else if self.at_keyword("CONTEXT") {
                self.bump();
                self.expect_punct('=')?;
                let TokenKind::Number(value) = self.bump() else {
                    return Err(self.fail("Expected a context depth"));
                };
                self.lang.options.context = value;
            } else {
                return Ok(());
            }
            self.expect_punct(';')?;
        }
    }

    fn parser_section(&mut self) -> Result<(), SyntaxError> {
        while let TokenKind::Nonterm(name) = self.peek().clone() {
            self.bump();
            self.expect_punct('=')?;
            let lhs = self
                .lang
                .symbols
                .lookup(&name, SymbolKind::Nonterminal, LookupAction::Insert)
                .unwrap();

            let mut alts = Vec::new();
            loop {
                let mut alt = AltAst::default();
                loop {
                    match self.peek().clone() {
                        TokenKind::Str(terminal) => {
                            self.bump();
                            let id = self
                                .lang
                                .symbols
                                .lookup(&terminal, SymbolKind::Terminal, LookupAction::Lookup);
                            match id {
                                Some(id) => alt.items.push(id),
                                None => {
                                    self.lang
                                        .error(format!("Undefined terminal \"{}\"", terminal));
                                    let id = self.declare_terminal(&terminal);
                                    alt.items.push(id);
                                }
                            }
                        }
                        TokenKind::Nonterm(nonterminal) => {
                            self.bump();
                            let id = self
                                .lang
                                .symbols
                                .lookup(
                                    &nonterminal,
                                    SymbolKind::Nonterminal,
                                    LookupAction::Insert,
                                )
                                .unwrap();
                            alt.items.push(id);
                        }
                        TokenKind::Semantic(number) => {
                            self.bump();
                            alt.semantic = number;
                        }
                        _ => break,
                    }
                }
                alts.push(alt);
                if !self.eat_punct('|') {
                    break;
                }
            }
            self.expect_punct(';')?;
            self.lang.grammar.push(ProductionAst { lhs, alts });
        }
        Ok(())
    }

    // ---- regular expressions ----

    fn regex(&mut self) -> Result<TreeNode, SyntaxError> {
        let mut choices = vec![self.concat()?];
        while self.eat_punct('|') {
            choices.push(self.concat()?);
        }
        if choices.len() == 1 {
            Ok(choices.pop().unwrap())
        } else {
            Ok(TreeNode::Alt(choices))
        }
    }

    fn concat(&mut self) -> Result<TreeNode, SyntaxError> {
        let mut children = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Punct('/') => {
                    self.bump();
                    children.push(TreeNode::Lookahead);
                }
                TokenKind::Str(_)
                | TokenKind::Class(_)
                | TokenKind::Ident(_)
                | TokenKind::Punct('(')
                | TokenKind::Punct('{')
                | TokenKind::Punct('~') => {
                    children.push(self.diff()?);
                }
                _ => break,
            }
        }
        match children.len() {
            0 => Ok(TreeNode::Epsilon),
            1 => Ok(children.pop().unwrap()),
            _ => Ok(TreeNode::Concat(children)),
        }
    }

    fn diff(&mut self) -> Result<TreeNode, SyntaxError> {
        let mut tree = self.postfix()?;
        loop {
            if self.eat_punct('-') {
                let right = self.postfix()?;
                tree = TreeNode::Diff(Box::new(tree), Box::new(right));
            } else if self.eat_punct(':') {
                let right = self.postfix()?;
                tree = TreeNode::Range(Box::new(tree), Box::new(right));
            } else {
                return Ok(tree);
            }
        }
    }

    fn postfix(&mut self) -> Result<TreeNode, SyntaxError> {
        let mut tree = self.primary()?;
        loop {
            if self.eat_punct('*') {
                tree = TreeNode::Star(Box::new(tree));
            } else if self.eat_punct('+') {
                tree = TreeNode::Plus(Box::new(tree));
            } else {
                return Ok(tree);
            }
        }
    }

    fn primary(&mut self) -> Result<TreeNode, SyntaxError> {
        match self.peek().clone() {
            TokenKind::Str(text) => {
                self.bump();
                Ok(TreeNode::Character(decode_string(&text)))
            }
            TokenKind::Class(bits) => {
                self.bump();
                Ok(TreeNode::Class(bits))
            }
            TokenKind::Ident(name) => {
                self.bump();
                let id = self
                    .lang
                    .symbols
                    .lookup(&name, SymbolKind::Definition, LookupAction::Lookup);
                match id {
                    Some(id) => match &self.lang.symbols.get(id).value {
                        SymbolValue::Tree(Some(tree)) => Ok(tree.clone()),
                        _ => {
                            self.lang.error(format!("Undefined definition {}", name));
                            Ok(TreeNode::Epsilon)
                        }
                    },
                    None => {
                        self.lang.error(format!("Undefined definition {}", name));
                        Ok(TreeNode::Epsilon)
                    }
                }
            }
            TokenKind::Punct('(') => {
                self.bump();
                let tree = self.regex()?;
                self.expect_punct(')')?;
                Ok(tree)
            }
            TokenKind::Punct('{') => {
                self.bump();
                let tree = self.regex()?;
                self.expect_punct('}')?;
                if let TokenKind::Number(low) = self.peek().clone() {
                    self.bump();
                    self.expect_punct(':')?;
                    let TokenKind::Number(high) = self.bump() else {
                        return Err(self.fail("Expected the repetition upper bound"));
                    };
                    if high < low {
                        return Err(self.fail("Invalid repetition range"));
                    }
                    Ok(TreeNode::Repeat(Box::new(tree), low as u32, high as u32))
                } else {
                    Ok(tree)
                }
            }
            TokenKind::Punct('~') => {
                self.bump();
                let tree = self.primary()?;
                Ok(TreeNode::Complement(Box::new(tree)))
            }
            _ => Err(self.fail("Expected a regular expression")),
        }
    }

    // ---- finishing ----

    fn skip_past(&mut self, ch: char) -> Result<(), SyntaxError> {
        loop {
            if *self.peek() == TokenKind::Eof {
                return Err(self.fail(format!("Expected '{}'", ch)));
            }
            if self.bump() == TokenKind::Punct(ch) {
                return Ok(());
            }
        }
    }

    /// Number the nonterminals and augment the grammar with the goal
    /// production.
    fn finish(&mut self) {
        if self.lang.grammar.is_empty() {
            return;
        }

        let goal = self
            .lang
            .symbols
            .lookup("Goal", SymbolKind::Nonterminal, LookupAction::Insert)
            .unwrap();
        self.lang.goal = Some(goal);

        let start = self
            .lang
            .start
            .unwrap_or_else(|| self.lang.grammar[0].lhs);
        self.lang.start = Some(start);

        let sentinel = self.lang.sentinel.unwrap();
        self.lang.grammar.insert(
            0,
            ProductionAst {
                lhs: goal,
                alts: vec![AltAst {
                    items: vec![start, sentinel],
                    semantic: 0,
                }],
            },
        );

        // Left hand sides are numbered in order of appearance; anything
        // used only on a right hand side is undefined but still numbered so
        // the listings stay readable.
        let termcount = self.lang.termcount();
        let mut number = |lang: &mut Language, id: SymbolId| {
            if lang.symbols.token(id).token == 0 {
                lang.nonterms.push(id);
                lang.symbols.token_mut(id).token = termcount + lang.nonterms.len() as i32;
            }
        };
        let grammar = self.lang.grammar.clone();
        for ast in &grammar {
            number(&mut self.lang, ast.lhs);
        }
        for ast in &grammar {
            for alt in &ast.alts {
                for &item in &alt.items {
                    if self.lang.kind_of(item) == SymbolKind::Nonterminal
                        && self.lang.symbols.token(item).token == 0
                    {
                        let name = self.lang.symbols.get(item).name.clone();
                        self.lang
                            .error(format!("Undefined nonterminal <{}>", name));
                        number(&mut self.lang, item);
                    }
                }
            }
        }
    }
}
