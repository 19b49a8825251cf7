//! Lexical analysis: turns raw text into statements.
//!
//! The tokenizer is stateful across calls. When an end-of-statement character
//! is configured, an unterminated statement is kept as a remainder and
//! continued by the next call, which lets one command span several lines.

use crate::config::ParserConfig;
use std::mem;

/// One unit produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A command invocation: the command name followed by its raw tokens.
    Command(Vec<String>),
    /// The block-open character.
    BlockStart,
    /// The block-close character.
    BlockEnd,
}

/// Stateful tokenizer for one grammar.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    quotes: Vec<char>,
    delimiter: char,
    escape: Option<char>,
    end_of_statement: Option<char>,
    block_chars: Option<(char, char)>,
    in_quotes: Vec<char>,
    remaining: Vec<String>,
}

/// Buffers of a single `feed` call.
#[derive(Default)]
struct Pending {
    token: String,
    statement: Vec<String>,
    out: Vec<Statement>,
}

impl Pending {
    fn flush_token(&mut self) {
        let token = self.token.trim();
        if !token.is_empty() {
            self.statement.push(token.to_string());
        }
        self.token.clear();
    }

    fn seal(&mut self) {
        if !self.statement.is_empty() {
            self.out
                .push(Statement::Command(mem::take(&mut self.statement)));
        }
    }
}

impl Tokenizer {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            quotes: config.quotes().to_vec(),
            delimiter: config.delimiter(),
            escape: config.escape(),
            end_of_statement: config.end_of_statement(),
            block_chars: config.block_chars(),
            in_quotes: Vec::new(),
            remaining: Vec::new(),
        }
    }

    /// Tokenizes `text` and returns the completed statements together with the
    /// tokens of the statement still waiting for its terminator.
    ///
    /// The remainder is also kept internally and resumed by the next call.
    pub fn feed(&mut self, text: &str) -> (Vec<Statement>, Vec<String>) {
        let mut pending = Pending {
            statement: mem::take(&mut self.remaining),
            ..Pending::default()
        };
        // Inside an open quote the last pending token continues on this line.
        if !self.in_quotes.is_empty() {
            if let Some(last) = pending.statement.pop() {
                pending.token = last;
            }
        }

        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\n' || c == '\r' {
                continue;
            }

            if self.is_quote(c) {
                self.switch_in_quotes(c);
                pending.token.push(c);
                if self.in_quotes.is_empty() {
                    pending.flush_token();
                }
                continue;
            }

            if self.in_quotes.is_empty() {
                if let Some((open, close)) = self.block_chars {
                    if c == open || c == close {
                        pending.flush_token();
                        pending.seal();
                        pending.out.push(if c == open {
                            Statement::BlockStart
                        } else {
                            Statement::BlockEnd
                        });
                        continue;
                    }
                }
            }

            if Some(c) == self.escape {
                // A trailing escape has nothing to escape and is dropped.
                if let Some(escaped) = chars.next() {
                    if self.is_quote(escaped) {
                        pending.token.push(c);
                    }
                    pending.token.push(escaped);
                }
                continue;
            }

            let is_eos = Some(c) == self.end_of_statement;
            if (c == self.delimiter || is_eos) && self.in_quotes.is_empty() {
                pending.flush_token();
                if is_eos {
                    pending.seal();
                }
            } else if !self.in_quotes.is_empty() || c != ' ' {
                pending.token.push(c);
            }
        }

        if !self.in_quotes.is_empty() {
            // Keep the open quoted token verbatim so nothing is lost.
            if !pending.token.is_empty() {
                pending.statement.push(mem::take(&mut pending.token));
            }
            self.remaining = pending.statement;
        } else {
            pending.flush_token();
            if self.end_of_statement.is_none() {
                pending.seal();
            } else {
                self.remaining = pending.statement;
            }
        }

        (pending.out, self.remaining.clone())
    }

    /// Tokens of the statement awaiting its terminator.
    pub fn remainder(&self) -> &[String] {
        &self.remaining
    }

    /// `true` when no statement is waiting for more input.
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Drops the pending remainder and any open quote.
    pub fn reset(&mut self) {
        self.remaining.clear();
        self.in_quotes.clear();
    }

    fn is_quote(&self, c: char) -> bool {
        self.quotes.contains(&c)
    }

    fn switch_in_quotes(&mut self, q: char) {
        if self.in_quotes.last() == Some(&q) {
            self.in_quotes.pop();
        } else {
            self.in_quotes.push(q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cmd(tokens: &[&str]) -> Statement {
        Statement::Command(tokens.iter().map(|s| s.to_string()).collect())
    }

    fn tokenizer(config: ParserConfig) -> Tokenizer {
        Tokenizer::new(&config)
    }

    #[test]
    fn test_splits_on_delimiter() {
        let mut t = tokenizer(ParserConfig::default());
        let (statements, rest) = t.feed("deploy  -f   prod ");
        assert_eq!(statements, vec![cmd(&["deploy", "-f", "prod"])]);
        assert!(rest.is_empty());
        assert!(t.is_complete());
    }

    #[test]
    fn test_blank_input_yields_nothing() {
        let mut t = tokenizer(ParserConfig::default());
        assert!(t.feed("   ").0.is_empty());
        assert!(t.feed("").0.is_empty());
    }

    #[test]
    fn test_newlines_are_ignored() {
        let mut t = tokenizer(ParserConfig::default());
        let (statements, _) = t.feed("ab\r\ncd ef\n");
        assert_eq!(statements, vec![cmd(&["abcd", "ef"])]);
    }

    #[test]
    fn test_quoted_token_keeps_quotes_and_delimiters() {
        let mut t = tokenizer(ParserConfig::new().with_quotes("\"'"));
        let (statements, _) = t.feed("say \"hello  world\" 'it \"is\" fine'");
        assert_eq!(
            statements,
            vec![cmd(&["say", "\"hello  world\"", "'it \"is\" fine'"])]
        );
    }

    #[test]
    fn test_quote_closing_seals_token() {
        let mut t = tokenizer(ParserConfig::new().with_quotes("\""));
        let (statements, _) = t.feed("a\"b c\"d");
        assert_eq!(statements, vec![cmd(&["a\"b c\"", "d"])]);
    }

    #[test]
    fn test_quotes_disabled_are_plain_characters() {
        let mut t = tokenizer(ParserConfig::default());
        let (statements, _) = t.feed("say \"a b\"");
        assert_eq!(statements, vec![cmd(&["say", "\"a", "b\""])]);
    }

    #[test]
    fn test_unterminated_quote_stays_pending() {
        let mut t = tokenizer(ParserConfig::new().with_quotes("\""));
        let (statements, rest) = t.feed("say \"hello ");
        assert!(statements.is_empty());
        assert_eq!(rest, vec!["say".to_string(), "\"hello ".to_string()]);
        assert!(!t.is_complete());

        let (statements, rest) = t.feed("world\" now");
        assert_eq!(statements, vec![cmd(&["say", "\"hello world\"", "now"])]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_escape_rules() {
        let mut t = tokenizer(ParserConfig::new().with_quotes("\""));
        let (statements, _) = t.feed(r#"a\ b \\ \" \x"#);
        assert_eq!(statements, vec![cmd(&["a b", "\\", "\\\"", "x"])]);
    }

    #[test]
    fn test_escaped_quote_does_not_open_quoting() {
        let mut t = tokenizer(ParserConfig::new().with_quotes("\""));
        let (statements, rest) = t.feed(r#"say \"x y"#);
        assert_eq!(statements, vec![cmd(&["say", "\\\"x", "y"])]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_trailing_escape_is_dropped() {
        let mut t = tokenizer(ParserConfig::default());
        let (statements, _) = t.feed("a b\\");
        assert_eq!(statements, vec![cmd(&["a", "b"])]);
    }

    #[test]
    fn test_escape_disabled() {
        let mut t = tokenizer(ParserConfig::new().with_escape(None));
        let (statements, _) = t.feed(r"a\ b");
        assert_eq!(statements, vec![cmd(&["a\\", "b"])]);
    }

    #[test]
    fn test_end_of_statement_splits_and_continues() {
        let mut t = tokenizer(ParserConfig::new().with_end_of_statement(Some(';')));
        let (statements, rest) = t.feed("a 1; b 2;; c");
        assert_eq!(statements, vec![cmd(&["a", "1"]), cmd(&["b", "2"])]);
        assert_eq!(rest, vec!["c".to_string()]);

        let (statements, rest) = t.feed("3 4;");
        assert_eq!(statements, vec![cmd(&["c", "3", "4"])]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_end_of_statement_inside_quotes_is_literal() {
        let config = ParserConfig::new()
            .with_quotes("'")
            .with_end_of_statement(Some(';'));
        let mut t = tokenizer(config);
        let (statements, _) = t.feed("echo 'a;b';");
        assert_eq!(statements, vec![cmd(&["echo", "'a;b'"])]);
    }

    #[test]
    fn test_custom_delimiter_drops_bare_spaces() {
        let mut t = tokenizer(ParserConfig::new().with_delimiter(','));
        let (statements, _) = t.feed("set, a b ,c");
        assert_eq!(statements, vec![cmd(&["set", "ab", "c"])]);
    }

    #[test]
    fn test_blocks_are_structural_statements() {
        let config = ParserConfig::new()
            .with_end_of_statement(Some(';'))
            .with_block_chars("{}")
            .unwrap();
        let mut t = tokenizer(config);
        let (statements, rest) = t.feed("outer x{inner 1; inner 2}done;");
        assert_eq!(
            statements,
            vec![
                cmd(&["outer", "x"]),
                Statement::BlockStart,
                cmd(&["inner", "1"]),
                cmd(&["inner", "2"]),
                Statement::BlockEnd,
                cmd(&["done"]),
            ]
        );
        assert!(rest.is_empty());
    }

    #[test]
    fn test_block_chars_inside_quotes_or_escaped_are_literal() {
        let config = ParserConfig::new()
            .with_quotes("\"")
            .with_block_chars("{}")
            .unwrap();
        let mut t = tokenizer(config);
        let (statements, _) = t.feed(r#"a "{x}" \{"#);
        assert_eq!(statements, vec![cmd(&["a", "\"{x}\"", "{"])]);
    }

    #[test]
    fn test_reset_clears_pending_state() {
        let mut t = tokenizer(
            ParserConfig::new()
                .with_quotes("\"")
                .with_end_of_statement(Some(';')),
        );
        t.feed("a \"open");
        assert!(!t.is_complete());
        t.reset();
        assert!(t.is_complete());
        let (statements, _) = t.feed("b;");
        assert_eq!(statements, vec![cmd(&["b"])]);
    }

    proptest! {
        #[test]
        fn plain_text_matches_split_and_trim(text in "[a-z0-9\\t -]{0,48}") {
            let mut t = tokenizer(ParserConfig::default());
            let (statements, rest) = t.feed(&text);
            let expected: Vec<String> = text
                .split(' ')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            prop_assert!(rest.is_empty());
            if expected.is_empty() {
                prop_assert!(statements.is_empty());
            } else {
                prop_assert_eq!(statements, vec![Statement::Command(expected)]);
            }
        }
    }
}
