use std::fmt;
use std::rc::Rc;

/// A single argument handed to a task.
///
/// The raw token text is kept as parsed, quotes included. Quote detection and
/// stripping are views over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    content: String,
    quotes: Rc<[char]>,
}

impl Argument {
    pub fn new(content: impl Into<String>, quotes: Rc<[char]>) -> Self {
        Self {
            content: content.into(),
            quotes,
        }
    }

    /// Raw text of the argument.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The quote character enclosing the argument, if any.
    pub fn quoted_by(&self) -> Option<char> {
        quoted_by(&self.content, &self.quotes)
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted_by().is_some()
    }

    /// The argument without its enclosing quotes.
    pub fn trim_quotes(&self) -> &str {
        trim_quotes(&self.content, &self.quotes)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl AsRef<str> for Argument {
    fn as_ref(&self) -> &str {
        &self.content
    }
}

/// Returns the quote character `content` starts and ends with.
pub(crate) fn quoted_by(content: &str, quotes: &[char]) -> Option<char> {
    let mut chars = content.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    (quotes.contains(&first) && last == first).then_some(first)
}

pub(crate) fn trim_quotes<'a>(content: &'a str, quotes: &[char]) -> &'a str {
    match quoted_by(content, quotes) {
        Some(q) => &content[q.len_utf8()..content.len() - q.len_utf8()],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(content: &str) -> Argument {
        Argument::new(content, Rc::from(vec!['"', '\'']))
    }

    #[test]
    fn test_quoted_argument() {
        let a = arg("\"prod east\"");
        assert_eq!(a.quoted_by(), Some('"'));
        assert!(a.is_quoted());
        assert_eq!(a.trim_quotes(), "prod east");
        assert_eq!(a.content(), "\"prod east\"");
    }

    #[test]
    fn test_unquoted_and_mismatched() {
        assert_eq!(arg("plain").quoted_by(), None);
        assert_eq!(arg("plain").trim_quotes(), "plain");
        assert_eq!(arg("'mixed\"").quoted_by(), None);
        assert_eq!(arg("\"").quoted_by(), None);
        assert_eq!(arg("").quoted_by(), None);
        assert_eq!(arg("''").trim_quotes(), "");
    }

    #[test]
    fn test_quoting_disabled() {
        let a = Argument::new("\"x\"", Rc::from(Vec::<char>::new()));
        assert!(!a.is_quoted());
        assert_eq!(a.trim_quotes(), "\"x\"");
    }

    #[test]
    fn test_multibyte_quotes() {
        let a = Argument::new("«élan»", Rc::from(vec!['«']));
        assert_eq!(a.quoted_by(), None);
        let a = Argument::new("«élan«", Rc::from(vec!['«']));
        assert_eq!(a.trim_quotes(), "élan");
    }
}
