use super::errors::CommandError;

/// Left-to-right tokenizer over the text that follows a command prefix.
///
/// Tokens are separated by spaces or newlines. A token that opens with `"`
/// or `'` runs verbatim to the matching quote. The last token read can be
/// pushed back once with [`undo`](Self::undo).
#[derive(Debug, Clone)]
pub struct StringView<'a> {
    input: &'a str,
    pos: usize,
    last: Option<String>,
    undone: bool,
}

fn is_separator(c: char) -> bool {
    c == ' ' || c == '\n'
}

impl<'a> StringView<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            last: None,
            undone: false,
        }
    }

    fn skip_separators(&mut self) {
        let rest = &self.input[self.pos..];
        let trimmed = rest.trim_start_matches(is_separator);
        self.pos += rest.len() - trimmed.len();
    }

    /// Read the next token; `Ok(None)` at end of input.
    pub fn next_word(&mut self) -> Result<Option<String>, CommandError> {
        if self.undone {
            self.undone = false;
            return Ok(self.last.clone());
        }

        self.skip_separators();
        let rest = &self.input[self.pos..];
        let Some(first) = rest.chars().next() else {
            self.last = None;
            return Ok(None);
        };

        let word = if first == '"' || first == '\'' {
            let body = &rest[first.len_utf8()..];
            let Some(end) = body.find(first) else {
                return Err(CommandError::UnterminatedQuote { quote: first });
            };
            self.pos += first.len_utf8() + end + first.len_utf8();
            body[..end].to_string()
        } else {
            let end = rest.find(is_separator).unwrap_or(rest.len());
            self.pos += end;
            rest[..end].to_string()
        };

        self.last = Some(word.clone());
        Ok(Some(word))
    }

    /// Push the last token back so the next read returns it again.
    /// Has no effect before the first read or twice in a row.
    pub fn undo(&mut self) {
        if self.last.is_some() {
            self.undone = true;
        }
    }

    /// Consume and return everything not yet read, without leading separators.
    /// A pushed-back token is included, joined to the remainder by one space.
    pub fn get_rest(&mut self) -> String {
        self.skip_separators();
        let rest = &self.input[self.pos..];
        self.pos = self.input.len();

        let pushed_back = if self.undone { self.last.take() } else { None };
        self.undone = false;

        match pushed_back {
            Some(token) if rest.is_empty() => token,
            Some(token) => format!("{token} {rest}"),
            None => rest.to_string(),
        }
    }

    pub fn is_eof(&self) -> bool {
        !self.undone && self.input[self.pos..].trim_start_matches(is_separator).is_empty()
    }
}
