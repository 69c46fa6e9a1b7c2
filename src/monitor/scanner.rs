// Tokenizer for the monitor feed: words, quoted strings, explicit EOL

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

const READ_CHUNK: usize = 4096;

/// One lexical unit of the monitor feed. End of line and end of stream
/// are ordinary tokens, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Eol,
    Eof,
}

/// Splits the front of `data` into one token.
///
/// Returns `(consumed, token)`. A `None` token with `at_eof == false`
/// means more bytes are needed before a decision can be made; the
/// consumed count then only covers leading whitespace. With
/// `at_eof == true` a `None` token means the stream is exhausted.
///
/// A `"\n"` token is the end-of-line sentinel. A quote opens a quoted
/// run that may contain spaces and `\"` escapes; quoted and literal
/// segments concatenate into a single word (`foo"bar baz"qux`).
fn split(data: &[u8], at_eof: bool) -> Result<(usize, Option<String>)> {
    let mut start = 0;
    while start < data.len() && (data[start] == b' ' || data[start] == b'\r') {
        start += 1;
    }

    if start < data.len() && data[start] == b'\n' {
        return Ok((start + 1, Some("\n".to_string())));
    }

    let mut token: Vec<u8> = Vec::new();
    let mut i = start;
    while i < data.len() {
        match data[i] {
            b' ' | b'\r' | b'\n' => {
                return Ok((i, Some(into_word(token))));
            }
            b'\\' if i + 1 < data.len() && data[i + 1] == b'"' => {
                token.push(b'"');
                i += 2;
            }
            b'"' => {
                i += 1;
                loop {
                    if i >= data.len() {
                        // The closing quote has not arrived yet.
                        if at_eof {
                            return Err(Error::UnterminatedString);
                        }
                        return Ok((start, None));
                    }
                    match data[i] {
                        b'"' => {
                            i += 1;
                            break;
                        }
                        b'\\' if i + 1 < data.len() && data[i + 1] == b'"' => {
                            token.push(b'"');
                            i += 2;
                        }
                        c => {
                            token.push(c);
                            i += 1;
                        }
                    }
                }
            }
            c => {
                token.push(c);
                i += 1;
            }
        }
    }

    if !at_eof {
        // No delimiter seen; the word may continue in the next read.
        return Ok((start, None));
    }
    if i > start {
        return Ok((i, Some(into_word(token))));
    }
    Ok((start, None))
}

fn into_word(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Incremental tokenizer over a byte stream. Knows nothing about field
/// schemas; it only produces words, EOL markers, and EOF.
#[derive(Debug)]
pub struct Scanner<R> {
    reader: R,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Scanner {
            reader,
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Produce the next token, reading more bytes as needed. Once `Eof`
    /// has been returned, every later call returns `Eof` again.
    pub async fn next(&mut self) -> Result<Token> {
        loop {
            let (consumed, word) = split(&self.buf, self.eof)?;
            self.buf.drain(..consumed);
            match word {
                Some(w) if w == "\n" => return Ok(Token::Eol),
                Some(w) => return Ok(Token::Word(w)),
                None => {
                    if self.eof {
                        return Ok(Token::Eof);
                    }
                    let mut chunk = [0u8; READ_CHUNK];
                    let n = self.reader.read(&mut chunk).await?;
                    if n == 0 {
                        self.eof = true;
                    } else {
                        self.buf.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn words(input: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(input.as_bytes());
        let mut out = Vec::new();
        loop {
            let token = scanner.next().await.expect("scan failed");
            let done = token == Token::Eof;
            out.push(token);
            if done {
                break;
            }
        }
        out
    }

    #[tokio::test]
    async fn test_plain_words_and_eol() {
        assert_eq!(
            words("add route r1\n").await,
            vec![
                Token::Word("add".to_string()),
                Token::Word("route".to_string()),
                Token::Word("r1".to_string()),
                Token::Eol,
                Token::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_spaces_and_carriage_returns() {
        assert_eq!(
            words("  a \r b\r\n").await,
            vec![
                Token::Word("a".to_string()),
                Token::Word("b".to_string()),
                Token::Eol,
                Token::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn test_word_at_eof_without_newline() {
        assert_eq!(
            words("last").await,
            vec![Token::Word("last".to_string()), Token::Eof]
        );
    }

    #[tokio::test]
    async fn test_quoted_word_with_spaces() {
        assert_eq!(
            words("host \"my router\"\n").await,
            vec![
                Token::Word("host".to_string()),
                Token::Word("my router".to_string()),
                Token::Eol,
                Token::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn test_escaped_quote_inside_quotes() {
        assert_eq!(
            words("\"say \\\"hi\\\"\"\n").await,
            vec![
                Token::Word("say \"hi\"".to_string()),
                Token::Eol,
                Token::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn test_concatenated_segments() {
        assert_eq!(
            words("foo\"bar baz\"qux\n").await,
            vec![
                Token::Word("foobar bazqux".to_string()),
                Token::Eol,
                Token::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn test_newline_inside_quotes_is_literal() {
        assert_eq!(
            words("\"a\nb\"\n").await,
            vec![Token::Word("a\nb".to_string()), Token::Eol, Token::Eof]
        );
    }

    #[tokio::test]
    async fn test_unterminated_string_at_eof() {
        let mut scanner = Scanner::new("\"never closed".as_bytes());
        assert!(matches!(
            scanner.next().await,
            Err(Error::UnterminatedString)
        ));
    }

    #[test]
    fn test_split_requests_more_data_for_open_quote() {
        // Mid-stream an open quote is not an error, only a request for
        // more bytes.
        let (consumed, token) = split(b"  \"partial", false).expect("split failed");
        assert_eq!(consumed, 2);
        assert_eq!(token, None);
    }

    #[test]
    fn test_split_requests_more_data_for_partial_word() {
        let (consumed, token) = split(b" par", false).expect("split failed");
        assert_eq!(consumed, 1);
        assert_eq!(token, None);
    }

    #[tokio::test]
    async fn test_eof_is_sticky() {
        let mut scanner = Scanner::new("x".as_bytes());
        assert_eq!(
            scanner.next().await.expect("scan failed"),
            Token::Word("x".to_string())
        );
        assert_eq!(scanner.next().await.expect("scan failed"), Token::Eof);
        assert_eq!(scanner.next().await.expect("scan failed"), Token::Eof);
    }
}
