//! Stage boundary records.
//!
//! Stages exchange newline-delimited `<key><TAB><value>` lines. Downstream
//! stages accept more than one upstream format, so a line is first classified
//! into a [`ParsedRecord`] by its structure:
//!
//! | input | variant |
//! |---|---|
//! | `(book_id,year)<TAB or space>text` | [`ParsedRecord::Preprocessed`] |
//! | `book_id,title,year<TAB>text` | [`ParsedRecord::Preprocessed`] with a title |
//! | `book_id<TAB>lemma<TAB>year[<TAB>count]` | [`ParsedRecord::Lemma`] |
//! | anything else | [`ParsedRecord::Unrecognized`] |

/// One classified input line. Borrows from the line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecord<'a> {
    /// Text keyed by book and year, as written by preprocessing (or by
    /// sentiment scoring, where the text is the score).
    Preprocessed {
        book_id: &'a str,
        title: Option<&'a str>,
        year: i32,
        text: &'a str,
    },
    /// A lemma-frequency row.
    Lemma {
        book_id: &'a str,
        lemma: &'a str,
        year: i32,
        frequency: Option<u64>,
    },
    Unrecognized,
}

impl<'a> ParsedRecord<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(rest) = line.strip_prefix('(') {
            return Self::parse_parenthesized(rest).unwrap_or(Self::Unrecognized);
        }
        if line.contains('\t') {
            return Self::parse_columns(line).unwrap_or(Self::Unrecognized);
        }
        Self::Unrecognized
    }

    // `book_id,year)` followed by the text
    fn parse_parenthesized(rest: &'a str) -> Option<Self> {
        let (inner, text) = rest.split_once(')')?;
        let (book_id, year) = inner.split_once(',')?;
        if year.contains(',') {
            return None;
        }
        let book_id = non_empty(book_id.trim())?;
        let year = year.trim().parse().ok()?;
        Some(Self::Preprocessed {
            book_id,
            title: None,
            year,
            text: text.trim(),
        })
    }

    fn parse_columns(line: &'a str) -> Option<Self> {
        let columns: Vec<&str> = line.split('\t').collect();
        match columns.as_slice() {
            [key, text] => {
                let (head, year) = key.rsplit_once(',')?;
                let (book_id, title) = head.split_once(',')?;
                Some(Self::Preprocessed {
                    book_id: non_empty(book_id.trim())?,
                    title: Some(title.trim()),
                    year: year.trim().parse().ok()?,
                    text: text.trim(),
                })
            }
            [book_id, lemma, year, rest @ ..] => {
                let frequency = match rest.first() {
                    Some(count) => Some(count.trim().parse().ok()?),
                    None => None,
                };
                Some(Self::Lemma {
                    book_id: non_empty(book_id.trim())?,
                    lemma: lemma.trim(),
                    year: year.trim().parse().ok()?,
                    frequency,
                })
            }
            _ => None,
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parenthesized_prefix_is_preprocessed() {
        assert_eq!(
            ParsedRecord::parse("(PG2701,1851)\twhale great whale"),
            ParsedRecord::Preprocessed {
                book_id: "PG2701",
                title: None,
                year: 1851,
                text: "whale great whale",
            }
        );
        assert_eq!(
            ParsedRecord::parse("(PG2701, 1851) call me ishmael\r"),
            ParsedRecord::Preprocessed {
                book_id: "PG2701",
                title: None,
                year: 1851,
                text: "call me ishmael",
            }
        );
    }

    #[test]
    fn preprocessing_output_is_preprocessed() {
        assert_eq!(
            ParsedRecord::parse("2701,Moby Dick,1851\tcall me ishmael"),
            ParsedRecord::Preprocessed {
                book_id: "2701",
                title: Some("Moby Dick"),
                year: 1851,
                text: "call me ishmael",
            }
        );
    }

    #[test]
    fn tab_columns_are_lemma_rows() {
        assert_eq!(
            ParsedRecord::parse("PG2701\twhale\t1851\t12"),
            ParsedRecord::Lemma {
                book_id: "PG2701",
                lemma: "whale",
                year: 1851,
                frequency: Some(12),
            }
        );
        assert_eq!(
            ParsedRecord::parse("PG2701\twhale\t1851"),
            ParsedRecord::Lemma {
                book_id: "PG2701",
                lemma: "whale",
                year: 1851,
                frequency: None,
            }
        );
    }

    #[test]
    fn malformed_lines_are_unrecognized() {
        for line in [
            "",
            "just some text",
            "(PG2701 1851) no comma",
            "(PG2701,eighteen) bad year",
            "(PG2701,1851 never closed",
            "(a,b,1851) too many fields",
            "(,1851) empty id",
            "PG2701\twhale\tlater\t3",
            "PG2701\twhale\t1851\tmany",
            "no-commas\ttext",
            "2701,Moby Dick,year\ttext",
        ] {
            assert_eq!(ParsedRecord::parse(line), ParsedRecord::Unrecognized, "{line:?}");
        }
    }
}
