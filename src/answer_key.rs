use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;

use crate::error::Error;

/// The correct option letter per question, dense over `1..=N`. Loaded once
/// per batch run and immutable afterwards. Consumes the normalized
/// `question -> letter` mapping produced upstream; parsing spreadsheet or
/// PDF sources is the normalizer's job, not ours.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    answers: Vec<char>,
}

impl AnswerKey {
    /// Loads an answer key from a JSON object (`{"1": "A", ...}`) or a
    /// comma/tab delimited file with optional `Question,CorrectOption`
    /// header. Any format violation is fatal for the run.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::AnswerKeyIo {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let key = match extension.as_deref() {
            Some("json") => Self::from_json_str(&text, path)?,
            Some("csv" | "tsv" | "txt") => Self::from_delimited_str(&text, path)?,
            _ => {
                return Err(Error::AnswerKeyFormat {
                    path: path.to_path_buf(),
                    message: "unrecognized answer key format (expected .json, .csv, .tsv or .txt)"
                        .to_string(),
                })
            }
        };

        info!(
            "loaded answer key with {} question(s) from {}",
            key.num_questions(),
            path.display()
        );
        Ok(key)
    }

    fn from_json_str(text: &str, path: &Path) -> Result<Self, Error> {
        let entries: BTreeMap<u32, String> =
            serde_json::from_str(text).map_err(|e| Error::AnswerKeyFormat {
                path: path.to_path_buf(),
                message: format!("not a question-to-letter JSON object: {e}"),
            })?;
        Self::from_entries(entries, path)
    }

    fn from_delimited_str(text: &str, path: &Path) -> Result<Self, Error> {
        let format_error = |message: String| Error::AnswerKeyFormat {
            path: path.to_path_buf(),
            message,
        };

        let mut entries = BTreeMap::new();
        for (line_index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split(|c| c == ',' || c == '\t').map(str::trim);
            let question_field = fields.next().unwrap_or_default();
            let answer_field = fields
                .next()
                .ok_or_else(|| format_error(format!("line {}: missing answer column", line_index + 1)))?;

            let question = match question_field.parse::<u32>() {
                Ok(question) => question,
                // Tolerate a single header row.
                Err(_) if line_index == 0 => continue,
                Err(_) => {
                    return Err(format_error(format!(
                        "line {}: question number `{question_field}` is not an integer",
                        line_index + 1
                    )))
                }
            };

            if entries.insert(question, answer_field.to_string()).is_some() {
                return Err(format_error(format!("duplicate entry for question {question}")));
            }
        }

        Self::from_entries(entries, path)
    }

    fn from_entries(entries: BTreeMap<u32, String>, path: &Path) -> Result<Self, Error> {
        let format_error = |message: String| Error::AnswerKeyFormat {
            path: path.to_path_buf(),
            message,
        };

        if entries.is_empty() {
            return Err(format_error("no answer entries found".to_string()));
        }

        let mut answers = Vec::with_capacity(entries.len());
        for (index, (question, raw)) in entries.iter().enumerate() {
            if *question != index as u32 + 1 {
                return Err(format_error(format!(
                    "question numbers must be dense starting at 1; expected {}, found {}",
                    index + 1,
                    question
                )));
            }

            let letter = normalize_answer_cell(raw);
            let mut chars = letter.chars();
            match (chars.next(), chars.next()) {
                (Some(letter), None) if letter.is_ascii_alphabetic() => answers.push(letter),
                _ => {
                    return Err(format_error(format!(
                        "question {question}: `{raw}` is not a single option letter"
                    )))
                }
            }
        }

        Ok(Self { answers })
    }

    pub fn num_questions(&self) -> u32 {
        self.answers.len() as u32
    }

    /// The correct letter for a 1-based question number.
    pub fn correct_option(&self, question: u32) -> Option<char> {
        self.answers.get(question.checked_sub(1)? as usize).copied()
    }

    #[cfg(test)]
    pub fn from_letters(letters: &[char]) -> Self {
        Self {
            answers: letters.to_vec(),
        }
    }
}

/// The upstream normalizer sometimes emits `1-A` or `1.A` cells; take the
/// token after the separator.
fn normalize_answer_cell(raw: &str) -> &str {
    let raw = raw.trim();
    for separator in ['-', '.'] {
        if let Some((_, answer)) = raw.split_once(separator) {
            return answer.trim();
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn path() -> &'static Path {
        Path::new("key.test")
    }

    #[test]
    fn parses_a_json_object_key() {
        let key =
            AnswerKey::from_json_str(r#"{"1": "A", "2": "B", "3": "C", "4": "D"}"#, path())
                .expect("valid key");
        assert_eq!(key.num_questions(), 4);
        assert_eq!(key.correct_option(1), Some('A'));
        assert_eq!(key.correct_option(4), Some('D'));
        assert_eq!(key.correct_option(5), None);
    }

    #[test]
    fn parses_delimited_text_with_header() {
        let key = AnswerKey::from_delimited_str(
            "Question,CorrectOption\n1,A\n2,B\n3,C\n",
            path(),
        )
        .expect("valid key");
        assert_eq!(key.num_questions(), 3);
        assert_eq!(key.correct_option(2), Some('B'));
    }

    #[test]
    fn parses_tab_delimited_and_dashed_cells() {
        let key = AnswerKey::from_delimited_str("1\t1-A\n2\t2 - B\n3\t3.C\n", path())
            .expect("valid key");
        assert_eq!(key.correct_option(1), Some('A'));
        assert_eq!(key.correct_option(2), Some('B'));
        assert_eq!(key.correct_option(3), Some('C'));
    }

    #[test]
    fn rejects_gaps_in_question_numbers() {
        let err = AnswerKey::from_delimited_str("1,A\n3,C\n", path()).unwrap_err();
        assert!(matches!(err, Error::AnswerKeyFormat { .. }));
    }

    #[test]
    fn rejects_duplicates_and_empty_keys() {
        assert!(AnswerKey::from_delimited_str("1,A\n1,B\n", path()).is_err());
        assert!(AnswerKey::from_delimited_str("", path()).is_err());
        assert!(AnswerKey::from_json_str("{}", path()).is_err());
    }

    #[test]
    fn rejects_multi_character_answers() {
        assert!(AnswerKey::from_delimited_str("1,AB\n", path()).is_err());
        assert!(AnswerKey::from_delimited_str("1,7\n", path()).is_err());
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().expect("tempdir");

        let json_path = dir.path().join("key.json");
        let mut file = std::fs::File::create(&json_path).expect("create");
        write!(file, r#"{{"1": "A", "2": "B"}}"#).expect("write");
        let key = AnswerKey::load(&json_path).expect("valid key");
        assert_eq!(key.num_questions(), 2);

        let odd_path = dir.path().join("key.xlsx");
        std::fs::File::create(&odd_path).expect("create");
        assert!(matches!(
            AnswerKey::load(&odd_path),
            Err(Error::AnswerKeyFormat { .. })
        ));
    }
}
