//! Reader for codelist reference files
//!
//! Codelist CSVs are small, header-first tables. Fields may be quoted, quoted
//! fields may contain commas, newlines and `""` escapes. Blank lines are
//! skipped.

use cohortspec_diagnostics::{CSP0306, CohortError, Result};

/// One data record with the file line it starts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

impl CsvRecord {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// A parsed CSV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<CsvRecord>,
}

impl CsvTable {
    /// Position of a header, matched exactly
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Parse CSV text. `file` is only used in error messages.
pub fn parse_csv(content: &str, file: &str) -> Result<CsvTable> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut quote_line = 0;
    let mut line = 1;
    let mut record_line = 1;

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.trim().is_empty() && !quoted => {
                field.clear();
                quoted = true;
                in_quotes = true;
                quote_line = line;
            }
            ',' => {
                fields.push(finish_field(&mut field, &mut quoted));
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(finish_field(&mut field, &mut quoted));
                push_record(&mut records, record_line, std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            // Only padding may follow a closing quote
            c if quoted && c.is_whitespace() => {}
            c if quoted => {
                return Err(CohortError::codelist_at(
                    CSP0306,
                    format!("Unexpected '{}' after quoted field", c),
                    file,
                    line,
                ));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CohortError::codelist_at(
            CSP0306,
            "Unterminated quoted field",
            file,
            quote_line,
        ));
    }
    if !field.is_empty() || quoted || !fields.is_empty() {
        fields.push(finish_field(&mut field, &mut quoted));
        push_record(&mut records, record_line, fields);
    }

    let mut records = records.into_iter();
    let headers = records
        .next()
        .map(|header| header.fields)
        .ok_or_else(|| CohortError::codelist_at(CSP0306, "CSV file has no header row", file, 1))?;

    Ok(CsvTable {
        headers,
        records: records.collect(),
    })
}

fn finish_field(field: &mut String, quoted: &mut bool) -> String {
    let value = if *quoted {
        std::mem::take(field)
    } else {
        let trimmed = field.trim().to_string();
        field.clear();
        trimmed
    };
    *quoted = false;
    value
}

fn push_record(records: &mut Vec<CsvRecord>, line: usize, fields: Vec<String>) {
    if fields.len() == 1 && fields[0].is_empty() {
        return;
    }
    records.push(CsvRecord { line, fields });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_table() {
        let table = parse_csv("CTV3ID,Description\nG58..,Heart failure\nG580.,Congestive heart failure\n", "hf.csv").unwrap();

        assert_eq!(table.headers, vec!["CTV3ID", "Description"]);
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].line, 2);
        assert_eq!(table.records[1].get(0), Some("G580."));
        assert_eq!(table.column_index("Description"), Some(1));
        assert_eq!(table.column_index("description"), None);
    }

    #[test]
    fn test_quoted_fields() {
        let content = "code,term\r\n\"XaJQv\",\"White, British\"\r\nXaJQw,\"Said \"\"other\"\"\"\r\n";
        let table = parse_csv(content, "eth.csv").unwrap();

        assert_eq!(table.records[0].fields, vec!["XaJQv", "White, British"]);
        assert_eq!(table.records[1].fields, vec!["XaJQw", "Said \"other\""]);
    }

    #[test]
    fn test_multiline_field_keeps_line_numbers() {
        let content = "code,term\nA,\"first\nsecond\"\nB,third";
        let table = parse_csv(content, "x.csv").unwrap();

        assert_eq!(table.records[0].fields[1], "first\nsecond");
        assert_eq!(table.records[1].line, 4);
        assert_eq!(table.records[1].fields, vec!["B", "third"]);
    }

    #[test]
    fn test_blank_lines_and_bom() {
        let table = parse_csv("\u{feff}code\n\nA\n\n", "x.csv").unwrap();
        assert_eq!(table.headers, vec!["code"]);
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].line, 3);
    }

    #[test]
    fn test_padding_after_closing_quote() {
        let table = parse_csv("code,cat\n\"G58..\" ,1\n\"G580.\"\t\n", "hf.csv").unwrap();
        assert_eq!(table.records[0].fields, vec!["G58..", "1"]);
        assert_eq!(table.records[1].fields, vec!["G580."]);

        let err = parse_csv("code,cat\n\"G58..\"x,1\n", "hf.csv").unwrap_err();
        assert_eq!(err.code(), CSP0306);
        assert!(err.to_string().contains("after quoted field"));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_csv("code\n\"A\n", "x.csv").unwrap_err();
        assert_eq!(err.code(), CSP0306);
    }

    #[test]
    fn test_empty_file() {
        let err = parse_csv("", "x.csv").unwrap_err();
        assert_eq!(err.code(), CSP0306);
    }
}
