use std::cmp::Ordering;

use crate::constants::ROW_ESTIMATE_OVERHEAD_BYTES;

/// One parsed input line of the form `N. T`.
///
/// The row owns the whole original line and remembers where the text portion
/// starts, so comparison works on borrowed slices and the writer can emit the
/// line byte-for-byte as it was read.
#[derive(Debug, Clone)]
pub struct Row {
    number: i64,
    line: String,
    text_offset: usize,
}

/// Locates the numeric prefix and text offset without taking ownership.
///
/// Returns `None` when the line has no `.` or the prefix is not a decimal
/// i64 (overflow included). Borrowing here lets callers keep their read
/// buffer when a line turns out to be junk.
pub fn parse_parts(line: &str) -> Option<(i64, usize)> {
    let dot = line.find('.')?;
    let number = line[..dot].parse::<i64>().ok()?;

    let mut text_offset = dot + 1;
    if line.as_bytes().get(text_offset) == Some(&b' ') {
        text_offset += 1;
    }

    Some((number, text_offset))
}

impl Row {
    /// Parses an owned line into a row. The line's storage is retained as-is;
    /// no new string is allocated on either path.
    pub fn try_parse(line: String) -> Option<Row> {
        let (number, text_offset) = parse_parts(&line)?;
        Some(Row {
            number,
            line,
            text_offset,
        })
    }

    pub(crate) fn from_parts(number: i64, line: String, text_offset: usize) -> Row {
        debug_assert!(text_offset <= line.len());
        Row {
            number,
            line,
            text_offset,
        }
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    /// The primary sort key: everything after the prefix, as raw bytes.
    pub fn text(&self) -> &[u8] {
        &self.line.as_bytes()[self.text_offset..]
    }

    /// The original line, for output.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Bytes this row charges against the chunk size cap.
    pub fn estimated_size(&self) -> usize {
        self.line.len() + ROW_ESTIMATE_OVERHEAD_BYTES
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Row {}

impl PartialOrd for Row {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Row {
    /// Ordinal text comparison first, numeric prefix as the tie-break.
    fn cmp(&self, other: &Self) -> Ordering {
        self.text()
            .cmp(other.text())
            .then_with(|| self.number.cmp(&other.number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: &str) -> Row {
        Row::try_parse(line.to_string()).unwrap()
    }

    #[test]
    fn parses_number_and_text() {
        let r = row("415. Apple");
        assert_eq!(r.number(), 415);
        assert_eq!(r.text(), b"Apple");
        assert_eq!(r.line(), "415. Apple");
    }

    #[test]
    fn skips_single_space_after_dot() {
        assert_eq!(row("1. Apple").text(), b"Apple");
        assert_eq!(row("1.Apple").text(), b"Apple");
        // Only one space is consumed; further whitespace is part of the key.
        assert_eq!(row("1.  Apple").text(), b" Apple");
    }

    #[test]
    fn offset_stays_within_line() {
        for line in ["5.", "5. ", "0. x", ".", "9999999. tail"] {
            if let Some((_, offset)) = parse_parts(line) {
                assert!(offset <= line.len(), "offset out of bounds for {line:?}");
            }
        }
        assert_eq!(row("5.").text(), b"");
        assert_eq!(row("5. ").text(), b"");
    }

    #[test]
    fn rejects_unparsable_lines() {
        assert!(Row::try_parse("InvalidLine".to_string()).is_none());
        assert!(Row::try_parse("123 NoDot".to_string()).is_none());
        assert!(Row::try_parse("".to_string()).is_none());
        assert!(Row::try_parse(". missing number".to_string()).is_none());
        assert!(Row::try_parse("12a34. text".to_string()).is_none());
    }

    #[test]
    fn rejects_prefix_beyond_i64() {
        assert!(Row::try_parse("92233720368547758070. huge".to_string()).is_none());
        assert_eq!(
            row("9223372036854775807. max").number(),
            i64::MAX
        );
    }

    #[test]
    fn orders_by_text_bytes_first() {
        // 'Z' (0x5A) sorts before 'a' (0x61) under ordinal comparison.
        assert!(row("1. Zebra") < row("1. apple"));
        assert!(row("415. Apple") < row("2. Banana is yellow"));
        assert!(row("2. Banana is yellow") < row("32. Cherry is the best"));
    }

    #[test]
    fn equal_text_falls_back_to_number() {
        let mut rows = vec![
            row("10. Apple"),
            row("2. Apple"),
            row("20. Apple"),
            row("5. Apple"),
        ];
        rows.sort_unstable();
        let numbers: Vec<i64> = rows.iter().map(Row::number).collect();
        assert_eq!(numbers, vec![2, 5, 10, 20]);
    }

    #[test]
    fn comparator_is_a_total_order() {
        let a = row("1. Apple");
        let b = row("415. Apple");
        let c = row("2. Banana is yellow");

        assert!(a < b && b < c && a < c);
        assert_eq!(row("7. Pear"), row("7. Pear"));

        // Exactly one relation holds per pair.
        for (x, y) in [(&a, &b), (&b, &c), (&a, &c)] {
            let relations = [x < y, x == y, x > y];
            assert_eq!(relations.iter().filter(|r| **r).count(), 1);
        }
    }

    #[test]
    fn estimated_size_tracks_line_length() {
        let r = row("1. Apple");
        assert_eq!(r.estimated_size(), "1. Apple".len() + 20);
    }
}
