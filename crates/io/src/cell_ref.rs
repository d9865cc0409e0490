// A1-style cell references

/// Convert column index to letter (0 -> A, 1 -> B, 26 -> AA, etc.)
pub fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters to a 0-indexed column (A -> 0, AA -> 26).
/// Returns None for empty or non-alphabetic input.
pub fn letter_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut col: usize = 0;
    for ch in letters.chars() {
        let digit = (ch.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col - 1)
}

/// Format a 0-indexed (row, col) as "E12".
pub fn cell_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letter(col), row + 1)
}

/// Parse an XLSX cell reference like "R104" or "AA1" to (row, col) in 0-indexed.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(usize, usize)> {
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (col_part, row_part) = cell_ref.split_at(split);
    let col = letter_to_col(col_part.trim_start_matches('$'))?;
    let row: usize = row_part.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_letters() {
        assert_eq!(col_to_letter(0), "A");
        assert_eq!(col_to_letter(25), "Z");
        assert_eq!(col_to_letter(26), "AA");
        assert_eq!(col_to_letter(27), "AB");
        assert_eq!(col_to_letter(701), "ZZ");
    }

    #[test]
    fn letters_to_col() {
        assert_eq!(letter_to_col("A"), Some(0));
        assert_eq!(letter_to_col("e"), Some(4));
        assert_eq!(letter_to_col("AA"), Some(26));
        assert_eq!(letter_to_col("ZZ"), Some(701));
        assert_eq!(letter_to_col(""), None);
        assert_eq!(letter_to_col("A1"), None);
    }

    #[test]
    fn cell_refs() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("E12"), Some((11, 4)));
        assert_eq!(parse_cell_ref("AA100"), Some((99, 26)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("B"), None);
        assert_eq!(cell_address(11, 4), "E12");
    }
}
