//! Case-insensitive natural ordering ("file2" before "file10").

use std::cmp::Ordering;

/// Compare two strings in case-insensitive natural order.
///
/// Runs of ASCII digits compare by numeric value; everything else compares
/// by lowercased character. Strings equal under that rule fall back to a
/// plain byte comparison so the order stays total and deterministic.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let al = a.to_lowercase();
    let bl = b.to_lowercase();
    natural_cmp_lower(&al, &bl).then_with(|| a.cmp(b))
}

fn natural_cmp_lower(a: &str, b: &str) -> Ordering {
    let ab = a.as_bytes();
    let bb = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < ab.len() && j < bb.len() {
        let ca = ab[i];
        let cb = bb[j];

        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let (a_end, a_trim) = scan_number(ab, i);
            let (b_end, b_trim) = scan_number(bb, j);

            let ord = (a_end - a_trim)
                .cmp(&(b_end - b_trim))
                .then_with(|| ab[a_trim..a_end].cmp(&bb[b_trim..b_end]));
            if ord != Ordering::Equal {
                return ord;
            }

            // Same value: fewer leading zeros first.
            let ord = (a_end - i).cmp(&(b_end - j));
            if ord != Ordering::Equal {
                return ord;
            }

            i = a_end;
            j = b_end;
            continue;
        }

        if ca != cb {
            return ca.cmp(&cb);
        }
        i += 1;
        j += 1;
    }

    (ab.len() - i).cmp(&(bb.len() - j))
}

/// Returns the end of the digit run starting at `start` and the index of its
/// first significant digit.
fn scan_number(bytes: &[u8], start: usize) -> (usize, usize) {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut trim = start;
    while trim < end && bytes[trim] == b'0' {
        trim += 1;
    }
    (end, trim)
}
