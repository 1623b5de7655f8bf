use std::cmp::Ordering;

/// 按语义顺序比较版本号
///
/// 以 `.` 分段逐段比较。每段拆为前导数字与其余后缀：
/// - 无前导数字的段排在有前导数字的段之前；
/// - 前导数字按数值比较，相同时再按后缀字典序（`0` < `0-beta`）；
/// - 仍相同时按原始文本比较（`01` < `1`）。
///
/// 缺失的段视为更小（`1` < `1.0`）。各层比较均基于确定的键，因此是全序。
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = compare_segments(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_segments(l: &str, r: &str) -> Ordering {
    let (l_digits, l_rest) = split_numeric(l);
    let (r_digits, r_rest) = split_numeric(r);

    let ord = match (l_digits.is_empty(), r_digits.is_empty()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_digits(l_digits, r_digits).then_with(|| l_rest.cmp(r_rest)),
    };
    ord.then_with(|| l.cmp(r))
}

fn split_numeric(segment: &str) -> (&str, &str) {
    let end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    segment.split_at(end)
}

/// 任意长度的十进制数字串按数值比较
fn compare_digits(l: &str, r: &str) -> Ordering {
    let l = l.trim_start_matches('0');
    let r = r.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}
