//! RPM epoch:version-release ordering.
//!
//! Implements the rpmvercmp segment comparison: alternating alphabetic and
//! numeric segments, numeric segments compare as numbers, and a tilde
//! sorts before anything including the end of the string.

use std::cmp::Ordering;

/// Compare two version strings with rpmvercmp semantics.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    let mut a = a.as_bytes();
    let mut b = b.as_bytes();

    loop {
        // Tilde: pre-release marker, older than everything else.
        match (a.first() == Some(&b'~'), b.first() == Some(&b'~')) {
            (true, true) => {
                a = &a[1..];
                b = &b[1..];
                continue;
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        // Skip separators (anything neither alphanumeric nor tilde).
        while let Some(&c) = a.first() {
            if c.is_ascii_alphanumeric() || c == b'~' {
                break;
            }
            a = &a[1..];
        }
        while let Some(&c) = b.first() {
            if c.is_ascii_alphanumeric() || c == b'~' {
                break;
            }
            b = &b[1..];
        }

        if a.is_empty() || b.is_empty() {
            return a.len().cmp(&b.len());
        }

        let numeric = a[0].is_ascii_digit();
        let take = |s: &[u8]| -> usize {
            s.iter()
                .take_while(|c| {
                    if numeric {
                        c.is_ascii_digit()
                    } else {
                        c.is_ascii_alphabetic()
                    }
                })
                .count()
        };
        let a_len = take(a);
        let b_len = take(b);
        // A numeric segment is newer than an alphabetic one.
        if numeric != b[0].is_ascii_digit() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        let (a_seg, b_seg) = (&a[..a_len], &b[..b_len]);
        let ordering = if numeric {
            let trim = |s: &[u8]| {
                let zeros = s.iter().take_while(|&&c| c == b'0').count();
                s[zeros..].to_vec()
            };
            let (a_num, b_num) = (trim(a_seg), trim(b_seg));
            a_num.len().cmp(&b_num.len()).then_with(|| a_num.cmp(&b_num))
        } else {
            a_seg.cmp(b_seg)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
        a = &a[a_len..];
        b = &b[b_len..];
    }
}

/// Epoch, version, release as an ordered triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evr {
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
}

impl Evr {
    pub fn new(epoch: Option<u32>, version: &str, release: &str) -> Self {
        Evr {
            epoch,
            version: version.to_string(),
            release: release.to_string(),
        }
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        let self_epoch = self.epoch.unwrap_or(0);
        let other_epoch = other.epoch.unwrap_or(0);
        self_epoch
            .cmp(&other_epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| rpmvercmp(&self.release, &other.release))
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_compare_as_numbers() {
        assert_eq!(rpmvercmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.05", "1.5"), Ordering::Equal);
        assert_eq!(rpmvercmp("2.0", "2.0"), Ordering::Equal);
        assert_eq!(rpmvercmp("10", "9"), Ordering::Greater);
    }

    #[test]
    fn alpha_vs_numeric() {
        assert_eq!(rpmvercmp("1.0a", "1.0.1"), Ordering::Less);
        assert_eq!(rpmvercmp("alpha", "1"), Ordering::Less);
    }

    #[test]
    fn tilde_sorts_first() {
        assert_eq!(rpmvercmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~~", "1.0~"), Ordering::Less);
    }

    #[test]
    fn separators_are_ignored() {
        assert_eq!(rpmvercmp("1.0.0", "1_0_0"), Ordering::Equal);
        assert_eq!(rpmvercmp("2.0.1", "2.0-1"), Ordering::Equal);
    }

    #[test]
    fn evr_ordering() {
        let older = Evr::new(None, "3.3.15", "2.fc18");
        let newer = Evr::new(None, "3.3.15", "3.fc18");
        let epoch = Evr::new(Some(1), "1.0", "1");
        assert!(older < newer);
        assert!(newer < epoch);
        assert_eq!(Evr::new(None, "1.0", "1"), Evr::new(None, "1.0", "1"));
        assert!(Evr::new(Some(0), "1.0", "1") <= Evr::new(None, "1.0", "1"));
    }
}
