// src/resolver/matcher.rs

//! Requirement matching against candidate packages

use crate::packages::{Flags, Requirement, Versioned};
use crate::version::compare_evr;
use std::cmp::Ordering;

/// Check whether `candidate` satisfies `req`
///
/// The candidate must carry the requirement's name. Unversioned requirements
/// are satisfied by name alone; versioned ones compare the candidate's EVR
/// against the requirement's with the same rules as [`compare_evr`], so a
/// requirement without a release ignores the candidate's release.
pub fn fills_requirement<T: Versioned + ?Sized>(req: &Requirement, candidate: &T) -> bool {
    if req.name != candidate.name() {
        return false;
    }

    let Some(wanted) = req.evr() else {
        return true;
    };

    let ord = compare_evr(&candidate.evr(), &wanted);
    match req.flags {
        Flags::Eq => ord == Ordering::Equal,
        Flags::Lt => ord == Ordering::Less,
        Flags::Le => ord != Ordering::Greater,
        Flags::Gt => ord == Ordering::Greater,
        Flags::Ge => ord != Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::PackageUnit;
    use crate::version::Evr;

    fn firefox(version: &str, release: &str, arch: &str) -> PackageUnit {
        PackageUnit::new("firefox", "0", version, release, arch)
    }

    #[test]
    fn test_name_mismatch_never_matches() {
        let req = Requirement::named("firefox");
        let other = PackageUnit::new("thunderbird", "0", "23.0.1", "1", "x86_64");
        assert!(!fills_requirement(&req, &other));
    }

    #[test]
    fn test_unversioned_matches_any_version_and_arch() {
        let req = Requirement::named("firefox");
        assert!(fills_requirement(&req, &firefox("1.0", "1", "i686")));
        assert!(fills_requirement(&req, &firefox("99.0", "3", "x86_64")));
    }

    #[test]
    fn test_greater_or_equal() {
        let req = Requirement::versioned("firefox", Flags::Ge, "23.0.1-1");
        assert!(fills_requirement(&req, &firefox("23.0.1", "1", "x86_64")));
        assert!(fills_requirement(&req, &firefox("23.0.2", "1", "x86_64")));
        assert!(!fills_requirement(&req, &firefox("23.0.0", "1", "x86_64")));
    }

    #[test]
    fn test_less_than() {
        let req = Requirement::versioned("firefox", Flags::Lt, "23.0.1-1");
        assert!(fills_requirement(&req, &firefox("23.0.0", "1", "x86_64")));
        assert!(!fills_requirement(&req, &firefox("23.0.1", "1", "x86_64")));
        assert!(!fills_requirement(&req, &firefox("23.0.2", "1", "x86_64")));
    }

    #[test]
    fn test_equal_ignores_missing_release() {
        let req = Requirement::versioned("firefox", Flags::Eq, "23.0.1");
        assert!(fills_requirement(&req, &firefox("23.0.1", "1", "x86_64")));
        assert!(fills_requirement(&req, &firefox("23.0.1", "7.fc39", "x86_64")));
        assert!(!fills_requirement(&req, &firefox("23.0.2", "1", "x86_64")));

        let with_release = Requirement::versioned("firefox", Flags::Eq, "23.0.1-2");
        assert!(!fills_requirement(&with_release, &firefox("23.0.1", "1", "x86_64")));
    }

    #[test]
    fn test_epoch_participates() {
        let req = Requirement::versioned("firefox", Flags::Gt, "1:1.0-1");
        assert!(!fills_requirement(&req, &firefox("50.0", "1", "x86_64")));
        let mut newer = firefox("1.0", "1", "x86_64");
        newer.epoch = "2".to_string();
        assert!(fills_requirement(&req, &newer));
    }

    #[test]
    fn test_flags_agree_with_comparator() {
        let triples = [
            ("0", "1.0", "1"),
            ("0", "1.0", "2"),
            ("0", "1.1", "1"),
            ("2", "0.9", "1"),
            ("0", "1.0~rc1", "1"),
            ("1", "1.0", "1"),
        ];
        for (ce, cv, cr) in triples {
            let candidate = PackageUnit::new("pkg", ce, cv, cr, "noarch");
            for (re, rv, rr) in triples {
                let evr = format!("{}:{}-{}", re, rv, rr);
                let ord = compare_evr(&Evr::new(Some(ce), cv, Some(cr)), &Evr::parse(&evr));
                let check = |flags: Flags| {
                    fills_requirement(&Requirement::versioned("pkg", flags, &evr), &candidate)
                };
                assert_eq!(check(Flags::Eq), ord == Ordering::Equal, "EQ {} vs {}", candidate, evr);
                assert_eq!(check(Flags::Lt), ord == Ordering::Less, "LT {} vs {}", candidate, evr);
                assert_eq!(check(Flags::Le), ord != Ordering::Greater, "LE {} vs {}", candidate, evr);
                assert_eq!(check(Flags::Gt), ord == Ordering::Greater, "GT {} vs {}", candidate, evr);
                assert_eq!(check(Flags::Ge), ord != Ordering::Less, "GE {} vs {}", candidate, evr);
            }
        }
    }
}
