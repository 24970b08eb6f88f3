//! Population name escaping and root population resolution.

use std::collections::BTreeSet;

use crate::err::Error;
use crate::metadata::PopulationData;

/// Label used when no unique root population can be determined.
pub const UNSPECIFIED: &str = "UNSPECIFIED";

/// Replacement for `,` in population names.
///
/// The token has no proper prefix that is also a suffix, so escaped occurrences
/// cannot overlap and escaping stays injective over names without the token.
pub const COMMA_TOKEN: &str = "_2C";

/// Escape the separator `,` so the name can be used in field names and custom args.
pub fn escape_population_name(name: &str) -> String {
    name.replace(',', COMMA_TOKEN)
}

/// INFO key prefix for a population.
///
/// Applied on top of [`escape_population_name`]; all characters that are not
/// valid in VCF INFO keys become `_`, and a leading `_` is added if the name
/// does not start with a letter or `_`.
pub fn info_key(name: &str) -> String {
    let escaped = escape_population_name(name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    match escaped.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => escaped,
        _ => format!("_{}", escaped),
    }
}

/// Outcome of the root population resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootPopulation {
    /// The unique top-level population.
    Named(String),
    /// No unique root, `candidates` is the number of parentless populations.
    Unspecified { candidates: usize },
}

impl RootPopulation {
    /// Display name of the root, [`UNSPECIFIED`] if indeterminate.
    pub fn name(&self) -> &str {
        match self {
            RootPopulation::Named(name) => name,
            RootPopulation::Unspecified { .. } => UNSPECIFIED,
        }
    }

    /// Escaped name as used for summary names and short names.
    pub fn escaped_name(&self) -> String {
        escape_population_name(self.name())
    }
}

/// Determine the root among the `observed` populations.
///
/// A single observed population is the root.  Otherwise, the root is the only
/// observed population without a recorded super-population.  Any other number of
/// such candidates yields [`RootPopulation::Unspecified`] and a warning.
pub fn resolve_root(observed: &BTreeSet<String>, data: &PopulationData) -> RootPopulation {
    if observed.len() == 1 {
        if let Some(name) = observed.first() {
            return RootPopulation::Named(name.clone());
        }
    }

    let ids_by_name = data.population_ids_by_name();
    let candidates = observed
        .iter()
        .filter_map(|name| ids_by_name.get(name.as_str()).copied())
        .filter(|id| !data.super_populations.contains_key(id))
        .collect::<BTreeSet<u32>>();

    match candidates.first().and_then(|id| data.populations_by_id.get(id)) {
        Some(name) if candidates.len() == 1 => RootPopulation::Named(name.clone()),
        _ => {
            tracing::warn!(
                "{}, using {}",
                Error::AmbiguousRootPopulation {
                    candidates: candidates.len()
                },
                UNSPECIFIED
            );
            RootPopulation::Unspecified {
                candidates: candidates.len(),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;

    fn data() -> PopulationData {
        PopulationData::from_rows(
            &[
                (1, String::from("ALL")),
                (2, String::from("PopA")),
                (3, String::from("PopB")),
                (4, String::from("East,Asian")),
            ],
            &[(1, 2), (1, 3)],
            &[],
            &[],
        )
    }

    fn observed(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[rstest::rstest]
    #[case("PopA", "PopA")]
    #[case("East,Asian", "East_2CAsian")]
    #[case("a,b,c", "a_2Cb_2Cc")]
    #[case("", "")]
    fn escape(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(escape_population_name(name), expected);
        // idempotent
        assert_eq!(
            escape_population_name(&escape_population_name(name)),
            expected
        );
    }

    #[test]
    fn escape_is_injective() {
        let names = ["a_2C,", "a,2C_", "a,", "a", ",a", "_2,C", "a,,b", "a,b,"];
        let escaped = names
            .iter()
            .map(|name| escape_population_name(name))
            .collect::<BTreeSet<_>>();
        assert_eq!(escaped.len(), names.len());
    }

    #[rstest::rstest]
    #[case("PopA", "PopA")]
    #[case("East,Asian", "East_2CAsian")]
    #[case("1000G:EUR", "_1000G_EUR")]
    #[case("Hu Li (north)", "Hu_Li__north_")]
    #[case("", "_")]
    fn info_key(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(super::info_key(name), expected);
    }

    #[test]
    fn single_population_is_root() {
        // PopA has a parent, but is the only observed population
        let root = resolve_root(&observed(&["PopA"]), &data());
        assert_eq!(root, RootPopulation::Named(String::from("PopA")));
    }

    #[test]
    fn parentless_population_is_root() {
        let root = resolve_root(&observed(&["ALL", "PopA", "PopB"]), &data());
        assert_eq!(root.name(), "ALL");
    }

    #[test]
    fn escaped_root() {
        let root = resolve_root(&observed(&["East,Asian", "PopA"]), &data());
        assert_eq!(root.escaped_name(), "East_2CAsian");
    }

    #[test]
    #[tracing_test::traced_test]
    fn all_with_parent_is_unspecified() {
        let root = resolve_root(&observed(&["PopA", "PopB"]), &data());
        assert_eq!(root, RootPopulation::Unspecified { candidates: 0 });
        assert_eq!(root.name(), UNSPECIFIED);
        assert!(logs_contain("cannot determine root population name"));
    }

    #[test]
    fn several_parentless_is_unspecified() {
        let observed = observed(&["ALL", "East,Asian", "PopA"]);
        let root = resolve_root(&observed, &data());
        assert_eq!(root, RootPopulation::Unspecified { candidates: 2 });
        // deterministic
        assert_eq!(resolve_root(&observed, &data()), root);
    }
}
