use std::collections::HashSet;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::combination::rational::{solve_exact, verify_solution};
use crate::combination::{
    sort_combination_matches, Coefficient, CombinationMatch, ComponentTransform,
};
use crate::core::config::AnalyzerConfig;
use crate::core::query::SequenceQuery;
use crate::core::record::SequenceRecord;
use crate::core::types::{CapKind, Deadline};

/// Result of a pair or triple search.
#[derive(Debug, Default)]
pub struct ComboOutcome {
    pub matches: Vec<CombinationMatch>,
    /// Candidate-shift-coefficient combinations examined
    pub checks: u64,
    pub truncated: Option<CapKind>,
}

/// One aligned component under consideration.
struct Component<'a> {
    record: &'a SequenceRecord,
    transform: ComponentTransform,
    shift: i64,
    /// `T(S)[n + shift]` for the verified window
    slice: Vec<BigInt>,
}

struct Search<'a> {
    cfg: &'a AnalyzerConfig,
    query: Vec<BigInt>,
    deadline: Deadline,
    max_checks: u64,
    rational: bool,
    outcome: ComboOutcome,
    seen: HashSet<String>,
}

impl Search<'_> {
    /// Safe-point cap check between (tuple, shift) iterations.
    fn over_budget(&mut self) -> bool {
        if self.outcome.truncated.is_some() {
            return true;
        }
        if self.deadline.expired() {
            self.outcome.truncated = Some(CapKind::Time);
            return true;
        }
        false
    }

    fn count_check(&mut self) -> bool {
        if self.outcome.truncated.is_some() {
            return false;
        }
        self.outcome.checks += 1;
        if self.outcome.checks > self.max_checks {
            self.outcome.truncated = Some(CapKind::Checks);
            return false;
        }
        true
    }

    /// The verified window `q[n0..]` for a set of shifts.
    fn window_start(shifts: &[i64]) -> usize {
        shifts
            .iter()
            .map(|s| if *s < 0 { s.unsigned_abs() as usize } else { 0 })
            .max()
            .unwrap_or(0)
    }

    fn aligned_slice(terms: &[BigInt], shift: i64, n0: usize, qlen: usize) -> Option<Vec<BigInt>> {
        if (qlen as i64) + shift > terms.len() as i64 {
            return None;
        }
        Some(
            (n0..qlen)
                .map(|n| terms[(n as i64 + shift) as usize].clone())
                .collect(),
        )
    }

    fn try_integer_coeffs(&mut self, components: &[Component<'_>], n0: usize, coeffs: &[i64]) {
        let qwin: Vec<BigInt> = self.query[n0..].to_vec();
        let qwin = qwin.as_slice();
        match components {
            [first, second] => {
                for &a in coeffs {
                    if a == 0 {
                        continue;
                    }
                    for &b in coeffs {
                        if !self.count_check() {
                            return;
                        }
                        if reproduces_2(a, &first.slice, b, &second.slice, qwin) {
                            self.accept(
                                components,
                                &[Coefficient::Integer(a), Coefficient::Integer(b)],
                                n0,
                            );
                        }
                    }
                }
            }
            [first, second, third] => {
                for &a in coeffs {
                    if a == 0 {
                        continue;
                    }
                    for &b in coeffs {
                        for &c in coeffs {
                            if !self.count_check() {
                                return;
                            }
                            if reproduces_3(a, &first.slice, b, &second.slice, c, &third.slice, qwin)
                            {
                                self.accept(
                                    components,
                                    &[
                                        Coefficient::Integer(a),
                                        Coefficient::Integer(b),
                                        Coefficient::Integer(c),
                                    ],
                                    n0,
                                );
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn try_rational_coeffs(&mut self, components: &[Component<'_>], n0: usize) {
        if !self.rational || !self.count_check() {
            return;
        }
        let qwin: Vec<BigInt> = self.query[n0..].to_vec();
        let columns: Vec<Vec<BigInt>> = components.iter().map(|c| c.slice.clone()).collect();
        let Some(solution) = solve_exact(&columns, &qwin) else {
            return;
        };
        if solution.iter().all(num_traits::Zero::is_zero) {
            return;
        }
        let max_denom = BigInt::from(self.cfg.combo.max_denom);
        let max_numer = BigInt::from(self.cfg.combo.max_coeff_num);
        for coeff in &solution {
            if coeff.denom().abs() > max_denom || coeff.numer().abs() > max_numer {
                return;
            }
        }
        if !verify_solution(&columns, &solution, &qwin) {
            return;
        }
        let coefficients: Vec<Coefficient> = solution
            .into_iter()
            .map(|r| {
                if r.is_integer() {
                    match r.numer().to_i64() {
                        Some(v) => Coefficient::Integer(v),
                        None => Coefficient::Rational(r),
                    }
                } else {
                    Coefficient::Rational(r)
                }
            })
            .collect();
        self.accept(components, &coefficients, n0);
    }

    /// Record a verified combination, canonicalising component order so
    /// symmetric enumerations collapse to one entry.
    fn accept(&mut self, components: &[Component<'_>], coefficients: &[Coefficient], n0: usize) {
        let mut order: Vec<usize> = (0..components.len()).collect();
        order.sort_by_key(|&i| {
            (
                components[i].record.id.clone(),
                components[i].transform.as_str(),
                components[i].shift,
                coefficients[i].to_string(),
            )
        });

        let ids: Vec<_> = order.iter().map(|&i| components[i].record.id.clone()).collect();
        let transforms: Vec<_> = order.iter().map(|&i| components[i].transform).collect();
        let shifts: Vec<i64> = order.iter().map(|&i| components[i].shift).collect();
        let coeffs: Vec<Coefficient> = order.iter().map(|&i| coefficients[i].clone()).collect();

        let key = ids
            .iter()
            .map(|id| id.as_str().to_string())
            .chain(transforms.iter().map(|t| t.as_str().to_string()))
            .chain(shifts.iter().map(ToString::to_string))
            .chain(coeffs.iter().map(ToString::to_string))
            .collect::<Vec<_>>()
            .join("|");
        if !self.seen.insert(key) {
            return;
        }

        let k = self.query.len() - n0;
        let complexity =
            CombinationMatch::complexity_of(&coeffs, &shifts, &transforms, &self.cfg.combo);
        let score = k as f64 / (1.0 + complexity);
        let snippets = self.cfg.snippet_len.map(|_| {
            order
                .iter()
                .map(|&i| components[i].slice.clone())
                .collect::<Vec<_>>()
        });

        self.outcome.matches.push(CombinationMatch {
            names: order
                .iter()
                .map(|&i| components[i].record.name.clone())
                .collect(),
            ids,
            coefficients: coeffs,
            shifts,
            component_transforms: transforms,
            length: k,
            complexity,
            score,
            component_terms: snippets,
            combined_terms: self
                .cfg
                .snippet_len
                .map(|_| self.query[n0..].to_vec()),
        });
    }
}

/// Term-wise check with early reject on the first mismatch.
fn reproduces_2(a: i64, x: &[BigInt], b: i64, y: &[BigInt], q: &[BigInt]) -> bool {
    let (a, b) = (BigInt::from(a), BigInt::from(b));
    x.iter()
        .zip(y)
        .zip(q)
        .all(|((xi, yi), qi)| &a * xi + &b * yi == *qi)
}

fn reproduces_3(a: i64, x: &[BigInt], b: i64, y: &[BigInt], c: i64, z: &[BigInt], q: &[BigInt]) -> bool {
    let (a, b, c) = (BigInt::from(a), BigInt::from(b), BigInt::from(c));
    x.iter()
        .zip(y)
        .zip(z)
        .zip(q)
        .all(|(((xi, yi), zi), qi)| &a * xi + &b * yi + &c * zi == *qi)
}

/// Transformed variants of each bucket record, computed once.
fn variants(
    records: &[&SequenceRecord],
    transforms: &[ComponentTransform],
) -> Vec<Vec<(ComponentTransform, Vec<BigInt>)>> {
    records
        .iter()
        .map(|rec| {
            transforms
                .iter()
                .map(|t| (*t, t.apply(&rec.terms)))
                .collect()
        })
        .collect()
}

fn shift_range(cfg: &AnalyzerConfig) -> Vec<i64> {
    (-cfg.combo.max_shift_back..=cfg.combo.max_shift).collect()
}

/// Brute-force search over unordered pairs (with repetition, so a sequence
/// can combine with a shifted copy of itself).
///
/// Caps are hard and first-hit wins: the check budget, the wall clock, and
/// the bucket size already applied upstream. Partial results are returned
/// with the triggering cap recorded.
#[must_use]
pub fn search_pair_combinations(
    query: &SequenceQuery,
    bucket: &[SequenceRecord],
    cfg: &AnalyzerConfig,
    deadline: Deadline,
) -> ComboOutcome {
    let Some(q) = query.concrete_terms() else {
        return ComboOutcome::default();
    };
    let qlen = q.len();
    if qlen < query.min_match_length {
        return ComboOutcome::default();
    }

    let mut records: Vec<&SequenceRecord> = bucket.iter().collect();
    records.sort_by(|a, b| a.id.cmp(&b.id));
    let all_variants = variants(&records, &cfg.combo.component_transforms);
    let shifts = shift_range(cfg);

    let mut search = Search {
        cfg,
        query: q,
        deadline,
        max_checks: cfg.combo.max_checks,
        rational: cfg.combo.rational,
        outcome: ComboOutcome::default(),
        seen: HashSet::new(),
    };

    'pairs: for i in 0..records.len() {
        for j in i..records.len() {
            for (t1, seq1) in &all_variants[i] {
                for &s1 in &shifts {
                    for (t2, seq2) in &all_variants[j] {
                        for &s2 in &shifts {
                            if search.over_budget() {
                                break 'pairs;
                            }
                            let n0 = Search::window_start(&[s1, s2]);
                            let k = qlen.saturating_sub(n0);
                            if k < query.min_match_length {
                                continue;
                            }
                            let Some(slice1) = Search::aligned_slice(seq1, s1, n0, qlen) else {
                                continue;
                            };
                            let Some(slice2) = Search::aligned_slice(seq2, s2, n0, qlen) else {
                                continue;
                            };
                            let identical_columns = i == j && t1 == t2 && s1 == s2;
                            let components = [
                                Component {
                                    record: records[i],
                                    transform: *t1,
                                    shift: s1,
                                    slice: slice1,
                                },
                                Component {
                                    record: records[j],
                                    transform: *t2,
                                    shift: s2,
                                    slice: slice2,
                                },
                            ];
                            // Identical columns make every integer split of
                            // a+b equivalent; leave those to the rational
                            // solver, which zeroes the redundant component.
                            if !identical_columns {
                                search.try_integer_coeffs(&components, n0, &cfg.combo.coeffs);
                            }
                            search.try_rational_coeffs(&components, n0);
                        }
                    }
                }
            }
        }
    }

    let mut outcome = search.outcome;
    sort_combination_matches(&mut outcome.matches);
    outcome.matches.truncate(cfg.combo.limit);
    outcome
}

/// Brute-force search over unordered triples, with the pair machinery
/// extended by one dimension. Defaults are stricter since the space is
/// cubically larger.
#[must_use]
pub fn search_triple_combinations(
    query: &SequenceQuery,
    bucket: &[SequenceRecord],
    cfg: &AnalyzerConfig,
    deadline: Deadline,
) -> ComboOutcome {
    let Some(q) = query.concrete_terms() else {
        return ComboOutcome::default();
    };
    let qlen = q.len();
    if qlen < query.min_match_length || bucket.len() < 3 {
        return ComboOutcome::default();
    }

    let mut records: Vec<&SequenceRecord> = bucket.iter().collect();
    records.sort_by(|a, b| a.id.cmp(&b.id));
    let all_variants = variants(&records, &cfg.combo.component_transforms);
    let shifts = shift_range(cfg);

    let mut search = Search {
        cfg,
        query: q,
        deadline,
        max_checks: cfg.triple.max_checks,
        rational: cfg.triple.rational,
        outcome: ComboOutcome::default(),
        seen: HashSet::new(),
    };

    'triples: for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            for l in (j + 1)..records.len() {
                for (t1, seq1) in &all_variants[i] {
                    for &s1 in &shifts {
                        for (t2, seq2) in &all_variants[j] {
                            for &s2 in &shifts {
                                for (t3, seq3) in &all_variants[l] {
                                    for &s3 in &shifts {
                                        if search.over_budget() {
                                            break 'triples;
                                        }
                                        let n0 = Search::window_start(&[s1, s2, s3]);
                                        let k = qlen.saturating_sub(n0);
                                        if k < query.min_match_length {
                                            continue;
                                        }
                                        let (Some(slice1), Some(slice2), Some(slice3)) = (
                                            Search::aligned_slice(seq1, s1, n0, qlen),
                                            Search::aligned_slice(seq2, s2, n0, qlen),
                                            Search::aligned_slice(seq3, s3, n0, qlen),
                                        ) else {
                                            continue;
                                        };
                                        let components = [
                                            Component {
                                                record: records[i],
                                                transform: *t1,
                                                shift: s1,
                                                slice: slice1,
                                            },
                                            Component {
                                                record: records[j],
                                                transform: *t2,
                                                shift: s2,
                                                slice: slice2,
                                            },
                                            Component {
                                                record: records[l],
                                                transform: *t3,
                                                shift: s3,
                                                slice: slice3,
                                            },
                                        ];
                                        search.try_integer_coeffs(
                                            &components,
                                            n0,
                                            &cfg.triple.coeffs,
                                        );
                                        search.try_rational_coeffs(&components, n0);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    let mut outcome = search.outcome;
    sort_combination_matches(&mut outcome.matches);
    outcome.matches.truncate(cfg.triple.limit);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SequenceId;

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    fn record(id: &str, terms: &[i64]) -> SequenceRecord {
        SequenceRecord::new(SequenceId::new(id), ints(terms))
    }

    fn fibonacci() -> SequenceRecord {
        record("A000045", &[0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89])
    }

    #[test]
    fn test_lucas_from_shifted_fibonacci() {
        // L(n) = F(n+2) + F(n)
        let query = SequenceQuery::from_i64(&[1, 3, 4, 7, 11, 18], 3, false);
        let bucket = vec![fibonacci(), record("A000012", &[1, 1, 1, 1, 1, 1, 1, 1])];
        let cfg = AnalyzerConfig::default();

        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::after_ms(30_000));
        let hit = outcome
            .matches
            .iter()
            .find(|m| {
                m.ids.iter().all(|id| id.as_str() == "A000045")
                    && m.coefficients
                        == vec![Coefficient::Integer(1), Coefficient::Integer(1)]
                    && {
                        let mut shifts = m.shifts.clone();
                        shifts.sort_unstable();
                        shifts == vec![0, 2]
                    }
            })
            .expect("Lucas should decompose over shifted Fibonacci");
        assert!(hit.length >= 6);
        assert!(hit
            .component_transforms
            .iter()
            .all(|t| *t == ComponentTransform::Identity));
    }

    #[test]
    fn test_scaled_single_sequence_found_rationally() {
        // 7*n with coefficients capped at 5: integer mode cannot reach 7,
        // the rational solver can, zeroing the redundant component.
        let query = SequenceQuery::from_i64(&[7, 14, 21, 28, 35], 3, false);
        let bucket = vec![
            record("A000027", &[1, 2, 3, 4, 5, 6, 7]),
            record("A000012", &[1, 1, 1, 1, 1, 1, 1]),
        ];
        let mut cfg = AnalyzerConfig::default();
        cfg.combo.coeffs = (1..=5).collect();

        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::after_ms(30_000));
        let hit = outcome
            .matches
            .iter()
            .find(|m| {
                m.coefficients.iter().any(|c| *c == Coefficient::Integer(7))
                    && m.coefficients.iter().any(Coefficient::is_zero)
            })
            .expect("7*A000027 should be found by the rational path");
        assert_eq!(hit.length, 5);
    }

    #[test]
    fn test_integer_pair_with_distinct_sequences() {
        // q = 2*n + 3*1
        let query = SequenceQuery::from_i64(&[5, 7, 9, 11, 13], 3, false);
        let bucket = vec![
            record("A000027", &[1, 2, 3, 4, 5, 6]),
            record("A000012", &[1, 1, 1, 1, 1, 1]),
        ];
        let cfg = AnalyzerConfig::default();

        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::after_ms(30_000));
        assert!(outcome.matches.iter().any(|m| {
            m.ids
                .iter()
                .map(SequenceId::as_str)
                .collect::<Vec<_>>()
                .contains(&"A000027")
                && m.coefficients.contains(&Coefficient::Integer(2))
                && m.coefficients.contains(&Coefficient::Integer(3))
        }));
    }

    #[test]
    fn test_rational_half_coefficient() {
        // q = (1/2) * (2n) + 1
        let query = SequenceQuery::from_i64(&[2, 3, 4, 5, 6], 3, false);
        let bucket = vec![
            record("A005843", &[0, 2, 4, 6, 8, 10, 12]),
            record("A000012", &[1, 1, 1, 1, 1, 1, 1]),
        ];
        let mut cfg = AnalyzerConfig::default();
        // Force the rational path by removing useful integer coefficients
        cfg.combo.coeffs = vec![];
        cfg.combo.max_shift = 1;

        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::after_ms(30_000));
        let expected = Coefficient::Rational(num_rational::BigRational::new(
            BigInt::from(1),
            BigInt::from(2),
        ));
        assert!(
            outcome.matches.iter().any(|m| {
                m.coefficients.contains(&expected)
                    && m.shifts.iter().any(|s| *s == 1)
            }),
            "expected a 1/2 coefficient on the shifted even numbers"
        );
    }

    #[test]
    fn test_denominator_cap_rejects() {
        // q = x/13 needs denominator 13 > max_denom 12
        let query = SequenceQuery::from_i64(&[1, 2, 3], 3, false);
        let bucket = vec![
            record("A900001", &[13, 26, 39]),
            record("A900002", &[0, 0, 0]),
        ];
        let mut cfg = AnalyzerConfig::default();
        cfg.combo.coeffs = vec![];
        cfg.combo.max_shift = 0;
        cfg.combo.max_shift_back = 0;

        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::after_ms(30_000));
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_check_cap_truncates() {
        let query = SequenceQuery::from_i64(&[1, 4, 9, 16, 25], 3, false);
        let bucket = vec![
            record("A000027", &[1, 2, 3, 4, 5, 6]),
            record("A000012", &[1, 1, 1, 1, 1, 1]),
            record("A000079", &[1, 2, 4, 8, 16, 32]),
        ];
        let mut cfg = AnalyzerConfig::default();
        cfg.combo.max_checks = 10;

        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::after_ms(30_000));
        assert_eq!(outcome.truncated, Some(CapKind::Checks));
        assert!(outcome.checks <= 11);
    }

    #[test]
    fn test_negative_shift_verifies_tail_window() {
        // q[n] = F(n-1) + F(n) for n >= 1 (q[0] is unexplained)
        let query = SequenceQuery::from_i64(&[99, 1, 2, 3, 5, 8], 3, false);
        let bucket = vec![fibonacci(), record("A000012", &[1, 1, 1, 1, 1, 1, 1])];
        let cfg = AnalyzerConfig::default();

        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::after_ms(30_000));
        let hit = outcome.matches.iter().find(|m| {
            m.ids.iter().all(|id| id.as_str() == "A000045")
                && m.shifts.contains(&-1)
                && m.length == 5
        });
        assert!(hit.is_some(), "tail-window combination should verify");
    }

    #[test]
    fn test_component_transform_diff() {
        // q = diff(squares)(n) = 2n+1, plus zero use of the second sequence
        let query = SequenceQuery::from_i64(&[1, 3, 5, 7, 9], 3, false);
        let bucket = vec![
            record("A000290", &[0, 1, 4, 9, 16, 25, 36]),
            record("A000012", &[1, 1, 1, 1, 1, 1, 1]),
        ];
        let mut cfg = AnalyzerConfig::default();
        cfg.combo.component_transforms = vec![
            ComponentTransform::Identity,
            ComponentTransform::Diff,
            ComponentTransform::PartialSum,
        ];

        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::after_ms(30_000));
        assert!(outcome.matches.iter().any(|m| {
            m.component_transforms.contains(&ComponentTransform::Diff)
                && m.ids.iter().any(|id| id.as_str() == "A000290")
        }));
    }

    #[test]
    fn test_triple_search() {
        // q = n + 2^n + 1
        let query = SequenceQuery::from_i64(&[3, 5, 8, 13, 22], 3, false);
        let bucket = vec![
            record("A000027", &[0, 1, 2, 3, 4, 5, 6]),
            record("A000079", &[1, 2, 4, 8, 16, 32, 64]),
            record("A000012", &[1, 1, 1, 1, 1, 1, 1]),
        ];
        let mut cfg = AnalyzerConfig::default();
        cfg.triple.enabled = true;

        let outcome = search_triple_combinations(&query, &bucket, &cfg, Deadline::after_ms(60_000));
        assert!(
            !outcome.matches.is_empty(),
            "triple decomposition should be found"
        );
        let best = &outcome.matches[0];
        assert_eq!(best.ids.len(), 3);
        assert_eq!(best.length, 5);
    }

    #[test]
    fn test_determinism() {
        let query = SequenceQuery::from_i64(&[5, 7, 9, 11, 13], 3, false);
        let bucket = vec![
            record("A000027", &[1, 2, 3, 4, 5, 6]),
            record("A000012", &[1, 1, 1, 1, 1, 1]),
            record("A005843", &[0, 2, 4, 6, 8, 10]),
        ];
        let cfg = AnalyzerConfig::default();

        let a = search_pair_combinations(&query, &bucket, &cfg, Deadline::none());
        let b = search_pair_combinations(&query, &bucket, &cfg, Deadline::none());
        let render = |o: &ComboOutcome| {
            o.matches
                .iter()
                .map(|m| format!("{:?}|{:?}|{:?}", m.ids, m.shifts, m.coefficients))
                .collect::<Vec<_>>()
        };
        assert_eq!(render(&a), render(&b));
    }

    #[test]
    fn test_scoring_prefers_lower_complexity() {
        let cfg = AnalyzerConfig::default();
        let query = SequenceQuery::from_i64(&[2, 4, 6, 8, 10], 3, false);
        let bucket = vec![
            record("A000027", &[1, 2, 3, 4, 5, 6]),
            record("A005843", &[0, 2, 4, 6, 8, 10, 12]),
        ];
        let outcome = search_pair_combinations(&query, &bucket, &cfg, Deadline::none());
        for pair in outcome.matches.windows(2) {
            assert!(
                pair[0].complexity <= pair[1].complexity,
                "results must be ordered by ascending complexity"
            );
            assert!(pair[0].score >= pair[1].score || pair[0].complexity < pair[1].complexity);
        }
    }

    #[test]
    fn test_wildcards_and_short_queries_skip() {
        let cfg = AnalyzerConfig::default();
        let bucket = vec![record("A000027", &[1, 2, 3, 4, 5])];

        let mut wildcard = SequenceQuery::from_i64(&[1, 2, 3, 4], 3, false);
        wildcard.terms[0] = None;
        assert!(search_pair_combinations(&wildcard, &bucket, &cfg, Deadline::none())
            .matches
            .is_empty());

        let short = SequenceQuery::from_i64(&[1, 2], 3, false);
        assert!(search_pair_combinations(&short, &bucket, &cfg, Deadline::none())
            .matches
            .is_empty());
    }
}
