//! Human-readable and LaTeX renderings of matches.
//!
//! Pure functions of the match metadata; nothing here touches the store.

use crate::combination::CombinationMatch;
use crate::core::types::MatchType;
use crate::matching::matcher::Match;
use crate::transform::search::chain_description;

fn shift_expr(shift: i64) -> String {
    match shift.signum() {
        0 => "n".to_string(),
        1 => format!("n+{shift}"),
        _ => format!("n-{}", -shift),
    }
}

/// One-line explanation of an exact or transform match.
#[must_use]
pub fn match_explanation(m: &Match) -> String {
    let relation = match m.match_type {
        MatchType::Prefix => "is a prefix of",
        MatchType::Subsequence => "occurs in",
    };
    let mut text = if m.chain.is_empty() {
        format!("query {relation} {}", m.id)
    } else {
        format!("{}(query) {relation} {}", chain_description(&m.chain), m.id)
    };
    if m.match_type == MatchType::Subsequence {
        text.push_str(&format!(" at offset {}", m.offset));
    }
    if let Some(name) = &m.name {
        text.push_str(&format!(" ({name})"));
    }
    text
}

/// `a(n) = 1*A000045(n+2) + 1*A000045(n)` style rendering.
///
/// Zero-coefficient components (from rank-deficient rational solves) are
/// omitted.
#[must_use]
pub fn combination_expression(m: &CombinationMatch) -> String {
    let parts: Vec<String> = m
        .ids
        .iter()
        .zip(&m.coefficients)
        .zip(&m.shifts)
        .zip(&m.component_transforms)
        .filter(|(((_, coeff), _), _)| !coeff.is_zero())
        .map(|(((id, coeff), shift), transform)| {
            let base = format!("{id}({})", shift_expr(*shift));
            let wrapped = match transform {
                crate::combination::ComponentTransform::Identity => base,
                t => format!("{}({base})", t.as_str()),
            };
            format!("{coeff}*{wrapped}")
        })
        .collect();
    format!("a(n) = {}", parts.join(" + "))
}

/// LaTeX form of a combination, with `\Delta` for diff and `\Sigma` for
/// partial sums.
#[must_use]
pub fn combination_latex(m: &CombinationMatch) -> String {
    let parts: Vec<String> = m
        .ids
        .iter()
        .zip(&m.coefficients)
        .zip(&m.shifts)
        .zip(&m.component_transforms)
        .filter(|(((_, coeff), _), _)| !coeff.is_zero())
        .map(|(((id, coeff), shift), transform)| {
            let base = format!("\\mathrm{{{id}}}({})", shift_expr(*shift));
            let wrapped = match transform {
                crate::combination::ComponentTransform::Identity => base,
                crate::combination::ComponentTransform::Diff => format!("\\Delta\\,{base}"),
                crate::combination::ComponentTransform::PartialSum => {
                    format!("\\Sigma\\,{base}")
                }
            };
            format!("{coeff}\\,{wrapped}")
        })
        .collect();
    format!("a_n = {}", parts.join(" + "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combination::{Coefficient, ComponentTransform};
    use crate::core::types::SequenceId;
    use crate::transform::ops::Operator;

    fn combo(coeffs: Vec<Coefficient>, shifts: Vec<i64>) -> CombinationMatch {
        let m = coeffs.len();
        CombinationMatch {
            ids: (0..m).map(|_| SequenceId::new("A000045")).collect(),
            names: vec![None; m],
            coefficients: coeffs,
            shifts,
            component_transforms: vec![ComponentTransform::Identity; m],
            length: 6,
            complexity: 6.0,
            score: 1.0,
            component_terms: None,
            combined_terms: None,
        }
    }

    #[test]
    fn test_combination_expression() {
        let m = combo(
            vec![Coefficient::Integer(1), Coefficient::Integer(1)],
            vec![2, 0],
        );
        assert_eq!(
            combination_expression(&m),
            "a(n) = 1*A000045(n+2) + 1*A000045(n)"
        );
    }

    #[test]
    fn test_zero_coefficients_omitted() {
        let m = combo(
            vec![Coefficient::Integer(7), Coefficient::Integer(0)],
            vec![0, 0],
        );
        assert_eq!(combination_expression(&m), "a(n) = 7*A000045(n)");
    }

    #[test]
    fn test_negative_shift_rendering() {
        let m = combo(
            vec![Coefficient::Integer(1), Coefficient::Integer(1)],
            vec![-1, 0],
        );
        assert_eq!(
            combination_expression(&m),
            "a(n) = 1*A000045(n-1) + 1*A000045(n)"
        );
    }

    #[test]
    fn test_latex_transform_wrapping() {
        let mut m = combo(
            vec![Coefficient::Integer(2), Coefficient::Integer(1)],
            vec![0, 0],
        );
        m.component_transforms = vec![ComponentTransform::Diff, ComponentTransform::Identity];
        let latex = combination_latex(&m);
        assert!(latex.starts_with("a_n = 2\\,\\Delta\\,"));
        assert!(latex.contains("\\mathrm{A000045}(n)"));
    }

    #[test]
    fn test_match_explanation_with_chain() {
        let m = Match {
            id: SequenceId::new("A000027"),
            name: Some("The positive integers".to_string()),
            match_type: MatchType::Prefix,
            offset: 0,
            offsets: vec![0],
            length: 5,
            score: 2.5,
            chain: vec![Operator::Diff],
            snippet: None,
        };
        let text = match_explanation(&m);
        assert!(text.contains("diff"));
        assert!(text.contains("A000027"));
        assert!(text.contains("positive integers"));
    }
}
