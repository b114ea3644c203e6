//! Default statistical backend built on `statrs` distributions.

use super::descriptive::{average_ranks, mean, pearson, sample_variance, sorted};
use super::{
    CheckStatistics, CorrelationMethod, StatisticalBackend, StatsError, TestInput, TestKind,
    TestStatistics,
};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use statrs::function::factorial::ln_factorial;

/// Sample-size range of Royston's approximation for the Shapiro-Francia test.
const SHAPIRO_FRANCIA_MIN_N: usize = 5;
const SHAPIRO_FRANCIA_MAX_N: usize = 5000;

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1e-12;

/// Relative tolerance when comparing hypergeometric probabilities.
const FISHER_RELATIVE_TOLERANCE: f64 = 1e-7;

/// In-process backend. Stateless and deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

fn standard_normal() -> Result<Normal, StatsError> {
    Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))
}

fn students_t(df: f64) -> Result<StudentsT, StatsError> {
    StudentsT::new(0.0, 1.0, df).map_err(|e| StatsError::Distribution(e.to_string()))
}

fn fisher_snedecor(df1: f64, df2: f64) -> Result<FisherSnedecor, StatsError> {
    FisherSnedecor::new(df1, df2).map_err(|e| StatsError::Distribution(e.to_string()))
}

fn two_sided_t_p(t: f64, df: f64) -> Result<f64, StatsError> {
    Ok(2.0 * students_t(df)?.sf(t.abs()))
}

fn require_finite(values: &[f64]) -> Result<(), StatsError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(StatsError::InvalidInput("non-finite value in sample".into()))
    }
}

// =============================================================================
// Assumption checks
// =============================================================================

/// Shapiro-Francia W' with Royston's (1993) normal approximation of ln(1 - W').
fn shapiro_francia(sample: &[f64]) -> Result<CheckStatistics, StatsError> {
    let n = sample.len();
    if n < SHAPIRO_FRANCIA_MIN_N {
        return Err(StatsError::InsufficientData(format!(
            "normality test needs at least {SHAPIRO_FRANCIA_MIN_N} observations, got {n}"
        )));
    }
    if n > SHAPIRO_FRANCIA_MAX_N {
        return Err(StatsError::InvalidInput(format!(
            "normality test supports at most {SHAPIRO_FRANCIA_MAX_N} observations, got {n}"
        )));
    }
    require_finite(sample)?;

    let x = sorted(sample);
    let x_mean = mean(&x);
    let ss: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
    if ss <= f64::EPSILON {
        return Err(StatsError::Degenerate("sample has zero variance".into()));
    }

    let normal = standard_normal()?;
    let nf = n as f64;
    let scores: Vec<f64> = (1..=n)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let numerator: f64 = scores.iter().zip(&x).map(|(m, v)| m * v).sum();
    let score_ss: f64 = scores.iter().map(|m| m * m).sum();
    let w = (numerator * numerator / (score_ss * ss)).min(1.0);

    let u = nf.ln();
    let v = u.ln();
    let mu = -1.2725 + 1.0521 * (v - u);
    let sigma = 1.0308 - 0.26758 * (v + 2.0 / u);

    let residual = 1.0 - w;
    let p_value = if residual <= 0.0 {
        1.0
    } else {
        let z = (residual.ln() - mu) / sigma;
        normal.sf(z)
    };

    Ok(CheckStatistics {
        statistic: w,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

/// Levene's test on absolute deviations from the group means.
fn levene(groups: &[Vec<f64>]) -> Result<CheckStatistics, StatsError> {
    let k = groups.len();
    if k < 2 {
        return Err(StatsError::InsufficientData(
            "variance comparison needs at least two groups".into(),
        ));
    }
    if let Some(small) = groups.iter().find(|g| g.len() < 2) {
        return Err(StatsError::InsufficientData(format!(
            "every group needs at least two observations, one has {}",
            small.len()
        )));
    }
    for group in groups {
        require_finite(group)?;
    }

    let deviations: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let m = mean(g);
            g.iter().map(|v| (v - m).abs()).collect()
        })
        .collect();

    let total: usize = deviations.iter().map(Vec::len).sum();
    let grand_mean = deviations.iter().flatten().sum::<f64>() / total as f64;

    let mut between = 0.0;
    let mut within = 0.0;
    for dev in &deviations {
        let group_mean = mean(dev);
        between += dev.len() as f64 * (group_mean - grand_mean).powi(2);
        within += dev.iter().map(|z| (z - group_mean).powi(2)).sum::<f64>();
    }

    let df1 = (k - 1) as f64;
    let df2 = (total - k) as f64;
    if within <= f64::EPSILON {
        if between <= f64::EPSILON {
            return Err(StatsError::Degenerate(
                "all groups have identical spread with no variation".into(),
            ));
        }
        return Ok(CheckStatistics {
            statistic: f64::INFINITY,
            p_value: 0.0,
        });
    }

    let statistic = (df2 / df1) * between / within;
    let p_value = fisher_snedecor(df1, df2)?.sf(statistic);
    Ok(CheckStatistics {
        statistic,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

// =============================================================================
// Hypothesis tests
// =============================================================================

fn two_groups(input: TestInput<'_>) -> Result<(&[f64], &[f64]), StatsError> {
    match input {
        TestInput::Groups(groups) if groups.len() == 2 => {
            for group in groups {
                if group.len() < 2 {
                    return Err(StatsError::InsufficientData(format!(
                        "each group needs at least two observations, one has {}",
                        group.len()
                    )));
                }
                require_finite(group)?;
            }
            Ok((&groups[0], &groups[1]))
        }
        TestInput::Groups(groups) => Err(StatsError::InvalidInput(format!(
            "t-test needs exactly two groups, got {}",
            groups.len()
        ))),
        _ => Err(StatsError::InvalidInput("t-test expects grouped samples".into())),
    }
}

fn student_t(input: TestInput<'_>) -> Result<TestStatistics, StatsError> {
    let (a, b) = two_groups(input)?;
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (v1, v2) = (sample_variance(a), sample_variance(b));
    let df = n1 + n2 - 2.0;
    let pooled_sd = (((n1 - 1.0) * v1 + (n2 - 1.0) * v2) / df).sqrt();
    if pooled_sd <= f64::EPSILON {
        return Err(StatsError::Degenerate("both groups have zero variance".into()));
    }

    let diff = mean(a) - mean(b);
    let t = diff / (pooled_sd * (1.0 / n1 + 1.0 / n2).sqrt());
    Ok(TestStatistics::new(t, two_sided_t_p(t, df)?)
        .with_effect_size(diff / pooled_sd)
        .with_df([df])
        .with_extra("mean_difference", diff))
}

fn welch_t(input: TestInput<'_>) -> Result<TestStatistics, StatsError> {
    let (a, b) = two_groups(input)?;
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (q1, q2) = (sample_variance(a) / n1, sample_variance(b) / n2);
    let se = (q1 + q2).sqrt();
    if se <= f64::EPSILON {
        return Err(StatsError::Degenerate("both groups have zero variance".into()));
    }

    let diff = mean(a) - mean(b);
    let t = diff / se;
    let df = (q1 + q2).powi(2) / (q1 * q1 / (n1 - 1.0) + q2 * q2 / (n2 - 1.0));
    let pooled_sd = ((sample_variance(a) + sample_variance(b)) / 2.0).sqrt();
    Ok(TestStatistics::new(t, two_sided_t_p(t, df)?)
        .with_effect_size(diff / pooled_sd)
        .with_df([df])
        .with_extra("mean_difference", diff))
}

fn one_way_anova(input: TestInput<'_>) -> Result<TestStatistics, StatsError> {
    let TestInput::Groups(groups) = input else {
        return Err(StatsError::InvalidInput("ANOVA expects grouped samples".into()));
    };
    let k = groups.len();
    if k < 2 {
        return Err(StatsError::InsufficientData("ANOVA needs at least two groups".into()));
    }
    if groups.iter().any(|g| g.is_empty()) {
        return Err(StatsError::InsufficientData("ANOVA group is empty".into()));
    }
    for group in groups {
        require_finite(group)?;
    }

    let total: usize = groups.iter().map(Vec::len).sum();
    if total <= k {
        return Err(StatsError::InsufficientData(
            "ANOVA needs more observations than groups".into(),
        ));
    }
    let grand_mean = groups.iter().flatten().sum::<f64>() / total as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups.iter() {
        let m = mean(group);
        ss_between += group.len() as f64 * (m - grand_mean).powi(2);
        ss_within += group.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    }
    if ss_within <= f64::EPSILON {
        return Err(StatsError::Degenerate("no variance within groups".into()));
    }

    let df1 = (k - 1) as f64;
    let df2 = (total - k) as f64;
    let f = (ss_between / df1) / (ss_within / df2);
    let p = fisher_snedecor(df1, df2)?.sf(f);
    Ok(TestStatistics::new(f, p)
        .with_effect_size(ss_between / (ss_between + ss_within))
        .with_df([df1, df2]))
}

fn validate_table(table: &[Vec<u64>]) -> Result<(Vec<f64>, Vec<f64>, f64), StatsError> {
    let rows = table.len();
    let cols = table.first().map_or(0, Vec::len);
    if rows < 2 || cols < 2 {
        return Err(StatsError::InvalidInput(format!(
            "contingency table must be at least 2x2, got {rows}x{cols}"
        )));
    }
    if table.iter().any(|r| r.len() != cols) {
        return Err(StatsError::InvalidInput("ragged contingency table".into()));
    }

    let row_totals: Vec<f64> = table.iter().map(|r| r.iter().sum::<u64>() as f64).collect();
    let col_totals: Vec<f64> = (0..cols)
        .map(|j| table.iter().map(|r| r[j]).sum::<u64>() as f64)
        .collect();
    if row_totals.iter().chain(&col_totals).any(|&t| t == 0.0) {
        return Err(StatsError::Degenerate("contingency table has an empty margin".into()));
    }
    let total = row_totals.iter().sum();
    Ok((row_totals, col_totals, total))
}

fn chi_square(input: TestInput<'_>) -> Result<TestStatistics, StatsError> {
    let TestInput::Contingency(table) = input else {
        return Err(StatsError::InvalidInput("chi-square expects a contingency table".into()));
    };
    let (row_totals, col_totals, total) = validate_table(table)?;

    let mut chi2 = 0.0;
    let mut min_expected = f64::INFINITY;
    for (i, row) in table.iter().enumerate() {
        for (j, &observed) in row.iter().enumerate() {
            let expected = row_totals[i] * col_totals[j] / total;
            min_expected = min_expected.min(expected);
            chi2 += (observed as f64 - expected).powi(2) / expected;
        }
    }

    let df = ((row_totals.len() - 1) * (col_totals.len() - 1)) as f64;
    let distribution = ChiSquared::new(df).map_err(|e| StatsError::Distribution(e.to_string()))?;
    let p = distribution.sf(chi2);
    let min_dim = row_totals.len().min(col_totals.len()) as f64;
    let cramers_v = (chi2 / (total * (min_dim - 1.0))).sqrt();

    Ok(TestStatistics::new(chi2, p)
        .with_effect_size(cramers_v)
        .with_df([df])
        .with_extra("min_expected_count", min_expected))
}

fn ln_choose(n: u64, k: u64) -> f64 {
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// Two-sided Fisher exact test on a 2x2 table. The statistic is the sample
/// odds ratio, with 0.5 added to every cell when any cell is zero.
fn fisher_exact(input: TestInput<'_>) -> Result<TestStatistics, StatsError> {
    let TestInput::Contingency(table) = input else {
        return Err(StatsError::InvalidInput("Fisher's exact test expects a contingency table".into()));
    };
    if table.len() != 2 || table.iter().any(|r| r.len() != 2) {
        return Err(StatsError::InvalidInput(
            "Fisher's exact test is only defined here for 2x2 tables".into(),
        ));
    }
    validate_table(table)?;

    let (a, b, c, d) = (table[0][0], table[0][1], table[1][0], table[1][1]);
    let n = a + b + c + d;
    let row1 = a + b;
    let col1 = a + c;
    let lo = (row1 + col1).saturating_sub(n);
    let hi = row1.min(col1);

    let ln_denominator = ln_choose(n, row1);
    let probability = |x: u64| (ln_choose(col1, x) + ln_choose(n - col1, row1 - x) - ln_denominator).exp();

    let observed = probability(a);
    let threshold = observed * (1.0 + FISHER_RELATIVE_TOLERANCE);
    let p: f64 = (lo..=hi).map(&probability).filter(|&p| p <= threshold).sum();

    let odds_ratio = if a == 0 || b == 0 || c == 0 || d == 0 {
        ((a as f64 + 0.5) * (d as f64 + 0.5)) / ((b as f64 + 0.5) * (c as f64 + 0.5))
    } else {
        (a as f64 * d as f64) / (b as f64 * c as f64)
    };

    Ok(TestStatistics::new(odds_ratio, p.min(1.0)).with_effect_size(odds_ratio))
}

fn paired(input: TestInput<'_>) -> Result<(&[f64], &[f64]), StatsError> {
    let TestInput::Paired { x, y } = input else {
        return Err(StatsError::InvalidInput("correlation expects paired samples".into()));
    };
    if x.len() != y.len() {
        return Err(StatsError::InvalidInput(format!(
            "paired samples differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 3 {
        return Err(StatsError::InsufficientData(format!(
            "correlation needs at least 3 complete pairs, got {}",
            x.len()
        )));
    }
    require_finite(x)?;
    require_finite(y)?;
    Ok((x, y))
}

fn correlation_test(x: &[f64], y: &[f64]) -> Result<TestStatistics, StatsError> {
    let r = pearson(x, y)
        .ok_or_else(|| StatsError::Degenerate("one of the columns is constant".into()))?;
    let df = (x.len() - 2) as f64;
    let (t, p) = if (1.0 - r.abs()) <= f64::EPSILON {
        (f64::INFINITY.copysign(r), 0.0)
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        (t, two_sided_t_p(t, df)?)
    };

    let stats = TestStatistics::new(r, p).with_effect_size(r).with_df([df]);
    Ok(if t.is_finite() { stats.with_extra("t_statistic", t) } else { stats })
}

// =============================================================================
// Multivariate
// =============================================================================

fn validate_columns(columns: &[Vec<f64>]) -> Result<usize, StatsError> {
    let n = columns.first().map_or(0, Vec::len);
    if columns.len() < 2 {
        return Err(StatsError::InvalidInput("need at least two columns".into()));
    }
    if columns.iter().any(|c| c.len() != n) {
        return Err(StatsError::InvalidInput("columns differ in length".into()));
    }
    if n < 3 {
        return Err(StatsError::InsufficientData(format!(
            "need at least 3 complete rows, got {n}"
        )));
    }
    for column in columns {
        require_finite(column)?;
    }
    Ok(n)
}

fn correlation_matrix(method: CorrelationMethod, columns: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, StatsError> {
    validate_columns(columns)?;
    let prepared: Vec<Vec<f64>> = match method {
        CorrelationMethod::Pearson => columns.to_vec(),
        CorrelationMethod::Spearman => columns.iter().map(|c| average_ranks(c)).collect(),
    };

    let k = prepared.len();
    let mut matrix = vec![vec![0.0; k]; k];
    for i in 0..k {
        matrix[i][i] = 1.0;
        for j in (i + 1)..k {
            let r = pearson(&prepared[i], &prepared[j]).ok_or_else(|| {
                StatsError::Degenerate(format!(
                    "column {i} or {j} is constant on complete rows"
                ))
            })?;
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    Ok(matrix)
}

/// Eigenvalues of a symmetric matrix by cyclic Jacobi rotations, descending.
fn symmetric_eigenvalues(mut a: Vec<Vec<f64>>) -> Result<Vec<f64>, StatsError> {
    let n = a.len();
    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off_diagonal < JACOBI_TOLERANCE {
            let mut eigenvalues: Vec<f64> = (0..n).map(|i| a[i][i]).collect();
            eigenvalues.sort_by(|x, y| y.total_cmp(x));
            return Ok(eigenvalues);
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q].abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
            }
        }
    }
    Err(StatsError::NonConvergence(format!(
        "eigenvalue iteration did not converge after {JACOBI_MAX_SWEEPS} sweeps"
    )))
}

impl StatisticalBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn normality(&self, sample: &[f64]) -> Result<CheckStatistics, StatsError> {
        shapiro_francia(sample)
    }

    fn levene(&self, groups: &[Vec<f64>]) -> Result<CheckStatistics, StatsError> {
        levene(groups)
    }

    fn run_test(&self, kind: TestKind, input: TestInput<'_>) -> Result<TestStatistics, StatsError> {
        match kind {
            TestKind::StudentT => student_t(input),
            TestKind::WelchT => welch_t(input),
            TestKind::OneWayAnova => one_way_anova(input),
            TestKind::ChiSquare => chi_square(input),
            TestKind::FisherExact => fisher_exact(input),
            TestKind::Pearson => {
                let (x, y) = paired(input)?;
                correlation_test(x, y)
            }
            TestKind::Spearman => {
                let (x, y) = paired(input)?;
                correlation_test(&average_ranks(x), &average_ranks(y))
            }
        }
    }

    fn correlation_matrix(
        &self,
        method: CorrelationMethod,
        columns: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>, StatsError> {
        correlation_matrix(method, columns)
    }

    fn principal_components(&self, columns: &[Vec<f64>]) -> Result<Vec<f64>, StatsError> {
        let matrix = correlation_matrix(CorrelationMethod::Pearson, columns)?;
        let eigenvalues = symmetric_eigenvalues(matrix)?;
        let total: f64 = eigenvalues.iter().sum();
        if total <= f64::EPSILON {
            return Err(StatsError::SingularMatrix);
        }
        Ok(eigenvalues.into_iter().map(|v| v.max(0.0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    fn normal_quantiles(n: usize, mean: f64, sd: f64) -> Vec<f64> {
        let normal = Normal::new(0.0, 1.0).unwrap();
        (1..=n)
            .map(|i| mean + sd * normal.inverse_cdf((i as f64 - 0.5) / n as f64))
            .map(|v| (v * 10.0).round() / 10.0)
            .collect()
    }

    // ==================== normality tests ====================

    #[test]
    fn test_shapiro_francia_accepts_normal_sample() {
        let sample = normal_quantiles(50, 40.0, 10.0);
        let result = NativeBackend.normality(&sample).unwrap();
        assert!(result.statistic > 0.98);
        assert!(result.p_value > 0.5);
    }

    #[test]
    fn test_shapiro_francia_rejects_skewed_sample() {
        let sample: Vec<f64> = (0..40).map(|i| (i as f64 / 4.0).exp()).collect();
        let result = NativeBackend.normality(&sample).unwrap();
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn test_shapiro_francia_sample_bounds() {
        assert!(matches!(
            NativeBackend.normality(&[1.0, 2.0, 3.0]),
            Err(StatsError::InsufficientData(_))
        ));
        assert!(matches!(
            NativeBackend.normality(&[2.0; 10]),
            Err(StatsError::Degenerate(_))
        ));
    }

    // ==================== levene tests ====================

    #[test]
    fn test_levene_detects_unequal_spread() {
        let groups = vec![
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![10.0, 20.0, 30.0, 40.0, 50.0],
        ];
        let result = NativeBackend.levene(&groups).unwrap();
        approx(result.statistic, 8.2489, 1e-3);
        assert!(result.p_value < 0.05);
    }

    #[test]
    fn test_levene_needs_two_observations_per_group() {
        let groups = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            NativeBackend.levene(&groups),
            Err(StatsError::InsufficientData(_))
        ));
    }

    // ==================== t-test tests ====================

    #[test]
    fn test_student_t_known_values() {
        let groups = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![2.0, 3.0, 4.0, 5.0, 6.0]];
        let result = NativeBackend
            .run_test(TestKind::StudentT, TestInput::Groups(&groups))
            .unwrap();
        approx(result.statistic, -1.0, 1e-9);
        approx(result.p_value, 0.3466, 1e-3);
        approx(result.effect_size.unwrap(), -0.6325, 1e-3);
        assert_eq!(result.degrees_of_freedom, vec![8.0]);
    }

    #[test]
    fn test_welch_t_degrees_of_freedom() {
        let groups = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![2.0, 3.0, 4.0, 5.0, 6.0]];
        let result = NativeBackend
            .run_test(TestKind::WelchT, TestInput::Groups(&groups))
            .unwrap();
        approx(result.statistic, -1.0, 1e-9);
        approx(result.degrees_of_freedom[0], 8.0, 1e-9);
    }

    #[test]
    fn test_t_test_rejects_three_groups() {
        let groups = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        assert!(matches!(
            NativeBackend.run_test(TestKind::StudentT, TestInput::Groups(&groups)),
            Err(StatsError::InvalidInput(_))
        ));
    }

    // ==================== anova tests ====================

    #[test]
    fn test_anova_known_values() {
        let groups = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
        let result = NativeBackend
            .run_test(TestKind::OneWayAnova, TestInput::Groups(&groups))
            .unwrap();
        approx(result.statistic, 12.0, 1e-9);
        approx(result.effect_size.unwrap(), 0.8, 1e-9);
        approx(result.p_value, 0.0080, 1e-3);
        assert_eq!(result.degrees_of_freedom, vec![2.0, 6.0]);
    }

    #[test]
    fn test_anova_without_within_variance_is_degenerate() {
        let groups = vec![vec![1.0, 1.0], vec![2.0, 2.0]];
        assert!(matches!(
            NativeBackend.run_test(TestKind::OneWayAnova, TestInput::Groups(&groups)),
            Err(StatsError::Degenerate(_))
        ));
    }

    // ==================== contingency tests ====================

    #[test]
    fn test_chi_square_known_values() {
        let table = vec![vec![10, 20], vec![20, 10]];
        let result = NativeBackend
            .run_test(TestKind::ChiSquare, TestInput::Contingency(&table))
            .unwrap();
        approx(result.statistic, 6.6667, 1e-3);
        approx(result.p_value, 0.00982, 1e-4);
        approx(result.effect_size.unwrap(), 0.3333, 1e-3);
        approx(result.extras["min_expected_count"], 15.0, 1e-9);
    }

    #[test]
    fn test_fisher_exact_known_values() {
        let table = vec![vec![1, 9], vec![11, 3]];
        let result = NativeBackend
            .run_test(TestKind::FisherExact, TestInput::Contingency(&table))
            .unwrap();
        approx(result.p_value, 0.002759, 1e-5);
        approx(result.statistic, 3.0 / 99.0, 1e-9);
    }

    #[test]
    fn test_fisher_exact_rejects_larger_tables() {
        let table = vec![vec![1, 2, 3], vec![4, 5, 6]];
        assert!(matches!(
            NativeBackend.run_test(TestKind::FisherExact, TestInput::Contingency(&table)),
            Err(StatsError::InvalidInput(_))
        ));
    }

    // ==================== correlation tests ====================

    #[test]
    fn test_pearson_perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        let result = NativeBackend
            .run_test(TestKind::Pearson, TestInput::Paired { x: &x, y: &y })
            .unwrap();
        approx(result.statistic, 1.0, 1e-12);
        assert_eq!(result.p_value, 0.0);
    }

    #[test]
    fn test_spearman_monotonic() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0, 100.0];
        let result = NativeBackend
            .run_test(TestKind::Spearman, TestInput::Paired { x: &x, y: &y })
            .unwrap();
        approx(result.statistic, 1.0, 1e-12);
    }

    #[test]
    fn test_correlation_with_constant_column_is_degenerate() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 3.0, 3.0, 3.0];
        assert!(matches!(
            NativeBackend.run_test(TestKind::Pearson, TestInput::Paired { x: &x, y: &y }),
            Err(StatsError::Degenerate(_))
        ));
    }

    // ==================== multivariate tests ====================

    #[test]
    fn test_principal_components_sum_to_dimension() {
        let columns = vec![
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![2.0, 1.0, 4.0, 3.0, 6.0, 5.0],
            vec![6.0, 1.0, 5.0, 2.0, 4.0, 3.0],
        ];
        let eigenvalues = NativeBackend.principal_components(&columns).unwrap();
        assert_eq!(eigenvalues.len(), 3);
        approx(eigenvalues.iter().sum::<f64>(), 3.0, 1e-9);
        assert!(eigenvalues.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_symmetric_eigenvalues_two_by_two() {
        let eigenvalues = symmetric_eigenvalues(vec![vec![2.0, 1.0], vec![1.0, 2.0]]).unwrap();
        approx(eigenvalues[0], 3.0, 1e-9);
        approx(eigenvalues[1], 1.0, 1e-9);
    }

    #[test]
    fn test_correlation_matrix_is_symmetric() {
        let columns = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![4.0, 3.0, 2.0, 1.0],
            vec![1.0, 3.0, 2.0, 4.0],
        ];
        let matrix = NativeBackend
            .correlation_matrix(CorrelationMethod::Spearman, &columns)
            .unwrap();
        approx(matrix[0][1], -1.0, 1e-12);
        assert_eq!(matrix[1][2], matrix[2][1]);
        assert_eq!(matrix[2][2], 1.0);
    }
}
