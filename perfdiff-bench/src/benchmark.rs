//! Benchmark Identity
//!
//! A benchmark is identified by its name, its ordered function parameters,
//! and its performance-test parameters. The identity carries a total order
//! used for stream merging and the two-stream comparator join.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of one benchmark: name, function parameters, and performance
/// parameters.
///
/// Performance parameters are iterated in sorted-key order; the `BTreeMap`
/// makes the key sequence and the backing entries inseparable, so they cannot
/// drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Benchmark {
    /// Fully qualified benchmark name.
    pub name: String,
    /// Ordered function parameters.
    pub function_params: Vec<String>,
    /// Performance-test parameters, keyed by parameter name.
    pub perf_params: BTreeMap<String, String>,
}

impl Benchmark {
    /// Create a benchmark with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function_params: Vec::new(),
            perf_params: BTreeMap::new(),
        }
    }

    /// Add one performance parameter.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.perf_params.insert(key.into(), value.into());
    }

    /// Render `k1=v1,k2=v2,...` in sorted-key order.
    pub fn perf_params_string(&self) -> String {
        let mut s = String::new();
        for (i, (k, v)) in self.perf_params.iter().enumerate() {
            if i != 0 {
                s.push(',');
            }
            s.push_str(k);
            s.push('=');
            s.push_str(v);
        }
        s
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}){{{}}}",
            self.name,
            self.function_params.join(","),
            self.perf_params_string()
        )
    }
}

impl Ord for Benchmark {
    /// Lexical total order: name, then function-parameter count and elements,
    /// then performance-parameter count and sorted `(key, value)` pairs.
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.function_params.len().cmp(&other.function_params.len()))
            .then_with(|| self.function_params.cmp(&other.function_params))
            .then_with(|| self.perf_params.len().cmp(&other.perf_params.len()))
            .then_with(|| {
                for ((bk, bv), (ok, ov)) in self.perf_params.iter().zip(other.perf_params.iter()) {
                    let ord = bk.cmp(ok).then_with(|| bv.cmp(ov));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            })
    }
}

impl PartialOrd for Benchmark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench(name: &str, fps: &[&str], pps: &[(&str, &str)]) -> Benchmark {
        let mut b = Benchmark::new(name);
        b.function_params = fps.iter().map(|s| s.to_string()).collect();
        for (k, v) in pps {
            b.add_param(*k, *v);
        }
        b
    }

    #[test]
    fn test_compare_reflexive() {
        let b = bench("b1", &["arg"], &[("size", "10")]);
        assert_eq!(b.cmp(&b), Ordering::Equal);
        assert_eq!(b, b.clone());
    }

    #[test]
    fn test_compare_antisymmetric() {
        let pairs = [
            (bench("a", &[], &[]), bench("b", &[], &[])),
            (bench("a", &[], &[]), bench("a", &["p"], &[])),
            (bench("a", &["p"], &[]), bench("a", &["q"], &[])),
            (bench("a", &[], &[("k", "1")]), bench("a", &[], &[("k", "2")])),
            (
                bench("a", &[], &[("k", "1")]),
                bench("a", &[], &[("k", "1"), ("l", "2")]),
            ),
        ];
        for (x, y) in &pairs {
            assert_eq!(x.cmp(y), y.cmp(x).reverse(), "{x} vs {y}");
            assert_eq!(x.cmp(y), Ordering::Less, "{x} vs {y}");
        }
    }

    #[test]
    fn test_compare_transitive() {
        let a = bench("a", &[], &[]);
        let b = bench("a", &["p"], &[]);
        let c = bench("a", &["p"], &[("k", "1")]);
        assert_eq!(a.cmp(&b), Ordering::Less);
        assert_eq!(b.cmp(&c), Ordering::Less);
        assert_eq!(a.cmp(&c), Ordering::Less);
    }

    #[test]
    fn test_param_count_beats_elements() {
        // Fewer function params sorts first even when the first element is larger.
        let x = bench("a", &["z"], &[]);
        let y = bench("a", &["a", "b"], &[]);
        assert_eq!(x.cmp(&y), Ordering::Less);
    }

    #[test]
    fn test_perf_params_sorted() {
        let mut b = Benchmark::new("b");
        b.add_param("zeta", "1");
        b.add_param("alpha", "2");
        assert_eq!(b.perf_params_string(), "alpha=2,zeta=1");
    }

    #[test]
    fn test_display() {
        let b = bench("pkg.Bench", &["s1"], &[("n", "100")]);
        assert_eq!(b.to_string(), "pkg.Bench(s1){n=100}");
    }
}
