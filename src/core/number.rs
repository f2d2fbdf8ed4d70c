//! core/number.rs: Integer facts such as factorisation, radix forms, Fibonacci
//! brackets and golden-ratio divisions.

use serde::Serialize;

/// Golden ratio φ = (1 + √5) / 2.
pub const PHI: f64 = 1.618_033_988_749_895;

/// Prime factors in ascending order, with multiplicity. `n < 2` has none.
pub fn prime_factors(n: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    let mut rest = n;
    let mut d = 2u64;
    while d <= rest / d {
        while rest % d == 0 {
            factors.push(d);
            rest /= d;
        }
        d += 1;
    }
    if rest > 1 {
        factors.push(rest);
    }
    factors
}

pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2u64;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

/// `2² × 167` style rendering of a factor list.
pub fn format_factorization(factors: &[u64]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut i = 0;
    while i < factors.len() {
        let p = factors[i];
        let run = factors[i..].iter().take_while(|&&f| f == p).count();
        parts.push(match run {
            1 => p.to_string(),
            2 => format!("{p}²"),
            3 => format!("{p}³"),
            k => format!("{p}^{k}"),
        });
        i += run;
    }
    parts.join(" × ")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RadixForms {
    pub binary: String,
    pub octal: String,
    pub hex: String,
}

pub fn radix_forms(n: u64) -> RadixForms {
    RadixForms {
        binary: format!("{n:b}"),
        octal: format!("{n:o}"),
        hex: format!("{n:x}"),
    }
}

/// Shannon entropy (bits) of the 0/1 frequencies in the binary form of `n`.
/// Zero when the representation consists of a single symbol.
pub fn bit_entropy(n: u64) -> f64 {
    let bits = format!("{n:b}");
    let total = bits.len() as f64;
    let ones = bits.chars().filter(|&c| c == '1').count() as f64;
    let zeros = total - ones;
    if ones == 0.0 || zeros == 0.0 {
        return 0.0;
    }
    let p1 = ones / total;
    let p0 = zeros / total;
    -p1 * p1.log2() - p0 * p0.log2()
}

/// Fibonacci numbers surrounding `n`: the first index `i` with `F(i) > n`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FibonacciBracket {
    pub index: usize,
    pub lower: u64,
    pub upper: u64,
    pub ratio: f64,
}

/// First Fibonacci number above `n` and its predecessor. `None` when that
/// number does not fit in a `u64`.
pub fn fibonacci_bracket(n: u64) -> Option<FibonacciBracket> {
    let (mut prev, mut cur) = (0u64, 1u64);
    let mut index = 1;
    while cur <= n {
        let next = prev.checked_add(cur)?;
        prev = cur;
        cur = next;
        index += 1;
    }
    let ratio = if prev == 0 { 0.0 } else { cur as f64 / prev as f64 };
    Some(FibonacciBracket {
        index,
        lower: prev,
        upper: cur,
        ratio,
    })
}

/// `(x / φ, x · φ)`
pub fn golden_division(x: f64) -> (f64, f64) {
    (x / PHI, x * PHI)
}

/// Real `k` solving `k(k + 1) / 2 = n`.
pub fn triangular_root(n: f64) -> f64 {
    (-1.0 + (1.0 + 8.0 * n).sqrt()) / 2.0
}

pub const PERFECT_NUMBERS: [u64; 4] = [6, 28, 496, 8128];

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn factorises_668() {
        let f = prime_factors(668);
        assert_eq!(f, vec![2, 2, 167]);
        assert_eq!(f.iter().product::<u64>(), 668);
        assert_eq!(format_factorization(&f), "2² × 167");
        assert!(is_prime(167));
        assert!(!is_prime(668));
        assert!(!is_prime(1));
        assert!(prime_factors(1).is_empty());
        assert_eq!(prime_factors(97), vec![97]);
    }

    #[test]
    fn radix_and_entropy() {
        let r = radix_forms(668);
        assert_eq!(r.binary, "1010011100");
        assert_eq!(r.octal, "1234");
        assert_eq!(r.hex, "29c");
        assert_relative_eq!(bit_entropy(668), 1.0, epsilon = 1e-12);
        assert_eq!(bit_entropy(7), 0.0);
    }

    #[test]
    fn fibonacci_bracket_of_668() {
        let b = fibonacci_bracket(668).unwrap();
        assert_eq!(b.index, 16);
        assert_eq!(b.lower, 610);
        assert_eq!(b.upper, 987);
        assert_relative_eq!(b.ratio, PHI, epsilon = 1e-4);
    }

    #[test]
    fn large_inputs_do_not_overflow() {
        assert!(is_prime(4_294_967_311));
        assert!(!is_prime(u64::MAX));
        assert_eq!(prime_factors(u64::MAX), vec![3, 5, 17, 257, 641, 65_537, 6_700_417]);
        // F(93) is the largest Fibonacci number in a u64.
        let b = fibonacci_bracket(12_200_160_415_121_876_737).unwrap();
        assert_eq!(b.upper, 12_200_160_415_121_876_738);
        assert!(fibonacci_bracket(12_200_160_415_121_876_738).is_none());
        assert!(fibonacci_bracket(u64::MAX).is_none());
    }

    #[test]
    fn golden_and_triangular() {
        let (lo, hi) = golden_division(668.0);
        assert_relative_eq!(lo, 412.84, epsilon = 0.01);
        assert_relative_eq!(hi, 1080.85, epsilon = 0.01);
        let k = triangular_root(668.0);
        assert!(k > 36.0 && k < 37.0);
    }
}
