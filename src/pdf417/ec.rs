use log::trace;

use crate::common::error::{ScanError, ScanResult};

// Prime field GF(929) with generator 3
//------------------------------------------------------------------------------

const MODULUS: u32 = 929;
const GENERATOR: u32 = 3;
const SIZE: usize = MODULUS as usize;

pub struct ModulusGF {
    exp: [u32; SIZE],
    log: [u32; SIZE],
}

pub static PDF417_GF: ModulusGF = ModulusGF::new();

impl ModulusGF {
    const fn new() -> Self {
        let mut exp = [0u32; SIZE];
        let mut log = [0u32; SIZE];
        let mut x = 1;
        let mut i = 0;
        while i < SIZE {
            exp[i] = x;
            x = (x * GENERATOR) % MODULUS;
            i += 1;
        }
        let mut i = 0;
        while i < SIZE - 1 {
            log[exp[i] as usize] = i as u32;
            i += 1;
        }
        Self { exp, log }
    }

    #[inline]
    pub fn add(&self, a: u32, b: u32) -> u32 {
        (a + b) % MODULUS
    }

    #[inline]
    pub fn subtract(&self, a: u32, b: u32) -> u32 {
        (MODULUS + a - b) % MODULUS
    }

    #[inline]
    pub fn exp(&self, a: usize) -> u32 {
        self.exp[a % (SIZE - 1)]
    }

    #[inline]
    pub fn log(&self, a: u32) -> usize {
        debug_assert!(a != 0, "Log of zero");
        self.log[a as usize] as usize
    }

    #[inline]
    pub fn inverse(&self, a: u32) -> u32 {
        debug_assert!(a != 0, "Inverse of zero");
        self.exp[SIZE - 1 - self.log(a)]
    }

    #[inline]
    pub fn multiply(&self, a: u32, b: u32) -> u32 {
        if a == 0 || b == 0 {
            return 0;
        }
        self.exp[(self.log(a) + self.log(b)) % (SIZE - 1)]
    }

    pub fn zero(&self) -> ModulusPoly {
        ModulusPoly { coefficients: vec![0] }
    }

    pub fn one(&self) -> ModulusPoly {
        ModulusPoly { coefficients: vec![1] }
    }

    pub fn build_monomial(&self, degree: usize, coefficient: u32) -> ModulusPoly {
        if coefficient == 0 {
            return self.zero();
        }
        let mut coefficients = vec![0; degree + 1];
        coefficients[0] = coefficient;
        ModulusPoly { coefficients }
    }
}

#[cfg(test)]
mod modulus_gf_tests {
    use super::PDF417_GF as GF;

    #[test]
    fn test_tables() {
        assert_eq!(GF.exp(0), 1);
        assert_eq!(GF.exp(1), 3);
        assert_eq!(GF.exp(928), 1);
        for a in 1..929 {
            assert_eq!(GF.exp(GF.log(a)), a);
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(GF.add(900, 100), 71);
        assert_eq!(GF.subtract(5, 10), 924);
        assert_eq!(GF.multiply(400, 3), 271);
        for a in [1, 2, 3, 467, 928] {
            assert_eq!(GF.multiply(a, GF.inverse(a)), 1);
        }
    }
}

// Polynomial over GF(929), highest degree coefficient first
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulusPoly {
    coefficients: Vec<u32>,
}

impl ModulusPoly {
    /// Leading zeros are stripped; an empty or all zero slice is the zero polynomial.
    pub fn new(coefficients: &[u32]) -> Self {
        match coefficients.iter().position(|&c| c != 0) {
            Some(first) => Self { coefficients: coefficients[first..].to_vec() },
            None => Self { coefficients: vec![0] },
        }
    }

    pub fn coefficients(&self) -> &[u32] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients[0] == 0
    }

    pub fn coefficient(&self, degree: usize) -> u32 {
        self.coefficients[self.coefficients.len() - 1 - degree]
    }

    pub fn evaluate_at(&self, a: u32) -> u32 {
        let gf = &PDF417_GF;
        if a == 0 {
            return self.coefficient(0);
        }
        if a == 1 {
            return self.coefficients.iter().fold(0, |acc, &c| gf.add(acc, c));
        }
        self.coefficients.iter().fold(0, |acc, &c| gf.add(gf.multiply(a, acc), c))
    }

    pub fn add(&self, other: &Self) -> Self {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }
        let (small, large) = if self.coefficients.len() > other.coefficients.len() {
            (&other.coefficients, &self.coefficients)
        } else {
            (&self.coefficients, &other.coefficients)
        };
        let diff = large.len() - small.len();
        let mut sum = large.clone();
        for (s, &c) in sum[diff..].iter_mut().zip(small.iter()) {
            *s = PDF417_GF.add(*s, c);
        }
        Self::new(&sum)
    }

    pub fn subtract(&self, other: &Self) -> Self {
        if other.is_zero() {
            return self.clone();
        }
        self.add(&other.negative())
    }

    pub fn multiply(&self, other: &Self) -> Self {
        let gf = &PDF417_GF;
        if self.is_zero() || other.is_zero() {
            return gf.zero();
        }
        let mut product = vec![0; self.coefficients.len() + other.coefficients.len() - 1];
        for (i, &a) in self.coefficients.iter().enumerate() {
            for (j, &b) in other.coefficients.iter().enumerate() {
                product[i + j] = gf.add(product[i + j], gf.multiply(a, b));
            }
        }
        Self::new(&product)
    }

    pub fn multiply_scalar(&self, scalar: u32) -> Self {
        match scalar {
            0 => PDF417_GF.zero(),
            1 => self.clone(),
            _ => {
                let product: Vec<u32> =
                    self.coefficients.iter().map(|&c| PDF417_GF.multiply(c, scalar)).collect();
                Self::new(&product)
            }
        }
    }

    pub fn multiply_by_monomial(&self, degree: usize, coefficient: u32) -> Self {
        if coefficient == 0 {
            return PDF417_GF.zero();
        }
        let mut product = vec![0; self.coefficients.len() + degree];
        for (p, &c) in product.iter_mut().zip(self.coefficients.iter()) {
            *p = PDF417_GF.multiply(c, coefficient);
        }
        Self::new(&product)
    }

    pub fn negative(&self) -> Self {
        let neg: Vec<u32> = self.coefficients.iter().map(|&c| PDF417_GF.subtract(0, c)).collect();
        Self::new(&neg)
    }

    /// Quotient and remainder. The divisor must not be zero.
    pub fn divide(&self, other: &Self) -> (Self, Self) {
        let gf = &PDF417_GF;
        debug_assert!(!other.is_zero(), "Division by zero polynomial");

        let mut quotient = gf.zero();
        let mut remainder = self.clone();
        let inv_lead = gf.inverse(other.coefficient(other.degree()));

        while remainder.degree() >= other.degree() && !remainder.is_zero() {
            let diff = remainder.degree() - other.degree();
            let scale = gf.multiply(remainder.coefficient(remainder.degree()), inv_lead);
            quotient = quotient.add(&gf.build_monomial(diff, scale));
            remainder = remainder.subtract(&other.multiply_by_monomial(diff, scale));
        }
        (quotient, remainder)
    }
}


// Error correction
//------------------------------------------------------------------------------

/// Corrects `received` in place using its last `num_ec` codewords, returning the number of
/// codewords changed. Erasure positions are only counted against the caller's bound; the
/// locator search finds them like any other error.
pub fn correct(received: &mut [u32], num_ec: usize, erasures: &[usize]) -> ScanResult<usize> {
    let gf = &PDF417_GF;
    debug_assert!(received.iter().all(|&c| c < MODULUS), "Codeword out of field");

    let poly = ModulusPoly::new(received);
    let synd = syndromes(&poly, num_ec);
    if synd.iter().all(|&s| s == 0) {
        return Ok(0);
    }
    if !erasures.is_empty() {
        trace!("Correcting with {} known erasures", erasures.len());
    }

    let syndrome = ModulusPoly::new(&synd);
    let (sigma, omega) = euclidean(gf.build_monomial(num_ec, 1), syndrome, num_ec)?;
    let locations = error_locations(&sigma)?;
    let magnitudes = error_magnitudes(&omega, &sigma, &locations);

    let len = received.len();
    for (&loc, &mag) in locations.iter().zip(magnitudes.iter()) {
        let pos = gf.log(loc);
        if pos >= len {
            trace!("Error location {pos} outside {len} codewords");
            return Err(ScanError::Checksum);
        }
        let i = len - 1 - pos;
        received[i] = gf.subtract(received[i], mag);
    }

    if syndromes(&ModulusPoly::new(received), num_ec).iter().any(|&s| s != 0) {
        return Err(ScanError::Checksum);
    }
    Ok(locations.len())
}

fn syndromes(poly: &ModulusPoly, num_ec: usize) -> Vec<u32> {
    let mut synd = vec![0; num_ec];
    for i in (1..=num_ec).rev() {
        synd[num_ec - i] = poly.evaluate_at(PDF417_GF.exp(i));
    }
    synd
}

fn euclidean(a: ModulusPoly, b: ModulusPoly, r: usize) -> ScanResult<(ModulusPoly, ModulusPoly)> {
    let gf = &PDF417_GF;
    let (a, b) = if a.degree() < b.degree() { (b, a) } else { (a, b) };

    let mut r_last = a;
    let mut r_cur = b;
    let mut t_last = gf.zero();
    let mut t_cur = gf.one();

    while r_cur.degree() >= r / 2 {
        let r_last_last = std::mem::replace(&mut r_last, r_cur);
        let t_last_last = std::mem::replace(&mut t_last, t_cur);
        if r_last.is_zero() {
            return Err(ScanError::Checksum);
        }

        r_cur = r_last_last;
        let mut q = gf.zero();
        let inv_lead = gf.inverse(r_last.coefficient(r_last.degree()));
        while r_cur.degree() >= r_last.degree() && !r_cur.is_zero() {
            let diff = r_cur.degree() - r_last.degree();
            let scale = gf.multiply(r_cur.coefficient(r_cur.degree()), inv_lead);
            q = q.add(&gf.build_monomial(diff, scale));
            r_cur = r_cur.subtract(&r_last.multiply_by_monomial(diff, scale));
        }
        t_cur = q.multiply(&t_last).subtract(&t_last_last).negative();
    }

    let sigma_at_zero = t_cur.coefficient(0);
    if sigma_at_zero == 0 {
        return Err(ScanError::Checksum);
    }
    let inv = gf.inverse(sigma_at_zero);
    Ok((t_cur.multiply_scalar(inv), r_cur.multiply_scalar(inv)))
}

// Chien search over every non zero field element
fn error_locations(sigma: &ModulusPoly) -> ScanResult<Vec<u32>> {
    let n = sigma.degree();
    if n == 0 {
        return Err(ScanError::Checksum);
    }
    let locs: Vec<u32> = (1..MODULUS)
        .filter(|&i| sigma.evaluate_at(i) == 0)
        .take(n)
        .map(|i| PDF417_GF.inverse(i))
        .collect();
    if locs.len() != n {
        trace!("Locator of degree {n} has {} roots", locs.len());
        return Err(ScanError::Checksum);
    }
    Ok(locs)
}

// Forney, with the formal derivative taken over the prime field
fn error_magnitudes(omega: &ModulusPoly, sigma: &ModulusPoly, locations: &[u32]) -> Vec<u32> {
    let gf = &PDF417_GF;
    let deg = sigma.degree();
    let mut deriv = vec![0; deg];
    for i in 1..=deg {
        deriv[deg - i] = gf.multiply(i as u32, sigma.coefficient(i));
    }
    let deriv = ModulusPoly::new(&deriv);

    locations
        .iter()
        .map(|&loc| {
            let xi_inv = gf.inverse(loc);
            let num = gf.subtract(0, omega.evaluate_at(xi_inv));
            let den = gf.inverse(deriv.evaluate_at(xi_inv));
            gf.multiply(num, den)
        })
        .collect()
}

/// Appends `2 << ec_level` error correction codewords so that the whole array evaluates
/// to zero at `3^1 ..= 3^n`.
pub fn add_error_correction(codewords: &mut Vec<u32>, ec_level: u32) -> ScanResult<()> {
    if ec_level > 8 || codewords.iter().any(|&c| c >= MODULUS) {
        return Err(ScanError::InvalidArgument);
    }
    let gf = &PDF417_GF;
    let num_ec = super::num_ec_codewords(ec_level);

    let mut generator = gf.one();
    for i in 1..=num_ec {
        generator = generator.multiply(&ModulusPoly::new(&[1, gf.subtract(0, gf.exp(i))]));
    }

    let info = ModulusPoly::new(codewords).multiply_by_monomial(num_ec, 1);
    let (_, rem) = info.divide(&generator);
    let ecc = rem.negative();

    // Remainder may have lost leading zeros
    let ecc = ecc.coefficients();
    let pad = if ecc == [0] { num_ec } else { num_ec - ecc.len() };
    codewords.resize(codewords.len() + pad, 0);
    if ecc != [0] {
        codewords.extend_from_slice(ecc);
    }
    Ok(())
}

#[cfg(test)]
mod ec_tests {
    use test_case::test_case;

    use super::{add_error_correction, correct};
    use crate::common::error::ScanError;

    fn encoded(data: &[u32], ec_level: u32) -> Vec<u32> {
        let mut cw = data.to_vec();
        add_error_correction(&mut cw, ec_level).unwrap();
        cw
    }

    #[test_case(0, &[156, 765])]
    #[test_case(1, &[168, 875, 63, 355])]
    fn test_known_ec_codewords(ec_level: u32, exp: &[u32]) {
        let data = [16, 902, 1, 278, 827, 900, 295, 902, 2, 326, 823, 544, 900, 149, 900, 900];
        let cw = encoded(&data, ec_level);
        assert_eq!(&cw[data.len()..], exp);
    }

    #[test]
    fn test_add_error_correction_length() {
        for ec_level in 0..=8 {
            let cw = encoded(&[5, 453, 178, 121, 239], ec_level);
            assert_eq!(cw.len(), 5 + (2 << ec_level));
        }
    }

    #[test]
    fn test_clean() {
        let mut cw = encoded(&[5, 453, 178, 121, 239], 2);
        let orig = cw.clone();
        assert_eq!(correct(&mut cw, 8, &[]), Ok(0));
        assert_eq!(cw, orig);
    }

    #[test_case(&[0], 1)]
    #[test_case(&[3, 9], 2)]
    #[test_case(&[0, 4, 7, 12], 4)]
    fn test_correct_errors(positions: &[usize], expected: usize) {
        let data: Vec<u32> = (0..20).map(|i| (i * 37 + 11) % 900).collect();
        let orig = encoded(&data, 2);
        let mut cw = orig.clone();
        for &p in positions {
            cw[p] = (cw[p] + 100) % 929;
        }
        assert_eq!(correct(&mut cw, 8, &[]), Ok(expected));
        assert_eq!(cw, orig);
    }

    #[test]
    fn test_error_in_ec_codewords() {
        let orig = encoded(&[4, 1, 2, 3], 1);
        let mut cw = orig.clone();
        let last = cw.len() - 1;
        cw[last] = (cw[last] + 1) % 929;
        cw[last - 1] = (cw[last - 1] + 17) % 929;
        assert_eq!(correct(&mut cw, 4, &[]), Ok(2));
        assert_eq!(cw, orig);
    }

    #[test]
    fn test_too_many_errors() {
        let data: Vec<u32> = (0..20).map(|i| (i * 37 + 11) % 900).collect();
        let mut cw = encoded(&data, 2);
        for p in [0, 2, 4, 6, 8] {
            cw[p] = (cw[p] + 1) % 929;
        }
        assert_eq!(correct(&mut cw, 8, &[]), Err(ScanError::Checksum));
    }

    #[test]
    fn test_bad_ec_level() {
        let mut cw = vec![1, 2];
        assert_eq!(add_error_correction(&mut cw, 9), Err(ScanError::InvalidArgument));
        let mut cw = vec![1, 929];
        assert_eq!(add_error_correction(&mut cw, 0), Err(ScanError::InvalidArgument));
    }
}
