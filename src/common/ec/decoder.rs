use log::trace;

use super::{galois::G, Block, MAX_BLOCK_SIZE, MAX_EC_SIZE};
use crate::common::error::{ScanError, ScanResult};

// Rectifier
//------------------------------------------------------------------------------

impl Block {
    /// Corrects errors in place, returning how many codewords were changed.
    /// Fails with `Checksum` when the errors exceed what the ec codewords can fix.
    pub fn rectify(&mut self) -> ScanResult<usize> {
        let synd = match self.syndromes() {
            Ok(()) => return Ok(0),
            Err(s) => s,
        };

        let ec_len = self.ec_len();
        let (sig, l) = self.berlkamp_massey(&synd);
        if 2 * l > ec_len {
            return Err(ScanError::Checksum);
        }

        let err_loc = self.chien_search(&sig, l);
        let found = err_loc[..self.len].iter().filter(|&&e| e).count();
        if found != l {
            trace!("Locator of degree {l} has {found} roots");
            return Err(ScanError::Checksum);
        }

        // Formal derivative, only odd powers survive in characteristic 2
        let mut dsig = [G(0); MAX_EC_SIZE];
        for i in (1..MAX_EC_SIZE).step_by(2) {
            dsig[i - 1] = sig[i];
        }

        let omg = self.omega(&synd, &sig);
        let err_mag = self.forney(&omg, &dsig, &err_loc)?;

        for (d, &g) in self.data[..self.len].iter_mut().zip(err_mag.iter()) {
            *d = (G(*d) + g).into();
        }

        match self.syndromes() {
            Ok(()) => Ok(l),
            Err(_) => Err(ScanError::Checksum),
        }
    }

    fn syndromes(&self) -> Result<(), [G; MAX_EC_SIZE]> {
        let ec_len = self.ec_len();
        let mut synd = [G(0); MAX_EC_SIZE];

        let mut gdata = [G(0); MAX_BLOCK_SIZE];
        for (g, &b) in gdata.iter_mut().zip(self.data[..self.len].iter()) {
            *g = G(b);
        }
        for (i, s) in synd.iter_mut().take(ec_len).enumerate() {
            *s = eval_poly(gdata[..self.len].iter().rev(), G::gen_pow(i));
        }

        if synd.iter().all(|s| s.is_zero()) {
            Ok(())
        } else {
            Err(synd)
        }
    }

    // Sigma polynomial and its degree
    fn berlkamp_massey(&self, synd: &[G]) -> ([G; MAX_EC_SIZE], usize) {
        let mut l = 0usize;
        let mut m = 1usize;
        let mut b = G(1);
        let mut cx = [G(0); MAX_EC_SIZE];
        let mut bx = [G(0); MAX_EC_SIZE];
        let mut tx = [G(0); MAX_EC_SIZE];
        cx[0] = G(1);
        bx[0] = G(1);

        for n in 0..self.ec_len() {
            let mut d = synd[n];
            for i in 1..=l {
                d += cx[i] * synd[n - i];
            }

            if d.is_zero() {
                m += 1;
                continue;
            }

            tx.copy_from_slice(&cx);
            let scale = d / b;
            for i in 0..MAX_EC_SIZE - m {
                cx[i + m] += scale * bx[i];
            }

            if 2 * l <= n {
                bx.copy_from_slice(&tx);
                l = n + 1 - l;
                b = d;
                m = 1;
            } else {
                m += 1;
            }
        }
        (cx, l)
    }

    // Error positions
    fn chien_search(&self, sig: &[G; MAX_EC_SIZE], l: usize) -> [bool; MAX_BLOCK_SIZE] {
        let mut err_loc = [false; MAX_BLOCK_SIZE];
        for (i, e) in err_loc[..self.len].iter_mut().rev().enumerate() {
            *e = eval_poly(sig[..=l].iter(), G::gen_pow(255 - i)).is_zero();
        }
        err_loc
    }

    // Error evaluator polynomial
    fn omega(&self, synd: &[G; MAX_EC_SIZE], sig: &[G; MAX_EC_SIZE]) -> [G; MAX_EC_SIZE] {
        let t = self.ec_len() - 1;
        let mut omg = [G(0); MAX_EC_SIZE];
        for i in 0..t {
            let sy = synd[i + 1];
            for j in 0..t - i {
                omg[i + j] += sy * sig[j];
            }
        }
        omg
    }

    fn forney(
        &self,
        omg: &[G; MAX_EC_SIZE],
        dsig: &[G; MAX_EC_SIZE],
        err_loc: &[bool; MAX_BLOCK_SIZE],
    ) -> ScanResult<[G; MAX_BLOCK_SIZE]> {
        let mut mag = [G(0); MAX_BLOCK_SIZE];
        for (i, &is_err) in err_loc[..self.len].iter().rev().enumerate() {
            if !is_err {
                continue;
            }
            let xinv = G::gen_pow(255 - i);
            let sig_x = eval_poly(dsig.iter(), xinv);
            if sig_x.is_zero() {
                return Err(ScanError::Checksum);
            }
            mag[self.len - 1 - i] += eval_poly(omg.iter(), xinv) / sig_x;
        }
        Ok(mag)
    }
}

fn eval_poly<'a>(poly: impl Iterator<Item = &'a G>, x: G) -> G {
    let mut res = G(0);
    let mut xpow = G(1);
    for &coeff in poly {
        res += coeff * xpow;
        xpow *= x;
    }
    res
}

// Closest valid format or version word within `err_capacity` bit flips
pub fn rectify_info(info: u32, valid_numbers: &[u32], err_capacity: u32) -> ScanResult<u32> {
    let res = *valid_numbers
        .iter()
        .min_by_key(|&n| (info ^ n).count_ones())
        .ok_or(ScanError::Format)?;

    if (info ^ res).count_ones() <= err_capacity {
        Ok(res)
    } else {
        Err(ScanError::Format)
    }
}
