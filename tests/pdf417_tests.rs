#[cfg(test)]
mod pdf417_ec_tests {
    use rand::rngs::StdRng;
    use rand::seq::index::sample;
    use rand::{Rng, SeedableRng};

    use optiscan::pdf417::{add_error_correction, correct, num_ec_codewords};

    fn random_symbol(rng: &mut StdRng, data_len: usize, ec_level: u32) -> Vec<u32> {
        let mut codewords: Vec<u32> = (0..data_len).map(|_| rng.random_range(0..900)).collect();
        codewords[0] = data_len as u32;
        add_error_correction(&mut codewords, ec_level).unwrap();
        codewords
    }

    #[test]
    fn test_random_errors_within_capacity() {
        let mut rng = StdRng::seed_from_u64(929);
        for ec_level in 0..=5 {
            let num_ec = num_ec_codewords(ec_level);
            for _ in 0..20 {
                let data_len = rng.random_range(2..120);
                let orig = random_symbol(&mut rng, data_len, ec_level);
                let mut received = orig.clone();

                let num_errors = rng.random_range(0..=num_ec / 2);
                for i in sample(&mut rng, received.len(), num_errors) {
                    received[i] = (received[i] + rng.random_range(1..929)) % 929;
                }

                let corrected = correct(&mut received, num_ec, &[]).unwrap();
                assert_eq!(corrected, num_errors, "ec level {ec_level}");
                assert_eq!(received, orig);
            }
        }
    }

    #[test]
    fn test_erasure_positions_are_corrected() {
        let mut rng = StdRng::seed_from_u64(7);
        let orig = random_symbol(&mut rng, 30, 3);
        let mut received = orig.clone();
        let erasures = [0, 11, 29, 40];
        for &i in &erasures {
            received[i] = 0;
        }
        correct(&mut received, num_ec_codewords(3), &erasures).unwrap();
        assert_eq!(received, orig);
    }
}

#[cfg(test)]
mod pdf417_decode_tests {
    use optiscan::pdf417::{add_error_correction, decode_ambiguous, decode_codewords};
    use optiscan::ScanError;

    fn protect(mut codewords: Vec<u32>, ec_level: u32) -> Vec<u32> {
        codewords[0] = codewords.len() as u32;
        add_error_correction(&mut codewords, ec_level).unwrap();
        codewords
    }

    #[test]
    fn test_mixed_modes() {
        // "PDF417", numeric "000213298174000", byte "Hi"
        let data = vec![0, 453, 178, 121, 239, 902, 1, 624, 434, 632, 282, 200, 901, 72, 105];
        let mut codewords = protect(data, 2);
        codewords[6] = 0;
        codewords[13] = 0;

        let res = decode_codewords(&mut codewords, 2, &[13]).unwrap();
        assert_eq!(res.text, "PDF417000213298174000Hi");
        assert_eq!(res.byte_segments, vec![b"Hi".to_vec()]);
        assert_eq!(res.errors_corrected, 2);
        assert_eq!(res.erasures, 1);
    }

    #[test]
    fn test_macro_segment() {
        let data = vec![0, 1, 928, 111, 103, 1, 89, 923, 1, 114, 922];
        let mut codewords = protect(data, 1);
        let res = decode_codewords(&mut codewords, 1, &[]).unwrap();
        let md = res.macro_metadata.unwrap();
        assert_eq!(md.segment_index, 3);
        assert_eq!(md.segment_count, Some(14));
        assert!(md.last_segment);
    }

    #[test]
    fn test_ambiguous_exhaustion_is_checksum() {
        let mut codewords = protect(vec![0, 453, 178, 121, 239], 2);
        for i in [1, 2, 4, 5, 6] {
            codewords[i] = (codewords[i] + 1) % 929;
        }
        let res = decode_ambiguous(2, &codewords, &[], &[3], &[vec![5, 6, 7]]);
        assert_eq!(res, Err(ScanError::Checksum));
    }
}
