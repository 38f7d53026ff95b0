use log::debug;

use crate::common::bit_array::BitArray;
use crate::common::byte_matrix::ByteMatrix;
use crate::common::error::{ScanError, ScanResult};
use crate::common::mask::{compute_total_penalty, MaskPattern};
use crate::common::metadata::{format_info, ECLevel, Version};

/// Lays out a complete symbol: function patterns, format and version information, then
/// the codeword bits masked with `mask`.
pub fn build_matrix(
    bits: &BitArray,
    ecl: ECLevel,
    ver: Version,
    mask: MaskPattern,
    matrix: &mut ByteMatrix,
) -> ScanResult<()> {
    matrix.clear();
    embed_basic_patterns(ver, matrix);
    embed_type_info(ecl, mask, matrix);
    embed_version_info(ver, matrix);
    embed_data_bits(bits, Some(mask), matrix)
}

// Finder pattern
//------------------------------------------------------------------------------

const FINDER_WIDTH: usize = 7;

fn embed_finder_pattern_at(x0: usize, y0: usize, matrix: &mut ByteMatrix) {
    for dy in 0..FINDER_WIDTH {
        for dx in 0..FINDER_WIDTH {
            // Chebyshev distance from the centre picks the ring
            let ring = dx.abs_diff(3).max(dy.abs_diff(3));
            matrix.set(x0 + dx, y0 + dy, ring != 2);
        }
    }
}

fn embed_finder_patterns(matrix: &mut ByteMatrix) {
    let w = matrix.width();
    let h = matrix.height();

    embed_finder_pattern_at(0, 0, matrix);
    embed_finder_pattern_at(w - FINDER_WIDTH, 0, matrix);
    embed_finder_pattern_at(0, h - FINDER_WIDTH, matrix);

    // Separators
    for i in 0..8 {
        matrix.set(i, 7, false);
        matrix.set(w - 8 + i, 7, false);
        matrix.set(i, h - 8, false);
    }
    for i in 0..7 {
        matrix.set(7, i, false);
        matrix.set(w - 8, i, false);
        matrix.set(7, h - 7 + i, false);
    }
}

#[cfg(test)]
mod finder_pattern_tests {
    use super::embed_finder_patterns;
    use crate::common::byte_matrix::ByteMatrix;

    #[test]
    fn test_finder_rings() {
        let mut matrix = ByteMatrix::new(21, 21);
        embed_finder_patterns(&mut matrix);
        assert_eq!(matrix.row(0)[..8], [1, 1, 1, 1, 1, 1, 1, 0]);
        assert_eq!(matrix.row(1)[..8], [1, 0, 0, 0, 0, 0, 1, 0]);
        assert_eq!(matrix.row(3)[13..], [0, 1, 0, 1, 1, 1, 0, 1]);
        assert_eq!(matrix.row(13)[..9], [0, 0, 0, 0, 0, 0, 0, 0, -1]);
        assert!(matrix.is_empty(8, 8));
        assert!(matrix.is_empty(20, 20));
    }
}

// Timing pattern & dark module
//------------------------------------------------------------------------------

fn embed_timing_patterns(matrix: &mut ByteMatrix) {
    for i in 8..matrix.width() - 8 {
        let bit = (i + 1) % 2 == 1;
        if matrix.is_empty(i, 6) {
            matrix.set(i, 6, bit);
        }
        if matrix.is_empty(6, i) {
            matrix.set(6, i, bit);
        }
    }
}

fn embed_dark_module(matrix: &mut ByteMatrix) {
    let h = matrix.height();
    matrix.set(8, h - 8, true);
}

// Alignment pattern
//------------------------------------------------------------------------------

fn embed_alignment_patterns(ver: Version, matrix: &mut ByteMatrix) {
    let poses = ver.alignment_pattern();
    for &y in poses {
        for &x in poses {
            // Centres covered by finder patterns are skipped
            if !matrix.is_empty(x, y) {
                continue;
            }
            for dy in 0..5usize {
                for dx in 0..5usize {
                    let ring = dx.abs_diff(2).max(dy.abs_diff(2));
                    matrix.set(x - 2 + dx, y - 2 + dy, ring != 1);
                }
            }
        }
    }
}

/// Finder patterns with separators, dark module, alignment and timing patterns.
pub fn embed_basic_patterns(ver: Version, matrix: &mut ByteMatrix) {
    embed_finder_patterns(matrix);
    embed_dark_module(matrix);
    embed_alignment_patterns(ver, matrix);
    embed_timing_patterns(matrix);
}


// Format & version info
//------------------------------------------------------------------------------

/// Main copy of the type information, bit 0 first, as (x, y).
const TYPE_INFO_COORDS: [(usize, usize); 15] = [
    (8, 0),
    (8, 1),
    (8, 2),
    (8, 3),
    (8, 4),
    (8, 5),
    (8, 7),
    (8, 8),
    (7, 8),
    (5, 8),
    (4, 8),
    (3, 8),
    (2, 8),
    (1, 8),
    (0, 8),
];

pub fn embed_type_info(ecl: ECLevel, mask: MaskPattern, matrix: &mut ByteMatrix) {
    let info = format_info(ecl, mask);
    let (w, h) = (matrix.width(), matrix.height());
    for (i, &(x, y)) in TYPE_INFO_COORDS.iter().enumerate() {
        let bit = (info >> i) & 1 == 1;
        matrix.set(x, y, bit);

        if i < 8 {
            matrix.set(w - 1 - i, 8, bit);
        } else {
            matrix.set(8, h - 7 + (i - 8), bit);
        }
    }
}

/// Writes both 6x3 version blocks. Versions below 7 carry none.
pub fn embed_version_info(ver: Version, matrix: &mut ByteMatrix) {
    if *ver < 7 {
        return;
    }
    let info = ver.info();
    let h = matrix.height();
    for i in 0..6 {
        for j in 0..3 {
            let bit = (info >> (i * 3 + j)) & 1 == 1;
            matrix.set(i, h - 11 + j, bit);
            matrix.set(h - 11 + j, i, bit);
        }
    }
}

#[cfg(test)]
mod info_tests {
    use super::{embed_type_info, embed_version_info};
    use crate::common::byte_matrix::ByteMatrix;
    use crate::common::mask::MaskPattern;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_type_info() {
        let mut matrix = ByteMatrix::new(21, 21);
        embed_type_info(ECLevel::M, MaskPattern::new(5).unwrap(), &mut matrix);
        let empty = "                                          \n";
        let col8 = |b: char| format!("                 {b}                        \n");
        let mut expected = String::new();
        for b in ['0', '1', '1', '1', '0', '0'] {
            expected += &col8(b);
        }
        expected += empty;
        expected += &col8('1');
        expected += " 1 0 0 0 0 0   0 1         1 1 0 0 1 1 1 0\n";
        for _ in 9..14 {
            expected += empty;
        }
        for b in ['0', '0', '0', '0', '0', '0', '1'] {
            expected += &col8(b);
        }
        assert_eq!(matrix.to_string(), expected);
    }

    #[test]
    fn test_version_info() {
        // 21x21 keeps the picture small; placement only depends on the height
        let mut matrix = ByteMatrix::new(21, 21);
        embed_version_info(Version::new(7).unwrap(), &mut matrix);
        let empty = "                                          \n";
        let mut expected = String::new();
        for r in ["0 0 1", "0 1 0", "0 1 0", "0 1 1", "1 1 1", "0 0 0"] {
            expected += &format!("                     {r}                \n");
        }
        for _ in 6..10 {
            expected += empty;
        }
        for r in ["0 0 0 0 1 0", "0 1 1 1 1 0", "1 0 0 1 1 0"] {
            expected += &format!(" {r}                              \n");
        }
        for _ in 13..21 {
            expected += empty;
        }
        assert_eq!(matrix.to_string(), expected);
    }

    #[test]
    fn test_no_version_info_below_7() {
        let mut matrix = ByteMatrix::new(41, 41);
        embed_version_info(Version::new(6).unwrap(), &mut matrix);
        assert_eq!(matrix, ByteMatrix::new(41, 41));
    }
}

// Data placement
//------------------------------------------------------------------------------

/// Fills every empty module in the two-column zigzag, starting bottom right. Modules past
/// the end of `bits` are light before masking.
pub fn embed_data_bits(
    bits: &BitArray,
    mask: Option<MaskPattern>,
    matrix: &mut ByteMatrix,
) -> ScanResult<()> {
    let (w, h) = (matrix.width() as isize, matrix.height() as isize);
    let mut bit_index = 0;
    let mut dir = -1;
    let mut x = w - 1;
    let mut y = h - 1;

    while x > 0 {
        // Skip the vertical timing pattern
        if x == 6 {
            x -= 1;
        }
        while y >= 0 && y < h {
            for xx in [x, x - 1] {
                let (cx, cy) = (xx as usize, y as usize);
                if !matrix.is_empty(cx, cy) {
                    continue;
                }
                let mut bit = if bit_index < bits.size() {
                    let b = bits.get(bit_index);
                    bit_index += 1;
                    b
                } else {
                    false
                };
                if let Some(mask) = mask {
                    bit ^= mask.is_masked(cx, cy);
                }
                matrix.set(cx, cy, bit);
            }
            y += dir;
        }
        dir = -dir;
        y += dir;
        x -= 2;
    }

    if bit_index != bits.size() {
        debug!("Data placement left bits unplaced: {bit_index} of {}", bits.size());
        return Err(ScanError::DataTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod data_placement_tests {
    use super::{build_matrix, embed_basic_patterns, embed_data_bits};
    use crate::common::bit_array::BitArray;
    use crate::common::byte_matrix::ByteMatrix;
    use crate::common::mask::MaskPattern;
    use crate::common::metadata::{ECLevel, Version};
    use crate::ScanError;

    #[test]
    fn test_empty_bits_fill_light() {
        let mut matrix = ByteMatrix::new(21, 21);
        embed_basic_patterns(Version::new(1).unwrap(), &mut matrix);
        embed_data_bits(&BitArray::new(0), None, &mut matrix).unwrap();
        let expected = [
            " 1 1 1 1 1 1 1 0 0 0 0 0 0 0 1 1 1 1 1 1 1\n",
            " 1 0 0 0 0 0 1 0 0 0 0 0 0 0 1 0 0 0 0 0 1\n",
            " 1 0 1 1 1 0 1 0 0 0 0 0 0 0 1 0 1 1 1 0 1\n",
            " 1 0 1 1 1 0 1 0 0 0 0 0 0 0 1 0 1 1 1 0 1\n",
            " 1 0 1 1 1 0 1 0 0 0 0 0 0 0 1 0 1 1 1 0 1\n",
            " 1 0 0 0 0 0 1 0 0 0 0 0 0 0 1 0 0 0 0 0 1\n",
            " 1 1 1 1 1 1 1 0 1 0 1 0 1 0 1 1 1 1 1 1 1\n",
            " 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 0 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 0 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 0 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 0 0 0 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 1 1 1 1 1 1 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 1 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 1 0 1 1 1 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 1 0 1 1 1 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 1 0 1 1 1 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 1 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            " 1 1 1 1 1 1 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
        ];
        assert_eq!(matrix.to_string(), expected.concat());
    }

    #[test]
    fn test_too_many_bits() {
        let mut matrix = ByteMatrix::new(21, 21);
        let ver = Version::new(1).unwrap();
        let mask = MaskPattern::new(0).unwrap();
        let bits = BitArray::new(26 * 8 + 1);
        assert_eq!(
            build_matrix(&bits, ECLevel::L, ver, mask, &mut matrix),
            Err(ScanError::DataTooLong)
        );
    }

    #[test]
    fn test_build_matrix() {
        let bytes = [
            32, 65, 205, 69, 41, 220, 46, 128, 236, 42, 159, 74, 221, 244, 169, 239, 150, 138, 70,
            237, 85, 224, 96, 74, 219, 61,
        ];
        let mut bits = BitArray::new(0);
        for b in bytes {
            bits.append_bits(b, 8).unwrap();
        }
        let mut matrix = ByteMatrix::new(21, 21);
        let ver = Version::new(1).unwrap();
        let mask = MaskPattern::new(3).unwrap();
        build_matrix(&bits, ECLevel::H, ver, mask, &mut matrix).unwrap();
        let expected = [
            " 1 1 1 1 1 1 1 0 0 1 1 0 0 0 1 1 1 1 1 1 1\n",
            " 1 0 0 0 0 0 1 0 0 0 0 0 0 0 1 0 0 0 0 0 1\n",
            " 1 0 1 1 1 0 1 0 0 0 0 1 0 0 1 0 1 1 1 0 1\n",
            " 1 0 1 1 1 0 1 0 0 1 1 0 0 0 1 0 1 1 1 0 1\n",
            " 1 0 1 1 1 0 1 0 1 1 0 0 1 0 1 0 1 1 1 0 1\n",
            " 1 0 0 0 0 0 1 0 0 0 1 1 1 0 1 0 0 0 0 0 1\n",
            " 1 1 1 1 1 1 1 0 1 0 1 0 1 0 1 1 1 1 1 1 1\n",
            " 0 0 0 0 0 0 0 0 1 1 0 1 1 0 0 0 0 0 0 0 0\n",
            " 0 0 1 1 0 0 1 1 1 0 0 1 1 1 1 0 1 0 0 0 0\n",
            " 1 0 1 0 1 0 0 0 0 0 1 1 1 0 0 1 0 1 1 1 0\n",
            " 1 1 1 1 0 1 1 0 1 0 1 1 1 0 0 1 1 1 0 1 0\n",
            " 1 0 1 0 1 1 0 1 1 1 0 0 1 1 1 0 0 1 0 1 0\n",
            " 0 0 1 0 0 1 1 1 0 0 0 0 0 0 1 0 1 1 1 1 1\n",
            " 0 0 0 0 0 0 0 0 1 1 0 1 0 0 0 0 0 1 0 1 1\n",
            " 1 1 1 1 1 1 1 0 1 1 1 1 0 0 0 0 1 0 1 1 0\n",
            " 1 0 0 0 0 0 1 0 0 0 0 1 0 1 1 1 0 0 0 0 0\n",
            " 1 0 1 1 1 0 1 0 0 1 0 0 1 1 0 0 1 0 0 1 1\n",
            " 1 0 1 1 1 0 1 0 1 1 0 1 0 0 0 0 0 1 1 1 0\n",
            " 1 0 1 1 1 0 1 0 1 1 1 1 0 0 0 0 1 1 1 0 0\n",
            " 1 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 1 0 1 0 0\n",
            " 1 1 1 1 1 1 1 0 0 0 1 1 1 1 1 0 1 0 0 1 0\n",
        ];
        assert_eq!(matrix.to_string(), expected.concat());
    }
}

// Mask selection
//------------------------------------------------------------------------------

/// Builds the symbol under every mask and keeps the first one with the lowest penalty.
pub fn choose_mask(
    bits: &BitArray,
    ecl: ECLevel,
    ver: Version,
    matrix: &mut ByteMatrix,
) -> ScanResult<MaskPattern> {
    let mut best: Option<(u32, MaskPattern)> = None;
    for mask in MaskPattern::all() {
        build_matrix(bits, ecl, ver, mask, matrix)?;
        let penalty = compute_total_penalty(matrix);
        debug!("Mask {} penalty {penalty}", *mask);
        if best.map_or(true, |(p, _)| penalty < p) {
            best = Some((penalty, mask));
        }
    }
    let (_, mask) = best.ok_or(ScanError::InvalidMask)?;
    Ok(mask)
}
