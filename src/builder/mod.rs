mod ec;
mod matrix;
mod qr;

pub use ec::{block_layout, interleave};
pub use matrix::{build_matrix, choose_mask};
pub use qr::{QRCode, QUIET_ZONE};

use log::{debug, info};

use crate::common::{
    bit_array::BitArray,
    byte_matrix::ByteMatrix,
    charset::Charset,
    codec::encode,
    error::ScanResult,
    mask::MaskPattern,
    metadata::{ECLevel, Version},
};

pub struct QRBuilder<'a> {
    data: &'a str,
    version: Option<Version>,
    ec_level: ECLevel,
    mask: Option<MaskPattern>,
    charset: Option<Charset>,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a str) -> Self {
        Self { data, version: None, ec_level: ECLevel::M, mask: None, charset: None }
    }

    pub fn data(&mut self, data: &'a str) -> &mut Self {
        self.data = data;
        self
    }

    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn unset_version(&mut self) -> &mut Self {
        self.version = None;
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    /// Character set for byte mode. Anything other than ISO-8859-1 is announced with an ECI.
    pub fn charset(&mut self, charset: Charset) -> &mut Self {
        self.charset = Some(charset);
        self
    }

    pub fn metadata(&self) -> String {
        match self.version {
            Some(v) => format!("{{ Version: {}, Ec level: {} }}", *v, self.ec_level),
            None => format!("{{ Version: None, Ec level: {} }}", self.ec_level),
        }
    }
}

#[cfg(test)]
mod qrbuilder_util_tests {
    use super::QRBuilder;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_metadata() {
        let mut qr_builder = QRBuilder::new("Hello, world!");
        qr_builder.version(Version::new(1).unwrap()).ec_level(ECLevel::L);
        assert_eq!(qr_builder.metadata(), "{ Version: 1, Ec level: L }");
        qr_builder.unset_version();
        assert_eq!(qr_builder.metadata(), "{ Version: None, Ec level: L }");
    }
}

impl QRBuilder<'_> {
    pub fn build(&self) -> ScanResult<QRCode> {
        debug!("Generating QR {}", self.metadata());

        let encoded = encode(self.data, self.ec_level, self.charset, self.version)?;
        let version = encoded.version;

        let len = version.data_codewords(self.ec_level);
        let mut data = vec![0; len];
        encoded.bits.to_bytes(0, &mut data, 0, len);

        let payload = ec::interleave_with_ecc(&data, version, self.ec_level);
        let mut bits = BitArray::with_capacity(payload.len() * 8);
        for b in payload {
            bits.append_bits(b as u32, 8)?;
        }

        let mut matrix = ByteMatrix::new(version.width(), version.width());
        let mask = match self.mask {
            Some(m) => m,
            None => choose_mask(&bits, self.ec_level, version, &mut matrix)?,
        };
        build_matrix(&bits, self.ec_level, version, mask, &mut matrix)?;

        let qr = QRCode::new(matrix, version, self.ec_level, mask, encoded.mode);
        info!("QR generated: {}", qr.metadata());
        Ok(qr)
    }
}
