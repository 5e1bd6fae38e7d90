//! Loads the mounted certificate chain and private key.
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu, ensure};
use tokio_rustls::rustls::pki_types::{
    CertificateDer, PrivateKeyDer,
    pem::{self, PemObject},
};

type Result<T, E = CertificateError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum CertificateError {
    #[snafu(display("failed to read certificate chain from {path:?}"))]
    ReadCertificateChain { source: pem::Error, path: PathBuf },

    #[snafu(display("certificate file {path:?} contains no certificates"))]
    NoCertificates { path: PathBuf },

    #[snafu(display("failed to read private key from {path:?}"))]
    ReadPrivateKey { source: pem::Error, path: PathBuf },
}

/// A PEM decoded certificate chain with its private key, ready to be handed to rustls.
#[derive(Debug)]
pub struct CertificateChain {
    pub chain: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
}

impl CertificateChain {
    /// Reads the chain from `certificate_path` (leaf first) and the PKCS#1, PKCS#8 or SEC1
    /// encoded key from `private_key_path`.
    pub fn from_files(
        certificate_path: impl AsRef<Path>,
        private_key_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let certificate_path = certificate_path.as_ref();
        let private_key_path = private_key_path.as_ref();

        let chain = CertificateDer::pem_file_iter(certificate_path)
            .and_then(|certificates| certificates.collect::<Result<Vec<_>, _>>())
            .context(ReadCertificateChainSnafu {
                path: certificate_path,
            })?;
        ensure!(!chain.is_empty(), NoCertificatesSnafu {
            path: certificate_path
        });

        let private_key = PrivateKeyDer::from_pem_file(private_key_path).context(
            ReadPrivateKeySnafu {
                path: private_key_path,
            },
        )?;

        tracing::debug!(
            certificate.path = %certificate_path.display(),
            certificate.chain_length = chain.len(),
            "loaded TLS certificate chain"
        );

        Ok(Self { chain, private_key })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
    }

    #[test]
    fn load_fixture() {
        let chain = CertificateChain::from_files(fixture("cert.pem"), fixture("key.pem"))
            .expect("fixture must load");

        assert_eq!(chain.chain.len(), 1);
        assert!(matches!(chain.private_key, PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn missing_certificate_file() {
        let err = CertificateChain::from_files("/does/not/exist.pem", fixture("key.pem"))
            .expect_err("missing file must fail");

        assert!(matches!(err, CertificateError::ReadCertificateChain { .. }));
    }

    #[test]
    fn empty_certificate_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "not a certificate").expect("write temp file");

        let err = CertificateChain::from_files(file.path(), fixture("key.pem"))
            .expect_err("empty chain must fail");

        assert!(matches!(err, CertificateError::NoCertificates { .. }));
    }

    #[test]
    fn certificate_instead_of_key() {
        let err = CertificateChain::from_files(fixture("cert.pem"), fixture("cert.pem"))
            .expect_err("certificate is not a key");

        assert!(matches!(err, CertificateError::ReadPrivateKey { .. }));
    }
}
