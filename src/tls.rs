//! TLS configuration
//!
//! Gemini servers overwhelmingly use self-signed certificates, so by default
//! a `Client` accepts any server certificate. Verification against trusted
//! roots is opt-in through
//! [`ClientBuilder::danger_accept_invalid_certs(false)`](crate::ClientBuilder::danger_accept_invalid_certs).
//!
//! Roots come from the `rustls-tls-webpki-roots` or `rustls-tls-native-roots`
//! features, plus any certificate added with
//! [`ClientBuilder::add_root_certificate`](crate::ClientBuilder::add_root_certificate).

use std::{fmt, io::BufReader, sync::Arc, time::SystemTime};

use rustls::{
    client::{ServerCertVerified, ServerCertVerifier},
    ClientConfig, RootCertStore, ServerName,
};

use crate::Error;

/// Represents a server X509 certificate.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// Create a `Certificate` from a binary DER encoded certificate
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::fs::File;
    /// # use std::io::Read;
    /// # fn cert() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut buf = Vec::new();
    /// File::open("my_cert.der")?
    ///     .read_to_end(&mut buf)?;
    /// let cert = gmi::Certificate::from_der(&buf)?;
    /// # drop(cert);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_der(der: &[u8]) -> crate::Result<Certificate> {
        if der.is_empty() {
            return Err(Error::builder("empty DER certificate"));
        }
        Ok(Certificate { der: der.to_owned() })
    }

    /// Create a `Certificate` from a PEM encoded certificate
    ///
    /// Only the first certificate in `pem` is used.
    pub fn from_pem(pem: &[u8]) -> crate::Result<Certificate> {
        Certificate::from_pem_bundle(pem)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::builder("no certificate found in PEM data"))
    }

    /// Create a collection of `Certificate`s from a PEM encoded certificate bundle.
    ///
    /// Files downloaded from a CA often contain a whole chain; this reads
    /// every `CERTIFICATE` block and ignores everything else.
    pub fn from_pem_bundle(pem: &[u8]) -> crate::Result<Vec<Certificate>> {
        let mut reader = BufReader::new(pem);
        let certs = rustls_pemfile::certs(&mut reader).map_err(Error::builder)?;
        Ok(certs.into_iter().map(|der| Certificate { der }).collect())
    }

    /// The DER bytes of this certificate.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    fn add_to_store(&self, store: &mut RootCertStore) -> crate::Result<()> {
        store
            .add(&rustls::Certificate(self.der.clone()))
            .map_err(Error::builder)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("len", &self.der.len())
            .finish()
    }
}

/// Accepts every server certificate.
///
/// Handshake signatures are still verified by the default trait methods, so
/// the peer must hold the key for whatever certificate it presents.
pub(crate) struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// TLS settings gathered by a `ClientBuilder`.
#[derive(Clone, Debug)]
pub(crate) struct TlsSettings {
    pub(crate) certs_verification: bool,
    pub(crate) built_in_root_certs: bool,
    pub(crate) root_certs: Vec<Certificate>,
}

impl TlsSettings {
    /// Builds the rustls client configuration these settings describe.
    pub(crate) fn build(&self) -> crate::Result<ClientConfig> {
        let builder = ClientConfig::builder().with_safe_defaults();

        if !self.certs_verification {
            log::debug!("tls: server certificate verification disabled");
            return Ok(builder
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth());
        }

        let mut roots = RootCertStore::empty();

        if self.built_in_root_certs {
            add_built_in_roots(&mut roots);
        }

        for cert in &self.root_certs {
            cert.add_to_store(&mut roots)?;
        }

        log::debug!("tls: verifying against {} trusted roots", roots.len());

        Ok(builder
            .with_root_certificates(roots)
            .with_no_client_auth())
    }
}

#[cfg_attr(
    not(any(
        feature = "rustls-tls-webpki-roots",
        feature = "rustls-tls-native-roots"
    )),
    allow(unused_variables)
)]
fn add_built_in_roots(roots: &mut RootCertStore) {
    #[cfg(feature = "rustls-tls-webpki-roots")]
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    #[cfg(feature = "rustls-tls-native-roots")]
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let mut invalid = 0usize;
            for cert in certs {
                if roots.add(&rustls::Certificate(cert.0)).is_err() {
                    invalid += 1;
                }
            }
            if invalid > 0 {
                log::warn!("tls: skipped {invalid} unparsable native root certificates");
            }
        }
        Err(err) => log::error!("tls failed to load native root certificates: {err}"),
    }
}
