//! Self-signed certificate material for the TLS overlay
//!
//! The key and certificate live at fixed paths and are generated exactly once.
//! Later overlay changes reuse them; only a full uninstall deletes them.

use base64::Engine;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use pf_core::error::{FleetError, Result};

/// Key and certificate paths inside the certificate directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateMaterial {
    dir: PathBuf,
}

impl CertificateMaterial {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cert_path(&self) -> PathBuf {
        self.dir.join("cert.pem")
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.join("key.pem")
    }

    /// Whether both halves of the pair are on disk
    pub fn exists(&self) -> bool {
        self.cert_path().is_file() && self.key_path().is_file()
    }

    /// Generate the pair unless it already exists
    ///
    /// Returns `true` when new material was written. A lone key or certificate
    /// is replaced together with its missing partner.
    pub fn ensure(&self, common_name: &str, validity_days: u32) -> Result<bool> {
        if self.exists() {
            tracing::debug!("Reusing certificate material in {:?}", self.dir);
            return Ok(false);
        }

        let generated = generate_self_signed(common_name, validity_days)?;
        self.write(&generated)
            .map_err(|e| FleetError::Certificate(format!("failed to write {:?}: {}", self.dir, e)))?;
        tracing::info!("Generated self-signed certificate in {:?}", self.dir);
        Ok(true)
    }

    fn write(&self, generated: &GeneratedCertificate) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.key_path(), &generated.key_pem)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(self.key_path())?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(self.key_path(), perms)?;
        }

        fs::write(self.cert_path(), &generated.cert_pem)
    }

    /// SHA-256 fingerprint of the certificate, as colon-separated hex
    pub fn fingerprint(&self) -> Result<Option<String>> {
        let pem = match fs::read_to_string(self.cert_path()) {
            Ok(pem) => pem,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let der = pem_to_der(&pem)?;
        Ok(Some(format_fingerprint(&Sha256::digest(der))))
    }

    /// Delete the whole certificate directory; missing is fine
    pub fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::info!("Removed certificate directory {:?}", self.dir);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct GeneratedCertificate {
    cert_pem: String,
    key_pem: String,
}

fn generate_self_signed(common_name: &str, validity_days: u32) -> Result<GeneratedCertificate> {
    let failed = |e: &dyn std::fmt::Display| FleetError::Certificate(e.to_string());

    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, "proxyfleet");
    params.distinguished_name = dn;

    let mut sans = vec![SanType::IpAddress(std::net::IpAddr::V4(
        std::net::Ipv4Addr::LOCALHOST,
    ))];
    if let Ok(name) = rcgen::Ia5String::try_from(common_name) {
        sans.push(SanType::DnsName(name));
    }
    params.subject_alt_names = sans;

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|e| failed(&e))?;
    let not_after = now + Duration::from_secs(u64::from(validity_days) * 24 * 60 * 60);
    params.not_before =
        time::OffsetDateTime::from_unix_timestamp(now.as_secs() as i64).map_err(|e| failed(&e))?;
    params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.as_secs() as i64)
        .map_err(|e| failed(&e))?;

    params.serial_number = Some(rcgen::SerialNumber::from(rand::random::<u64>()));

    let key_pair = KeyPair::generate().map_err(|e| failed(&e))?;
    let cert = params.self_signed(&key_pair).map_err(|e| failed(&e))?;

    Ok(GeneratedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}

fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    let body: String = pem
        .lines()
        .skip_while(|l| !l.starts_with("-----BEGIN CERTIFICATE-----"))
        .skip(1)
        .take_while(|l| !l.starts_with("-----END CERTIFICATE-----"))
        .map(str::trim)
        .collect();
    if body.is_empty() {
        return Err(FleetError::Certificate("no certificate block found".into()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| FleetError::Certificate(format!("invalid certificate encoding: {}", e)))
}

fn format_fingerprint(digest: &[u8]) -> String {
    hex::encode_upper(digest)
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
