use chrono::{DateTime, Utc};
use x509_parser::oid_registry::{
    Oid, OID_X509_COMMON_NAME, OID_X509_COUNTRY_NAME, OID_X509_LOCALITY_NAME,
    OID_X509_ORGANIZATIONAL_UNIT, OID_X509_ORGANIZATION_NAME, OID_X509_STATE_OR_PROVINCE_NAME,
};
use x509_parser::prelude::*;

/// Identity fields pulled from a certificate subject.
///
/// Only names and validity dates are read. Signatures and key material
/// are never checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectIdentity {
    pub organization: String,
    pub npki_name: String,
    pub common_name: Option<String>,
    pub is_personal: bool,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
}

impl SubjectIdentity {
    /// Parse a DER certificate. The error string describes why the
    /// certificate cannot be placed in a guest store.
    pub fn from_der(bytes: &[u8]) -> std::result::Result<Self, String> {
        let (_, cert) =
            X509Certificate::from_der(bytes).map_err(|e| format!("invalid DER certificate: {e}"))?;
        let subject = cert.subject();

        let organization = subject
            .iter_organization()
            .find_map(|attr| attr.as_str().ok())
            .filter(|o| !o.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| "subject has no organization (O) attribute".to_string())?;

        let common_name = subject
            .iter_common_name()
            .find_map(|attr| attr.as_str().ok())
            .map(str::to_string);

        let is_personal = subject
            .iter_organizational_unit()
            .filter_map(|attr| attr.as_str().ok())
            .any(|ou| ou.to_ascii_lowercase().starts_with("personal"));

        Ok(Self {
            organization,
            npki_name: npki_name(subject)?,
            common_name,
            is_personal,
            not_before: DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0),
            not_after: DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0),
        })
    }
}

/// NPKI stores a user's pair in a folder named after the subject DN, most
/// specific attribute first: `cn=...,ou=...,o=...,c=kr`.
fn npki_name(subject: &X509Name<'_>) -> std::result::Result<String, String> {
    let mut parts = Vec::new();
    for rdn in subject.iter_rdn() {
        for attr in rdn.iter() {
            let value = attr
                .as_str()
                .map_err(|e| format!("unreadable subject attribute: {e}"))?;
            parts.push(format!("{}={}", short_name(attr.attr_type()), value));
        }
    }
    parts.reverse();
    Ok(parts.join(","))
}

fn short_name(oid: &Oid<'_>) -> String {
    let name = if *oid == OID_X509_COMMON_NAME {
        "cn"
    } else if *oid == OID_X509_ORGANIZATIONAL_UNIT {
        "ou"
    } else if *oid == OID_X509_ORGANIZATION_NAME {
        "o"
    } else if *oid == OID_X509_COUNTRY_NAME {
        "c"
    } else if *oid == OID_X509_LOCALITY_NAME {
        "l"
    } else if *oid == OID_X509_STATE_OR_PROVINCE_NAME {
        "st"
    } else {
        return oid.to_id_string();
    };
    name.to_string()
}
