use crate::catalog::ServiceCatalogEntry;
use crate::cert::CertPair;

/// Render certificate pairs as a numbered list. The numbers are what
/// `generate --cert N` accepts.
pub fn render_cert_pairs(pairs: &[CertPair]) -> String {
    let mut output = String::new();

    if pairs.is_empty() {
        output.push_str("\n  No certificate pairs found.\n\n");
        return output;
    }

    output.push_str(&format!("\n  {} certificate pair(s) found:\n\n", pairs.len()));

    for (index, pair) in pairs.iter().enumerate() {
        let kind = if pair.is_personal_cert {
            "personal"
        } else {
            "corporate"
        };
        let expiry = pair
            .not_after
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());

        output.push_str(&format!(
            "  [{}] {} ({}, {})\n",
            index + 1,
            pair.display_name(),
            pair.subject_organization,
            kind
        ));
        output.push_str(&format!("      expires: {}\n", expiry));
        output.push_str(&format!("      cert:    {}\n", pair.der_file_path.display()));
        output.push_str(&format!("      key:     {}\n", pair.key_file_path.display()));
        output.push('\n');
    }

    output
}

/// Render the catalog as a table.
pub fn render_services(services: &[ServiceCatalogEntry]) -> String {
    let mut output = format!(
        "{:<20} {:<28} {:<9} HOMEPAGE\n",
        "ID", "NAME", "PACKAGES"
    );
    output.push_str(&"-".repeat(80));
    output.push('\n');
    for service in services {
        output.push_str(&format!(
            "{:<20} {:<28} {:<9} {}\n",
            service.id,
            service.display_name,
            service.packages.len(),
            service.homepage_url
        ));
    }
    output
}
