use serde::Serialize;

use crate::error::Result;

/// Render any listing as pretty-printed JSON.
pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::test_support::{cert, service};

    #[test]
    fn cert_pairs_serialize_with_paths() {
        let pairs = vec![cert("yessign", "cn=hong,o=yessign,c=kr", true)];
        let json = render(&pairs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["subject_organization"], "yessign");
        assert_eq!(value[0]["is_personal_cert"], true);
        assert_eq!(value[0]["der_file_path"], "signCert.der");
    }

    #[test]
    fn services_keep_package_order() {
        let services = vec![service(&[
            ("B", "https://cdn.example.com/b.exe"),
            ("A", "https://cdn.example.com/a.exe"),
        ])];
        let value: serde_json::Value = serde_json::from_str(&render(&services).unwrap()).unwrap();
        assert_eq!(value[0]["packages"][0]["name"], "B");
        assert_eq!(value[0]["packages"][1]["name"], "A");
    }
}
