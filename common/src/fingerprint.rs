use std::path::Path;

use md5::Digest;

use crate::error::Error;

/// Returns the lowercase hex MD5 digest of `bytes`. This is the key
/// consul-template derives from a template's contents to pick its dedup
/// bucket, so it has to stay MD5 even though MD5 is long broken for
/// anything security-relevant.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = md5::Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Reads `path` in full and fingerprints its contents.
pub fn fingerprint_file(path: &Path) -> Result<String, Error> {
    let contents = std::fs::read(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(fingerprint(&contents))
}

/// Rejects paths that are not consul-template sources. Runs before any
/// hashing or network traffic.
pub fn require_template_extension(path: &Path) -> Result<(), Error> {
    match path.extension() {
        Some(ext) if ext == "ctmpl" => Ok(()),
        _ => Err(Error::BadExtension(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn known_digests() {
        assert_eq!(fingerprint(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            fingerprint(b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn deterministic() {
        let a = fingerprint(b"{{ service \"web\" }}");
        let b = fingerprint(b"{{ service \"web\" }}");
        assert_eq!(a, b);
        assert_ne!(a, fingerprint(b"{{ service \"db\" }}"));
    }

    #[test]
    fn extension_gate() {
        assert!(require_template_extension(&PathBuf::from("config.ctmpl")).is_ok());
        assert!(require_template_extension(&PathBuf::from("dir/nginx.conf.ctmpl")).is_ok());
        assert!(require_template_extension(&PathBuf::from("config.txt")).is_err());
        assert!(require_template_extension(&PathBuf::from("ctmpl")).is_err());
    }

    #[test]
    fn unreadable_file_is_a_read_error() {
        let err = fingerprint_file(&PathBuf::from("/nonexistent/x.ctmpl")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
