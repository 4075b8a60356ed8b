use crate::core::RmuResult;
use md5::{Digest, Md5};
use std::path::Path;

/// Lower-case hex MD5 of `data`
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// MD5 of the file at `path`
///
/// A missing file is an `Io` error like any other read failure.
pub async fn file_md5(path: &Path) -> RmuResult<String> {
    let data = tokio::fs::read(path).await?;
    Ok(md5_hex(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RmuError;
    use tempfile::TempDir;

    #[test]
    fn test_md5_known_values() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[tokio::test]
    async fn test_file_md5() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Mine.dll");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            file_md5(&path).await.unwrap(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[tokio::test]
    async fn test_file_md5_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = file_md5(&temp.path().join("missing.dll")).await.unwrap_err();
        assert!(matches!(err, RmuError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
