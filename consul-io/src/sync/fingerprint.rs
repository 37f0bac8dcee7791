use std::io;
use std::path::Path;

use md5::{Context, Digest};
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

pub fn fingerprint_bytes(bytes: &[u8]) -> Digest {
    md5::compute(bytes)
}

pub async fn fingerprint_file(path: &Path) -> io::Result<Digest> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut ctx = Context::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        ctx.consume(&buf[..read]);
    }
    Ok(ctx.compute())
}

/// Reports whether the local file already holds exactly `remote`.
pub async fn compare(local: &Path, remote: &[u8]) -> io::Result<bool> {
    let local = fingerprint_file(local).await?;
    Ok(local == fingerprint_bytes(remote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn equal_content_matches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"X").unwrap();

        assert!(compare(&path, b"X").await.unwrap());
        assert!(!compare(&path, b"Y").await.unwrap());
        assert!(!compare(&path, b"").await.unwrap());
    }

    #[tokio::test]
    async fn large_file_is_streamed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..(READ_CHUNK * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        assert_eq!(
            fingerprint_file(&path).await.unwrap(),
            fingerprint_bytes(&content)
        );
        assert!(compare(&path, &content).await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = compare(&dir.path().join("gone"), b"X").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
