use std::io::Cursor;
use std::process::Command;
use tempfile::tempdir;

// This test streams a ZIP to disk with the library and then calls `unzip -t` to verify compatibility.
// If `unzip` is not present on the system, the test will be skipped.

#[test]
fn unzip_compatibility() {
    use s_zipstream::{CompressionMethod, EntrySource, ZipStream};

    // Check if `unzip` exists by trying to run `unzip -v`.
    let check = Command::new("unzip").arg("-v").output();
    if check.is_err() {
        eprintln!("skipping test: `unzip` not found");
        return;
    }

    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("compat.zip");

    // Create zip: one stored entry, one deflated nested archive, one larger deflated entry
    {
        let entries = vec![
            EntrySource::stream("hello.txt", Cursor::new(b"hello from test".to_vec())),
            EntrySource::stream("nested.zip", Cursor::new(vec![1u8; 4096])),
            EntrySource::reader("big.bin", Cursor::new(vec![0u8; 1024 * 1024]), 1024 * 1024),
        ];
        let stream = ZipStream::new(entries, CompressionMethod::Stored);
        let file = std::fs::File::create(&zip_path).unwrap();
        stream.write_to(file).unwrap();
    }

    // Run `unzip -t` to test archive integrity
    let output = Command::new("unzip")
        .arg("-t")
        .arg(&zip_path)
        .output()
        .expect("failed to run unzip");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "unzip reported failure: {} {}",
        stdout,
        stderr
    );
}
